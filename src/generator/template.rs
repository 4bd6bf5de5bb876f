//! `${slot}` templates with checked bindings

use crate::error::{GraphCtlError, Result};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Slot(String),
}

/// Parsed template; bind every slot, then render
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    segments: Vec<Segment>,
    bindings: BTreeMap<String, String>,
}

impl Template {
    /// Parse `source`; `name` only appears in errors
    pub fn parse(name: &str, source: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut rest = source;

        while let Some(start) = rest.find("${") {
            if start > 0 {
                segments.push(Segment::Text(rest[..start].to_string()));
            }
            let after = &rest[start + 2..];
            let end = after.find('}').ok_or_else(|| {
                GraphCtlError::TemplateError(format!("{}: unterminated placeholder", name))
            })?;
            let slot = &after[..end];
            if slot.is_empty() || !slot.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(GraphCtlError::TemplateError(format!(
                    "{}: invalid placeholder '${{{}}}'",
                    name, slot
                )));
            }
            segments.push(Segment::Slot(slot.to_string()));
            rest = &after[end + 1..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Text(rest.to_string()));
        }

        Ok(Self {
            name: name.to_string(),
            segments,
            bindings: BTreeMap::new(),
        })
    }

    /// Distinct slot names in order of first use
    pub fn slots(&self) -> Vec<&str> {
        let mut slots: Vec<&str> = Vec::new();
        for segment in &self.segments {
            if let Segment::Slot(slot) = segment {
                if !slots.contains(&slot.as_str()) {
                    slots.push(slot);
                }
            }
        }
        slots
    }

    pub fn bind(&mut self, slot: &str, value: impl Into<String>) -> Result<&mut Self> {
        if !self.slots().contains(&slot) {
            return Err(GraphCtlError::TemplateError(format!(
                "{}: no slot named '{}'",
                self.name, slot
            )));
        }
        self.bindings.insert(slot.to_string(), value.into());
        Ok(self)
    }

    pub fn render(&self) -> Result<String> {
        let unbound: Vec<&str> = self
            .slots()
            .into_iter()
            .filter(|slot| !self.bindings.contains_key(*slot))
            .collect();
        if !unbound.is_empty() {
            return Err(GraphCtlError::TemplateError(format!(
                "{}: unbound slots {}",
                self.name,
                unbound.join(", ")
            )));
        }

        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Slot(slot) => {
                    if let Some(value) = self.bindings.get(slot) {
                        out.push_str(value);
                    }
                }
            }
        }
        Ok(out)
    }
}
