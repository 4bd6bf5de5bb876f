pub mod apps;
pub mod module;
pub mod progress;
pub mod setup;
