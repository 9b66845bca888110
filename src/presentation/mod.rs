pub mod config;
pub mod console;

pub use config::{Environment, ScaffoldConfig, Settings};
pub use console::TranscriptPrinter;
