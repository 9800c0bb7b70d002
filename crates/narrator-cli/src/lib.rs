#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unused_crate_dependencies)]

pub mod bootstrap;
pub mod commands;
pub mod handlers;
pub mod parser;
pub mod paths;
pub mod stores;

pub use bootstrap::CliContext;
pub use commands::{Commands, ConfigCommand};
pub use parser::Cli;
pub use stores::{JsonSessionStore, JsonSettingsStore};
