#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::{CliArgs, OutputFormat};
pub use toml_config::{DigConfig, ProbeConfig, TemplateConfig};
