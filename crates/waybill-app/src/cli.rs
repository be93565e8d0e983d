//! CLI argument definitions for the Waybill terminal host.
//!
//! Uses `clap` with derive macros for argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;
use waybill_core::WaybillConfig;

/// Waybill: a role- and context-aware help assistant for the logistics platform.
#[derive(Parser, Debug)]
#[command(name = "waybill", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Identity signal for role detection, e.g. "/client/dashboard".
    #[arg(short = 'r', long = "route", default_value = "/")]
    pub route: String,

    /// Section visible on the page at startup (repeatable, in page order).
    #[arg(short = 's', long = "section")]
    pub sections: Vec<String>,

    /// Custom knowledge catalog (.toml or .json).
    #[arg(short = 'k', long = "knowledge")]
    pub knowledge: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > WAYBILL_CONFIG env var > platform default (~/.waybill/config.toml).
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("WAYBILL_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the custom knowledge catalog.
    ///
    /// Priority: --knowledge flag > config file value. `None` means the
    /// built-in catalog.
    pub fn resolve_knowledge_path(&self, config: &WaybillConfig) -> Option<PathBuf> {
        self.knowledge
            .clone()
            .or_else(|| config.knowledge.custom_path().map(PathBuf::from))
    }

    /// Resolve the default log filter.
    ///
    /// Priority: --log-level flag > config file value. `RUST_LOG` still wins
    /// over both when set.
    pub fn resolve_log_level(&self, config: &WaybillConfig) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config.general.log_level.clone())
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".waybill").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".waybill").join("config.toml");
    }
    PathBuf::from("config.toml")
}
