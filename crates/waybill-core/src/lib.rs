pub mod config;
pub mod error;
pub mod types;

pub use config::WaybillConfig;
pub use error::{Result, WaybillError};
pub use types::*;
