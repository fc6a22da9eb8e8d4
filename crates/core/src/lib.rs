pub mod config;
pub mod types;

pub use config::{AppConfig, ClobApiCredentials, SecretString, ToolSelection};
pub use types::{OrderType, Side};
