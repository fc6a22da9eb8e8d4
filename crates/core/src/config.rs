use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CLOB_HOST: &str = "https://clob.polymarket.com";
pub const DEFAULT_GAMMA_HOST: &str = "https://gamma-api.polymarket.com";
pub const DEFAULT_DATA_HOST: &str = "https://data-api.polymarket.com";
pub const DEFAULT_RPC_URL: &str = "https://polygon-rpc.com";
pub const DEFAULT_USDC_ADDRESS: &str = "0x2791Bca1f2de4661ED88A30C99A7a9449Aa84174";
pub const POLYGON_CHAIN_ID: u64 = 137;

/// String whose `Debug` output never reveals the value.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString(***)")
    }
}

/// Level-2 CLOB API credentials, either configured up front or derived at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClobApiCredentials {
    pub api_key: String,
    pub secret: SecretString,
    pub passphrase: SecretString,
}

/// Which tools the server advertises.
///
/// `enabled = None` means every known tool; `disabled` is applied afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolSelection {
    pub enabled: Option<Vec<String>>,
    pub disabled: Vec<String>,
}

impl ToolSelection {
    pub fn is_enabled(&self, name: &str) -> bool {
        let allowed = match &self.enabled {
            Some(list) => list.iter().any(|entry| entry == name),
            None => true,
        };
        allowed && !self.disabled.iter().any(|entry| entry == name)
    }

    /// Every name mentioned in either list, for validation against the registry.
    pub fn mentioned(&self) -> impl Iterator<Item = &str> {
        self.enabled
            .iter()
            .flatten()
            .chain(self.disabled.iter())
            .map(String::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub clob_host: String,
    pub gamma_host: String,
    pub data_host: String,
    pub rpc_url: String,
    pub chain_id: u64,
    pub usdc_address: String,
    pub private_key: Option<SecretString>,
    pub clob_credentials: Option<ClobApiCredentials>,
    pub tools: ToolSelection,
    pub search_max_pages: usize,
    pub http_timeout_secs: u64,
    pub log_dir: String,
}

impl AppConfig {
    /// Build configuration from well-known environment variables.
    pub fn load_from_env() -> Result<Self> {
        preload_env_files();
        Self::from_lookup(|key| env_var_non_empty(key))
    }

    /// Build configuration from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let clob_credentials = match (
            lookup("CLOB_API_KEY"),
            lookup("CLOB_SECRET"),
            lookup("CLOB_PASS_PHRASE"),
        ) {
            (Some(api_key), Some(secret), Some(passphrase)) => Some(ClobApiCredentials {
                api_key,
                secret: SecretString::new(secret),
                passphrase: SecretString::new(passphrase),
            }),
            (None, None, None) => None,
            _ => {
                tracing::warn!(
                    "CLOB_API_KEY, CLOB_SECRET and CLOB_PASS_PHRASE must be set together; ignoring partial credentials"
                );
                None
            }
        };

        let tools = ToolSelection {
            enabled: lookup("MCP_ENABLED_TOOLS").map(|value| parse_list(&value)),
            disabled: lookup("MCP_DISABLED_TOOLS")
                .map(|value| parse_list(&value))
                .unwrap_or_default(),
        };

        Ok(Self {
            clob_host: lookup("CLOB_HOST").unwrap_or_else(|| DEFAULT_CLOB_HOST.to_string()),
            gamma_host: lookup("GAMMA_HOST").unwrap_or_else(|| DEFAULT_GAMMA_HOST.to_string()),
            data_host: lookup("DATA_HOST").unwrap_or_else(|| DEFAULT_DATA_HOST.to_string()),
            rpc_url: lookup("RPC_URL").unwrap_or_else(|| DEFAULT_RPC_URL.to_string()),
            chain_id: parse_number(&lookup, "CHAIN_ID", POLYGON_CHAIN_ID)?,
            usdc_address: lookup("USDC_ADDRESS")
                .unwrap_or_else(|| DEFAULT_USDC_ADDRESS.to_string()),
            private_key: lookup("PRIVATE_KEY").map(SecretString::new),
            clob_credentials,
            tools,
            search_max_pages: parse_number(&lookup, "SEARCH_MAX_PAGES", 5)?,
            http_timeout_secs: parse_number(&lookup, "HTTP_TIMEOUT_SECS", 30)?,
            log_dir: lookup("MCP_LOG_DIR").unwrap_or_else(|| "logs".to_string()),
        })
    }

    /// Helper that forces the presence of a wallet key.
    pub fn require_private_key(&self) -> Result<&SecretString> {
        self.private_key.as_ref().context(
            "PRIVATE_KEY is not set: create a .env file (see .env.example) or export PRIVATE_KEY",
        )
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}

fn parse_number<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a number, got `{raw}`")),
        None => Ok(default),
    }
}

fn env_var_non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn preload_env_files() {
    let _ = dotenv();

    let workspace_env = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../.env");
    if workspace_env.exists() {
        let _ = dotenvy::from_path(workspace_env);
    }
}
