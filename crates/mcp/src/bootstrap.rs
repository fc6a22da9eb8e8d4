//! One-time startup: wallet key, CLOB API credentials and the dispatcher built on them.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use pm_core::config::{AppConfig, ClobApiCredentials};
use polymarket::{ClobRestClient, PolymarketError, WalletSigner};

use crate::dispatcher::ToolDispatcher;
use crate::error::ToolError;
use crate::gateway::ClobGateway;
use crate::registry::ToolRegistry;

/// Credentials fixed for the lifetime of the process.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub signer: Option<WalletSigner>,
    pub api_credentials: Option<ClobApiCredentials>,
}

/// Obtains level-2 API credentials for a wallet.
#[async_trait]
pub trait ApiKeyIssuer: Send + Sync {
    async fn issue(&self, signer: &WalletSigner) -> Result<ClobApiCredentials, PolymarketError>;
}

#[async_trait]
impl ApiKeyIssuer for ClobRestClient {
    async fn issue(&self, signer: &WalletSigner) -> Result<ClobApiCredentials, PolymarketError> {
        self.clone()
            .with_signer(signer.clone())
            .create_or_derive_api_credentials()
            .await
    }
}

/// Resolves the wallet and API credentials the enabled tools need.
///
/// Tools that need the key fail closed: a missing or malformed key, or a
/// failed credential derivation, aborts startup. Market-data-only setups start
/// without credentials.
pub async fn bootstrap_session(
    config: &AppConfig,
    registry: &ToolRegistry,
    issuer: &dyn ApiKeyIssuer,
) -> Result<Session, ToolError> {
    let needs_key = registry.requires_private_key();

    let signer = match config.private_key.as_ref() {
        Some(key) => match WalletSigner::from_private_key(key.expose(), config.chain_id) {
            Ok(signer) => Some(signer),
            Err(err) if needs_key => {
                return Err(ToolError::CredentialError(format!("PRIVATE_KEY is unusable: {err}")))
            }
            Err(err) => {
                tracing::warn!(error = %err, "ignoring unusable PRIVATE_KEY, only market data tools are enabled");
                None
            }
        },
        None if needs_key => {
            return Err(ToolError::CredentialError(format!(
                "PRIVATE_KEY is required by enabled tools: {}",
                registry.key_holders().join(", ")
            )))
        }
        None => None,
    };

    if let Some(signer) = signer.as_ref() {
        tracing::info!(address = %signer.address().to_checksum(None), "wallet loaded");
    }

    let api_credentials = match (registry.requires_api_credentials(), signer.as_ref()) {
        (true, Some(signer)) => match config.clob_credentials.clone() {
            Some(credentials) => Some(credentials),
            None => {
                tracing::info!("no CLOB API credentials configured, requesting them from the exchange");
                let credentials = issuer.issue(signer).await.map_err(|err| {
                    ToolError::CredentialError(format!("failed to obtain CLOB API credentials: {err}"))
                })?;
                tracing::info!("CLOB API credentials ready");
                Some(credentials)
            }
        },
        _ => config.clob_credentials.clone(),
    };

    Ok(Session {
        signer,
        api_credentials,
    })
}

/// Full startup path shared by the server and the CLI.
pub async fn build_dispatcher(config: &AppConfig) -> Result<ToolDispatcher> {
    let registry = ToolRegistry::from_selection(&config.tools)?;
    tracing::info!(tools = ?registry.names(), "tool registry ready");

    let clob = ClobRestClient::from_config(config)?;
    let session = bootstrap_session(config, &registry, &clob).await?;
    let gateway = ClobGateway::new(config, session)?;

    Ok(ToolDispatcher::new(
        registry,
        Arc::new(gateway),
        config.search_max_pages,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pm_core::config::{SecretString, ToolSelection};
    use std::collections::HashMap;
    use std::io::{self, Write};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[derive(Default)]
    struct CountingIssuer {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl ApiKeyIssuer for CountingIssuer {
        async fn issue(
            &self,
            _signer: &WalletSigner,
        ) -> Result<ClobApiCredentials, PolymarketError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(PolymarketError::Credentials("derive refused".into()));
            }
            Ok(ClobApiCredentials {
                api_key: "derived".into(),
                secret: SecretString::new("c2VjcmV0"),
                passphrase: SecretString::new("phrase"),
            })
        }
    }

    fn config(pairs: &[(&str, &str)]) -> AppConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned()).unwrap()
    }

    fn registry(config: &AppConfig) -> ToolRegistry {
        ToolRegistry::from_selection(&config.tools).unwrap()
    }

    #[tokio::test]
    async fn missing_key_with_trading_tools_is_fatal() {
        let config = config(&[]);
        let issuer = CountingIssuer::default();
        let err = bootstrap_session(&config, &registry(&config), &issuer)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "CredentialError");
        assert!(err.to_string().contains("place_limit_order"));
        assert_eq!(issuer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn market_data_only_starts_without_a_key() {
        let config = config(&[("MCP_ENABLED_TOOLS", "get_markets,get_order_book,get_price")]);
        let issuer = CountingIssuer::default();
        let session = bootstrap_session(&config, &registry(&config), &issuer)
            .await
            .unwrap();
        assert!(session.signer.is_none());
        assert!(session.api_credentials.is_none());
        assert_eq!(issuer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn malformed_key_is_ignored_for_market_data_only() {
        let config = config(&[
            ("MCP_ENABLED_TOOLS", "get_markets"),
            ("PRIVATE_KEY", "0xnot-a-key"),
        ]);
        let session = bootstrap_session(&config, &registry(&config), &CountingIssuer::default())
            .await
            .unwrap();
        assert!(session.signer.is_none());
    }

    #[tokio::test]
    async fn malformed_key_is_fatal_for_balance_tool() {
        let config = config(&[
            ("MCP_ENABLED_TOOLS", "get_usdc_balance"),
            ("PRIVATE_KEY", "0x1234"),
        ]);
        let err = bootstrap_session(&config, &registry(&config), &CountingIssuer::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "CredentialError");
        assert!(!err.to_string().contains("0x1234"));
    }

    #[tokio::test]
    async fn balance_tool_needs_a_key_but_no_api_credentials() {
        let config = config(&[
            ("MCP_ENABLED_TOOLS", "get_usdc_balance"),
            ("PRIVATE_KEY", TEST_KEY),
        ]);
        let issuer = CountingIssuer::default();
        let session = bootstrap_session(&config, &registry(&config), &issuer)
            .await
            .unwrap();
        assert!(session.signer.is_some());
        assert!(session.api_credentials.is_none());
        assert_eq!(issuer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn trading_derives_credentials_once_when_absent() {
        let config = config(&[("PRIVATE_KEY", TEST_KEY)]);
        let issuer = CountingIssuer::default();
        let session = bootstrap_session(&config, &registry(&config), &issuer)
            .await
            .unwrap();
        assert_eq!(session.api_credentials.unwrap().api_key, "derived");
        assert_eq!(issuer.calls.load(Ordering::SeqCst), 1);
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn derived_credentials_stay_out_of_the_logs() {
        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::TRACE)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let config = config(&[("PRIVATE_KEY", TEST_KEY)]);
        bootstrap_session(&config, &registry(&config), &CountingIssuer::default())
            .await
            .unwrap();

        let logs = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("CLOB API credentials ready"), "{logs}");
        for secret in ["derived", "c2VjcmV0", "phrase", &TEST_KEY[2..]] {
            assert!(!logs.contains(secret), "{secret} leaked into {logs}");
        }
    }

    #[tokio::test]
    async fn configured_credentials_skip_derivation() {
        let config = config(&[
            ("PRIVATE_KEY", TEST_KEY),
            ("CLOB_API_KEY", "configured"),
            ("CLOB_SECRET", "c2VjcmV0"),
            ("CLOB_PASS_PHRASE", "phrase"),
        ]);
        let issuer = CountingIssuer::default();
        let session = bootstrap_session(&config, &registry(&config), &issuer)
            .await
            .unwrap();
        assert_eq!(session.api_credentials.unwrap().api_key, "configured");
        assert_eq!(issuer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn derivation_failure_is_fatal_for_trading() {
        let config = config(&[("PRIVATE_KEY", TEST_KEY)]);
        let issuer = CountingIssuer {
            fail: true,
            ..CountingIssuer::default()
        };
        let err = bootstrap_session(&config, &registry(&config), &issuer)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "CredentialError");
    }

    #[test]
    fn unknown_tool_names_fail_registry_construction() {
        let selection = ToolSelection {
            enabled: None,
            disabled: vec!["redeem_position".into()],
        };
        assert!(ToolRegistry::from_selection(&selection).is_err());
    }
}
