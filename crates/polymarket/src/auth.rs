use std::fmt;

use alloy::primitives::{keccak256, Address, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine as _;
use hmac::{Hmac, Mac};
use pm_core::config::ClobApiCredentials;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use sha2::Sha256;

use crate::eip712::{self, encode_address, encode_string, encode_u256};
use crate::error::{PolymarketError, Result};

type HmacSha256 = Hmac<Sha256>;

const CLOB_AUTH_DOMAIN_NAME: &str = "ClobAuthDomain";
const CLOB_AUTH_DOMAIN_VERSION: &str = "1";
const CLOB_AUTH_TYPE: &str =
    "ClobAuth(address address,string timestamp,uint256 nonce,string message)";
const CLOB_AUTH_MESSAGE: &str = "This message attests that I control the given wallet";

pub const POLY_ADDRESS: HeaderName = HeaderName::from_static("poly_address");
pub const POLY_SIGNATURE: HeaderName = HeaderName::from_static("poly_signature");
pub const POLY_TIMESTAMP: HeaderName = HeaderName::from_static("poly_timestamp");
pub const POLY_NONCE: HeaderName = HeaderName::from_static("poly_nonce");
pub const POLY_API_KEY: HeaderName = HeaderName::from_static("poly_api_key");
pub const POLY_PASSPHRASE: HeaderName = HeaderName::from_static("poly_passphrase");

/// Wallet derived from the configured private key. `Debug` only shows the address.
#[derive(Clone)]
pub struct WalletSigner {
    signer: PrivateKeySigner,
    chain_id: u64,
}

impl fmt::Debug for WalletSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletSigner")
            .field("address", &self.signer.address())
            .field("chain_id", &self.chain_id)
            .finish()
    }
}

impl WalletSigner {
    /// Accepts a 64 hex character key with or without the `0x` prefix.
    pub fn from_private_key(private_key: &str, chain_id: u64) -> Result<Self> {
        let trimmed = private_key.trim();
        let hex_key = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = hex::decode(hex_key)
            .map_err(|_| PolymarketError::Credentials("private key is not valid hex".into()))?;
        if bytes.len() != 32 {
            return Err(PolymarketError::Credentials(format!(
                "private key must be 32 bytes, got {}",
                bytes.len()
            )));
        }

        let signer = PrivateKeySigner::from_bytes(&B256::from_slice(&bytes)).map_err(|_| {
            PolymarketError::Credentials("private key is not a valid secp256k1 scalar".into())
        })?;

        Ok(Self { signer, chain_id })
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// 65-byte `r || s || v` signature over a prehashed digest, `0x` prefixed.
    pub fn sign_hash(&self, hash: &B256) -> Result<String> {
        let signature = self
            .signer
            .sign_hash_sync(hash)
            .map_err(|err| PolymarketError::Signature(err.to_string()))?;
        Ok(format!("0x{}", hex::encode(signature.as_bytes())))
    }

    /// Level-1 headers proving wallet control for the API-key endpoints.
    pub fn l1_headers(&self, timestamp: i64, nonce: u64) -> Result<HeaderMap> {
        let timestamp = timestamp.to_string();
        let digest = clob_auth_digest(self.address(), &timestamp, nonce, self.chain_id);
        let signature = self.sign_hash(&digest)?;

        let mut headers = HeaderMap::new();
        headers.insert(
            POLY_ADDRESS,
            HeaderValue::from_str(&self.address().to_checksum(None))?,
        );
        headers.insert(POLY_SIGNATURE, HeaderValue::from_str(&signature)?);
        headers.insert(POLY_TIMESTAMP, HeaderValue::from_str(&timestamp)?);
        headers.insert(POLY_NONCE, HeaderValue::from_str(&nonce.to_string())?);
        Ok(headers)
    }

    /// Level-2 headers for authenticated trading endpoints.
    pub fn l2_headers(
        &self,
        credentials: &ClobApiCredentials,
        timestamp: i64,
        method: &str,
        path: &str,
        body: Option<&str>,
    ) -> Result<HeaderMap> {
        let timestamp = timestamp.to_string();
        let signature = sign_l2_request(
            credentials.secret.expose(),
            &timestamp,
            method,
            path,
            body,
        )?;

        let mut headers = HeaderMap::new();
        headers.insert(
            POLY_ADDRESS,
            HeaderValue::from_str(&self.address().to_checksum(None))?,
        );
        headers.insert(POLY_SIGNATURE, HeaderValue::from_str(&signature)?);
        headers.insert(POLY_TIMESTAMP, HeaderValue::from_str(&timestamp)?);
        headers.insert(POLY_API_KEY, HeaderValue::from_str(&credentials.api_key)?);
        headers.insert(
            POLY_PASSPHRASE,
            HeaderValue::from_str(credentials.passphrase.expose())?,
        );
        Ok(headers)
    }
}

/// EIP-712 digest of the `ClobAuth` attestation.
pub fn clob_auth_digest(address: Address, timestamp: &str, nonce: u64, chain_id: u64) -> B256 {
    let domain = eip712::domain_separator(
        CLOB_AUTH_DOMAIN_NAME,
        CLOB_AUTH_DOMAIN_VERSION,
        chain_id,
        None,
    );

    let mut encoded = Vec::with_capacity(32 * 5);
    encoded.extend_from_slice(keccak256(CLOB_AUTH_TYPE.as_bytes()).as_slice());
    encoded.extend_from_slice(&encode_address(address));
    encoded.extend_from_slice(&encode_string(timestamp));
    encoded.extend_from_slice(&encode_u256(U256::from(nonce)));
    encoded.extend_from_slice(&encode_string(CLOB_AUTH_MESSAGE));

    eip712::typed_data_digest(domain, keccak256(&encoded))
}

/// HMAC-SHA256 over `timestamp + method + path + body`, keyed with the
/// url-safe base64 decoded secret and encoded back as url-safe base64.
pub fn sign_l2_request(
    secret: &str,
    timestamp: &str,
    method: &str,
    path: &str,
    body: Option<&str>,
) -> Result<String> {
    let key = URL_SAFE
        .decode(secret)
        .or_else(|_| URL_SAFE_NO_PAD.decode(secret.trim_end_matches('=')))
        .map_err(|_| PolymarketError::Credentials("api secret is not valid base64".into()))?;

    let mut mac = HmacSha256::new_from_slice(&key)
        .map_err(|err| PolymarketError::Signature(err.to_string()))?;
    mac.update(timestamp.as_bytes());
    mac.update(method.as_bytes());
    mac.update(path.as_bytes());
    if let Some(payload) = body {
        mac.update(payload.as_bytes());
    }

    let signature = mac.finalize().into_bytes();
    Ok(URL_SAFE.encode(signature))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pm_core::config::SecretString;

    // Well-known development key (hardhat account #0).
    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const TEST_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
    const TEST_SECRET: &str = "cG9seW1hcmtldC10ZXN0LXNlY3JldC1rZXktYnl0ZXM=";

    #[test]
    fn signer_accepts_keys_with_and_without_prefix() {
        let with_prefix = WalletSigner::from_private_key(TEST_KEY, 137).unwrap();
        let without_prefix = WalletSigner::from_private_key(&TEST_KEY[2..], 137).unwrap();
        assert_eq!(with_prefix.address(), without_prefix.address());
        assert_eq!(with_prefix.address().to_checksum(None), TEST_ADDRESS);
    }

    #[test]
    fn malformed_keys_are_credential_errors() {
        let zero_key = "0".repeat(64);
        for key in ["", "0x1234", "not-hex-at-all", zero_key.as_str()] {
            let err = WalletSigner::from_private_key(key, 137).unwrap_err();
            assert!(matches!(err, PolymarketError::Credentials(_)), "{key}: {err}");
        }
    }

    #[test]
    fn debug_output_hides_the_key() {
        let signer = WalletSigner::from_private_key(TEST_KEY, 137).unwrap();
        let rendered = format!("{signer:?}");
        assert!(!rendered.contains(&TEST_KEY[2..]));
        assert!(!rendered.contains("ac0974bec39a17e3"));
    }

    #[test]
    fn l2_signature_matches_known_vectors() {
        let with_body = sign_l2_request(
            TEST_SECRET,
            "1700000000",
            "POST",
            "/order",
            Some(r#"{"orderID":"0xabc"}"#),
        )
        .unwrap();
        assert_eq!(with_body, "a-k73QLuudfdkoC48p8QywAVUbQ_9iOvu5efUBx_c_Y=");

        let without_body =
            sign_l2_request(TEST_SECRET, "1700000000", "GET", "/auth/api-keys", None).unwrap();
        assert_eq!(without_body, "aFGEN1dDjm0I8Bbr6XcDuj8zi_6-q9mayG-atvgy8YE=");
    }

    #[test]
    fn l2_signature_rejects_garbage_secret() {
        let err = sign_l2_request("***not base64***", "1", "GET", "/", None).unwrap_err();
        assert!(matches!(err, PolymarketError::Credentials(_)));
    }

    #[test]
    fn l1_headers_carry_a_recoverable_signature() {
        let signer = WalletSigner::from_private_key(TEST_KEY, 137).unwrap();
        let headers = signer.l1_headers(1_700_000_000, 0).unwrap();

        assert_eq!(headers[&POLY_ADDRESS], TEST_ADDRESS);
        assert_eq!(headers[&POLY_TIMESTAMP], "1700000000");
        assert_eq!(headers[&POLY_NONCE], "0");

        let signature = headers[&POLY_SIGNATURE].to_str().unwrap();
        assert!(signature.starts_with("0x"));
        assert_eq!(signature.len(), 2 + 65 * 2);

        let raw: alloy::primitives::Signature = signature.parse().unwrap();
        let digest = clob_auth_digest(signer.address(), "1700000000", 0, 137);
        assert_eq!(
            raw.recover_address_from_prehash(&digest).unwrap(),
            signer.address()
        );
    }

    #[test]
    fn l2_headers_include_api_key_and_passphrase() {
        let signer = WalletSigner::from_private_key(TEST_KEY, 137).unwrap();
        let credentials = ClobApiCredentials {
            api_key: "key-123".into(),
            secret: SecretString::new(TEST_SECRET),
            passphrase: SecretString::new("phrase"),
        };

        let headers = signer
            .l2_headers(&credentials, 1_700_000_000, "GET", "/auth/api-keys", None)
            .unwrap();
        assert_eq!(headers[&POLY_API_KEY], "key-123");
        assert_eq!(headers[&POLY_PASSPHRASE], "phrase");
        assert_eq!(
            headers[&POLY_SIGNATURE],
            "aFGEN1dDjm0I8Bbr6XcDuj8zi_6-q9mayG-atvgy8YE="
        );
    }
}
