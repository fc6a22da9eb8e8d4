//! Minimal EIP-712 encoding helpers shared by API-key auth and order signing.

use alloy::primitives::{keccak256, Address, B256, U256};

const DOMAIN_TYPE: &str = "EIP712Domain(string name,string version,uint256 chainId)";
const DOMAIN_TYPE_WITH_CONTRACT: &str =
    "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

/// keccak256(typeHash || name || version || chainId [|| verifyingContract])
pub fn domain_separator(
    name: &str,
    version: &str,
    chain_id: u64,
    verifying_contract: Option<Address>,
) -> B256 {
    let type_string = match verifying_contract {
        Some(_) => DOMAIN_TYPE_WITH_CONTRACT,
        None => DOMAIN_TYPE,
    };

    let mut encoded = Vec::with_capacity(32 * 5);
    encoded.extend_from_slice(keccak256(type_string.as_bytes()).as_slice());
    encoded.extend_from_slice(keccak256(name.as_bytes()).as_slice());
    encoded.extend_from_slice(keccak256(version.as_bytes()).as_slice());
    encoded.extend_from_slice(&encode_u256(U256::from(chain_id)));
    if let Some(contract) = verifying_contract {
        encoded.extend_from_slice(&encode_address(contract));
    }

    keccak256(&encoded)
}

/// keccak256("\x19\x01" || domainSeparator || structHash)
pub fn typed_data_digest(domain_separator: B256, struct_hash: B256) -> B256 {
    let mut message = Vec::with_capacity(66);
    message.extend_from_slice(b"\x19\x01");
    message.extend_from_slice(domain_separator.as_slice());
    message.extend_from_slice(struct_hash.as_slice());
    keccak256(&message)
}

pub fn encode_u256(value: U256) -> [u8; 32] {
    value.to_be_bytes::<32>()
}

pub fn encode_address(address: Address) -> [u8; 32] {
    address.into_word().0
}

pub fn encode_u8(value: u8) -> [u8; 32] {
    let mut buf = [0u8; 32];
    buf[31] = value;
    buf
}

pub fn encode_string(value: &str) -> [u8; 32] {
    keccak256(value.as_bytes()).0
}
