//! Authentication and signing for Polymarket API
//!
//! Level 1: EIP-712 `ClobAuth` signature, used to derive API credentials.
//! Level 2: HMAC-SHA256 over each request, using those credentials.
//! Orders themselves carry an EIP-712 `Order` signature.

use crate::error::{BotError, Result};
use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, H160, H256, U256};
use ethers::utils::keccak256;
use hmac::{Hmac, Mac};
use sha2::Sha256;

// EIP-712 domain constants for CLOB auth
const CLOB_DOMAIN_NAME: &str = "ClobAuthDomain";
const CLOB_VERSION: &str = "1";
const CLOB_AUTH_MESSAGE: &str = "This message attests that I control the given wallet";

/// CTF exchange (0x4bFb41d5B3570DeFd03C39a9A4D8dE6Bd8B8982E)
const CTF_EXCHANGE: H160 = H160([
    0x4b, 0xfb, 0x41, 0xd5, 0xb3, 0x57, 0x0d, 0xef, 0xd0, 0x3c, 0x39, 0xa9, 0xa4, 0xd8, 0xde, 0x6b,
    0xd8, 0xb8, 0x98, 0x2e,
]);

/// Neg-risk CTF exchange (0xC5d563A36AE78145C45a50134d48A1215220f80a)
const NEG_RISK_CTF_EXCHANGE: H160 = H160([
    0xc5, 0xd5, 0x63, 0xa3, 0x6a, 0xe7, 0x81, 0x45, 0xc4, 0x5a, 0x50, 0x13, 0x4d, 0x48, 0xa1, 0x21,
    0x52, 0x20, 0xf8, 0x0a,
]);

/// Signer for Polymarket API authentication
#[derive(Clone)]
pub struct PolySigner {
    wallet: LocalWallet,
    chain_id: u64,
}

impl PolySigner {
    /// Create a new signer from a private key (hex string, with or without 0x prefix)
    pub fn from_private_key(private_key: &str, chain_id: u64) -> Result<Self> {
        let key_hex = private_key.trim_start_matches("0x");
        let wallet: LocalWallet = key_hex
            .parse()
            .map_err(|e| BotError::Auth(format!("Invalid private key: {}", e)))?;

        let wallet = wallet.with_chain_id(chain_id);

        Ok(Self { wallet, chain_id })
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    pub fn address_hex(&self) -> String {
        format!("{:?}", self.wallet.address())
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn sign_hash(&self, hash: H256) -> Result<String> {
        let signature = self
            .wallet
            .sign_hash(hash)
            .map_err(|e| BotError::Auth(format!("Signing failed: {}", e)))?;

        Ok(format!("0x{}", hex::encode(signature.to_vec())))
    }

    /// Sign the `ClobAuth` message for Level 1 headers
    pub fn sign_clob_auth(&self, timestamp: i64, nonce: u64) -> Result<String> {
        let domain_type_hash = keccak256(b"EIP712Domain(string name,string version,uint256 chainId)");
        let name_hash = keccak256(CLOB_DOMAIN_NAME.as_bytes());
        let version_hash = keccak256(CLOB_VERSION.as_bytes());

        let mut domain_data = Vec::with_capacity(32 * 4);
        domain_data.extend_from_slice(&domain_type_hash);
        domain_data.extend_from_slice(&name_hash);
        domain_data.extend_from_slice(&version_hash);
        domain_data.extend_from_slice(&u256_to_bytes32(U256::from(self.chain_id)));
        let domain_separator = keccak256(&domain_data);

        let struct_type_hash = keccak256(
            b"ClobAuth(address address,string timestamp,uint256 nonce,string message)",
        );
        let timestamp_hash = keccak256(timestamp.to_string().as_bytes());
        let message_hash = keccak256(CLOB_AUTH_MESSAGE.as_bytes());

        let mut struct_data = Vec::with_capacity(32 * 5);
        struct_data.extend_from_slice(&struct_type_hash);
        struct_data.extend_from_slice(&address_to_bytes32(self.wallet.address()));
        struct_data.extend_from_slice(&timestamp_hash);
        struct_data.extend_from_slice(&u256_to_bytes32(U256::from(nonce)));
        struct_data.extend_from_slice(&message_hash);
        let struct_hash = keccak256(&struct_data);

        self.sign_hash(eip712_digest(&domain_separator, &struct_hash))
    }

    /// Sign an order for submission to the CLOB
    pub fn sign_order(&self, order: &OrderSignData, neg_risk: bool) -> Result<String> {
        let exchange = if neg_risk {
            NEG_RISK_CTF_EXCHANGE
        } else {
            CTF_EXCHANGE
        };
        let domain_separator = self.exchange_domain_separator(exchange);
        let struct_hash = order_struct_hash(order);

        self.sign_hash(eip712_digest(&domain_separator, &struct_hash))
    }

    fn exchange_domain_separator(&self, exchange: Address) -> [u8; 32] {
        let type_hash = keccak256(
            b"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)",
        );
        let name_hash = keccak256(b"Polymarket CTF Exchange");
        let version_hash = keccak256(b"1");

        let mut data = Vec::with_capacity(32 * 5);
        data.extend_from_slice(&type_hash);
        data.extend_from_slice(&name_hash);
        data.extend_from_slice(&version_hash);
        data.extend_from_slice(&u256_to_bytes32(U256::from(self.chain_id)));
        data.extend_from_slice(&address_to_bytes32(exchange));

        keccak256(&data)
    }
}

fn eip712_digest(domain_separator: &[u8; 32], struct_hash: &[u8; 32]) -> H256 {
    let mut data = Vec::with_capacity(66);
    data.extend_from_slice(&[0x19, 0x01]);
    data.extend_from_slice(domain_separator);
    data.extend_from_slice(struct_hash);
    H256::from(keccak256(&data))
}

fn order_struct_hash(order: &OrderSignData) -> [u8; 32] {
    let type_hash = keccak256(
        b"Order(uint256 salt,address maker,address signer,address taker,uint256 tokenId,uint256 makerAmount,uint256 takerAmount,uint256 expiration,uint256 nonce,uint256 feeRateBps,uint8 side,uint8 signatureType)",
    );

    let mut data = Vec::with_capacity(32 * 13);
    data.extend_from_slice(&type_hash);
    data.extend_from_slice(&u256_to_bytes32(order.salt));
    data.extend_from_slice(&address_to_bytes32(order.maker));
    data.extend_from_slice(&address_to_bytes32(order.signer));
    data.extend_from_slice(&address_to_bytes32(order.taker));
    data.extend_from_slice(&u256_to_bytes32(order.token_id));
    data.extend_from_slice(&u256_to_bytes32(order.maker_amount));
    data.extend_from_slice(&u256_to_bytes32(order.taker_amount));
    data.extend_from_slice(&u256_to_bytes32(order.expiration));
    data.extend_from_slice(&u256_to_bytes32(order.nonce));
    data.extend_from_slice(&u256_to_bytes32(order.fee_rate_bps));
    data.extend_from_slice(&[0u8; 31]);
    data.push(order.side);
    data.extend_from_slice(&[0u8; 31]);
    data.push(order.signature_type);

    keccak256(&data)
}

fn u256_to_bytes32(value: U256) -> [u8; 32] {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    bytes
}

fn address_to_bytes32(addr: Address) -> [u8; 32] {
    let mut bytes = [0u8; 32];
    bytes[12..].copy_from_slice(addr.as_bytes());
    bytes
}

/// HMAC signature for Level 2 headers:
/// base64url(HMAC_SHA256(base64url_decode(secret), timestamp + method + path + body))
pub fn l2_signature(secret: &str, timestamp: i64, method: &str, path: &str, body: &str) -> Result<String> {
    let key = URL_SAFE
        .decode(secret)
        .map_err(|e| BotError::Auth(format!("Invalid API secret: {}", e)))?;

    let mut mac = Hmac::<Sha256>::new_from_slice(&key)
        .map_err(|e| BotError::Auth(format!("Invalid HMAC key: {}", e)))?;
    mac.update(format!("{}{}{}{}", timestamp, method, path, body).as_bytes());

    Ok(URL_SAFE.encode(mac.finalize().into_bytes()))
}

/// API credentials for CLOB authentication
#[derive(Debug, Clone)]
pub struct ApiCredentials {
    pub api_key: String,
    pub api_secret: String,
    pub api_passphrase: String,
}

/// Order data for signing
#[derive(Debug, Clone)]
pub struct OrderSignData {
    pub salt: U256,
    pub maker: Address,
    pub signer: Address,
    pub taker: Address,
    pub token_id: U256,
    pub maker_amount: U256,
    pub taker_amount: U256,
    pub expiration: U256,
    pub nonce: U256,
    pub fee_rate_bps: U256,
    pub side: u8,
    pub signature_type: u8,
}
