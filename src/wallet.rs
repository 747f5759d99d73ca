//! Ethereum wallet adapter producing identity seeds.
//!
//! An identity seed is the EIP-191 signature of [`IDENTITY_SIGNING_MESSAGE`].
//! ECDSA signing in `ethers` is deterministic (RFC 6979), so the same key
//! always yields the same seed and therefore the same identity.

use crate::identity::{Identity, IDENTITY_SIGNING_MESSAGE};
use crate::utils::validate_and_strip_hex;
use anyhow::{Context, Result};
use ethers::signers::{LocalWallet, Signer};
use ethers::utils::hash_message;

/// Expected length of an Ethereum private key in hex characters (excluding 0x prefix)
pub const PRIVATE_KEY_HEX_LENGTH: usize = 64;

/// Validates an Ethereum private key.
///
/// # Errors
///
/// Returns an error if:
/// - The private key is not exactly 64 hex characters (excluding 0x prefix)
/// - The private key contains non-hex characters
/// - The private key is all zeros
///
/// # Examples
///
/// ```
/// use zkp_group_membership::wallet::validate_private_key;
///
/// assert!(validate_private_key("0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318").is_ok());
/// assert!(validate_private_key("0x0000000000000000000000000000000000000000000000000000000000000000").is_err());
/// ```
pub fn validate_private_key(private_key: &str) -> Result<String> {
    let stripped = validate_and_strip_hex(private_key, PRIVATE_KEY_HEX_LENGTH)?;

    if stripped.chars().all(|c| c == '0') {
        return Err(anyhow::anyhow!(
            "Private key cannot be all zeros. Please provide a valid private key."
        ));
    }

    Ok(stripped)
}

/// Parses a validated private key into a wallet.
pub fn wallet_from_private_key(private_key: &str) -> Result<LocalWallet> {
    let stripped = validate_private_key(private_key)?;
    stripped
        .parse::<LocalWallet>()
        .context("Failed to parse private key")
}

/// Signs the identity message, returning the 65-byte signature used as seed.
pub fn sign_identity_message(wallet: &LocalWallet) -> Result<Vec<u8>> {
    let digest = hash_message(IDENTITY_SIGNING_MESSAGE);
    let signature = wallet
        .sign_hash(digest)
        .context("Failed to sign identity message")?;
    Ok(signature.to_vec())
}

/// Derives the identity controlled by `private_key`.
pub fn identity_from_private_key(private_key: &str) -> Result<Identity> {
    let wallet = wallet_from_private_key(private_key)?;
    let seed = sign_identity_message(&wallet)?;
    let identity = Identity::from_seed(&seed).context("Failed to derive identity")?;
    log::debug!("Derived identity for wallet {:?}", wallet.address());
    Ok(identity)
}
