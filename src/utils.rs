//! Field encoding, hashing and hex helpers shared by every component.

use anyhow::Result;
use halo2_gadgets::poseidon::primitives::{
    self as poseidon, ConstantLength, P128Pow5T3 as PoseidonSpec,
};
use pasta_curves::group::ff::{FromUniformBytes, PrimeField};
use pasta_curves::pallas;
use sha3::{Digest, Sha3_512};

/// Size in bytes of a canonically encoded field element.
pub const FIELD_BYTES: usize = 32;

/// Domain tag for hashing external messages into the field.
pub const DOMAIN_MESSAGE: &[u8] = b"zkp-group-membership/v1/external-message";

fn is_valid_hex_string(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_hexdigit())
}

fn strip_hex_prefix(input: &str) -> &str {
    input
        .trim()
        .strip_prefix("0x")
        .or_else(|| input.trim().strip_prefix("0X"))
        .unwrap_or_else(|| input.trim())
}

/// Validates and strips hex prefix from a string.
///
/// # Errors
/// Returns an error if:
/// - The hex string has incorrect length
/// - The hex string contains non-hex characters
///
/// # Examples
///
/// ```
/// use zkp_group_membership::utils::validate_and_strip_hex;
///
/// let result = validate_and_strip_hex("0x1234abcd", 8).unwrap();
/// assert_eq!(result, "1234abcd");
/// ```
pub fn validate_and_strip_hex(input: &str, expected_len: usize) -> Result<String> {
    let stripped = strip_hex_prefix(input);

    if stripped.len() != expected_len {
        return Err(anyhow::anyhow!(
            "Invalid hex string: must be {} characters (got {})",
            expected_len,
            stripped.len()
        ));
    }

    if !is_valid_hex_string(stripped) {
        return Err(anyhow::anyhow!(
            "Invalid hex string: contains non-hex characters"
        ));
    }

    Ok(stripped.to_string())
}

/// Decodes a canonical 32-byte little-endian encoding into a field element.
///
/// Returns `None` when the bytes encode a value outside the field.
#[inline]
#[must_use]
pub fn bytes_to_field(bytes: &[u8; FIELD_BYTES]) -> Option<pallas::Base> {
    Option::from(pallas::Base::from_repr(*bytes))
}

/// Canonical 32-byte little-endian encoding of a field element.
#[inline]
#[must_use]
pub fn field_to_bytes(field: pallas::Base) -> [u8; FIELD_BYTES] {
    field.to_repr()
}

#[must_use]
pub fn field_to_hex(field: pallas::Base) -> String {
    hex::encode(field_to_bytes(field))
}

/// Parses a 64-character hex string (optional `0x`) into a field element.
///
/// # Errors
/// Fails on malformed hex or a non-canonical encoding.
pub fn field_from_hex(input: &str) -> Result<pallas::Base> {
    let stripped = validate_and_strip_hex(input, FIELD_BYTES * 2)?;
    let mut bytes = [0u8; FIELD_BYTES];
    hex::decode_to_slice(&stripped, &mut bytes)?;
    bytes_to_field(&bytes)
        .ok_or_else(|| anyhow::anyhow!("Value {stripped} is not a canonical field element"))
}

/// Poseidon hash of two field elements using the `P128Pow5T3` specification.
///
/// This is the same permutation the circuit enforces through the Poseidon chip,
/// so native and in-circuit results agree.
///
/// ```
/// use zkp_group_membership::utils::poseidon_hash;
/// use pasta_curves::pallas;
///
/// let a = poseidon_hash(pallas::Base::from(1), pallas::Base::from(2));
/// let b = poseidon_hash(pallas::Base::from(2), pallas::Base::from(1));
/// assert_ne!(a, b);
/// ```
#[inline]
#[must_use]
pub fn poseidon_hash(left: pallas::Base, right: pallas::Base) -> pallas::Base {
    let inputs = [left, right];
    poseidon::Hash::<_, PoseidonSpec, ConstantLength<2>, 3, 2>::init().hash(inputs)
}

/// Hashes arbitrary bytes to a uniformly distributed field element.
///
/// SHA3-512 over a length-prefixed domain tag and a length-prefixed input,
/// followed by a wide reduction of the 64-byte digest.
#[must_use]
pub fn hash_to_field(domain: &[u8], input: &[u8]) -> pallas::Base {
    let mut hasher = Sha3_512::new();
    hasher.update((domain.len() as u64).to_le_bytes());
    hasher.update(domain);
    hasher.update((input.len() as u64).to_le_bytes());
    hasher.update(input);
    let digest = hasher.finalize();

    let mut wide = [0u8; 64];
    wide.copy_from_slice(&digest);
    pallas::Base::from_uniform_bytes(&wide)
}

/// Field element that binds a proof to an external message.
#[inline]
#[must_use]
pub fn hash_message(message: &[u8]) -> pallas::Base {
    hash_to_field(DOMAIN_MESSAGE, message)
}

/// Serde adapter storing a field element as a lowercase hex string.
pub mod hex_field {
    use pasta_curves::pallas;
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &pallas::Base, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::field_to_hex(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<pallas::Base, D::Error> {
        let raw = String::deserialize(d)?;
        super::field_from_hex(&raw).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pasta_curves::group::ff::Field;

    #[test]
    fn test_validate_and_strip_hex_prefixes() {
        for input in ["0x1234abcd", "0X1234abcd", "  1234abcd  "] {
            assert_eq!(validate_and_strip_hex(input, 8).unwrap(), "1234abcd");
        }
    }

    #[test]
    fn test_validate_and_strip_hex_rejects_malformed() {
        let err = validate_and_strip_hex("0x1234abcd", 64).unwrap_err();
        assert!(err.to_string().contains("must be 64 characters"));
        assert!(validate_and_strip_hex("0x1234xyzw", 8).is_err());
    }

    #[test]
    fn test_field_hex_encoding_is_canonical() {
        let value = pallas::Base::from(0xdead_beef_u64);
        let encoded = field_to_hex(value);
        assert_eq!(encoded.len(), 64);
        assert_eq!(field_from_hex(&encoded).unwrap(), value);
        assert_eq!(field_from_hex(&format!("0x{encoded}")).unwrap(), value);
    }

    #[test]
    fn test_non_canonical_bytes_rejected() {
        // 2^256 - 1 is far above the Pallas modulus.
        assert!(bytes_to_field(&[0xff; 32]).is_none());
        assert!(field_from_hex(&"ff".repeat(32)).is_err());
    }

    #[test]
    fn test_hash_to_field_domain_separation() {
        let a = hash_to_field(b"domain-a", b"input");
        let b = hash_to_field(b"domain-b", b"input");
        assert_ne!(a, b);
        assert_eq!(a, hash_to_field(b"domain-a", b"input"));
    }

    #[test]
    fn test_hash_to_field_length_prefix() {
        // Moving bytes between tag and input must change the output.
        let a = hash_to_field(b"ab", b"c");
        let b = hash_to_field(b"a", b"bc");
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_message_single_bit_flip() {
        let original = hash_message(b"Hello world");
        let flipped = hash_message(b"Hello worle");
        assert_ne!(original, flipped);
        assert_ne!(original, pallas::Base::ZERO);
    }
}
