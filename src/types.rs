//! Proof bundle exchanged between the prover and verifier binaries.

use crate::config::SecurityConfig;
use crate::proof::{Proof, PublicSignals};
use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Serialized proof output.
///
/// Carries only public data. The leaf index, siblings and identity secrets
/// stay with the prover.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofBundle {
    /// Root, nullifier hash and external message hash, hex encoded.
    pub public_signals: PublicSignals,
    /// Halo2 proof transcript as a hex string.
    pub proof: String,
    /// Unix timestamp when the proof was generated
    pub timestamp: u64,
}

fn now_secs() -> Result<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| anyhow::anyhow!("System clock unavailable: {}", e))
}

impl ProofBundle {
    pub fn new(proof: &Proof, public_signals: PublicSignals) -> Result<Self> {
        Ok(Self {
            public_signals,
            proof: hex::encode(proof.as_bytes()),
            timestamp: now_secs()?,
        })
    }

    /// Decodes the proof bytes.
    pub fn proof(&self) -> Result<Proof> {
        let bytes = hex::decode(&self.proof).context("Invalid proof hex")?;
        Ok(Proof::from_bytes(bytes))
    }

    /// Validates the bundle structure before any cryptographic check.
    ///
    /// # Errors
    /// Returns an error if:
    /// - the proof is empty, not hex, or larger than `max_proof_size` bytes
    /// - the timestamp is too far in the future or older than the allowed age
    pub fn validate(&self, security: &SecurityConfig, max_proof_size: usize) -> Result<()> {
        debug!("Starting proof bundle validation");
        debug!("Proof hex length: {}", self.proof.len());
        debug!("Timestamp: {}", self.timestamp);

        if self.proof.is_empty() {
            return Err(anyhow::anyhow!(
                "ZK proof cannot be empty. The proof data is missing."
            ));
        }

        let proof = self.proof()?;
        if proof.len() > max_proof_size {
            return Err(anyhow::anyhow!(
                "ZK proof size exceeds limit: {} bytes (max {} bytes). The proof may be malformed or generated with incompatible parameters.",
                proof.len(),
                max_proof_size
            ));
        }

        let current_timestamp = now_secs()?;
        debug!("Current timestamp: {}", current_timestamp);

        if self.timestamp > current_timestamp + security.timestamp_tolerance_secs {
            return Err(anyhow::anyhow!(
                "Timestamp is too far in the future: {} (current: {}, tolerance: {}s). Please check system clock and proof timestamp.",
                self.timestamp,
                current_timestamp,
                security.timestamp_tolerance_secs
            ));
        }

        if current_timestamp > self.timestamp + security.timestamp_max_age_secs {
            return Err(anyhow::anyhow!(
                "Timestamp is too old: {} (current: {}, max age: {}s). This proof may be expired. Please generate a fresh proof.",
                self.timestamp,
                current_timestamp,
                security.timestamp_max_age_secs
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pasta_curves::pallas;

    fn signals() -> PublicSignals {
        PublicSignals {
            root: pallas::Base::from(1),
            nullifier_hash: pallas::Base::from(2),
            external_message_hash: pallas::Base::from(3),
        }
    }

    #[test]
    fn test_json_shape() {
        let bundle = ProofBundle::new(&Proof::from_bytes(vec![1, 2, 3]), signals()).unwrap();
        let json = serde_json::to_value(&bundle).unwrap();
        assert_eq!(json["proof"], "010203");
        assert_eq!(json["public_signals"]["root"].as_str().unwrap().len(), 64);
        assert!(json.get("leaf_index").is_none());

        let parsed: ProofBundle = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.public_signals, signals());
        assert_eq!(parsed.proof().unwrap().as_bytes(), &[1, 2, 3]);
    }

    #[test]
    fn test_validate_accepts_fresh_bundle() {
        let bundle = ProofBundle::new(&Proof::from_bytes(vec![7; 16]), signals()).unwrap();
        assert!(bundle.validate(&SecurityConfig::default(), 1024).is_ok());
    }

    #[test]
    fn test_validate_rejects_oversized_proof() {
        let bundle = ProofBundle::new(&Proof::from_bytes(vec![7; 64]), signals()).unwrap();
        let err = bundle.validate(&SecurityConfig::default(), 32).unwrap_err();
        assert!(err.to_string().contains("exceeds limit"));
    }

    #[test]
    fn test_validate_rejects_expired_bundle() {
        let mut bundle = ProofBundle::new(&Proof::from_bytes(vec![7; 16]), signals()).unwrap();
        bundle.timestamp = 1_234_567_890;
        let err = bundle.validate(&SecurityConfig::default(), 1024).unwrap_err();
        assert!(err.to_string().contains("too old"));
    }

    #[test]
    fn test_validate_rejects_future_bundle() {
        let mut bundle = ProofBundle::new(&Proof::from_bytes(vec![7; 16]), signals()).unwrap();
        bundle.timestamp += 10 * 86_400;
        let err = bundle.validate(&SecurityConfig::default(), 1024).unwrap_err();
        assert!(err.to_string().contains("future"));
    }

    #[test]
    fn test_validate_rejects_empty_proof() {
        let mut bundle = ProofBundle::new(&Proof::from_bytes(vec![7; 16]), signals()).unwrap();
        bundle.proof.clear();
        assert!(bundle.validate(&SecurityConfig::default(), 1024).is_err());
    }

    #[test]
    fn test_non_canonical_signal_rejected() {
        let json = format!(
            r#"{{"public_signals":{{"root":"{}","nullifier_hash":"{}","external_message_hash":"{}"}},"proof":"00","timestamp":0}}"#,
            "ff".repeat(32),
            "00".repeat(32),
            "00".repeat(32)
        );
        assert!(serde_json::from_str::<ProofBundle>(&json).is_err());
    }
}
