//! Greeting board: records anonymous greetings accepted by the verifier.
//!
//! Consumers poll with a cursor instead of subscribing to callbacks. Events are
//! returned in acceptance order and re-polling the same cursor returns the
//! same events.

use crate::error::Result;
use crate::group::MembershipGroup;
use crate::proof::{Proof, PublicSignals};
use crate::utils::field_to_hex;
use crate::verifier::Verifier;
use log::info;
use pasta_curves::pallas;
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GreetingEvent {
    pub sequence: u64,
    pub message: String,
    pub nullifier_hash: pallas::Base,
}

pub struct GreetingBoard {
    group: Arc<MembershipGroup>,
    verifier: Verifier,
    events: RwLock<Vec<GreetingEvent>>,
}

impl GreetingBoard {
    #[must_use]
    pub fn new(group: Arc<MembershipGroup>, verifier: Verifier) -> Self {
        Self {
            group,
            verifier,
            events: RwLock::new(Vec::new()),
        }
    }

    /// Verifies the greeting against the group's current root and records it.
    ///
    /// Returns the sequence number of the new event. Any verification failure
    /// is returned unchanged and nothing is recorded.
    pub fn greet(&self, message: &str, proof: &Proof, signals: &PublicSignals) -> Result<u64> {
        let root = self.group.root();
        self.verifier.verify(proof, signals, root, message.as_bytes())?;

        let mut events = self.events.write().unwrap_or_else(PoisonError::into_inner);
        let sequence = events.len() as u64;
        events.push(GreetingEvent {
            sequence,
            message: message.to_string(),
            nullifier_hash: signals.nullifier_hash,
        });

        info!(
            "Greeting #{sequence} recorded (nullifier {})",
            field_to_hex(signals.nullifier_hash)
        );
        Ok(sequence)
    }

    /// Events with `sequence >= cursor`, oldest first.
    #[must_use]
    pub fn events_since(&self, cursor: u64) -> Vec<GreetingEvent> {
        let events = self.events.read().unwrap_or_else(PoisonError::into_inner);
        let start = usize::try_from(cursor).unwrap_or(usize::MAX).min(events.len());
        events[start..].to_vec()
    }

    /// Most recent greeting, if any.
    #[must_use]
    pub fn latest(&self) -> Option<GreetingEvent> {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}
