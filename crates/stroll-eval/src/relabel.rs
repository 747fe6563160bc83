//! Keyed pseudo-random relabeling of capture identifiers.
//!
//! A [`Relabeler`] holds a 256-bit salt drawn once per split and maps
//! `(class_id, id)` to the low-order bytes of `BLAKE3-keyed(salt, class_id || id)`.
//! The mapping is deterministic for one salt and unpredictable across salts.
//!
//! Truncation makes collisions possible. [`relabel_captures`] checks that the
//! mapping is injective over the captures it relabels and redraws the salt
//! when it is not, so two captures never merge under one id.

use std::collections::{HashMap, HashSet};

use rand::{CryptoRng, RngCore};
use stroll_core::constants::{MAX_RELABEL_ATTEMPTS, RELABEL_ID_BYTES};
use stroll_core::error::SplitError;
use stroll_core::types::{CaptureKey, ClassId};
use tracing::debug;

/// Keyed pseudo-random function over capture keys.
#[derive(Clone)]
pub struct Relabeler {
    salt: [u8; 32],
    id_bytes: usize,
}

impl Relabeler {
    /// Draw a fresh salt. Ids are [`RELABEL_ID_BYTES`] wide.
    pub fn from_rng<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut salt = [0u8; 32];
        rng.fill_bytes(&mut salt);
        Self {
            salt,
            id_bytes: RELABEL_ID_BYTES,
        }
    }

    /// Keep `id_bytes` bytes of the hash, clamped to `1..=8`.
    pub fn with_id_bytes(mut self, id_bytes: usize) -> Self {
        self.id_bytes = id_bytes.clamp(1, 8);
        self
    }

    /// New label for `(class_id, id)`.
    pub fn label(&self, class_id: ClassId, id: u64) -> u64 {
        let mut message = [0u8; 12];
        message[..4].copy_from_slice(&class_id.to_le_bytes());
        message[4..].copy_from_slice(&id.to_le_bytes());
        let hash = blake3::keyed_hash(&self.salt, &message);

        let mut low = [0u8; 8];
        low[..self.id_bytes].copy_from_slice(&hash.as_bytes()[..self.id_bytes]);
        u64::from_le_bytes(low)
    }
}

impl std::fmt::Debug for Relabeler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The salt is never printed.
        f.debug_struct("Relabeler")
            .field("id_bytes", &self.id_bytes)
            .finish_non_exhaustive()
    }
}

/// Assign a distinct pseudo-random label to each of the distinct `keys`.
///
/// Tries up to [`MAX_RELABEL_ATTEMPTS`] salts; fails with
/// [`SplitError::RelabelCollision`] if every one of them collides.
pub fn relabel_captures<R: RngCore + CryptoRng>(
    keys: &[CaptureKey],
    rng: &mut R,
    id_bytes: usize,
) -> Result<HashMap<CaptureKey, u64>, SplitError> {
    for attempt in 1..=MAX_RELABEL_ATTEMPTS {
        let relabeler = Relabeler::from_rng(rng).with_id_bytes(id_bytes);
        let mut seen = HashSet::with_capacity(keys.len());
        let mut mapping = HashMap::with_capacity(keys.len());
        let injective = keys.iter().all(|key| {
            let label = relabeler.label(key.class_id, key.repetition_id);
            mapping.insert(*key, label);
            seen.insert(label)
        });
        if injective {
            return Ok(mapping);
        }
        debug!(attempt, keys = keys.len(), "relabel collision, redrawing salt");
    }
    Err(SplitError::RelabelCollision {
        attempts: MAX_RELABEL_ATTEMPTS,
    })
}
