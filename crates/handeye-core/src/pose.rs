//! Ordered, undoable storage of captured pose pairs.
//!
//! Each [`PosePair`] holds the two absolute poses observed at the same
//! logical instant:
//! - `pose_a`: the mechanism chain (e.g. base -> tip),
//! - `pose_b`: the sensor chain (e.g. fiducial -> camera).
//!
//! The first stored pair is the calibration reference; every later pair is
//! turned into a relative motion against it (see [`crate::derive_all`]).

use crate::{validate_isometry, Iso3, PoseError};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Two absolute poses captured together.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PosePair {
    pub pose_a: Iso3,
    pub pose_b: Iso3,
}

impl PosePair {
    /// Create a pair after checking both poses are rigid transforms.
    pub fn new(pose_a: Iso3, pose_b: Iso3) -> Result<Self, PoseError> {
        validate_isometry(&pose_a)?;
        validate_isometry(&pose_b)?;
        Ok(Self { pose_a, pose_b })
    }
}

/// Append/undo-only collection of pose pairs in capture order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PosePairStore {
    pairs: Vec<PosePair>,
}

impl PosePairStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from already captured pairs, validating each of them.
    pub fn from_pairs(pairs: Vec<PosePair>) -> Result<Self, PoseError> {
        for pair in &pairs {
            validate_isometry(&pair.pose_a)?;
            validate_isometry(&pair.pose_b)?;
        }
        Ok(Self { pairs })
    }

    /// Append a new pair at the end. Invalid poses leave the store unchanged.
    pub fn append(&mut self, pose_a: Iso3, pose_b: Iso3) -> Result<(), PoseError> {
        let pair = PosePair::new(pose_a, pose_b)?;
        self.pairs.push(pair);
        debug!("pose pair #{} stored", self.pairs.len());
        Ok(())
    }

    /// Remove the most recently appended pair.
    ///
    /// Returns `None` (and logs a warning) when the store is empty.
    pub fn remove_last(&mut self) -> Option<PosePair> {
        let removed = self.pairs.pop();
        if removed.is_none() {
            warn!("no pose pair to remove; store is empty");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Immutable snapshot of the stored pairs in capture order.
    pub fn pairs(&self) -> &[PosePair] {
        &self.pairs
    }

    pub fn iter(&self) -> impl Iterator<Item = &PosePair> {
        self.pairs.iter()
    }

    pub fn into_pairs(self) -> Vec<PosePair> {
        self.pairs
    }
}
