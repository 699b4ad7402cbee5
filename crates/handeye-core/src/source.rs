//! Pose acquisition collaborator.
//!
//! The calibration core never talks to a transform tree directly. A
//! [`PoseSource`] answers "where is `child` in `parent` at time `stamp`",
//! waiting at most `timeout` for the answer.

use crate::Iso3;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::time::{Duration, SystemTime};
use thiserror::Error;

/// Named parent/child frames of one tracked chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FramePair {
    pub parent: String,
    pub child: String,
}

impl FramePair {
    pub fn new(parent: impl Into<String>, child: impl Into<String>) -> Self {
        Self {
            parent: parent.into(),
            child: child.into(),
        }
    }
}

impl fmt::Display for FramePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.parent, self.child)
    }
}

/// Failure to obtain a pose. Always recoverable for the caller.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AcquisitionError {
    #[error("timed out after {timeout:?} waiting for transform {frames}")]
    Timeout { frames: FramePair, timeout: Duration },
    #[error("transform {frames} unavailable: {reason}")]
    Unavailable { frames: FramePair, reason: String },
}

/// Source of absolute poses for named frame pairs.
pub trait PoseSource {
    /// Look up the pose of `frames.child` expressed in `frames.parent`.
    fn lookup_pose(
        &mut self,
        frames: &FramePair,
        stamp: SystemTime,
        timeout: Duration,
    ) -> Result<Iso3, AcquisitionError>;
}

/// Replays pre-recorded lookup results, one queue per frame pair.
///
/// Used to drive capture sessions from recorded data and in tests. An
/// exhausted or unknown queue reports [`AcquisitionError::Unavailable`].
#[derive(Debug, Clone, Default)]
pub struct ScriptedPoseSource {
    streams: HashMap<FramePair, VecDeque<Result<Iso3, AcquisitionError>>>,
}

impl ScriptedPoseSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful lookup result.
    pub fn push_pose(&mut self, frames: &FramePair, pose: Iso3) {
        self.push_result(frames, Ok(pose));
    }

    /// Queue an arbitrary lookup result (e.g. a timeout).
    pub fn push_result(&mut self, frames: &FramePair, result: Result<Iso3, AcquisitionError>) {
        self.streams
            .entry(frames.clone())
            .or_default()
            .push_back(result);
    }

    /// Number of queued results for a frame pair.
    pub fn remaining(&self, frames: &FramePair) -> usize {
        self.streams.get(frames).map_or(0, VecDeque::len)
    }
}

impl PoseSource for ScriptedPoseSource {
    fn lookup_pose(
        &mut self,
        frames: &FramePair,
        _stamp: SystemTime,
        _timeout: Duration,
    ) -> Result<Iso3, AcquisitionError> {
        self.streams
            .get_mut(frames)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| {
                Err(AcquisitionError::Unavailable {
                    frames: frames.clone(),
                    reason: "no recorded pose left".to_string(),
                })
            })
    }
}
