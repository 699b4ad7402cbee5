//! Interactive capture session.
//!
//! The operator moves the robot, then issues commands one at a time:
//! capture a pose pair, undo the last capture, or finalize (estimate,
//! report, persist). The session owns the pose-pair store and keeps the
//! relative motions in sync with it.

use crate::config::HandEyeConfig;
use crate::error::{IoError, SessionError};
use crate::estimator::{solve, CalibrationEstimate};
use crate::io::{read_pose_pairs, write_calibration, write_pose_pairs};
use crate::report::{CalibrationRecord, CalibrationReport};
use handeye_core::{
    assess_motions, derive_all, MotionQualityOptions, PosePair, PosePairStore, PoseSource,
    RelativeMotion,
};
use log::{info, warn};
use std::path::Path;
use std::str::FromStr;
use std::time::SystemTime;

/// Operator command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    Capture,
    Undo,
    Finalize,
}

impl SessionCommand {
    /// Key bindings: `s` capture, `d` undo, `q` finalize (case-insensitive).
    pub fn from_key(key: char) -> Option<Self> {
        match key.to_ascii_lowercase() {
            's' => Some(Self::Capture),
            'd' => Some(Self::Undo),
            'q' => Some(Self::Finalize),
            _ => None,
        }
    }
}

impl FromStr for SessionCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let mut chars = s.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if let Some(cmd) = Self::from_key(c) {
                return Ok(cmd);
            }
        }
        match s.to_ascii_lowercase().as_str() {
            "capture" => Ok(Self::Capture),
            "undo" => Ok(Self::Undo),
            "finalize" => Ok(Self::Finalize),
            _ => Err(format!("unknown command '{s}' (expected s, d or q)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureOutcome {
    /// Stored pairs after the capture.
    pub num_pairs: usize,
    /// Whether the pair file was rewritten successfully.
    pub persisted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FinalizeOutcome {
    pub estimate: CalibrationEstimate,
    pub report: CalibrationReport,
    /// Whether the result file was written successfully.
    pub persisted: bool,
}

/// Result of [`CaptureSession::handle`].
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Captured(CaptureOutcome),
    Undone(Option<PosePair>),
    Finalized(Box<FinalizeOutcome>),
}

#[derive(Debug)]
pub struct CaptureSession<S: PoseSource> {
    source: S,
    config: HandEyeConfig,
    store: PosePairStore,
    motions: Vec<RelativeMotion>,
    finalized: bool,
}

impl<S: PoseSource> CaptureSession<S> {
    pub fn new(source: S, config: HandEyeConfig) -> Self {
        Self {
            source,
            config,
            store: PosePairStore::new(),
            motions: Vec::new(),
            finalized: false,
        }
    }

    pub fn config(&self) -> &HandEyeConfig {
        &self.config
    }

    pub fn store(&self) -> &PosePairStore {
        &self.store
    }

    /// Relative motions of the current store contents.
    pub fn motions(&self) -> &[RelativeMotion] {
        &self.motions
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn into_source(self) -> S {
        self.source
    }

    pub fn handle(&mut self, command: SessionCommand) -> Result<SessionEvent, SessionError> {
        match command {
            SessionCommand::Capture => self.capture().map(SessionEvent::Captured),
            SessionCommand::Undo => self.undo().map(SessionEvent::Undone),
            SessionCommand::Finalize => self
                .finalize()
                .map(|outcome| SessionEvent::Finalized(Box::new(outcome))),
        }
    }

    /// Look up both chains and append the pair.
    ///
    /// A failed lookup leaves the store untouched. A failure to rewrite the
    /// pair file is logged and reported but keeps the capture.
    pub fn capture(&mut self) -> Result<CaptureOutcome, SessionError> {
        self.ensure_open()?;

        let stamp = SystemTime::now();
        let timeout = self.config.lookup_timeout();
        let stream_a = self.config.frames.stream_a();
        let stream_b = self.config.frames.stream_b();

        let pose_b = self.source.lookup_pose(&stream_b, stamp, timeout);
        let pose_a = self.source.lookup_pose(&stream_a, stamp, timeout);
        let (pose_a, pose_b) = match (pose_a, pose_b) {
            (Ok(a), Ok(b)) => (a, b),
            (Err(err), _) | (_, Err(err)) => {
                warn!("capture skipped: {err}");
                return Err(err.into());
            }
        };

        self.store.append(pose_a, pose_b)?;
        self.motions = derive_all(self.store.pairs());
        info!("pose pair #{} captured", self.store.len());

        let persisted = persist(write_pose_pairs(
            &self.config.pairs_record_file,
            self.store.pairs(),
        ));
        Ok(CaptureOutcome {
            num_pairs: self.store.len(),
            persisted,
        })
    }

    /// Drop the most recent pair, if any.
    pub fn undo(&mut self) -> Result<Option<PosePair>, SessionError> {
        self.ensure_open()?;
        let removed = self.store.remove_last();
        if removed.is_some() {
            self.motions = derive_all(self.store.pairs());
            info!("last pose pair removed, {} left", self.store.len());
        }
        Ok(removed)
    }

    /// Estimate, report and persist the calibration, then close the session.
    ///
    /// If the estimation fails the session stays open so more pairs can be
    /// captured.
    pub fn finalize(&mut self) -> Result<FinalizeOutcome, SessionError> {
        self.ensure_open()?;
        let outcome = calibrate_motions(&self.motions, &self.config)?;
        self.finalized = true;
        Ok(outcome)
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.finalized {
            return Err(SessionError::AlreadyFinalized);
        }
        Ok(())
    }
}

fn persist(result: Result<(), IoError>) -> bool {
    match result {
        Ok(()) => true,
        Err(err) => {
            warn!("{err}");
            false
        }
    }
}

fn calibrate_motions(
    motions: &[RelativeMotion],
    config: &HandEyeConfig,
) -> Result<FinalizeOutcome, SessionError> {
    if motions.len() < config.min_motions {
        warn!(
            "only {} motions available, at least {} are recommended",
            motions.len(),
            config.min_motions
        );
    }

    let quality = assess_motions(motions, &MotionQualityOptions::default());
    if quality.small_rotations > 0 {
        warn!(
            "{} of {} motions barely rotate and only constrain the translation",
            quality.small_rotations, quality.num_motions
        );
    }
    if !motions.is_empty() && !quality.is_rotation_observable() {
        warn!("rotation axes are (nearly) parallel, the rotation is poorly constrained");
    }

    let estimate = solve(motions, &config.estimator)?;
    let report = CalibrationReport::new(
        &estimate,
        config.frames.end_effector.as_str(),
        config.frames.camera.as_str(),
    );
    info!("calibration finished\n{report}");

    let persisted = persist(write_calibration(
        &config.result_file,
        &CalibrationRecord::from(&estimate),
    ));
    Ok(FinalizeOutcome {
        estimate,
        report,
        persisted,
    })
}

/// Offline calibration from a recorded pose-pair file.
pub fn calibrate_from_file(
    pairs_file: &Path,
    config: &HandEyeConfig,
) -> Result<FinalizeOutcome, SessionError> {
    let store = PosePairStore::from_pairs(read_pose_pairs(pairs_file)?)?;
    calibrate_motions(&derive_all(store.pairs()), config)
}
