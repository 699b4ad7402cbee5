//! Session and estimator configuration.
//!
//! Every field has a default so a partial (or empty) JSON object is a valid
//! configuration.

use handeye_core::FramePair;
use handeye_optim::{RefineOptions, RobustKernel, SolveOptions};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Names of the four frames involved in a capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    pub base: String,
    pub end_effector: String,
    pub camera: String,
    pub marker: String,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            base: "/base_link".to_string(),
            end_effector: "/ee_fixed_link".to_string(),
            camera: "/camera_2_link".to_string(),
            marker: "/camera_2/ar_marker_0".to_string(),
        }
    }
}

impl FrameConfig {
    /// Chain A: end effector in the robot base.
    pub fn stream_a(&self) -> FramePair {
        FramePair::new(&self.base, &self.end_effector)
    }

    /// Chain B: camera in the marker frame.
    pub fn stream_b(&self) -> FramePair {
        FramePair::new(&self.marker, &self.camera)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorOptions {
    pub solve: SolveOptions,
    pub robust: RobustKernel,
}

impl EstimatorOptions {
    pub fn refine_options(&self) -> RefineOptions {
        RefineOptions {
            solve: self.solve,
            robust: self.robust,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandEyeConfig {
    pub frames: FrameConfig,
    /// Upper bound for a single pose lookup, in seconds.
    pub lookup_timeout_secs: f64,
    /// Pose pairs are rewritten here after every capture.
    pub pairs_record_file: PathBuf,
    /// Pose pairs loaded in offline mode.
    pub pairs_load_file: PathBuf,
    pub result_file: PathBuf,
    pub load_transforms_from_file: bool,
    /// Advisory minimum; finalizing with fewer motions only warns.
    pub min_motions: usize,
    pub estimator: EstimatorOptions,
}

impl Default for HandEyeConfig {
    fn default() -> Self {
        Self {
            frames: FrameConfig::default(),
            lookup_timeout_secs: 10.0,
            pairs_record_file: PathBuf::from("TransformPairsInput.json"),
            pairs_load_file: PathBuf::from("TransformPairsOutput.json"),
            result_file: PathBuf::from("CalibratedTransform.json"),
            load_transforms_from_file: false,
            min_motions: 5,
            estimator: EstimatorOptions::default(),
        }
    }
}

impl HandEyeConfig {
    /// Lookup timeout; negative or non-finite values fall back to zero.
    pub fn lookup_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.lookup_timeout_secs).unwrap_or(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_yields_defaults() {
        let cfg: HandEyeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, HandEyeConfig::default());
        assert_eq!(cfg.lookup_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.min_motions, 5);
    }

    #[test]
    fn partial_json_overrides_selected_fields() {
        let cfg: HandEyeConfig = serde_json::from_str(
            r#"{
                "frames": { "camera": "/cam" },
                "estimator": { "robust": { "kind": "huber", "delta": 0.01 } }
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.frames.camera, "/cam");
        assert_eq!(cfg.frames.base, "/base_link");
        assert_eq!(cfg.estimator.robust, RobustKernel::Huber { delta: 0.01 });
        assert_eq!(cfg.estimator.solve, SolveOptions::default());
        assert_eq!(cfg.frames.stream_b(), FramePair::new("/camera_2/ar_marker_0", "/cam"));
    }
}
