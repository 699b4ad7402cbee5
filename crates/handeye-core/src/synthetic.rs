//! Deterministic synthetic data for AX = XB experiments and tests.
//!
//! The helpers avoid `thread_rng` and do not depend on the internal algorithm
//! of any RNG crate: samples come from a SplitMix64 stream keyed by
//! `(seed, index, channel)`, so datasets are stable across versions and
//! platforms.

use crate::{exp_so3, Iso3, PosePair, Real, RelativeMotion, Vec3};
use nalgebra::Translation3;

/// Generator of motions consistent with a known hand-eye transform.
///
/// Chain-B motions are sampled; chain-A motions follow from
/// `A_i = X * B_i * X^-1`, so `A_i X = X B_i` holds exactly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticHandEye {
    /// Ground-truth transform `X`.
    pub ground_truth: Iso3,
    pub seed: u64,
    /// Rotation angles are drawn from `[min_angle, max_angle]` (radians).
    pub min_angle: Real,
    pub max_angle: Real,
    /// Per-axis translation magnitude bound.
    pub max_translation: Real,
}

impl SyntheticHandEye {
    pub fn new(ground_truth: Iso3, seed: u64) -> Self {
        Self {
            ground_truth,
            seed,
            min_angle: 0.2,
            max_angle: 1.2,
            max_translation: 0.5,
        }
    }

    /// Sampled chain-B rigid motion number `idx`.
    pub fn motion_b(&self, idx: usize) -> Iso3 {
        let axis = random_axis(self.seed, idx);
        let u = unit(self.seed, idx, 3);
        let angle = self.min_angle + u * (self.max_angle - self.min_angle);
        let t = Vec3::new(
            symmetric(self.seed, idx, 4, self.max_translation),
            symmetric(self.seed, idx, 5, self.max_translation),
            symmetric(self.seed, idx, 6, self.max_translation),
        );
        Iso3::from_parts(Translation3::from(t), exp_so3(&(axis * angle)))
    }

    /// The chain-A motion paired with [`Self::motion_b`].
    pub fn motion_a(&self, idx: usize) -> Iso3 {
        let x = &self.ground_truth;
        x * self.motion_b(idx) * x.inverse()
    }

    /// `n` exact relative motions.
    pub fn relative_motions(&self, n: usize) -> Vec<RelativeMotion> {
        (0..n)
            .map(|idx| RelativeMotion::from_isometries(&self.motion_a(idx), &self.motion_b(idx)))
            .collect()
    }

    /// `n` absolute pose pairs whose derived relative motions satisfy
    /// `A' X = X B'`.
    ///
    /// Chain-B poses are sampled directly; chain-A poses are
    /// `Z * X * B_i * X^-1` for a fixed (arbitrary) world offset `Z`.
    pub fn pose_pairs(&self, n: usize) -> Vec<PosePair> {
        let z = self.motion_b(usize::MAX);
        let x = &self.ground_truth;
        (0..n)
            .map(|idx| {
                let pose_b = self.motion_b(idx);
                let pose_a = z * x * pose_b * x.inverse();
                PosePair { pose_a, pose_b }
            })
            .collect()
    }
}

/// Deterministic bounded perturbation of relative motions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionNoise {
    pub seed: u64,
    /// Maximum absolute per-axis rotation perturbation (radians).
    pub max_rotation: Real,
    /// Maximum absolute per-axis translation perturbation.
    pub max_translation: Real,
}

impl MotionNoise {
    /// Perturb chain A of motion `idx`.
    pub fn apply(&self, idx: usize, motion: &RelativeMotion) -> RelativeMotion {
        let mut noisy = *motion;
        let d_rot = Vec3::new(
            symmetric(self.seed, idx, 10, self.max_rotation),
            symmetric(self.seed, idx, 11, self.max_rotation),
            symmetric(self.seed, idx, 12, self.max_rotation),
        );
        let d_tra = Vec3::new(
            symmetric(self.seed, idx, 13, self.max_translation),
            symmetric(self.seed, idx, 14, self.max_translation),
            symmetric(self.seed, idx, 15, self.max_translation),
        );
        noisy.rotation_a = crate::log_so3(&(exp_so3(&motion.rotation_a) * exp_so3(&d_rot)));
        noisy.translation_a += d_tra;
        noisy
    }

    pub fn apply_all(&self, motions: &[RelativeMotion]) -> Vec<RelativeMotion> {
        motions
            .iter()
            .enumerate()
            .map(|(idx, m)| self.apply(idx, m))
            .collect()
    }
}

fn random_axis(seed: u64, idx: usize) -> Vec3 {
    let v = Vec3::new(
        symmetric(seed, idx, 0, 1.0),
        symmetric(seed, idx, 1, 1.0),
        symmetric(seed, idx, 2, 1.0),
    );
    // A near-zero draw is vanishingly unlikely but must not produce NaN.
    v.try_normalize(1e-6).unwrap_or_else(Vec3::z)
}

fn symmetric(seed: u64, idx: usize, channel: u64, max_abs: Real) -> Real {
    (unit(seed, idx, channel) - 0.5) * 2.0 * max_abs
}

fn unit(seed: u64, idx: usize, channel: u64) -> Real {
    u64_to_unit_f64(splitmix64(mix_key(seed, idx, channel)))
}

#[inline]
fn mix_key(seed: u64, idx: usize, channel: u64) -> u64 {
    seed ^ (idx as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ channel.wrapping_mul(0xBF58_476D_1CE4_E5B9)
}

#[inline]
fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[inline]
fn u64_to_unit_f64(x: u64) -> Real {
    // Top 53 bits -> [0, 1).
    let mantissa = x >> 11;
    (mantissa as Real) * (1.0 / ((1u64 << 53) as Real))
}
