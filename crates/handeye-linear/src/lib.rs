//! Closed-form (linear) initialization for AX = XB hand-eye calibration.
//!
//! The estimate produced here seeds the non-linear refinement in
//! `handeye-optim`; each stage is exposed separately so it can be tested on
//! its own.

pub mod handeye;

pub use handeye::{
    closed_form, estimate_rotation, estimate_translation, LinearHandEyeError, MIN_MOTIONS,
};
