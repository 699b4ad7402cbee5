//! Problem definitions built on the generic [`crate::NllsProblem`] trait.

pub mod axxb;
