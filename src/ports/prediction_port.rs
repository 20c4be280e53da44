//! Growth prediction port trait.
//!
//! The model itself lives outside this crate; reports only need a score.

pub trait GrowthModel {
    /// Probability-like score in `[0, 1]` for one feature vector, one boolean
    /// per declared indicator.
    fn predict(&self, features: &[bool]) -> f64;
}
