//! Core types for the quenched trap random walk.
//!
//! A walker hops on the integer lattice, periodic in `y`, and waits between hops for a
//! time read from a pair of per-axis waiting-time tables that are drawn once per
//! trajectory and then held fixed. The crate layers aggregation (first moments over
//! many independent trajectories) and a power-law scaling sweep on top of the walk.

use rand::{Rng, SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod field;
pub mod fit;
pub mod jump;
pub mod moments;
pub mod scaling;
pub mod walk;

pub use field::{QuenchedField, WaitingTimeTable};
pub use fit::{FitError, FitOptions, PowerLaw, fit_power_law, fit_power_law_with};
pub use jump::{Jump, JumpSampler};
pub use moments::{FirstMoments, MomentAggregator, MomentSample, TimePoint, TimeSweep};
pub use scaling::{
    MomentFit, RepeatFit, ScalingAnalyzer, ScalingPoint, WidthSweepRequest, fit_moment_series,
    width_bounds,
};
pub use walk::{Site, Trajectory, WalkEngine, WalkState};

/// Errors raised by the simulation layer.
#[derive(Debug, Error, PartialEq)]
pub enum QuenchError {
    /// Indicates a parameter outside its valid domain; raised before any work starts.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// A single power-law fit requested directly by the caller failed.
    #[error("power-law fit failed: {0}")]
    Fit(#[from] FitError),
}

/// How batches of independent runs are evaluated.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum Execution {
    /// Map work units over the rayon thread pool.
    #[default]
    Parallel,
    /// Evaluate work units one after another on the calling thread.
    Sequential,
}

/// Parameters of a single trajectory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct WalkParams {
    /// The walk stops at the first step whose cumulative time reaches this limit.
    pub sim_time_limit: f64,
    /// Length of each per-axis waiting-time table.
    pub table_size: usize,
    /// Lower periodic bound on `y` (inclusive).
    pub y_min: i64,
    /// Upper periodic bound on `y` (inclusive).
    pub y_max: i64,
}

impl Default for WalkParams {
    fn default() -> Self {
        Self {
            sim_time_limit: 500.0,
            table_size: 250,
            y_min: -5,
            y_max: 5,
        }
    }
}

impl WalkParams {
    /// Construct parameters without validating them.
    #[must_use]
    pub const fn new(sim_time_limit: f64, table_size: usize, y_min: i64, y_max: i64) -> Self {
        Self {
            sim_time_limit,
            table_size,
            y_min,
            y_max,
        }
    }

    /// Copy of these parameters with a different time limit.
    #[must_use]
    pub const fn with_time_limit(self, sim_time_limit: f64) -> Self {
        Self {
            sim_time_limit,
            ..self
        }
    }

    /// Checks every parameter, returning the first violation.
    pub fn validate(&self) -> Result<(), QuenchError> {
        if self.table_size == 0 {
            return Err(QuenchError::InvalidArgument(
                "table_size must be at least 1",
            ));
        }
        if self.y_min > self.y_max {
            return Err(QuenchError::InvalidArgument(
                "y_min must not exceed y_max",
            ));
        }
        validate_time_limit(self.sim_time_limit)?;
        // A one-entry table holds only the zeroed center, so time would never advance.
        if self.table_size == 1 && self.sim_time_limit > 0.0 {
            return Err(QuenchError::InvalidArgument(
                "table_size must be at least 2 when sim_time_limit is positive",
            ));
        }
        Ok(())
    }
}

pub(crate) fn validate_time_limit(limit: f64) -> Result<(), QuenchError> {
    if !limit.is_finite() {
        return Err(QuenchError::InvalidArgument(
            "sim_time_limit must be finite",
        ));
    }
    if limit < 0.0 {
        return Err(QuenchError::InvalidArgument(
            "sim_time_limit must be non-negative",
        ));
    }
    Ok(())
}

pub(crate) fn validate_count(count: usize, what: &'static str) -> Result<(), QuenchError> {
    if count == 0 {
        return Err(QuenchError::InvalidArgument(what));
    }
    Ok(())
}

/// Fresh seed from OS entropy, for callers that want to report the seed they used.
#[must_use]
pub fn entropy_seed() -> u64 {
    rand::random()
}

/// Build the master generator, falling back to OS entropy when no seed is given.
#[must_use]
pub fn seeded_rng(seed: Option<u64>) -> SmallRng {
    SmallRng::seed_from_u64(seed.unwrap_or_else(entropy_seed))
}

/// Draw `count` independent seeds from `rng`, one per work unit.
///
/// Seeds are drawn before any unit is dispatched so results do not depend on
/// scheduling order.
pub fn derive_seeds<R: Rng + ?Sized>(rng: &mut R, count: usize) -> Vec<u64> {
    (0..count).map(|_| rng.next_u64()).collect()
}

/// Largest number of points a time or width grid may hold.
pub const MAX_GRID_POINTS: usize = 1_000_000;

/// Evenly spaced values `start, start + step, ...` up to and including `finish`.
///
/// For integral inputs this matches the half-open range `[start, finish + 1)`.
pub fn inclusive_grid(start: f64, finish: f64, step: f64) -> Result<Vec<f64>, QuenchError> {
    if !(start.is_finite() && finish.is_finite() && step.is_finite()) {
        return Err(QuenchError::InvalidArgument("grid bounds must be finite"));
    }
    if step <= 0.0 {
        return Err(QuenchError::InvalidArgument("grid step must be positive"));
    }
    if finish < start {
        return Err(QuenchError::InvalidArgument(
            "grid finish must not precede start",
        ));
    }
    let intervals = ((finish - start) / step).floor();
    if !intervals.is_finite() || intervals >= MAX_GRID_POINTS as f64 {
        return Err(QuenchError::InvalidArgument(
            "grid holds too many points",
        ));
    }
    let count = intervals as usize + 1;
    Ok((0..count).map(|i| start + i as f64 * step).collect())
}

/// Integer counterpart of [`inclusive_grid`], used for width sweeps.
pub fn inclusive_int_grid(start: i64, finish: i64, step: i64) -> Result<Vec<i64>, QuenchError> {
    if step <= 0 {
        return Err(QuenchError::InvalidArgument("grid step must be positive"));
    }
    if finish < start {
        return Err(QuenchError::InvalidArgument(
            "grid finish must not precede start",
        ));
    }
    let intervals = (i128::from(finish) - i128::from(start)) / i128::from(step);
    if intervals >= MAX_GRID_POINTS as i128 {
        return Err(QuenchError::InvalidArgument(
            "grid holds too many points",
        ));
    }
    Ok((start..=finish).step_by(step as usize).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params_are_valid() {
        assert!(WalkParams::default().validate().is_ok());
    }

    #[test]
    fn validation_rejects_bad_params() {
        let base = WalkParams::new(10.0, 10, -5, 5);
        assert_eq!(
            WalkParams { table_size: 0, ..base }.validate(),
            Err(QuenchError::InvalidArgument("table_size must be at least 1"))
        );
        assert!(matches!(
            WalkParams { y_min: 3, y_max: 2, ..base }.validate(),
            Err(QuenchError::InvalidArgument(_))
        ));
        assert!(base.with_time_limit(-1.0).validate().is_err());
        assert!(base.with_time_limit(f64::NAN).validate().is_err());
        assert!(base.with_time_limit(f64::INFINITY).validate().is_err());
        assert!(WalkParams { table_size: 1, ..base }.validate().is_err());
        assert!(
            WalkParams { table_size: 1, ..base }
                .with_time_limit(0.0)
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn grids_include_the_finish() {
        assert_eq!(
            inclusive_grid(0.0, 1_000.0, 250.0).unwrap(),
            vec![0.0, 250.0, 500.0, 750.0, 1_000.0]
        );
        assert_eq!(inclusive_grid(0.0, 90.0, 50.0).unwrap(), vec![0.0, 50.0]);
        assert_eq!(inclusive_grid(5.0, 5.0, 1.0).unwrap(), vec![5.0]);
        assert_eq!(
            inclusive_int_grid(0, 100, 25).unwrap(),
            vec![0, 25, 50, 75, 100]
        );
        assert!(inclusive_grid(0.0, 1.0, 0.0).is_err());
        assert!(inclusive_int_grid(10, 0, 1).is_err());
    }

    #[test]
    fn oversized_grids_are_rejected() {
        let too_many = || Some(QuenchError::InvalidArgument("grid holds too many points"));
        assert_eq!(inclusive_grid(0.0, 1.0, 1e-300).err(), too_many());
        assert_eq!(inclusive_grid(0.0, 1e12, 1.0).err(), too_many());
        assert_eq!(inclusive_grid(-f64::MAX, f64::MAX, 1.0).err(), too_many());
        assert_eq!(inclusive_int_grid(0, i64::MAX, 1).err(), too_many());
        assert_eq!(inclusive_int_grid(i64::MIN, i64::MAX, 1).err(), too_many());
        assert_eq!(
            inclusive_grid(0.0, (MAX_GRID_POINTS - 1) as f64, 1.0)
                .expect("largest grid")
                .len(),
            MAX_GRID_POINTS
        );
    }

    #[test]
    fn seeds_are_reproducible() {
        let mut a = seeded_rng(Some(7));
        let mut b = seeded_rng(Some(7));
        assert_eq!(derive_seeds(&mut a, 8), derive_seeds(&mut b, 8));
    }
}
