//! First-moment statistics over many independent trajectories.

use rand::{Rng, SeedableRng, rngs::SmallRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::walk::{Site, Trajectory, WalkEngine};
use crate::{Execution, QuenchError, WalkParams, derive_seeds, validate_count, validate_time_limit};

/// Mean position of one trajectory over its whole history.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct MomentSample {
    pub mean_x: f64,
    pub mean_y: f64,
}

impl From<&Trajectory> for MomentSample {
    fn from(trajectory: &Trajectory) -> Self {
        let (mean_x, mean_y) = trajectory.mean_position();
        Self { mean_x, mean_y }
    }
}

/// Per-run first moments, one entry per independent run in run order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FirstMoments {
    pub mean_x: Vec<f64>,
    pub mean_y: Vec<f64>,
}

impl FirstMoments {
    fn from_samples(samples: impl IntoIterator<Item = MomentSample>) -> Self {
        let (mean_x, mean_y) = samples
            .into_iter()
            .map(|sample| (sample.mean_x, sample.mean_y))
            .unzip();
        Self { mean_x, mean_y }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.mean_x.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mean_x.is_empty()
    }

    /// Average of the per-run moments.
    #[must_use]
    pub fn average(&self) -> MomentSample {
        MomentSample {
            mean_x: mean(&self.mean_x),
            mean_y: mean(&self.mean_y),
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// All per-run moments gathered at one time limit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimePoint {
    pub time: f64,
    pub moments: FirstMoments,
}

/// Moments over a grid of time limits; both the raw and the averaged views.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TimeSweep {
    pub points: Vec<TimePoint>,
}

impl TimeSweep {
    #[must_use]
    pub fn times(&self) -> Vec<f64> {
        self.points.iter().map(|point| point.time).collect()
    }

    /// Every `(time, mean x)` pair of every run.
    #[must_use]
    pub fn noisy_x(&self) -> Vec<(f64, f64)> {
        self.points
            .iter()
            .flat_map(|point| point.moments.mean_x.iter().map(move |m| (point.time, *m)))
            .collect()
    }

    /// Every `(time, mean y)` pair of every run.
    #[must_use]
    pub fn noisy_y(&self) -> Vec<(f64, f64)> {
        self.points
            .iter()
            .flat_map(|point| point.moments.mean_y.iter().map(move |m| (point.time, *m)))
            .collect()
    }

    /// Mean x moment across runs, one value per time limit.
    #[must_use]
    pub fn mean_x_series(&self) -> Vec<f64> {
        self.points
            .iter()
            .map(|point| point.moments.average().mean_x)
            .collect()
    }

    /// Mean y moment across runs, one value per time limit.
    #[must_use]
    pub fn mean_y_series(&self) -> Vec<f64> {
        self.points
            .iter()
            .map(|point| point.moments.average().mean_y)
            .collect()
    }
}

/// Drives a [`WalkEngine`] over many independently seeded runs.
#[derive(Debug, Clone, Copy)]
pub struct MomentAggregator {
    engine: WalkEngine,
    runs: usize,
    execution: Execution,
}

impl MomentAggregator {
    pub fn new(params: WalkParams, runs: usize) -> Result<Self, QuenchError> {
        validate_count(runs, "run count must be at least 1")?;
        Ok(Self {
            engine: WalkEngine::new(params)?,
            runs,
            execution: Execution::default(),
        })
    }

    #[must_use]
    pub fn with_execution(mut self, execution: Execution) -> Self {
        self.execution = execution;
        self
    }

    #[must_use]
    pub fn runs(&self) -> usize {
        self.runs
    }

    #[must_use]
    pub fn params(&self) -> &WalkParams {
        self.engine.params()
    }

    /// Run every trajectory, reducing each to `reduce` as soon as it finishes.
    fn map_runs<T, R, F>(&self, rng: &mut R, reduce: F) -> Result<Vec<T>, QuenchError>
    where
        T: Send,
        R: Rng + ?Sized,
        F: Fn(Trajectory) -> T + Sync,
    {
        let seeds = derive_seeds(rng, self.runs);
        let engine = &self.engine;
        let run_one = |seed: &u64| -> Result<T, QuenchError> {
            let mut run_rng = SmallRng::seed_from_u64(*seed);
            engine.run(&mut run_rng).map(&reduce)
        };
        match self.execution {
            Execution::Parallel => seeds.par_iter().map(run_one).collect(),
            Execution::Sequential => seeds.iter().map(run_one).collect(),
        }
    }

    /// First moments of `runs` independent trajectories, each on its own field.
    pub fn first_moments<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<FirstMoments, QuenchError> {
        let samples = self.map_runs(rng, |trajectory| MomentSample::from(&trajectory))?;
        Ok(FirstMoments::from_samples(samples))
    }

    /// Final position of each of `runs` independent trajectories.
    pub fn final_positions<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<Site>, QuenchError> {
        self.map_runs(rng, |trajectory| trajectory.final_position())
    }

    /// First moments at each time limit in `times`, keeping all per-run samples.
    pub fn time_sweep<R: Rng + ?Sized>(
        &self,
        times: &[f64],
        rng: &mut R,
    ) -> Result<TimeSweep, QuenchError> {
        if times.is_empty() {
            return Err(QuenchError::InvalidArgument(
                "time grid must contain at least one value",
            ));
        }
        for time in times {
            validate_time_limit(*time)?;
        }
        let mut points = Vec::with_capacity(times.len());
        for &time in times {
            let at_time = Self::new(self.params().with_time_limit(time), self.runs)?
                .with_execution(self.execution);
            let moments = at_time.first_moments(rng)?;
            debug!(
                time,
                runs = self.runs,
                mean_x = moments.average().mean_x,
                "aggregated first moments"
            );
            points.push(TimePoint { time, moments });
        }
        Ok(TimeSweep { points })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seeded_rng;

    #[test]
    fn one_sample_per_run() {
        let aggregator = MomentAggregator::new(WalkParams::new(40.0, 30, -3, 3), 25).expect("agg");
        let mut rng = seeded_rng(Some(5));
        let moments = aggregator.first_moments(&mut rng).expect("moments");
        assert_eq!(moments.len(), 25);
        assert_eq!(moments.mean_y.len(), 25);
        for mean_y in &moments.mean_y {
            assert!((-3.0..=3.0).contains(mean_y));
        }
    }

    #[test]
    fn parallel_and_sequential_agree() {
        let params = WalkParams::new(60.0, 40, -4, 4);
        let parallel = MomentAggregator::new(params, 16).expect("agg");
        let sequential = parallel.with_execution(Execution::Sequential);
        let a = parallel.first_moments(&mut seeded_rng(Some(11))).expect("a");
        let b = sequential.first_moments(&mut seeded_rng(Some(11))).expect("b");
        assert_eq!(a, b);
    }

    #[test]
    fn runs_draw_independent_fields() {
        let aggregator = MomentAggregator::new(WalkParams::new(200.0, 50, -5, 5), 12).expect("agg");
        let moments = aggregator
            .first_moments(&mut seeded_rng(Some(21)))
            .expect("moments");
        let first = moments.mean_x[0];
        assert!(moments.mean_x.iter().any(|m| *m != first));
    }

    #[test]
    fn zero_run_count_is_rejected() {
        assert_eq!(
            MomentAggregator::new(WalkParams::default(), 0).err(),
            Some(QuenchError::InvalidArgument("run count must be at least 1"))
        );
    }

    #[test]
    fn time_sweep_exposes_both_views() {
        let aggregator = MomentAggregator::new(WalkParams::new(0.0, 20, -2, 2), 6).expect("agg");
        let sweep = aggregator
            .time_sweep(&[0.0, 10.0, 20.0], &mut seeded_rng(Some(3)))
            .expect("sweep");
        assert_eq!(sweep.times(), vec![0.0, 10.0, 20.0]);
        assert_eq!(sweep.noisy_x().len(), 18);
        assert_eq!(sweep.noisy_y().len(), 18);
        let means = sweep.mean_x_series();
        assert_eq!(means.len(), 3);
        // A zero time limit never leaves the origin.
        assert_eq!(means[0], 0.0);
        assert_eq!(sweep.mean_y_series()[0], 0.0);
        assert!(aggregator.time_sweep(&[], &mut seeded_rng(Some(3))).is_err());
        assert!(aggregator.time_sweep(&[-1.0], &mut seeded_rng(Some(3))).is_err());
    }

    #[test]
    fn final_positions_respect_bounds() {
        let aggregator = MomentAggregator::new(WalkParams::new(80.0, 30, -2, 2), 20).expect("agg");
        let finals = aggregator
            .final_positions(&mut seeded_rng(Some(8)))
            .expect("finals");
        assert_eq!(finals.len(), 20);
        assert!(finals.iter().all(|site| (-2..=2).contains(&site.y)));
    }
}
