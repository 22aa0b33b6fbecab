//! Power-law scaling of the mean first moment against the periodic width.

use rand::{Rng, SeedableRng, rngs::SmallRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::fit::{FitError, PowerLaw, fit_power_law};
use crate::moments::MomentAggregator;
use crate::{Execution, QuenchError, WalkParams, derive_seeds, validate_count, validate_time_limit};

/// Periodic `y` bounds for width `w`: `(floor(-w / 2), floor(w / 2))`.
///
/// The band always holds `w + 1` rows; for odd `w` it leans one row negative.
#[must_use]
pub fn width_bounds(width: i64) -> (i64, i64) {
    ((-width).div_euclid(2), width.div_euclid(2))
}

/// Inputs of a coefficient-versus-width sweep.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WidthSweepRequest {
    pub widths: Vec<i64>,
    /// Independent fits averaged per width.
    pub repeats: usize,
    /// Trajectories averaged per time point.
    pub runs: usize,
    /// Time limits forming each fitted series.
    pub times: Vec<f64>,
    pub table_size: usize,
}

impl Default for WidthSweepRequest {
    fn default() -> Self {
        Self {
            widths: vec![0, 25, 50, 75, 100],
            repeats: 10,
            runs: 1_000,
            times: vec![0.0, 250.0, 500.0, 750.0, 1_000.0],
            table_size: 50,
        }
    }
}

impl WidthSweepRequest {
    pub fn validate(&self) -> Result<(), QuenchError> {
        if self.widths.is_empty() {
            return Err(QuenchError::InvalidArgument(
                "width list must contain at least one value",
            ));
        }
        validate_count(self.repeats, "repeat count must be at least 1")?;
        validate_count(self.runs, "run count must be at least 1")?;
        if self.times.is_empty() {
            return Err(QuenchError::InvalidArgument(
                "time grid must contain at least one value",
            ));
        }
        for time in &self.times {
            validate_time_limit(*time)?;
        }
        let longest = self.times.iter().copied().fold(0.0, f64::max);
        for width in &self.widths {
            let (y_min, y_max) = width_bounds(*width);
            WalkParams::new(longest, self.table_size, y_min, y_max).validate()?;
        }
        Ok(())
    }
}

/// One repetition of the fit at a given width.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RepeatFit {
    /// Mean x moment at each requested time.
    pub mean_moments: Vec<f64>,
    pub fit: Result<PowerLaw, FitError>,
}

/// Reduced result for one width.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScalingPoint {
    pub width: i64,
    pub y_min: i64,
    pub y_max: i64,
    /// Mean fitted coefficient over converged repeats; `None` when none converged.
    pub coefficient: Option<f64>,
    /// Mean fitted exponent over the same repeats.
    pub exponent: Option<f64>,
    pub repeats: Vec<RepeatFit>,
}

impl ScalingPoint {
    fn from_repeats(width: i64, repeats: Vec<RepeatFit>) -> Self {
        let (y_min, y_max) = width_bounds(width);
        let fits: Vec<PowerLaw> = repeats
            .iter()
            .filter_map(|repeat| repeat.fit.as_ref().ok().copied())
            .collect();
        let (coefficient, exponent) = if fits.is_empty() {
            (None, None)
        } else {
            let n = fits.len() as f64;
            (
                Some(fits.iter().map(|f| f.coefficient).sum::<f64>() / n),
                Some(fits.iter().map(|f| f.exponent).sum::<f64>() / n),
            )
        };
        Self {
            width,
            y_min,
            y_max,
            coefficient,
            exponent,
            repeats,
        }
    }

    #[must_use]
    pub fn converged(&self) -> usize {
        self.repeats.iter().filter(|r| r.fit.is_ok()).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.repeats.len() - self.converged()
    }
}

/// Sweeps the periodic width and fits `A * t^b` to the mean x moment.
#[derive(Debug, Clone)]
pub struct ScalingAnalyzer {
    request: WidthSweepRequest,
    execution: Execution,
}

impl ScalingAnalyzer {
    pub fn new(request: WidthSweepRequest) -> Result<Self, QuenchError> {
        request.validate()?;
        Ok(Self {
            request,
            execution: Execution::default(),
        })
    }

    #[must_use]
    pub fn with_execution(mut self, execution: Execution) -> Self {
        self.execution = execution;
        self
    }

    #[must_use]
    pub fn request(&self) -> &WidthSweepRequest {
        &self.request
    }

    /// One row per width, in the order the widths were requested.
    pub fn coefficient_vs_width<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Result<Vec<ScalingPoint>, QuenchError> {
        let seeds = derive_seeds(rng, self.request.widths.len());
        let jobs: Vec<(i64, u64)> = self.request.widths.iter().copied().zip(seeds).collect();
        let points = match self.execution {
            Execution::Parallel => jobs
                .par_iter()
                .map(|(width, seed)| self.evaluate_width(*width, *seed))
                .collect::<Result<Vec<_>, _>>()?,
            Execution::Sequential => jobs
                .iter()
                .map(|(width, seed)| self.evaluate_width(*width, *seed))
                .collect::<Result<Vec<_>, _>>()?,
        };
        info!(
            widths = points.len(),
            undefined = points.iter().filter(|p| p.coefficient.is_none()).count(),
            "coefficient sweep complete"
        );
        Ok(points)
    }

    /// Every repeat of one width, driven by its own seed.
    pub fn evaluate_width(&self, width: i64, seed: u64) -> Result<ScalingPoint, QuenchError> {
        let (y_min, y_max) = width_bounds(width);
        let params = WalkParams::new(0.0, self.request.table_size, y_min, y_max);
        let aggregator = MomentAggregator::new(params, self.request.runs)?
            .with_execution(self.execution);
        let mut rng = SmallRng::seed_from_u64(seed);

        let mut repeats = Vec::with_capacity(self.request.repeats);
        for repeat in 0..self.request.repeats {
            let sweep = aggregator.time_sweep(&self.request.times, &mut rng)?;
            let mean_moments = sweep.mean_x_series();
            let fit = fit_power_law(&self.request.times, &mean_moments);
            match &fit {
                Ok(law) => debug!(
                    width,
                    repeat,
                    coefficient = law.coefficient,
                    exponent = law.exponent,
                    "fitted mean first moment"
                ),
                Err(err) => warn!(
                    width,
                    repeat,
                    error = %err,
                    "power-law fit failed; repeat excluded from the coefficient mean"
                ),
            }
            repeats.push(RepeatFit { mean_moments, fit });
        }

        let point = ScalingPoint::from_repeats(width, repeats);
        if point.coefficient.is_none() {
            warn!(width, "no repeat converged; coefficient is undefined");
        }
        Ok(point)
    }
}

/// Mean x moment over a time grid together with its power-law fit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MomentFit {
    pub times: Vec<f64>,
    pub mean_x: Vec<f64>,
    pub law: PowerLaw,
}

impl MomentFit {
    /// Fitted curve evaluated on the sweep's time grid.
    #[must_use]
    pub fn fitted_curve(&self) -> Vec<f64> {
        self.times.iter().map(|t| self.law.eval(*t)).collect()
    }
}

/// Fit `A * t^b` to the mean x moment of `runs` trajectories at each time in `times`.
///
/// A failing fit is returned as an error here; only the width sweep demotes it to a
/// warning.
pub fn fit_moment_series<R: Rng + ?Sized>(
    params: WalkParams,
    runs: usize,
    times: &[f64],
    execution: Execution,
    rng: &mut R,
) -> Result<MomentFit, QuenchError> {
    let aggregator = MomentAggregator::new(params, runs)?.with_execution(execution);
    let sweep = aggregator.time_sweep(times, rng)?;
    let mean_x = sweep.mean_x_series();
    let law = fit_power_law(times, &mean_x)?;
    Ok(MomentFit {
        times: times.to_vec(),
        mean_x,
        law,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seeded_rng;

    fn small_request(widths: Vec<i64>) -> WidthSweepRequest {
        WidthSweepRequest {
            widths,
            repeats: 2,
            runs: 40,
            times: vec![0.0, 100.0, 200.0, 300.0, 400.0],
            table_size: 30,
        }
    }

    #[test]
    fn bounds_use_floor_division() {
        assert_eq!(width_bounds(0), (0, 0));
        assert_eq!(width_bounds(4), (-2, 2));
        assert_eq!(width_bounds(5), (-3, 2));
        assert_eq!(width_bounds(25), (-13, 12));
        assert_eq!(width_bounds(100), (-50, 50));
    }

    #[test]
    fn request_validation() {
        assert!(WidthSweepRequest::default().validate().is_ok());
        let mut request = small_request(vec![10]);
        request.repeats = 0;
        assert_eq!(
            request.validate(),
            Err(QuenchError::InvalidArgument("repeat count must be at least 1"))
        );
        let mut request = small_request(vec![10]);
        request.runs = 0;
        assert!(request.validate().is_err());
        assert!(small_request(Vec::new()).validate().is_err());
        // Negative widths invert the bounds.
        assert!(small_request(vec![-3]).validate().is_err());
        let mut request = small_request(vec![10]);
        request.times = vec![0.0, -5.0];
        assert!(request.validate().is_err());
    }

    #[test]
    fn single_width_yields_single_row() {
        let mut request = small_request(vec![6]);
        request.repeats = 1;
        request.runs = 200;
        let analyzer = ScalingAnalyzer::new(request).expect("analyzer");
        let points = analyzer
            .coefficient_vs_width(&mut seeded_rng(Some(42)))
            .expect("sweep");
        assert_eq!(points.len(), 1);
        let point = &points[0];
        assert_eq!(point.width, 6);
        assert_eq!((point.y_min, point.y_max), (-3, 3));
        assert_eq!(point.repeats.len(), 1);
        assert_eq!(point.repeats[0].mean_moments.len(), 5);
        let law = point.repeats[0].fit.as_ref().expect("fit converges");
        let coefficient = point.coefficient.expect("coefficient");
        assert!(coefficient.is_finite());
        assert!(law.exponent.is_finite());
        assert_eq!(coefficient, law.coefficient);
        assert_eq!(point.exponent, Some(law.exponent));
    }

    #[test]
    fn rows_follow_request_order_regardless_of_execution() {
        let request = small_request(vec![8, 2, 4]);
        let parallel = ScalingAnalyzer::new(request).expect("analyzer");
        let sequential = parallel.clone().with_execution(Execution::Sequential);
        let a = parallel
            .coefficient_vs_width(&mut seeded_rng(Some(9)))
            .expect("a");
        let b = sequential
            .coefficient_vs_width(&mut seeded_rng(Some(9)))
            .expect("b");
        assert_eq!(a.iter().map(|p| p.width).collect::<Vec<_>>(), vec![8, 2, 4]);
        assert_eq!(a, b);
    }

    #[test]
    fn failed_repeats_are_excluded_not_zeroed() {
        let repeats = vec![
            RepeatFit {
                mean_moments: vec![0.0, 1.0],
                fit: Ok(PowerLaw::new(2.0, 0.5)),
            },
            RepeatFit {
                mean_moments: vec![0.0, 0.0],
                fit: Err(FitError::AllZero),
            },
            RepeatFit {
                mean_moments: vec![0.0, 3.0],
                fit: Ok(PowerLaw::new(4.0, 0.7)),
            },
        ];
        let point = ScalingPoint::from_repeats(10, repeats);
        assert_eq!(point.coefficient, Some(3.0));
        assert!((point.exponent.expect("exponent") - 0.6).abs() < 1e-12);
        assert_eq!(point.converged(), 2);
        assert_eq!(point.failed(), 1);
    }

    #[test]
    fn scaling_rows_serialize_fit_outcomes() {
        let point = ScalingPoint::from_repeats(
            4,
            vec![
                RepeatFit {
                    mean_moments: vec![0.0, 1.5],
                    fit: Ok(PowerLaw::new(0.5, 0.25)),
                },
                RepeatFit {
                    mean_moments: vec![0.0, 0.0],
                    fit: Err(FitError::NonConvergence { evaluations: 600 }),
                },
            ],
        );
        let value = serde_json::to_value(&point).expect("serialize");
        assert_eq!(value["width"], 4);
        assert_eq!(value["y_min"], -2);
        assert_eq!(value["coefficient"], 0.5);
        assert_eq!(value["repeats"][0]["fit"]["Ok"]["exponent"], 0.25);
        assert_eq!(
            value["repeats"][1]["fit"]["Err"]["NonConvergence"]["evaluations"],
            600
        );

        let restored: ScalingPoint = serde_json::from_value(value).expect("deserialize");
        assert_eq!(restored, point);

        let undefined = ScalingPoint::from_repeats(
            2,
            vec![RepeatFit {
                mean_moments: vec![0.0],
                fit: Err(FitError::AllZero),
            }],
        );
        let value = serde_json::to_value(&undefined).expect("serialize");
        assert!(value["coefficient"].is_null());
        assert_eq!(value["repeats"][0]["fit"]["Err"], "AllZero");
    }

    #[test]
    fn all_failed_repeats_leave_width_undefined() {
        let repeats = vec![RepeatFit {
            mean_moments: vec![0.0],
            fit: Err(FitError::TooFewPoints { distinct: 1 }),
        }];
        let point = ScalingPoint::from_repeats(3, repeats);
        assert_eq!(point.coefficient, None);
        assert_eq!(point.exponent, None);
    }

    #[test]
    fn single_time_point_sweep_reports_missing_rows() {
        let mut request = small_request(vec![4]);
        request.times = vec![100.0];
        let analyzer = ScalingAnalyzer::new(request).expect("analyzer");
        let points = analyzer
            .coefficient_vs_width(&mut seeded_rng(Some(1)))
            .expect("sweep");
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].coefficient, None);
        assert_eq!(points[0].failed(), 2);
    }

    #[test]
    fn moment_series_fit_reports_degenerate_input() {
        let params = WalkParams::new(0.0, 20, -2, 2);
        let result = fit_moment_series(
            params,
            5,
            &[0.0, 0.0],
            Execution::Sequential,
            &mut seeded_rng(Some(2)),
        );
        assert_eq!(
            result,
            Err(QuenchError::Fit(FitError::TooFewPoints { distinct: 1 }))
        );
    }
}
