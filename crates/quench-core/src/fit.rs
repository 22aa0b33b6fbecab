//! Nonlinear least-squares fit of `A * t^b`.
//!
//! A two-parameter Levenberg-Marquardt solve with Marquardt diagonal scaling. The
//! starting point comes from a log-log linear regression over the strictly positive
//! samples, falling back to `(1, 1)` when fewer than two such samples exist.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fitted model `value(t) = coefficient * t^exponent`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PowerLaw {
    pub coefficient: f64,
    pub exponent: f64,
}

impl PowerLaw {
    #[must_use]
    pub const fn new(coefficient: f64, exponent: f64) -> Self {
        Self {
            coefficient,
            exponent,
        }
    }

    /// Model value at `t`.
    #[inline]
    #[must_use]
    pub fn eval(&self, t: f64) -> f64 {
        self.coefficient * t.powf(self.exponent)
    }
}

/// Why a fit produced no parameters.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq)]
pub enum FitError {
    #[error("time and value series differ in length ({times} vs {values})")]
    LengthMismatch { times: usize, values: usize },
    #[error("need at least 2 distinct time points, got {distinct}")]
    TooFewPoints { distinct: usize },
    #[error("every sample value is zero")]
    AllZero,
    #[error("input contains non-finite samples")]
    NonFinite,
    #[error("no convergence after {evaluations} model evaluations")]
    NonConvergence { evaluations: usize },
}

/// Solver tolerances and limits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FitOptions {
    /// Budget of cost evaluations before giving up.
    pub max_evaluations: usize,
    /// Relative cost reduction below which an accepted step ends the solve.
    pub ftol: f64,
    /// Relative parameter change below which the solve ends.
    pub xtol: f64,
    /// Gradient magnitude below which the current point is accepted.
    pub gtol: f64,
    /// Overrides the log-log starting point.
    pub initial: Option<PowerLaw>,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            // 200 * (parameters + 1)
            max_evaluations: 600,
            ftol: 1.49e-8,
            xtol: 1.49e-8,
            gtol: 1e-12,
            initial: None,
        }
    }
}

const LAMBDA_START: f64 = 1e-3;
const LAMBDA_MAX: f64 = 1e16;

/// Fit `A * t^b` with default options.
pub fn fit_power_law(times: &[f64], values: &[f64]) -> Result<PowerLaw, FitError> {
    fit_power_law_with(times, values, &FitOptions::default())
}

/// Fit `A * t^b` to `(times[i], values[i])`.
pub fn fit_power_law_with(
    times: &[f64],
    values: &[f64],
    options: &FitOptions,
) -> Result<PowerLaw, FitError> {
    check_input(times, values)?;

    let start = options
        .initial
        .or_else(|| log_log_guess(times, values))
        .unwrap_or(PowerLaw::new(1.0, 1.0));
    let mut params = [start.coefficient, start.exponent];
    let mut cost = sum_squares(times, values, params);
    let mut evaluations = 1;
    if !cost.is_finite() {
        return Err(FitError::NonConvergence { evaluations });
    }

    let mut lambda = LAMBDA_START;
    while evaluations < options.max_evaluations {
        if cost == 0.0 {
            return Ok(PowerLaw::new(params[0], params[1]));
        }
        let (jtj, gradient) = normal_equations(times, values, params);
        if !gradient.iter().all(|g| g.is_finite()) {
            return Err(FitError::NonConvergence { evaluations });
        }
        if gradient[0].abs().max(gradient[1].abs()) <= options.gtol {
            return Ok(PowerLaw::new(params[0], params[1]));
        }

        let Some(delta) = damped_step(jtj, gradient, lambda) else {
            lambda *= 10.0;
            if lambda > LAMBDA_MAX {
                return Err(FitError::NonConvergence { evaluations });
            }
            continue;
        };
        let candidate = [params[0] + delta[0], params[1] + delta[1]];
        let candidate_cost = sum_squares(times, values, candidate);
        evaluations += 1;

        let small_step = step_is_small(delta, params, options.xtol);
        if candidate_cost.is_finite() && candidate_cost < cost {
            let reduction = (cost - candidate_cost) / cost;
            params = candidate;
            cost = candidate_cost;
            if reduction <= options.ftol || small_step {
                return Ok(PowerLaw::new(params[0], params[1]));
            }
            lambda = (lambda / 10.0).max(1e-12);
        } else {
            if small_step {
                // The damped step has shrunk to nothing; the current point is a minimum.
                return Ok(PowerLaw::new(params[0], params[1]));
            }
            lambda *= 10.0;
            if lambda > LAMBDA_MAX {
                return Err(FitError::NonConvergence { evaluations });
            }
        }
    }
    Err(FitError::NonConvergence { evaluations })
}

fn check_input(times: &[f64], values: &[f64]) -> Result<(), FitError> {
    if times.len() != values.len() {
        return Err(FitError::LengthMismatch {
            times: times.len(),
            values: values.len(),
        });
    }
    if times.iter().chain(values).any(|v| !v.is_finite()) {
        return Err(FitError::NonFinite);
    }
    let mut sorted = times.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup();
    if sorted.len() < 2 {
        return Err(FitError::TooFewPoints {
            distinct: sorted.len(),
        });
    }
    if values.iter().all(|v| *v == 0.0) {
        return Err(FitError::AllZero);
    }
    Ok(())
}

/// Ordinary least squares on `(ln t, ln v)` for strictly positive samples.
fn log_log_guess(times: &[f64], values: &[f64]) -> Option<PowerLaw> {
    let points: Vec<(f64, f64)> = times
        .iter()
        .zip(values)
        .filter(|(t, v)| **t > 0.0 && **v > 0.0)
        .map(|(t, v)| (t.ln(), v.ln()))
        .collect();
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;
    let sxx: f64 = points.iter().map(|p| (p.0 - mean_x).powi(2)).sum();
    if sxx <= f64::EPSILON {
        return None;
    }
    let sxy: f64 = points
        .iter()
        .map(|p| (p.0 - mean_x) * (p.1 - mean_y))
        .sum();
    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;
    let guess = PowerLaw::new(intercept.exp(), slope);
    (guess.coefficient.is_finite() && guess.exponent.is_finite()).then_some(guess)
}

/// `t^b` with `0^b` taken as its `t -> 0+` limit for positive `b`.
#[inline]
fn basis(t: f64, exponent: f64) -> f64 {
    if t == 0.0 && exponent > 0.0 {
        0.0
    } else {
        t.powf(exponent)
    }
}

fn sum_squares(times: &[f64], values: &[f64], params: [f64; 2]) -> f64 {
    times
        .iter()
        .zip(values)
        .map(|(t, v)| {
            let residual = params[0] * basis(*t, params[1]) - v;
            residual * residual
        })
        .sum()
}

/// `J^T J` (symmetric, stored as `[a00, a01, a11]`) and `J^T r`.
fn normal_equations(times: &[f64], values: &[f64], params: [f64; 2]) -> ([f64; 3], [f64; 2]) {
    let [a, b] = params;
    let mut jtj = [0.0; 3];
    let mut gradient = [0.0; 2];
    for (t, v) in times.iter().zip(values) {
        let tb = basis(*t, b);
        let residual = a * tb - v;
        let d_a = tb;
        // d/db of A t^b is A t^b ln t, which vanishes as t -> 0+.
        let d_b = if *t > 0.0 { a * tb * t.ln() } else { 0.0 };
        jtj[0] += d_a * d_a;
        jtj[1] += d_a * d_b;
        jtj[2] += d_b * d_b;
        gradient[0] += d_a * residual;
        gradient[1] += d_b * residual;
    }
    (jtj, gradient)
}

/// Solve `(J^T J + lambda * diag(J^T J)) delta = -J^T r`.
fn damped_step(jtj: [f64; 3], gradient: [f64; 2], lambda: f64) -> Option<[f64; 2]> {
    let d0 = jtj[0].max(1e-12);
    let d2 = jtj[2].max(1e-12);
    let m00 = jtj[0] + lambda * d0;
    let m11 = jtj[2] + lambda * d2;
    let m01 = jtj[1];
    let det = m00 * m11 - m01 * m01;
    if !det.is_finite() || det.abs() <= f64::MIN_POSITIVE {
        return None;
    }
    let delta = [
        (-gradient[0] * m11 + gradient[1] * m01) / det,
        (-gradient[1] * m00 + gradient[0] * m01) / det,
    ];
    delta.iter().all(|d| d.is_finite()).then_some(delta)
}

fn step_is_small(delta: [f64; 2], params: [f64; 2], xtol: f64) -> bool {
    let step = delta[0].hypot(delta[1]);
    let scale = params[0].hypot(params[1]);
    step <= xtol * (scale + xtol)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> Vec<f64> {
        (0..=20).map(|i| i as f64 * 50.0).collect()
    }

    #[test]
    fn recovers_exact_power_law() {
        let times = grid();
        let truth = PowerLaw::new(0.8, 0.45);
        let values: Vec<f64> = times.iter().map(|t| truth.eval(*t)).collect();
        let fit = fit_power_law(&times, &values).expect("fit");
        assert!((fit.coefficient - 0.8).abs() < 1e-6, "{fit:?}");
        assert!((fit.exponent - 0.45).abs() < 1e-6, "{fit:?}");
    }

    #[test]
    fn converges_from_a_poor_start() {
        let times: Vec<f64> = (1..=12).map(f64::from).collect();
        let truth = PowerLaw::new(2.0, 0.5);
        let values: Vec<f64> = times.iter().map(|t| truth.eval(*t)).collect();
        let options = FitOptions {
            initial: Some(PowerLaw::new(1.0, 1.0)),
            ..FitOptions::default()
        };
        let fit = fit_power_law_with(&times, &values, &options).expect("fit");
        assert!((fit.coefficient - 2.0).abs() < 1e-3, "{fit:?}");
        assert!((fit.exponent - 0.5).abs() < 1e-3, "{fit:?}");
    }

    #[test]
    fn tolerates_noisy_non_monotone_series() {
        let times = grid();
        let wobble = [0.9, 1.1, 0.95, 1.05];
        let values: Vec<f64> = times
            .iter()
            .enumerate()
            .map(|(i, t)| 1.5 * t.powf(0.3) * wobble[i % wobble.len()])
            .collect();
        let fit = fit_power_law(&times, &values).expect("fit");
        assert!(fit.coefficient.is_finite() && fit.exponent.is_finite());
        assert!((fit.exponent - 0.3).abs() < 0.1, "{fit:?}");
    }

    #[test]
    fn degenerate_inputs_are_reported() {
        assert_eq!(
            fit_power_law(&[1.0, 2.0], &[1.0]),
            Err(FitError::LengthMismatch {
                times: 2,
                values: 1
            })
        );
        assert_eq!(
            fit_power_law(&[5.0, 5.0, 5.0], &[1.0, 2.0, 3.0]),
            Err(FitError::TooFewPoints { distinct: 1 })
        );
        assert_eq!(
            fit_power_law(&[0.0, 1.0, 2.0], &[0.0, 0.0, 0.0]),
            Err(FitError::AllZero)
        );
        assert_eq!(
            fit_power_law(&[1.0, f64::NAN], &[1.0, 2.0]),
            Err(FitError::NonFinite)
        );
    }

    #[test]
    fn exhausted_budget_is_non_convergence() {
        let times: Vec<f64> = (1..=12).map(f64::from).collect();
        let values: Vec<f64> = times.iter().map(|t| 3.0 * t.powf(0.7)).collect();
        let options = FitOptions {
            max_evaluations: 2,
            initial: Some(PowerLaw::new(50.0, -2.0)),
            ..FitOptions::default()
        };
        assert!(matches!(
            fit_power_law_with(&times, &values, &options),
            Err(FitError::NonConvergence { .. })
        ));
    }
}
