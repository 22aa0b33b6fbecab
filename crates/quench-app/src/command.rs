//! The fixed set of driver operations and their dispatch into the core.

use std::io::Write;

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use quench_core::{
    Execution, MomentAggregator, MomentFit, ScalingAnalyzer, ScalingPoint, Site, TimeSweep,
    Trajectory, WalkEngine, WalkParams, WidthSweepRequest, fit_moment_series, inclusive_grid,
    inclusive_int_grid,
};
use rand::Rng;
use tracing::info;

use crate::report::Visualizer;

/// Upper limit on histogram bins per axis.
pub const MAX_BINS: usize = 10_000;

/// Time grid flags shared by the sweep-style commands.
#[derive(Args, Debug, Clone, Copy, PartialEq)]
pub struct TimeGridArgs {
    /// First simulation time limit.
    #[arg(long, default_value_t = 0.0)]
    pub time_start: f64,
    /// Last simulation time limit (inclusive).
    #[arg(long, default_value_t = 1_000.0)]
    pub time_finish: f64,
    /// Spacing between time limits.
    #[arg(long, default_value_t = 50.0)]
    pub time_step: f64,
}

impl TimeGridArgs {
    fn values(&self) -> Result<Vec<f64>> {
        Ok(inclusive_grid(
            self.time_start,
            self.time_finish,
            self.time_step,
        )?)
    }
}

#[derive(Args, Debug, Clone, Copy, PartialEq)]
pub struct WalkArgs {
    #[arg(long, default_value_t = 500.0)]
    pub sim_time: f64,
    #[arg(long, default_value_t = 250)]
    pub table_size: usize,
    #[arg(long, default_value_t = -5, allow_negative_numbers = true)]
    pub y_min: i64,
    #[arg(long, default_value_t = 5, allow_negative_numbers = true)]
    pub y_max: i64,
}

#[derive(Args, Debug, Clone, Copy, PartialEq)]
pub struct HistogramArgs {
    /// Independent trajectories to sample.
    #[arg(long, default_value_t = 500_000)]
    pub runs: usize,
    #[arg(long, default_value_t = 10_000.0)]
    pub sim_time: f64,
    #[arg(long, default_value_t = 250)]
    pub table_size: usize,
    #[arg(long, default_value_t = -100, allow_negative_numbers = true)]
    pub y_min: i64,
    #[arg(long, default_value_t = 100, allow_negative_numbers = true)]
    pub y_max: i64,
    /// Histogram bins per axis (1 to 10000).
    #[arg(long, default_value_t = 50)]
    pub bins: usize,
}

#[derive(Args, Debug, Clone, Copy, PartialEq)]
pub struct MomentArgs {
    /// Independent trajectories per time limit.
    #[arg(long, default_value_t = 5_000)]
    pub runs: usize,
    #[command(flatten)]
    pub times: TimeGridArgs,
    #[arg(long, default_value_t = 250)]
    pub table_size: usize,
    #[arg(long, default_value_t = -100, allow_negative_numbers = true)]
    pub y_min: i64,
    #[arg(long, default_value_t = 100, allow_negative_numbers = true)]
    pub y_max: i64,
}

#[derive(Args, Debug, Clone, Copy, PartialEq)]
pub struct FitArgs {
    /// Independent trajectories per time limit.
    #[arg(long, default_value_t = 25_000)]
    pub runs: usize,
    #[command(flatten)]
    pub times: TimeGridArgs,
    #[arg(long, default_value_t = 100)]
    pub table_size: usize,
    #[arg(long, default_value_t = -5, allow_negative_numbers = true)]
    pub y_min: i64,
    #[arg(long, default_value_t = 5, allow_negative_numbers = true)]
    pub y_max: i64,
}

#[derive(Args, Debug, Clone, Copy, PartialEq)]
pub struct SweepArgs {
    /// Fits averaged per width.
    #[arg(long, default_value_t = 10)]
    pub repeats: usize,
    #[arg(long, default_value_t = 0)]
    pub width_start: i64,
    /// Last width (inclusive).
    #[arg(long, default_value_t = 100)]
    pub width_finish: i64,
    #[arg(long, default_value_t = 25)]
    pub width_step: i64,
    /// Independent trajectories per time limit.
    #[arg(long, default_value_t = 1_000)]
    pub runs: usize,
    #[arg(long, default_value_t = 0.0)]
    pub time_start: f64,
    #[arg(long, default_value_t = 1_000.0)]
    pub time_finish: f64,
    #[arg(long, default_value_t = 250.0)]
    pub time_step: f64,
    #[arg(long, default_value_t = 50)]
    pub table_size: usize,
}

/// Driver operations, one per entry of the classic menu.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Simulate one trajectory and print its (x, y, time) history.
    Walk(WalkArgs),
    /// Histogram the final positions of many independent runs.
    Histogram(HistogramArgs),
    /// Per-run first moments over a grid of time limits (noisy view).
    Moments(MomentArgs),
    /// Mean first moments of both axes over a grid of time limits.
    MeanMoments(MomentArgs),
    /// Fit A * t^b to the mean x first moment.
    Fit(FitArgs),
    /// Fitted coefficient A against the periodic width W.
    Sweep(SweepArgs),
}

/// Result of a command, ready to hand to a visualizer.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Walk(Trajectory),
    Histogram { finals: Vec<Site>, bins: usize },
    Moments(TimeSweep),
    MeanMoments(TimeSweep),
    Fit(MomentFit),
    Sweep(Vec<ScalingPoint>),
}

impl Command {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Walk(_) => "walk",
            Self::Histogram(_) => "histogram",
            Self::Moments(_) => "moments",
            Self::MeanMoments(_) => "mean-moments",
            Self::Fit(_) => "fit",
            Self::Sweep(_) => "sweep",
        }
    }

    /// Run the command against the core engine. Invalid parameters abort here.
    pub fn execute<R: Rng + ?Sized>(&self, execution: Execution, rng: &mut R) -> Result<Outcome> {
        let outcome = match *self {
            Self::Walk(args) => {
                let params = WalkParams::new(args.sim_time, args.table_size, args.y_min, args.y_max);
                let trajectory = WalkEngine::new(params)?.run(rng)?;
                info!(
                    steps = trajectory.steps(),
                    final_time = trajectory.final_time(),
                    "trajectory complete"
                );
                Outcome::Walk(trajectory)
            }
            Self::Histogram(args) => {
                if args.bins == 0 {
                    bail!("histogram needs at least one bin");
                }
                if args.bins > MAX_BINS {
                    bail!("histogram supports at most {MAX_BINS} bins, got {}", args.bins);
                }
                let params = WalkParams::new(args.sim_time, args.table_size, args.y_min, args.y_max);
                let finals = MomentAggregator::new(params, args.runs)?
                    .with_execution(execution)
                    .final_positions(rng)?;
                Outcome::Histogram {
                    finals,
                    bins: args.bins,
                }
            }
            Self::Moments(args) | Self::MeanMoments(args) => {
                let times = args.times.values()?;
                let params = WalkParams::new(0.0, args.table_size, args.y_min, args.y_max);
                let sweep = MomentAggregator::new(params, args.runs)?
                    .with_execution(execution)
                    .time_sweep(&times, rng)?;
                if matches!(self, Self::Moments(_)) {
                    Outcome::Moments(sweep)
                } else {
                    Outcome::MeanMoments(sweep)
                }
            }
            Self::Fit(args) => {
                let times = args.times.values()?;
                let params = WalkParams::new(0.0, args.table_size, args.y_min, args.y_max);
                let fit = fit_moment_series(params, args.runs, &times, execution, rng)?;
                info!(
                    coefficient = fit.law.coefficient,
                    exponent = fit.law.exponent,
                    "power-law fit complete"
                );
                Outcome::Fit(fit)
            }
            Self::Sweep(args) => {
                let request = WidthSweepRequest {
                    widths: inclusive_int_grid(args.width_start, args.width_finish, args.width_step)?,
                    repeats: args.repeats,
                    runs: args.runs,
                    times: inclusive_grid(args.time_start, args.time_finish, args.time_step)?,
                    table_size: args.table_size,
                };
                let points = ScalingAnalyzer::new(request)?
                    .with_execution(execution)
                    .coefficient_vs_width(rng)?;
                Outcome::Sweep(points)
            }
        };
        Ok(outcome)
    }
}

impl Outcome {
    /// Hand the outcome to the matching visualizer entry point.
    pub fn render(&self, visualizer: &dyn Visualizer, out: &mut dyn Write) -> Result<()> {
        match self {
            Self::Walk(trajectory) => visualizer.trajectory(out, trajectory),
            Self::Histogram { finals, bins } => visualizer.final_positions(out, finals, *bins),
            Self::Moments(sweep) => visualizer.moment_cloud(out, sweep),
            Self::MeanMoments(sweep) => visualizer.moment_means(out, sweep),
            Self::Fit(fit) => visualizer.moment_fit(out, fit),
            Self::Sweep(points) => visualizer.width_curve(out, points),
        }
    }
}
