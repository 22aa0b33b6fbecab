//! Visualization collaborators: plain-text tables and JSON documents on a writer.

use std::io::Write;

use anyhow::Result;
use clap::ValueEnum;
use quench_core::{MomentFit, ScalingPoint, Site, TimeSweep, Trajectory};
use serde::Serialize;

const BAR_WIDTH: usize = 40;

/// Consumes simulation outputs; the engine never renders anything itself.
pub trait Visualizer {
    /// Stable identifier of the implementation (e.g. "text", "json").
    fn name(&self) -> &'static str;

    fn trajectory(&self, out: &mut dyn Write, trajectory: &Trajectory) -> Result<()>;

    fn final_positions(&self, out: &mut dyn Write, finals: &[Site], bins: usize) -> Result<()>;

    /// Every per-run moment against its time limit.
    fn moment_cloud(&self, out: &mut dyn Write, sweep: &TimeSweep) -> Result<()>;

    /// Mean moment per time limit, both axes.
    fn moment_means(&self, out: &mut dyn Write, sweep: &TimeSweep) -> Result<()>;

    fn moment_fit(&self, out: &mut dyn Write, fit: &MomentFit) -> Result<()>;

    fn width_curve(&self, out: &mut dyn Write, points: &[ScalingPoint]) -> Result<()>;
}

/// Output format selected on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Format {
    #[default]
    Text,
    Json,
}

impl Format {
    #[must_use]
    pub fn visualizer(self) -> Box<dyn Visualizer> {
        match self {
            Self::Text => Box::new(TextReport),
            Self::Json => Box::new(JsonReport),
        }
    }
}

/// Equal-width bins over `[min, max]`; the last bin is closed on the right.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Histogram {
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

impl Histogram {
    /// Bin `values` into `bins` buckets (at least one).
    ///
    /// A constant sample gets the unit-wide range centred on its value.
    #[must_use]
    pub fn from_values(values: &[f64], bins: usize) -> Self {
        let bins = bins.max(1);
        let (mut lo, mut hi) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(*v), hi.max(*v))
            });
        if values.is_empty() {
            lo = 0.0;
            hi = 1.0;
        } else if lo == hi {
            lo -= 0.5;
            hi += 0.5;
        }
        let width = (hi - lo) / bins as f64;
        let edges = (0..=bins).map(|i| lo + i as f64 * width).collect();
        let mut counts = vec![0usize; bins];
        for value in values {
            let slot = (((value - lo) / width).floor() as usize).min(bins - 1);
            counts[slot] += 1;
        }
        Self { edges, counts }
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

fn axis_values(finals: &[Site]) -> (Vec<f64>, Vec<f64>) {
    finals.iter().map(|s| (s.x as f64, s.y as f64)).unzip()
}

fn summary(values: impl Iterator<Item = f64>) -> (f64, f64, f64) {
    let (mut min, mut max, mut sum, mut n) = (f64::INFINITY, f64::NEG_INFINITY, 0.0, 0usize);
    for value in values {
        min = min.min(value);
        max = max.max(value);
        sum += value;
        n += 1;
    }
    if n == 0 {
        return (0.0, 0.0, 0.0);
    }
    (min, sum / n as f64, max)
}

fn fmt_optional(value: Option<f64>) -> String {
    value.map_or_else(|| "undefined".to_owned(), |v| format!("{v:.4}"))
}

/// Whitespace-aligned tables, suitable for a terminal or for piping into a plotter.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextReport;

impl TextReport {
    fn histogram(out: &mut dyn Write, label: &str, histogram: &Histogram) -> Result<()> {
        writeln!(out, "{label} (n = {})", histogram.total())?;
        let peak = histogram.counts.iter().copied().max().unwrap_or(0).max(1);
        for (i, count) in histogram.counts.iter().enumerate() {
            let bar = "#".repeat(count * BAR_WIDTH / peak);
            writeln!(
                out,
                "  [{:>10.2}, {:>10.2})  {:>8}  {bar}",
                histogram.edges[i],
                histogram.edges[i + 1],
                count
            )?;
        }
        Ok(())
    }
}

impl Visualizer for TextReport {
    fn name(&self) -> &'static str {
        "text"
    }

    fn trajectory(&self, out: &mut dyn Write, trajectory: &Trajectory) -> Result<()> {
        let last = trajectory.final_position();
        writeln!(
            out,
            "# steps = {}, final position = ({}, {}), final time = {:.4}",
            trajectory.steps(),
            last.x,
            last.y,
            trajectory.final_time()
        )?;
        writeln!(out, "{:>8} {:>8} {:>8} {:>14}", "step", "x", "y", "time")?;
        for (step, (site, time)) in trajectory
            .positions
            .iter()
            .zip(&trajectory.times)
            .enumerate()
        {
            writeln!(out, "{step:>8} {:>8} {:>8} {time:>14.4}", site.x, site.y)?;
        }
        Ok(())
    }

    fn final_positions(&self, out: &mut dyn Write, finals: &[Site], bins: usize) -> Result<()> {
        let (xs, ys) = axis_values(finals);
        Self::histogram(out, "final x", &Histogram::from_values(&xs, bins))?;
        Self::histogram(out, "final y", &Histogram::from_values(&ys, bins))?;
        Ok(())
    }

    fn moment_cloud(&self, out: &mut dyn Write, sweep: &TimeSweep) -> Result<()> {
        writeln!(
            out,
            "{:>10} {:>6} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12}",
            "time", "runs", "min <Jx>", "mean <Jx>", "max <Jx>", "min <Jy>", "mean <Jy>", "max <Jy>"
        )?;
        for point in &sweep.points {
            let (x_min, x_mean, x_max) = summary(point.moments.mean_x.iter().copied());
            let (y_min, y_mean, y_max) = summary(point.moments.mean_y.iter().copied());
            writeln!(
                out,
                "{:>10.2} {:>6} {x_min:>12.4} {x_mean:>12.4} {x_max:>12.4} {y_min:>12.4} {y_mean:>12.4} {y_max:>12.4}",
                point.time,
                point.moments.len(),
            )?;
        }
        Ok(())
    }

    fn moment_means(&self, out: &mut dyn Write, sweep: &TimeSweep) -> Result<()> {
        writeln!(out, "{:>10} {:>14} {:>14}", "time", "mean <Jx>", "mean <Jy>")?;
        for ((time, x), y) in sweep
            .times()
            .into_iter()
            .zip(sweep.mean_x_series())
            .zip(sweep.mean_y_series())
        {
            writeln!(out, "{time:>10.2} {x:>14.6} {y:>14.6}")?;
        }
        Ok(())
    }

    fn moment_fit(&self, out: &mut dyn Write, fit: &MomentFit) -> Result<()> {
        writeln!(
            out,
            "# <Jx>(t) = A * t^b with A = {:.4}, b = {:.4}",
            fit.law.coefficient, fit.law.exponent
        )?;
        writeln!(out, "{:>10} {:>14} {:>14}", "time", "mean <Jx>", "fitted")?;
        for ((time, mean), fitted) in fit.times.iter().zip(&fit.mean_x).zip(fit.fitted_curve()) {
            writeln!(out, "{time:>10.2} {mean:>14.6} {fitted:>14.6}")?;
        }
        Ok(())
    }

    fn width_curve(&self, out: &mut dyn Write, points: &[ScalingPoint]) -> Result<()> {
        writeln!(
            out,
            "{:>8} {:>14} {:>12} {:>12} {:>10}",
            "width", "y band", "mean A", "mean b", "converged"
        )?;
        for point in points {
            writeln!(
                out,
                "{:>8} {:>14} {:>12} {:>12} {:>10}",
                point.width,
                format!("[{}, {}]", point.y_min, point.y_max),
                fmt_optional(point.coefficient),
                fmt_optional(point.exponent),
                format!("{}/{}", point.converged(), point.repeats.len()),
            )?;
        }
        Ok(())
    }
}

/// Pretty-printed JSON documents, one per command.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReport;

#[derive(Serialize)]
struct HistogramDocument {
    runs: usize,
    x: Histogram,
    y: Histogram,
}

#[derive(Serialize)]
struct CloudDocument {
    x: Vec<(f64, f64)>,
    y: Vec<(f64, f64)>,
}

#[derive(Serialize)]
struct MeansDocument {
    times: Vec<f64>,
    mean_x: Vec<f64>,
    mean_y: Vec<f64>,
}

#[derive(Serialize)]
struct FitDocument<'a> {
    #[serde(flatten)]
    fit: &'a MomentFit,
    fitted: Vec<f64>,
}

impl JsonReport {
    fn emit<T: Serialize + ?Sized>(out: &mut dyn Write, value: &T) -> Result<()> {
        serde_json::to_writer_pretty(&mut *out, value)?;
        writeln!(out)?;
        Ok(())
    }
}

impl Visualizer for JsonReport {
    fn name(&self) -> &'static str {
        "json"
    }

    fn trajectory(&self, out: &mut dyn Write, trajectory: &Trajectory) -> Result<()> {
        Self::emit(out, trajectory)
    }

    fn final_positions(&self, out: &mut dyn Write, finals: &[Site], bins: usize) -> Result<()> {
        let (xs, ys) = axis_values(finals);
        Self::emit(
            out,
            &HistogramDocument {
                runs: finals.len(),
                x: Histogram::from_values(&xs, bins),
                y: Histogram::from_values(&ys, bins),
            },
        )
    }

    fn moment_cloud(&self, out: &mut dyn Write, sweep: &TimeSweep) -> Result<()> {
        Self::emit(
            out,
            &CloudDocument {
                x: sweep.noisy_x(),
                y: sweep.noisy_y(),
            },
        )
    }

    fn moment_means(&self, out: &mut dyn Write, sweep: &TimeSweep) -> Result<()> {
        Self::emit(
            out,
            &MeansDocument {
                times: sweep.times(),
                mean_x: sweep.mean_x_series(),
                mean_y: sweep.mean_y_series(),
            },
        )
    }

    fn moment_fit(&self, out: &mut dyn Write, fit: &MomentFit) -> Result<()> {
        Self::emit(
            out,
            &FitDocument {
                fit,
                fitted: fit.fitted_curve(),
            },
        )
    }

    fn width_curve(&self, out: &mut dyn Write, points: &[ScalingPoint]) -> Result<()> {
        Self::emit(out, points)
    }
}
