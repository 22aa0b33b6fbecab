//! Driver plumbing for the quench command-line tool.

pub mod command;
pub mod report;

pub use command::{Command, FitArgs, HistogramArgs, MomentArgs, Outcome, SweepArgs, WalkArgs};
pub use report::{Format, Histogram, JsonReport, TextReport, Visualizer};
