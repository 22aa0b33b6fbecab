//! Single-trajectory walk through a quenched field.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::field::QuenchedField;
use crate::jump::{Jump, JumpSampler};
use crate::{QuenchError, WalkParams};

/// Integer lattice site.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Site {
    pub x: i64,
    pub y: i64,
}

impl Site {
    pub const ORIGIN: Site = Site { x: 0, y: 0 };

    #[must_use]
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

/// Periodic reset on `y`: leaving through one edge re-enters at the other.
///
/// Only a single-unit overshoot is expected, so this is a hard reset rather than a
/// modulo reduction.
#[inline]
#[must_use]
pub fn wrap_periodic(candidate: i64, min: i64, max: i64) -> i64 {
    if candidate > max {
        min
    } else if candidate < min {
        max
    } else {
        candidate
    }
}

#[inline]
fn shift_index(index: usize, delta: i64, len: usize) -> usize {
    if delta == 0 {
        return index;
    }
    let last = len.saturating_sub(1) as i64;
    (index as i64 + delta).clamp(0, last) as usize
}

/// Recorded history of one walk: positions and cumulative times, index aligned.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Trajectory {
    pub positions: Vec<Site>,
    pub times: Vec<f64>,
}

impl Trajectory {
    /// Number of jumps taken (history length minus the initial state).
    #[must_use]
    pub fn steps(&self) -> usize {
        self.positions.len().saturating_sub(1)
    }

    #[must_use]
    pub fn final_position(&self) -> Site {
        self.positions.last().copied().unwrap_or(Site::ORIGIN)
    }

    #[must_use]
    pub fn final_time(&self) -> f64 {
        self.times.last().copied().unwrap_or(0.0)
    }

    /// Arithmetic mean of x and y over the full position history.
    #[must_use]
    pub fn mean_position(&self) -> (f64, f64) {
        if self.positions.is_empty() {
            return (0.0, 0.0);
        }
        let (sum_x, sum_y) = self
            .positions
            .iter()
            .fold((0.0_f64, 0.0_f64), |(sx, sy), site| {
                (sx + site.x as f64, sy + site.y as f64)
            });
        let n = self.positions.len() as f64;
        (sum_x / n, sum_y / n)
    }
}

/// Mutable walker state; the field it reads is borrowed, never owned.
#[derive(Debug, Clone)]
pub struct WalkState {
    position: Site,
    x_index: usize,
    y_index: usize,
    elapsed: f64,
    history: Trajectory,
}

impl WalkState {
    /// Walker at the origin at time zero, indices on the table center.
    #[must_use]
    pub fn new(table_size: usize) -> Self {
        let center = table_size / 2;
        Self {
            position: Site::ORIGIN,
            x_index: center,
            y_index: center,
            elapsed: 0.0,
            history: Trajectory {
                positions: vec![Site::ORIGIN],
                times: vec![0.0],
            },
        }
    }

    #[must_use]
    pub fn position(&self) -> Site {
        self.position
    }

    #[must_use]
    pub fn indices(&self) -> (usize, usize) {
        (self.x_index, self.y_index)
    }

    #[must_use]
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    #[must_use]
    pub fn history(&self) -> &Trajectory {
        &self.history
    }

    #[must_use]
    pub fn into_history(self) -> Trajectory {
        self.history
    }

    /// Apply one jump and record it; returns the waiting time charged for it.
    pub fn step(&mut self, jump: Jump, field: &QuenchedField, y_min: i64, y_max: i64) -> f64 {
        let (dx, dy) = jump.delta();
        self.position.x += dx;
        self.position.y = wrap_periodic(self.position.y + dy, y_min, y_max);

        let size = field.size();
        self.x_index = shift_index(self.x_index, dx, size);
        self.y_index = shift_index(self.y_index, dy, size);

        let wait = if self.position == Site::ORIGIN {
            0.0
        } else {
            field.wait_at(self.x_index, self.y_index)
        };
        self.elapsed += wait;
        self.history.positions.push(self.position);
        self.history.times.push(self.elapsed);
        wait
    }
}

/// Runs trajectories for one validated parameter set.
#[derive(Debug, Clone, Copy)]
pub struct WalkEngine {
    params: WalkParams,
    sampler: JumpSampler,
}

impl WalkEngine {
    pub fn new(params: WalkParams) -> Result<Self, QuenchError> {
        params.validate()?;
        Ok(Self {
            params,
            sampler: JumpSampler::new(),
        })
    }

    #[must_use]
    pub fn params(&self) -> &WalkParams {
        &self.params
    }

    /// Draw a fresh quenched field and walk it until the time limit is reached.
    pub fn run<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Trajectory, QuenchError> {
        let field = QuenchedField::generate(self.params.table_size, rng)?;
        Ok(self.run_in_field(&field, rng))
    }

    /// Walk an explicit field. The field's size takes precedence over `table_size`.
    ///
    /// The last recorded time may overshoot the limit; it is not interpolated back.
    pub fn run_in_field<R: Rng + ?Sized>(&self, field: &QuenchedField, rng: &mut R) -> Trajectory {
        let WalkParams {
            sim_time_limit,
            y_min,
            y_max,
            ..
        } = self.params;
        let mut state = WalkState::new(field.size());
        while state.elapsed() < sim_time_limit {
            let jump = self.sampler.sample(rng);
            state.step(jump, field, y_min, y_max);
        }
        state.into_history()
    }
}
