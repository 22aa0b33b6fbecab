//! Quenched waiting-time tables.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::QuenchError;

/// Heavy-tailed transform applied to each uniform draw in (0, 1].
#[inline]
fn power_law_wait(u: f64) -> f64 {
    u.powi(-2)
}

/// Fixed table of per-offset waiting times for one axis.
///
/// The entry at [`center`](Self::center) is always exactly zero.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WaitingTimeTable {
    values: Vec<f64>,
}

impl WaitingTimeTable {
    /// Draw a fresh shuffled table of `size` waiting times.
    pub fn generate<R: Rng + ?Sized>(size: usize, rng: &mut R) -> Result<Self, QuenchError> {
        if size == 0 {
            return Err(QuenchError::InvalidArgument(
                "waiting-time table size must be at least 1",
            ));
        }
        let mut values: Vec<f64> = (0..size)
            .map(|_| {
                // `random` yields [0, 1); flip it onto (0, 1] so the transform stays finite.
                let u = 1.0 - rng.random::<f64>();
                power_law_wait(u)
            })
            .collect();
        values.shuffle(rng);
        Ok(Self::with_zero_center(values))
    }

    /// Wrap explicit values, zeroing the center entry.
    pub fn from_values(values: Vec<f64>) -> Result<Self, QuenchError> {
        if values.is_empty() {
            return Err(QuenchError::InvalidArgument(
                "waiting-time table size must be at least 1",
            ));
        }
        if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(QuenchError::InvalidArgument(
                "waiting times must be finite and non-negative",
            ));
        }
        Ok(Self::with_zero_center(values))
    }

    fn with_zero_center(mut values: Vec<f64>) -> Self {
        let center = values.len() / 2;
        values[center] = 0.0;
        Self { values }
    }

    /// Floor-division center; for even sizes this sits one past the midpoint.
    #[must_use]
    pub fn center(&self) -> usize {
        self.values.len() / 2
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Waiting time at `index`; callers keep indices clamped to the table.
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> f64 {
        self.values[index]
    }

    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

/// The pair of per-axis tables a single trajectory walks through.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuenchedField {
    x: WaitingTimeTable,
    y: WaitingTimeTable,
}

impl QuenchedField {
    /// Draw the x table, then the y table, both of length `size`.
    pub fn generate<R: Rng + ?Sized>(size: usize, rng: &mut R) -> Result<Self, QuenchError> {
        let x = WaitingTimeTable::generate(size, rng)?;
        let y = WaitingTimeTable::generate(size, rng)?;
        Ok(Self { x, y })
    }

    /// Pair two explicit tables, which must have equal lengths.
    pub fn from_tables(x: WaitingTimeTable, y: WaitingTimeTable) -> Result<Self, QuenchError> {
        if x.len() != y.len() {
            return Err(QuenchError::InvalidArgument(
                "x and y waiting-time tables must have equal length",
            ));
        }
        Ok(Self { x, y })
    }

    #[must_use]
    pub fn x(&self) -> &WaitingTimeTable {
        &self.x
    }

    #[must_use]
    pub fn y(&self) -> &WaitingTimeTable {
        &self.y
    }

    /// Shared table length.
    #[must_use]
    pub fn size(&self) -> usize {
        self.x.len()
    }

    /// The trap rule: the slower axis sets the wait.
    #[inline]
    #[must_use]
    pub fn wait_at(&self, x_index: usize, y_index: usize) -> f64 {
        self.x.get(x_index).max(self.y.get(y_index))
    }
}
