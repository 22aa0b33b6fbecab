//! Biased nearest-neighbour jump distribution.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// One of the four unit steps on the lattice.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Jump {
    Right,
    Left,
    Up,
    Down,
}

impl Jump {
    pub const ALL: [Jump; 4] = [Jump::Right, Jump::Left, Jump::Up, Jump::Down];

    /// Lattice displacement `(dx, dy)`.
    #[must_use]
    pub const fn delta(self) -> (i64, i64) {
        match self {
            Self::Right => (1, 0),
            Self::Left => (-1, 0),
            Self::Up => (0, 1),
            Self::Down => (0, -1),
        }
    }

    /// Exact probability assigned by [`JumpSampler`].
    #[must_use]
    pub const fn probability(self) -> f64 {
        match self {
            Self::Right => 3.0 / 8.0,
            Self::Left => 1.0 / 8.0,
            Self::Up | Self::Down => 1.0 / 4.0,
        }
    }
}

/// Categorical sampler over [`Jump`] with a rightward drift.
#[derive(Debug, Clone, Copy, Default)]
pub struct JumpSampler;

impl JumpSampler {
    const RIGHT_BELOW: f64 = 3.0 / 8.0;
    const LEFT_BELOW: f64 = 3.0 / 8.0 + 1.0 / 8.0;
    const UP_BELOW: f64 = 3.0 / 8.0 + 1.0 / 8.0 + 1.0 / 4.0;

    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Map one uniform draw in [0, 1) onto a jump.
    #[must_use]
    pub fn classify(r: f64) -> Jump {
        if r < Self::RIGHT_BELOW {
            Jump::Right
        } else if r < Self::LEFT_BELOW {
            Jump::Left
        } else if r < Self::UP_BELOW {
            Jump::Up
        } else {
            Jump::Down
        }
    }

    /// Draw the next jump using a single uniform variate.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Jump {
        Self::classify(rng.random::<f64>())
    }
}
