//! Seeded uniform random stream with an explicit cursor.
//!
//! The build draws every random value through one [`UniformStream`]. Each
//! draw consumes exactly one 64-bit word of a `ChaCha8Rng` and advances the
//! cursor by one, so a stream reopened at `(seed, cursor)` continues exactly
//! where the previous owner stopped. Finishing the stream hands back the
//! final cursor and makes further draws impossible.

use std::fmt;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

/// Stream id reserved for the build cursor; node substreams start above it
const BUILD_STREAM: u64 = 0;

/// Offset into the build stream, counted in draws
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct RandomStreamCursor(u64);

impl RandomStreamCursor {
    pub fn new(position: u64) -> Self {
        Self(position)
    }

    pub fn position(&self) -> u64 {
        self.0
    }

    /// Draws made between `earlier` and `self`
    pub fn since(&self, earlier: RandomStreamCursor) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Display for RandomStreamCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Uniform draws from the build stream
#[derive(Debug)]
pub struct UniformStream {
    rng: ChaCha8Rng,
    cursor: RandomStreamCursor,
}

impl UniformStream {
    /// Open the stream at cursor 0
    pub fn new(seed: u64) -> Self {
        Self::at(seed, RandomStreamCursor::default())
    }

    /// Open the stream at an existing cursor
    pub fn at(seed: u64, cursor: RandomStreamCursor) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        rng.set_stream(BUILD_STREAM);
        // One draw is one u64, i.e. two 32-bit words
        rng.set_word_pos(u128::from(cursor.position()) * 2);
        Self { rng, cursor }
    }

    /// Draw a value uniformly from `[min, max)`
    pub fn draw(&mut self, min: f64, max: f64) -> f64 {
        let unit: f64 = self.rng.gen();
        self.cursor.0 += 1;
        min + (max - min) * unit
    }

    pub fn cursor(&self) -> RandomStreamCursor {
        self.cursor
    }

    /// Freeze the stream, returning the final cursor
    pub fn finish(self) -> RandomStreamCursor {
        self.cursor
    }
}

/// Private generator for one consumer (a node's motion, the link model).
///
/// Substreams share the seed but never the build stream, so drawing from
/// them leaves the build cursor untouched.
pub fn substream(seed: u64, id: u64) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(id.saturating_add(BUILD_STREAM + 1));
    rng
}
