//! Rational presentation timestamps
//!
//! Output timestamps are kept as `value / timescale` so that a frame index
//! multiplied by the nominal frame duration is exact (1/30 s has no exact
//! nanosecond representation).

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::Add;

/// A point on the presentation timeline, in units of `1 / timescale` seconds
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MediaTime {
    pub value: i64,
    pub timescale: u32,
}

impl MediaTime {
    /// Zero at the default timescale
    pub const ZERO: MediaTime = MediaTime {
        value: 0,
        timescale: 1,
    };

    pub fn new(value: i64, timescale: u32) -> Self {
        Self {
            value,
            timescale: timescale.max(1),
        }
    }

    /// Duration of one frame at `fps`
    pub fn frame_duration(fps: u32) -> Self {
        Self::new(1, fps)
    }

    /// `self` repeated `count` times
    pub fn times(self, count: u64) -> Self {
        Self::new(self.value.saturating_mul(count as i64), self.timescale)
    }

    /// Re-express this time at another timescale (exact when `timescale` is a
    /// multiple of the current one)
    pub fn rescaled(self, timescale: u32) -> Self {
        let timescale = timescale.max(1);
        if timescale == self.timescale {
            return self;
        }
        let value = (self.value as i128 * timescale as i128) / self.timescale as i128;
        Self::new(value as i64, timescale)
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.value as f64 / self.timescale as f64
    }

    pub fn as_millis(&self) -> i64 {
        ((self.value as i128 * 1000) / self.timescale as i128) as i64
    }

    fn common_timescale(a: u32, b: u32) -> u32 {
        if a == b {
            return a;
        }
        let lcm = (a as u64 / gcd(a as u64, b as u64)) * b as u64;
        u32::try_from(lcm).unwrap_or(a.max(b))
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a.max(1)
}

impl Default for MediaTime {
    fn default() -> Self {
        Self::ZERO
    }
}

impl Add for MediaTime {
    type Output = MediaTime;

    fn add(self, rhs: MediaTime) -> MediaTime {
        let timescale = Self::common_timescale(self.timescale, rhs.timescale);
        let a = self.rescaled(timescale);
        let b = rhs.rescaled(timescale);
        MediaTime::new(a.value.saturating_add(b.value), timescale)
    }
}

impl PartialEq for MediaTime {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MediaTime {}

impl PartialOrd for MediaTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MediaTime {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = self.value as i128 * other.timescale as i128;
        let rhs = other.value as i128 * self.timescale as i128;
        lhs.cmp(&rhs)
    }
}

impl fmt::Display for MediaTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.value, self.timescale)
    }
}
