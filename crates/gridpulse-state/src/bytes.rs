//! Wide byte counters for storage accounting.
//!
//! Fleet-wide storage sums can exceed the 64-bit signed range, so byte
//! counters are held in a `u128` and serialized as decimal strings. They are
//! never routed through a float.

use std::fmt;
use std::iter::Sum;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A non-negative byte count, decimal-string encoded at rest and on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ByteCount(u128);

impl ByteCount {
    pub const ZERO: ByteCount = ByteCount(0);

    pub const fn new(value: u128) -> Self {
        ByteCount(value)
    }

    pub const fn get(self) -> u128 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Add, clamping at `u128::MAX` instead of wrapping.
    pub const fn saturating_add(self, other: ByteCount) -> ByteCount {
        ByteCount(self.0.saturating_add(other.0))
    }

    /// Usage as a percentage of `committed`, clamped to [0, 100].
    ///
    /// Returns 0 when nothing is committed. Precision loss in the division is
    /// acceptable here; the counters themselves stay exact.
    pub fn percent_of(self, committed: ByteCount) -> f64 {
        if committed.is_zero() {
            return 0.0;
        }
        let pct = (self.0 as f64 / committed.0 as f64) * 100.0;
        pct.clamp(0.0, 100.0)
    }
}

impl From<u64> for ByteCount {
    fn from(value: u64) -> Self {
        ByteCount(value as u128)
    }
}

impl From<u128> for ByteCount {
    fn from(value: u128) -> Self {
        ByteCount(value)
    }
}

impl fmt::Display for ByteCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ByteCount {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u128>().map(ByteCount)
    }
}

impl Sum for ByteCount {
    fn sum<I: Iterator<Item = ByteCount>>(iter: I) -> ByteCount {
        iter.fold(ByteCount::ZERO, ByteCount::saturating_add)
    }
}

impl Serialize for ByteCount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

struct ByteCountVisitor;

impl Visitor<'_> for ByteCountVisitor {
    type Value = ByteCount;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal string or non-negative integer byte count")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<ByteCount, E> {
        v.parse().map_err(|_| E::custom(format!("invalid byte count `{v}`")))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<ByteCount, E> {
        Ok(ByteCount(v as u128))
    }

    fn visit_u128<E: de::Error>(self, v: u128) -> Result<ByteCount, E> {
        Ok(ByteCount(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<ByteCount, E> {
        u128::try_from(v)
            .map(ByteCount)
            .map_err(|_| E::custom(format!("negative byte count `{v}`")))
    }
}

impl<'de> Deserialize<'de> for ByteCount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ByteCountVisitor)
    }
}
