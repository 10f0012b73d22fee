//! Dense ordering keys for steps within a sequence.
//!
//! A [`Location`] is either one of the two sentinels ([`Location::Beginning`],
//! [`Location::End`]) or an assignable [`Position`]. Positions are strictly
//! positive dyadic rationals (`mantissa / 2^scale`) with an arbitrary-precision
//! mantissa, so there is always room for any number of new keys between two
//! distinct locations and existing keys never need to be renumbered.
//!
//! The canonical text form of a position is its exact decimal expansion
//! (every dyadic rational has a finite one), e.g. `3`, `2.5` or `1.625`.
//! Sentinels render as `beginning` and `end`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use num_bigint::BigUint;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Result type for ordering operations.
pub type LocationResult<T> = Result<T, LocationError>;

/// Misuse of the ordering API.
///
/// These are programmer errors (bad bounds, malformed keys) and are kept apart
/// from the domain outcomes of sequence expansion.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    #[error("location value must be positive, got {0}")]
    NonPositive(String),

    #[error("no room between {before} and {after}: lower bound is not below upper bound")]
    EmptyRange { before: Location, after: Location },

    #[error("malformed location key '{0}'")]
    Malformed(String),
}

/// An assignable ordering key: the positive value `mantissa / 2^scale`.
///
/// Always kept in normal form (odd mantissa, or zero scale) so that equal
/// values have identical representations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Position {
    mantissa: BigUint,
    scale: u32,
}

impl Position {
    fn new(mantissa: BigUint, scale: u32) -> LocationResult<Self> {
        if mantissa == BigUint::default() {
            return Err(LocationError::NonPositive(mantissa.to_string()));
        }
        let shift = mantissa
            .trailing_zeros()
            .map_or(0, |tz| tz.min(u64::from(scale)) as u32);
        Ok(Self {
            mantissa: mantissa >> shift,
            scale: scale - shift,
        })
    }

    /// Mantissa of this value when expressed with `scale` fractional bits.
    fn mantissa_at(&self, scale: u32) -> BigUint {
        &self.mantissa << (scale - self.scale)
    }

    /// Integer part of the value.
    fn floor(&self) -> BigUint {
        &self.mantissa >> self.scale
    }

    /// Whether the value is a whole number.
    pub fn is_integer(&self) -> bool {
        self.scale == 0
    }
}

impl Ord for Position {
    fn cmp(&self, other: &Self) -> Ordering {
        let scale = self.scale.max(other.scale);
        self.mantissa_at(scale).cmp(&other.mantissa_at(scale))
    }
}

impl PartialOrd for Position {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale == 0 {
            return write!(f, "{}", self.mantissa);
        }
        // m / 2^s == m * 5^s / 10^s
        let scale = self.scale as usize;
        let digits = (&self.mantissa * BigUint::from(5u32).pow(self.scale)).to_string();
        let digits = format!("{:0>width$}", digits, width = scale + 1);
        let (whole, fraction) = digits.split_at(digits.len() - scale);
        write!(f, "{}.{}", whole, fraction)
    }
}

impl FromStr for Position {
    type Err = LocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || LocationError::Malformed(s.to_string());
        let (whole, fraction) = match s.split_once('.') {
            Some((w, f)) if !f.is_empty() => (w, f),
            Some(_) => return Err(malformed()),
            None => (s, ""),
        };
        if whole.is_empty()
            || !whole.bytes().all(|b| b.is_ascii_digit())
            || !fraction.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(malformed());
        }

        let scale = u32::try_from(fraction.len()).map_err(|_| malformed())?;
        let digits: BigUint = format!("{whole}{fraction}").parse().map_err(|_| malformed())?;
        let five_pow = BigUint::from(5u32).pow(scale);
        // d / 10^k is dyadic only when 5^k divides d
        if &digits % &five_pow != BigUint::default() {
            return Err(malformed());
        }
        Position::new(digits / five_pow, scale).map_err(|_| LocationError::NonPositive(s.into()))
    }
}

/// Position of a step within its observation's sequence.
///
/// Ordered `Beginning < Middle(_) < End`; middles compare by value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Location {
    /// Lower bound of every sequence; never assigned to a step.
    Beginning,
    /// An assignable key.
    Middle(Position),
    /// Upper bound of every sequence; never assigned to a step.
    End,
}

impl Location {
    /// Integer key `n`. Fails unless `n >= 1`.
    pub fn middle(n: i64) -> LocationResult<Self> {
        let value = u64::try_from(n).map_err(|_| LocationError::NonPositive(n.to_string()))?;
        Self::middle_big(BigUint::from(value))
    }

    /// Integer key of arbitrary magnitude. Fails for zero.
    pub fn middle_big(n: BigUint) -> LocationResult<Self> {
        Position::new(n, 0).map(Location::Middle)
    }

    /// True for keys that may be held by a step.
    pub fn is_assignable(&self) -> bool {
        matches!(self, Location::Middle(_))
    }

    /// Find `count` fresh, strictly increasing locations strictly between
    /// `before` and `after`.
    ///
    /// When `before` and `after` are adjacent keys of a sequence (or the
    /// sentinels standing in for missing neighbours), none of the returned
    /// keys can collide with a key already held in that sequence.
    ///
    /// Fails with [`LocationError::EmptyRange`] when `before >= after`.
    pub fn find(count: usize, before: &Location, after: &Location) -> LocationResult<Vec<Location>> {
        if before >= after {
            return Err(LocationError::EmptyRange {
                before: before.clone(),
                after: after.clone(),
            });
        }
        if count == 0 {
            return Ok(Vec::new());
        }

        let lower = match before {
            Location::Beginning => None,
            Location::Middle(p) => Some(p),
            Location::End => unreachable_bound(before, after)?,
        };

        match after {
            // Open-ended: whole numbers past the lower bound.
            Location::End => {
                let base = lower.map(Position::floor).unwrap_or_default();
                (1..=count as u64)
                    .map(|i| Position::new(&base + BigUint::from(i), 0).map(Location::Middle))
                    .collect()
            }
            Location::Middle(upper) => {
                let mut scale = lower.map_or(upper.scale, |p| p.scale.max(upper.scale));
                let mut lo = lower.map(|p| p.mantissa_at(scale)).unwrap_or_default();
                let mut hi = upper.mantissa_at(scale);
                let slots = BigUint::from(count as u64 + 1);

                // Refine until `count` mantissas fit strictly inside (lo, hi).
                while &hi - &lo < slots {
                    lo <<= 1u32;
                    hi <<= 1u32;
                    scale += 1;
                }

                let stride = (&hi - &lo) / &slots;
                (1..=count as u64)
                    .map(|i| {
                        Position::new(&lo + &stride * BigUint::from(i), scale).map(Location::Middle)
                    })
                    .collect()
            }
            Location::Beginning => unreachable_bound(before, after),
        }
    }
}

// Sentinel orderings already rejected by the `before >= after` check.
fn unreachable_bound<T>(before: &Location, after: &Location) -> LocationResult<T> {
    Err(LocationError::EmptyRange {
        before: before.clone(),
        after: after.clone(),
    })
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Beginning => f.write_str("beginning"),
            Location::Middle(p) => fmt::Display::fmt(p, f),
            Location::End => f.write_str("end"),
        }
    }
}

impl FromStr for Location {
    type Err = LocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "beginning" => Ok(Location::Beginning),
            "end" => Ok(Location::End),
            other => other.parse().map(Location::Middle),
        }
    }
}

impl Serialize for Location {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Location {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[path = "location_tests.rs"]
mod location_tests;
