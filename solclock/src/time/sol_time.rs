use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// A monotonic simulation timestamp, counted in ticks since the epoch.
///
/// A `SolInstant` is an opaque, totally ordered tick count. It can never be
/// negative, and the arithmetic provided here never wraps silently: the
/// checked methods surface overflow as `None` while the operator impls panic,
/// mirroring the standard library's time types.
///
/// # Examples
///
/// ```
/// use solclock::time::{SolDuration, SolInstant};
///
/// let t0 = SolInstant::EPOCH;
/// let t1 = t0 + SolDuration::from_ticks(3);
///
/// assert!(t1 > t0);
/// assert_eq!(t1.as_ticks(), 3);
/// assert_eq!(t1.duration_since(t0), SolDuration::from_ticks(3));
/// ```
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SolInstant {
    ticks: u64,
}

impl SolInstant {
    /// The starting point of simulation time: tick 0.
    pub const EPOCH: Self = Self { ticks: 0 };

    /// The latest representable instant.
    pub const MAX: Self = Self { ticks: u64::MAX };

    /// Creates an instant from a raw tick count.
    pub const fn from_ticks(ticks: u64) -> Self {
        Self { ticks }
    }

    /// Returns the raw tick count.
    pub const fn as_ticks(self) -> u64 {
        self.ticks
    }

    /// Adds a duration, returning `None` on overflow.
    pub const fn checked_add(self, duration: SolDuration) -> Option<Self> {
        match self.ticks.checked_add(duration.as_ticks()) {
            Some(ticks) => Some(Self { ticks }),
            None => None,
        }
    }

    /// Subtracts a duration, returning `None` on underflow.
    pub const fn checked_sub(self, duration: SolDuration) -> Option<Self> {
        match self.ticks.checked_sub(duration.as_ticks()) {
            Some(ticks) => Some(Self { ticks }),
            None => None,
        }
    }

    /// Returns the span elapsed since an earlier instant, or `None` if
    /// `earlier` is actually later than `self`.
    pub const fn checked_duration_since(self, earlier: Self) -> Option<SolDuration> {
        match self.ticks.checked_sub(earlier.ticks) {
            Some(ticks) => Some(SolDuration::from_ticks(ticks)),
            None => None,
        }
    }

    /// Returns the span elapsed since an earlier instant.
    ///
    /// # Panics
    ///
    /// Panics if `earlier` is later than `self`.
    pub fn duration_since(self, earlier: Self) -> SolDuration {
        self.checked_duration_since(earlier)
            .expect("the reference instant lies in the future of this instant")
    }
}

impl Add<SolDuration> for SolInstant {
    type Output = Self;

    /// Adds a duration.
    ///
    /// # Panics
    ///
    /// Panics if the resulting tick count overflows.
    fn add(self, rhs: SolDuration) -> Self {
        self.checked_add(rhs)
            .expect("overflow when adding a duration to a simulation instant")
    }
}

impl AddAssign<SolDuration> for SolInstant {
    fn add_assign(&mut self, rhs: SolDuration) {
        *self = *self + rhs;
    }
}

impl Sub<SolDuration> for SolInstant {
    type Output = Self;

    /// Subtracts a duration.
    ///
    /// # Panics
    ///
    /// Panics if the resulting tick count underflows.
    fn sub(self, rhs: SolDuration) -> Self {
        self.checked_sub(rhs)
            .expect("underflow when subtracting a duration from a simulation instant")
    }
}

impl SubAssign<SolDuration> for SolInstant {
    fn sub_assign(&mut self, rhs: SolDuration) {
        *self = *self - rhs;
    }
}

impl Sub<SolInstant> for SolInstant {
    type Output = SolDuration;

    /// Returns the span between two instants.
    ///
    /// # Panics
    ///
    /// Panics if `rhs` is later than `self`.
    fn sub(self, rhs: SolInstant) -> SolDuration {
        self.duration_since(rhs)
    }
}

impl fmt::Display for SolInstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tick {}", self.ticks)
    }
}

/// A span of simulation time, counted in ticks.
///
/// Durations are plain tick counts with checked arithmetic; they carry no
/// wall-clock meaning of their own.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SolDuration {
    ticks: u64,
}

impl SolDuration {
    /// The empty span.
    pub const ZERO: Self = Self { ticks: 0 };

    /// The longest representable span.
    pub const MAX: Self = Self { ticks: u64::MAX };

    /// Creates a duration from a raw tick count.
    pub const fn from_ticks(ticks: u64) -> Self {
        Self { ticks }
    }

    /// Returns the raw tick count.
    pub const fn as_ticks(self) -> u64 {
        self.ticks
    }

    /// Whether this span is zero ticks long.
    pub const fn is_zero(self) -> bool {
        self.ticks == 0
    }

    /// Adds two durations, returning `None` on overflow.
    pub const fn checked_add(self, rhs: Self) -> Option<Self> {
        match self.ticks.checked_add(rhs.ticks) {
            Some(ticks) => Some(Self { ticks }),
            None => None,
        }
    }

    /// Multiplies the duration by a scalar, returning `None` on overflow.
    pub const fn checked_mul(self, rhs: u64) -> Option<Self> {
        match self.ticks.checked_mul(rhs) {
            Some(ticks) => Some(Self { ticks }),
            None => None,
        }
    }
}

impl Add for SolDuration {
    type Output = Self;

    /// Adds two durations.
    ///
    /// # Panics
    ///
    /// Panics if the resulting tick count overflows.
    fn add(self, rhs: Self) -> Self {
        self.checked_add(rhs)
            .expect("overflow when adding simulation durations")
    }
}

impl AddAssign for SolDuration {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl fmt::Display for SolDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ticks", self.ticks)
    }
}
