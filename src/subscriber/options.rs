//! Location subscriber option bits and application lifecycle state.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

use serde::{Deserialize, Serialize};

/// Bitmask of what a location subscriber wants from the broker.
///
/// Options combine with `|`. The empty mask is a valid "soft removal" state:
/// the subscriber stays registered but contributes nothing and receives nothing.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriberOptions(u8);

impl SubscriberOptions {
    /// No options.
    pub const NONE: Self = Self(0);
    /// Ask the broker to run continuous updates; `desired_accuracy` takes part
    /// in the accuracy calculation. Implies receiving every broker location.
    pub const CONTINUOUS: Self = Self(1 << 0);
    /// Ask the broker to run significant-change monitoring. Implies receiving
    /// every broker location.
    pub const SIGNIFICANT_CHANGE: Self = Self(1 << 1);
    /// Forward general provider errors (requires an error receiver).
    pub const RECEIVE_ERRORS: Self = Self(1 << 2);
    /// Passively receive every location the broker gets, without affecting
    /// what the broker requests.
    pub const RECEIVE_ALL_LOCATIONS: Self = Self(1 << 3);
    /// Keep this subscriber active while the application is backgrounded.
    pub const RUN_IN_BACKGROUND: Self = Self(1 << 4);

    const ALL_BITS: u8 = 0b1_1111;

    /// Builds options from raw bits, discarding unknown bits.
    #[must_use]
    pub const fn from_bits_truncate(bits: u8) -> Self {
        Self(bits & Self::ALL_BITS)
    }

    /// Raw bit representation.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// True when no option is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True when every bit of `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// True when any bit of `other` is set.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// True if the subscriber should receive position batches.
    #[must_use]
    pub const fn wants_locations(self) -> bool {
        self.intersects(Self(
            Self::CONTINUOUS.0 | Self::SIGNIFICANT_CHANGE.0 | Self::RECEIVE_ALL_LOCATIONS.0,
        ))
    }

    /// True if a subscriber with these options takes part while in `state`.
    #[must_use]
    pub const fn is_active_in(self, state: AppState) -> bool {
        match state {
            AppState::Foreground => true,
            AppState::Background => self.contains(Self::RUN_IN_BACKGROUND),
        }
    }
}

impl BitOr for SubscriberOptions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for SubscriberOptions {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for SubscriberOptions {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl Not for SubscriberOptions {
    type Output = Self;

    fn not(self) -> Self {
        Self(!self.0 & Self::ALL_BITS)
    }
}

impl fmt::Debug for SubscriberOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(SubscriberOptions, &str); 5] = [
            (SubscriberOptions::CONTINUOUS, "CONTINUOUS"),
            (SubscriberOptions::SIGNIFICANT_CHANGE, "SIGNIFICANT_CHANGE"),
            (SubscriberOptions::RECEIVE_ERRORS, "RECEIVE_ERRORS"),
            (SubscriberOptions::RECEIVE_ALL_LOCATIONS, "RECEIVE_ALL_LOCATIONS"),
            (SubscriberOptions::RUN_IN_BACKGROUND, "RUN_IN_BACKGROUND"),
        ];

        if self.is_empty() {
            return write!(f, "SubscriberOptions(NONE)");
        }

        let names: Vec<&str> = NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "SubscriberOptions({})", names.join(" | "))
    }
}

/// Host application lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppState {
    /// Every subscriber takes part.
    #[default]
    Foreground,
    /// Only subscribers with `RUN_IN_BACKGROUND` take part.
    Background,
}
