// Copyright (c) 2023 Contributors to the Eclipse Foundation
//
// See the NOTICE file(s) distributed with this work for additional
// information regarding copyright ownership.
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fixed-width duration/time types and the affine time mapper.

use std::cmp::Ordering;
use std::ops::{Add, Sub};

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// A `(sec, nsec)` duration as it appears on the wire, with `nsec` always
/// normalized into `[0, 1_000_000_000)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Duration {
    pub sec: u32,
    pub nsec: u32,
}

impl Duration {
    pub const ZERO: Duration = Duration { sec: 0, nsec: 0 };

    pub fn new(sec: u32, nsec: u32) -> Self {
        Duration { sec, nsec }
    }

    fn as_nanos(self) -> u64 {
        self.sec as u64 * NANOS_PER_SEC + self.nsec as u64
    }

    fn from_nanos(total: u64) -> Self {
        Duration {
            sec: (total / NANOS_PER_SEC) as u32,
            nsec: (total % NANOS_PER_SEC) as u32,
        }
    }

    /// `self - other`, saturating at zero rather than wrapping or panicking,
    /// so a caller can always subtract a possibly-later `first_duration`
    /// without checking order first.
    pub fn saturating_sub(self, other: Duration) -> Duration {
        let a = self.as_nanos();
        let b = other.as_nanos();
        Duration::from_nanos(a.saturating_sub(b))
    }

    /// Scale this duration by `1 / scale` seconds of wallclock per second of
    /// recorded time, rounding to the nearest nanosecond.
    pub fn scaled(self, scale: f64) -> Duration {
        let nanos = self.as_nanos() as f64 / scale;
        Duration::from_nanos(nanos.round() as u64)
    }
}

impl PartialOrd for Duration {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Duration {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_nanos().cmp(&other.as_nanos())
    }
}

impl Add for Duration {
    type Output = Duration;
    fn add(self, rhs: Duration) -> Duration {
        Duration::from_nanos(self.as_nanos() + rhs.as_nanos())
    }
}

impl Sub for Duration {
    type Output = Duration;
    fn sub(self, rhs: Duration) -> Duration {
        self.saturating_sub(rhs)
    }
}

/// A signed time shift, applied to playback timestamps by [`Duration`]
/// arithmetic that can move a [`Timestamp`] backward as well as forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Shift {
    nanos: i64,
}

impl Shift {
    pub fn from_duration(d: Duration) -> Self {
        Shift { nanos: d.as_nanos() as i64 }
    }

    pub fn negate(self) -> Self {
        Shift { nanos: -self.nanos }
    }
}

/// A playback timestamp; same wire shape as [`Duration`] but a distinct type
/// since it lives in a different frame (origin-relative wallclock, not
/// recorded-epoch-relative).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timestamp {
    pub sec: u32,
    pub nsec: u32,
}

impl Timestamp {
    pub fn from_duration(d: Duration) -> Self {
        Timestamp { sec: d.sec, nsec: d.nsec }
    }

    fn as_nanos(self) -> i64 {
        self.sec as i64 * NANOS_PER_SEC as i64 + self.nsec as i64
    }

    fn from_nanos(total: i64) -> Self {
        let total = total.max(0);
        Timestamp {
            sec: (total / NANOS_PER_SEC as i64) as u32,
            nsec: (total % NANOS_PER_SEC as i64) as u32,
        }
    }

    pub fn shift(self, shift: Shift) -> Timestamp {
        Timestamp::from_nanos(self.as_nanos() + shift.nanos)
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_nanos().cmp(&other.as_nanos())
    }
}

/// Maps recorded durations onto playback timestamps under an affine
/// transform: `playback = origin + (recorded - first_duration) / scale`.
///
/// `scale > 1.0` plays back slower than it was recorded (more wallclock
/// seconds per recorded second); `scale < 1.0` plays back faster.
#[derive(Debug, Clone, Copy)]
pub struct TimeMapper {
    origin: Timestamp,
    scale: f64,
    first_duration: Option<Duration>,
}

impl TimeMapper {
    pub fn new(origin: Timestamp, scale: f64) -> Self {
        TimeMapper { origin, scale, first_duration: None }
    }

    pub fn origin(&self) -> Timestamp {
        self.origin
    }

    pub fn first_duration(&self) -> Duration {
        self.first_duration.unwrap_or(Duration::ZERO)
    }

    /// Record a newly observed recorded duration, revising `first_duration`
    /// downward (with a caller-visible signal) if it arrived out of order.
    /// Returns `Some(previous)` when a downward revision occurred.
    pub fn observe(&mut self, recorded: Duration) -> Option<Duration> {
        match self.first_duration {
            None => {
                self.first_duration = Some(recorded);
                None
            }
            Some(first) if recorded < first => {
                self.first_duration = Some(recorded);
                Some(first)
            }
            Some(_) => None,
        }
    }

    /// Map a recorded duration to a playback timestamp using the current
    /// `first_duration`. Call [`TimeMapper::observe`] first.
    pub fn map(&self, recorded: Duration) -> Timestamp {
        let elapsed = recorded.saturating_sub(self.first_duration());
        let shift = Shift::from_duration(elapsed.scaled(self.scale));
        self.origin.shift(shift)
    }

    /// Shift the origin (and thus all future mapped timestamps) by `delta`.
    pub fn shift_origin(&mut self, delta: Shift) {
        self.origin = self.origin.shift(delta);
    }
}
