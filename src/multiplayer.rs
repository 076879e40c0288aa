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

//! Multi-bag merger: aligns N Players' origins to the earliest recorded
//! message and advances globally by minimum playback time.

use crate::error::OpenError;
use crate::handler::{DeserializeError, Message};
use crate::player::{Player, PlayerOptions};
use crate::time::{Shift, Timestamp};
use std::path::Path;

/// Holds an ordered set of [`Player`]s and advances them in global
/// playback-time order.
pub struct MultiPlayer {
    players: Vec<Player>,
}

impl MultiPlayer {
    /// Open each of `paths` in order with the same origin/scale/allow_future
    /// settings, then shift every Player so that the earliest first_duration
    /// across all bags maps to `origin`.
    ///
    /// On any individual open failure, every already-opened Player is
    /// dropped and the error is returned; no partially-opened MultiPlayer is
    /// left behind.
    pub fn open<P, I>(paths: I, origin: Timestamp, scale: f64, allow_future: bool) -> Result<Self, OpenError>
    where
        P: AsRef<Path>,
        I: IntoIterator<Item = P>,
    {
        let mut players = Vec::new();
        for path in paths {
            let options = PlayerOptions { origin, scale, allow_future, ..Default::default() };
            match Player::open(path, options) {
                Ok(player) => players.push(player),
                Err(err) => return Err(err),
            }
        }

        let earliest = players.iter().map(Player::first_duration).min().unwrap_or_default();
        for player in &mut players {
            let delta = player.first_duration().saturating_sub(earliest).scaled(scale);
            player.shift(Shift::from_duration(delta));
        }

        Ok(MultiPlayer { players })
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Fan out a raw handler registration to every Player.
    pub fn register_raw<F>(&mut self, channel_filter: impl Into<String>, hash_filter: impl Into<String>, datatype_filter: impl Into<String>, callback: F)
    where
        F: FnMut(&str, crate::handler::RawView<'_>, Timestamp, crate::time::Duration) + Clone + 'static,
    {
        let channel_filter = channel_filter.into();
        let hash_filter = hash_filter.into();
        let datatype_filter = datatype_filter.into();
        for player in &mut self.players {
            player.register_raw(channel_filter.clone(), hash_filter.clone(), datatype_filter.clone(), callback.clone());
        }
    }

    /// Fan out a typed handler registration to every Player.
    pub fn register_typed<T, F>(&mut self, channel_filter: impl Into<String>, callback: F)
    where
        T: Message,
        F: FnMut(&str, &T, Timestamp, crate::time::Duration) + Clone + 'static,
    {
        let channel_filter = channel_filter.into();
        for player in &mut self.players {
            player.register_typed::<T, _>(channel_filter.clone(), callback.clone());
        }
    }

    /// Advance the Player whose pending record has the minimum playback
    /// time (ties broken by list order). Returns `true` iff at least one
    /// Player was not done at entry.
    pub fn advance(&mut self) -> Result<bool, DeserializeError> {
        let mut next_index = None;
        let mut min_time = None;
        let mut remaining = false;

        for (index, player) in self.players.iter().enumerate() {
            let Some(t) = player.peek_next_time() else { continue };
            remaining = true;
            if min_time.is_none() || Some(t) < min_time {
                min_time = Some(t);
                next_index = Some(index);
            }
        }

        if let Some(index) = next_index {
            self.players[index].advance()?;
        }

        Ok(remaining)
    }

    /// Shift every Player's origin by `delta`.
    pub fn shift(&mut self, delta: Shift) {
        for player in &mut self.players {
            player.shift(delta);
        }
    }
}
