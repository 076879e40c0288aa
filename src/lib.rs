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

#![warn(missing_docs)]

//! Core engine for replaying a recorded stream of timestamped, typed
//! pub/sub messages from a bag file.
//!
//! This crate reads a bag's records in file order, maps each recorded
//! timestamp onto a playback timestamp under an affine origin/scale
//! transform, and dispatches each record to handlers registered by
//! channel/hash/datatype. It does not parse message payloads itself — that
//! is the job of a message-serialization library reached only through the
//! [`Message`] capability trait — and it does not drive wallclock pacing or
//! logging output; callers pull records one at a time and supply a
//! [`diagnostic::Sink`] for non-fatal events.
//!
//! # Example
//!
//! ```no_run
//! use bagplayer::player::{Player, PlayerOptions};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut player = Player::open("recording.bag", PlayerOptions::default())?;
//!
//! player.register_raw("*", "*", "*", |topic, view, playback_time, _recorded_time| {
//!     let mut body = Vec::new();
//!     view.serialize(&mut body);
//!     println!("{topic} @ {playback_time:?}: {} bytes", body.len());
//! });
//!
//! while player.advance()? {
//!     // A real caller would wait for `playback_time` to elapse in
//!     // wallclock time here before calling `advance()` again.
//! }
//! # Ok(())
//! # }
//! ```

pub mod constants;
pub mod diagnostic;
pub mod error;
pub mod handler;
pub mod header;
pub mod multiplayer;
pub mod player;
pub mod reader;
pub mod stream;
pub mod time;
pub mod topic;

pub use diagnostic::{Diagnostic, Sink};
pub use error::{OpenError, RecordError};
pub use handler::{DeserializeError, HashMismatchPolicy, Message, RawView};
pub use multiplayer::MultiPlayer;
pub use player::{Player, PlayerOptions};
pub use time::{Duration, Shift, Timestamp};
pub use topic::TopicDescriptor;
