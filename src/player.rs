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

//! The Player: composes the byte stream, header codec, record reader, topic
//! registry, handler table, and time mapper into a single pull-driven
//! playback cursor over one bag file.

use crate::diagnostic::{default_sink, Diagnostic, Sink};
use crate::error::OpenError;
use crate::handler::{DeserializeError, HandlerTable, HashMismatchPolicy, Message, Record};
use crate::reader::RecordReader;
use crate::stream::{BufferedByteStream, ByteStream};
use crate::time::{Duration, Shift, TimeMapper, Timestamp};
use std::path::Path;
use std::sync::Arc;

/// Construction-time options for [`Player::open`], following a builder
/// pattern rather than a long positional constructor.
pub struct PlayerOptions {
    pub origin: Timestamp,
    pub scale: f64,
    pub allow_future: bool,
    pub sink: Option<Arc<dyn Sink>>,
    pub hash_mismatch_policy: HashMismatchPolicy,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        PlayerOptions {
            origin: Timestamp::default(),
            scale: 1.0,
            allow_future: false,
            sink: None,
            hash_mismatch_policy: HashMismatchPolicy::default(),
        }
    }
}

struct NextRecord {
    channel_name: String,
    recorded_time: Duration,
    playback_time: Timestamp,
    caller_id: Option<String>,
    latching: bool,
    body_len: usize,
}

/// A pull-driven cursor over one bag file's records.
pub struct Player {
    stream: Option<Box<dyn ByteStream>>,
    reader: RecordReader,
    handlers: HandlerTable,
    mapper: TimeMapper,
    body: Vec<u8>,
    next: Option<NextRecord>,
    duration: Duration,
    done: bool,
    sink: Arc<dyn Sink>,
}

impl Player {
    /// Open `path`, which must have a `.bag` extension, run version
    /// detection, and prime the first pending record.
    pub fn open(path: impl AsRef<Path>, options: PlayerOptions) -> Result<Self, OpenError> {
        let path = path.as_ref();
        if path.extension().and_then(|ext| ext.to_str()) != Some("bag") {
            return Err(OpenError::WrongExtension);
        }

        let sink = options.sink.unwrap_or_else(default_sink);
        let mut stream = BufferedByteStream::open_file(path)?;
        let reader = RecordReader::detect_version(&mut stream, options.allow_future, &sink)?;

        let mut player = Player {
            stream: Some(Box::new(stream)),
            reader,
            handlers: HandlerTable::with_policy(options.hash_mismatch_policy),
            mapper: TimeMapper::new(options.origin, options.scale),
            body: Vec::new(),
            next: None,
            duration: Duration::ZERO,
            done: false,
            sink,
        };
        player.advance_inner();
        Ok(player)
    }

    /// Build a Player directly over an already-open stream (used by tests
    /// and by callers composing their own decompression filter upstream).
    pub fn open_stream(mut stream: Box<dyn ByteStream>, options: PlayerOptions) -> Result<Self, OpenError> {
        let sink = options.sink.unwrap_or_else(default_sink);
        let reader = RecordReader::detect_version(stream.as_mut(), options.allow_future, &sink)?;
        let mut player = Player {
            stream: Some(stream),
            reader,
            handlers: HandlerTable::with_policy(options.hash_mismatch_policy),
            mapper: TimeMapper::new(options.origin, options.scale),
            body: Vec::new(),
            next: None,
            duration: Duration::ZERO,
            done: false,
            sink,
        };
        player.advance_inner();
        Ok(player)
    }

    pub fn register_raw<F>(&mut self, channel_filter: impl Into<String>, hash_filter: impl Into<String>, datatype_filter: impl Into<String>, callback: F)
    where
        F: FnMut(&str, crate::handler::RawView<'_>, Timestamp, Duration) + 'static,
    {
        self.handlers.register_raw(channel_filter, hash_filter, datatype_filter, callback);
    }

    pub fn register_typed<T, F>(&mut self, channel_filter: impl Into<String>, callback: F)
    where
        T: Message,
        F: FnMut(&str, &T, Timestamp, Duration) + 'static,
    {
        self.handlers.register_typed::<T, F>(channel_filter, callback);
    }

    pub fn peek_next_time(&self) -> Option<Timestamp> {
        if self.done {
            None
        } else {
            self.next.as_ref().map(|n| n.playback_time)
        }
    }

    pub fn first_duration(&self) -> Duration {
        self.mapper.first_duration()
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Dispatch the current pending record, then read the next one.
    /// Returns `true` iff a record was dispatched.
    pub fn advance(&mut self) -> Result<bool, DeserializeError> {
        if self.done {
            return Ok(false);
        }
        let Some(next) = self.next.take() else {
            return Ok(false);
        };

        let descriptor = self.reader.registry.get(&next.channel_name).expect("descriptor registered before dispatch");
        let record = Record {
            channel_name: &next.channel_name,
            hash: &descriptor.hash,
            datatype: &descriptor.datatype,
            definition: &descriptor.definition,
            caller_id: next.caller_id.as_deref(),
            latching: next.latching,
            body: &self.body[..next.body_len],
            playback_time: next.playback_time,
            recorded_time: next.recorded_time,
        };
        self.handlers.dispatch(&record)?;

        self.advance_inner();
        Ok(true)
    }

    /// Shift the origin (and any already-computed pending playback time) by
    /// `delta`.
    pub fn shift(&mut self, delta: Shift) {
        self.mapper.shift_origin(delta);
        if let Some(next) = &mut self.next {
            next.playback_time = next.playback_time.shift(delta);
        }
    }

    /// Release the stream and topic registry. Terminal: no further
    /// `advance` calls will perform I/O.
    pub fn close(&mut self) {
        self.stream = None;
        self.reader.registry = crate::topic::TopicRegistry::new();
        self.next = None;
        self.done = true;
    }

    fn advance_inner(&mut self) {
        let Some(stream) = self.stream.as_deref_mut() else {
            self.done = true;
            return;
        };

        match self.reader.read_next(stream, &mut self.body, &self.sink) {
            Ok(Some(pending)) => {
                if let Some(previous_first) = self.mapper.observe(pending.recorded) {
                    self.sink.emit(Diagnostic::OutOfOrderRecord {
                        topic: pending.channel_name.clone(),
                        first_duration: previous_first,
                        revised_to: pending.recorded,
                    });
                }
                self.duration = pending.recorded.saturating_sub(self.mapper.first_duration());
                let playback_time = self.mapper.map(pending.recorded);
                self.next = Some(NextRecord {
                    channel_name: pending.channel_name,
                    recorded_time: pending.recorded,
                    playback_time,
                    caller_id: pending.caller_id,
                    latching: pending.latching,
                    body_len: pending.body_len as usize,
                });
            }
            Ok(None) => {
                self.done = true;
                self.next = None;
            }
            Err(err) => {
                tracing::error!(error = %err, "bag record parse failed; player is now done");
                self.done = true;
                self.next = None;
            }
        }
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header;
    use std::cell::RefCell;
    use std::io::Cursor;
    use std::rc::Rc;

    fn v102_record(fields: &[(&str, &[u8])], body: &[u8]) -> Vec<u8> {
        let header_bytes = header::encode(fields);
        let mut out = Vec::new();
        out.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
        out.extend_from_slice(&header_bytes);
        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        out.extend_from_slice(body);
        out
    }

    fn bag_bytes(records: &[Vec<u8>]) -> Vec<u8> {
        let mut out = b"#ROSBAG V1.2\n".to_vec();
        for r in records {
            out.extend_from_slice(r);
        }
        out
    }

    fn msg_def(topic: &str, md5: &str, datatype: &str, def: &str) -> Vec<u8> {
        v102_record(
            &[
                ("op", &[1u8]),
                ("topic", topic.as_bytes()),
                ("md5", md5.as_bytes()),
                ("type", datatype.as_bytes()),
                ("def", def.as_bytes()),
            ],
            &[],
        )
    }

    fn msg_data(topic: &str, md5: &str, datatype: &str, sec: u32, nsec: u32, body: &[u8]) -> Vec<u8> {
        v102_record(
            &[
                ("op", &[2u8]),
                ("topic", topic.as_bytes()),
                ("md5", md5.as_bytes()),
                ("type", datatype.as_bytes()),
                ("sec", &sec.to_le_bytes()),
                ("nsec", &nsec.to_le_bytes()),
            ],
            body,
        )
    }

    fn open_bytes(bytes: Vec<u8>, options: PlayerOptions) -> Player {
        let stream = BufferedByteStream::new(Cursor::new(bytes));
        Player::open_stream(Box::new(stream), options).unwrap()
    }

    /// Minimal V1.2 bag with one MSG_DEF then one MSG_DATA.
    #[test]
    fn minimal_bag_dispatches_one_record_at_origin() {
        let hash = "a".repeat(32);
        let bytes = bag_bytes(&[
            msg_def("/a", &hash, "pkg/T", ""),
            msg_data("/a", &hash, "pkg/T", 10, 0, &[1, 2, 3, 4]),
        ]);

        let origin = Timestamp { sec: 500, nsec: 0 };
        let mut player = open_bytes(bytes, PlayerOptions { origin, ..Default::default() });

        assert_eq!(player.first_duration(), Duration::new(10, 0));
        assert_eq!(player.peek_next_time(), Some(origin));

        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen2 = seen.clone();
        player.register_raw("*", "*", "*", move |_, view, _, _| {
            let mut out = Vec::new();
            view.serialize(&mut out);
            seen2.borrow_mut().push(out);
        });

        assert!(player.advance().unwrap());
        assert_eq!(*seen.borrow(), vec![vec![1, 2, 3, 4]]);
        assert!(!player.advance().unwrap());
        assert!(player.is_done());
    }

    /// Two MSG_DATA records, origin=1000, scale=2.
    #[test]
    fn scale_and_origin_are_applied() {
        let hash = "b".repeat(32);
        let bytes = bag_bytes(&[
            msg_data("/a", &hash, "pkg/T", 10, 0, b"x"),
            msg_data("/a", &hash, "pkg/T", 12, 500_000_000, b"y"),
        ]);

        let origin = Timestamp { sec: 1000, nsec: 0 };
        let mut player = open_bytes(bytes, PlayerOptions { origin, scale: 2.0, ..Default::default() });

        assert_eq!(player.peek_next_time(), Some(Timestamp { sec: 1000, nsec: 0 }));
        player.advance().unwrap();
        assert_eq!(player.peek_next_time(), Some(Timestamp { sec: 1001, nsec: 250_000_000 }));
    }

    /// Out-of-order records revise first_duration downward.
    #[test]
    fn out_of_order_record_revises_first_duration() {
        let hash = "c".repeat(32);
        let bytes = bag_bytes(&[
            msg_data("/a", &hash, "pkg/T", 20, 0, b"x"),
            msg_data("/a", &hash, "pkg/T", 15, 0, b"y"),
        ]);
        let mut player = open_bytes(bytes, PlayerOptions::default());

        assert_eq!(player.first_duration(), Duration::new(20, 0));
        assert_eq!(player.peek_next_time(), Some(Timestamp::default()));

        player.advance().unwrap();
        assert_eq!(player.first_duration(), Duration::new(15, 0));
        assert_eq!(player.duration(), Duration::ZERO);
    }

    /// Unknown opcode mid-file marks the Player done without dispatch.
    #[test]
    fn unknown_opcode_terminates_player() {
        let hash = "d".repeat(32);
        let good = msg_data("/a", &hash, "pkg/T", 1, 0, b"x");
        let bad = v102_record(&[("op", &[99u8])], &[]);

        let bytes = bag_bytes(&[good, bad]);
        let mut player = open_bytes(bytes, PlayerOptions::default());

        let calls = Rc::new(RefCell::new(0));
        let calls2 = calls.clone();
        player.register_raw("*", "*", "*", move |_, _, _, _| *calls2.borrow_mut() += 1);

        assert!(player.advance().unwrap());
        assert_eq!(*calls.borrow(), 1);
        assert!(player.is_done());
        assert!(!player.advance().unwrap());
    }

    /// Handler filter with hash-mismatch short-circuit.
    #[test]
    fn hash_mismatch_halts_handler_scan() {
        let hash = "h".repeat(32);
        let bytes = bag_bytes(&[msg_data("/a", &hash, "pkg/T", 1, 0, b"x")]);
        let mut player = open_bytes(bytes, PlayerOptions::default());

        let h1 = Rc::new(RefCell::new(0));
        let h2 = Rc::new(RefCell::new(0));
        let h1c = h1.clone();
        player.register_raw("/a", "*", "*", move |_, _, _, _| *h1c.borrow_mut() += 1);
        let h2c = h2.clone();
        // Filters on a hash that differs from the record's 32-char md5, so
        // the default HaltScan policy should stop the scan before H2 runs.
        player.register_raw("*", "not-the-recorded-hash", "*", move |_, _, _, _| *h2c.borrow_mut() += 1);

        player.advance().unwrap();
        assert_eq!(*h1.borrow(), 1);
        assert_eq!(*h2.borrow(), 0);
    }

    #[test]
    fn close_is_terminal_and_forbids_further_io() {
        let hash = "e".repeat(32);
        let bytes = bag_bytes(&[msg_data("/a", &hash, "pkg/T", 1, 0, b"x")]);
        let mut player = open_bytes(bytes, PlayerOptions::default());
        player.close();
        assert!(player.is_done());
        assert_eq!(player.advance().unwrap(), false);
    }

    #[test]
    fn wrong_extension_is_rejected_at_open() {
        let err = Player::open("not-a-bag.txt", PlayerOptions::default()).unwrap_err();
        assert!(matches!(err, OpenError::WrongExtension));
    }
}
