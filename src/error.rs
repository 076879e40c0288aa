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

//! Error types for bag opening and record advancement.

use std::fmt;
use std::io;

/// Failure that can occur while opening a bag.
#[derive(Debug)]
pub enum OpenError {
    /// The underlying file could not be opened.
    Io(io::Error),
    /// The path does not have a `.bag` extension.
    WrongExtension,
    /// The bag's version exceeds [`crate::constants::MAX_SUPPORTED_VERSION`]
    /// and `allow_future` was not set.
    UnsupportedFutureVersion { major: u32, minor: u32 },
    /// A V1.0 banner was found but the topic-count line was missing or
    /// unparseable.
    MissingTopicCount,
    /// A V1.0 topic-table entry (channel/hash/datatype line) was missing
    /// before the table's declared count was reached.
    TruncatedTopicTable,
}

impl fmt::Display for OpenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{:?}", stringify!(Self), self)
    }
}

impl std::error::Error for OpenError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OpenError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for OpenError {
    fn from(e: io::Error) -> Self {
        OpenError::Io(e)
    }
}

/// Failure while reading, parsing, or framing a single record. Any of these
/// is fatal to the Player that encountered it (the record is discarded and
/// the Player transitions to `done`).
#[derive(Debug)]
pub enum RecordError {
    /// Fewer header bytes were available than the length prefix promised.
    TruncatedHeader,
    /// A length-prefixed header field ran past the end of the header.
    MalformedHeaderField,
    /// A required header field was missing.
    MissingRequiredField(&'static str),
    /// A fixed-width field had the wrong byte length.
    WrongFieldSize { field: &'static str, len: usize },
    /// The `op` field carried a value this reader does not recognize.
    UnrecognizedOpcode(u8),
    /// Fewer body bytes were available than `body_len` promised.
    TruncatedBody,
    /// Underlying I/O failure.
    Io(io::Error),
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{:?}", stringify!(Self), self)
    }
}

impl std::error::Error for RecordError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RecordError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for RecordError {
    fn from(e: io::Error) -> Self {
        RecordError::Io(e)
    }
}
