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

//! Classified non-fatal events and the sink abstraction that renders them.
//! The core never writes to stdout/stderr directly; it always routes
//! through a [`Sink`], separating a logging frontend from pluggable
//! backends.

use crate::time::Duration;
use std::sync::Arc;

/// A non-fatal event raised while reading a bag. The core classifies these;
/// an external collaborator decides how (or whether) to render them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A record arrived with a recorded duration earlier than
    /// `first_duration`; the latter was revised downward.
    OutOfOrderRecord {
        topic: String,
        first_duration: Duration,
        revised_to: Duration,
    },
    /// A header field name this reader does not recognize at all was
    /// present in a record.
    UnknownOptionalField { field: String },
    /// A MSG_DEF record arrived for a channel that already has a
    /// descriptor; the new definition was ignored.
    RedefinitionIgnored { topic: String },
    /// `open` was called with a bag whose version exceeds
    /// [`crate::constants::MAX_SUPPORTED_VERSION`] and `allow_future=true`.
    FutureVersionAllowed { major: u32, minor: u32 },
}

/// Receives classified diagnostic events. Implementations decide how (or
/// whether) to render them; the core only ever calls `emit`.
pub trait Sink: Send + Sync {
    fn emit(&self, event: Diagnostic);
}

/// Discards every event. Used when a caller opens a bag without supplying a
/// sink.
#[derive(Debug, Default)]
pub struct NullSink;

impl Sink for NullSink {
    fn emit(&self, _event: Diagnostic) {}
}

/// Routes every event through the `tracing` crate at an appropriate level.
/// This is the ambient-stack default most callers will actually use.
#[derive(Debug, Default)]
pub struct TracingSink;

impl Sink for TracingSink {
    fn emit(&self, event: Diagnostic) {
        match event {
            Diagnostic::OutOfOrderRecord { topic, first_duration, revised_to } => {
                tracing::warn!(
                    topic = %topic,
                    first_duration.sec = first_duration.sec,
                    first_duration.nsec = first_duration.nsec,
                    revised_to.sec = revised_to.sec,
                    revised_to.nsec = revised_to.nsec,
                    "messages in bag were not saved in chronological order"
                );
            }
            Diagnostic::UnknownOptionalField { field } => {
                tracing::debug!(field = %field, "header carried a field this reader does not recognize");
            }
            Diagnostic::RedefinitionIgnored { topic } => {
                tracing::warn!(topic = %topic, "ignoring redefinition of already-registered topic");
            }
            Diagnostic::FutureVersionAllowed { major, minor } => {
                tracing::warn!(major, minor, "opening bag with unsupported future version");
            }
        }
    }
}

pub fn default_sink() -> Arc<dyn Sink> {
    Arc::new(TracingSink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<Diagnostic>>);

    impl Sink for RecordingSink {
        fn emit(&self, event: Diagnostic) {
            self.0.lock().unwrap().push(event);
        }
    }

    #[test]
    fn recording_sink_captures_events_in_order() {
        let sink = RecordingSink::default();
        sink.emit(Diagnostic::UnknownOptionalField { field: "frobnicate".into() });
        sink.emit(Diagnostic::RedefinitionIgnored { topic: "/a".into() });
        let events = sink.0.lock().unwrap();
        assert_eq!(events.len(), 2);
    }
}
