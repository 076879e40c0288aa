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

//! Ordered handler table and dispatch.
//!
//! The message (de)serialization library lives outside the core; handlers
//! reach it only through the [`Message`] capability trait. Non-inflating
//! handlers instead see a borrowed [`RawView`].
//!
//! Dispatch is polymorphic without relying on inheritance: `Message` plus a
//! captured closure stands in for an allocate/deserialize/invoke functor,
//! and [`RawView`] stands in for a raw-message base type.

use crate::constants::WILDCARD;
use crate::time::{Duration, Timestamp};
use std::any::{Any, TypeId};
use std::fmt;
use std::rc::Rc;

/// Failure deserializing a record body into a typed message. The core
/// propagates this outward rather than deciding how callers should handle
/// it.
#[derive(Debug)]
pub struct DeserializeError(pub String);

impl fmt::Display for DeserializeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeserializeError({})", self.0)
    }
}

impl std::error::Error for DeserializeError {}

/// Capability contract a typed handler's message type must satisfy. Bodies
/// are handed over as borrowed slices; nothing about the wire format is
/// assumed beyond "some bytes in, a message out".
pub trait Message: 'static {
    /// Content hash this type expects to be serialized under, for filter
    /// matching at registration time.
    fn static_hash() -> &'static str;
    /// Human-readable type name, for filter matching at registration time.
    fn static_datatype() -> &'static str;
    /// Deserialize `body` into an instance of this type.
    fn deserialize(body: &[u8]) -> Result<Self, DeserializeError>
    where
        Self: Sized;
}

/// View exposed to non-inflating handlers: the raw body plus the metadata
/// that would otherwise live on a typed message's connection header.
pub struct RawView<'a> {
    body: &'a [u8],
    pub hash: &'a str,
    pub datatype: &'a str,
    pub definition: &'a str,
    pub caller_id: Option<&'a str>,
    pub latching: bool,
}

impl<'a> RawView<'a> {
    pub fn new(
        body: &'a [u8],
        hash: &'a str,
        datatype: &'a str,
        definition: &'a str,
        caller_id: Option<&'a str>,
        latching: bool,
    ) -> Self {
        RawView { body, hash, datatype, definition, caller_id, latching }
    }

    /// Copy the body bytes into `out`, growing it as needed.
    pub fn serialize(&self, out: &mut Vec<u8>) {
        out.clear();
        out.extend_from_slice(self.body);
    }

    pub fn body(&self) -> &'a [u8] {
        self.body
    }
}

/// Per-record scratch space so at most one inflation happens per concrete
/// message type, even when several registered handlers share it.
#[derive(Default)]
pub struct InflationCache {
    entries: Vec<(TypeId, Rc<dyn Any>)>,
}

impl InflationCache {
    fn get_or_insert<T: Message>(&mut self, body: &[u8]) -> Result<Rc<T>, DeserializeError> {
        let type_id = TypeId::of::<T>();
        if let Some((_, cached)) = self.entries.iter().find(|(id, _)| *id == type_id) {
            return Ok(cached.clone().downcast::<T>().expect("type id matched"));
        }
        let message = Rc::new(T::deserialize(body)?);
        self.entries.push((type_id, message.clone()));
        Ok(message)
    }
}

/// Object-safe handler invocation, erased over the concrete message type.
trait Invoke {
    fn hash(&self) -> &str;
    fn datatype(&self) -> &str;
    fn inflate(&self) -> bool;
    fn call_raw(&mut self, channel: &str, view: RawView<'_>, playback: Timestamp, recorded: Duration);
    fn call_typed(
        &mut self,
        channel: &str,
        body: &[u8],
        cache: &mut InflationCache,
        playback: Timestamp,
        recorded: Duration,
    ) -> Result<(), DeserializeError>;
}

struct RawHandler<F> {
    hash: String,
    datatype: String,
    callback: F,
}

impl<F> Invoke for RawHandler<F>
where
    F: FnMut(&str, RawView<'_>, Timestamp, Duration),
{
    fn hash(&self) -> &str {
        &self.hash
    }
    fn datatype(&self) -> &str {
        &self.datatype
    }
    fn inflate(&self) -> bool {
        false
    }
    fn call_raw(&mut self, channel: &str, view: RawView<'_>, playback: Timestamp, recorded: Duration) {
        (self.callback)(channel, view, playback, recorded);
    }
    fn call_typed(
        &mut self,
        _channel: &str,
        _body: &[u8],
        _cache: &mut InflationCache,
        _playback: Timestamp,
        _recorded: Duration,
    ) -> Result<(), DeserializeError> {
        unreachable!("raw handler never called through call_typed")
    }
}

struct TypedHandler<T, F> {
    hash: String,
    datatype: String,
    callback: F,
    _marker: std::marker::PhantomData<T>,
}

impl<T, F> Invoke for TypedHandler<T, F>
where
    T: Message,
    F: FnMut(&str, &T, Timestamp, Duration),
{
    fn hash(&self) -> &str {
        &self.hash
    }
    fn datatype(&self) -> &str {
        &self.datatype
    }
    fn inflate(&self) -> bool {
        true
    }
    fn call_raw(&mut self, _channel: &str, _view: RawView<'_>, _playback: Timestamp, _recorded: Duration) {
        unreachable!("typed handler never called through call_raw")
    }
    fn call_typed(
        &mut self,
        channel: &str,
        body: &[u8],
        cache: &mut InflationCache,
        playback: Timestamp,
        recorded: Duration,
    ) -> Result<(), DeserializeError> {
        let message = cache.get_or_insert::<T>(body)?;
        (self.callback)(channel, &message, playback, recorded);
        Ok(())
    }
}

/// A single registered handler entry with its filters.
struct Entry {
    channel_filter: String,
    invoke: Box<dyn Invoke>,
}

/// What happens when a handler's hash (or datatype) filter does not match
/// the current record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashMismatchPolicy {
    /// Stop scanning the handler table entirely for this record (the
    /// default, matching legacy reader behavior).
    #[default]
    HaltScan,
    /// Skip only the mismatched handler and keep scanning.
    SkipHandler,
}

/// Ordered list of registered handlers, dispatched in registration order.
#[derive(Default)]
pub struct HandlerTable {
    entries: Vec<Entry>,
    policy: HashMismatchPolicy,
}

/// A fully framed record ready for dispatch.
pub struct Record<'a> {
    pub channel_name: &'a str,
    pub hash: &'a str,
    pub datatype: &'a str,
    pub definition: &'a str,
    pub caller_id: Option<&'a str>,
    pub latching: bool,
    pub body: &'a [u8],
    pub playback_time: Timestamp,
    pub recorded_time: Duration,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: HashMismatchPolicy) -> Self {
        HandlerTable { entries: Vec::new(), policy }
    }

    pub fn set_policy(&mut self, policy: HashMismatchPolicy) {
        self.policy = policy;
    }

    /// Register a non-inflating handler. `"*"` in any filter matches any
    /// value on the record side.
    pub fn register_raw<F>(&mut self, channel_filter: impl Into<String>, hash_filter: impl Into<String>, datatype_filter: impl Into<String>, callback: F)
    where
        F: FnMut(&str, RawView<'_>, Timestamp, Duration) + 'static,
    {
        self.entries.push(Entry {
            channel_filter: channel_filter.into(),
            invoke: Box::new(RawHandler { hash: hash_filter.into(), datatype: datatype_filter.into(), callback }),
        });
    }

    /// Register an inflating handler whose filters are derived from `T`'s
    /// static hash/datatype.
    pub fn register_typed<T, F>(&mut self, channel_filter: impl Into<String>, callback: F)
    where
        T: Message,
        F: FnMut(&str, &T, Timestamp, Duration) + 'static,
    {
        self.entries.push(Entry {
            channel_filter: channel_filter.into(),
            invoke: Box::new(TypedHandler::<T, F> {
                hash: T::static_hash().to_string(),
                datatype: T::static_datatype().to_string(),
                callback,
                _marker: std::marker::PhantomData,
            }),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Dispatch `record` through every matching handler, in registration
    /// order, honoring the hash-mismatch short-circuit policy.
    pub fn dispatch(&mut self, record: &Record<'_>) -> Result<(), DeserializeError> {
        let mut cache = InflationCache::default();
        for entry in &mut self.entries {
            if entry.channel_filter != WILDCARD && entry.channel_filter != record.channel_name {
                continue;
            }

            let hash_matches = entry.invoke.hash() == WILDCARD || entry.invoke.hash() == record.hash;
            if !hash_matches {
                match self.policy {
                    HashMismatchPolicy::HaltScan => break,
                    HashMismatchPolicy::SkipHandler => continue,
                }
            }

            let datatype_matches = entry.invoke.datatype() == WILDCARD
                || record.datatype == WILDCARD
                || entry.invoke.datatype() == record.datatype;
            if !datatype_matches {
                match self.policy {
                    HashMismatchPolicy::HaltScan => break,
                    HashMismatchPolicy::SkipHandler => continue,
                }
            }

            if entry.invoke.inflate() {
                entry.invoke.call_typed(
                    record.channel_name,
                    record.body,
                    &mut cache,
                    record.playback_time,
                    record.recorded_time,
                )?;
            } else {
                let view = RawView::new(
                    record.body,
                    record.hash,
                    record.datatype,
                    record.definition,
                    record.caller_id,
                    record.latching,
                );
                entry
                    .invoke
                    .call_raw(record.channel_name, view, record.playback_time, record.recorded_time);
            }
        }
        Ok(())
    }
}
