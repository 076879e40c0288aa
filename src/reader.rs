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

//! Version detection and per-record framing.

use crate::constants::{
    self, FIELD_CALLERID, FIELD_DEF, FIELD_LATCHING, FIELD_MD5, FIELD_NSEC, FIELD_OP, FIELD_SEC,
    FIELD_TOPIC, FIELD_TYPE,
};
use crate::diagnostic::{Diagnostic, Sink};
use crate::error::{OpenError, RecordError};
use crate::header;
use crate::stream::ByteStream;
use crate::time::Duration;
use crate::topic::{Registration, TopicDescriptor, TopicRegistry};
use std::sync::Arc;

/// Numeric bag version, `major * 100 + minor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
}

impl Version {
    pub fn code(self) -> u32 {
        self.major * 100 + self.minor
    }
}

/// One fully framed MSG_DATA record, ready for dispatch. Non-data records
/// (MSG_DEF, FILE_HEADER, INDEX_DATA) are consumed internally by
/// [`read_next`] and never surface here.
pub struct PendingMessage {
    pub channel_name: String,
    pub recorded: Duration,
    pub caller_id: Option<String>,
    pub latching: bool,
    pub body_len: u32,
}

/// Shared per-Player reading state: detected version, topic registry, and
/// the reused header scratch buffer.
pub struct RecordReader {
    pub version: Version,
    pub registry: TopicRegistry,
    header_buf: Vec<u8>,
    single_topic_name: Option<String>,
}

impl RecordReader {
    /// Detect the bag version from the stream's banner (or lack of one),
    /// consuming any V1.0 preamble table.
    pub fn detect_version(
        stream: &mut dyn ByteStream,
        allow_future: bool,
        sink: &Arc<dyn Sink>,
    ) -> Result<Self, OpenError> {
        let first_line = stream.read_line().map_err(OpenError::Io)?;

        let (version, single_topic_name, registry) = match first_line {
            Some(line) if line.starts_with('#') => {
                let parsed = parse_banner(&line);
                match parsed {
                    Some(version) => {
                        let mut registry = TopicRegistry::new();
                        let mut single_topic_name = None;
                        if version.code() == 100 {
                            let count_line =
                                stream.read_line().map_err(OpenError::Io)?.ok_or(OpenError::MissingTopicCount)?;
                            let count: usize =
                                count_line.trim().parse().map_err(|_| OpenError::MissingTopicCount)?;
                            for _ in 0..count {
                                let channel_name = stream
                                    .read_line()
                                    .map_err(OpenError::Io)?
                                    .ok_or(OpenError::TruncatedTopicTable)?;
                                let hash = stream
                                    .read_line()
                                    .map_err(OpenError::Io)?
                                    .ok_or(OpenError::TruncatedTopicTable)?;
                                let datatype = stream
                                    .read_line()
                                    .map_err(OpenError::Io)?
                                    .ok_or(OpenError::TruncatedTopicTable)?;
                                let datatype = constants::remap_legacy_datatype(&datatype).to_string();
                                if count == 1 {
                                    single_topic_name = Some(channel_name.clone());
                                }
                                registry.register(TopicDescriptor {
                                    channel_name,
                                    hash,
                                    datatype,
                                    definition: String::new(),
                                });
                            }
                        }
                        (version, single_topic_name, registry)
                    }
                    None => (Version { major: 1, minor: 0 }, None, TopicRegistry::new()),
                }
            }
            Some(_) | None => {
                stream.seek_to_start().map_err(OpenError::Io)?;
                // V0.0 carries no topic identity anywhere in the file; treat
                // it as a single unnamed topic, registered eagerly so
                // `read_next_legacy` always has a descriptor to dispatch
                // against.
                let mut registry = TopicRegistry::new();
                registry.register(TopicDescriptor {
                    channel_name: String::new(),
                    hash: String::new(),
                    datatype: constants::WILDCARD.to_string(),
                    definition: String::new(),
                });
                (Version { major: 0, minor: 0 }, Some(String::new()), registry)
            }
        };

        if !allow_future && version.code() > constants::MAX_SUPPORTED_VERSION {
            return Err(OpenError::UnsupportedFutureVersion { major: version.major, minor: version.minor });
        }
        if allow_future && version.code() > constants::MAX_SUPPORTED_VERSION {
            sink.emit(Diagnostic::FutureVersionAllowed { major: version.major, minor: version.minor });
        }

        Ok(RecordReader { version, registry, header_buf: Vec::new(), single_topic_name })
    }

    /// Read records until one full MSG_DATA is framed (for V1.02) or a
    /// single per-record message is read (for V1.0/V1.1/V0.0), returning
    /// the body alongside it. Definitions, file headers, and index data are
    /// consumed and skipped internally.
    pub fn read_next(
        &mut self,
        stream: &mut dyn ByteStream,
        body: &mut Vec<u8>,
        sink: &Arc<dyn Sink>,
    ) -> Result<Option<PendingMessage>, RecordError> {
        if self.version.code() >= 102 {
            self.read_next_v102(stream, body, sink)
        } else {
            self.read_next_legacy(stream, body)
        }
    }

    fn read_next_v102(
        &mut self,
        stream: &mut dyn ByteStream,
        body: &mut Vec<u8>,
        sink: &Arc<dyn Sink>,
    ) -> Result<Option<PendingMessage>, RecordError> {
        loop {
            if !stream.good() {
                return Ok(None);
            }

            let mut len_bytes = [0u8; 4];
            if !stream.read_exact(&mut len_bytes)? {
                return Ok(None);
            }
            let header_len = u32::from_le_bytes(len_bytes) as usize;

            self.header_buf.resize(header_len, 0);
            if !stream.read_exact(&mut self.header_buf)? {
                return Err(RecordError::TruncatedHeader);
            }
            let fields = header::decode(&self.header_buf)?;
            report_unknown_fields(&fields, sink);

            let op_bytes =
                header::check_field(&fields, FIELD_OP, 1, 1, true)?.ok_or(RecordError::MissingRequiredField(FIELD_OP))?;
            let op = op_bytes[0];

            let mut body_len_bytes = [0u8; 4];
            if !stream.read_exact(&mut body_len_bytes)? {
                return Err(RecordError::TruncatedBody);
            }
            let body_len = u32::from_le_bytes(body_len_bytes);

            match op {
                constants::OP_MSG_DATA => {
                    let channel_name = required_str(&fields, FIELD_TOPIC)?;
                    let hash = required_fixed_str(&fields, FIELD_MD5, constants::MD5_FIELD_LEN)?;
                    let datatype_raw = required_str(&fields, FIELD_TYPE)?;
                    let datatype = constants::remap_legacy_datatype(&datatype_raw).to_string();
                    let sec = required_u32(&fields, FIELD_SEC)?;
                    let nsec = required_u32(&fields, FIELD_NSEC)?;

                    let latching = optional_str(&fields, FIELD_LATCHING).map(|v| v != "0").unwrap_or(false);
                    let caller_id = optional_str(&fields, FIELD_CALLERID);

                    self.registry.register(TopicDescriptor {
                        channel_name: channel_name.clone(),
                        hash,
                        datatype,
                        definition: String::new(),
                    });

                    read_body(stream, body, body_len)?;

                    return Ok(Some(PendingMessage {
                        channel_name,
                        recorded: Duration::new(sec, nsec),
                        caller_id,
                        latching,
                        body_len,
                    }));
                }
                constants::OP_MSG_DEF => {
                    let channel_name = required_str(&fields, FIELD_TOPIC)?;
                    let hash = required_fixed_str(&fields, FIELD_MD5, constants::MD5_FIELD_LEN)?;
                    let datatype_raw = required_str(&fields, FIELD_TYPE)?;
                    let datatype = constants::remap_legacy_datatype(&datatype_raw).to_string();
                    let definition = header::check_field(&fields, FIELD_DEF, 0, usize::MAX, true)?
                        .map(|v| String::from_utf8_lossy(v).into_owned())
                        .ok_or(RecordError::MissingRequiredField(FIELD_DEF))?;

                    match self.registry.register(TopicDescriptor {
                        channel_name: channel_name.clone(),
                        hash,
                        datatype,
                        definition,
                    }) {
                        Registration::Created => {}
                        Registration::AlreadyPresent => {
                            sink.emit(Diagnostic::RedefinitionIgnored { topic: channel_name });
                        }
                    }

                    stream.skip(body_len as u64).map_err(RecordError::Io)?;
                }
                constants::OP_FILE_HEADER | constants::OP_INDEX_DATA => {
                    stream.skip(body_len as u64).map_err(RecordError::Io)?;
                }
                other => return Err(RecordError::UnrecognizedOpcode(other)),
            }
        }
    }

    fn read_next_legacy(
        &mut self,
        stream: &mut dyn ByteStream,
        body: &mut Vec<u8>,
    ) -> Result<Option<PendingMessage>, RecordError> {
        if !stream.good() {
            return Ok(None);
        }

        let channel_name = if self.version.code() == 0 {
            self.single_topic_name.clone().expect("V0.0 bag must have registered its implicit topic")
        } else if self.version.code() == 100 {
            // V1.0: the record carries no per-record identity line; the sole
            // registered topic (from the preamble table) applies.
            if let Some(name) = &self.single_topic_name {
                name.clone()
            } else {
                let Some(name) = stream.read_line()? else {
                    return Ok(None);
                };
                name
            }
        } else {
            // V1.1: per-record (channel, hash, datatype) lines.
            let Some(channel_name) = stream.read_line()? else {
                return Ok(None);
            };
            let Some(hash) = stream.read_line()? else {
                return Err(RecordError::TruncatedHeader);
            };
            let Some(datatype_raw) = stream.read_line()? else {
                return Err(RecordError::TruncatedHeader);
            };
            let datatype = constants::remap_legacy_datatype(&datatype_raw).to_string();
            self.registry.register(TopicDescriptor {
                channel_name: channel_name.clone(),
                hash,
                datatype,
                definition: String::new(),
            });
            channel_name
        };

        let mut sec_bytes = [0u8; 4];
        if !stream.read_exact(&mut sec_bytes)? {
            return Ok(None);
        }
        let mut nsec_bytes = [0u8; 4];
        if !stream.read_exact(&mut nsec_bytes)? {
            return Err(RecordError::TruncatedHeader);
        }
        let mut body_len_bytes = [0u8; 4];
        if !stream.read_exact(&mut body_len_bytes)? {
            return Err(RecordError::TruncatedHeader);
        }
        let body_len = u32::from_le_bytes(body_len_bytes);

        read_body(stream, body, body_len)?;

        Ok(Some(PendingMessage {
            channel_name,
            recorded: Duration::new(u32::from_le_bytes(sec_bytes), u32::from_le_bytes(nsec_bytes)),
            caller_id: None,
            latching: false,
            body_len,
        }))
    }
}

fn read_body(stream: &mut dyn ByteStream, body: &mut Vec<u8>, body_len: u32) -> Result<(), RecordError> {
    let body_len = body_len as usize;
    if body.capacity() < body_len {
        let new_capacity = (body.capacity().max(1) * 2).max(body_len);
        body.reserve(new_capacity - body.len());
    }
    body.resize(body_len, 0);
    if !stream.read_exact(body)? {
        return Err(RecordError::TruncatedBody);
    }
    Ok(())
}

fn required_str(fields: &header::Fields, name: &'static str) -> Result<String, RecordError> {
    let value = header::check_field(fields, name, 1, usize::MAX, true)?.ok_or(RecordError::MissingRequiredField(name))?;
    Ok(String::from_utf8_lossy(value).into_owned())
}

fn required_fixed_str(fields: &header::Fields, name: &'static str, len: usize) -> Result<String, RecordError> {
    let value = header::check_field(fields, name, len, len, true)?.ok_or(RecordError::MissingRequiredField(name))?;
    Ok(String::from_utf8_lossy(value).into_owned())
}

fn required_u32(fields: &header::Fields, name: &'static str) -> Result<u32, RecordError> {
    let value = header::check_field(fields, name, 4, 4, true)?.ok_or(RecordError::MissingRequiredField(name))?;
    Ok(header::decode_u32(value))
}

/// A non-required field's absence is routine (most records carry neither
/// `latching` nor `callerid`) and is not itself diagnostic-worthy; see
/// [`report_unknown_fields`] for the field names this reader actually warns
/// about.
fn optional_str(fields: &header::Fields, name: &'static str) -> Option<String> {
    match header::check_field(fields, name, 1, usize::MAX, false) {
        Ok(Some(value)) => Some(String::from_utf8_lossy(value).into_owned()),
        Ok(None) => None,
        Err(_) => None,
    }
}

/// Emit a diagnostic for every header field name this reader doesn't
/// recognize at all, per spec's "unknown optional fields" warning class.
fn report_unknown_fields(fields: &header::Fields, sink: &Arc<dyn Sink>) {
    for name in fields.keys() {
        if !constants::RECOGNIZED_FIELDS.contains(&name.as_str()) {
            sink.emit(Diagnostic::UnknownOptionalField { field: name.clone() });
        }
    }
}

/// Parse a `#ROS<tag> V<major>.<minor>` banner line. Returns `None` if the
/// line starts with `#` but doesn't match the expected shape (the source's
/// "assume V1.0" fallback).
fn parse_banner(line: &str) -> Option<Version> {
    let rest = line.strip_prefix("#ROS")?;
    let v_pos = rest.find(" V")?;
    let version_part = &rest[v_pos + 2..];
    let mut parts = version_part.splitn(2, '.');
    let major: u32 = parts.next()?.parse().ok()?;
    let minor: u32 = parts.next()?.parse().ok()?;
    Some(Version { major, minor })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_banner_accepts_v12() {
        let v = parse_banner("#ROSBAG V1.2").unwrap();
        assert_eq!(v.code(), 102);
    }

    #[test]
    fn parse_banner_rejects_malformed_line() {
        assert!(parse_banner("#ROSBAG garbage").is_none());
    }

    #[test]
    fn version_code_is_major_times_100_plus_minor() {
        assert_eq!(Version { major: 1, minor: 1 }.code(), 101);
        assert_eq!(Version { major: 0, minor: 0 }.code(), 0);
    }

    use crate::diagnostic::default_sink;
    use crate::stream::BufferedByteStream;
    use std::io::Cursor;

    fn stream_of(bytes: Vec<u8>) -> BufferedByteStream<Cursor<Vec<u8>>> {
        BufferedByteStream::new(Cursor::new(bytes))
    }

    #[test]
    fn v0_bag_has_no_banner_and_one_unnamed_topic() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&7u32.to_le_bytes()); // sec
        bytes.extend_from_slice(&0u32.to_le_bytes()); // nsec
        bytes.extend_from_slice(&3u32.to_le_bytes()); // body_len
        bytes.extend_from_slice(b"abc");

        let mut stream = stream_of(bytes);
        let sink = default_sink();
        let mut reader = RecordReader::detect_version(&mut stream, false, &sink).unwrap();
        assert_eq!(reader.version.code(), 0);
        assert_eq!(reader.registry.len(), 1);

        let mut body = Vec::new();
        let msg = reader.read_next(&mut stream, &mut body, &sink).unwrap().unwrap();
        assert_eq!(msg.channel_name, "");
        assert_eq!(msg.recorded, Duration::new(7, 0));
        assert_eq!(body, b"abc");
    }

    #[test]
    fn v1_1_bag_reads_per_record_identity_lines() {
        let mut bytes = b"#ROSBAG V1.1\n".to_vec();
        bytes.extend_from_slice(b"/a\n");
        bytes.extend_from_slice(format!("{}\n", "a".repeat(32)).as_bytes());
        bytes.extend_from_slice(b"pkg/T\n");
        bytes.extend_from_slice(&9u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.extend_from_slice(b"hi");

        let mut stream = stream_of(bytes);
        let sink = default_sink();
        let mut reader = RecordReader::detect_version(&mut stream, false, &sink).unwrap();
        assert_eq!(reader.version.code(), 101);

        let mut body = Vec::new();
        let msg = reader.read_next(&mut stream, &mut body, &sink).unwrap().unwrap();
        assert_eq!(msg.channel_name, "/a");
        assert_eq!(msg.recorded, Duration::new(9, 0));
        assert_eq!(reader.registry.get("/a").unwrap().datatype, "pkg/T");
        assert_eq!(body, b"hi");
    }

    #[test]
    fn legacy_datatype_remap_applies_on_v1_1_load() {
        let mut bytes = b"#ROSBAG V1.1\n".to_vec();
        bytes.extend_from_slice(b"/clock\n");
        bytes.extend_from_slice(format!("{}\n", "b".repeat(32)).as_bytes());
        bytes.extend_from_slice(b"rostools/Time\n");
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());

        let mut stream = stream_of(bytes);
        let sink = default_sink();
        let mut reader = RecordReader::detect_version(&mut stream, false, &sink).unwrap();
        let mut body = Vec::new();
        reader.read_next(&mut stream, &mut body, &sink).unwrap().unwrap();
        assert_eq!(reader.registry.get("/clock").unwrap().datatype, "roslib/Time");
    }
}
