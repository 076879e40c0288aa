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

//! V1.02 record header codec.
//!
//! A header is a flat byte region holding repeated
//! `<field_len: u32 LE><name>=<value>` blocks, where `field_len` covers the
//! `name=value` text (not including the four length-prefix bytes).

use crate::error::RecordError;
use std::collections::HashMap;

/// Decoded `name -> value` mapping for one header.
pub type Fields = HashMap<String, Vec<u8>>;

/// Parse a contiguous header byte region into a field map.
pub fn decode(bytes: &[u8]) -> Result<Fields, RecordError> {
    let mut fields = Fields::new();
    let mut pos = 0usize;
    while pos < bytes.len() {
        if pos + 4 > bytes.len() {
            return Err(RecordError::MalformedHeaderField);
        }
        let field_len = u32::from_le_bytes(bytes[pos..pos + 4].try_into().unwrap()) as usize;
        pos += 4;
        if pos + field_len > bytes.len() {
            return Err(RecordError::MalformedHeaderField);
        }
        let block = &bytes[pos..pos + field_len];
        pos += field_len;

        let eq = block
            .iter()
            .position(|&b| b == b'=')
            .ok_or(RecordError::MalformedHeaderField)?;
        let name = std::str::from_utf8(&block[..eq])
            .map_err(|_| RecordError::MalformedHeaderField)?
            .to_string();
        let value = block[eq + 1..].to_vec();
        fields.insert(name, value);
    }
    Ok(fields)
}

/// Encode a field map back into header bytes. Field ordering is the
/// caller's responsibility; this crate only ever reads bags, so production
/// code never calls this — it exists for tests to build fixture bytes that
/// round-trip through [`decode`].
pub fn encode(fields: &[(&str, &[u8])]) -> Vec<u8> {
    let mut out = Vec::new();
    for (name, value) in fields {
        let field_len = name.len() + 1 + value.len();
        out.extend_from_slice(&(field_len as u32).to_le_bytes());
        out.extend_from_slice(name.as_bytes());
        out.push(b'=');
        out.extend_from_slice(value);
    }
    out
}

/// Look up `name` in `fields`, enforcing required-ness and byte-length
/// bounds (inclusive). Mirrors the source's `checkField`.
pub fn check_field<'a>(
    fields: &'a Fields,
    name: &'static str,
    min_len: usize,
    max_len: usize,
    required: bool,
) -> Result<Option<&'a [u8]>, RecordError> {
    match fields.get(name) {
        None => {
            if required {
                Err(RecordError::MissingRequiredField(name))
            } else {
                Ok(None)
            }
        }
        Some(value) => {
            if value.len() < min_len || value.len() > max_len {
                Err(RecordError::WrongFieldSize { field: name, len: value.len() })
            } else {
                Ok(Some(value.as_slice()))
            }
        }
    }
}

/// Decode a little-endian `u32` field, already length-checked to be 4 bytes.
pub fn decode_u32(value: &[u8]) -> u32 {
    u32::from_le_bytes(value.try_into().expect("caller checked length"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_fields_and_values() {
        let encoded = encode(&[("op", &[2u8]), ("topic", b"/a")]);
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded.get("op").unwrap(), &vec![2u8]);
        assert_eq!(decoded.get("topic").unwrap(), b"/a");
    }

    #[test]
    fn check_field_enforces_required() {
        let fields = Fields::new();
        let err = check_field(&fields, "op", 1, 1, true).unwrap_err();
        assert!(matches!(err, RecordError::MissingRequiredField("op")));
    }

    #[test]
    fn check_field_enforces_length_bounds() {
        let mut fields = Fields::new();
        fields.insert("md5".to_string(), vec![0u8; 16]);
        let err = check_field(&fields, "md5", 32, 32, true).unwrap_err();
        assert!(matches!(err, RecordError::WrongFieldSize { field: "md5", len: 16 }));
    }

    #[test]
    fn check_field_allows_missing_optional() {
        let fields = Fields::new();
        let result = check_field(&fields, "latching", 1, usize::MAX, false).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn malformed_field_without_equals_is_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&4u32.to_le_bytes());
        bytes.extend_from_slice(b"noeq");
        assert!(matches!(decode(&bytes), Err(RecordError::MalformedHeaderField)));
    }
}
