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

//! On-disk constants shared between the header codec and the record reader.
//!
//! Kept in one place so that opcode values and field names never drift
//! between the pieces of the reader that parse them and the pieces that
//! branch on them.

/// Highest bag version this reader understands without `allow_future`.
pub const MAX_SUPPORTED_VERSION: u32 = 102;

/// `op` field value for a message-data record.
pub const OP_MSG_DATA: u8 = 2;
/// `op` field value for a message-definition record.
pub const OP_MSG_DEF: u8 = 1;
/// `op` field value for the file header record.
pub const OP_FILE_HEADER: u8 = 3;
/// `op` field value for an index-data record.
pub const OP_INDEX_DATA: u8 = 4;

pub const FIELD_OP: &str = "op";
pub const FIELD_TOPIC: &str = "topic";
pub const FIELD_MD5: &str = "md5";
pub const FIELD_TYPE: &str = "type";
pub const FIELD_SEC: &str = "sec";
pub const FIELD_NSEC: &str = "nsec";
pub const FIELD_DEF: &str = "def";
pub const FIELD_LATCHING: &str = "latching";
pub const FIELD_CALLERID: &str = "callerid";

/// Every header field name this reader has an opinion about. A field
/// present in a header but absent from this list is reported via
/// [`crate::diagnostic::Diagnostic::UnknownOptionalField`]; a field in this
/// list that is simply absent from a given record is not (most records
/// don't carry `latching`/`callerid`, and that's expected, not a warning).
pub const RECOGNIZED_FIELDS: &[&str] =
    &[FIELD_OP, FIELD_TOPIC, FIELD_MD5, FIELD_TYPE, FIELD_SEC, FIELD_NSEC, FIELD_DEF, FIELD_LATCHING, FIELD_CALLERID];

/// Width, in bytes, of the `md5` field on the wire.
pub const MD5_FIELD_LEN: usize = 32;

/// Wildcard token accepted by handler filters.
pub const WILDCARD: &str = "*";

/// Legacy datatype names rewritten on load, oldest-package-name first.
pub const LEGACY_DATATYPE_REMAP: &[(&str, &str)] =
    &[("rostools/Time", "roslib/Time"), ("rostools/Log", "roslib/Log")];

/// Apply the legacy datatype remap table in place.
pub fn remap_legacy_datatype(datatype: &str) -> &str {
    for (from, to) in LEGACY_DATATYPE_REMAP {
        if datatype == *from {
            return to;
        }
    }
    datatype
}
