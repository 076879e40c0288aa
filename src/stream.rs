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

//! Sequential byte stream abstraction.
//!
//! The reader never assumes a concrete [`std::io::Read`] implementor: a
//! decompressing filter is composed upstream by the caller and handed to
//! the Player as a `Box<dyn ByteStream>`.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};

/// Sequential reader over a bag's bytes. Distinguishes clean EOF at a record
/// boundary (`read_exact` returning `Ok(false)` with zero bytes consumed)
/// from a truncated mid-record read (returning `Ok(false)` after partially
/// filling `buf`) only in that callers detect truncation by checking
/// `good()` after a short read — mirrored here by bubbling `io::Error` and
/// letting callers interpret an `UnexpectedEof` as terminal either way.
pub trait ByteStream {
    /// Fill `buf` completely, or return `Ok(false)` if the stream hit EOF
    /// before `buf` could be filled (in which case `buf`'s trailing bytes
    /// are unspecified).
    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<bool>;

    /// Read one LF-terminated line, with the trailing LF (and a trailing CR,
    /// if present) stripped. Returns `None` at clean EOF.
    fn read_line(&mut self) -> io::Result<Option<String>>;

    /// Discard the next `n` bytes.
    fn skip(&mut self, n: u64) -> io::Result<()>;

    /// Seek back to the start of the stream. Only required to support the
    /// V0.0 banner-fallback path.
    fn seek_to_start(&mut self) -> io::Result<()>;

    /// Whether the stream is still in a readable state (not yet hit a
    /// terminal EOF or error).
    fn good(&self) -> bool;
}

/// A [`ByteStream`] backed by any `Read + Seek`, buffered for line reads.
pub struct BufferedByteStream<R> {
    inner: BufReader<R>,
    good: bool,
}

impl<R: Read + Seek> BufferedByteStream<R> {
    pub fn new(inner: R) -> Self {
        BufferedByteStream { inner: BufReader::new(inner), good: true }
    }
}

impl BufferedByteStream<File> {
    pub fn open_file(path: &std::path::Path) -> io::Result<Self> {
        Ok(BufferedByteStream::new(File::open(path)?))
    }
}

impl<R: Read + Seek> ByteStream for BufferedByteStream<R> {
    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<bool> {
        if !self.good {
            return Ok(false);
        }
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => {
                    self.good = false;
                    return Ok(false);
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.good = false;
                    return Err(e);
                }
            }
        }
        Ok(true)
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        if !self.good {
            return Ok(None);
        }
        let mut raw = Vec::new();
        let n = self.inner.read_until(b'\n', &mut raw)?;
        if n == 0 {
            self.good = false;
            return Ok(None);
        }
        if raw.last() == Some(&b'\n') {
            raw.pop();
            if raw.last() == Some(&b'\r') {
                raw.pop();
            }
        }
        Ok(Some(String::from_utf8_lossy(&raw).into_owned()))
    }

    fn skip(&mut self, n: u64) -> io::Result<()> {
        if n == 0 {
            return Ok(());
        }
        let copied = io::copy(&mut self.inner.by_ref().take(n), &mut io::sink())?;
        if copied < n {
            self.good = false;
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "short skip"));
        }
        Ok(())
    }

    fn seek_to_start(&mut self) -> io::Result<()> {
        self.inner.seek(SeekFrom::Start(0))?;
        self.good = true;
        Ok(())
    }

    fn good(&self) -> bool {
        self.good
    }
}
