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

//! Exercises the default `tracing`-backed diagnostic sink end to end,
//! rather than only through the unit-level `RecordingSink` in `diagnostic.rs`.

use bagplayer::player::{Player, PlayerOptions};
use std::io::Write;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().with_env_filter("bagplayer=debug").try_init();
}

#[test]
fn out_of_order_record_is_logged_through_default_sink() {
    init_tracing();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("unordered.bag");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(b"#ROSBAG V1.2\n").unwrap();

    let header = |sec: u32| {
        let mut h = Vec::new();
        for (name, value) in [("op", &[2u8][..]), ("topic", b"/a"), ("md5", &[b'a'; 32]), ("type", b"pkg/T"), ("sec", &sec.to_le_bytes()), ("nsec", &0u32.to_le_bytes())] {
            let len = name.len() + 1 + value.len();
            h.extend_from_slice(&(len as u32).to_le_bytes());
            h.extend_from_slice(name.as_bytes());
            h.push(b'=');
            h.extend_from_slice(value);
        }
        h
    };
    for sec in [20u32, 15u32] {
        let h = header(sec);
        file.write_all(&(h.len() as u32).to_le_bytes()).unwrap();
        file.write_all(&h).unwrap();
        file.write_all(&0u32.to_le_bytes()).unwrap();
    }
    drop(file);

    // Default sink (no PlayerOptions::sink override) routes through
    // tracing; this just confirms opening and advancing past an
    // out-of-order record doesn't panic or fail, with a subscriber
    // installed to actually drive the log formatting code path.
    let mut player = Player::open(&path, PlayerOptions::default()).unwrap();
    assert!(player.advance().unwrap());
    assert!(player.advance().unwrap());
    assert!(!player.advance().unwrap());
}
