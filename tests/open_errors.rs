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

use bagplayer::player::{Player, PlayerOptions};
use bagplayer::OpenError;
use std::io::Write;

#[test]
fn rejects_file_without_bag_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("recording.txt");
    std::fs::File::create(&path).unwrap();

    let err = Player::open(&path, PlayerOptions::default()).unwrap_err();
    assert!(matches!(err, OpenError::WrongExtension));
}

#[test]
fn reports_io_error_for_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("does-not-exist.bag");

    let err = Player::open(&path, PlayerOptions::default()).unwrap_err();
    assert!(matches!(err, OpenError::Io(_)));
}

#[test]
fn opens_a_real_v12_bag_file_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("recording.bag");

    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(b"#ROSBAG V1.2\n").unwrap();

    let header = {
        let mut h = Vec::new();
        for (name, value) in [("op", &[2u8][..]), ("topic", b"/a"), ("md5", &[b'a'; 32]), ("type", b"pkg/T"), ("sec", &5u32.to_le_bytes()), ("nsec", &0u32.to_le_bytes())] {
            let len = name.len() + 1 + value.len();
            h.extend_from_slice(&(len as u32).to_le_bytes());
            h.extend_from_slice(name.as_bytes());
            h.push(b'=');
            h.extend_from_slice(value);
        }
        h
    };
    file.write_all(&(header.len() as u32).to_le_bytes()).unwrap();
    file.write_all(&header).unwrap();
    let body = b"payload";
    file.write_all(&(body.len() as u32).to_le_bytes()).unwrap();
    file.write_all(body).unwrap();
    drop(file);

    let mut player = Player::open(&path, PlayerOptions::default()).unwrap();
    assert!(player.peek_next_time().is_some());
    assert!(player.advance().unwrap());
    assert!(!player.advance().unwrap());
}

#[test]
fn rejects_future_version_without_opt_in() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.bag");
    std::fs::write(&path, b"#ROSBAG V9.9\n").unwrap();

    let err = Player::open(&path, PlayerOptions::default()).unwrap_err();
    assert!(matches!(err, OpenError::UnsupportedFutureVersion { major: 9, minor: 9 }));
}

#[test]
fn allows_future_version_with_opt_in() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.bag");
    std::fs::write(&path, b"#ROSBAG V9.9\n").unwrap();

    let options = PlayerOptions { allow_future: true, ..Default::default() };
    let player = Player::open(&path, options).unwrap();
    assert!(player.peek_next_time().is_none());
}
