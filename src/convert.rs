// Part of ethercat-cli. Copyright 2026 by the authors.
// This work is dual-licensed under Apache 2.0 and MIT terms.

use num_traits::Num;
use std::fmt::Write;

/// Parses a decimal or `0x`-prefixed hexadecimal token. Returns `None` for
/// anything else, including values that do not fit `T`.
pub(crate) fn parse_number<T: Num>(token: &str) -> Option<T> {
    let hex = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"));
    match hex {
        Some(digits) if !digits.is_empty() => T::from_str_radix(digits, 16).ok(),
        Some(_) => None,
        None => T::from_str_radix(token, 10).ok(),
    }
}

#[test]
fn test_parse_number() {
    assert_eq!(parse_number::<u16>("4096"), Some(4096));
    assert_eq!(parse_number::<u16>("0x1000"), Some(0x1000));
    assert_eq!(parse_number::<u16>("0X1a"), Some(0x1a));
    assert_eq!(parse_number::<u8>("0xFF"), Some(0xff));
    assert_eq!(parse_number::<u8>("0x100"), None);
    assert_eq!(parse_number::<u8>("256"), None);
    assert_eq!(parse_number::<u32>("0x"), None);
    assert_eq!(parse_number::<u32>("-1"), None);
    assert_eq!(parse_number::<u32>("12ab"), None);
    assert_eq!(parse_number::<usize>(""), None);
}

/// Formats bytes as uppercase hex, sixteen per line, each line ending in a
/// newline.
pub fn hex_dump(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 3 + data.len() / 16 + 1);
    for line in data.chunks(16) {
        for b in line {
            let _ = write!(out, "{:02X} ", b);
        }
        out.push('\n');
    }
    out
}

#[test]
fn test_hex_dump() {
    assert_eq!(hex_dump(&[]), "");
    assert_eq!(hex_dump(&[0x12, 0x34, 0xab]), "12 34 AB \n");
    let data: Vec<u8> = (0..20).collect();
    let dump = hex_dump(&data);
    let lines: Vec<_> = dump.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(
        lines[0],
        "00 01 02 03 04 05 06 07 08 09 0A 0B 0C 0D 0E 0F "
    );
    assert_eq!(lines[1], "10 11 12 13 ");
}

/// Joins whitespace separated words back into the text they came from.
pub(crate) fn join_words(words: &[&str]) -> String {
    words.join(" ")
}

#[test]
fn test_join_words() {
    assert_eq!(join_words(&["Hello", "World"]), "Hello World");
    assert_eq!(join_words(&["Привет"]), "Привет");
    assert_eq!(join_words(&[]), "");
}
