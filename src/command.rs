// Part of ethercat-cli. Copyright 2026 by the authors.
// This work is dual-licensed under Apache 2.0 and MIT terms.

//! Shell commands, parsed once from a whitespace separated input line.

use crate::convert::{join_words, parse_number};
use num_traits::Num;
use std::str::FromStr;
use thiserror::Error;

pub const MAX_LOOP_CYCLES: u32 = 1_000_000;
pub const MAX_LOOP_INTERVAL_MS: u64 = 10_000;
pub const DEFAULT_LOOP_INTERVAL_MS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Usage: {0}")]
    Usage(&'static str),
    #[error("Invalid number '{0}'")]
    Number(String),
    #[error("Invalid {what} (must be {min}-{max})")]
    Range {
        what: &'static str,
        min: u64,
        max: u64,
    },
    #[error("Unknown command '{0}'. Type 'help' for list of commands.")]
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Quit,
    Scan,
    // Slave indices are kept as typed; the dispatcher range checks them.
    ReadConfig { slave: i64 },
    Read { slave: i64, addr: u16, len: usize },
    Write { slave: i64, addr: u16, data: Vec<u8> },
    TextWrite { slave: i64, addr: u16, text: String },
    /// `None` queries the current setting.
    Verbose(Option<bool>),
    Status,
    PdoStart,
    PdoStop,
    PdoRead,
    PdoWrite { offset: usize, data: Vec<u8> },
    PdoLoop { cycles: u32, interval_ms: u64 },
}

const USAGE_READ_CONFIG: &str = "read-config <slave_idx>";
const USAGE_READ: &str = "read <slave_idx> <addr> <len>";
const USAGE_WRITE: &str = "write <slave_idx> <addr> <byte1> [byte2] ...";
const USAGE_TEXT_WRITE: &str = "text-write <slave_idx> <addr> <text>";
const USAGE_VERBOSE: &str = "verbose [on|off]";
const USAGE_PDO_WRITE: &str = "pdo-write <offset> <byte1> [byte2] ...";
const USAGE_PDO_LOOP: &str = "pdo-loop <cycles> [interval_ms]";

fn number<T: Num>(token: &str) -> Result<T, ParseError> {
    parse_number(token).ok_or_else(|| ParseError::Number(token.to_owned()))
}

fn bytes(tokens: &[&str]) -> Result<Vec<u8>, ParseError> {
    tokens.iter().map(|t| number(t)).collect()
}

fn in_range(value: u64, what: &'static str, min: u64, max: u64) -> Result<(), ParseError> {
    if value < min || value > max {
        return Err(ParseError::Range { what, min, max });
    }
    Ok(())
}

impl FromStr for Command {
    type Err = ParseError;

    /// An empty line asks for help.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let args: Vec<&str> = line.split_whitespace().collect();
        let (name, args) = match args.split_first() {
            None => return Ok(Command::Help),
            Some((name, args)) => (*name, args),
        };

        Ok(match name {
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            "scan" => Command::Scan,
            "status" => Command::Status,
            "pdo-start" => Command::PdoStart,
            "pdo-stop" => Command::PdoStop,
            "pdo-read" => Command::PdoRead,
            "read-config" => match args {
                [slave, ..] => Command::ReadConfig {
                    slave: number(slave)?,
                },
                _ => return Err(ParseError::Usage(USAGE_READ_CONFIG)),
            },
            "read" => match args {
                [slave, addr, len, ..] => Command::Read {
                    slave: number(slave)?,
                    addr: number(addr)?,
                    len: number(len)?,
                },
                _ => return Err(ParseError::Usage(USAGE_READ)),
            },
            "write" => match args {
                [slave, addr, data @ ..] if !data.is_empty() => Command::Write {
                    slave: number(slave)?,
                    addr: number(addr)?,
                    data: bytes(data)?,
                },
                _ => return Err(ParseError::Usage(USAGE_WRITE)),
            },
            "text-write" => match args {
                [slave, addr, words @ ..] if !words.is_empty() => Command::TextWrite {
                    slave: number(slave)?,
                    addr: number(addr)?,
                    text: join_words(words),
                },
                _ => return Err(ParseError::Usage(USAGE_TEXT_WRITE)),
            },
            "verbose" => match args {
                [] => Command::Verbose(None),
                ["on", ..] | ["1", ..] => Command::Verbose(Some(true)),
                ["off", ..] | ["0", ..] => Command::Verbose(Some(false)),
                _ => return Err(ParseError::Usage(USAGE_VERBOSE)),
            },
            "pdo-write" => match args {
                [offset, data @ ..] if !data.is_empty() => Command::PdoWrite {
                    offset: number(offset)?,
                    data: bytes(data)?,
                },
                _ => return Err(ParseError::Usage(USAGE_PDO_WRITE)),
            },
            "pdo-loop" => match args {
                [cycles, rest @ ..] => {
                    let cycles: u32 = number(cycles).map_err(|_| ParseError::Range {
                        what: "cycles count",
                        min: 1,
                        max: u64::from(MAX_LOOP_CYCLES),
                    })?;
                    in_range(u64::from(cycles), "cycles count", 1, u64::from(MAX_LOOP_CYCLES))?;
                    let interval_ms = match rest.first() {
                        None => DEFAULT_LOOP_INTERVAL_MS,
                        Some(t) => number(t).map_err(|_| ParseError::Range {
                            what: "interval",
                            min: 1,
                            max: MAX_LOOP_INTERVAL_MS,
                        })?,
                    };
                    in_range(interval_ms, "interval", 1, MAX_LOOP_INTERVAL_MS)?;
                    Command::PdoLoop {
                        cycles,
                        interval_ms,
                    }
                }
                _ => return Err(ParseError::Usage(USAGE_PDO_LOOP)),
            },
            other => return Err(ParseError::Unknown(other.to_owned())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Result<Command, ParseError> {
        line.parse()
    }

    #[test]
    fn empty_line_is_help() {
        assert_eq!(parse(""), Ok(Command::Help));
        assert_eq!(parse("   \t "), Ok(Command::Help));
        assert_eq!(parse("?"), Ok(Command::Help));
    }

    #[test]
    fn simple_commands() {
        assert_eq!(parse("scan"), Ok(Command::Scan));
        assert_eq!(parse("exit"), Ok(Command::Quit));
        assert_eq!(parse("quit now"), Ok(Command::Quit));
        assert_eq!(parse("  status  "), Ok(Command::Status));
        assert_eq!(parse("pdo-start"), Ok(Command::PdoStart));
        assert_eq!(parse("pdo-stop"), Ok(Command::PdoStop));
        assert_eq!(parse("pdo-read"), Ok(Command::PdoRead));
    }

    #[test]
    fn register_commands() {
        assert_eq!(
            parse("read 1 0x1000 16"),
            Ok(Command::Read {
                slave: 1,
                addr: 0x1000,
                len: 16
            })
        );
        assert_eq!(
            parse("write 1 0x1000 0x12 0x34 171"),
            Ok(Command::Write {
                slave: 1,
                addr: 0x1000,
                data: vec![0x12, 0x34, 0xab]
            })
        );
        assert_eq!(
            parse("text-write 2 0x1000 Hello   World"),
            Ok(Command::TextWrite {
                slave: 2,
                addr: 0x1000,
                text: "Hello World".into()
            })
        );
        assert_eq!(parse("read-config 0x2"), Ok(Command::ReadConfig { slave: 2 }));
        assert_eq!(parse("read 1 0x1000"), Err(ParseError::Usage(USAGE_READ)));
        assert_eq!(parse("write 1 0x1000"), Err(ParseError::Usage(USAGE_WRITE)));
        assert_eq!(parse("read-config"), Err(ParseError::Usage(USAGE_READ_CONFIG)));
        assert_eq!(
            parse("write 1 0x1000 0x100"),
            Err(ParseError::Number("0x100".into()))
        );
        assert_eq!(
            parse("read 1 0x10000 4"),
            Err(ParseError::Number("0x10000".into()))
        );
    }

    #[test]
    fn slave_indices_are_checked_by_the_dispatcher() {
        assert_eq!(
            parse("read 70000 0x1000 4"),
            Ok(Command::Read {
                slave: 70000,
                addr: 0x1000,
                len: 4
            })
        );
        assert_eq!(
            parse("write -1 0x1000 1"),
            Ok(Command::Write {
                slave: -1,
                addr: 0x1000,
                data: vec![1]
            })
        );
        assert_eq!(parse("read-config x"), Err(ParseError::Number("x".into())));
    }

    #[test]
    fn lengths_are_checked_by_the_master() {
        assert_eq!(
            parse("read 1 0x1000 0"),
            Ok(Command::Read {
                slave: 1,
                addr: 0x1000,
                len: 0
            })
        );
        assert!(parse("read 1 0x1000 2048").is_ok());
    }

    #[test]
    fn verbose_argument() {
        assert_eq!(parse("verbose"), Ok(Command::Verbose(None)));
        assert_eq!(parse("verbose on"), Ok(Command::Verbose(Some(true))));
        assert_eq!(parse("verbose 0"), Ok(Command::Verbose(Some(false))));
        assert_eq!(parse("verbose maybe"), Err(ParseError::Usage(USAGE_VERBOSE)));
    }

    #[test]
    fn pdo_commands() {
        assert_eq!(
            parse("pdo-write 0 0xFF 0x00"),
            Ok(Command::PdoWrite {
                offset: 0,
                data: vec![0xff, 0x00]
            })
        );
        assert_eq!(parse("pdo-write 0"), Err(ParseError::Usage(USAGE_PDO_WRITE)));
        assert_eq!(
            parse("pdo-loop 1000"),
            Ok(Command::PdoLoop {
                cycles: 1000,
                interval_ms: DEFAULT_LOOP_INTERVAL_MS
            })
        );
        assert_eq!(
            parse("pdo-loop 10 0x20"),
            Ok(Command::PdoLoop {
                cycles: 10,
                interval_ms: 32
            })
        );
        assert!(matches!(
            parse("pdo-loop 0"),
            Err(ParseError::Range {
                what: "cycles count",
                ..
            })
        ));
        assert!(matches!(
            parse("pdo-loop 1000001"),
            Err(ParseError::Range { .. })
        ));
        assert!(matches!(
            parse("pdo-loop 10 0"),
            Err(ParseError::Range {
                what: "interval",
                ..
            })
        ));
        assert!(matches!(
            parse("pdo-loop 10 10001"),
            Err(ParseError::Range { .. })
        ));
        assert_eq!(parse("pdo-loop"), Err(ParseError::Usage(USAGE_PDO_LOOP)));
    }

    #[test]
    fn unknown_command() {
        let err = parse("frobnicate 1 2").unwrap_err();
        assert_eq!(err, ParseError::Unknown("frobnicate".into()));
        assert_eq!(
            err.to_string(),
            "Unknown command 'frobnicate'. Type 'help' for list of commands."
        );
    }
}
