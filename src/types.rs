// Part of ethercat-cli. Copyright 2026 by the authors.
// This work is dual-licensed under Apache 2.0 and MIT terms.

use crate::image::SlaveRegions;
use derive_new::new;
use std::{collections::TryReserveError, fmt, io};
use thiserror::Error;

/// Largest window a single register read or write may cover.
pub const MAX_ACCESS_LEN: usize = 1024;
/// Maximum number of sync managers kept per slave.
pub const MAX_SM: usize = 8;
/// Maximum number of FMMUs kept per slave.
pub const MAX_FMMU: usize = 4;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("EtherCAT master not initialized")]
    NotInitialized,
    #[error("No slaves found. Run 'scan' first.")]
    NotScanned,
    #[error("No slaves found on the bus")]
    NoSlavesFound,
    #[error("PDO exchange not active. Run 'pdo-start' first.")]
    NotActive,
    #[error("No output data available (0 bytes)")]
    NoOutputs,
    #[error("Process image of {0} bytes exceeds the limit of {1} bytes")]
    ImageTooLarge(usize, usize),
    #[error("Inconsistent process data layout: {0}")]
    Layout(String),
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error("Memory allocation failed")]
    Memory(#[from] TryReserveError),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        io::Error::new(io::ErrorKind::Other, e)
    }
}

/// Rejections of a single direct-access or process-data write request.
/// None of them changes the session state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("Invalid slave index {index} (valid range: 1-{count})")]
    InvalidIndex { index: i64, count: u16 },
    #[error("Invalid length {0} (must be 1-1024)")]
    InvalidLength(usize),
    #[error("Write would exceed output buffer (offset {offset} + len {len} > {size} bytes)")]
    OutOfRange {
        offset: usize,
        len: usize,
        size: usize,
    },
    #[error("No response from slave {slave} (working counter {wkc})")]
    NoResponse { slave: u16, wkc: i32 },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Position of a slave in the registry. `0` addresses the master
/// (and, for state requests, all slaves at once).
pub type SlaveIdx = u16;

/// Application layer state of a slave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlaveState {
    Init,
    PreOp,
    SafeOp,
    Op,
    Unknown(u16),
}

impl SlaveState {
    pub const fn code(self) -> u16 {
        match self {
            SlaveState::Init => 0x01,
            SlaveState::PreOp => 0x02,
            SlaveState::SafeOp => 0x04,
            SlaveState::Op => 0x08,
            SlaveState::Unknown(x) => x,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            SlaveState::Init => "INIT",
            SlaveState::PreOp => "PRE-OP",
            SlaveState::SafeOp => "SAFE-OP",
            SlaveState::Op => "OPERATIONAL",
            SlaveState::Unknown(_) => "UNKNOWN",
        }
    }
}

impl From<u16> for SlaveState {
    fn from(st: u16) -> Self {
        match st {
            0x01 => SlaveState::Init,
            0x02 => SlaveState::PreOp,
            0x04 => SlaveState::SafeOp,
            0x08 => SlaveState::Op,
            x => SlaveState::Unknown(x),
        }
    }
}

impl fmt::Display for SlaveState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An EtherCAT slave identification, consisting of vendor ID and product code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, new)]
pub struct SlaveId {
    pub vendor_id: u32,
    pub product_code: u32,
}

/// Sync Manager Info
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, new)]
pub struct SmInfo {
    pub start_addr: u16,
    pub length: u16,
    pub flags: u32,
}

impl SmInfo {
    pub const fn control(&self) -> u8 {
        self.flags as u8
    }

    pub const fn enable(&self) -> u8 {
        (self.flags >> 16) as u8
    }
}

/// FMMU Info
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, new)]
pub struct FmmuInfo {
    pub log_start: u32,
    pub log_length: u16,
    pub phys_start: u16,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, new)]
pub struct MailboxInfo {
    pub length: u16,
    pub protocols: u16,
}

/// CoE capability bits as reported by the slave information interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoeDetails(pub u8);

impl CoeDetails {
    pub const SDO: u8 = 0x01;
    pub const SDO_INFO: u8 = 0x02;
    pub const PDO_ASSIGN: u8 = 0x04;
    pub const PDO_CONFIG: u8 = 0x08;
    pub const SDO_CA: u8 = 0x20;

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, bit: u8) -> bool {
        self.0 & bit != 0
    }

    /// Human readable names of the capabilities worth reporting.
    pub fn capabilities(self) -> Vec<&'static str> {
        [
            (Self::SDO_CA, "SDO CA supported"),
            (Self::SDO_INFO, "SDO Info supported"),
            (Self::PDO_ASSIGN, "PDO Assign supported"),
            (Self::PDO_CONFIG, "PDO Config supported"),
        ]
        .iter()
        .filter(|(bit, _)| self.contains(*bit))
        .map(|(_, name)| *name)
        .collect()
    }
}

/// Everything known about a discovered slave.
#[derive(Debug, Clone, PartialEq)]
pub struct SlaveInfo {
    pub name: String,
    pub id: SlaveId,
    pub revision: u32,
    pub station_addr: u16,
    pub alias_addr: u16,
    pub state: SlaveState,
    pub input_bits: u16,
    pub output_bits: u16,
    pub syncs: Vec<SmInfo>,
    pub fmmus: Vec<FmmuInfo>,
    pub mailbox: MailboxInfo,
    pub coe_details: CoeDetails,
    /// Placement inside the process image, fixed by the mapping step.
    pub regions: SlaveRegions,
}

impl SlaveInfo {
    pub fn new(name: &str, id: SlaveId, station_addr: u16) -> Self {
        Self {
            name: name.to_owned(),
            id,
            revision: 0,
            station_addr,
            alias_addr: 0,
            state: SlaveState::Init,
            input_bits: 0,
            output_bits: 0,
            syncs: vec![],
            fmmus: vec![],
            mailbox: MailboxInfo::default(),
            coe_details: CoeDetails::default(),
            regions: SlaveRegions::default(),
        }
    }

    pub const fn input_bytes(&self) -> usize {
        (self.input_bits as usize + 7) / 8
    }

    pub const fn output_bytes(&self) -> usize {
        (self.output_bits as usize + 7) / 8
    }
}

/// A slave that did not reach the requested state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Laggard {
    pub slave: SlaveIdx,
    pub actual: SlaveState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialTransition {
    pub target: SlaveState,
    pub matched: u16,
    pub total: u16,
    pub laggards: Vec<Laggard>,
}

/// Outcome of a bus-wide state request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Complete { target: SlaveState, matched: u16 },
    Partial(PartialTransition),
}

impl Transition {
    pub const fn is_complete(&self) -> bool {
        matches!(self, Transition::Complete { .. })
    }

    pub fn target(&self) -> SlaveState {
        match self {
            Transition::Complete { target, .. } => *target,
            Transition::Partial(p) => p.target,
        }
    }
}

/// The working counter fell short of what the mapped slaves should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WkcDeficit {
    pub wkc: i32,
    pub expected: i32,
}

/// Outcome of one process data round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exchange {
    Complete { wkc: i32 },
    Deficit(WkcDeficit),
}

impl Exchange {
    pub const fn is_complete(&self) -> bool {
        matches!(self, Exchange::Complete { .. })
    }

    pub const fn wkc(&self) -> i32 {
        match self {
            Exchange::Complete { wkc } => *wkc,
            Exchange::Deficit(d) => d.wkc,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExchangeStatistics {
    pub cycles: u64,
    pub deficits: u64,
}

impl ExchangeStatistics {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub(crate) fn record(&mut self, exchange: &Exchange) {
        self.cycles += 1;
        if !exchange.is_complete() {
            self.deficits += 1;
        }
    }
}
