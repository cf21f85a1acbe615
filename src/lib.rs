// Part of ethercat-cli. Copyright 2026 by the authors.
// This work is dual-licensed under Apache 2.0 and MIT terms.

//! 	An interactive EtherCAT master session engine.
//!
//! 	The crate discovers slaves on a segment, walks them through the EtherCAT state machine, maps and exchanges cyclic process data while checking the working counter, and gives bounded access to device memory outside the cyclic exchange.
//!
//! 	[Master] is the entry point. It sits on top of any [Transport], the capability interface of a raw link. [SimBus] is an in-memory segment implementing it, used by the `ecat-cli` binary for `sim` interfaces and by the tests. [Shell] turns text commands into calls on a [Master].

mod command;
mod convert;
mod image;
mod master;
mod pdo;
mod registry;
mod shell;
mod sim;
mod transport;
mod types;

pub use self::{
    command::{Command, ParseError},
    convert::hex_dump,
    image::{Layout, ProcessImage, Region, SlaveRegions},
    master::{Master, MasterConfig, MAX_IMAGE_SIZE},
    pdo::{InputSnapshot, LoopSummary, SlaveInputs, Startup},
    registry::SlaveRegistry,
    shell::{Flow, Shell},
    sim::{SimBus, SimCounters, SimSlave, SIM_VENDOR_ID},
    transport::{CancelToken, Transport},
    types::*,
};
