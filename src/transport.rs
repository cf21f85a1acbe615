// Part of ethercat-cli. Copyright 2026 by the authors.
// This work is dual-licensed under Apache 2.0 and MIT terms.

//! The link layer the master drives. Frame encoding, datagram construction
//! and the physical interface all live behind [`Transport`].

use crate::image::Layout;
use crate::types::{Result, SlaveIdx, SlaveInfo, SlaveState};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

/// Capabilities the master needs from an EtherCAT link.
///
/// Working counters are returned as reported by the link; a value `<= 0`
/// means no slave processed the datagram.
pub trait Transport {
    /// Binds the transport to a network interface.
    fn open(&mut self, interface: &str) -> Result<()>;

    /// Enumerates the slaves on the bus and returns how many were found.
    fn configure_network(&mut self) -> Result<i32>;

    /// Descriptor of the slave at `slave` (1-based) as seen by the last
    /// enumeration.
    fn slave_info(&mut self, slave: SlaveIdx) -> Result<SlaveInfo>;

    /// Computes and fixes the process data layout of all enumerated slaves.
    fn map_process_image(&mut self) -> Result<Layout>;

    /// Writes the requested state to `slave`; `0` addresses all slaves.
    fn request_state(&mut self, slave: SlaveIdx, state: SlaveState) -> Result<()>;

    /// Waits up to `timeout` for all slaves to reach `target` and returns the
    /// number of slaves that did.
    fn poll_state(&mut self, target: SlaveState, timeout: Duration) -> Result<u16>;

    /// Reads back the current state of a single slave.
    fn slave_state(&mut self, slave: SlaveIdx) -> Result<SlaveState>;

    /// Queues the output region of the process image.
    fn send_outputs(&mut self, outputs: &[u8]) -> Result<()>;

    /// Receives the answer to the last [`Transport::send_outputs`] into the
    /// input region and returns the working counter.
    fn receive_inputs(&mut self, inputs: &mut [u8], timeout: Duration) -> Result<i32>;

    /// Configured-address read of `buf.len()` bytes at `register`.
    fn addressed_read(
        &mut self,
        station: u16,
        register: u16,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<i32>;

    /// Configured-address write of `data` at `register`.
    fn addressed_write(
        &mut self,
        station: u16,
        register: u16,
        data: &[u8],
        timeout: Duration,
    ) -> Result<i32>;

    fn close(&mut self);

    /// Description of the most recent link level failure, if any.
    fn last_error_text(&self) -> Option<String>;
}

/// Cooperative stop request for cyclic loops. Checked only between cycles,
/// so an exchange that has started always completes.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
