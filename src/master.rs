// Part of ethercat-cli. Copyright 2026 by the authors.
// This work is dual-licensed under Apache 2.0 and MIT terms.

use crate::{
    image::{Layout, ProcessImage},
    registry::SlaveRegistry,
    transport::{CancelToken, Transport},
    types::*,
};
use derive_new::new;
use std::{convert::TryFrom, time::Duration};

/// Process image limit, matching the I/O map size of common masters.
pub const MAX_IMAGE_SIZE: usize = 4096;

/// Timing and sizing knobs of a master session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, new)]
pub struct MasterConfig {
    /// Bound for each state transition poll.
    pub state_timeout: Duration,
    /// Bound for process data receive and addressed register access.
    pub io_timeout: Duration,
    pub max_image_size: usize,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            state_timeout: Duration::from_millis(5000),
            io_timeout: Duration::from_micros(2000),
            max_image_size: MAX_IMAGE_SIZE,
        }
    }
}

/// An EtherCAT master session on top of one open transport.
///
/// All operations take `&mut self`; the session owns the transport, the
/// slave registry and the process image, and releases them together on
/// [`Master::close`].
pub struct Master<T: Transport> {
    pub(crate) transport: T,
    interface: String,
    open: bool,
    verbose: bool,
    pub(crate) config: MasterConfig,
    pub(crate) slaves: SlaveRegistry,
    pub(crate) image: Option<ProcessImage>,
    pub(crate) active: bool,
    pub(crate) stats: ExchangeStatistics,
    pub(crate) running: CancelToken,
}

impl<T: Transport> Master<T> {
    pub fn open(mut transport: T, interface: &str, config: MasterConfig) -> Result<Self> {
        log::debug!("Initializing master on interface: {}", interface);
        if let Err(e) = transport.open(interface) {
            return Err(match (e, transport.last_error_text()) {
                (Error::Transport(msg), Some(text)) => {
                    Error::Transport(format!("{} ({})", msg, text))
                }
                (e, _) => e,
            });
        }
        log::info!("Master opened on interface {}", interface);
        Ok(Master {
            transport,
            interface: interface.to_owned(),
            open: true,
            verbose: false,
            config,
            slaves: SlaveRegistry::default(),
            image: None,
            active: false,
            stats: ExchangeStatistics::default(),
            running: CancelToken::new(),
        })
    }

    /// Releases the transport and the process image. Closing twice is a no-op.
    pub fn close(&mut self) {
        if !self.open {
            return;
        }
        log::debug!("Closing master on interface {}", self.interface);
        self.running.cancel();
        self.active = false;
        self.image = None;
        self.slaves.clear();
        self.transport.close();
        self.open = false;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    pub fn config(&self) -> &MasterConfig {
        &self.config
    }

    pub fn slaves(&self) -> &SlaveRegistry {
        &self.slaves
    }

    pub fn image(&self) -> Option<&ProcessImage> {
        self.image.as_ref()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn last_error_text(&self) -> Option<String> {
        self.transport.last_error_text()
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(Error::NotInitialized)
        }
    }

    /// Enumerates the bus, fills the slave registry and maps the process
    /// image. Returns the number of slaves found.
    ///
    /// Once the transport has been asked to enumerate, a failed scan leaves
    /// the session unscanned: the previous registry and image no longer
    /// describe what the transport has mapped.
    pub fn scan(&mut self) -> Result<u16> {
        self.ensure_open()?;
        if self.active {
            log::info!("Rescanning while PDO exchange is active, stopping exchange");
            self.running.cancel();
            self.active = false;
        }

        log::debug!("Starting bus scan...");
        match self.enumerate() {
            Ok((slaves, image)) => {
                let count = slaves.count();
                self.image = Some(image);
                self.slaves = slaves;
                log::info!("Bus scan found {} slave(s)", count);
                Ok(count)
            }
            Err(e) => {
                self.slaves.clear();
                self.image = None;
                Err(e)
            }
        }
    }

    fn enumerate(&mut self) -> Result<(SlaveRegistry, ProcessImage)> {
        let wkc = self.transport.configure_network()?;
        log::debug!("configure_network returned: {}", wkc);
        if wkc <= 0 {
            return Err(Error::NoSlavesFound);
        }
        let count = u16::try_from(wkc).map_err(|_| {
            Error::Transport(format!("implausible slave count {}", wkc))
        })?;

        let layout = self.transport.map_process_image()?;
        if layout.size() > self.config.max_image_size {
            return Err(Error::ImageTooLarge(
                layout.size(),
                self.config.max_image_size,
            ));
        }
        log::debug!(
            "I/O mapping completed: {} output bytes, {} input bytes",
            layout.output_bytes,
            layout.input_bytes
        );

        let mut slaves = Vec::new();
        slaves.try_reserve_exact(count as usize)?;
        for idx in 1..=count {
            slaves.push(self.transport.slave_info(idx)?);
        }
        layout.check(&slaves)?;
        for (slave, regions) in slaves.iter_mut().zip(&layout.slaves) {
            slave.regions = *regions;
        }

        let image = ProcessImage::new(layout)?;
        Ok((SlaveRegistry::from_slaves(slaves), image))
    }

    /// Requests `target` on all slaves and waits up to `timeout` for them to
    /// get there. Slaves that do not follow are reported, not treated as an
    /// error. The order of transitions is up to the caller.
    pub fn request_state(&mut self, target: SlaveState, timeout: Duration) -> Result<Transition> {
        self.ensure_open()?;
        log::debug!("Requesting state {} for all slaves", target);
        self.transport.request_state(0, target)?;
        let matched = self.transport.poll_state(target, timeout)?;
        let total = self.slaves.count();

        if matched >= total {
            self.slaves.set_all_states(target);
            log::debug!("All slaves reached {} state", target);
            return Ok(Transition::Complete { target, matched });
        }

        let mut laggards = vec![];
        for idx in 1..=total {
            let actual = self.transport.slave_state(idx)?;
            self.slaves.set_state(idx, actual);
            if actual != target {
                log::warn!("Slave {}: {} (expected {})", idx, actual, target);
                laggards.push(Laggard { slave: idx, actual });
            }
        }
        Ok(Transition::Partial(PartialTransition {
            target,
            matched,
            total,
            laggards,
        }))
    }

    fn check_access(&self, slave: SlaveIdx, len: usize) -> Result<u16> {
        self.ensure_open()?;
        let station = self.slaves.get(slave)?.station_addr;
        if len == 0 || len > MAX_ACCESS_LEN {
            return Err(AccessError::InvalidLength(len).into());
        }
        Ok(station)
    }

    /// Reads `len` bytes of device memory at `addr` of a slave, independent
    /// of the process data mapping.
    pub fn read_register(&mut self, slave: SlaveIdx, addr: u16, len: usize) -> Result<Vec<u8>> {
        let station = self.check_access(slave, len)?;
        let mut buf = Vec::new();
        buf.try_reserve_exact(len)?;
        buf.resize(len, 0);

        log::debug!(
            "Reading {} bytes from slave {} at address 0x{:04X}",
            len,
            slave,
            addr
        );
        let wkc = self
            .transport
            .addressed_read(station, addr, &mut buf, self.config.io_timeout)?;
        if wkc <= 0 {
            return Err(AccessError::NoResponse { slave, wkc }.into());
        }
        Ok(buf)
    }

    /// Writes `data` to device memory at `addr` of a slave, independent of
    /// the process data mapping.
    pub fn write_register(&mut self, slave: SlaveIdx, addr: u16, data: &[u8]) -> Result<()> {
        let station = self.check_access(slave, data.len())?;
        log::debug!(
            "Writing {} bytes to slave {} at address 0x{:04X}",
            data.len(),
            slave,
            addr
        );
        let wkc = self
            .transport
            .addressed_write(station, addr, data, self.config.io_timeout)?;
        if wkc <= 0 {
            return Err(AccessError::NoResponse { slave, wkc }.into());
        }
        Ok(())
    }

    /// Working counter a complete process data round trip should produce.
    pub fn expected_wkc(&self) -> i32 {
        self.image
            .as_ref()
            .map_or(0, |image| image.layout().expected_wkc())
    }

    pub fn layout(&self) -> Option<&Layout> {
        self.image.as_ref().map(ProcessImage::layout)
    }
}

impl<T: Transport> Drop for Master<T> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimBus, SimSlave};

    fn open(bus: SimBus) -> Master<SimBus> {
        Master::open(bus, "sim", MasterConfig::default()).unwrap()
    }

    fn scanned(bus: SimBus) -> Master<SimBus> {
        let mut master = open(bus);
        master.scan().unwrap();
        master
    }

    #[test]
    fn open_fails_for_foreign_interface() {
        let err = Master::open(SimBus::new(vec![]), "eth0", MasterConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(
            err.to_string(),
            "Transport error: Failed to open interface eth0 (no such interface 'eth0')"
        );
    }

    #[test]
    fn scan_lists_slaves_without_master() {
        let mut master = open(SimBus::new(vec![SimSlave::new("EM3E", 2, 2)]));
        assert_eq!(master.scan().unwrap(), 1);
        let slaves: Vec<_> = master.slaves().iter().map(|(i, s)| (i, s.name.clone())).collect();
        assert_eq!(slaves, vec![(1, "EM3E".to_string())]);
        assert_eq!(master.expected_wkc(), 3);
        assert_eq!(master.image().unwrap().layout().size(), 4);
    }

    #[test]
    fn scan_without_slaves_is_recoverable() {
        let mut master = open(SimBus::new(vec![]));
        assert!(matches!(master.scan(), Err(Error::NoSlavesFound)));
        assert!(master.is_open());
        assert!(master.image().is_none());
        master.transport_mut().attach(SimSlave::new("EM3E", 1, 1));
        assert_eq!(master.scan().unwrap(), 1);
    }

    #[test]
    fn scan_rejects_oversized_image() {
        let mut master = open(SimBus::new(vec![SimSlave::new("EM3E", 2, 2)]));
        master.scan().unwrap();
        master.start_exchange().unwrap();
        master.transport_mut().attach(SimSlave::new("BIG", 4000, 200));
        assert!(matches!(master.scan(), Err(Error::ImageTooLarge(4204, 4096))));
        assert!(!master.is_active());
        assert!(master.slaves().is_empty());
        assert!(master.image().is_none());
        assert!(matches!(master.start_exchange(), Err(Error::NotScanned)));
        assert!(matches!(master.exchange_once(), Err(Error::NotActive)));

        master.config.max_image_size = 8192;
        assert_eq!(master.scan().unwrap(), 2);
        master.start_exchange().unwrap();
        assert_eq!(
            master.exchange_once().unwrap(),
            Exchange::Complete { wkc: 6 }
        );
    }

    #[test]
    fn closed_master_rejects_everything() {
        let mut master = scanned(SimBus::new(vec![SimSlave::new("EM3E", 2, 2)]));
        master.close();
        master.close();
        assert!(!master.is_open());
        assert!(matches!(master.scan(), Err(Error::NotInitialized)));
        assert!(matches!(
            master.read_register(1, 0x1000, 16),
            Err(Error::NotInitialized)
        ));
        assert!(master.image().is_none());
        assert_eq!(master.transport().counters().closes, 1);
    }

    #[test]
    fn complete_transition_counts_all_slaves() {
        let mut master = scanned(SimBus::new(vec![
            SimSlave::new("EK1100", 0, 0),
            SimSlave::new("EM3E", 2, 2),
        ]));
        let t = master
            .request_state(SlaveState::SafeOp, Duration::from_millis(10))
            .unwrap();
        assert_eq!(
            t,
            Transition::Complete {
                target: SlaveState::SafeOp,
                matched: 2
            }
        );
        assert!(master.slaves().iter().all(|(_, s)| s.state == SlaveState::SafeOp));
    }

    #[test]
    fn partial_transition_reports_exactly_the_laggards() {
        let mut master = scanned(SimBus::new(vec![
            SimSlave::new("EK1100", 0, 0),
            SimSlave::new("EL2008", 0, 1).stuck_at(SlaveState::PreOp),
            SimSlave::new("EM3E", 2, 2),
            SimSlave::new("EL1008", 1, 0).stuck_at(SlaveState::Init),
        ]));
        let t = master
            .request_state(SlaveState::Op, Duration::from_millis(10))
            .unwrap();
        match t {
            Transition::Partial(p) => {
                assert_eq!(p.matched, 2);
                assert_eq!(p.total, 4);
                assert_eq!(
                    p.laggards,
                    vec![
                        Laggard {
                            slave: 2,
                            actual: SlaveState::PreOp
                        },
                        Laggard {
                            slave: 4,
                            actual: SlaveState::Init
                        },
                    ]
                );
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(master.slaves().get(3).unwrap().state, SlaveState::Op);
        assert_eq!(master.slaves().get(4).unwrap().state, SlaveState::Init);
    }

    #[test]
    fn register_access_validates_before_touching_the_bus() {
        let mut master = scanned(SimBus::new(vec![SimSlave::new("EM3E", 2, 2)]));
        for len in [0usize, 1025, 4096].iter() {
            let err = master.read_register(1, 0x1000, *len).unwrap_err();
            assert!(matches!(
                err,
                Error::Access(AccessError::InvalidLength(l)) if l == *len
            ));
        }
        assert!(matches!(
            master.write_register(1, 0x1000, &[]),
            Err(Error::Access(AccessError::InvalidLength(0)))
        ));
        assert!(matches!(
            master.read_register(2, 0x1000, 4),
            Err(Error::Access(AccessError::InvalidIndex { index: 2, count: 1 }))
        ));
        assert!(matches!(
            master.read_register(0, 0x1000, 4),
            Err(Error::Access(AccessError::InvalidIndex { index: 0, count: 1 }))
        ));
        let counters = master.transport().counters();
        assert_eq!(counters.reads, 0);
        assert_eq!(counters.writes, 0);
    }

    #[test]
    fn register_round_trip_stays_in_window() {
        let mut master = scanned(SimBus::new(vec![SimSlave::new("EM3E", 2, 2)]));
        master.write_register(1, 0x1000, &[0x12, 0x34, 0xab]).unwrap();
        assert_eq!(
            master.read_register(1, 0x0fff, 5).unwrap(),
            vec![0x00, 0x12, 0x34, 0xab, 0x00]
        );
        assert_eq!(master.read_register(1, 0x1000, 1024).unwrap().len(), 1024);
        let memory = master.transport().memory(1).unwrap();
        assert_eq!(&memory[0x1000..0x1003], &[0x12, 0x34, 0xab]);
        assert_eq!(memory[0x1003], 0);
    }

    #[test]
    fn silent_slave_is_no_response() {
        let mut master = scanned(SimBus::new(vec![SimSlave::new("EM3E", 2, 2).silent()]));
        assert!(matches!(
            master.read_register(1, 0x1000, 16),
            Err(Error::Access(AccessError::NoResponse { slave: 1, wkc: 0 }))
        ));
        assert!(matches!(
            master.write_register(1, 0x1000, &[1]),
            Err(Error::Access(AccessError::NoResponse { slave: 1, .. }))
        ));
        assert!(master.is_open());
    }
}
