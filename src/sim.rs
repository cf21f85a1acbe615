// Part of ethercat-cli. Copyright 2026 by the authors.
// This work is dual-licensed under Apache 2.0 and MIT terms.

//! An in-memory EtherCAT segment implementing [`Transport`].
//!
//! Slaves keep their own register memory and process data, follow state
//! requests unless pinned to a state, and answer cyclic exchanges with the
//! working counter the mapping expects. Counters record every call that
//! would put traffic on a real link.

use crate::{
    image::Layout,
    transport::Transport,
    types::*,
};
use std::time::Duration;

/// Vendor ID reported by simulated slaves.
pub const SIM_VENDOR_ID: u32 = 0x0000_0E5A;

const MEMORY_SIZE: usize = 0x1_0000 + MAX_ACCESS_LEN;
const REG_STATION_ADDR: u16 = 0x0010;
const REG_AL_STATUS: u16 = 0x0130;
const FIRST_STATION_ADDR: u16 = 0x1001;
const SM_OUTPUTS_ADDR: u16 = 0x1100;
const SM_INPUTS_ADDR: u16 = 0x1180;
const MAILBOX_COE: u16 = 0x0004;

/// Number of calls the bus has seen, per primitive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimCounters {
    pub opens: u32,
    pub closes: u32,
    pub scans: u32,
    pub state_requests: u32,
    pub sends: u32,
    pub receives: u32,
    pub reads: u32,
    pub writes: u32,
}

#[derive(Debug, Clone)]
pub struct SimSlave {
    info: SlaveInfo,
    stuck: Option<SlaveState>,
    silent: bool,
    memory: Vec<u8>,
    outputs: Vec<u8>,
    inputs: Vec<u8>,
}

impl SimSlave {
    /// A slave with `input_bytes` of inputs and `output_bytes` of outputs.
    /// Slaves with process data get a CoE mailbox.
    pub fn new(name: &str, input_bytes: u16, output_bytes: u16) -> Self {
        let product_code = name
            .bytes()
            .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(u32::from(b)));
        let mut info = SlaveInfo::new(name, SlaveId::new(SIM_VENDOR_ID, product_code), 0);
        info.revision = 0x0001_0000;
        info.input_bits = input_bytes.saturating_mul(8);
        info.output_bits = output_bytes.saturating_mul(8);
        if input_bytes > 0 || output_bytes > 0 {
            info.mailbox = MailboxInfo::new(128, MAILBOX_COE);
            info.coe_details = CoeDetails(
                CoeDetails::SDO
                    | CoeDetails::SDO_INFO
                    | CoeDetails::PDO_ASSIGN
                    | CoeDetails::PDO_CONFIG
                    | CoeDetails::SDO_CA,
            );
            info.syncs.push(SmInfo::new(0x1000, 128, 0x0001_0026));
            info.syncs.push(SmInfo::new(0x1080, 128, 0x0001_0022));
        }
        if output_bytes > 0 {
            info.syncs
                .push(SmInfo::new(SM_OUTPUTS_ADDR, output_bytes, 0x0001_0064));
        }
        if input_bytes > 0 {
            info.syncs
                .push(SmInfo::new(SM_INPUTS_ADDR, input_bytes, 0x0001_0020));
        }
        Self {
            stuck: None,
            silent: false,
            memory: vec![0; MEMORY_SIZE],
            outputs: vec![0; info.output_bytes()],
            inputs: vec![0; info.input_bytes()],
            info,
        }
    }

    pub fn with_id(mut self, id: SlaveId) -> Self {
        self.info.id = id;
        self
    }

    /// The slave ignores every state request and stays in `state`.
    pub fn stuck_at(mut self, state: SlaveState) -> Self {
        self.stuck = Some(state);
        self.info.state = state;
        self
    }

    /// The slave does not answer addressed register access.
    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    pub fn info(&self) -> &SlaveInfo {
        &self.info
    }

    fn follow(&mut self, state: SlaveState) {
        self.info.state = self.stuck.unwrap_or(state);
    }

    /// Loops outputs back into inputs, wrapping when the sizes differ.
    fn cycle(&mut self) {
        if self.outputs.is_empty() {
            return;
        }
        let outputs = &self.outputs;
        for (i, b) in self.inputs.iter_mut().enumerate() {
            *b = outputs[i % outputs.len()];
        }
    }

    fn read_memory(&self, register: u16, buf: &mut [u8]) {
        let start = register as usize;
        buf.copy_from_slice(&self.memory[start..start + buf.len()]);
        let station = self.info.station_addr.to_le_bytes();
        let state = self.info.state.code().to_le_bytes();
        overlay(buf, register, REG_STATION_ADDR, &station);
        overlay(buf, register, REG_AL_STATUS, &state);
    }
}

/// Copies the bytes of a live register into a read window that covers it.
fn overlay(buf: &mut [u8], window: u16, register: u16, value: &[u8]) {
    let window = window as usize;
    for (i, b) in value.iter().enumerate() {
        let addr = register as usize + i;
        if addr >= window && addr < window + buf.len() {
            buf[addr - window] = *b;
        }
    }
}

/// A simulated EtherCAT segment.
#[derive(Debug, Clone, Default)]
pub struct SimBus {
    slaves: Vec<SimSlave>,
    enumerated: usize,
    layout: Option<Layout>,
    open: bool,
    pending: bool,
    deficits: u32,
    counters: SimCounters,
    last_error: Option<String>,
}

impl SimBus {
    pub fn new(slaves: Vec<SimSlave>) -> Self {
        Self {
            slaves,
            ..Self::default()
        }
    }

    /// Builds a bus from an interface name of the form `sim` or
    /// `sim:<name>[/<inputs>x<outputs>],...` with sizes in bytes.
    /// Plain `sim` is a single `EM3E` slave with two bytes each way.
    pub fn from_interface(interface: &str) -> Result<Self> {
        let segment = if interface == "sim" {
            "EM3E/2x2"
        } else if let Some(segment) = interface.strip_prefix("sim:") {
            segment
        } else {
            return Err(Error::Configuration(format!(
                "no transport provider available for interface '{}'",
                interface
            )));
        };

        let mut slaves = vec![];
        for item in segment.split(',').filter(|s| !s.is_empty()) {
            let (name, sizes) = match item.find('/') {
                Some(pos) => (&item[..pos], Some(&item[pos + 1..])),
                None => (item, None),
            };
            let (inputs, outputs) = match sizes {
                None => (0, 0),
                Some(sizes) => parse_sizes(sizes).ok_or_else(|| {
                    Error::Configuration(format!("invalid simulated slave '{}'", item))
                })?,
            };
            slaves.push(SimSlave::new(name, inputs, outputs));
        }
        Ok(Self::new(slaves))
    }

    /// Plugs another slave in at the end of the segment. It shows up with
    /// the next enumeration.
    pub fn attach(&mut self, slave: SimSlave) {
        self.slaves.push(slave);
    }

    pub fn counters(&self) -> SimCounters {
        self.counters
    }

    /// The next `n` cyclic exchanges report one working counter short.
    pub fn inject_deficits(&mut self, n: u32) {
        self.deficits += n;
    }

    /// Register memory of an enumerated slave.
    pub fn memory(&self, slave: SlaveIdx) -> Option<&[u8]> {
        self.slave(slave).map(|s| &s.memory[..])
    }

    /// Outputs last received by an enumerated slave.
    pub fn slave_outputs(&self, slave: SlaveIdx) -> Option<&[u8]> {
        self.slave(slave).map(|s| &s.outputs[..])
    }

    /// Presets the inputs of a slave that has no outputs to loop back.
    pub fn set_inputs(&mut self, slave: SlaveIdx, data: &[u8]) {
        if let Some(s) = self.slave_mut(slave) {
            let n = data.len().min(s.inputs.len());
            s.inputs[..n].copy_from_slice(&data[..n]);
        }
    }

    fn slave(&self, slave: SlaveIdx) -> Option<&SimSlave> {
        let i = (slave as usize).checked_sub(1)?;
        self.slaves[..self.enumerated].get(i)
    }

    fn slave_mut(&mut self, slave: SlaveIdx) -> Option<&mut SimSlave> {
        let i = (slave as usize).checked_sub(1)?;
        self.slaves[..self.enumerated].get_mut(i)
    }

    fn by_station(&mut self, station: u16) -> Option<&mut SimSlave> {
        self.slaves[..self.enumerated]
            .iter_mut()
            .find(|s| s.info.station_addr == station)
    }

    /// Working counter of an addressed datagram.
    fn answer(&mut self, station: u16, answered: bool) -> Result<i32> {
        if answered {
            return Ok(1);
        }
        self.last_error = Some(format!("station 0x{:04X} did not respond", station));
        Ok(0)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(Error::Transport("link is not open".into()))
        }
    }

    fn mapped(&self) -> Result<&Layout> {
        self.layout
            .as_ref()
            .ok_or_else(|| Error::Transport("process image is not mapped".into()))
    }
}

fn parse_sizes(sizes: &str) -> Option<(u16, u16)> {
    let pos = sizes.find('x')?;
    let inputs = sizes[..pos].parse().ok()?;
    let outputs = sizes[pos + 1..].parse().ok()?;
    Some((inputs, outputs))
}

impl Transport for SimBus {
    fn open(&mut self, interface: &str) -> Result<()> {
        self.counters.opens += 1;
        if !interface.starts_with("sim") {
            self.last_error = Some(format!("no such interface '{}'", interface));
            return Err(Error::Transport(format!(
                "Failed to open interface {}",
                interface
            )));
        }
        self.open = true;
        self.last_error = None;
        Ok(())
    }

    fn configure_network(&mut self) -> Result<i32> {
        self.ensure_open()?;
        self.counters.scans += 1;
        self.layout = None;
        self.pending = false;
        self.enumerated = self.slaves.len();
        for (i, slave) in self.slaves.iter_mut().enumerate() {
            slave.info.station_addr = FIRST_STATION_ADDR + i as u16;
            slave.info.fmmus.clear();
            slave.follow(SlaveState::PreOp);
        }
        Ok(self.enumerated as i32)
    }

    fn slave_info(&mut self, slave: SlaveIdx) -> Result<SlaveInfo> {
        self.ensure_open()?;
        self.slave(slave)
            .map(|s| s.info.clone())
            .ok_or_else(|| Error::Transport(format!("no slave at position {}", slave)))
    }

    fn map_process_image(&mut self) -> Result<Layout> {
        self.ensure_open()?;
        let infos: Vec<SlaveInfo> = self.slaves[..self.enumerated]
            .iter()
            .map(|s| s.info.clone())
            .collect();
        let layout = Layout::compute(&infos);
        for (slave, regions) in self.slaves.iter_mut().zip(&layout.slaves) {
            let fmmus = &mut slave.info.fmmus;
            if regions.outputs.size > 0 {
                fmmus.push(FmmuInfo::new(
                    regions.outputs.offset as u32,
                    regions.outputs.size as u16,
                    SM_OUTPUTS_ADDR,
                ));
            }
            if regions.inputs.size > 0 {
                fmmus.push(FmmuInfo::new(
                    (layout.output_bytes + regions.inputs.offset) as u32,
                    regions.inputs.size as u16,
                    SM_INPUTS_ADDR,
                ));
            }
            fmmus.truncate(MAX_FMMU);
        }
        self.layout = Some(layout.clone());
        Ok(layout)
    }

    fn request_state(&mut self, slave: SlaveIdx, state: SlaveState) -> Result<()> {
        self.ensure_open()?;
        self.counters.state_requests += 1;
        if slave == 0 {
            for s in &mut self.slaves[..self.enumerated] {
                s.follow(state);
            }
        } else if let Some(s) = self.slave_mut(slave) {
            s.follow(state);
        }
        Ok(())
    }

    fn poll_state(&mut self, target: SlaveState, _timeout: Duration) -> Result<u16> {
        self.ensure_open()?;
        let matched = self.slaves[..self.enumerated]
            .iter()
            .filter(|s| s.info.state == target)
            .count();
        Ok(matched as u16)
    }

    fn slave_state(&mut self, slave: SlaveIdx) -> Result<SlaveState> {
        self.ensure_open()?;
        self.slave(slave)
            .map(|s| s.info.state)
            .ok_or_else(|| Error::Transport(format!("no slave at position {}", slave)))
    }

    fn send_outputs(&mut self, outputs: &[u8]) -> Result<()> {
        self.ensure_open()?;
        self.counters.sends += 1;
        let layout = self.mapped()?.clone();
        if outputs.len() != layout.output_bytes {
            return Err(Error::Transport(format!(
                "output frame of {} bytes, {} mapped",
                outputs.len(),
                layout.output_bytes
            )));
        }
        for (slave, regions) in self.slaves.iter_mut().zip(&layout.slaves) {
            slave
                .outputs
                .copy_from_slice(&outputs[regions.outputs.range()]);
        }
        self.pending = true;
        Ok(())
    }

    fn receive_inputs(&mut self, inputs: &mut [u8], _timeout: Duration) -> Result<i32> {
        self.ensure_open()?;
        self.counters.receives += 1;
        if !self.pending {
            self.last_error = Some("receive without pending frame".into());
            return Ok(0);
        }
        self.pending = false;
        let layout = self.mapped()?.clone();
        if inputs.len() != layout.input_bytes {
            return Err(Error::Transport(format!(
                "input frame of {} bytes, {} mapped",
                inputs.len(),
                layout.input_bytes
            )));
        }
        for (slave, regions) in self.slaves.iter_mut().zip(&layout.slaves) {
            slave.cycle();
            inputs[regions.inputs.range()].copy_from_slice(&slave.inputs);
        }
        let mut wkc = layout.expected_wkc();
        if self.deficits > 0 {
            self.deficits -= 1;
            wkc -= 1;
        }
        Ok(wkc)
    }

    fn addressed_read(
        &mut self,
        station: u16,
        register: u16,
        buf: &mut [u8],
        _timeout: Duration,
    ) -> Result<i32> {
        self.ensure_open()?;
        self.counters.reads += 1;
        let answered = match self.by_station(station) {
            Some(slave) if !slave.silent => {
                slave.read_memory(register, buf);
                true
            }
            _ => false,
        };
        self.answer(station, answered)
    }

    fn addressed_write(
        &mut self,
        station: u16,
        register: u16,
        data: &[u8],
        _timeout: Duration,
    ) -> Result<i32> {
        self.ensure_open()?;
        self.counters.writes += 1;
        let answered = match self.by_station(station) {
            Some(slave) if !slave.silent => {
                let start = register as usize;
                slave.memory[start..start + data.len()].copy_from_slice(data);
                true
            }
            _ => false,
        };
        self.answer(station, answered)
    }

    fn close(&mut self) {
        self.counters.closes += 1;
        self.open = false;
        self.layout = None;
        self.pending = false;
    }

    fn last_error_text(&self) -> Option<String> {
        self.last_error.clone()
    }
}
