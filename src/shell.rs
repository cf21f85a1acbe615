// Part of ethercat-cli. Copyright 2026 by the authors.
// This work is dual-licensed under Apache 2.0 and MIT terms.

//! Command dispatcher: runs one [`Command`] against a [`Master`] and renders
//! the outcome for a human reader.

use crate::{
    command::Command,
    convert::hex_dump,
    master::Master,
    pdo::Startup,
    transport::Transport,
    types::*,
};
use std::{convert::TryFrom, io, io::Write, time::Duration};

const HELP: &str = "
=== EtherCAT CLI Commands ===

Basic Commands:
  help              - Show this help message
  scan              - Scan EtherCAT bus and list all slaves
  read-config <idx> - Read configuration of slave at index <idx>
  status            - Show current status and statistics
  verbose [on|off]  - Enable/disable verbose mode
  quit, exit        - Exit the program

Direct Memory Access:
  read <idx> <addr> <len>
                    - Read <len> bytes from slave <idx> at address <addr>
                      Example: read 1 0x1000 16
  write <idx> <addr> <byte1> <byte2> ...
                    - Write bytes to slave <idx> at address <addr>
                      Example: write 1 0x1000 0x12 0x34 0xAB
  text-write <idx> <addr> <text>
                    - Write UTF-8 text to slave <idx> at address <addr>
                      Example: text-write 1 0x1000 Hello World

PDO Cyclic Data Exchange:
  pdo-start         - Start PDO exchange (transition to OPERATIONAL)
  pdo-stop          - Stop PDO exchange (transition to INIT)
  pdo-read          - Read PDO input data from all slaves
  pdo-write <offset> <byte1> <byte2> ...
                    - Write bytes to PDO outputs at offset
                      Example: pdo-write 0 0xFF 0x00
  pdo-loop <cycles> [interval_ms]
                    - Run PDO exchange loop for testing
                      Example: pdo-loop 1000 10
";

/// Whether the dispatcher wants another line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "ON"
    } else {
        "OFF"
    }
}

/// State name, with the raw code for states outside the state machine.
fn describe(state: SlaveState) -> String {
    match state {
        SlaveState::Unknown(code) => format!("{} (0x{:02X})", state, code),
        known => known.to_string(),
    }
}

fn report_transition(t: &Transition, out: &mut dyn Write) -> io::Result<()> {
    if let Transition::Partial(p) = t {
        writeln!(out, "WARNING: Not all slaves reached {} state", p.target)?;
        for lag in &p.laggards {
            writeln!(
                out,
                "  Slave {}: {} (expected {})",
                lag.slave,
                describe(lag.actual),
                p.target
            )?;
        }
    }
    Ok(())
}

fn report_exchange(exchange: &Exchange, out: &mut dyn Write) -> io::Result<()> {
    if let Exchange::Deficit(d) = exchange {
        writeln!(
            out,
            "WARNING: PDO exchange had issues (WKC {} of {})",
            d.wkc, d.expected
        )?;
    }
    Ok(())
}

/// Interactive front end of one master session.
pub struct Shell<T: Transport> {
    master: Master<T>,
}

impl<T: Transport> Shell<T> {
    pub fn new(master: Master<T>) -> Self {
        Self { master }
    }

    pub fn master(&self) -> &Master<T> {
        &self.master
    }

    pub fn master_mut(&mut self) -> &mut Master<T> {
        &mut self.master
    }

    pub fn into_inner(self) -> Master<T> {
        self.master
    }

    /// Parses and runs one input line. Command failures are printed and
    /// never end the session; only a failing `out` is returned as error.
    pub fn execute_line(&mut self, line: &str, out: &mut dyn Write) -> io::Result<Flow> {
        match line.parse::<Command>() {
            Ok(cmd) => self.execute(cmd, out),
            Err(e) => {
                writeln!(out, "ERROR: {}", e)?;
                Ok(Flow::Continue)
            }
        }
    }

    pub fn execute(&mut self, cmd: Command, out: &mut dyn Write) -> io::Result<Flow> {
        let result = match cmd {
            Command::Quit => return Ok(Flow::Quit),
            Command::Help => out.write_all(HELP.as_bytes()).map_err(Error::from),
            Command::Scan => self.scan(out),
            Command::ReadConfig { slave } => self.read_config(slave, out),
            Command::Read { slave, addr, len } => self.read(slave, addr, len, out),
            Command::Write { slave, addr, data } => self.write(slave, addr, &data, out),
            Command::TextWrite { slave, addr, text } => self.text_write(slave, addr, &text, out),
            Command::Verbose(setting) => self.verbose(setting, out),
            Command::Status => self.status(out),
            Command::PdoStart => self.pdo_start(out),
            Command::PdoStop => self.pdo_stop(out),
            Command::PdoRead => self.pdo_read(out),
            Command::PdoWrite { offset, data } => self.pdo_write(offset, &data, out),
            Command::PdoLoop {
                cycles,
                interval_ms,
            } => self.pdo_loop(cycles, interval_ms, out),
        };
        match result {
            Ok(()) => {}
            Err(Error::Io(e)) => return Err(e),
            Err(e) => self.report(&e, out)?,
        }
        out.flush()?;
        Ok(Flow::Continue)
    }

    fn report(&self, e: &Error, out: &mut dyn Write) -> io::Result<()> {
        log::debug!("Command failed: {:?}", e);
        writeln!(out, "ERROR: {}", e)?;
        if let Error::Access(AccessError::NoResponse { .. }) | Error::Transport(_) = e {
            if let Some(text) = self.master.last_error_text() {
                writeln!(out, "  Transport: {}", text)?;
            }
        }
        Ok(())
    }

    fn scan(&mut self, out: &mut dyn Write) -> Result<()> {
        let count = self.master.scan()?;
        let verbose = self.master.verbose();

        writeln!(out, "\n=== EtherCAT Bus Scan Results ===")?;
        writeln!(out, "Found {} slave(s)\n", count)?;
        writeln!(
            out,
            "{:<5} {:<20} {:<10} {:<10} {:<15}",
            "Index", "Name", "Vendor", "Product", "State"
        )?;
        writeln!(out, "{}", "-".repeat(61))?;
        for (idx, slave) in self.master.slaves().iter() {
            writeln!(
                out,
                "{:<5} {:<20} 0x{:08X} 0x{:08X} {:<15}",
                idx,
                slave.name,
                slave.id.vendor_id,
                slave.id.product_code,
                describe(slave.state)
            )?;
            if verbose {
                writeln!(
                    out,
                    "      Station Address: 0x{:04X}, Alias Address: 0x{:04X}",
                    slave.station_addr, slave.alias_addr
                )?;
            }
        }
        writeln!(out)?;
        Ok(())
    }

    /// Narrows a typed slave index. Values outside `SlaveIdx` are reported
    /// the same way as any other index with no slave behind it.
    fn slave_index(&self, raw: i64) -> Result<SlaveIdx> {
        self.master.ensure_open()?;
        SlaveIdx::try_from(raw).map_err(|_| {
            Error::from(AccessError::InvalidIndex {
                index: raw,
                count: self.master.slaves().count(),
            })
        })
    }

    fn read_config(&mut self, raw: i64, out: &mut dyn Write) -> Result<()> {
        let idx = self.slave_index(raw)?;
        let verbose = self.master.verbose();
        let slave = self.master.slaves().get(idx)?;

        writeln!(out, "\n=== Slave {} Configuration ===", idx)?;
        writeln!(out, "Name:             {}", slave.name)?;
        writeln!(out, "Vendor ID:        0x{:08X}", slave.id.vendor_id)?;
        writeln!(out, "Product ID:       0x{:08X}", slave.id.product_code)?;
        writeln!(out, "Revision:         0x{:08X}\n", slave.revision)?;

        writeln!(out, "Station Address:  0x{:04X}", slave.station_addr)?;
        writeln!(out, "Alias Address:    0x{:04X}", slave.alias_addr)?;
        writeln!(
            out,
            "State:            {} (0x{:02X})\n",
            slave.state,
            slave.state.code()
        )?;

        writeln!(out, "Input Length:     {} bytes", slave.input_bytes())?;
        writeln!(out, "Output Length:    {} bytes", slave.output_bytes())?;
        writeln!(out, "Input Bits:       {}", slave.input_bits)?;
        writeln!(out, "Output Bits:      {}\n", slave.output_bits)?;

        writeln!(out, "Sync Managers:")?;
        for (i, sm) in slave.syncs.iter().take(MAX_SM).enumerate() {
            if sm.start_addr > 0 {
                writeln!(
                    out,
                    "  SM{}: Start=0x{:04X}, Length={}, Control=0x{:02X}, Enable=0x{:02X}",
                    i,
                    sm.start_addr,
                    sm.length,
                    sm.control(),
                    sm.enable()
                )?;
            }
        }
        writeln!(out)?;

        if verbose {
            writeln!(out, "FMMU Configuration:")?;
            for (i, fmmu) in slave.fmmus.iter().take(MAX_FMMU).enumerate() {
                if fmmu.log_length > 0 {
                    writeln!(
                        out,
                        "  FMMU{}: LogStart=0x{:08X}, Length={}, PhysStart=0x{:04X}",
                        i, fmmu.log_start, fmmu.log_length, fmmu.phys_start
                    )?;
                }
            }
            writeln!(out)?;
        }

        if slave.mailbox.length > 0 {
            writeln!(out, "Mailbox Configuration:")?;
            writeln!(out, "  Length:         {} bytes", slave.mailbox.length)?;
            writeln!(out, "  Protocols:      0x{:04X}\n", slave.mailbox.protocols)?;
        }

        if !slave.coe_details.is_empty() {
            writeln!(out, "CoE Details:      0x{:02X}", slave.coe_details.0)?;
            for cap in slave.coe_details.capabilities() {
                writeln!(out, "  - {}", cap)?;
            }
            writeln!(out)?;
        }
        Ok(())
    }

    fn read(&mut self, raw: i64, addr: u16, len: usize, out: &mut dyn Write) -> Result<()> {
        let slave = self.slave_index(raw)?;
        let data = self.master.read_register(slave, addr, len)?;
        writeln!(out, "\n=== Read Data from Slave {} ===", slave)?;
        writeln!(out, "Address: 0x{:04X}, Length: {} bytes", addr, len)?;
        writeln!(out, "Data:")?;
        writeln!(out, "{}", hex_dump(&data))?;
        Ok(())
    }

    fn write(&mut self, raw: i64, addr: u16, data: &[u8], out: &mut dyn Write) -> Result<()> {
        let slave = self.slave_index(raw)?;
        self.master.write_register(slave, addr, data)?;
        writeln!(
            out,
            "Successfully wrote {} bytes to slave {} at address 0x{:04X}",
            data.len(),
            slave,
            addr
        )?;
        if self.master.verbose() {
            writeln!(out, "Data written:")?;
            write!(out, "{}", hex_dump(data))?;
        }
        Ok(())
    }

    fn text_write(
        &mut self,
        slave: i64,
        addr: u16,
        text: &str,
        out: &mut dyn Write,
    ) -> Result<()> {
        log::debug!("Text payload: \"{}\" ({} bytes)", text, text.len());
        self.write(slave, addr, text.as_bytes(), out)
    }

    fn verbose(&mut self, setting: Option<bool>, out: &mut dyn Write) -> Result<()> {
        match setting {
            None => writeln!(
                out,
                "Verbose mode is currently: {}",
                on_off(self.master.verbose())
            )?,
            Some(on) => {
                self.master.set_verbose(on);
                log::set_max_level(if on {
                    log::LevelFilter::Debug
                } else {
                    log::LevelFilter::Info
                });
                writeln!(
                    out,
                    "Verbose mode {}",
                    if on { "enabled" } else { "disabled" }
                )?;
            }
        }
        Ok(())
    }

    fn status(&mut self, out: &mut dyn Write) -> Result<()> {
        let master = &self.master;
        let open = master.is_open();
        let active = master.is_active();

        writeln!(out, "\n=== EtherCAT Status ===")?;
        writeln!(out, "Initialized:       {}", yes_no(open))?;
        writeln!(
            out,
            "Interface:         {}",
            if open { master.interface() } else { "None" }
        )?;
        writeln!(out, "Verbose Mode:      {}", on_off(master.verbose()))?;
        writeln!(
            out,
            "PDO Active:        {}",
            if active { "Yes (OPERATIONAL)" } else { "No" }
        )?;

        if !open {
            writeln!(out, "Slaves Count:      0\n")?;
            return Ok(());
        }

        writeln!(out, "Slaves Count:      {}", master.slaves().count())?;
        writeln!(out, "Expected WKC:      {}", master.expected_wkc())?;
        if active {
            if let Some(layout) = master.layout() {
                writeln!(out, "Input bytes:       {}", layout.input_bytes)?;
                writeln!(out, "Output bytes:      {}", layout.output_bytes)?;
            }
            let stats = master.statistics();
            writeln!(out, "Cycles:            {}", stats.cycles)?;
            writeln!(out, "WKC deficits:      {}", stats.deficits)?;
        }
        writeln!(out)?;

        if !master.slaves().is_empty() {
            writeln!(out, "Slave States:")?;
            for (idx, slave) in master.slaves().iter() {
                write!(
                    out,
                    "  Slave {} ({}): {}",
                    idx,
                    slave.name,
                    describe(slave.state)
                )?;
                if active {
                    write!(
                        out,
                        " [I:{} O:{}]",
                        slave.input_bytes(),
                        slave.output_bytes()
                    )?;
                }
                writeln!(out)?;
            }
            writeln!(out)?;
        }
        Ok(())
    }

    fn pdo_start(&mut self, out: &mut dyn Write) -> Result<()> {
        let steps = match self.master.start_exchange()? {
            Startup::AlreadyActive => {
                writeln!(out, "PDO exchange already active")?;
                return Ok(());
            }
            Startup::Started(steps) => steps,
        };
        for step in &steps {
            report_transition(step, out)?;
        }

        if steps.iter().all(Transition::is_complete) {
            writeln!(out, "✓ All slaves in OPERATIONAL state")?;
        } else {
            writeln!(out, "✓ PDO exchange active, not all slaves in OPERATIONAL state")?;
        }
        if let Some(layout) = self.master.layout() {
            writeln!(out, "  Output bytes: {} (offset: 0)", layout.output_bytes)?;
            writeln!(
                out,
                "  Input bytes:  {} (offset: {})",
                layout.input_bytes, layout.output_bytes
            )?;
        }
        self.status(out)
    }

    fn pdo_stop(&mut self, out: &mut dyn Write) -> Result<()> {
        match self.master.stop_exchange()? {
            None => writeln!(out, "PDO exchange not active")?,
            Some(t) => {
                report_transition(&t, out)?;
                writeln!(out, "✓ PDO exchange stopped")?;
            }
        }
        Ok(())
    }

    fn pdo_read(&mut self, out: &mut dyn Write) -> Result<()> {
        let snapshot = self.master.read_inputs()?;
        report_exchange(&snapshot.exchange, out)?;
        if snapshot.inputs.is_empty() {
            writeln!(out, "No input data available (0 bytes)")?;
            return Ok(());
        }

        writeln!(out, "\n=== PDO Input Data ===")?;
        writeln!(out, "Total input bytes: {}", snapshot.inputs.len())?;
        for slave in &snapshot.slaves {
            writeln!(out, "\nSlave {} ({}):", slave.slave, slave.name)?;
            writeln!(
                out,
                "  Input bytes: {} (offset: {})",
                slave.data.len(),
                slave.offset
            )?;
            write!(out, "  Data: {}", hex_dump(&slave.data))?;
        }
        writeln!(out, "\n=== Complete IOmap (Inputs) ===")?;
        writeln!(out, "{}", hex_dump(&snapshot.inputs))?;
        Ok(())
    }

    fn pdo_write(&mut self, offset: usize, data: &[u8], out: &mut dyn Write) -> Result<()> {
        let exchange = self.master.write_outputs(offset, data)?;
        report_exchange(&exchange, out)?;
        writeln!(
            out,
            "✓ Wrote {} bytes to PDO outputs at offset {}",
            data.len(),
            offset
        )?;
        if self.master.verbose() {
            writeln!(out, "Data written:")?;
            write!(out, "{}", hex_dump(data))?;
            if let Some(image) = self.master.image() {
                writeln!(out, "\n=== Complete IOmap (Outputs) ===")?;
                writeln!(out, "{}", hex_dump(image.outputs()))?;
            }
        }
        Ok(())
    }

    fn pdo_loop(&mut self, cycles: u32, interval_ms: u64, out: &mut dyn Write) -> Result<()> {
        if !self.master.is_active() {
            return Err(Error::NotActive);
        }
        writeln!(out, "\n=== Running PDO Loop ===")?;
        writeln!(out, "Cycles: {}, Interval: {} ms\n", cycles, interval_ms)?;

        let verbose = self.master.verbose();
        let mut failed = None;
        let summary = self.master.run_loop(
            cycles,
            Duration::from_millis(interval_ms),
            |cycle, errors, _| {
                if failed.is_some() || !(verbose || cycle % 100 == 1) {
                    return;
                }
                let res = write!(out, "Cycle {}/{} (errors: {})\r", cycle, cycles, errors)
                    .and_then(|_| out.flush());
                if let Err(e) = res {
                    failed = Some(e);
                }
            },
        )?;
        if let Some(e) = failed {
            return Err(e.into());
        }

        write!(
            out,
            "\n\n✓ PDO loop completed: {} cycles, {} errors",
            summary.cycles, summary.errors
        )?;
        if summary.cancelled {
            write!(out, " (cancelled)")?;
        }
        writeln!(out)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        master::MasterConfig,
        sim::{SimBus, SimSlave},
    };

    fn shell(slaves: Vec<SimSlave>) -> Shell<SimBus> {
        let master = Master::open(SimBus::new(slaves), "sim", MasterConfig::default()).unwrap();
        Shell::new(master)
    }

    fn run(shell: &mut Shell<SimBus>, line: &str) -> String {
        let mut out = Vec::new();
        assert_eq!(shell.execute_line(line, &mut out).unwrap(), Flow::Continue);
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn quit_ends_the_session() {
        let mut shell = shell(vec![]);
        let mut out = Vec::new();
        assert_eq!(shell.execute_line("exit", &mut out).unwrap(), Flow::Quit);
        assert!(out.is_empty());
    }

    #[test]
    fn help_for_empty_line() {
        let mut shell = shell(vec![]);
        let text = run(&mut shell, "");
        assert!(text.contains("=== EtherCAT CLI Commands ==="));
        assert_eq!(text, run(&mut shell, "?"));
    }

    #[test]
    fn parse_errors_are_reported() {
        let mut shell = shell(vec![]);
        assert_eq!(
            run(&mut shell, "read 1"),
            "ERROR: Usage: read <slave_idx> <addr> <len>\n"
        );
        assert_eq!(
            run(&mut shell, "pdo-loop 0"),
            "ERROR: Invalid cycles count (must be 1-1000000)\n"
        );
    }

    #[test]
    fn scan_table_and_config() {
        let mut shell = shell(vec![
            SimSlave::new("EK1100", 0, 0),
            SimSlave::new("EM3E", 2, 2),
        ]);
        let text = run(&mut shell, "scan");
        assert!(text.contains("Found 2 slave(s)"));
        let rows: Vec<_> = text
            .lines()
            .filter(|l| l.starts_with('1') || l.starts_with('2'))
            .collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].starts_with("1     EK1100"));
        assert!(rows[1].contains("PRE-OP"));

        let text = run(&mut shell, "read-config 2");
        assert!(text.contains("Name:             EM3E"));
        assert!(text.contains("State:            PRE-OP (0x02)"));
        assert!(text.contains("Input Length:     2 bytes"));
        assert!(text.contains("Output Bits:      16"));
        assert!(text.contains("  SM2: Start=0x1100"));
        assert!(!text.contains("FMMU Configuration"));

        run(&mut shell, "verbose on");
        let text = run(&mut shell, "read-config 2");
        assert!(text.contains("FMMU Configuration:"));
        assert!(text.contains("  FMMU0: "));
        run(&mut shell, "verbose off");

        assert_eq!(
            run(&mut shell, "read-config 3"),
            "ERROR: Invalid slave index 3 (valid range: 1-2)\n"
        );
    }

    #[test]
    fn register_access() {
        let mut shell = shell(vec![SimSlave::new("EM3E", 2, 2)]);
        run(&mut shell, "scan");
        assert_eq!(
            run(&mut shell, "write 1 0x1000 0x12 0x34 0xAB"),
            "Successfully wrote 3 bytes to slave 1 at address 0x1000\n"
        );
        let text = run(&mut shell, "read 1 0x1000 4");
        assert!(text.contains("Address: 0x1000, Length: 4 bytes"));
        assert!(text.contains("12 34 AB 00 \n"));

        run(&mut shell, "text-write 1 0x2000 Hi  there");
        let memory = shell.master().transport().memory(1).unwrap();
        assert_eq!(&memory[0x2000..0x2008], b"Hi there");

        assert_eq!(
            run(&mut shell, "read 1 0x1000 0"),
            "ERROR: Invalid length 0 (must be 1-1024)\n"
        );
    }

    #[test]
    fn indices_beyond_the_index_type_are_invalid() {
        let mut shell = shell(vec![SimSlave::new("EM3E", 2, 2)]);
        run(&mut shell, "scan");
        assert_eq!(
            run(&mut shell, "read 70000 0x1000 4"),
            "ERROR: Invalid slave index 70000 (valid range: 1-1)\n"
        );
        assert_eq!(
            run(&mut shell, "write -1 0x1000 0x01"),
            "ERROR: Invalid slave index -1 (valid range: 1-1)\n"
        );
        assert_eq!(
            run(&mut shell, "read-config 65536"),
            "ERROR: Invalid slave index 65536 (valid range: 1-1)\n"
        );
        assert_eq!(
            run(&mut shell, "text-write 0 0x1000 hi"),
            "ERROR: Invalid slave index 0 (valid range: 1-1)\n"
        );
        let counters = shell.master().transport().counters();
        assert_eq!((counters.reads, counters.writes), (0, 0));

        shell.master_mut().close();
        assert_eq!(
            run(&mut shell, "read 70000 0x1000 4"),
            "ERROR: EtherCAT master not initialized\n"
        );
    }

    #[test]
    fn verbose_only_adds_detail() {
        let slaves = || vec![SimSlave::new("EL2008", 0, 1), SimSlave::new("EM3E", 2, 2)];
        let mut quiet = shell(slaves());
        let mut loud = shell(slaves());
        loud.master_mut().set_verbose(true);

        let quiet_scan = run(&mut quiet, "scan");
        let loud_scan = run(&mut loud, "scan");
        assert!(!quiet_scan.contains("Station Address"));
        assert!(loud_scan.contains("      Station Address: 0x1001, Alias Address: 0x"));
        let stripped: Vec<_> = loud_scan
            .lines()
            .filter(|l| !l.starts_with("      Station Address"))
            .collect();
        assert_eq!(stripped, quiet_scan.lines().collect::<Vec<_>>());

        run(&mut quiet, "pdo-start");
        run(&mut loud, "pdo-start");
        let quiet_write = run(&mut quiet, "pdo-write 1 0xAA 0x55");
        let loud_write = run(&mut loud, "pdo-write 1 0xAA 0x55");
        assert_eq!(quiet_write, "✓ Wrote 2 bytes to PDO outputs at offset 1\n");
        assert!(loud_write.starts_with(&quiet_write));
        assert_eq!(
            &loud_write[quiet_write.len()..],
            "Data written:\nAA 55 \n\n=== Complete IOmap (Outputs) ===\n00 AA 55 \n\n"
        );

        let outputs = |shell: &Shell<SimBus>| shell.master().image().unwrap().outputs().to_vec();
        assert_eq!(outputs(&quiet), vec![0, 0xaa, 0x55]);
        assert_eq!(outputs(&quiet), outputs(&loud));
        assert_eq!(
            quiet.master().transport().slave_outputs(2),
            loud.master().transport().slave_outputs(2)
        );
    }

    #[test]
    fn silent_slave_reports_transport_detail() {
        let mut shell = shell(vec![SimSlave::new("EM3E", 2, 2).silent()]);
        run(&mut shell, "scan");
        let text = run(&mut shell, "read 1 0x1000 16");
        assert!(text.starts_with("ERROR: No response from slave 1"));
        assert!(text.contains("  Transport: station 0x1001 did not respond"));
    }

    #[test]
    fn verbose_toggle() {
        let mut shell = shell(vec![]);
        assert_eq!(
            run(&mut shell, "verbose"),
            "Verbose mode is currently: OFF\n"
        );
        assert_eq!(run(&mut shell, "verbose 1"), "Verbose mode enabled\n");
        assert!(shell.master().verbose());
        assert_eq!(run(&mut shell, "verbose off"), "Verbose mode disabled\n");
        assert!(!shell.master().verbose());
    }

    #[test]
    fn pdo_session() {
        let mut shell = shell(vec![
            SimSlave::new("EL2008", 0, 1),
            SimSlave::new("EM3E", 2, 2),
        ]);
        assert_eq!(
            run(&mut shell, "pdo-start"),
            "ERROR: No slaves found. Run 'scan' first.\n"
        );
        assert_eq!(run(&mut shell, "pdo-stop"), "PDO exchange not active\n");
        run(&mut shell, "scan");

        let text = run(&mut shell, "pdo-start");
        assert!(text.contains("✓ All slaves in OPERATIONAL state"));
        assert!(text.contains("  Input bytes:  2 (offset: 3)"));
        assert!(text.contains("PDO Active:        Yes (OPERATIONAL)"));
        assert!(text.contains("Expected WKC:      5"));
        assert!(text.contains("  Slave 2 (EM3E): OPERATIONAL [I:2 O:2]"));
        assert_eq!(run(&mut shell, "pdo-start"), "PDO exchange already active\n");

        assert_eq!(
            run(&mut shell, "pdo-write 1 0xAA 0x55"),
            "✓ Wrote 2 bytes to PDO outputs at offset 1\n"
        );
        let text = run(&mut shell, "pdo-read");
        assert!(text.contains("Total input bytes: 2"));
        assert!(text.contains("Slave 2 (EM3E):\n  Input bytes: 2 (offset: 0)\n  Data: AA 55 \n"));

        assert_eq!(
            run(&mut shell, "pdo-write 2 1 2"),
            "ERROR: Write would exceed output buffer (offset 2 + len 2 > 3 bytes)\n"
        );

        let text = run(&mut shell, "pdo-loop 3 1");
        assert!(text.contains("Cycle 1/3 (errors: 0)\r"));
        assert!(text.ends_with("✓ PDO loop completed: 3 cycles, 0 errors\n"));

        let text = run(&mut shell, "status");
        assert!(text.contains("Cycles:            5"));

        assert_eq!(run(&mut shell, "pdo-stop"), "✓ PDO exchange stopped\n");
        assert_eq!(
            run(&mut shell, "pdo-read"),
            "ERROR: PDO exchange not active. Run 'pdo-start' first.\n"
        );
    }

    #[test]
    fn partial_start_is_reported() {
        let mut shell = shell(vec![
            SimSlave::new("EM3E", 2, 2),
            SimSlave::new("EL2008", 0, 1).stuck_at(SlaveState::SafeOp),
        ]);
        run(&mut shell, "scan");
        let text = run(&mut shell, "pdo-start");
        assert!(text.contains("WARNING: Not all slaves reached OPERATIONAL state"));
        assert!(text.contains("  Slave 2: SAFE-OP (expected OPERATIONAL)"));
        assert!(shell.master().is_active());
    }

    #[test]
    fn no_inputs_to_read() {
        let mut shell = shell(vec![SimSlave::new("EL2008", 0, 1)]);
        run(&mut shell, "scan");
        run(&mut shell, "pdo-start");
        assert_eq!(
            run(&mut shell, "pdo-read"),
            "No input data available (0 bytes)\n"
        );
    }

    #[test]
    fn closed_session_status() {
        let mut shell = shell(vec![SimSlave::new("EM3E", 2, 2)]);
        shell.master_mut().close();
        let text = run(&mut shell, "status");
        assert!(text.contains("Initialized:       No"));
        assert!(text.contains("Interface:         None"));
        assert!(text.contains("Slaves Count:      0"));
        assert_eq!(
            run(&mut shell, "read 1 0x1000 16"),
            "ERROR: EtherCAT master not initialized\n"
        );
    }
}
