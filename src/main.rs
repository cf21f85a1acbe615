// Part of ethercat-cli. Copyright 2026 by the authors.
// This work is dual-licensed under Apache 2.0 and MIT terms.

use clap::Parser;
use ethercat_cli::{Error, Flow, Master, MasterConfig, Shell, SimBus, Transport, MAX_IMAGE_SIZE};
use log::LevelFilter;
use std::{
    io::{self, BufRead, Write},
    process::ExitCode,
    time::Duration,
};

const PROMPT: &str = "ecat> ";

/// Interactive EtherCAT master shell.
#[derive(Debug, Parser)]
#[command(name = "ecat-cli", version, about)]
struct Args {
    /// Network interface name, `sim` or `sim:<Name>/<in>x<out>,...` for a
    /// simulated segment
    #[arg(short, long)]
    interface: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Timeout for each state transition, in milliseconds
    #[arg(long, default_value_t = 5000)]
    state_timeout_ms: u64,

    /// Timeout for process data receive and register access, in microseconds
    #[arg(long, default_value_t = 2000)]
    io_timeout_us: u64,
}

fn repl<T: Transport>(shell: &mut Shell<T>) -> io::Result<()> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    writeln!(out, "\nEtherCAT CLI - Interactive Mode")?;
    writeln!(out, "Type 'help' for commands, 'quit' to exit\n")?;

    let mut lines = stdin.lock().lines();
    loop {
        write!(out, "{}", PROMPT)?;
        out.flush()?;
        let line = match lines.next() {
            Some(line) => line?,
            None => break,
        };
        if shell.execute_line(&line, &mut out)? == Flow::Quit {
            break;
        }
    }
    writeln!(out, "\nExiting...")?;
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(LevelFilter::Debug)
        .parse_env("RUST_LOG")
        .format_timestamp(None)
        .init();
    log::set_max_level(if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });

    println!("=== EtherCAT CLI Tool ===");
    println!("Version {}\n", env!("CARGO_PKG_VERSION"));

    let interface = match args.interface.as_deref() {
        Some(interface) => interface,
        None => {
            let err = Error::Configuration("network interface is required (-i <name>)".into());
            eprintln!("ERROR: {}", err);
            return ExitCode::from(1);
        }
    };

    let config = MasterConfig::new(
        Duration::from_millis(args.state_timeout_ms),
        Duration::from_micros(args.io_timeout_us),
        MAX_IMAGE_SIZE,
    );
    let master = match SimBus::from_interface(interface)
        .and_then(|bus| Master::open(bus, interface, config))
    {
        Ok(master) => master,
        Err(e) => {
            eprintln!("ERROR: Failed to initialize master on {}: {}", interface, e);
            return ExitCode::from(1);
        }
    };
    println!("Master initialized on interface: {}", interface);

    let mut shell = Shell::new(master);
    if args.verbose {
        shell.master_mut().set_verbose(true);
        println!("Verbose mode enabled");
    }

    let result = repl(&mut shell);
    shell.master_mut().close();
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            ExitCode::FAILURE
        }
    }
}
