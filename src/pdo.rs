// Part of ethercat-cli. Copyright 2026 by the authors.
// This work is dual-licensed under Apache 2.0 and MIT terms.

//! Cyclic process data exchange on top of a scanned [`Master`].

use crate::{
    master::Master,
    transport::{CancelToken, Transport},
    types::*,
};
use std::{
    thread,
    time::{Duration, Instant},
};

/// Result of bringing the bus up for cyclic exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Startup {
    AlreadyActive,
    /// One entry per step: PRE-OP, SAFE-OP, OPERATIONAL.
    Started(Vec<Transition>),
}

/// Totals of a finished [`Master::run_loop`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub cycles: u32,
    pub errors: u32,
    pub cancelled: bool,
}

/// Input data of one slave after an exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlaveInputs {
    pub slave: SlaveIdx,
    pub name: String,
    /// Offset inside the input region.
    pub offset: usize,
    pub data: Vec<u8>,
}

/// The input region right after an exchange, in total and per slave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSnapshot {
    pub exchange: Exchange,
    pub inputs: Vec<u8>,
    pub slaves: Vec<SlaveInputs>,
}

impl<T: Transport> Master<T> {
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn statistics(&self) -> ExchangeStatistics {
        self.stats
    }

    /// Token that stops a running [`Master::run_loop`] at the next cycle
    /// boundary.
    pub fn cancel_token(&self) -> CancelToken {
        self.running.clone()
    }

    /// Walks all slaves through PRE-OP, SAFE-OP and OPERATIONAL and enables
    /// cyclic exchange. A step that leaves slaves behind is reported in the
    /// result and the sequence carries on.
    pub fn start_exchange(&mut self) -> Result<Startup> {
        self.ensure_open()?;
        if self.slaves.is_empty() || self.image.is_none() {
            return Err(Error::NotScanned);
        }
        if self.active {
            return Ok(Startup::AlreadyActive);
        }

        log::debug!("Starting PDO exchange...");
        let timeout = self.config.state_timeout;
        let mut steps = Vec::with_capacity(3);
        for target in [SlaveState::PreOp, SlaveState::SafeOp, SlaveState::Op].iter() {
            let step = self.request_state(*target, timeout)?;
            if !step.is_complete() {
                log::warn!("Failed to reach {} state, continuing", target);
            }
            steps.push(step);
        }

        self.active = true;
        self.stats.reset();
        log::info!("PDO exchange activated");
        Ok(Startup::Started(steps))
    }

    /// Sends all slaves back to INIT and disables cyclic exchange. Returns
    /// `None` when exchange was not active. The exchange is disabled even if
    /// the transition fails.
    pub fn stop_exchange(&mut self) -> Result<Option<Transition>> {
        if !self.active {
            return Ok(None);
        }
        log::debug!("Stopping PDO exchange...");
        self.running.cancel();
        self.active = false;
        let timeout = self.config.state_timeout;
        let transition = self.request_state(SlaveState::Init, timeout)?;
        log::info!("PDO exchange stopped");
        Ok(Some(transition))
    }

    /// One round trip: send the output region, receive the input region and
    /// compare the working counter with what the mapping expects.
    pub fn exchange_once(&mut self) -> Result<Exchange> {
        if !self.active {
            return Err(Error::NotActive);
        }
        let image = self.image.as_mut().ok_or(Error::NotScanned)?;
        let expected = image.layout().expected_wkc();

        let (outputs, inputs) = image.split_mut();
        self.transport.send_outputs(outputs)?;
        let wkc = self
            .transport
            .receive_inputs(inputs, self.config.io_timeout)?;

        let exchange = if wkc < expected {
            log::debug!(
                "Working counter mismatch (got {}, expected {})",
                wkc,
                expected
            );
            Exchange::Deficit(WkcDeficit { wkc, expected })
        } else {
            log::trace!("PDO exchange successful (WKC: {})", wkc);
            Exchange::Complete { wkc }
        };
        self.stats.record(&exchange);
        Ok(exchange)
    }

    /// Runs `cycles` exchanges at a fixed `interval`, counting working
    /// counter deficits. `progress` sees the cycle number (1-based), the
    /// error count so far and the cycle's outcome. Cancellation through
    /// [`Master::cancel_token`] takes effect between cycles.
    pub fn run_loop<F>(
        &mut self,
        cycles: u32,
        interval: Duration,
        mut progress: F,
    ) -> Result<LoopSummary>
    where
        F: FnMut(u32, u32, &Exchange),
    {
        if !self.active {
            return Err(Error::NotActive);
        }
        self.running.reset();
        let mut summary = LoopSummary::default();
        let mut epoch = Instant::now();

        for cycle in 1..=cycles {
            if self.running.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            let exchange = self.exchange_once()?;
            if !exchange.is_complete() {
                summary.errors += 1;
            }
            summary.cycles = cycle;
            progress(cycle, summary.errors, &exchange);

            if cycle < cycles {
                epoch += interval;
                let now = Instant::now();
                if epoch > now {
                    thread::sleep(epoch - now);
                }
            }
        }
        log::debug!(
            "PDO loop finished: {} cycles, {} errors",
            summary.cycles,
            summary.errors
        );
        Ok(summary)
    }

    /// Stages `data` at `offset` of the output region and pushes it out with
    /// one exchange. Out of range writes are rejected before the image or
    /// the bus are touched.
    pub fn write_outputs(&mut self, offset: usize, data: &[u8]) -> Result<Exchange> {
        if !self.active {
            return Err(Error::NotActive);
        }
        let image = self.image.as_mut().ok_or(Error::NotScanned)?;
        if image.layout().output_bytes == 0 {
            return Err(Error::NoOutputs);
        }
        log::debug!("Writing {} bytes to output offset {}", data.len(), offset);
        image.stage_outputs(offset, data)?;
        self.exchange_once()
    }

    /// Refreshes the inputs with one exchange and returns them.
    pub fn read_inputs(&mut self) -> Result<InputSnapshot> {
        let exchange = self.exchange_once()?;
        let image = self.image.as_ref().ok_or(Error::NotScanned)?;
        let slaves = self
            .slaves
            .iter()
            .filter(|(_, info)| info.regions.inputs.size > 0)
            .map(|(idx, info)| SlaveInputs {
                slave: idx,
                name: info.name.clone(),
                offset: info.regions.inputs.offset,
                data: image.slave_inputs(idx).unwrap_or_default().to_vec(),
            })
            .collect();
        Ok(InputSnapshot {
            exchange,
            inputs: image.inputs().to_vec(),
            slaves,
        })
    }
}
