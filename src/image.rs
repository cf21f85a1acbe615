// Part of ethercat-cli. Copyright 2026 by the authors.
// This work is dual-licensed under Apache 2.0 and MIT terms.

//! The process image: one contiguous buffer with the output region of all
//! slaves followed by their input region.

use crate::types::{AccessError, Error, Result, SlaveIdx, SlaveInfo};
use std::ops::Range;

/// A byte range inside one region of the process image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Region {
    pub offset: usize,
    pub size: usize,
}

impl Region {
    pub const fn new(offset: usize, size: usize) -> Self {
        Self { offset, size }
    }

    pub const fn end(&self) -> usize {
        self.offset + self.size
    }

    pub const fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.size
    }
}

/// Where a single slave's cyclic data lives. Output offsets are relative to
/// the output region, input offsets to the input region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlaveRegions {
    pub outputs: Region,
    pub inputs: Region,
}

/// Memory layout of the mapped process data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Layout {
    /// Entry `i` belongs to slave `i + 1`.
    pub slaves: Vec<SlaveRegions>,
    pub output_bytes: usize,
    pub input_bytes: usize,
    /// Number of slaves contributing to the output side of the working counter.
    pub outputs_wkc: u16,
    /// Number of slaves contributing to the input side of the working counter.
    pub inputs_wkc: u16,
}

impl Layout {
    /// Packs the slaves' outputs and inputs back to back, in bus order.
    pub fn compute(slaves: &[SlaveInfo]) -> Self {
        let mut layout = Layout::default();
        for slave in slaves {
            let outputs = Region::new(layout.output_bytes, slave.output_bytes());
            let inputs = Region::new(layout.input_bytes, slave.input_bytes());
            layout.output_bytes = outputs.end();
            layout.input_bytes = inputs.end();
            if outputs.size > 0 {
                layout.outputs_wkc += 1;
            }
            if inputs.size > 0 {
                layout.inputs_wkc += 1;
            }
            layout.slaves.push(SlaveRegions { outputs, inputs });
        }
        layout
    }

    pub const fn size(&self) -> usize {
        self.output_bytes + self.input_bytes
    }

    /// Writes count twice (receipt and acknowledgement), reads once.
    pub const fn expected_wkc(&self) -> i32 {
        2 * self.outputs_wkc as i32 + self.inputs_wkc as i32
    }

    pub fn regions(&self, slave: SlaveIdx) -> Option<&SlaveRegions> {
        (slave as usize)
            .checked_sub(1)
            .and_then(|i| self.slaves.get(i))
    }

    /// Verifies that the layout reported by the transport agrees with the
    /// slave descriptors and stays inside its own regions.
    pub(crate) fn check(&self, slaves: &[SlaveInfo]) -> Result<()> {
        if self.slaves.len() != slaves.len() {
            return Err(Error::Layout(format!(
                "{} slaves mapped, {} discovered",
                self.slaves.len(),
                slaves.len()
            )));
        }
        for (i, (regions, slave)) in self.slaves.iter().zip(slaves).enumerate() {
            if regions.outputs.size != slave.output_bytes()
                || regions.inputs.size != slave.input_bytes()
            {
                return Err(Error::Layout(format!(
                    "slave {} mapped with I:{} O:{}, declares I:{} O:{}",
                    i + 1,
                    regions.inputs.size,
                    regions.outputs.size,
                    slave.input_bytes(),
                    slave.output_bytes()
                )));
            }
            if regions.outputs.end() > self.output_bytes || regions.inputs.end() > self.input_bytes
            {
                return Err(Error::Layout(format!(
                    "slave {} mapped outside the process image",
                    i + 1
                )));
            }
        }
        let outputs: usize = slaves.iter().map(SlaveInfo::output_bytes).sum();
        let inputs: usize = slaves.iter().map(SlaveInfo::input_bytes).sum();
        if outputs != self.output_bytes || inputs != self.input_bytes {
            return Err(Error::Layout(format!(
                "image has I:{} O:{}, slaves declare I:{} O:{}",
                self.input_bytes, self.output_bytes, inputs, outputs
            )));
        }
        Ok(())
    }
}

/// The mapped cyclic data of all slaves.
#[derive(Debug, Clone)]
pub struct ProcessImage {
    data: Vec<u8>,
    layout: Layout,
}

impl ProcessImage {
    pub fn new(layout: Layout) -> Result<Self> {
        let mut data = Vec::new();
        data.try_reserve_exact(layout.size())?;
        data.resize(layout.size(), 0);
        Ok(Self { data, layout })
    }

    pub const fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn outputs(&self) -> &[u8] {
        &self.data[..self.layout.output_bytes]
    }

    pub fn inputs(&self) -> &[u8] {
        &self.data[self.layout.output_bytes..]
    }

    pub fn inputs_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.layout.output_bytes..]
    }

    /// Both regions at once, outputs first.
    pub fn split_mut(&mut self) -> (&mut [u8], &mut [u8]) {
        self.data.split_at_mut(self.layout.output_bytes)
    }

    pub fn slave_outputs(&self, slave: SlaveIdx) -> Option<&[u8]> {
        let regions = self.layout.regions(slave)?;
        self.outputs().get(regions.outputs.range())
    }

    pub fn slave_inputs(&self, slave: SlaveIdx) -> Option<&[u8]> {
        let regions = self.layout.regions(slave)?;
        self.inputs().get(regions.inputs.range())
    }

    /// Copies `data` into the output region at `offset`. Out of range writes
    /// leave the image untouched.
    pub fn stage_outputs(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        let size = self.layout.output_bytes;
        let end = offset
            .checked_add(data.len())
            .filter(|end| *end <= size)
            .ok_or(AccessError::OutOfRange {
                offset,
                len: data.len(),
                size,
            })?;
        self.data[offset..end].copy_from_slice(data);
        Ok(())
    }
}
