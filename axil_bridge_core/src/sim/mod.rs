//! Cycle-by-cycle environment for the bridges: a burst master on one side,
//! a byte-addressed lite memory on the other, and a monitor in between.

pub mod backpressure;
pub mod master;
pub mod memory;
pub mod monitor;

#[cfg(test)]
mod fuzz_test;

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::debug;

use crate::{
    bridge::{
        read::{ReadBridge, ReadInputs},
        write::{WriteBridge, WriteInputs},
    },
    channel::{AxiB, AxiR, Resp},
    config::{BridgeConfig, ConfigError, Geometry},
};
use backpressure::StallPattern;
use master::{Burst, BurstMaster, ReadCompletion, WriteCompletion};
use memory::{ErrorRegion, LiteMemory};
use monitor::ProtocolMonitor;

/// Cycle budget for a single blocking read or write.
pub const MAX_CYCLES: u64 = 1_000_000;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("the memory model needs 8 bit words, got {0} bit words")]
    UnsupportedLaneWidth(usize),
    #[error("write payload is {actual} bytes but the burst covers {expected}")]
    PayloadLength { expected: usize, actual: usize },
    #[error("burst size {size} is wider than the burst-side bus (size {max})")]
    SizeTooLarge { size: u8, max: u8 },
    #[error("gave up after {0} cycles")]
    Timeout(u64),
    #[error("bench settled without a {0} completion")]
    MissingCompletion(&'static str),
    #[error("protocol violation at cycle {cycle}: {message}")]
    Protocol { cycle: u64, message: String },
}

/// What came back for one read burst.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadResult {
    pub beats: Vec<AxiR>,
    /// Addressed bytes in address order
    pub data: Vec<u8>,
}

impl ReadResult {
    pub fn resps(&self) -> Vec<Resp> {
        self.beats.iter().map(|beat| beat.resp).collect()
    }
}

#[derive(Clone, Debug)]
pub struct Testbench {
    pub read: ReadBridge,
    pub write: WriteBridge,
    pub master: BurstMaster,
    pub memory: LiteMemory,
    monitor: ProtocolMonitor,
    cycle: u64,
}

impl Testbench {
    pub fn new(config: &BridgeConfig) -> Result<Self, SimError> {
        let geometry = config.validate()?;
        if geometry.lane_bits != 8 {
            return Err(SimError::UnsupportedLaneWidth(geometry.lane_bits));
        }

        Ok(Testbench {
            read: ReadBridge::new(geometry),
            write: WriteBridge::new(geometry),
            master: BurstMaster::new(),
            memory: LiteMemory::new(geometry.axil_lanes, &BTreeMap::new()),
            monitor: ProtocolMonitor::default(),
            cycle: 0,
        })
    }

    pub fn with_stalls(mut self, master: StallPattern, memory: StallPattern) -> Self {
        self.master.set_stalls(master);
        self.memory.set_stalls(memory);
        self
    }

    pub fn with_memory(mut self, initial: &BTreeMap<u64, u8>) -> Self {
        for (&address, &value) in initial {
            self.memory.set(address, value);
        }
        self
    }

    pub fn with_error_region(mut self, region: ErrorRegion) -> Self {
        self.memory.add_error_region(region);
        self
    }

    pub fn geometry(&self) -> &Geometry {
        self.read.geometry()
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    fn inputs(&self) -> (ReadInputs, WriteInputs) {
        let m = self.master.outputs();
        let l = self.memory.outputs();
        let read = ReadInputs {
            s_axi_ar: m.ar.clone(),
            s_axi_arvalid: m.arvalid,
            s_axi_rready: m.rready,
            m_axil_arready: l.arready,
            m_axil_r: l.r.clone(),
            m_axil_rvalid: l.rvalid,
        };
        let write = WriteInputs {
            s_axi_aw: m.aw.clone(),
            s_axi_awvalid: m.awvalid,
            s_axi_w: m.w.clone(),
            s_axi_wvalid: m.wvalid,
            s_axi_bready: m.bready,
            m_axil_awready: l.awready,
            m_axil_wready: l.wready,
            m_axil_b: l.b,
            m_axil_bvalid: l.bvalid,
        };
        (read, write)
    }

    /// One rising edge for everything on the bench. Every block sees the
    /// registered outputs of the others from before the edge.
    pub fn clock(&mut self) -> Result<(), SimError> {
        let (read_in, write_in) = self.inputs();
        self.monitor.observe(
            self.cycle,
            &read_in,
            self.read.outputs(),
            &write_in,
            self.write.outputs(),
        )?;

        let read = self.read.clock(&read_in);
        let write = self.write.clock(&write_in);
        self.master
            .clock(self.read.outputs(), self.write.outputs(), self.cycle);
        self.memory
            .clock(self.read.outputs(), self.write.outputs(), self.cycle);
        self.read = read;
        self.write = write;
        self.cycle += 1;
        Ok(())
    }

    /// Everything queued has completed and both bridges are back in idle.
    pub fn is_settled(&self) -> bool {
        self.master.is_done()
            && self.monitor.is_settled()
            && self.read.is_idle()
            && self.write.is_idle()
    }

    /// Clock until settled. Returns the number of cycles taken.
    pub fn run(&mut self, max_cycles: u64) -> Result<u64, SimError> {
        let start = self.cycle;
        while !self.is_settled() {
            if self.cycle - start >= max_cycles {
                return Err(SimError::Timeout(max_cycles));
            }
            self.clock()?;
        }
        Ok(self.cycle - start)
    }

    fn check_burst(&self, burst: &Burst) -> Result<(), SimError> {
        let max = self.geometry().axi_size;
        if burst.size > max {
            return Err(SimError::SizeTooLarge {
                size: burst.size,
                max,
            });
        }
        Ok(())
    }

    pub fn queue_read(&mut self, burst: Burst) -> Result<(), SimError> {
        self.check_burst(&burst)?;
        self.master.queue_read(burst);
        Ok(())
    }

    pub fn queue_write(&mut self, burst: Burst, bytes: &[u8]) -> Result<(), SimError> {
        self.check_burst(&burst)?;
        let beats = burst.pack(self.geometry().axi_lanes, bytes)?;
        self.master.queue_write(burst, beats);
        Ok(())
    }

    fn take_read(&mut self) -> Result<ReadCompletion, SimError> {
        self.master
            .pop_read()
            .ok_or(SimError::MissingCompletion("read"))
    }

    fn take_write(&mut self) -> Result<WriteCompletion, SimError> {
        self.master
            .pop_write()
            .ok_or(SimError::MissingCompletion("write"))
    }

    /// Issue one read burst and wait for every beat.
    pub fn read(&mut self, burst: Burst) -> Result<ReadResult, SimError> {
        self.queue_read(burst)?;
        let cycles = self.run(MAX_CYCLES)?;
        let completion = self.take_read()?;
        debug!(addr = burst.addr, cycles, "read finished");

        let data = burst.unpack(self.geometry().axi_lanes, &completion.beats);
        Ok(ReadResult {
            beats: completion.beats,
            data,
        })
    }

    /// Issue one write burst and wait for its response.
    pub fn write(&mut self, burst: Burst, bytes: &[u8]) -> Result<AxiB, SimError> {
        self.queue_write(burst, bytes)?;
        let cycles = self.run(MAX_CYCLES)?;
        let completion = self.take_write()?;
        debug!(addr = burst.addr, cycles, "write finished");
        Ok(completion.response)
    }
}
