//! Burst-side read channel to lite-side reads.

pub mod direct;
pub mod expand;
pub mod merge;

use ibig::UBig;
use strum::Display;
use tracing::{debug, trace};

use super::Transaction;
use crate::{
    channel::{AxiAddr, AxiR, AxilAddr, AxilR, Resp},
    config::{BridgeConfig, ConfigError, Geometry, WidthMode},
};
use direct::DirectRead;
use expand::ExpandRead;
use merge::MergeRead;

/// Everything driven into the read bridge for one cycle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReadInputs {
    pub s_axi_ar: AxiAddr,
    pub s_axi_arvalid: bool,
    pub s_axi_rready: bool,
    pub m_axil_arready: bool,
    pub m_axil_r: AxilR,
    pub m_axil_rvalid: bool,
}

/// Registered outputs of the read bridge.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReadPorts {
    pub s_axi_arready: bool,
    pub s_axi_r: AxiR,
    pub s_axi_rvalid: bool,
    pub m_axil_ar: AxilAddr,
    pub m_axil_arvalid: bool,
    pub m_axil_rready: bool,
}

/// Register bank shared by every read machine.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReadRegisters {
    pub txn: Transaction,
    pub ports: ReadPorts,
}

/// Coarse state name, common to every width mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Display)]
pub enum ReadPhase {
    #[default]
    Idle,
    Data,
    DataRead,
    DataSplit,
}

pub trait ReadPath: Clone + Copy + Default + PartialEq {
    fn phase(&self) -> ReadPhase;

    /// Compute the next state. `next` arrives holding the hold/default
    /// values for this cycle and is updated in place.
    fn clock(
        &self,
        geometry: &Geometry,
        regs: &ReadRegisters,
        input: &ReadInputs,
        next: &mut ReadRegisters,
    ) -> Self;
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReadMachine<P: ReadPath> {
    pub geometry: Geometry,
    pub regs: ReadRegisters,
    pub path: P,
}

impl<P: ReadPath> ReadMachine<P> {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            geometry,
            regs: ReadRegisters::default(),
            path: P::default(),
        }
    }

    pub fn clock(&self, input: &ReadInputs) -> Self {
        let ports = &self.regs.ports;
        let mut next = self.regs.clone();

        // values held unless a state says otherwise
        next.ports.s_axi_arready = false;
        next.ports.s_axi_rvalid = ports.s_axi_rvalid && !input.s_axi_rready;
        next.ports.m_axil_arvalid = ports.m_axil_arvalid && !input.m_axil_arready;
        next.ports.m_axil_rready = false;

        if ports.m_axil_arvalid && input.m_axil_arready {
            trace!(addr = ports.m_axil_ar.addr, "lite read address accepted");
        }

        let path = self
            .path
            .clock(&self.geometry, &self.regs, input, &mut next);
        Self {
            geometry: self.geometry,
            regs: next,
            path,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.geometry);
    }
}

/// Read bridge with its width mode resolved at construction.
#[derive(Clone, Debug, PartialEq)]
pub enum ReadBridge {
    Direct(ReadMachine<DirectRead>),
    Expand(ReadMachine<ExpandRead>),
    Merge(ReadMachine<MergeRead>),
}

impl ReadBridge {
    pub fn new(geometry: Geometry) -> Self {
        match geometry.mode {
            WidthMode::Direct => ReadBridge::Direct(ReadMachine::new(geometry)),
            WidthMode::Expand => ReadBridge::Expand(ReadMachine::new(geometry)),
            WidthMode::Merge => ReadBridge::Merge(ReadMachine::new(geometry)),
        }
    }

    pub fn from_config(config: &BridgeConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config.validate()?))
    }

    pub fn clock(&self, input: &ReadInputs) -> Self {
        match self {
            ReadBridge::Direct(m) => ReadBridge::Direct(m.clock(input)),
            ReadBridge::Expand(m) => ReadBridge::Expand(m.clock(input)),
            ReadBridge::Merge(m) => ReadBridge::Merge(m.clock(input)),
        }
    }

    /// Clock once and return the new state with its outputs.
    pub fn step(&self, input: &ReadInputs) -> (Self, ReadPorts) {
        let next = self.clock(input);
        let outputs = next.outputs().clone();
        (next, outputs)
    }

    pub fn reset(&mut self) {
        match self {
            ReadBridge::Direct(m) => m.reset(),
            ReadBridge::Expand(m) => m.reset(),
            ReadBridge::Merge(m) => m.reset(),
        }
    }

    pub fn outputs(&self) -> &ReadPorts {
        &self.registers().ports
    }

    pub fn transaction(&self) -> &Transaction {
        &self.registers().txn
    }

    pub fn registers(&self) -> &ReadRegisters {
        match self {
            ReadBridge::Direct(m) => &m.regs,
            ReadBridge::Expand(m) => &m.regs,
            ReadBridge::Merge(m) => &m.regs,
        }
    }

    pub fn geometry(&self) -> &Geometry {
        match self {
            ReadBridge::Direct(m) => &m.geometry,
            ReadBridge::Expand(m) => &m.geometry,
            ReadBridge::Merge(m) => &m.geometry,
        }
    }

    pub fn phase(&self) -> ReadPhase {
        match self {
            ReadBridge::Direct(m) => m.path.phase(),
            ReadBridge::Expand(m) => m.path.phase(),
            ReadBridge::Merge(m) => m.path.phase(),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.phase() == ReadPhase::Idle
    }
}

/* ------------------------- shared state actions ------------------------- */

/// Idle: offer the address channel and latch a request when it arrives.
/// On acceptance the first lite read is issued at the request address.
fn accept_request(
    geometry: &Geometry,
    regs: &ReadRegisters,
    input: &ReadInputs,
    next: &mut ReadRegisters,
) -> bool {
    next.ports.s_axi_arready = !regs.ports.m_axil_arvalid;
    if !(regs.ports.s_axi_arready && input.s_axi_arvalid) {
        return false;
    }

    let ar = &input.s_axi_ar;
    debug!(
        id = ar.id,
        addr = ar.addr,
        len = ar.len,
        size = ar.size,
        "read burst accepted"
    );
    next.ports.s_axi_arready = false;
    next.txn = Transaction::accept(geometry, ar);
    let addr = next.txn.addr;
    issue_lite_read(next, addr);
    true
}

/// Lite read data may only be taken while the burst-side data register is
/// free and no lite address is still waiting.
fn lite_sink_ready(regs: &ReadRegisters) -> bool {
    !regs.ports.s_axi_rvalid && !regs.ports.m_axil_arvalid
}

fn lite_response(regs: &ReadRegisters, input: &ReadInputs) -> bool {
    regs.ports.m_axil_rready && input.m_axil_rvalid
}

fn issue_lite_read(next: &mut ReadRegisters, addr: u64) {
    next.ports.m_axil_ar = AxilAddr {
        addr,
        prot: next.txn.prot,
    };
    next.ports.m_axil_arvalid = true;
}

/// Load one burst-side beat into the output register.
fn emit_beat(regs: &ReadRegisters, next: &mut ReadRegisters, data: UBig, resp: Resp) {
    next.ports.s_axi_r = AxiR {
        id: regs.txn.id,
        data,
        resp,
        last: regs.txn.is_last(),
    };
    next.ports.s_axi_rvalid = true;
}

/// Last beat is out: go back to offering the address channel.
fn finish_burst(regs: &ReadRegisters, next: &mut ReadRegisters) {
    debug!(id = regs.txn.id, "read burst complete");
    next.ports.s_axi_arready = !regs.ports.m_axil_arvalid;
}
