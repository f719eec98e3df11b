//! Burst-side write channels to lite-side writes.

pub mod direct;
pub mod expand;
pub mod merge;

use ibig::UBig;
use strum::Display;
use tracing::{debug, trace};

use super::Transaction;
use crate::{
    channel::{AxiAddr, AxiB, AxiW, AxilAddr, AxilB, AxilW, Resp},
    config::{BridgeConfig, ConfigError, Geometry, WidthMode},
};
use direct::DirectWrite;
use expand::ExpandWrite;
use merge::MergeWrite;

/// Everything driven into the write bridge for one cycle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteInputs {
    pub s_axi_aw: AxiAddr,
    pub s_axi_awvalid: bool,
    pub s_axi_w: AxiW,
    pub s_axi_wvalid: bool,
    pub s_axi_bready: bool,
    pub m_axil_awready: bool,
    pub m_axil_wready: bool,
    pub m_axil_b: AxilB,
    pub m_axil_bvalid: bool,
}

/// Registered outputs of the write bridge.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WritePorts {
    pub s_axi_awready: bool,
    pub s_axi_wready: bool,
    pub s_axi_b: AxiB,
    pub s_axi_bvalid: bool,
    pub m_axil_aw: AxilAddr,
    pub m_axil_awvalid: bool,
    pub m_axil_w: AxilW,
    pub m_axil_wvalid: bool,
    pub m_axil_bready: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteRegisters {
    pub txn: Transaction,
    pub ports: WritePorts,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Display)]
pub enum WritePhase {
    #[default]
    Idle,
    Data,
    Resp,
}

pub trait WritePath: Clone + Copy + Default + PartialEq {
    fn phase(&self) -> WritePhase;

    /// Compute the next state. `next` arrives holding the hold/default
    /// values for this cycle and is updated in place.
    fn clock(
        &self,
        geometry: &Geometry,
        regs: &WriteRegisters,
        input: &WriteInputs,
        next: &mut WriteRegisters,
    ) -> Self;
}

#[derive(Clone, Debug, PartialEq)]
pub struct WriteMachine<P: WritePath> {
    pub geometry: Geometry,
    pub regs: WriteRegisters,
    pub path: P,
}

impl<P: WritePath> WriteMachine<P> {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            geometry,
            regs: WriteRegisters::default(),
            path: P::default(),
        }
    }

    pub fn clock(&self, input: &WriteInputs) -> Self {
        let ports = &self.regs.ports;
        let mut next = self.regs.clone();

        next.ports.s_axi_awready = false;
        next.ports.s_axi_wready = false;
        next.ports.s_axi_bvalid = ports.s_axi_bvalid && !input.s_axi_bready;
        next.ports.m_axil_awvalid = ports.m_axil_awvalid && !input.m_axil_awready;
        next.ports.m_axil_wvalid = ports.m_axil_wvalid && !input.m_axil_wready;
        next.ports.m_axil_bready = false;

        if ports.m_axil_awvalid && input.m_axil_awready {
            trace!(addr = ports.m_axil_aw.addr, "lite write address accepted");
        }
        if ports.m_axil_wvalid && input.m_axil_wready {
            trace!(strb = ports.m_axil_w.strb, "lite write data accepted");
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

/// Write bridge with its width mode resolved at construction.
#[derive(Clone, Debug, PartialEq)]
pub enum WriteBridge {
    Direct(WriteMachine<DirectWrite>),
    Expand(WriteMachine<ExpandWrite>),
    Merge(WriteMachine<MergeWrite>),
}

impl WriteBridge {
    pub fn new(geometry: Geometry) -> Self {
        match geometry.mode {
            WidthMode::Direct => WriteBridge::Direct(WriteMachine::new(geometry)),
            WidthMode::Expand => WriteBridge::Expand(WriteMachine::new(geometry)),
            WidthMode::Merge => WriteBridge::Merge(WriteMachine::new(geometry)),
        }
    }

    pub fn from_config(config: &BridgeConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config.validate()?))
    }

    pub fn clock(&self, input: &WriteInputs) -> Self {
        match self {
            WriteBridge::Direct(m) => WriteBridge::Direct(m.clock(input)),
            WriteBridge::Expand(m) => WriteBridge::Expand(m.clock(input)),
            WriteBridge::Merge(m) => WriteBridge::Merge(m.clock(input)),
        }
    }

    /// Clock once and return the new state with its outputs.
    pub fn step(&self, input: &WriteInputs) -> (Self, WritePorts) {
        let next = self.clock(input);
        let outputs = next.outputs().clone();
        (next, outputs)
    }

    pub fn reset(&mut self) {
        match self {
            WriteBridge::Direct(m) => m.reset(),
            WriteBridge::Expand(m) => m.reset(),
            WriteBridge::Merge(m) => m.reset(),
        }
    }

    pub fn outputs(&self) -> &WritePorts {
        &self.registers().ports
    }

    pub fn transaction(&self) -> &Transaction {
        &self.registers().txn
    }

    pub fn registers(&self) -> &WriteRegisters {
        match self {
            WriteBridge::Direct(m) => &m.regs,
            WriteBridge::Expand(m) => &m.regs,
            WriteBridge::Merge(m) => &m.regs,
        }
    }

    pub fn geometry(&self) -> &Geometry {
        match self {
            WriteBridge::Direct(m) => &m.geometry,
            WriteBridge::Expand(m) => &m.geometry,
            WriteBridge::Merge(m) => &m.geometry,
        }
    }

    pub fn phase(&self) -> WritePhase {
        match self {
            WriteBridge::Direct(m) => m.path.phase(),
            WriteBridge::Expand(m) => m.path.phase(),
            WriteBridge::Merge(m) => m.path.phase(),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.phase() == WritePhase::Idle
    }
}

/* ------------------------- shared state actions ------------------------- */

/// Idle: offer the address channel and latch a burst when it arrives. The
/// first lite address goes out right away and the data channel opens.
fn accept_request(
    geometry: &Geometry,
    regs: &WriteRegisters,
    input: &WriteInputs,
    next: &mut WriteRegisters,
) -> bool {
    next.ports.s_axi_awready = !regs.ports.m_axil_awvalid;
    if !(regs.ports.s_axi_awready && input.s_axi_awvalid) {
        return false;
    }

    let aw = &input.s_axi_aw;
    debug!(
        id = aw.id,
        addr = aw.addr,
        len = aw.len,
        size = aw.size,
        "write burst accepted"
    );
    next.ports.s_axi_awready = false;
    next.txn = Transaction::accept(geometry, aw);
    let addr = next.txn.addr;
    issue_lite_addr(next, addr);
    next.ports.s_axi_wready = w_sink_ready(regs);
    true
}

/// A burst-side data beat is only taken while no lite data is waiting.
fn w_sink_ready(regs: &WriteRegisters) -> bool {
    !regs.ports.m_axil_wvalid
}

/// The data beat handed over this cycle, if any.
fn take_beat<'a>(regs: &WriteRegisters, input: &'a WriteInputs) -> Option<&'a AxiW> {
    if !(regs.ports.s_axi_wready && input.s_axi_wvalid) {
        return None;
    }
    if input.s_axi_w.last != regs.txn.is_last() {
        debug!(
            wlast = input.s_axi_w.last,
            remaining = regs.txn.burst,
            "wlast disagrees with burst length, following the length"
        );
    }
    Some(&input.s_axi_w)
}

/// Lite responses are taken once both lite requests are out and the
/// burst-side response register is free.
fn lite_b_ready(regs: &WriteRegisters) -> bool {
    !regs.ports.s_axi_bvalid && !regs.ports.m_axil_awvalid && !regs.ports.m_axil_wvalid
}

fn lite_response(regs: &WriteRegisters, input: &WriteInputs) -> bool {
    regs.ports.m_axil_bready && input.m_axil_bvalid
}

fn issue_lite_addr(next: &mut WriteRegisters, addr: u64) {
    next.ports.m_axil_aw = AxilAddr {
        addr,
        prot: next.txn.prot,
    };
    next.ports.m_axil_awvalid = true;
}

fn issue_lite_write(next: &mut WriteRegisters, data: UBig, strb: u128) {
    next.ports.m_axil_w = AxilW { data, strb };
    next.ports.m_axil_wvalid = true;
}

/// Move on to the next outer beat: new lite address, data channel open.
fn next_beat(next: &mut WriteRegisters, regs: &WriteRegisters, addr: u64) {
    issue_lite_addr(next, addr);
    next.ports.s_axi_wready = w_sink_ready(regs);
}

/// Every lite write of the burst has been answered: raise the aggregated
/// response and reopen the address channel.
fn finish_burst(regs: &WriteRegisters, next: &mut WriteRegisters, resp: Resp) {
    debug!(id = regs.txn.id, %resp, "write burst complete");
    next.ports.s_axi_b = AxiB {
        id: regs.txn.id,
        resp,
    };
    next.ports.s_axi_bvalid = true;
    next.ports.s_axi_awready = !regs.ports.m_axil_awvalid;
}
