use ibig::UBig;

use super::{
    WriteInputs, WritePath, WritePhase, WriteRegisters, accept_request, finish_burst,
    issue_lite_write, lite_b_ready, lite_response, next_beat, take_beat, w_sink_ready,
};
use crate::{
    bridge::crosses,
    channel::{AxiW, Resp},
    config::Geometry,
    utils::{segment, with_segment},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum State {
    #[default]
    Idle,
    Data,
    Resp,
}

/// Lite side wider than the burst side.
///
/// Each burst beat lands in its segment of a lite word. Repackable bursts
/// keep gathering beats until the address leaves the lite word, so one lite
/// write carries the union of their strobes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExpandWrite {
    state: State,
}

impl WritePath for ExpandWrite {
    fn phase(&self) -> WritePhase {
        match self.state {
            State::Idle => WritePhase::Idle,
            State::Data => WritePhase::Data,
            State::Resp => WritePhase::Resp,
        }
    }

    fn clock(
        &self,
        geometry: &Geometry,
        regs: &WriteRegisters,
        input: &WriteInputs,
        next: &mut WriteRegisters,
    ) -> Self {
        let state = match self.state {
            State::Idle => {
                if !accept_request(geometry, regs, input, next) {
                    State::Idle
                } else {
                    if geometry.wants_repack(next.txn.size, input.s_axi_aw.cache) {
                        next.txn.inner_size = geometry.axil_size;
                    }
                    State::Data
                }
            }
            State::Data => {
                next.ports.s_axi_wready = w_sink_ready(regs);
                let Some(w) = take_beat(regs, input) else {
                    return *self;
                };

                let txn = &regs.txn;
                let (data, strb) = gather(geometry, &txn.data, txn.strb, txn.addr, w);
                let addr_next = txn.next_addr(geometry);

                if txn.is_last() || crosses(txn.addr, addr_next, txn.inner_size) {
                    // burst count steps down once the lite write is answered
                    next.ports.s_axi_wready = false;
                    issue_lite_write(next, data, strb);
                    next.txn.data = UBig::from(0u8);
                    next.txn.strb = 0;
                    if !txn.is_last() {
                        next.txn.addr = addr_next;
                    }
                    State::Resp
                } else {
                    next.txn.data = data;
                    next.txn.strb = strb;
                    next.txn.burst = txn.burst - 1;
                    next.txn.addr = addr_next;
                    State::Data
                }
            }
            State::Resp => {
                next.ports.m_axil_bready = lite_b_ready(regs);
                if !lite_response(regs, input) {
                    return *self;
                }

                next.ports.m_axil_bready = false;
                let resp = Resp::aggregate(regs.txn.resp, input.m_axil_b.resp);
                if regs.txn.is_last() {
                    finish_burst(regs, next, resp);
                    State::Idle
                } else {
                    next.txn.resp = Some(resp);
                    next.txn.burst = regs.txn.burst - 1;
                    next_beat(next, regs, regs.txn.addr);
                    State::Data
                }
            }
        };
        ExpandWrite { state }
    }
}

/// Merge the strobed lanes of `w` into the segment addressed by `addr`,
/// keeping lanes gathered from earlier beats.
fn gather(geometry: &Geometry, data: &UBig, strb: u128, addr: u64, w: &AxiW) -> (UBig, u128) {
    let first = geometry.segment_index(addr) * geometry.segment_lanes;
    let mut data = data.clone();
    let mut strb = strb;
    for lane in (0..geometry.segment_lanes).filter(|&lane| w.strb >> lane & 1 != 0) {
        let value = segment(&w.data, lane, geometry.lane_bits);
        data = with_segment(&data, first + lane, geometry.lane_bits, &value);
        strb |= 1u128 << (first + lane);
    }
    (data, strb)
}
