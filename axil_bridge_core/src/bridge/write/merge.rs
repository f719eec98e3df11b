use ibig::UBig;

use super::{
    WriteInputs, WritePath, WritePhase, WriteRegisters, accept_request, finish_burst,
    issue_lite_addr, issue_lite_write, lite_b_ready, lite_response, next_beat, take_beat,
    w_sink_ready,
};
use crate::{
    bridge::crosses,
    channel::Resp,
    config::Geometry,
    utils::{segment, strb_segment},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum State {
    #[default]
    Idle,
    Data,
    Resp,
}

/// Lite side narrower than the burst side.
///
/// A burst beat wider than the lite bus is retained and drained as one lite
/// write per segment, lowest address first. The next burst beat is taken
/// once the last segment has been answered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeWrite {
    state: State,
}

impl WritePath for MergeWrite {
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
                    return *self;
                }
                next.txn.split_to_lite(geometry);
                State::Data
            }
            State::Data => {
                next.ports.s_axi_wready = w_sink_ready(regs);
                let Some(w) = take_beat(regs, input) else {
                    return *self;
                };

                next.ports.s_axi_wready = false;
                next.txn.data = w.data.clone();
                next.txn.strb = w.strb;
                drain_segment(geometry, &w.data, w.strb, regs.txn.addr, next);
                State::Resp
            }
            State::Resp => {
                next.ports.m_axil_bready = lite_b_ready(regs);
                if !lite_response(regs, input) {
                    return *self;
                }

                next.ports.m_axil_bready = false;
                let txn = &regs.txn;
                let resp = Resp::aggregate(txn.resp, input.m_axil_b.resp);
                let addr_next = txn.next_inner_addr(geometry);
                let beat_done = crosses(txn.addr, addr_next, txn.size);

                if !txn.lite_work_remains(beat_done) {
                    finish_burst(regs, next, resp);
                    return MergeWrite { state: State::Idle };
                }

                next.txn.resp = Some(resp);
                if beat_done {
                    next.txn.burst = txn.burst.saturating_sub(1);
                }
                next.txn.inner_burst = txn.step_inner(geometry, addr_next, next.txn.burst);
                next.txn.addr = addr_next;

                if beat_done {
                    next.txn.data = UBig::from(0u8);
                    next.txn.strb = 0;
                    next_beat(next, regs, addr_next);
                    State::Data
                } else {
                    issue_lite_addr(next, addr_next);
                    drain_segment(geometry, &txn.data, txn.strb, addr_next, next);
                    State::Resp
                }
            }
        };
        MergeWrite { state }
    }
}

/// Put the segment of the retained beat addressed by `addr` on the lite
/// data channel.
fn drain_segment(
    geometry: &Geometry,
    data: &UBig,
    strb: u128,
    addr: u64,
    next: &mut WriteRegisters,
) {
    let index = geometry.segment_index(addr);
    issue_lite_write(
        next,
        segment(data, index, geometry.segment_bits()),
        strb_segment(strb, index, geometry.segment_lanes),
    );
}
