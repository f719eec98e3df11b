use ibig::UBig;

use super::{
    ReadInputs, ReadPath, ReadPhase, ReadRegisters, accept_request, emit_beat, finish_burst,
    issue_lite_read, lite_response, lite_sink_ready,
};
use crate::{bridge::crosses, channel::Resp, config::Geometry, utils::with_segment};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum State {
    #[default]
    Idle,
    Data,
}

/// Lite side narrower than the burst side.
///
/// Each outer beat wider than the lite bus is gathered from several lite
/// reads, each landing in its segment of the assembled word. The beat goes
/// out once the next lite address leaves the outer transfer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeRead {
    state: State,
}

impl ReadPath for MergeRead {
    fn phase(&self) -> ReadPhase {
        match self.state {
            State::Idle => ReadPhase::Idle,
            State::Data => ReadPhase::Data,
        }
    }

    fn clock(
        &self,
        geometry: &Geometry,
        regs: &ReadRegisters,
        input: &ReadInputs,
        next: &mut ReadRegisters,
    ) -> Self {
        match self.state {
            State::Idle => {
                if !accept_request(geometry, regs, input, next) {
                    return *self;
                }
                next.txn.split_to_lite(geometry);
                MergeRead { state: State::Data }
            }
            State::Data => {
                next.ports.m_axil_rready = lite_sink_ready(regs);
                if !lite_response(regs, input) {
                    return *self;
                }

                next.ports.m_axil_rready = false;
                let txn = &regs.txn;
                let data = with_segment(
                    &txn.data,
                    geometry.segment_index(txn.addr),
                    geometry.segment_bits(),
                    &input.m_axil_r.data,
                );
                let resp = Resp::aggregate(txn.resp, input.m_axil_r.resp);
                let addr_next = txn.next_inner_addr(geometry);
                let beat_done = crosses(txn.addr, addr_next, txn.size);

                if beat_done {
                    emit_beat(regs, next, data, resp);
                    next.txn.data = UBig::from(0u8);
                    next.txn.resp = None;
                } else {
                    next.txn.data = data;
                    next.txn.resp = Some(resp);
                }
                if !txn.lite_work_remains(beat_done) {
                    finish_burst(regs, next);
                    return MergeRead { state: State::Idle };
                }
                if beat_done {
                    next.txn.burst = txn.burst.saturating_sub(1);
                }

                next.txn.inner_burst = txn.step_inner(geometry, addr_next, next.txn.burst);
                next.txn.addr = addr_next;
                issue_lite_read(next, addr_next);
                *self
            }
        }
    }
}
