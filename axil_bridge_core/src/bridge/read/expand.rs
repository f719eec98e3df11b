use ibig::UBig;

use super::{
    ReadInputs, ReadPath, ReadPhase, ReadRegisters, accept_request, emit_beat, finish_burst,
    issue_lite_read, lite_response, lite_sink_ready,
};
use crate::{
    bridge::crosses,
    channel::Resp,
    config::Geometry,
    utils::segment,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum State {
    #[default]
    Idle,
    /// One lite read per burst beat
    Data,
    /// Fetch a wide lite word and serve the first beat from it
    DataRead,
    /// Serve further beats from the retained word
    DataSplit,
}

/// Lite side wider than the burst side.
///
/// Repackable bursts fetch a whole lite word once and serve every beat that
/// falls inside it. Everything else gets one lite read per beat, with the
/// addressed segment shifted down into the burst-side lanes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExpandRead {
    state: State,
}

impl ReadPath for ExpandRead {
    fn phase(&self) -> ReadPhase {
        match self.state {
            State::Idle => ReadPhase::Idle,
            State::Data => ReadPhase::Data,
            State::DataRead => ReadPhase::DataRead,
            State::DataSplit => ReadPhase::DataSplit,
        }
    }

    fn clock(
        &self,
        geometry: &Geometry,
        regs: &ReadRegisters,
        input: &ReadInputs,
        next: &mut ReadRegisters,
    ) -> Self {
        let state = match self.state {
            State::Idle => {
                if !accept_request(geometry, regs, input, next) {
                    State::Idle
                } else if geometry.wants_repack(next.txn.size, input.s_axi_ar.cache) {
                    next.txn.inner_size = geometry.axil_size;
                    State::DataRead
                } else {
                    State::Data
                }
            }
            State::Data => {
                next.ports.m_axil_rready = lite_sink_ready(regs);
                if !lite_response(regs, input) {
                    return *self;
                }

                next.ports.m_axil_rready = false;
                let data = beat_segment(geometry, &input.m_axil_r.data, regs.txn.addr);
                emit_beat(regs, next, data, input.m_axil_r.resp);

                if regs.txn.is_last() {
                    finish_burst(regs, next);
                    State::Idle
                } else {
                    next.txn.burst = regs.txn.burst - 1;
                    next.txn.addr = regs.txn.next_addr(geometry);
                    let addr = next.txn.addr;
                    issue_lite_read(next, addr);
                    State::Data
                }
            }
            State::DataRead => {
                next.ports.m_axil_rready = lite_sink_ready(regs);
                if !lite_response(regs, input) {
                    return *self;
                }

                next.ports.m_axil_rready = false;
                next.txn.data = input.m_axil_r.data.clone();
                next.txn.resp = Some(input.m_axil_r.resp);
                let data = beat_segment(geometry, &input.m_axil_r.data, regs.txn.addr);
                emit_beat(regs, next, data, input.m_axil_r.resp);
                split_next(geometry, regs, next)
            }
            State::DataSplit => {
                if !(input.s_axi_rready || !regs.ports.s_axi_rvalid) {
                    return *self;
                }

                let data = beat_segment(geometry, &regs.txn.data, regs.txn.addr);
                emit_beat(regs, next, data, regs.txn.resp.unwrap_or(Resp::Okay));
                split_next(geometry, regs, next)
            }
        };
        ExpandRead { state }
    }
}

fn beat_segment(geometry: &Geometry, word: &UBig, addr: u64) -> UBig {
    segment(word, geometry.segment_index(addr), geometry.segment_bits())
}

/// After a beat from a retained word: done, keep splitting, or fetch the
/// next lite word once the address leaves the current one.
fn split_next(geometry: &Geometry, regs: &ReadRegisters, next: &mut ReadRegisters) -> State {
    if regs.txn.is_last() {
        finish_burst(regs, next);
        return State::Idle;
    }

    next.txn.burst = regs.txn.burst - 1;
    next.txn.addr = regs.txn.next_addr(geometry);
    if crosses(regs.txn.addr, next.txn.addr, regs.txn.inner_size) {
        let addr = next.txn.addr;
        issue_lite_read(next, addr);
        State::DataRead
    } else {
        State::DataSplit
    }
}
