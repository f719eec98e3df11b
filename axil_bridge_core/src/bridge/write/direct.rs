use super::{
    WriteInputs, WritePath, WritePhase, WriteRegisters, accept_request, finish_burst,
    issue_lite_write, lite_b_ready, lite_response, next_beat, take_beat, w_sink_ready,
};
use crate::{
    channel::Resp,
    config::Geometry,
    utils::{ones, strb_ones},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum State {
    #[default]
    Idle,
    Data,
    Resp,
}

/// Same width on both sides: one lite write per burst beat.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DirectWrite {
    state: State,
}

impl WritePath for DirectWrite {
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
                if accept_request(geometry, regs, input, next) {
                    State::Data
                } else {
                    State::Idle
                }
            }
            State::Data => {
                next.ports.s_axi_wready = w_sink_ready(regs);
                let Some(w) = take_beat(regs, input) else {
                    return *self;
                };

                next.ports.s_axi_wready = false;
                issue_lite_write(
                    next,
                    &w.data & ones(geometry.axil_data_width()),
                    w.strb & strb_ones(geometry.axil_lanes),
                );
                State::Resp
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
                    next.txn.addr = regs.txn.next_addr(geometry);
                    let addr = next.txn.addr;
                    next_beat(next, regs, addr);
                    State::Data
                }
            }
        };
        DirectWrite { state }
    }
}
