use super::{
    ReadInputs, ReadPath, ReadPhase, ReadRegisters, accept_request, emit_beat, finish_burst,
    issue_lite_read, lite_response, lite_sink_ready,
};
use crate::{config::Geometry, utils::ones};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum State {
    #[default]
    Idle,
    Data,
}

/// Same width on both sides: one lite read per burst beat, data untouched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DirectRead {
    state: State,
}

impl ReadPath for DirectRead {
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
                if accept_request(geometry, regs, input, next) {
                    DirectRead { state: State::Data }
                } else {
                    *self
                }
            }
            State::Data => {
                next.ports.m_axil_rready = lite_sink_ready(regs);
                if !lite_response(regs, input) {
                    return *self;
                }

                next.ports.m_axil_rready = false;
                let data = &input.m_axil_r.data & ones(geometry.axi_data_width());
                emit_beat(regs, next, data, input.m_axil_r.resp);

                if regs.txn.is_last() {
                    finish_burst(regs, next);
                    return DirectRead { state: State::Idle };
                }

                next.txn.burst = regs.txn.burst - 1;
                next.txn.addr = regs.txn.next_addr(geometry);
                let addr = next.txn.addr;
                issue_lite_read(next, addr);
                *self
            }
        }
    }
}
