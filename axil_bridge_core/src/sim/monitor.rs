use tracing::warn;

use super::SimError;
use crate::bridge::{
    read::{ReadInputs, ReadPorts},
    write::{WriteInputs, WritePorts},
};

#[derive(Clone, Debug)]
struct Snapshot {
    read_in: ReadInputs,
    read_out: ReadPorts,
    write_in: WriteInputs,
    write_out: WritePorts,
}

/// Watches both bridges cycle by cycle and reports the first rule they
/// break: a valid dropped or changed before its handshake, a second burst
/// accepted while one is unresolved, a wrong beat count or `last`, or more
/// than one lite transfer in flight.
#[derive(Clone, Debug, Default)]
pub struct ProtocolMonitor {
    prev: Option<Snapshot>,
    read_beats_left: u32,
    write_open: bool,
    lite_reads: u32,
    lite_aws: u32,
    lite_ws: u32,
}

impl ProtocolMonitor {
    pub fn observe(
        &mut self,
        cycle: u64,
        read_in: &ReadInputs,
        read_out: &ReadPorts,
        write_in: &WriteInputs,
        write_out: &WritePorts,
    ) -> Result<(), SimError> {
        let fail = |message: &str| {
            warn!(cycle, reason = message, "protocol violation");
            Err(SimError::Protocol {
                cycle,
                message: message.to_string(),
            })
        };

        // payloads held since last cycle must not move
        let (new_r, new_b) = match &self.prev {
            Some(prev) => {
                let held_r = prev.read_out.s_axi_rvalid && !prev.read_in.s_axi_rready;
                let held_ar = prev.read_out.m_axil_arvalid && !prev.read_in.m_axil_arready;
                let held_b = prev.write_out.s_axi_bvalid && !prev.write_in.s_axi_bready;
                let held_aw = prev.write_out.m_axil_awvalid && !prev.write_in.m_axil_awready;
                let held_w = prev.write_out.m_axil_wvalid && !prev.write_in.m_axil_wready;

                if held_r && !(read_out.s_axi_rvalid && read_out.s_axi_r == prev.read_out.s_axi_r)
                {
                    return fail("read data changed before it was taken");
                }
                if held_ar
                    && !(read_out.m_axil_arvalid && read_out.m_axil_ar == prev.read_out.m_axil_ar)
                {
                    return fail("lite read address changed before it was taken");
                }
                if held_b && !(write_out.s_axi_bvalid && write_out.s_axi_b == prev.write_out.s_axi_b)
                {
                    return fail("write response changed before it was taken");
                }
                if held_aw
                    && !(write_out.m_axil_awvalid
                        && write_out.m_axil_aw == prev.write_out.m_axil_aw)
                {
                    return fail("lite write address changed before it was taken");
                }
                if held_w
                    && !(write_out.m_axil_wvalid && write_out.m_axil_w == prev.write_out.m_axil_w)
                {
                    return fail("lite write data changed before it was taken");
                }
                (
                    read_out.s_axi_rvalid && !held_r,
                    write_out.s_axi_bvalid && !held_b,
                )
            }
            None => (read_out.s_axi_rvalid, write_out.s_axi_bvalid),
        };

        // burst side, read
        if new_r {
            if self.read_beats_left == 0 {
                return fail("read data without a read burst");
            }
            self.read_beats_left -= 1;
            if read_out.s_axi_r.last != (self.read_beats_left == 0) {
                return fail("last does not mark the final read beat");
            }
        }
        if read_in.s_axi_arvalid && read_out.s_axi_arready {
            if self.read_beats_left != 0 {
                return fail("read burst accepted while another is unresolved");
            }
            self.read_beats_left = u32::from(read_in.s_axi_ar.len) + 1;
        }

        // burst side, write
        if new_b {
            if !self.write_open {
                return fail("write response without a write burst");
            }
            self.write_open = false;
        }
        if write_in.s_axi_awvalid && write_out.s_axi_awready {
            if self.write_open {
                return fail("write burst accepted while another is unresolved");
            }
            self.write_open = true;
        }

        // lite side
        if read_out.m_axil_rready && read_in.m_axil_rvalid {
            if self.lite_reads == 0 {
                return fail("lite read data taken with no lite read in flight");
            }
            self.lite_reads -= 1;
        }
        if read_out.m_axil_arvalid && read_in.m_axil_arready {
            self.lite_reads += 1;
        }
        if write_out.m_axil_bready && write_in.m_axil_bvalid {
            if self.lite_aws == 0 || self.lite_ws == 0 {
                return fail("lite write response taken with no lite write in flight");
            }
            self.lite_aws -= 1;
            self.lite_ws -= 1;
        }
        if write_out.m_axil_awvalid && write_in.m_axil_awready {
            self.lite_aws += 1;
        }
        if write_out.m_axil_wvalid && write_in.m_axil_wready {
            self.lite_ws += 1;
        }
        if self.lite_reads > 1 || self.lite_aws > 1 || self.lite_ws > 1 {
            return fail("more than one lite transfer in flight");
        }

        self.prev = Some(Snapshot {
            read_in: read_in.clone(),
            read_out: read_out.clone(),
            write_in: write_in.clone(),
            write_out: write_out.clone(),
        });
        Ok(())
    }

    /// Nothing is left unresolved on either side.
    pub fn is_settled(&self) -> bool {
        self.read_beats_left == 0
            && !self.write_open
            && self.lite_reads == 0
            && self.lite_aws == 0
            && self.lite_ws == 0
    }
}
