pub mod read;
pub mod write;

#[cfg(test)]
mod write_tests;

use ibig::UBig;
use tracing::debug;

use crate::{
    channel::{AxiAddr, BurstType, Resp},
    config::Geometry,
};

/// Descriptor of the one outer burst a bridge is working on.
///
/// Created when the address handshake completes in idle, mutated beat by
/// beat, and overwritten by the next accepted request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub id: u32,
    pub addr: u64,
    pub prot: u8,
    /// Outer beats left after the current one; zero marks the last beat
    pub burst: u8,
    /// Lite beats left after the current one (merge only), clamped to 255
    pub inner_burst: u8,
    pub size: u8,
    pub inner_size: u8,
    pub resp: Option<Resp>,
    pub data: UBig,
    pub strb: u128,
}

impl Default for Transaction {
    fn default() -> Self {
        Self {
            id: 0,
            addr: 0,
            prot: 0,
            burst: 0,
            inner_burst: 0,
            size: 0,
            inner_size: 0,
            resp: None,
            data: UBig::from(0u8),
            strb: 0,
        }
    }
}

impl Transaction {
    /// Latch a burst-side request. Sizes wider than the burst bus are
    /// clamped to the bus width.
    pub fn accept(geometry: &Geometry, request: &AxiAddr) -> Self {
        if request.burst != BurstType::Incr {
            debug!(burst = %request.burst, "addressing burst as INCR");
        }
        let size = request.size.min(geometry.axi_size);
        Self {
            id: request.id & geometry.id_mask(),
            addr: request.addr & geometry.addr_mask(),
            prot: request.prot,
            burst: request.len,
            inner_burst: 0,
            size,
            inner_size: size,
            resp: None,
            data: UBig::from(0u8),
            strb: 0,
        }
    }

    pub fn is_last(&self) -> bool {
        self.burst == 0
    }

    /// Address of the next outer beat.
    pub fn next_addr(&self, geometry: &Geometry) -> u64 {
        advance(self.addr, self.size) & geometry.addr_mask()
    }

    /// Address of the next lite beat inside the current outer beat.
    pub fn next_inner_addr(&self, geometry: &Geometry) -> u64 {
        advance(self.addr, self.inner_size) & geometry.addr_mask()
    }

    /// Narrow outer beats to lite beats: the bridge splits each outer beat
    /// into several lite transfers.
    pub fn is_splitting(&self) -> bool {
        self.inner_size < self.size
    }

    /// Switch the descriptor to lite-sized inner beats if the outer size
    /// exceeds the lite bus.
    pub fn split_to_lite(&mut self, geometry: &Geometry) {
        if self.size > geometry.axil_size {
            self.inner_size = geometry.axil_size;
            self.inner_burst = renormalize(geometry, self.addr, self.size, self.burst);
        } else {
            self.inner_size = self.size;
            self.inner_burst = 0;
        }
    }

    /// Whether another lite transfer follows the current one. A spent inner
    /// count only ends the burst on the final beat of the final outer beat;
    /// anywhere else the count was clamped and gets renormalized.
    pub fn lite_work_remains(&self, beat_done: bool) -> bool {
        self.inner_burst > 0 || !(self.is_last() && beat_done)
    }

    /// Count down one lite beat, recomputing the count once it runs out.
    pub fn step_inner(&self, geometry: &Geometry, next_addr: u64, next_burst: u8) -> u8 {
        if !self.is_splitting() {
            0
        } else if self.inner_burst == 0 {
            renormalize(geometry, next_addr, self.size, next_burst)
        } else {
            self.inner_burst - 1
        }
    }
}

/// INCR addressing: align down to the transfer size, then step one transfer.
pub fn advance(addr: u64, size: u8) -> u64 {
    (addr >> size).wrapping_add(1) << size
}

/// Whether `from` and `to` fall in different `size`-aligned blocks.
pub fn crosses(from: u64, to: u64, size: u8) -> bool {
    (from >> size) != (to >> size)
}

/// Lite beats that remain after the one at `addr`, for an outer burst of
/// `size` with `remaining_outer` further beats, clamped to 255.
///
/// The beat at `addr` only covers the rest of its outer block, so an
/// unaligned address needs fewer lite beats in its first block.
pub fn renormalize(geometry: &Geometry, addr: u64, size: u8, remaining_outer: u8) -> u8 {
    let lite_size = geometry.axil_size;
    if size <= lite_size {
        return 0;
    }
    let block_offset = addr & ((1u64 << size) - 1);
    let first_lite = block_offset >> lite_size << lite_size;
    let in_block = ((1u64 << size) - first_lite) >> lite_size;
    let total = in_block + u64::from(remaining_outer) * (1u64 << (size - lite_size));
    (total - 1).min(u64::from(u8::MAX)) as u8
}
