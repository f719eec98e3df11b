use std::collections::BTreeMap;

use ibig::UBig;
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::backpressure::{Backpressure, StallPattern};
use crate::{
    bitmask,
    bridge::{read::ReadPorts, write::WritePorts},
    channel::{AxilAddr, AxilB, AxilR, AxilW, Resp},
    utils::{word_from_bytes, word_to_bytes},
};

/// Address range `[start, end)` the memory answers with an error code.
/// Reads there return zero and writes are dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRegion {
    pub start: u64,
    pub end: u64,
    pub resp: Resp,
}

impl ErrorRegion {
    pub fn contains(&self, addr: u64) -> bool {
        (self.start..self.end).contains(&addr)
    }
}

/// One lite transfer as the memory saw it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LiteAccess {
    Read { addr: u64 },
    Write { addr: u64, strb: u128 },
}

/// Registered outputs of the lite memory.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LitePorts {
    pub arready: bool,
    pub r: AxilR,
    pub rvalid: bool,
    pub awready: bool,
    pub wready: bool,
    pub b: AxilB,
    pub bvalid: bool,
}

/// Byte-addressed lite slave. Accesses are aligned down to the lite word and
/// answered one at a time.
#[derive(Clone, Debug)]
pub struct LiteMemory {
    ram: BTreeMap<u64, u8>,
    lanes: usize,
    error_regions: Vec<ErrorRegion>,
    ports: LitePorts,
    pending_read: Option<AxilAddr>,
    pending_aw: Option<AxilAddr>,
    pending_w: Option<AxilW>,
    backpressure: Backpressure,
    log: Vec<LiteAccess>,
}

impl LiteMemory {
    pub fn new(lanes: usize, initial: &BTreeMap<u64, u8>) -> Self {
        Self {
            ram: initial.clone(),
            lanes,
            error_regions: Vec::new(),
            ports: LitePorts::default(),
            pending_read: None,
            pending_aw: None,
            pending_w: None,
            backpressure: Backpressure::default(),
            log: Vec::new(),
        }
    }

    pub fn set_stalls(&mut self, pattern: StallPattern) {
        self.backpressure = Backpressure::new(pattern);
    }

    pub fn add_error_region(&mut self, region: ErrorRegion) {
        self.error_regions.push(region);
    }

    pub fn get(&self, address: u64) -> u8 {
        *self.ram.get(&address).unwrap_or(&0)
    }

    pub fn set(&mut self, address: u64, value: u8) {
        self.ram.insert(address, value);
    }

    pub fn ram(&self) -> &BTreeMap<u64, u8> {
        &self.ram
    }

    pub fn outputs(&self) -> &LitePorts {
        &self.ports
    }

    /// Every lite transfer performed so far, oldest first.
    pub fn log(&self) -> &[LiteAccess] {
        &self.log
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    fn base(&self, address: u64) -> u64 {
        address & !bitmask!(self.lanes.trailing_zeros())
    }

    fn region(&self, base: u64) -> Option<&ErrorRegion> {
        self.error_regions.iter().find(|region| region.contains(base))
    }

    pub fn read_word(&self, address: u64) -> (UBig, Resp) {
        let base = self.base(address);
        if let Some(region) = self.region(base) {
            return (UBig::from(0u8), region.resp);
        }
        let bytes: Vec<u8> = (0..self.lanes as u64)
            .map(|i| self.get(base.wrapping_add(i)))
            .collect();
        (word_from_bytes(&bytes), Resp::Okay)
    }

    pub fn write_word(&mut self, address: u64, w: &AxilW) -> Resp {
        let base = self.base(address);
        if let Some(region) = self.region(base) {
            return region.resp;
        }
        let bytes = word_to_bytes(&w.data, self.lanes);
        for (i, &byte) in bytes.iter().enumerate() {
            if w.strb >> i & 1 != 0 {
                self.set(base.wrapping_add(i as u64), byte);
            }
        }
        Resp::Okay
    }

    /// Advance one cycle against the bridge outputs of the current cycle.
    pub fn clock(&mut self, read: &ReadPorts, write: &WritePorts, cycle: u64) {
        let ports = self.ports.clone();
        let stall = self.backpressure.stall(cycle);

        if ports.arready && read.m_axil_arvalid {
            self.pending_read = Some(read.m_axil_ar);
        }
        let mut rvalid = ports.rvalid && !read.m_axil_rready;
        if !rvalid && !stall {
            if let Some(ar) = self.pending_read.take() {
                let (data, resp) = self.read_word(ar.addr);
                trace!(addr = ar.addr, %resp, "memory read");
                self.log.push(LiteAccess::Read { addr: ar.addr });
                self.ports.r = AxilR { data, resp };
                rvalid = true;
            }
        }
        self.ports.rvalid = rvalid;
        self.ports.arready = self.pending_read.is_none() && !stall;

        if ports.awready && write.m_axil_awvalid {
            self.pending_aw = Some(write.m_axil_aw);
        }
        if ports.wready && write.m_axil_wvalid {
            self.pending_w = Some(write.m_axil_w.clone());
        }
        let mut bvalid = ports.bvalid && !write.m_axil_bready;
        if !bvalid && !stall && self.pending_aw.is_some() && self.pending_w.is_some() {
            if let (Some(aw), Some(w)) = (self.pending_aw.take(), self.pending_w.take()) {
                let resp = self.write_word(aw.addr, &w);
                trace!(addr = aw.addr, strb = w.strb, %resp, "memory write");
                self.log.push(LiteAccess::Write {
                    addr: aw.addr,
                    strb: w.strb,
                });
                self.ports.b = AxilB { resp };
                bvalid = true;
            }
        }
        self.ports.bvalid = bvalid;
        self.ports.awready = self.pending_aw.is_none() && !stall;
        self.ports.wready = self.pending_w.is_none() && !stall;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_access() {
        let mut memory = LiteMemory::new(4, &BTreeMap::from([(0x101, 0xAB)]));
        assert_eq!(memory.read_word(0x102), (UBig::from(0xAB00u32), Resp::Okay));

        let resp = memory.write_word(
            0x106,
            &AxilW {
                data: UBig::from(0x4433_2211u32),
                strb: 0b1010,
            },
        );
        assert_eq!(resp, Resp::Okay);
        assert_eq!(memory.get(0x104), 0);
        assert_eq!(memory.get(0x105), 0x22);
        assert_eq!(memory.get(0x107), 0x44);
    }

    #[test]
    fn test_error_region() {
        let mut memory = LiteMemory::new(4, &BTreeMap::from([(0x10, 0xFF)]));
        memory.add_error_region(ErrorRegion {
            start: 0x10,
            end: 0x20,
            resp: Resp::DecErr,
        });

        assert_eq!(memory.read_word(0x10), (UBig::from(0u8), Resp::DecErr));
        let w = AxilW {
            data: UBig::from(0x1u8),
            strb: 0xF,
        };
        assert_eq!(memory.write_word(0x14, &w), Resp::DecErr);
        assert!(!memory.ram().contains_key(&0x14));
        assert_eq!(memory.write_word(0x20, &w), Resp::Okay);
    }

    #[test]
    fn test_handshakes() {
        let mut memory = LiteMemory::new(4, &BTreeMap::from([(0x8, 0x5A)]));
        let mut read = ReadPorts::default();
        let write = WritePorts::default();

        memory.clock(&read, &write, 0);
        assert!(memory.outputs().arready);

        read.m_axil_ar = AxilAddr { addr: 0x8, prot: 0 };
        read.m_axil_arvalid = true;
        memory.clock(&read, &write, 1);
        assert!(memory.outputs().rvalid);
        assert_eq!(memory.outputs().r.data, UBig::from(0x5Au8));

        // held until taken
        read.m_axil_arvalid = false;
        memory.clock(&read, &write, 2);
        assert!(memory.outputs().rvalid);
        read.m_axil_rready = true;
        memory.clock(&read, &write, 3);
        assert!(!memory.outputs().rvalid);
        assert_eq!(memory.log(), &[LiteAccess::Read { addr: 0x8 }]);
    }
}
