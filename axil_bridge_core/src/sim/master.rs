use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::{
    SimError,
    backpressure::{Backpressure, StallPattern},
};
use crate::{
    bridge::{advance, read::ReadPorts, write::WritePorts},
    channel::{AxiAddr, AxiB, AxiR, AxiW, BurstType},
    utils::{strb_ones, word_from_bytes, word_to_bytes},
};

/// A burst-side request as a test or scenario describes it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Burst {
    pub id: u32,
    pub addr: u64,
    pub len: u8,
    pub size: u8,
    pub burst: BurstType,
    pub cache: u8,
    pub prot: u8,
}

impl Burst {
    pub fn new(addr: u64, len: u8, size: u8) -> Self {
        Self {
            addr,
            len,
            size,
            ..Default::default()
        }
    }

    pub fn with_id(self, id: u32) -> Self {
        Self { id, ..self }
    }

    pub fn with_cache(self, cache: u8) -> Self {
        Self { cache, ..self }
    }

    pub fn request(&self) -> AxiAddr {
        AxiAddr {
            id: self.id,
            addr: self.addr,
            len: self.len,
            size: self.size,
            burst: self.burst,
            lock: false,
            cache: self.cache,
            prot: self.prot,
        }
    }

    /// Address and byte count of every beat. Only the first beat of an
    /// unaligned burst is short.
    pub fn beats(&self) -> Vec<(u64, usize)> {
        let mut addr = self.addr;
        (0..=self.len)
            .map(|_| {
                let next = advance(addr, self.size);
                let beat = (addr, next.wrapping_sub(addr) as usize);
                addr = next;
                beat
            })
            .collect()
    }

    pub fn byte_len(&self) -> usize {
        self.beats().iter().map(|&(_, count)| count).sum()
    }

    /// Lay `bytes` out as write beats on a bus of `lanes` bytes.
    pub fn pack(&self, lanes: usize, bytes: &[u8]) -> Result<Vec<AxiW>, SimError> {
        let expected = self.byte_len();
        if bytes.len() != expected {
            return Err(SimError::PayloadLength {
                expected,
                actual: bytes.len(),
            });
        }

        let mut offset = 0;
        let beats = self.beats();
        let last = beats.len() - 1;
        Ok(beats
            .into_iter()
            .enumerate()
            .map(|(i, (addr, count))| {
                let lane = addr as usize & (lanes - 1);
                let mut word = vec![0u8; lanes];
                word[lane..lane + count].copy_from_slice(&bytes[offset..offset + count]);
                offset += count;
                AxiW {
                    data: word_from_bytes(&word),
                    strb: strb_ones(count) << lane,
                    last: i == last,
                }
            })
            .collect())
    }

    /// Collect the addressed bytes out of read beats on a bus of `lanes` bytes.
    pub fn unpack(&self, lanes: usize, beats: &[AxiR]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.byte_len());
        for (beat, (addr, count)) in beats.iter().zip(self.beats()) {
            let lane = addr as usize & (lanes - 1);
            let word = word_to_bytes(&beat.data, lanes);
            bytes.extend_from_slice(&word[lane..lane + count]);
        }
        bytes
    }
}

/// Registered outputs of the burst master.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MasterPorts {
    pub ar: AxiAddr,
    pub arvalid: bool,
    pub rready: bool,
    pub aw: AxiAddr,
    pub awvalid: bool,
    pub w: AxiW,
    pub wvalid: bool,
    pub bready: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadCompletion {
    pub burst: Burst,
    pub beats: Vec<AxiR>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteCompletion {
    pub burst: Burst,
    pub response: AxiB,
}

/// Burst-side master. Presents queued requests in order, keeps every valid
/// up until its handshake, and records what comes back.
#[derive(Clone, Debug, Default)]
pub struct BurstMaster {
    ports: MasterPorts,
    reads: VecDeque<Burst>,
    read_outstanding: VecDeque<(Burst, Vec<AxiR>)>,
    writes: VecDeque<(Burst, Vec<AxiW>)>,
    w_queue: VecDeque<AxiW>,
    write_outstanding: VecDeque<Burst>,
    completed_reads: VecDeque<ReadCompletion>,
    completed_writes: VecDeque<WriteCompletion>,
    backpressure: Backpressure,
}

impl BurstMaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_stalls(&mut self, pattern: StallPattern) {
        self.backpressure = Backpressure::new(pattern);
    }

    pub fn queue_read(&mut self, burst: Burst) {
        self.reads.push_back(burst);
    }

    pub fn queue_write(&mut self, burst: Burst, beats: Vec<AxiW>) {
        self.writes.push_back((burst, beats));
    }

    pub fn outputs(&self) -> &MasterPorts {
        &self.ports
    }

    pub fn pop_read(&mut self) -> Option<ReadCompletion> {
        self.completed_reads.pop_front()
    }

    pub fn pop_write(&mut self) -> Option<WriteCompletion> {
        self.completed_writes.pop_front()
    }

    /// Nothing queued, nothing in flight, no valid raised.
    pub fn is_done(&self) -> bool {
        self.reads.is_empty()
            && self.read_outstanding.is_empty()
            && self.writes.is_empty()
            && self.w_queue.is_empty()
            && self.write_outstanding.is_empty()
            && !self.ports.arvalid
            && !self.ports.awvalid
            && !self.ports.wvalid
    }

    /// Advance one cycle against the bridge outputs of the current cycle.
    pub fn clock(&mut self, read: &ReadPorts, write: &WritePorts, cycle: u64) {
        let ports = self.ports.clone();
        let stall = self.backpressure.stall(cycle);

        // read address
        if ports.arvalid && read.s_axi_arready {
            if let Some(burst) = self.reads.pop_front() {
                self.read_outstanding.push_back((burst, Vec::new()));
            }
            self.ports.arvalid = false;
        }
        if !self.ports.arvalid && !stall {
            if let Some(burst) = self.reads.front() {
                self.ports.ar = burst.request();
                self.ports.arvalid = true;
            }
        }

        // read data
        if ports.rready && read.s_axi_rvalid {
            trace!(id = read.s_axi_r.id, last = read.s_axi_r.last, "read beat");
            if let Some((_, beats)) = self.read_outstanding.front_mut() {
                beats.push(read.s_axi_r.clone());
            }
            if read.s_axi_r.last {
                if let Some((burst, beats)) = self.read_outstanding.pop_front() {
                    self.completed_reads.push_back(ReadCompletion { burst, beats });
                }
            }
        }
        self.ports.rready = !stall;

        // write address
        if ports.awvalid && write.s_axi_awready {
            if let Some((burst, beats)) = self.writes.pop_front() {
                self.w_queue.extend(beats);
                self.write_outstanding.push_back(burst);
            }
            self.ports.awvalid = false;
        }
        if !self.ports.awvalid && !stall {
            if let Some((burst, _)) = self.writes.front() {
                self.ports.aw = burst.request();
                self.ports.awvalid = true;
            }
        }

        // write data
        if ports.wvalid && write.s_axi_wready {
            self.w_queue.pop_front();
            self.ports.wvalid = false;
        }
        if !self.ports.wvalid && !stall {
            if let Some(w) = self.w_queue.front() {
                self.ports.w = w.clone();
                self.ports.wvalid = true;
            }
        }

        // write response
        if ports.bready && write.s_axi_bvalid {
            trace!(id = write.s_axi_b.id, resp = %write.s_axi_b.resp, "write response");
            if let Some(burst) = self.write_outstanding.pop_front() {
                self.completed_writes.push_back(WriteCompletion {
                    burst,
                    response: write.s_axi_b,
                });
            }
        }
        self.ports.bready = !stall;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ibig::UBig;

    #[test]
    fn test_beats() {
        assert_eq!(
            Burst::new(0x100, 2, 2).beats(),
            vec![(0x100, 4), (0x104, 4), (0x108, 4)]
        );
        // short first beat when unaligned
        assert_eq!(Burst::new(0x103, 1, 2).beats(), vec![(0x103, 1), (0x104, 4)]);
        assert_eq!(Burst::new(0x103, 1, 2).byte_len(), 5);
    }

    #[test]
    fn test_pack_unpack() {
        let burst = Burst::new(0x6, 1, 2);
        let beats = burst.pack(8, &[1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(beats.len(), 2);
        assert_eq!(beats[0].strb, 0b1100_0000);
        assert_eq!(beats[0].data, UBig::from(0x0201u16) << 48);
        assert_eq!(beats[1].strb, 0b0000_1111);
        assert!(!beats[0].last && beats[1].last);

        let reads: Vec<AxiR> = beats
            .iter()
            .map(|w| AxiR {
                data: w.data.clone(),
                last: w.last,
                ..Default::default()
            })
            .collect();
        assert_eq!(burst.unpack(8, &reads), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_pack_rejects_length() {
        assert_eq!(
            Burst::new(0x0, 1, 2).pack(4, &[0; 7]),
            Err(SimError::PayloadLength {
                expected: 8,
                actual: 7
            })
        );
    }
}
