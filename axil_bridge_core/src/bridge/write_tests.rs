use ibig::UBig;

use super::write::{WriteBridge, WriteInputs, WritePhase};
use crate::{
    channel::{AxiAddr, AxiB, AxiW, AxilB, AxilW, Resp},
    config::BridgeConfig,
};

struct WriteRun {
    response: AxiB,
    lite_writes: Vec<(u64, AxilW)>,
    /// Inner count held alongside each lite address
    inner_counts: Vec<u8>,
}

// Drives one write burst through a fresh bridge. The lite side answers once
// it holds both the address and the data of a write; `wvalid` decides per
// cycle whether the next data beat may be raised.
fn drive_write(
    config: BridgeConfig,
    aw: AxiAddr,
    beats: &[AxiW],
    wvalid: impl Fn(usize) -> bool,
    mut respond: impl FnMut(u64) -> Resp,
) -> WriteRun {
    let mut bridge = WriteBridge::from_config(&config).unwrap();
    let mut lite_writes = Vec::new();
    let mut inner_counts = Vec::new();
    let mut requesting = true;
    let mut beat = 0;
    let mut presenting = false;
    let mut lite_aw: Option<u64> = None;
    let mut lite_w: Option<AxilW> = None;
    let mut pending: Option<Resp> = None;

    for cycle in 0..5000 {
        let out = bridge.outputs().clone();
        if !presenting && beat < beats.len() && wvalid(cycle) {
            presenting = true;
        }
        let input = WriteInputs {
            s_axi_aw: aw.clone(),
            s_axi_awvalid: requesting,
            s_axi_w: beats.get(beat).cloned().unwrap_or_default(),
            s_axi_wvalid: presenting,
            s_axi_bready: true,
            m_axil_awready: true,
            m_axil_wready: true,
            m_axil_b: AxilB {
                resp: pending.unwrap_or_default(),
            },
            m_axil_bvalid: pending.is_some(),
        };

        if out.s_axi_bvalid {
            assert_eq!(beat, beats.len(), "response before every beat was taken");
            return WriteRun {
                response: out.s_axi_b,
                lite_writes,
                inner_counts,
            };
        }
        if out.s_axi_awready && requesting {
            requesting = false;
        }
        if out.s_axi_wready && presenting {
            beat += 1;
            presenting = false;
        }
        if out.m_axil_bready && pending.is_some() {
            pending = None;
        }
        if out.m_axil_awvalid {
            assert!(lite_aw.is_none() && pending.is_none());
            lite_aw = Some(out.m_axil_aw.addr);
            inner_counts.push(bridge.transaction().inner_burst);
        }
        if out.m_axil_wvalid {
            assert!(lite_w.is_none());
            lite_w = Some(out.m_axil_w.clone());
        }
        if lite_aw.is_some() && lite_w.is_some() {
            if let (Some(addr), Some(w)) = (lite_aw.take(), lite_w.take()) {
                pending = Some(respond(addr));
                lite_writes.push((addr, w));
            }
        }

        let (next, ports) = bridge.step(&input);
        assert_eq!(&ports, next.outputs());
        bridge = next;
    }
    panic!("write burst never completed");
}

fn always(_: usize) -> bool {
    true
}

fn okay(_: u64) -> Resp {
    Resp::Okay
}

fn request(addr: u64, len: u8, size: u8) -> AxiAddr {
    AxiAddr {
        id: 9,
        addr,
        len,
        size,
        ..Default::default()
    }
}

fn beat(data: u64, strb: u128, last: bool) -> AxiW {
    AxiW {
        data: UBig::from(data),
        strb,
        last,
    }
}

fn lite_w(data: u64, strb: u128) -> AxilW {
    AxilW {
        data: UBig::from(data),
        strb,
    }
}

fn full_beats(values: &[u64], strb: u128) -> Vec<AxiW> {
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| beat(v, strb, i + 1 == values.len()))
        .collect()
}

#[test]
fn test_direct_burst() {
    let beats = full_beats(&[0x11, 0x22, 0x33, 0x44], 0xF);
    let run = drive_write(
        BridgeConfig::default(),
        request(0x100, 3, 2),
        &beats,
        always,
        okay,
    );

    assert_eq!(
        run.lite_writes,
        vec![
            (0x100, lite_w(0x11, 0xF)),
            (0x104, lite_w(0x22, 0xF)),
            (0x108, lite_w(0x33, 0xF)),
            (0x10C, lite_w(0x44, 0xF)),
        ]
    );
    assert_eq!(
        run.response,
        AxiB {
            id: 9,
            resp: Resp::Okay
        }
    );
}

#[test]
fn test_first_error_wins() {
    let beats = full_beats(&[1, 2, 3], 0xF);
    let run = drive_write(
        BridgeConfig::default(),
        request(0x0, 2, 2),
        &beats,
        always,
        |addr| match addr {
            0x4 => Resp::SlvErr,
            0x8 => Resp::DecErr,
            _ => Resp::Okay,
        },
    );
    assert_eq!(run.response.resp, Resp::SlvErr);
}

#[test]
fn test_exokay_is_not_an_error() {
    let beats = full_beats(&[1, 2], 0xF);
    let run = drive_write(
        BridgeConfig::default(),
        request(0x0, 1, 2),
        &beats,
        always,
        |_| Resp::ExOkay,
    );
    assert_eq!(run.response.resp, Resp::ExOkay);
}

#[test]
fn test_wlast_does_not_end_burst() {
    let beats: Vec<AxiW> = (0..3).map(|v| beat(v, 0xF, false)).collect();
    let run = drive_write(
        BridgeConfig::default(),
        request(0x0, 2, 2),
        &beats,
        always,
        okay,
    );
    assert_eq!(run.lite_writes.len(), 3);
}

#[test]
fn test_wvalid_gaps() {
    let beats = full_beats(&[0xA, 0xB, 0xC, 0xD], 0x3);
    let free = drive_write(
        BridgeConfig::default(),
        request(0x20, 3, 2),
        &beats,
        always,
        okay,
    );
    let gappy = drive_write(
        BridgeConfig::default(),
        request(0x20, 3, 2),
        &beats,
        |cycle| cycle % 4 == 1,
        okay,
    );
    assert_eq!(free.lite_writes, gappy.lite_writes);
    assert_eq!(free.response, gappy.response);
}

#[test]
fn test_expand_repack_gathers_beats() {
    let aw = AxiAddr {
        cache: 0b0010,
        ..request(0x0, 1, 2)
    };
    let beats = full_beats(&[0x1111_1111, 0x2222_2222], 0xF);
    let run = drive_write(BridgeConfig::new(32, 64), aw, &beats, always, okay);

    assert_eq!(
        run.lite_writes,
        vec![(0x0, lite_w(0x2222_2222_1111_1111, 0xFF))]
    );
}

#[test]
fn test_expand_one_write_per_beat() {
    let beats = full_beats(&[0x1111_1111, 0x2222_2222], 0xF);
    let run = drive_write(
        BridgeConfig::new(32, 64),
        request(0x0, 1, 2),
        &beats,
        always,
        okay,
    );

    assert_eq!(
        run.lite_writes,
        vec![
            (0x0, lite_w(0x1111_1111, 0x0F)),
            (0x4, lite_w(0x2222_2222 << 32, 0xF0)),
        ]
    );
}

#[test]
fn test_expand_narrow_repack_keeps_lanes() {
    let aw = AxiAddr {
        cache: 0b0010,
        ..request(0x0, 3, 0)
    };
    let beats: Vec<AxiW> = (0..4u64)
        .map(|lane| beat((0x11 * (lane + 1)) << (8 * lane), 1 << lane, lane == 3))
        .collect();
    let config = BridgeConfig::new(32, 64).with_repack(true, true);
    let run = drive_write(config, aw, &beats, always, okay);

    assert_eq!(run.lite_writes, vec![(0x0, lite_w(0x4433_2211, 0x0F))]);
}

#[test]
fn test_merge_drains_low_half_first() {
    let beats = full_beats(&[0x2222_2222_1111_1111], 0xFF);
    let run = drive_write(
        BridgeConfig::new(64, 32),
        request(0x0, 0, 3),
        &beats,
        always,
        okay,
    );

    assert_eq!(
        run.lite_writes,
        vec![
            (0x0, lite_w(0x1111_1111, 0xF)),
            (0x4, lite_w(0x2222_2222, 0xF)),
        ]
    );
    assert_eq!(run.response.id, 9);
}

#[test]
fn test_merge_partial_strobes() {
    let beats = full_beats(&[0x8877_6655_4433_2211, 0x1], 0b0011_1100);
    let run = drive_write(
        BridgeConfig::new(64, 16),
        request(0x10, 1, 3),
        &beats,
        always,
        okay,
    );

    let writes: Vec<(u64, u128)> = run
        .lite_writes
        .iter()
        .map(|(addr, w)| (*addr, w.strb))
        .collect();
    assert_eq!(
        writes,
        vec![
            (0x10, 0b00),
            (0x12, 0b11),
            (0x14, 0b11),
            (0x16, 0b00),
            (0x18, 0b00),
            (0x1A, 0b11),
            (0x1C, 0b11),
            (0x1E, 0b00),
        ]
    );
    assert_eq!(run.lite_writes[1].1.data, UBig::from(0x4433u16));
}

#[test]
fn test_merge_error_in_second_half() {
    let beats = full_beats(&[0, 0], 0xFF);
    let run = drive_write(
        BridgeConfig::new(64, 32),
        request(0x0, 1, 3),
        &beats,
        always,
        |addr| if addr == 0xC { Resp::DecErr } else { Resp::Okay },
    );
    assert_eq!(run.lite_writes.len(), 4);
    assert_eq!(run.response.resp, Resp::DecErr);
}

#[test]
fn test_merge_renormalizes_clamped_count() {
    // 125 + 2 * 128 lite writes: more than one count can hold
    let beats: Vec<AxiW> = (0..3)
        .map(|i| AxiW {
            data: UBig::from(0u8),
            strb: u128::MAX,
            last: i == 2,
        })
        .collect();
    let run = drive_write(
        BridgeConfig::new(1024, 8),
        request(0x3, 2, 7),
        &beats,
        always,
        okay,
    );

    assert_eq!(run.response.resp, Resp::Okay);
    let addrs: Vec<u64> = run.lite_writes.iter().map(|(addr, _)| *addr).collect();
    assert_eq!(addrs, (0x3..0x180).collect::<Vec<u64>>());
    assert!(run.lite_writes.iter().all(|(_, w)| w.strb == 1));
    assert_eq!(run.inner_counts[0], 255);
    assert_eq!(run.inner_counts[255], 0);
    assert_eq!(run.inner_counts[256], 124);
    assert_eq!(run.inner_counts[380], 0);
}

#[test]
fn test_next_beat_waits_for_lite_response() {
    let mut bridge = WriteBridge::from_config(&BridgeConfig::new(64, 32)).unwrap();
    let input = WriteInputs {
        s_axi_aw: request(0x0, 1, 3),
        s_axi_awvalid: true,
        s_axi_w: beat(0, 0xFF, false),
        s_axi_wvalid: true,
        m_axil_awready: true,
        m_axil_wready: true,
        ..Default::default()
    };

    // accept the address, then the first beat
    bridge = bridge.clock(&input);
    bridge = bridge.clock(&input);
    assert_eq!(bridge.phase(), WritePhase::Data);
    bridge = bridge.clock(&input);
    assert_eq!(bridge.phase(), WritePhase::Resp);

    // the lite side never answers
    for _ in 0..10 {
        bridge = bridge.clock(&input);
        assert!(!bridge.outputs().s_axi_wready);
        assert!(!bridge.outputs().s_axi_awready);
    }
    assert_eq!(bridge.phase(), WritePhase::Resp);

    bridge.reset();
    assert!(bridge.is_idle());
    assert!(!bridge.outputs().s_axi_bvalid);
}
