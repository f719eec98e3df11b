use std::collections::BTreeMap;

use super::{Testbench, backpressure::StallPattern, master::Burst};
use crate::{channel::Resp, config::BridgeConfig};

fn gen_config<R: rand::Rng>(rng: &mut R) -> BridgeConfig {
    let widths = [8, 16, 32, 64, 128, 256];
    let axi = widths[rng.random_range(0..widths.len())];
    let axil = widths[rng.random_range(0..widths.len())];
    BridgeConfig::new(axi, axil).with_repack(rng.random_bool(0.8), rng.random_bool(0.5))
}

fn gen_stalls<R: rand::Rng>(rng: &mut R) -> StallPattern {
    match rng.random_range(0..3) {
        0 => StallPattern::Never,
        1 => StallPattern::Periodic {
            period: rng.random_range(2..6),
            stalled: 1,
        },
        _ => StallPattern::Random {
            percent: rng.random_range(10..60),
            seed: rng.random(),
        },
    }
}

fn gen_burst<R: rand::Rng>(rng: &mut R, max_size: u8) -> Burst {
    Burst::new(
        rng.random_range(0..0x400),
        rng.random_range(0..16),
        rng.random_range(0..=max_size),
    )
    .with_id(rng.random_range(0..256))
    .with_cache(rng.random_range(0..16))
}

#[test]
fn test_fuzz() {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::fmt::Write;

    let seed = [40u8; 32];
    let mut rng = StdRng::from_seed(seed);

    let mut errors_panic = "".to_string();

    for i in 0..40 {
        let config = gen_config(&mut rng);
        let master = gen_stalls(&mut rng);
        let memory = gen_stalls(&mut rng);
        let mut bench = Testbench::new(&config)
            .unwrap()
            .with_stalls(master, memory);
        let max_size = bench.geometry().axi_size;
        let mut shadow: BTreeMap<u64, u8> = BTreeMap::new();

        let mut current_error_summary = String::new();
        writeln!(
            current_error_summary,
            "Iteration {}: {:?}, master {:?}, memory {:?}",
            i, config, master, memory
        )
        .unwrap();
        let mut error_detected = false;

        for _ in 0..12 {
            let burst = gen_burst(&mut rng, max_size);

            if rng.random_bool(0.5) {
                let bytes: Vec<u8> = (0..burst.byte_len()).map(|_| rng.random()).collect();
                match bench.write(burst, &bytes) {
                    Ok(b) if b.resp == Resp::Okay && b.id == burst.id => {
                        for (offset, &byte) in bytes.iter().enumerate() {
                            shadow.insert(burst.addr + offset as u64, byte);
                        }
                    }
                    other => {
                        writeln!(current_error_summary, "write {:?} -> {:?}", burst, other)
                            .unwrap();
                        error_detected = true;
                        break;
                    }
                }
            } else {
                let expected: Vec<u8> = (0..burst.byte_len() as u64)
                    .map(|offset| *shadow.get(&(burst.addr + offset)).unwrap_or(&0))
                    .collect();
                match bench.read(burst) {
                    Ok(read) if read.data == expected => {}
                    other => {
                        writeln!(
                            current_error_summary,
                            "read {:?} expected {:02x?} got {:?}",
                            burst, expected, other
                        )
                        .unwrap();
                        error_detected = true;
                        break;
                    }
                }
            }
        }

        if error_detected {
            errors_panic += &current_error_summary;
        }
    }

    if !errors_panic.is_empty() {
        panic!("Fuzz test failed:\n{}", errors_panic);
    }
}
