use clap::Args;
use color_eyre::eyre::{Result, WrapErr, eyre};

use axil_bridge_core::{
    BridgeConfig,
    channel::Resp,
    sim::{Testbench, backpressure::StallPattern, master::Burst, memory::ErrorRegion},
};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs::OpenOptions,
    io::prelude::*,
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

/// One bridge configuration and the bursts to run through it.
#[derive(Debug, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct Scenario {
    pub config: BridgeConfig,
    pub master_stalls: StallPattern,
    pub memory_stalls: StallPattern,
    /// Initial memory contents, keyed by start address
    pub memory: BTreeMap<u64, HexBytes>,
    pub error_regions: Vec<ErrorRegion>,
    pub operations: Vec<Operation>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    Write {
        burst: Burst,
        data: HexBytes,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        resp: Option<Resp>,
    },
    Read {
        burst: Burst,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<HexBytes>,
        /// Expected code of every beat, in order
        #[serde(default, skip_serializing_if = "Option::is_none")]
        resps: Option<Vec<Resp>>,
    },
}

#[derive(Serialize, Debug, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct HexBytes {
    #[serde(with = "hex::serde")]
    pub bytes: Vec<u8>,
}

impl From<Vec<u8>> for HexBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

/// What an operation actually produced, written out when it disagrees
/// with the scenario.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct OperationDiff {
    pub index: usize,
    pub expected: Operation,
    pub actual: Operation,
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct ScenarioDiff {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub operations: Vec<OperationDiff>,
}

impl ScenarioDiff {
    pub fn passed(&self) -> bool {
        self.error.is_none() && self.operations.is_empty()
    }
}

#[derive(Args, Debug)]
#[command(about)]
/// Create scaffolding folder for a new set of scenarios
pub struct NewArgs {
    /// Name of the new folder containing the scaffolding
    name: String,
}

///
/// Runs every scenario in a folder, writing a diff for each one that fails
///
#[derive(Args, Debug)]
#[command(about)]
pub struct TestArgs {
    /// Folder containing the scenario files
    #[arg(long, default_value_t = String::from("scenarios"))]
    scenarios: String,

    /// Maximum number of clock cycles to spend on one operation
    #[arg(short, long, default_value_t = 1_000_000)]
    timeout: u64,
}

const EXAMPLE_JSON: &str = r##"{
    "config": {
        "axi_data_width": 32,
        "axil_data_width": 64,
        "convert_burst": true
    },
    "master_stalls": { "kind": "never" },
    "memory_stalls": { "kind": "random", "percent": 30, "seed": 7 },
    "memory": {
        "256": "11000000220000003300000044000000"
    },
    "error_regions": [
        { "start": 4096, "end": 4112, "resp": "SLVERR" }
    ],
    "operations": [
        {
            "op": "read",
            "burst": { "id": 1, "addr": 256, "len": 3, "size": 2, "cache": 2 },
            "data": "11000000220000003300000044000000",
            "resps": ["OKAY", "OKAY", "OKAY", "OKAY"]
        },
        {
            "op": "write",
            "burst": { "id": 2, "addr": 512, "len": 1, "size": 2 },
            "data": "0102030405060708",
            "resp": "OKAY"
        },
        {
            "op": "write",
            "burst": { "id": 3, "addr": 4096, "len": 0, "size": 2 },
            "data": "deadbeef",
            "resp": "SLVERR"
        }
    ]
}
"##;

pub fn new_project(args: NewArgs) -> Result<()> {
    // create the new project folder relative to the current directory
    let project_path = Path::new(&args.name);
    if project_path.exists() {
        println!("Folder already exists");
        return Ok(());
    }
    let scenarios_path = project_path.join("scenarios");
    std::fs::create_dir_all(&scenarios_path).wrap_err("Failed to create scenarios directory")?;

    std::fs::write(scenarios_path.join("example.json"), EXAMPLE_JSON)
        .wrap_err("Failed to create example scenario")?;
    info!(path = %scenarios_path.display(), "created scenario folder");
    Ok(())
}

/// Run every operation of a scenario and collect the ones that did not go
/// as written.
pub fn run_scenario(scenario: &Scenario, timeout: u64) -> Result<(ScenarioDiff, u64)> {
    let mut bench = Testbench::new(&scenario.config)?
        .with_stalls(scenario.master_stalls, scenario.memory_stalls);
    for (&start, contents) in &scenario.memory {
        for (offset, &byte) in contents.bytes.iter().enumerate() {
            bench.memory.set(start.wrapping_add(offset as u64), byte);
        }
    }
    for region in &scenario.error_regions {
        bench.memory.add_error_region(*region);
    }

    let lanes = bench.geometry().axi_lanes;
    let mut diff = ScenarioDiff::default();
    let mut cycles = 0;

    for (index, expected) in scenario.operations.iter().enumerate() {
        let actual = match expected {
            Operation::Write { burst, data, resp } => {
                bench.queue_write(*burst, &data.bytes)?;
                cycles += bench.run(timeout)?;
                let completion = bench
                    .master
                    .pop_write()
                    .ok_or_else(|| eyre!("write {index} never completed"))?;
                Operation::Write {
                    burst: *burst,
                    data: data.clone(),
                    resp: resp.map(|_| completion.response.resp),
                }
            }
            Operation::Read { burst, data, resps } => {
                bench.queue_read(*burst)?;
                cycles += bench.run(timeout)?;
                let completion = bench
                    .master
                    .pop_read()
                    .ok_or_else(|| eyre!("read {index} never completed"))?;
                Operation::Read {
                    burst: *burst,
                    data: data
                        .as_ref()
                        .map(|_| burst.unpack(lanes, &completion.beats).into()),
                    resps: resps
                        .as_ref()
                        .map(|_| completion.beats.iter().map(|beat| beat.resp).collect()),
                }
            }
        };

        if actual != *expected {
            debug!(index, "operation mismatch");
            diff.operations.push(OperationDiff {
                index,
                expected: expected.clone(),
                actual,
            });
        }
    }
    Ok((diff, cycles))
}

#[derive(Debug, Default)]
pub struct TestInfo {
    scenario_files: Vec<(String, PathBuf)>,
    pub position: usize,
    output_path: PathBuf,
    timeout: u64,
    pub num_scenarios: usize,
    pub passed: usize,
}

impl TestInfo {
    pub fn prepare_to_test(&mut self, args: TestArgs) -> Result<()> {
        self.timeout = args.timeout;
        self.position = 0;

        // get (name, path) pairs from the scenarios folder
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&args.scenarios)
            .wrap_err_with(|| format!("Failed to read scenarios directory {}", args.scenarios))?
        {
            let path = entry?.path();
            let is_json = path.extension().is_some_and(|ext| ext == "json");
            if path.is_file() && is_json {
                if let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) {
                    files.push((name.to_string(), path.clone()));
                }
            }
        }
        files.sort();
        self.scenario_files = files;
        self.num_scenarios = self.scenario_files.len();

        // check that output dir exists (or create it)
        self.output_path = Path::new(&args.scenarios)
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("test_output");
        std::fs::create_dir_all(&self.output_path)
            .wrap_err("Failed to create test output directory")?;

        // write header to .csv file
        std::fs::write(
            self.output_path.join("testresults.csv"),
            "scenario,operations,passed,cycles\n",
        )
        .wrap_err("Failed to create test output file")?;
        Ok(())
    }

    /// Runs the next scenario and appends its result to the .csv file.
    /// Returns false once every scenario has run.
    pub fn test_scenario(&mut self) -> Result<bool> {
        let Some((name, path)) = self.scenario_files.get(self.position) else {
            return Ok(false);
        };
        self.position += 1;

        let file = std::fs::File::open(path)
            .wrap_err_with(|| format!("Failed to open scenario {}", path.display()))?;
        let scenario: Scenario = serde_json::from_reader(file)
            .wrap_err_with(|| format!("Failed to read JSON in {}, improperly formatted", name))?;

        let (diff, cycles) = match run_scenario(&scenario, self.timeout) {
            Ok(result) => result,
            Err(err) => {
                warn!(scenario = %name, error = %err, "scenario aborted");
                let diff = ScenarioDiff {
                    error: Some(format!("{err:#}")),
                    ..Default::default()
                };
                (diff, 0)
            }
        };

        let diff_path = self.output_path.join(format!("{name}.json"));
        if diff.passed() {
            self.passed += 1;
            let _ = std::fs::remove_file(&diff_path);
        } else {
            let json_string = serde_json::to_string_pretty(&diff)?;
            std::fs::write(&diff_path, json_string).wrap_err("Failed to write scenario diff")?;
        }
        info!(scenario = %name, passed = diff.passed(), cycles, "scenario finished");

        // append results of the scenario to .csv file.
        let mut file = OpenOptions::new()
            .append(true)
            .open(self.output_path.join("testresults.csv"))?;
        writeln!(
            file,
            "{},{},{},{}",
            name,
            scenario.operations.len(),
            diff.passed(),
            cycles
        )?;

        Ok(self.position < self.scenario_files.len())
    }

    pub fn finish_up(&self) -> String {
        format!(
            "{}/{} scenarios passed. Diffs for failed scenarios can be found in: {}",
            self.passed,
            self.num_scenarios,
            self.output_path.display()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_scenario_passes() {
        let scenario: Scenario = serde_json::from_str(EXAMPLE_JSON).unwrap();
        let (diff, cycles) = run_scenario(&scenario, 100_000).unwrap();
        assert!(diff.passed(), "{diff:?}");
        assert!(cycles > 0);
    }

    #[test]
    fn test_mismatch_is_reported() {
        let mut scenario: Scenario = serde_json::from_str(EXAMPLE_JSON).unwrap();
        if let Operation::Write { resp, .. } = &mut scenario.operations[2] {
            *resp = Some(Resp::Okay);
        }
        let (diff, _) = run_scenario(&scenario, 100_000).unwrap();
        assert_eq!(diff.operations.len(), 1);
        assert_eq!(diff.operations[0].index, 2);
        assert!(matches!(
            diff.operations[0].actual,
            Operation::Write {
                resp: Some(Resp::SlvErr),
                ..
            }
        ));
    }

    #[test]
    fn test_bad_config_is_an_error() {
        let scenario: Scenario =
            serde_json::from_str(r#"{ "config": { "axi_data_width": 24 } }"#).unwrap();
        assert!(run_scenario(&scenario, 10).is_err());
    }
}
