mod tester;

use clap::{ArgAction, Args, Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};

use axil_bridge_core::BridgeConfig;
use tester::{NewArgs, TestArgs, TestInfo, new_project};
use tracing::Level;

/// Run AXI4 to AXI4-Lite bridge scenarios against a simulated memory
#[derive(Parser, Debug)]
#[command(version, about)]
struct Arguments {
    #[command(subcommand)]
    pub command: Command,

    /// More logging, repeat for more detail
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    New(NewArgs),
    Test(TestArgs),
    Geometry(GeometryArgs),
}

#[derive(Args, Debug)]
#[command(about)]
/// Print the sizing derived from a bridge configuration
struct GeometryArgs {
    /// JSON file holding a bridge configuration
    config: String,
}

fn show_geometry(args: GeometryArgs) -> Result<()> {
    let file = std::fs::File::open(&args.config)
        .wrap_err_with(|| format!("Failed to open {}", args.config))?;
    let config: BridgeConfig = serde_json::from_reader(file)?;
    let geometry = config.validate()?;

    println!("mode:           {}", geometry.mode);
    println!(
        "burst side:     {} bits, {} lanes, size {}",
        geometry.axi_data_width(),
        geometry.axi_lanes,
        geometry.axi_size
    );
    println!(
        "lite side:      {} bits, {} lanes, size {}",
        geometry.axil_data_width(),
        geometry.axil_lanes,
        geometry.axil_size
    );
    println!("lane:           {} bits", geometry.lane_bits);
    println!(
        "segments:       {} of {} lanes",
        geometry.segment_count, geometry.segment_lanes
    );
    println!("address mask:   {:#x}", geometry.addr_mask());
    println!(
        "repack:         {} (narrow {})",
        geometry.convert_burst, geometry.convert_narrow_burst
    );
    Ok(())
}

fn run_tests(args: TestArgs) -> Result<()> {
    let mut info = TestInfo::default();
    info.prepare_to_test(args)?;
    if info.num_scenarios == 0 {
        println!("No scenarios found");
        return Ok(());
    }
    while info.test_scenario()? {}
    println!("{}", info.finish_up());
    Ok(())
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Arguments::parse();

    let level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::New(args) => new_project(args),
        Command::Test(args) => run_tests(args),
        Command::Geometry(args) => show_geometry(args),
    }
}
