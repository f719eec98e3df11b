//! Cycle-level model of a bridge from a burst-capable bus (AXI4) to its
//! single-beat variant (AXI4-Lite), with data width conversion in both
//! directions.

pub mod bridge;
pub mod channel;
pub mod config;
pub mod sim;
pub mod utils;

pub use bridge::{
    read::{ReadBridge, ReadInputs, ReadPorts},
    write::{WriteBridge, WriteInputs, WritePorts},
};
pub use config::{BridgeConfig, ConfigError, Geometry, WidthMode};
