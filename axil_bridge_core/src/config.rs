use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};
use thiserror::Error;

use crate::bits;

/// Which side of the bridge a width parameter belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum Side {
    #[strum(to_string = "burst side")]
    Burst,
    #[strum(to_string = "lite side")]
    Lite,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("address width {0} must be between 1 and 64 bits")]
    AddrWidth(u32),
    #[error("id width {0} must be at most 32 bits")]
    IdWidth(u32),
    #[error("{0} data width must be non-zero")]
    ZeroDataWidth(Side),
    #[error("{side} strobe width {strb_width} must be between 1 and 128")]
    StrbWidth { side: Side, strb_width: u32 },
    #[error("{side} data width {data_width} is not evenly divisible by strobe width {strb_width}")]
    NotDivisible {
        side: Side,
        data_width: u32,
        strb_width: u32,
    },
    #[error("{side} word count {lanes} must be a power of two")]
    LaneCountNotPowerOfTwo { side: Side, lanes: u32 },
    #[error("word size mismatch: {axi} bits per word on the burst side, {axil} on the lite side")]
    LaneSizeMismatch { axi: u32, axil: u32 },
}

/// Elaboration-time parameters for a bridge pair.
///
/// Strobe widths default to one strobe bit per byte of data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub addr_width: u32,
    pub axi_data_width: u32,
    pub axi_strb_width: Option<u32>,
    pub axi_id_width: u32,
    pub axil_data_width: u32,
    pub axil_strb_width: Option<u32>,
    /// Allow full-width bursts to be repacked into wide lite transfers
    pub convert_burst: bool,
    /// Also repack bursts narrower than the burst-side bus
    pub convert_narrow_burst: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            addr_width: 32,
            axi_data_width: 32,
            axi_strb_width: None,
            axi_id_width: 8,
            axil_data_width: 32,
            axil_strb_width: None,
            convert_burst: true,
            convert_narrow_burst: false,
        }
    }
}

impl BridgeConfig {
    pub fn new(axi_data_width: u32, axil_data_width: u32) -> Self {
        Self {
            axi_data_width,
            axil_data_width,
            ..Default::default()
        }
    }

    pub fn with_addr_width(self, addr_width: u32) -> Self {
        Self { addr_width, ..self }
    }

    pub fn with_id_width(self, axi_id_width: u32) -> Self {
        Self {
            axi_id_width,
            ..self
        }
    }

    pub fn with_strb_widths(self, axi: u32, axil: u32) -> Self {
        Self {
            axi_strb_width: Some(axi),
            axil_strb_width: Some(axil),
            ..self
        }
    }

    pub fn with_repack(self, convert_burst: bool, convert_narrow_burst: bool) -> Self {
        Self {
            convert_burst,
            convert_narrow_burst,
            ..self
        }
    }

    pub fn axi_strb_width(&self) -> u32 {
        self.axi_strb_width.unwrap_or(self.axi_data_width / 8)
    }

    pub fn axil_strb_width(&self) -> u32 {
        self.axil_strb_width.unwrap_or(self.axil_data_width / 8)
    }

    /// Check every width constraint and resolve the derived sizing.
    pub fn validate(&self) -> Result<Geometry, ConfigError> {
        if !(1..=64).contains(&self.addr_width) {
            return Err(ConfigError::AddrWidth(self.addr_width));
        }
        if self.axi_id_width > 32 {
            return Err(ConfigError::IdWidth(self.axi_id_width));
        }

        let axi_lane_bits = check_side(Side::Burst, self.axi_data_width, self.axi_strb_width())?;
        let axil_lane_bits =
            check_side(Side::Lite, self.axil_data_width, self.axil_strb_width())?;
        if axi_lane_bits != axil_lane_bits {
            return Err(ConfigError::LaneSizeMismatch {
                axi: axi_lane_bits,
                axil: axil_lane_bits,
            });
        }

        let axi_lanes = self.axi_strb_width() as usize;
        let axil_lanes = self.axil_strb_width() as usize;
        let (mode, segment_count, segment_lanes) = if axi_lanes == axil_lanes {
            (WidthMode::Direct, 1, axi_lanes)
        } else if axil_lanes > axi_lanes {
            (WidthMode::Expand, axil_lanes / axi_lanes, axi_lanes)
        } else {
            (WidthMode::Merge, axi_lanes / axil_lanes, axil_lanes)
        };

        Ok(Geometry {
            addr_width: self.addr_width,
            id_width: self.axi_id_width,
            lane_bits: axi_lane_bits as usize,
            axi_lanes,
            axil_lanes,
            axi_size: axi_lanes.trailing_zeros() as u8,
            axil_size: axil_lanes.trailing_zeros() as u8,
            mode,
            segment_count,
            segment_lanes,
            convert_burst: self.convert_burst,
            convert_narrow_burst: self.convert_narrow_burst,
        })
    }
}

/// Returns the word (lane) size in bits for one side.
fn check_side(side: Side, data_width: u32, strb_width: u32) -> Result<u32, ConfigError> {
    if data_width == 0 {
        return Err(ConfigError::ZeroDataWidth(side));
    }
    if !(1..=128).contains(&strb_width) {
        return Err(ConfigError::StrbWidth { side, strb_width });
    }
    if data_width % strb_width != 0 {
        return Err(ConfigError::NotDivisible {
            side,
            data_width,
            strb_width,
        });
    }
    if !strb_width.is_power_of_two() {
        return Err(ConfigError::LaneCountNotPowerOfTwo {
            side,
            lanes: strb_width,
        });
    }
    Ok(data_width / strb_width)
}

/// How the lite bus compares to the burst bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumIter)]
pub enum WidthMode {
    /// Same width, every beat maps to one lite transfer
    Direct,
    /// Lite bus is wider
    Expand,
    /// Lite bus is narrower
    Merge,
}

/// Sizing derived once from a validated [`BridgeConfig`].
///
/// Addresses count lanes ("bytes" when lanes are 8 bits wide). A segment is
/// one narrow-side word inside a wide-side word.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Geometry {
    pub addr_width: u32,
    pub id_width: u32,
    pub lane_bits: usize,
    pub axi_lanes: usize,
    pub axil_lanes: usize,
    pub axi_size: u8,
    pub axil_size: u8,
    pub mode: WidthMode,
    pub segment_count: usize,
    pub segment_lanes: usize,
    pub convert_burst: bool,
    pub convert_narrow_burst: bool,
}

impl Geometry {
    pub fn addr_mask(&self) -> u64 {
        if self.addr_width >= 64 {
            u64::MAX
        } else {
            (1u64 << self.addr_width) - 1
        }
    }

    pub fn id_mask(&self) -> u32 {
        if self.id_width >= 32 {
            u32::MAX
        } else {
            (1u32 << self.id_width) - 1
        }
    }

    pub fn axi_data_width(&self) -> usize {
        self.axi_lanes * self.lane_bits
    }

    pub fn axil_data_width(&self) -> usize {
        self.axil_lanes * self.lane_bits
    }

    pub fn segment_bits(&self) -> usize {
        self.segment_lanes * self.lane_bits
    }

    /// Size of the narrower bus (log2 lanes).
    pub fn narrow_size(&self) -> u8 {
        self.axi_size.min(self.axil_size)
    }

    /// Segment of the wide word addressed by `addr`: the address bits lying
    /// between the narrow and the wide bus size.
    pub fn segment_index(&self, addr: u64) -> usize {
        bits!(addr, self.narrow_size(), self.segment_count.trailing_zeros()) as usize
    }

    /// Whether a request may be served from wide lite transfers instead of
    /// one lite transfer per beat. Needs the modifiable cache bit.
    pub fn wants_repack(&self, size: u8, cache: u8) -> bool {
        self.mode == WidthMode::Expand
            && self.convert_burst
            && cache & 0b0010 != 0
            && (self.convert_narrow_burst || size == self.axi_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_default_is_direct() {
        let geometry = BridgeConfig::default().validate().unwrap();
        assert_eq!(geometry.mode, WidthMode::Direct);
        assert_eq!(geometry.segment_count, 1);
        assert_eq!(geometry.axi_size, 2);
        assert_eq!(geometry.lane_bits, 8);
        assert_eq!(geometry.addr_mask(), 0xFFFF_FFFF);
        assert_eq!(geometry.id_mask(), 0xFF);
    }

    #[test]
    fn test_expand_geometry() {
        let geometry = BridgeConfig::new(32, 128).validate().unwrap();
        assert_eq!(geometry.mode, WidthMode::Expand);
        assert_eq!(geometry.segment_count, 4);
        assert_eq!(geometry.segment_bits(), 32);
        assert_eq!(geometry.segment_index(0x0), 0);
        assert_eq!(geometry.segment_index(0x4), 1);
        assert_eq!(geometry.segment_index(0xE), 3);
        assert_eq!(geometry.segment_index(0x10), 0);
    }

    #[test]
    fn test_merge_geometry() {
        let geometry = BridgeConfig::new(64, 16).validate().unwrap();
        assert_eq!(geometry.mode, WidthMode::Merge);
        assert_eq!(geometry.segment_count, 4);
        assert_eq!(geometry.segment_lanes, 2);
        assert_eq!(geometry.segment_index(0x2), 1);
        assert_eq!(geometry.segment_index(0x7), 3);
        assert_eq!(geometry.narrow_size(), 1);
    }

    #[test]
    fn test_repack_policy() {
        let geometry = BridgeConfig::new(32, 64).validate().unwrap();
        assert!(geometry.wants_repack(2, 0b0010));
        assert!(!geometry.wants_repack(2, 0b0001));
        // narrow bursts only with the narrow flag
        assert!(!geometry.wants_repack(1, 0b0011));

        let geometry = BridgeConfig::new(32, 64)
            .with_repack(true, true)
            .validate()
            .unwrap();
        assert!(geometry.wants_repack(1, 0b0011));

        let geometry = BridgeConfig::new(32, 64)
            .with_repack(false, true)
            .validate()
            .unwrap();
        assert!(!geometry.wants_repack(2, 0b1111));

        // never for the other modes
        let geometry = BridgeConfig::new(64, 32).validate().unwrap();
        assert!(!geometry.wants_repack(3, 0b1111));
    }

    #[test]
    fn test_config_errors() {
        assert_eq!(
            BridgeConfig::default().with_addr_width(0).validate(),
            Err(ConfigError::AddrWidth(0))
        );
        assert_eq!(
            BridgeConfig::default().with_id_width(33).validate(),
            Err(ConfigError::IdWidth(33))
        );
        assert_eq!(
            BridgeConfig::new(36, 32).with_strb_widths(8, 4).validate(),
            Err(ConfigError::NotDivisible {
                side: Side::Burst,
                data_width: 36,
                strb_width: 8
            })
        );
        assert_eq!(
            BridgeConfig::new(24, 32).validate(),
            Err(ConfigError::LaneCountNotPowerOfTwo {
                side: Side::Burst,
                lanes: 3
            })
        );
        assert_eq!(
            BridgeConfig::new(32, 32).with_strb_widths(4, 2).validate(),
            Err(ConfigError::LaneSizeMismatch { axi: 8, axil: 16 })
        );
        assert_eq!(
            BridgeConfig::new(32, 0).validate(),
            Err(ConfigError::ZeroDataWidth(Side::Lite))
        );
        assert_eq!(
            BridgeConfig::new(32, 4).validate(),
            Err(ConfigError::StrbWidth {
                side: Side::Lite,
                strb_width: 0
            })
        );
    }

    #[test]
    fn test_error_messages() {
        let err = BridgeConfig::new(32, 32)
            .with_strb_widths(4, 2)
            .validate()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "word size mismatch: 8 bits per word on the burst side, 16 on the lite side"
        );

        let err = BridgeConfig::new(24, 32).validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "burst side word count 3 must be a power of two"
        );
        // odd powers of two are fine too
        assert!(BridgeConfig::new(16, 64).validate().is_ok());
    }

    #[test]
    fn test_non_byte_lanes() {
        // 9 bit words are fine as long as both sides agree
        let geometry = BridgeConfig::new(36, 72)
            .with_strb_widths(4, 8)
            .validate()
            .unwrap();
        assert_eq!(geometry.lane_bits, 9);
        assert_eq!(geometry.mode, WidthMode::Expand);
        assert_eq!(geometry.segment_bits(), 36);
    }

    #[test]
    fn test_config_from_json() {
        let config: BridgeConfig =
            serde_json::from_str(r#"{ "axi_data_width": 64, "axil_data_width": 32 }"#).unwrap();
        assert_eq!(config.addr_width, 32);
        assert_eq!(config.axi_strb_width(), 8);
        assert!(config.convert_burst);
        assert_eq!(config.validate().unwrap().mode, WidthMode::Merge);
    }

    #[test]
    fn test_every_mode_reachable() {
        let configs = [
            BridgeConfig::new(32, 32),
            BridgeConfig::new(32, 64),
            BridgeConfig::new(64, 32),
        ];
        let modes: Vec<_> = configs
            .iter()
            .map(|c| c.validate().unwrap().mode)
            .collect();
        assert_eq!(modes, WidthMode::iter().collect::<Vec<_>>());
    }
}
