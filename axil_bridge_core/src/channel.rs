//! Payloads carried on the bus channels, one struct per channel.
//!
//! Valid and ready lines are kept next to these in the bridge port bundles so
//! a payload can be held while its valid is low.

use ibig::UBig;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, FromRepr};

/// Response code returned on R and B.
#[repr(u8)]
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Display, EnumIter, FromRepr, Serialize, Deserialize,
)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Resp {
    #[default]
    Okay = 0,
    ExOkay = 1,
    SlvErr = 2,
    DecErr = 3,
}

impl Resp {
    pub fn bits(self) -> u8 {
        self as u8
    }

    pub fn from_bits(bits: u8) -> Self {
        Self::from_repr(bits & 0b11).unwrap_or_default()
    }

    pub fn is_error(self) -> bool {
        matches!(self, Resp::SlvErr | Resp::DecErr)
    }

    /// Fold one more response into an aggregate.
    ///
    /// The first response seeds the aggregate. An error replaces a success,
    /// and once an error is recorded later responses never replace it.
    pub fn aggregate(seen: Option<Resp>, new: Resp) -> Resp {
        match seen {
            None => new,
            Some(prev) if !prev.is_error() && new.is_error() => new,
            Some(prev) => prev,
        }
    }
}

/// AxBURST encoding. Every kind is addressed as INCR by the bridges.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Display, EnumIter, FromRepr, Serialize, Deserialize)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum BurstType {
    Fixed = 0,
    #[default]
    Incr = 1,
    Wrap = 2,
}

/// s_axi_ar* / s_axi_aw*
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AxiAddr {
    pub id: u32,
    pub addr: u64,
    pub len: u8,  // beats - 1
    pub size: u8, // log2 lanes per beat
    pub burst: BurstType,
    pub lock: bool,
    pub cache: u8,
    pub prot: u8,
}

/// s_axi_r*
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AxiR {
    pub id: u32,
    pub data: UBig,
    pub resp: Resp,
    pub last: bool,
}

impl Default for AxiR {
    fn default() -> Self {
        Self {
            id: 0,
            data: UBig::from(0u8),
            resp: Resp::Okay,
            last: false,
        }
    }
}

/// s_axi_w*
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AxiW {
    pub data: UBig,
    pub strb: u128,
    pub last: bool,
}

impl Default for AxiW {
    fn default() -> Self {
        Self {
            data: UBig::from(0u8),
            strb: 0,
            last: false,
        }
    }
}

/// s_axi_b*
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AxiB {
    pub id: u32,
    pub resp: Resp,
}

/// m_axil_ar* / m_axil_aw*
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AxilAddr {
    pub addr: u64,
    pub prot: u8,
}

/// m_axil_r*
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AxilR {
    pub data: UBig,
    pub resp: Resp,
}

impl Default for AxilR {
    fn default() -> Self {
        Self {
            data: UBig::from(0u8),
            resp: Resp::Okay,
        }
    }
}

/// m_axil_w*
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AxilW {
    pub data: UBig,
    pub strb: u128,
}

impl Default for AxilW {
    fn default() -> Self {
        Self {
            data: UBig::from(0u8),
            strb: 0,
        }
    }
}

/// m_axil_b*
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AxilB {
    pub resp: Resp,
}
