use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Supported venue, identified by the MIC suffix of a [`Symbol`](crate::symbol::Symbol).
///
/// eg/ `600036.SH` trades on [`Exchange::Shanghai`].
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, Serialize)]
pub enum Exchange {
    #[serde(rename = "SH")]
    Shanghai,
    #[serde(rename = "SZ")]
    Shenzhen,
    #[serde(rename = "HK")]
    HongKong,
}

impl Exchange {
    /// MIC suffix used in the canonical `<code>.<MIC>` symbol format.
    pub fn mic(&self) -> &'static str {
        match self {
            Exchange::Shanghai => "SH",
            Exchange::Shenzhen => "SZ",
            Exchange::HongKong => "HK",
        }
    }

    /// Parse a MIC suffix, returning `None` for unknown venues.
    pub fn from_mic(mic: &str) -> Option<Self> {
        match mic {
            "SH" => Some(Exchange::Shanghai),
            "SZ" => Some(Exchange::Shenzhen),
            "HK" => Some(Exchange::HongKong),
            _ => None,
        }
    }

    /// Mainland venues trade under A-share rules (T+1, daily price limits).
    pub fn is_mainland(&self) -> bool {
        matches!(self, Exchange::Shanghai | Exchange::Shenzhen)
    }
}

impl Display for Exchange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.mic())
    }
}
