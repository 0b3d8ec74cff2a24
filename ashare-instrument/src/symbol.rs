use crate::{board::Board, exchange::Exchange};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

/// Instrument identifier in the canonical `<code>.<MIC>` format.
///
/// Mainland codes are exactly six digits (`600036.SH`, `000001.SZ`); Hong Kong codes are one to
/// five digits (`700.HK`). Validation is strict - malformed input is rejected, never coerced.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct Symbol {
    code: SmolStr,
    exchange: Exchange,
}

impl Symbol {
    /// Parse and validate a `<code>.<MIC>` identifier.
    pub fn new<S: AsRef<str>>(input: S) -> Result<Self, SymbolError> {
        input.as_ref().parse()
    }

    /// Numeric code portion, without the MIC suffix.
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn exchange(&self) -> Exchange {
        self.exchange
    }

    /// Derive the listing [`Board`] from the code prefix alone.
    ///
    /// Use [`Self::board_with_name`] when the instrument name is available, since some ETFs are
    /// only identifiable by name.
    pub fn board(&self) -> Board {
        Board::derive(self, None)
    }

    /// Derive the listing [`Board`], additionally treating instruments whose name contains
    /// "ETF" as funds.
    pub fn board_with_name(&self, name: &str) -> Board {
        Board::derive(self, Some(name))
    }
}

impl FromStr for Symbol {
    type Err = SymbolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (code, mic) = s
            .split_once('.')
            .ok_or_else(|| SymbolError::Malformed(s.to_owned()))?;

        let exchange =
            Exchange::from_mic(mic).ok_or_else(|| SymbolError::UnknownExchange(mic.to_owned()))?;

        let digits_ok = !code.is_empty() && code.bytes().all(|byte| byte.is_ascii_digit());
        let length_ok = match exchange {
            Exchange::Shanghai | Exchange::Shenzhen => code.len() == 6,
            Exchange::HongKong => (1..=5).contains(&code.len()),
        };

        if !digits_ok || !length_ok {
            return Err(SymbolError::Malformed(s.to_owned()));
        }

        Ok(Self {
            code: SmolStr::new(code),
            exchange,
        })
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.code, self.exchange)
    }
}

impl Serialize for Symbol {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Symbol {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// All possible errors when parsing a [`Symbol`].
#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum SymbolError {
    #[error("malformed symbol: {0}")]
    Malformed(String),

    #[error("unknown exchange suffix: {0}")]
    UnknownExchange(String),
}
