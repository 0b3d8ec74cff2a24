use crate::{exchange::Exchange, symbol::Symbol};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Listing board of an instrument, derived from its code prefix (and optionally its name).
///
/// The board determines the daily price-limit band:
///
/// | Board | Daily price limit |
/// |---|---|
/// | SH main (`60*`) | ±10% |
/// | SH STAR (`688`) | ±20% |
/// | SZ main (`000`/`001`) | ±10% |
/// | SZ GEM (`300`) | ±20% |
/// | ETF (`15*`/`51*`) | ±10% |
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, Serialize)]
pub enum Board {
    ShMain,
    Star,
    SzMain,
    Gem,
    Etf,
    HkMain,
    Other,
}

impl Board {
    /// Classify a [`Symbol`], optionally consulting the instrument name for ETF detection.
    pub fn derive(symbol: &Symbol, name: Option<&str>) -> Self {
        let code = symbol.code();

        match symbol.exchange() {
            Exchange::HongKong => Board::HkMain,
            exchange => {
                if code.starts_with("15") || code.starts_with("51") {
                    return Board::Etf;
                }
                if name.is_some_and(|name| name.to_uppercase().contains("ETF")) {
                    return Board::Etf;
                }

                match exchange {
                    Exchange::Shanghai if code.starts_with("688") => Board::Star,
                    Exchange::Shanghai if code.starts_with('6') => Board::ShMain,
                    Exchange::Shenzhen if code.starts_with("300") => Board::Gem,
                    Exchange::Shenzhen
                        if code.starts_with("000") || code.starts_with("001") =>
                    {
                        Board::SzMain
                    }
                    _ => Board::Other,
                }
            }
        }
    }
}

impl Display for Board {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Board::ShMain => "sh_main",
            Board::Star => "star",
            Board::SzMain => "sz_main",
            Board::Gem => "gem",
            Board::Etf => "etf",
            Board::HkMain => "hk_main",
            Board::Other => "other",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(input: &str) -> Board {
        Symbol::new(input).unwrap().board()
    }

    #[test]
    fn derive_board_from_code_prefix() {
        assert_eq!(board("600036.SH"), Board::ShMain);
        assert_eq!(board("601318.SH"), Board::ShMain);
        assert_eq!(board("688001.SH"), Board::Star);
        assert_eq!(board("000001.SZ"), Board::SzMain);
        assert_eq!(board("001979.SZ"), Board::SzMain);
        assert_eq!(board("300750.SZ"), Board::Gem);
        assert_eq!(board("510300.SH"), Board::Etf);
        assert_eq!(board("159915.SZ"), Board::Etf);
        assert_eq!(board("700.HK"), Board::HkMain);
    }

    #[test]
    fn derive_etf_from_name() {
        let symbol = Symbol::new("513090.SH").unwrap();
        assert_eq!(symbol.board(), Board::Etf);

        // Name-based detection covers codes outside the 15/51 prefixes.
        let symbol = Symbol::new("560010.SH").unwrap();
        assert_eq!(symbol.board_with_name("中证1000ETF"), Board::Etf);
    }
}
