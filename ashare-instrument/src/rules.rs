use crate::board::Board;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Exchange microstructure rules for one listing [`Board`].
#[derive(Copy, Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
pub struct MarketRules {
    /// Daily price-limit band around `pre_close`. `None` for venues without one (Hong Kong).
    pub price_limit_pct: Option<Decimal>,
    /// Minimum tradable unit in shares.
    pub board_lot: i64,
    /// Minimum price increment.
    pub tick: Decimal,
}

impl MarketRules {
    const TICK: Decimal = Decimal::from_parts(1, 0, 0, false, 2); // 0.01
    const LIMIT_MAIN: Decimal = Decimal::from_parts(10, 0, 0, false, 2); // 0.10
    const LIMIT_GROWTH: Decimal = Decimal::from_parts(20, 0, 0, false, 2); // 0.20

    /// Rules for the given [`Board`].
    pub fn for_board(board: Board) -> Self {
        let price_limit_pct = match board {
            Board::Star | Board::Gem => Some(Self::LIMIT_GROWTH),
            Board::HkMain => None,
            Board::ShMain | Board::SzMain | Board::Etf | Board::Other => Some(Self::LIMIT_MAIN),
        };

        Self {
            price_limit_pct,
            board_lot: 100,
            tick: Self::TICK,
        }
    }

    /// Round a price to the tick, half-up.
    pub fn round_to_tick(&self, price: Decimal) -> Decimal {
        let ticks = (price / self.tick)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        ticks * self.tick
    }

    /// Daily `(lower_limit, upper_limit)` band computed from the previous close, or `None` when
    /// the board has no limit. `pre_close` must be positive.
    pub fn price_limits(&self, pre_close: Decimal) -> Option<(Decimal, Decimal)> {
        let pct = self.price_limit_pct?;
        let band = pre_close * pct;
        Some((
            self.round_to_tick(pre_close - band),
            self.round_to_tick(pre_close + band),
        ))
    }

    /// Truncate a share quantity down to a whole number of board lots.
    pub fn floor_to_lot(&self, quantity: i64) -> i64 {
        (quantity / self.board_lot) * self.board_lot
    }
}
