use derive_more::Display;

/// Price of a resting order or a trade; compared with plain `==`/`<`/`>`.
///
/// No tick rounding happens inside the core — a parser upstream is
/// responsible for any normalization before values reach the book.
pub type Price = f64;

/// Number of units resting at a price, or traded. Signed so that malformed
/// (negative) inputs can be observed and rejected by validation rather than
/// silently wrapping.
pub type Volume = i64;

/// Globally unique identifier for a resting order, shared across both sides.
pub type OrderId = i64;

/// Total order over `Price` used solely to key the side containers.
///
/// `f64` has no `Ord` impl because of `NaN`; every comparison the business
/// logic actually performs (`==`, `<`, `>=`, ...) still uses the raw `f64`
/// directly. This wrapper never appears outside the `BTreeMap` keys.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct OrderedPrice(pub Price);

impl Eq for OrderedPrice {}

impl PartialOrd for OrderedPrice {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedPrice {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Which side of the book an order or level belongs to.
///
/// Bids are ordered highest-price-first, asks lowest-price-first; this is
/// the only place the two sides of the book differ from one another.
#[derive(Display, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// Buy order (bid).
    Bid,
    /// Sell order (ask).
    Ask,
}

/// One resting order at a price level.
///
/// The price itself is not stored here: it is implicit from whichever
/// bucket of the side's container the entry lives in. Equal-price entries
/// within a bucket are kept in insertion order (time priority).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelEntry {
    pub order_id: OrderId,
    pub volume: Volume,
}

/// Running trade statistics. Volume accumulates while consecutive trades
/// land at the same price and resets whenever the price changes.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TradeStats {
    pub last_trade_price: Price,
    pub cumulative_trade_volume: Volume,
}

/// Soft-failure counters for every way a mutation or trade observation can
/// be rejected. Every rejected call increments exactly one of these and
/// leaves the book otherwise untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ErrorStats {
    pub duplicate_order_ids: u64,
    pub trade_without_order: u64,
    pub removes_without_order: u64,
    pub modifies_without_order: u64,
    pub crossed_book_no_trades: u64,
    pub invalid_inputs: u64,
}

/// Fatal programmer-error conditions: a violation of the order-id/live-entry
/// bijection invariant. These never occur from a correctly-driven book and
/// are only raised by the generator's own shadow bookkeeping.
#[derive(Display, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderBookError {
    /// The shadow state believed `order_id` was still resting on `side`,
    /// but the book's own index disagreed.
    #[display("order {} believed live on {} but not found in book index", order_id, side)]
    MissingLiveOrder { order_id: OrderId, side: Side },
}
