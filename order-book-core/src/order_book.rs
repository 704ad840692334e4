use crate::types::{
    ErrorStats, LevelEntry, OrderId, OrderedPrice, Price, Side, TradeStats, Volume,
};
use std::collections::{BTreeMap, HashMap, VecDeque};

/// A limit order book for a single instrument, partitioned into bid and ask
/// sides.
///
/// Bids are kept highest-price-first, asks lowest-price-first; iterating a
/// side's container from the beginning always yields its best (touch)
/// level first. Equal-price entries retain insertion order (time
/// priority). The book never matches aggressive orders against one
/// another — that is left to an external `trade` message or the
/// generator's uncross pass.
pub struct OrderBook {
    bid_levels: BTreeMap<OrderedPrice, VecDeque<LevelEntry>>,
    ask_levels: BTreeMap<OrderedPrice, VecDeque<LevelEntry>>,
    order_index: HashMap<OrderId, (Side, Price)>,
    best_bid: Price,
    best_ask: Price,
    midpoint: Price,
    trade_stats: TradeStats,
    error_stats: ErrorStats,
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderBook {
    /// Creates a new, empty order book.
    pub fn new() -> Self {
        OrderBook {
            bid_levels: BTreeMap::new(),
            ask_levels: BTreeMap::new(),
            order_index: HashMap::new(),
            best_bid: 0.0,
            best_ask: 0.0,
            midpoint: 0.0,
            trade_stats: TradeStats::default(),
            error_stats: ErrorStats::default(),
        }
    }

    fn levels(&self, side: Side) -> &BTreeMap<OrderedPrice, VecDeque<LevelEntry>> {
        match side {
            Side::Bid => &self.bid_levels,
            Side::Ask => &self.ask_levels,
        }
    }

    fn levels_mut(&mut self, side: Side) -> &mut BTreeMap<OrderedPrice, VecDeque<LevelEntry>> {
        match side {
            Side::Bid => &mut self.bid_levels,
            Side::Ask => &mut self.ask_levels,
        }
    }

    // ---- derived views ----

    /// Cached best (touch) price on `side`; `0.0` when the side is empty.
    pub fn best_price(&self, side: Side) -> Price {
        match side {
            Side::Bid => self.best_bid,
            Side::Ask => self.best_ask,
        }
    }

    /// True iff the best bid is at or above the best ask. Because the
    /// empty-side sentinel is `0.0`, a book with both sides empty also
    /// reports crossed (`0.0 >= 0.0`) — this quirk is depended on by
    /// `trade`'s validation and must be preserved.
    pub fn is_crossed(&self) -> bool {
        self.best_bid >= self.best_ask
    }

    /// Arithmetic mean of the best bid and best ask, or `0.0` if the book
    /// is crossed or either side is empty.
    pub fn midpoint(&self) -> Price {
        self.midpoint
    }

    /// Number of live entries resting on `side`.
    pub fn order_count(&self, side: Side) -> usize {
        self.levels(side).values().map(|q| q.len()).sum()
    }

    /// Sum of volumes across every live entry on `side` at exactly `price`.
    pub fn volume_at(&self, side: Side, price: Price) -> Volume {
        self.levels(side)
            .get(&OrderedPrice(price))
            .map(|q| q.iter().map(|e| e.volume).sum())
            .unwrap_or(0)
    }

    /// The `position`-th entry (0-indexed) in `side`'s ordered iteration
    /// (best level first), or `None` if `position` is out of range.
    pub fn order_in_position(&self, side: Side, position: usize) -> Option<LevelEntry> {
        self.iter(side).nth(position)
    }

    /// The running trade statistics observed via `trade`.
    pub fn trade_stats(&self) -> TradeStats {
        self.trade_stats
    }

    /// The accumulated soft-failure counters.
    pub fn error_stats(&self) -> ErrorStats {
        self.error_stats
    }

    /// Forward iteration over `side`, best level first, in time order
    /// within each price.
    pub fn iter(&self, side: Side) -> Box<dyn DoubleEndedIterator<Item = LevelEntry> + '_> {
        let flat: Vec<LevelEntry> = match side {
            Side::Bid => self
                .bid_levels
                .iter()
                .rev()
                .flat_map(|(_, q)| q.iter().copied())
                .collect(),
            Side::Ask => self
                .ask_levels
                .iter()
                .flat_map(|(_, q)| q.iter().copied())
                .collect(),
        };
        Box::new(flat.into_iter())
    }

    /// Distinct prices present on `side`, in the side's priority order
    /// (best first).
    fn prices(&self, side: Side) -> Vec<Price> {
        match side {
            Side::Bid => self.bid_levels.keys().rev().map(|p| p.0).collect(),
            Side::Ask => self.ask_levels.keys().map(|p| p.0).collect(),
        }
    }

    // ---- mutation operations ----

    /// Adds a new resting order. Returns `false` (no mutation) on a
    /// negative field or a duplicate `order_id`.
    pub fn add(&mut self, side: Side, order_id: OrderId, price: Price, volume: Volume) -> bool {
        if order_id < 0 || price < 0.0 || volume < 0 {
            self.error_stats.invalid_inputs += 1;
            return false;
        }
        if self.order_index.contains_key(&order_id) {
            self.error_stats.duplicate_order_ids += 1;
            return false;
        }

        self.levels_mut(side)
            .entry(OrderedPrice(price))
            .or_default()
            .push_back(LevelEntry { order_id, volume });
        self.order_index.insert(order_id, (side, price));

        self.recompute_best(side);
        true
    }

    /// Removes the resting order identified by `order_id` from `side`.
    /// Returns `false` (no mutation) if the id is unknown, negative, or on
    /// the other side.
    pub fn remove(&mut self, side: Side, order_id: OrderId) -> bool {
        if order_id < 0 {
            self.error_stats.invalid_inputs += 1;
            return false;
        }
        let Some(&(recorded_side, price)) = self.order_index.get(&order_id) else {
            self.error_stats.removes_without_order += 1;
            return false;
        };
        if recorded_side != side {
            self.error_stats.removes_without_order += 1;
            return false;
        }

        self.erase_entry(side, price, order_id);
        self.order_index.remove(&order_id);
        self.recompute_best(side);
        true
    }

    /// Applies a modification to the resting order identified by
    /// `order_id`. A `new_volume` of zero behaves exactly like `remove`. A
    /// price change forfeits time priority (modeled as cancel + re-add at
    /// the tail of the new price's queue); a pure volume change at the
    /// same price preserves it.
    pub fn modify(
        &mut self,
        side: Side,
        order_id: OrderId,
        new_price: Price,
        new_volume: Volume,
    ) -> bool {
        if order_id < 0 || new_price < 0.0 || new_volume < 0 {
            self.error_stats.invalid_inputs += 1;
            return false;
        }
        let Some(&(recorded_side, current_price)) = self.order_index.get(&order_id) else {
            self.error_stats.modifies_without_order += 1;
            return false;
        };
        if recorded_side != side {
            self.error_stats.modifies_without_order += 1;
            return false;
        }

        if new_volume == 0 {
            self.erase_entry(side, current_price, order_id);
            self.order_index.remove(&order_id);
        } else if new_price == current_price {
            let queue = self
                .levels_mut(side)
                .get_mut(&OrderedPrice(current_price))
                .expect("order_index entry must have a backing level");
            let entry = queue
                .iter_mut()
                .find(|e| e.order_id == order_id)
                .expect("order_index entry must be present in its level");
            entry.volume = new_volume;
        } else {
            self.erase_entry(side, current_price, order_id);
            self.levels_mut(side)
                .entry(OrderedPrice(new_price))
                .or_default()
                .push_back(LevelEntry { order_id, volume: new_volume });
            self.order_index.insert(order_id, (side, new_price));
        }

        self.recompute_best(side);
        true
    }

    /// Records an observed trade, updating `TradeStats`. Trades never
    /// mutate the book. Valid only while the book is crossed and the
    /// trade price lies within the crossed slice (`best_ask..=best_bid`);
    /// because the empty-book state also reports crossed, an empty book
    /// rejects every trade here too.
    pub fn trade(&mut self, price: Price, volume: Volume) -> bool {
        if !self.is_crossed() {
            self.error_stats.trade_without_order += 1;
            return false;
        }
        if price > self.best_bid || price < self.best_ask {
            self.error_stats.trade_without_order += 1;
            return false;
        }

        if price == self.trade_stats.last_trade_price {
            self.trade_stats.cumulative_trade_volume += volume;
        } else {
            self.trade_stats.last_trade_price = price;
            self.trade_stats.cumulative_trade_volume = volume;
        }
        true
    }

    // ---- internals ----

    /// Removes the single entry for `order_id` out of the `price` bucket
    /// on `side`, dropping the bucket if it becomes empty. `order_index`
    /// holds `(side, price)`, not a direct handle, so this re-seeks into
    /// the bucket and scans for the matching id.
    fn erase_entry(&mut self, side: Side, price: Price, order_id: OrderId) {
        let levels = self.levels_mut(side);
        let key = OrderedPrice(price);
        if let Some(queue) = levels.get_mut(&key) {
            if let Some(pos) = queue.iter().position(|e| e.order_id == order_id) {
                queue.remove(pos);
            }
            if queue.is_empty() {
                levels.remove(&key);
            }
        }
    }

    fn recompute_best(&mut self, side: Side) {
        match side {
            Side::Bid => {
                self.best_bid = self.bid_levels.keys().next_back().map(|p| p.0).unwrap_or(0.0);
            }
            Side::Ask => {
                self.best_ask = self.ask_levels.keys().next().map(|p| p.0).unwrap_or(0.0);
            }
        }
        self.recompute_midpoint();
    }

    fn recompute_midpoint(&mut self) {
        if self.is_crossed() || self.best_bid == 0.0 || self.best_ask == 0.0 {
            self.midpoint = 0.0;
            return;
        }
        self.midpoint = self.best_bid + (self.best_ask - self.best_bid) * 0.5;
    }

    /// Merges both sides into a single descending-price listing for
    /// pretty-printing: for each distinct price, the entries that rest at
    /// that price (asks and/or bids), in time order within each side.
    /// Walks asks in reverse (descending) and bids forward (already
    /// descending), emitting the higher current head each step.
    pub fn snapshot(&self) -> Vec<(Price, Vec<(Side, Volume)>)> {
        let ask_prices: Vec<Price> = self.prices(Side::Ask).into_iter().rev().collect();
        let bid_prices: Vec<Price> = self.prices(Side::Bid);

        let mut out: Vec<(Price, Vec<(Side, Volume)>)> = Vec::new();
        let mut ai = 0usize;
        let mut bi = 0usize;

        fn push(
            out: &mut Vec<(Price, Vec<(Side, Volume)>)>,
            price: Price,
            side: Side,
            entries: &VecDeque<LevelEntry>,
        ) {
            if let Some((last_price, levels)) = out.last_mut() {
                if *last_price == price {
                    levels.extend(entries.iter().map(|e| (side, e.volume)));
                    return;
                }
            }
            out.push((price, entries.iter().map(|e| (side, e.volume)).collect()));
        }

        while ai < ask_prices.len() && bi < bid_prices.len() {
            let ask_price = ask_prices[ai];
            let bid_price = bid_prices[bi];
            if ask_price >= bid_price {
                let entries = &self.ask_levels[&OrderedPrice(ask_price)];
                push(&mut out, ask_price, Side::Ask, entries);
                ai += 1;
            } else {
                let entries = &self.bid_levels[&OrderedPrice(bid_price)];
                push(&mut out, bid_price, Side::Bid, entries);
                bi += 1;
            }
        }
        while ai < ask_prices.len() {
            let ask_price = ask_prices[ai];
            let entries = &self.ask_levels[&OrderedPrice(ask_price)];
            push(&mut out, ask_price, Side::Ask, entries);
            ai += 1;
        }
        while bi < bid_prices.len() {
            let bid_price = bid_prices[bi];
            let entries = &self.bid_levels[&OrderedPrice(bid_price)];
            push(&mut out, bid_price, Side::Bid, entries);
            bi += 1;
        }
        out
    }
}

#[cfg(test)]
mod order_book_tests {
    use super::*;

    #[test]
    fn two_sided_add_midpoint() {
        let mut book = OrderBook::new();
        assert!(book.add(Side::Ask, 1, 1.23, 321));
        assert!(book.add(Side::Ask, 2, 1.34, 432));
        assert!(book.add(Side::Bid, 3, 1.21, 123));

        assert_eq!(book.best_price(Side::Ask), 1.23);
        assert_eq!(book.best_price(Side::Bid), 1.21);
        assert!(!book.is_crossed());
        assert!((book.midpoint() - 1.22).abs() < 1e-9);
    }

    #[test]
    fn cross_without_trades() {
        let mut book = OrderBook::new();
        book.add(Side::Ask, 1, 1.23, 321);
        book.add(Side::Ask, 2, 1.34, 432);
        book.add(Side::Bid, 3, 1.24, 123);

        assert_eq!(book.best_price(Side::Ask), 1.23);
        assert_eq!(book.best_price(Side::Bid), 1.24);
        assert!(book.is_crossed());
        assert_eq!(book.midpoint(), 0.0);
    }

    #[test]
    fn trade_accumulation_and_reset() {
        let mut book = OrderBook::new();
        book.add(Side::Bid, 1, 1.23, 1000);
        book.add(Side::Ask, 2, 1.23, 1000);
        assert!(book.trade(1.23, 100));
        assert!(book.trade(1.23, 200));
        assert_eq!(book.trade_stats().cumulative_trade_volume, 300);

        book.add(Side::Ask, 3, 1.20, 800);
        assert!(book.trade(1.20, 500));
        assert_eq!(book.trade_stats().last_trade_price, 1.20);
        assert_eq!(book.trade_stats().cumulative_trade_volume, 500);
    }

    #[test]
    fn invalid_trade_on_uncrossed_book_is_rejected() {
        let mut book = OrderBook::new();
        book.add(Side::Bid, 1, 1.0, 10);
        book.add(Side::Ask, 2, 2.0, 10);
        let before = book.trade_stats();
        assert!(!book.trade(1.5, 5));
        assert_eq!(book.trade_stats(), before);
        assert_eq!(book.error_stats().trade_without_order, 1);
    }

    #[test]
    fn trade_rejected_on_empty_book() {
        let mut book = OrderBook::new();
        assert!(book.is_crossed());
        assert!(!book.trade(1.0, 5));
        assert_eq!(book.error_stats().trade_without_order, 1);
    }

    #[test]
    fn modify_price_change_forfeits_priority() {
        let mut book = OrderBook::new();
        book.add(Side::Ask, 1, 1.3, 100);
        book.add(Side::Ask, 2, 1.3, 200);

        book.modify(Side::Ask, 1, 1.4, 100);
        book.modify(Side::Ask, 1, 1.3, 100);

        let pos0 = book.order_in_position(Side::Ask, 0).unwrap();
        let pos1 = book.order_in_position(Side::Ask, 1).unwrap();
        assert_eq!(pos0.order_id, 2);
        assert_eq!(pos1.order_id, 1);
    }

    #[test]
    fn modify_to_zero_volume_is_remove() {
        let mut book = OrderBook::new();
        book.add(Side::Bid, 3, 1.0, 100);
        assert!(book.modify(Side::Bid, 3, 1.0, 0));

        assert_eq!(book.order_count(Side::Bid), 0);
        assert_eq!(book.best_price(Side::Bid), 0.0);
        assert_eq!(book.midpoint(), 0.0);

        assert!(!book.modify(Side::Bid, 3, 1.0, 50));
        assert_eq!(book.error_stats().modifies_without_order, 1);
    }

    #[test]
    fn invalid_input_tally() {
        let mut book = OrderBook::new();
        assert!(!book.add(Side::Bid, -1, 1.0, 10));
        assert!(!book.add(Side::Bid, 1, -1.0, 10));
        assert!(!book.add(Side::Bid, 1, 1.0, -10));
        assert!(!book.remove(Side::Bid, -1));
        assert!(!book.modify(Side::Bid, -1, 1.0, 10));
        assert!(!book.modify(Side::Bid, 1, -1.0, 10));
        assert!(!book.modify(Side::Bid, 1, 1.0, -10));

        assert_eq!(book.error_stats().invalid_inputs, 7);
    }

    #[test]
    fn failed_mutation_is_effect_free() {
        let mut book = OrderBook::new();
        book.add(Side::Bid, 1, 1.0, 10);
        let snapshot_before = book.snapshot();
        let best_before = (book.best_price(Side::Bid), book.best_price(Side::Ask));

        assert!(!book.add(Side::Bid, 1, 2.0, 5)); // duplicate id
        assert!(!book.remove(Side::Ask, 999)); // unknown id
        assert!(!book.modify(Side::Ask, 1, 1.0, 5)); // wrong side

        assert_eq!(book.snapshot(), snapshot_before);
        assert_eq!((book.best_price(Side::Bid), book.best_price(Side::Ask)), best_before);
    }

    #[test]
    fn volume_at_sums_equal_price_entries() {
        let mut book = OrderBook::new();
        book.add(Side::Bid, 1, 1.0, 10);
        book.add(Side::Bid, 2, 1.0, 20);
        book.add(Side::Bid, 3, 2.0, 30);

        assert_eq!(book.volume_at(Side::Bid, 1.0), 30);
        assert_eq!(book.volume_at(Side::Bid, 2.0), 30);
        assert_eq!(book.volume_at(Side::Bid, 3.0), 0);
    }

    #[test]
    fn snapshot_merges_descending_with_time_order() {
        let mut book = OrderBook::new();
        book.add(Side::Bid, 1, 10.0, 5);
        book.add(Side::Bid, 2, 9.0, 7);
        book.add(Side::Ask, 3, 11.0, 3);
        book.add(Side::Ask, 4, 11.0, 4);
        book.add(Side::Ask, 5, 12.0, 1);

        let snap = book.snapshot();
        let prices: Vec<Price> = snap.iter().map(|(p, _)| *p).collect();
        assert_eq!(prices, vec![12.0, 11.0, 10.0, 9.0]);

        let at_11 = &snap.iter().find(|(p, _)| *p == 11.0).unwrap().1;
        assert_eq!(at_11, &vec![(Side::Ask, 3), (Side::Ask, 4)]);
    }

    #[test]
    fn order_in_position_out_of_range_is_none() {
        let mut book = OrderBook::new();
        book.add(Side::Bid, 1, 1.0, 10);
        assert!(book.order_in_position(Side::Bid, 1).is_none());
    }
}
