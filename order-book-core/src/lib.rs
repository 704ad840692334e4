//! # Order Book Core
//!
//! An in-memory limit order book for a single instrument: a dual-indexed
//! mutable container (order id → resting location, and side → price-ordered
//! multiset of volumes) together with the add/modify/remove/trade
//! event-application protocol, its derived views (best prices, midpoint,
//! volume-at-price, positional level lookup) and its soft error-accounting
//! policy.
//!
//! The book never matches aggressive orders against each other — crossed
//! state is expected to be resolved by an external `trade` message or by a
//! generator's uncross pass (see `order-book-generator`).
//!
//! ## Example
//!
//! ```rust
//! use order_book_core::{OrderBook, Side};
//!
//! let mut book = OrderBook::new();
//!
//! book.add(Side::Bid, 1, 1.21, 123);
//! book.add(Side::Ask, 2, 1.23, 321);
//!
//! assert_eq!(book.best_price(Side::Bid), 1.21);
//! assert_eq!(book.best_price(Side::Ask), 1.23);
//! assert!(!book.is_crossed());
//! ```

pub mod order_book;
pub mod types;

pub use order_book::OrderBook;
pub use types::{ErrorStats, LevelEntry, OrderBookError, OrderId, Price, Side, TradeStats, Volume};
