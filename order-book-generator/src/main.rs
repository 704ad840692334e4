//! # Order Book Generator
//!
//! Drives an [`order_book_core::OrderBook`] with a randomized-but-plausible
//! stream of add/modify/remove events from a seeded PRNG, emitting each as a
//! feed-handler line on stdout. Whenever an applied event leaves the book
//! crossed, the generator runs an uncross pass: it walks the overlapping
//! slice of the book, synthesizes trades against it, and reduces or cancels
//! the consumed resting orders — through the book's own public mutation
//! API, never by reaching into its containers — until the book is no
//! longer crossed on both sides at once. Trades are always emitted before
//! the order actions that followed them.

use clap::Parser;
use order_book_core::{OrderBook, OrderBookError, OrderId, Price, Side, Volume};
use rand::{rngs::StdRng, Rng, SeedableRng};

#[derive(Parser)]
#[command(name = "order-book-generator")]
#[command(about = "Synthetic event generator for a limit order book", long_about = None)]
struct Cli {
    /// PRNG seed.
    seed: u64,
    /// Number of primary events to generate (uncross compensating events
    /// don't count against this total).
    num_events: u64,
}

const PRICE_RANGE: std::ops::Range<f64> = 90.0..110.0;
const VOLUME_RANGE: std::ops::Range<i64> = 1..500;

/// The generator's own view of which orders are resting where. Mirrors the
/// book's OrderIndex; kept separate so the generator can sample an
/// existing order in O(1) without scanning the book. If a removal or
/// modify this map believes should succeed is rejected by the book, that's
/// the bijection invariant broken somewhere and is a fatal bug, not a
/// recoverable condition.
struct LiveOrder {
    order_id: OrderId,
    side: Side,
    price: Price,
    volume: Volume,
}

fn side_char(side: Side) -> &'static str {
    match side {
        Side::Bid => "B",
        Side::Ask => "S",
    }
}

fn remove_live(live: &mut Vec<LiveOrder>, order_id: OrderId) {
    live.retain(|o| o.order_id != order_id);
}

fn update_live_volume(live: &mut Vec<LiveOrder>, order_id: OrderId, volume: Volume) {
    if let Some(order) = live.iter_mut().find(|o| o.order_id == order_id) {
        order.volume = volume;
    }
}

/// Applies one randomly-chosen add/modify/remove to `book`, updates `live`
/// to match, and returns the event's feed-handler line. Falls back to an
/// add when there is nothing live to modify or remove.
fn emit_random_event(
    book: &mut OrderBook,
    rng: &mut StdRng,
    live: &mut Vec<LiveOrder>,
    next_id: &mut OrderId,
) -> String {
    let roll: f64 = if live.is_empty() { 0.0 } else { rng.gen_range(0.0..1.0) };

    if roll < 0.5 {
        let side = if rng.gen_bool(0.5) { Side::Bid } else { Side::Ask };
        let price = rng.gen_range(PRICE_RANGE);
        let volume = rng.gen_range(VOLUME_RANGE);
        let order_id = *next_id;
        *next_id += 1;

        if !book.add(side, order_id, price, volume) {
            panic!("{}", OrderBookError::MissingLiveOrder { order_id, side });
        }
        live.push(LiveOrder { order_id, side, price, volume });
        format!("A,{order_id},{},{volume},{price}", side_char(side))
    } else if roll < 0.75 {
        let index = rng.gen_range(0..live.len());
        let (order_id, side) = (live[index].order_id, live[index].side);
        let new_price = rng.gen_range(PRICE_RANGE);
        let new_volume = if rng.gen_bool(0.1) { 0 } else { rng.gen_range(VOLUME_RANGE) };

        if !book.modify(side, order_id, new_price, new_volume) {
            panic!("{}", OrderBookError::MissingLiveOrder { order_id, side });
        }
        if new_volume == 0 {
            remove_live(live, order_id);
        } else {
            update_live_volume(live, order_id, new_volume);
            if let Some(order) = live.iter_mut().find(|o| o.order_id == order_id) {
                order.price = new_price;
            }
        }
        format!("M,{order_id},{},{new_volume},{new_price}", side_char(side))
    } else {
        let index = rng.gen_range(0..live.len());
        let order = live.swap_remove(index);

        if !book.remove(order.side, order.order_id) {
            panic!(
                "{}",
                OrderBookError::MissingLiveOrder { order_id: order.order_id, side: order.side }
            );
        }
        format!("X,{},{},{},{}", order.order_id, side_char(order.side), order.volume, order.price)
    }
}

/// Walks the crossed slice of `book`, synthesizing trades and compensating
/// order actions until the book is no longer crossed with both sides
/// non-empty. Returns the two staged event lists, trades first.
fn run_uncross(book: &mut OrderBook, live: &mut Vec<LiveOrder>) -> (Vec<String>, Vec<String>) {
    let mut trades = Vec::new();
    let mut actions = Vec::new();

    while book.is_crossed() && book.order_count(Side::Bid) > 0 && book.order_count(Side::Ask) > 0 {
        let bid = book.order_in_position(Side::Bid, 0).expect("crossed book has a bid touch");
        let ask = book.order_in_position(Side::Ask, 0).expect("crossed book has an ask touch");
        let bid_price = book.best_price(Side::Bid);
        let ask_price = book.best_price(Side::Ask);

        let trade_volume = bid.volume.min(ask.volume);
        trades.push(format!("T,{trade_volume},{ask_price}"));
        book.trade(ask_price, trade_volume);

        let bid_remaining = bid.volume - trade_volume;
        if bid_remaining == 0 {
            actions.push(format!("X,{},B,{},{bid_price}", bid.order_id, bid.volume));
            if !book.remove(Side::Bid, bid.order_id) {
                panic!(
                    "{}",
                    OrderBookError::MissingLiveOrder { order_id: bid.order_id, side: Side::Bid }
                );
            }
            remove_live(live, bid.order_id);
        } else {
            actions.push(format!("M,{},B,{bid_remaining},{bid_price}", bid.order_id));
            if !book.modify(Side::Bid, bid.order_id, bid_price, bid_remaining) {
                panic!(
                    "{}",
                    OrderBookError::MissingLiveOrder { order_id: bid.order_id, side: Side::Bid }
                );
            }
            update_live_volume(live, bid.order_id, bid_remaining);
        }

        // The ask is fully consumed only if the bid still has volume left;
        // otherwise both sides clear on this iteration (modify-to-zero is
        // treated as remove) and the ask keeps a trailing M line.
        if bid_remaining > 0 {
            actions.push(format!("X,{},S,{},{ask_price}", ask.order_id, ask.volume));
            if !book.remove(Side::Ask, ask.order_id) {
                panic!(
                    "{}",
                    OrderBookError::MissingLiveOrder { order_id: ask.order_id, side: Side::Ask }
                );
            }
            remove_live(live, ask.order_id);
        } else {
            let ask_remaining = ask.volume - trade_volume;
            actions.push(format!("M,{},S,{ask_remaining},{ask_price}", ask.order_id));
            if !book.modify(Side::Ask, ask.order_id, ask_price, ask_remaining) {
                panic!(
                    "{}",
                    OrderBookError::MissingLiveOrder { order_id: ask.order_id, side: Side::Ask }
                );
            }
            if ask_remaining == 0 {
                remove_live(live, ask.order_id);
            } else {
                update_live_volume(live, ask.order_id, ask_remaining);
            }
        }
    }

    (trades, actions)
}

fn main() {
    let cli = Cli::parse();
    let mut rng = StdRng::seed_from_u64(cli.seed);
    let mut book = OrderBook::new();
    let mut live: Vec<LiveOrder> = Vec::new();
    let mut next_id: OrderId = 1;

    for _ in 0..cli.num_events {
        let line = emit_random_event(&mut book, &mut rng, &mut live, &mut next_id);
        println!("{line}");

        if book.is_crossed() && book.order_count(Side::Bid) > 0 && book.order_count(Side::Ask) > 0 {
            let (trades, actions) = run_uncross(&mut book, &mut live);
            for trade in trades {
                println!("{trade}");
            }
            for action in actions {
                println!("{action}");
            }
        }
    }
}
