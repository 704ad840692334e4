//! # Order Book Feed Handler
//!
//! Drives an [`order_book_core::OrderBook`] from a CSV-like line stream read
//! from a file: one line in, one applied event (or rejection) out, with a
//! periodic book snapshot and a shutdown stats dump.
//!
//! Line grammar:
//! ```text
//! trade := "T," int "," real
//! order := ("A"|"M"|"X") "," int "," ("B"|"S") "," int "," real
//! ```
//! Trailing characters after the last required field, or any whitespace,
//! make the line `UNPARSABLE`.

use clap::Parser;
use order_book_core::{OrderBook, OrderId, Price, Side, Volume};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "order-book-cli")]
#[command(about = "Feed handler for a single-instrument limit order book", long_about = None)]
struct Cli {
    /// Path to the file of feed lines to apply.
    path: PathBuf,

    /// Dump a full book snapshot every N applied lines (0 disables).
    #[arg(long = "snapshot-every", default_value_t = 0)]
    snapshot_every: u64,
}

enum OrderKind {
    Add,
    Modify,
    Remove,
}

enum Record {
    Trade { volume: Volume, price: Price },
    Order { kind: OrderKind, order_id: OrderId, side: Side, volume: Volume, price: Price },
}

fn parse_line(line: &str) -> Option<Record> {
    let fields: Vec<&str> = line.split(',').collect();
    match fields.as_slice() {
        ["T", volume, price] => Some(Record::Trade {
            volume: volume.parse().ok()?,
            price: price.parse().ok()?,
        }),
        [kind, order_id, side, volume, price] => {
            let kind = match *kind {
                "A" => OrderKind::Add,
                "M" => OrderKind::Modify,
                "X" => OrderKind::Remove,
                _ => return None,
            };
            let side = match *side {
                "B" => Side::Bid,
                "S" => Side::Ask,
                _ => return None,
            };
            Some(Record::Order {
                kind,
                order_id: order_id.parse().ok()?,
                side,
                volume: volume.parse().ok()?,
                price: price.parse().ok()?,
            })
        }
        _ => None,
    }
}

fn print_snapshot(book: &OrderBook) {
    println!();
    println!("Current Orderbook:");
    for (price, entries) in book.snapshot() {
        let mut line = format!("{price}");
        for (side, volume) in entries {
            let tag = match side {
                Side::Bid => "B",
                Side::Ask => "S",
            };
            line.push_str(&format!(" {tag} {volume}"));
        }
        println!("{line}");
    }
    println!();
}

fn print_shutdown_stats(parse_failures: u64, book: &OrderBook) {
    let stats = book.error_stats();
    println!("parse_failures: {parse_failures}");
    println!("duplicate_order_ids: {}", stats.duplicate_order_ids);
    println!("trade_without_order: {}", stats.trade_without_order);
    println!("removes_without_order: {}", stats.removes_without_order);
    println!("modifies_without_order: {}", stats.modifies_without_order);
    println!("crossed_book_no_trades: {}", stats.crossed_book_no_trades);
    println!("invalid_inputs: {}", stats.invalid_inputs);
}

fn run(cli: Cli) {
    let file = match File::open(&cli.path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("cannot open {}: {e}", cli.path.display());
            std::process::exit(1);
        }
    };

    let mut book = OrderBook::new();
    let mut parse_failures: u64 = 0;
    let mut messages: u64 = 0;

    for line in BufReader::new(file).lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                eprintln!("error reading line: {e}");
                break;
            }
        };

        // An unparsable line never reaches the book, so it doesn't count
        // toward the snapshot cadence either.
        let applied = match parse_line(&line) {
            Some(Record::Trade { volume, price }) => {
                book.trade(price, volume);
                let stats = book.trade_stats();
                println!("{line}: {}@{}", stats.cumulative_trade_volume, stats.last_trade_price);
                true
            }
            Some(Record::Order { kind, order_id, side, volume, price }) => {
                match kind {
                    OrderKind::Add => {
                        book.add(side, order_id, price, volume);
                    }
                    OrderKind::Modify => {
                        book.modify(side, order_id, price, volume);
                    }
                    OrderKind::Remove => {
                        book.remove(side, order_id);
                    }
                }
                let midpoint = book.midpoint();
                if midpoint == 0.0 {
                    println!("{line}: NAN");
                } else {
                    println!("{line}: {midpoint}");
                }
                true
            }
            None => {
                parse_failures += 1;
                println!("{line}:  UNPARSABLE");
                false
            }
        };

        if applied {
            messages += 1;
            if cli.snapshot_every != 0 && messages % cli.snapshot_every == 0 {
                print_snapshot(&book);
            }
        }
    }

    print_shutdown_stats(parse_failures, &book);
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };
    run(cli);
}

#[cfg(test)]
mod tests {
    use assert_cmd::Command;
    use predicates::prelude::*;
    use std::io::Write;

    fn cli() -> Command {
        Command::cargo_bin("order-book-cli").unwrap()
    }

    /// Writes `lines` (newline-joined) to a fresh file under the system
    /// temp dir and returns its path. Each test uses its own file name so
    /// parallel test runs don't collide.
    fn feed_file(name: &str, lines: &[&str]) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("order-book-cli-test-{name}-{}.csv", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        path
    }

    #[test]
    fn rejects_missing_file() {
        cli()
            .arg("/nonexistent/path/does-not-exist.csv")
            .assert()
            .failure();
    }

    #[test]
    fn applies_two_sided_add_and_reports_midpoint() {
        // Integer-valued prices so the midpoint arithmetic lands on an
        // exactly representable f64 and the formatted output is stable.
        let path = feed_file(
            "midpoint",
            &["A,1,B,100,100", "A,2,S,200,102"],
        );

        cli()
            .arg(&path)
            .assert()
            .success()
            .stdout(predicate::str::contains("A,1,B,100,100: NAN"))
            .stdout(predicate::str::contains("A,2,S,200,102: 101"));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn unparsable_line_is_flagged_and_counted() {
        let path = feed_file("garbage", &["not,a,valid,line,at,all,extra"]);

        cli()
            .arg(&path)
            .assert()
            .success()
            .stdout(predicate::str::contains(":  UNPARSABLE"))
            .stdout(predicate::str::contains("parse_failures: 1"));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn trade_line_reports_cumulative_volume() {
        let path = feed_file(
            "trade",
            &["A,1,B,1000,1.23", "A,2,S,1000,1.23", "T,100,1.23", "T,200,1.23"],
        );

        cli()
            .arg(&path)
            .assert()
            .success()
            .stdout(predicate::str::contains("T,100,1.23: 100@1.23"))
            .stdout(predicate::str::contains("T,200,1.23: 300@1.23"));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn snapshot_every_dumps_book_periodically() {
        let path = feed_file("snapshot", &["A,1,B,100,1.0", "A,2,S,50,2.0"]);

        cli()
            .arg(&path)
            .arg("--snapshot-every")
            .arg("1")
            .assert()
            .success()
            .stdout(predicate::str::contains("Current Orderbook:"));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn unparsable_lines_do_not_count_toward_snapshot_cadence() {
        // snapshot-every 2, with one garbage line mixed in among two real
        // events: the snapshot must fire once, after the second applied
        // event, not after the third *line*.
        let path = feed_file(
            "snapshot-cadence",
            &["garbage", "A,1,B,100,1.0", "A,2,S,50,2.0"],
        );

        let output = cli()
            .arg(&path)
            .arg("--snapshot-every")
            .arg("2")
            .output()
            .unwrap();
        let stdout = String::from_utf8(output.stdout).unwrap();

        assert_eq!(stdout.matches("Current Orderbook:").count(), 1);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn shutdown_dump_reports_all_six_error_counters() {
        let path = feed_file("stats", &["X,999,B,0,0"]);

        cli()
            .arg(&path)
            .assert()
            .success()
            .stdout(predicate::str::contains("duplicate_order_ids: 0"))
            .stdout(predicate::str::contains("trade_without_order: 0"))
            .stdout(predicate::str::contains("removes_without_order: 1"))
            .stdout(predicate::str::contains("modifies_without_order: 0"))
            .stdout(predicate::str::contains("crossed_book_no_trades: 0"))
            .stdout(predicate::str::contains("invalid_inputs: 0"));

        std::fs::remove_file(&path).ok();
    }
}
