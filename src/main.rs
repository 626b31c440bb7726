use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use parking_lot::Mutex;

use bondx_rs::engine::events::propose_events;
use bondx_rs::engine::{
    AdvanceOutcome, Bond, GameConfig, GameState, SharedGame, Side,
};
use bondx_rs::persist::csv_log::{CsvOrderLog, CsvQuoteSheet};
use bondx_rs::persist::{OrderSink, QuoteSink};
use bondx_rs::scenario::load_scenario_csv;
use bondx_rs::telemetry;

#[derive(Debug, Parser)]
#[command(name = "bondx", about = "Turn-based bond market game moderator console")]
struct Args {
    /// Unified scenario CSV (bond and event rows). Omit to run the built-in
    /// demo scenario.
    #[arg(long)]
    scenario: Option<PathBuf>,
    /// Append executed orders to this CSV file.
    #[arg(long)]
    orders_log: Option<PathBuf>,
    /// Write the current round's quotes to this CSV file on every advance.
    #[arg(long)]
    quotes_sheet: Option<PathBuf>,
}

fn demo_bonds() -> Vec<Bond> {
    vec![
        Bond {
            bond_id: "B1".into(),
            name: "Bono Soberano 3y".into(),
            face_value: 1000.0,
            annual_coupon_rate: 0.06,
            payments_per_year: 2,
            years_to_maturity: 3.0,
            credit_spread_bps: 80.0,
            callable: false,
            call_price: None,
        },
        Bond {
            bond_id: "B2".into(),
            name: "Corporativo AA 5y".into(),
            face_value: 1000.0,
            annual_coupon_rate: 0.08,
            payments_per_year: 2,
            years_to_maturity: 5.0,
            credit_spread_bps: 150.0,
            callable: true,
            call_price: Some(1020.0),
        },
    ]
}

fn print_quotes(game: &GameState) {
    println!("\n=== Quotes (round {}) ===", game.current_round());
    let quotes = game.quotes();
    if quotes.is_empty() {
        println!("No prices published yet");
    } else {
        let mut ids: Vec<&String> = quotes.keys().collect();
        ids.sort();
        for bond_id in ids {
            let q = &quotes[bond_id];
            println!("{bond_id}: bid {:.2} / mid {:.2} / ask {:.2}", q.bid, q.mid, q.ask);
        }
    }
    println!("========================\n");
}

fn print_board(game: &GameState) {
    let board = game.leaderboard();
    if board.is_empty() {
        println!("No teams registered yet");
        return;
    }
    println!("\n=== Leaderboard ===");
    for (rank, row) in board.iter().enumerate() {
        println!(
            "{}. {} — value {:.2} (cash {:.2})",
            rank + 1,
            row.team_id,
            row.value,
            row.cash
        );
    }
    println!("===================\n");
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok(); // load .env
    telemetry::init_tracing("info");
    let args = Args::parse();
    let config = GameConfig::from_env();

    let (bonds, events) = match &args.scenario {
        Some(path) => {
            let scenario = load_scenario_csv(path)?;
            (scenario.bonds, scenario.events)
        }
        None => {
            println!("No scenario file given, using the built-in demo");
            let bonds = demo_bonds();
            let events = propose_events(&bonds, 50.0, 75.0, -25.0, 40.0);
            (bonds, events)
        }
    };

    let game: SharedGame = Arc::new(Mutex::new(GameState::new(config, bonds, events)?));
    let mut order_log = args.orders_log.map(CsvOrderLog::new);
    let mut quote_sheet = args.quotes_sheet.map(CsvQuoteSheet::new);

    // CLI loop
    loop {
        {
            let g = game.lock();
            print!(
                "bondx [round {}/{}]{}> ",
                g.current_round(),
                g.total_rounds(),
                if g.trading_enabled() { "" } else { " [trading off]" }
            );
        }
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let parts: Vec<&str> = input.trim().split_whitespace().collect();
        let command = parts.first().map(|s| s.to_lowercase()).unwrap_or_default();

        match command.as_str() {
            "help" | "h" => {
                println!("Available commands:");
                println!("  advance                  - Publish the next round's event and prices");
                println!("  quotes                   - Show the current round's quotes");
                println!("  join <team>              - Register a team");
                println!("  buy <team> <bond> <qty>  - Buy at the ask");
                println!("  sell <team> <bond> <qty> - Sell at the bid");
                println!("  board                    - Show the leaderboard");
                println!("  events                   - Show published events");
                println!("  trading on|off           - Moderator trading override");
                println!("  dump                     - Dump quotes as JSON");
                println!("  quit, q                  - Exit");
            }
            "advance" | "a" => {
                let mut g = game.lock();
                match g.advance() {
                    AdvanceOutcome::Published { round, quoted } => {
                        println!("Round {round} published, {quoted} bonds quoted");
                        if let Some(sheet) = quote_sheet.as_mut() {
                            if let Err(e) = sheet.publish_quotes(round, g.quotes()) {
                                eprintln!("Error writing quote sheet: {e}");
                            }
                        }
                        print_quotes(&g);
                    }
                    AdvanceOutcome::AlreadyComplete => {
                        println!("All rounds already published — game complete");
                    }
                }
            }
            "quotes" | "top" => {
                print_quotes(&game.lock());
            }
            "join" => {
                if let Some(team) = parts.get(1) {
                    game.lock().register_team(team);
                    println!("Team {team} registered");
                } else {
                    println!("Usage: join <team>");
                }
            }
            "buy" | "sell" => {
                if parts.len() == 4 {
                    if let Ok(qty) = parts[3].parse::<f64>() {
                        let side = if command == "buy" { Side::Buy } else { Side::Sell };
                        let mut g = game.lock();
                        match g.submit_order(parts[1], parts[2], side, qty) {
                            Ok(order) => {
                                let order = order.clone();
                                println!(
                                    "{} {} x{} @ {:.2} (fees {:.2})",
                                    order.side, order.bond_id, order.qty, order.price_exec, order.fees
                                );
                                if let Some(log) = order_log.as_mut() {
                                    if let Err(e) = log.append_order(&order) {
                                        eprintln!("Error writing order log: {e}");
                                    }
                                }
                            }
                            Err(reason) => println!("Rejected: {reason}"),
                        }
                    } else {
                        println!("Invalid quantity");
                    }
                } else {
                    println!("Usage: {command} <team> <bond> <qty>");
                }
            }
            "board" | "b" => {
                print_board(&game.lock());
            }
            "events" => {
                let g = game.lock();
                for event in g.published_events() {
                    println!("round {}: [{}] {}", event.round, event.kind.label(), event.description);
                }
            }
            "trading" => match parts.get(1).copied() {
                Some("on") => match game.lock().set_trading(true) {
                    Ok(()) => println!("Trading enabled"),
                    Err(e) => println!("Cannot enable: {e}"),
                },
                Some("off") => {
                    game.lock().set_trading(false).ok();
                    println!("Trading disabled");
                }
                _ => println!("Usage: trading on|off"),
            },
            "dump" => {
                let g = game.lock();
                println!("{}", serde_json::to_string_pretty(g.quotes())?);
            }
            "quit" | "q" | "exit" => {
                println!("Goodbye!");
                break;
            }
            "" => continue,
            _ => {
                println!("Unknown command. Type 'help' for available commands.");
            }
        }
    }

    Ok(())
}
