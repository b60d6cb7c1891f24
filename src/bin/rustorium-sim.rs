#![forbid(unsafe_code)]
//! Drives a local ledger through a few rounds of random transfers and mining,
//! then prints the resulting chain, balances and network statistics.

use clap::Parser;
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Color as TableColor;
use comfy_table::{Attribute, Cell, ContentArrangement, Table};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rustorium::amount::Amount;
use rustorium::blockchain::Block;
use rustorium::config::{load_config, load_config_from};
use rustorium::ledger::Ledger;
use rustorium::transaction::TransferRequest;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file; defaults to $RUSTORIUM_CONFIG or config.toml
    #[arg(long)]
    config: Option<String>,
    /// Overrides the configured Proof-of-Work difficulty
    #[arg(long, short)]
    difficulty: Option<u32>,
    /// Number of blocks to mine
    #[arg(long, default_value_t = 3)]
    rounds: usize,
    /// Transfers staged before each block
    #[arg(long, default_value_t = 4)]
    transfers: usize,
    /// Fresh accounts created to receive transfers
    #[arg(long, default_value_t = 3)]
    accounts: usize,
    /// Seed for reproducible transfer amounts and recipients
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    if let Some(difficulty) = cli.difficulty {
        config.ledger.difficulty = difficulty;
    }
    if config.ledger.genesis_accounts.is_empty() {
        return Err("At least one genesis account is needed to fund transfers".into());
    }

    let mut rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    println!("{}", "🔗 Rustorium ledger simulation".bright_magenta().bold());
    println!(
        "{}",
        format!("   difficulty {}, {} rounds", config.ledger.difficulty, cli.rounds).cyan()
    );
    println!();

    let ledger = Ledger::new(&config.ledger)?;
    let funders: Vec<String> = config
        .ledger
        .genesis_accounts
        .iter()
        .map(|a| a.address.clone())
        .collect();

    let mut recipients = Vec::with_capacity(cli.accounts.max(1));
    for _ in 0..cli.accounts.max(1) {
        let account = ledger.create_account()?;
        println!("{} {}", "➕ Created account".green(), account.address);
        recipients.push(account.address);
    }
    println!();

    for round in 1..=cli.rounds {
        for _ in 0..cli.transfers {
            let (Some(sender), Some(recipient)) =
                (funders.choose(&mut rng), recipients.choose(&mut rng))
            else {
                break;
            };
            let amount = Amount::from_num(rng.gen_range(1..=100u32));
            let request = TransferRequest::new(sender.clone(), recipient.clone(), amount)
                .with_data(format!("round {}", round));

            match ledger.stage_transaction(request) {
                Ok(id) => println!(
                    "{} {} → {} : {} ({})",
                    "📤".bold(),
                    short(sender),
                    short(recipient),
                    amount,
                    short(&id)
                ),
                Err(e) => println!("{} {}", "❌ Rejected:".red(), e),
            }
        }

        let miner = &recipients[(round - 1) % recipients.len()];
        match ledger.mine_pending(miner)? {
            Some(block) => println!(
                "{} #{} {} ({} txs, nonce {})",
                "⛏️  Mined block".yellow().bold(),
                block.index,
                short(&block.hash_str()),
                block.transactions.len(),
                block.nonce
            ),
            None => println!("{}", "⏸️  Nothing to mine".yellow()),
        }
        println!();
    }

    print_blocks(&ledger.blocks_page(0, ledger.block_count()));
    print_accounts(&ledger);
    print_stats(&ledger);

    match ledger.validate_chain() {
        Ok(()) => println!("{}", "✅ Chain is valid".green().bold()),
        Err(e) => println!("{} {}", "❌ Chain is invalid:".red().bold(), e),
    }
    Ok(())
}

fn short(value: &str) -> String {
    if value.len() > 14 {
        format!("{}...{}", &value[..8], &value[value.len() - 4..])
    } else {
        value.to_string()
    }
}

fn header(titles: &[&str]) -> Vec<Cell> {
    titles
        .iter()
        .map(|t| Cell::new(t).fg(TableColor::Cyan).add_attribute(Attribute::Bold))
        .collect()
}

fn print_blocks(blocks: &[Block]) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header(&["Block", "Hash", "Parent", "Txs", "Gas", "Validator", "Time"]));

    for block in blocks {
        let time = chrono::DateTime::from_timestamp_millis(block.timestamp as i64)
            .map(|t| t.format("%H:%M:%S%.3f").to_string())
            .unwrap_or_default();
        table.add_row(vec![
            Cell::new(block.index).fg(TableColor::Green),
            Cell::new(short(&block.hash_str())),
            Cell::new(short(&hex::encode(block.previous_hash))),
            Cell::new(block.transactions.len()),
            Cell::new(block.gas_used),
            Cell::new(short(&block.validator)),
            Cell::new(time),
        ]);
    }
    println!("{table}");
}

fn print_accounts(ledger: &Ledger) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header(&["Address", "Balance", "Nonce", "Sent"]));

    for account in ledger.accounts_by_balance() {
        table.add_row(vec![
            Cell::new(short(&account.address)),
            Cell::new(account.balance).fg(TableColor::Yellow),
            Cell::new(account.nonce),
            Cell::new(account.transaction_count),
        ]);
    }
    println!("{table}");
    println!("{} {}", "💰 Total supply:".bold(), ledger.total_supply());
}

fn print_stats(ledger: &Ledger) {
    let stats = ledger.network_stats();
    println!("{} {}", "📦 Blocks:".bold(), stats.block_count);
    println!("{} {}", "⏳ Pending:".bold(), stats.pending_count);
    println!("{} {:.3}s", "⏱️  Avg block time:".bold(), stats.avg_block_time);
    println!("{} {:.2}", "⚡ TPS:".bold(), stats.tps);
    println!("{} {}", "👥 Accounts:".bold(), stats.account_count);
    println!();
}
