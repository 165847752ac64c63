mod display;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use ledger_core::constants::{DEFAULT_DIFFICULTY, MAX_DIFFICULTY};
use ledger_core::{Chain, ChainConfig, Miner};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ledger-cli")]
#[command(about = "Build and verify an in-memory proof-of-work ledger")]
struct Cli {
    /// Leading hex zeros required of each block hash
    #[arg(long, default_value_t = DEFAULT_DIFFICULTY,
          value_parser = clap::value_parser!(u32).range(1..=MAX_DIFFICULTY as i64))]
    difficulty: u32,
    /// Mine on all cores
    #[arg(long)]
    parallel: bool,
    /// Transfer to append, as FROM:TO:AMOUNT (repeatable)
    #[arg(long = "transfer", value_name = "FROM:TO:AMOUNT", value_parser = parse_transfer)]
    transfers: Vec<Transfer>,
    /// Print the chain as JSON instead of text
    #[arg(long)]
    json: bool,
    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[derive(Clone, Debug, PartialEq)]
struct Transfer {
    from: String,
    to: String,
    amount: f64,
}

fn parse_transfer(s: &str) -> std::result::Result<Transfer, String> {
    let parts: Vec<&str> = s.split(':').collect();
    let [from, to, amount] = parts.as_slice() else {
        return Err(format!("expected FROM:TO:AMOUNT, got {s:?}"));
    };
    let amount = amount
        .parse::<f64>()
        .map_err(|e| format!("invalid amount {amount:?}: {e}"))?;
    Ok(Transfer {
        from: from.to_string(),
        to: to.to_string(),
        amount,
    })
}

fn demo_transfers() -> Vec<Transfer> {
    vec![
        Transfer {
            from: "Cássio".into(),
            to: "Luana".into(),
            amount: 4.0,
        },
        Transfer {
            from: "Januário".into(),
            to: "Luiz".into(),
            amount: 7.0,
        },
    ]
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let config = ChainConfig {
        difficulty: cli.difficulty,
        miner: if cli.parallel {
            Miner::Parallel
        } else {
            Miner::Sequential
        },
    };
    let mut chain = Chain::with_config(config);

    let transfers = if cli.transfers.is_empty() {
        demo_transfers()
    } else {
        cli.transfers
    };
    for t in &transfers {
        chain
            .append(&t.from, &t.to, t.amount)
            .with_context(|| format!("failed to add block {} -> {}", t.from, t.to))?;
    }
    info!(blocks = chain.len(), "chain built");

    let valid = chain.is_valid();
    if cli.json {
        println!("{}", serde_json::to_string_pretty(chain.blocks())?);
    } else {
        println!("Is blockchain valid? {valid}");
        for (i, block) in chain.iter().enumerate() {
            println!("{}", display::render_block(i, block));
        }
    }
    ensure!(valid, "chain failed validation");
    Ok(())
}
