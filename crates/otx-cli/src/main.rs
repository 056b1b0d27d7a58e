use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "otx")]
#[command(about = "otx trading engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load + merge layered YAML config files and print the canonical hash.
    ConfigHash {
        /// Paths in merge order (base -> env -> engine -> risk -> stress...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Evaluate FINRA pattern-day-trader policy for a single proposed trade.
    PdtCheck {
        /// Trading day ID, e.g. 20260731.
        #[arg(long)]
        day_id: u32,

        /// Account equity in whole USD.
        #[arg(long)]
        equity_usd: i64,

        /// Number of day trades already recorded in the rolling window.
        #[arg(long, default_value_t = 0)]
        prior_day_trades: u32,

        /// Whether the proposed trade itself would count as a day trade.
        #[arg(long, default_value_t = false)]
        is_day_trade: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.cmd {
        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = otx_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::PdtCheck {
            day_id,
            equity_usd,
            prior_day_trades,
            is_day_trade,
        } => {
            let policy = otx_risk::PdtPolicy::finra_defaults();
            let mut state = otx_risk::PdtState::new();
            if prior_day_trades > 0 {
                state.day_trade_counts.insert(day_id, prior_day_trades);
            }

            let input = otx_risk::PdtInput {
                day_id,
                equity_micros: equity_usd * 1_000_000,
                is_day_trade,
            };

            let decision = otx_risk::evaluate_pdt(&policy, &state, &input);
            println!(
                "{}",
                serde_json::json!({
                    "trading_allowed": decision.trading_allowed,
                    "reason": format!("{:?}", decision.reason),
                    "window_day_trade_count": decision.window_day_trade_count,
                })
            );
        }
    }

    Ok(())
}
