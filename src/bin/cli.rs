//! Option Factors CLI
//!
//! Command-line entry point for pricing, chain assembly and factor runs.
//!
//! Usage:
//!   option-factors greeks --spot 18000 --strike 18200 --days 30 --vol 0.2 --right call
//!   option-factors iv --spot 18000 --strike 18200 --days 30 --price 180 --right call
//!   option-factors chain --fixture chain.json --underlying TXO --expiry 2025-03-19
//!   option-factors factors --fixture snapshot.json --underlying TXO --date 2025-03-03
//!   option-factors daily --date 2025-03-03
//!
//! Environment:
//!   RUST_LOG - log filter (default: info)
//!   OPTION_FACTORS_CONFIG - pipeline config file

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use option_factors::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "option-factors")]
#[command(about = "Option chain, daily factor and Greeks toolkit")]
struct Args {
    /// Pipeline config (JSON); defaults apply when absent
    #[arg(long, global = true, env = "OPTION_FACTORS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Black-Scholes price and Greeks
    Greeks {
        #[arg(long)]
        spot: f64,
        #[arg(long)]
        strike: f64,
        /// Calendar days to expiry
        #[arg(long)]
        days: f64,
        #[arg(long)]
        vol: f64,
        #[arg(long, value_parser = parse_right)]
        right: OptionRight,
        /// Overrides the configured risk-free rate
        #[arg(long)]
        rate: Option<f64>,
    },

    /// Implied volatility from an observed price
    Iv {
        #[arg(long)]
        spot: f64,
        #[arg(long)]
        strike: f64,
        #[arg(long)]
        days: f64,
        #[arg(long)]
        price: f64,
        #[arg(long, value_parser = parse_right)]
        right: OptionRight,
        #[arg(long)]
        rate: Option<f64>,
    },

    /// Assemble a chain from a contracts/prices fixture
    Chain {
        #[arg(long)]
        fixture: PathBuf,
        #[arg(long)]
        underlying: String,
        #[arg(long)]
        expiry: NaiveDate,
        /// Fill Greeks on priced contracts
        #[arg(long)]
        greeks: bool,
        /// Valuation instant, RFC 3339 (default: now)
        #[arg(long)]
        as_of: Option<DateTime<Utc>>,
    },

    /// Daily factors from a captured chain snapshot
    Factors {
        /// JSON array of chain snapshot rows
        #[arg(long)]
        fixture: PathBuf,
        #[arg(long)]
        underlying: String,
        #[arg(long)]
        date: NaiveDate,
        /// Stage override (1-3); otherwise read from the stage config
        #[arg(long)]
        stage: Option<u8>,
        /// Spot override; otherwise implied from put-call parity
        #[arg(long)]
        spot: Option<f64>,
        /// Store the record in the factor directory
        #[arg(long)]
        save: bool,
    },

    /// Daily factor run for every enabled underlying against the broker gateway
    Daily {
        #[arg(long)]
        date: NaiveDate,
    },
}

/// Contracts plus latest prices, as captured from the stores
#[derive(Debug, Deserialize)]
struct ChainFixture {
    contracts: Vec<OptionContract>,
    #[serde(default)]
    prices: Vec<PriceRecord>,
}

fn parse_right(s: &str) -> Result<OptionRight, String> {
    OptionRight::from_label(s).ok_or_else(|| format!("expected call or put, got {:?}", s))
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> OptionsResult<()> {
    let config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };

    match args.command {
        Command::Greeks {
            spot,
            strike,
            days,
            vol,
            right,
            rate,
        } => {
            let rate = rate.unwrap_or(config.pricing.risk_free_rate);
            let time = days / 365.0;
            let greeks = bs_greeks(spot, strike, time, vol, right, rate)
                .ok_or_else(|| OptionsError::invalid_input("Greeks not computable for these inputs"))?;

            println!("Price: {:.4}", bs_price(spot, strike, time, vol, right, rate));
            println!("{}", serde_json::to_string_pretty(&greeks)?);
        }

        Command::Iv {
            spot,
            strike,
            days,
            price,
            right,
            rate,
        } => {
            let rate = rate.unwrap_or(config.pricing.risk_free_rate);
            let iv = implied_volatility_with(
                spot,
                strike,
                price,
                days / 365.0,
                right,
                rate,
                config.pricing.solver(),
            )
            .ok_or_else(|| OptionsError::data("implied volatility did not resolve"))?;
            println!("IV: {:.4} ({:.2}%)", iv, iv * 100.0);
        }

        Command::Chain {
            fixture,
            underlying,
            expiry,
            greeks,
            as_of,
        } => {
            let json = std::fs::read_to_string(&fixture)?;
            let fixture: ChainFixture = serde_json::from_str(&json)?;

            let contracts = InMemoryContractRepository::new();
            for contract in fixture.contracts {
                contracts.register(contract)?;
            }
            let prices = InMemoryPriceStore::new();
            for record in fixture.prices {
                prices.put(record)?;
            }

            let mut chain = OptionChainAssembler::new(contracts, prices)
                .build_chain(&underlying, expiry)?;

            if greeks {
                let snapshot = StageSnapshot {
                    greeks_enabled: true,
                    ..StageSnapshot::default()
                };
                GreeksCalculator::new(config.pricing.clone()).enrich_chain(
                    &mut chain,
                    &snapshot,
                    as_of.unwrap_or_else(Utc::now),
                );
            }
            println!("{}", serde_json::to_string_pretty(&chain)?);
        }

        Command::Factors {
            fixture,
            underlying,
            date,
            stage,
            spot,
            save,
        } => {
            let json = std::fs::read_to_string(&fixture)?;
            let rows: Vec<ChainSnapshotRow> = serde_json::from_str(&json)?;

            let mut snapshot =
                StageGate::new(JsonConfigStore::new(&config.store.config_path)).snapshot();
            if let Some(level) = stage {
                snapshot.stage = Stage::from_level(level)
                    .ok_or_else(|| OptionsError::invalid_input(format!("invalid stage {}", level)))?;
            }

            let prices = InMemoryPriceStore::new();
            if let Some(spot) = spot {
                prices.put(PriceRecord::new(&underlying, Utc::now(), spot))?;
            }

            let source = StaticOptionSource::new(rows);
            let record = FactorCalculator::new(&source, &prices, snapshot)
                .with_config(&config)
                .calculate_daily_factors(&underlying, date);

            if save {
                JsonFactorStore::new(&config.store.factor_dir)?.upsert(&record)?;
            }
            println!("{}", serde_json::to_string_pretty(&record)?);
        }

        Command::Daily { date } => {
            let client = RestBrokerClient::new(&config.source)?;
            let source = BrokerOptionSource::new(client, config.source.clone());

            let gate = StageGate::new(JsonConfigStore::new(&config.store.config_path));

            // Index spot files are named after the index, not the option class
            let prices: Arc<dyn PriceStore> = match &config.store.scid_dir {
                Some(dir) => Arc::new(gate.enabled_underlyings().iter().fold(
                    ScidPriceStore::new(dir),
                    |store, underlying| match OptionClass::resolve(underlying) {
                        Some(class) => store.with_alias(underlying.as_str(), class.spot_symbol()),
                        None => store,
                    },
                )),
                None => {
                    tracing::warn!("No scid_dir configured, spot will come from put-call parity");
                    Arc::new(InMemoryPriceStore::new())
                }
            };
            let factors = JsonFactorStore::new(&config.store.factor_dir)?;

            let summary = DailyFactorJob::new(source, prices, factors, gate)
                .with_config(config)
                .run(date);
            println!("{}", serde_json::to_string_pretty(&summary)?);

            if !summary.is_clean() {
                return Err(OptionsError::data(format!(
                    "{} underlyings failed",
                    summary.failed
                )));
            }
        }
    }

    Ok(())
}
