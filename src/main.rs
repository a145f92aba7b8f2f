//! pumpcli - build, preview and send pump curve and AMM trades
//!
//! Every trade subcommand resolves accounts, quotes by simulation where the
//! flow needs it and either prints the preview (`--preview`) or signs, sends
//! and waits for the configured confirmation level. `--relay-confirm` sends
//! through the relay and follows the bundle instead.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use pump_pipeline::accounts::AccountSet;
use pump_pipeline::config::AppConfig;
use pump_pipeline::confirm::{ConfirmationLevel, TxSubmitter};
use pump_pipeline::jito::JitoClient;
use pump_pipeline::layouts::KnownAccount;
use pump_pipeline::quote::{
    self, curve_buy_quote, fetch_bonding_curve, fetch_pool_reserves, scaled_price, Reserves,
};
use pump_pipeline::rpc::{ResilientClient, SolanaTransport};
use pump_pipeline::tx_builder::sim_errors::decode_simulation_error;
use pump_pipeline::tx_builder::{TradeBuild, TradeBuilder, TradeOptions, Venue};
use pump_pipeline::vanity::{self, VanityOptions};
use pump_pipeline::wallet::WalletManager;
use serde::Serialize;
use serde_json::json;
use solana_sdk::instruction::Instruction;
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Signature, Signer};
use solana_sdk::transaction::Transaction;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "pumpcli", author, version, about = "Pump curve and AMM trade builder", long_about = None)]
struct Cli {
    /// Path to a TOML or JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// RPC endpoint; overrides the network default
    #[arg(long, global = true)]
    rpc_url: Option<String>,

    /// mainnet | testnet | devnet | custom
    #[arg(long, global = true)]
    network: Option<String>,

    /// processed | confirmed | finalized
    #[arg(long, global = true)]
    commitment: Option<String>,

    /// solana-keygen keypair file of the trader
    #[arg(long, global = true)]
    keypair: Option<String>,

    /// Base58 private key of the trader; takes precedence over --keypair
    #[arg(long, global = true, env = "PUMP_PRIVATE_KEY", hide_env_values = true)]
    private_key: Option<String>,

    /// RPC deadline per logical call
    #[arg(long, global = true)]
    timeout_sec: Option<u64>,

    #[arg(long, global = true)]
    retry_attempts: Option<u32>,

    #[arg(long, global = true)]
    retry_backoff_ms: Option<u64>,

    /// 0 disables rate limiting
    #[arg(long, global = true)]
    rate_limit_rps: Option<f64>,

    /// Fallback filter when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Send through the block-engine relay
    #[arg(long, global = true)]
    jito: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Bonding-curve trades
    #[command(subcommand)]
    Curve(CurveCommand),

    /// AMM pool trades
    #[command(subcommand)]
    Amm(AmmCommand),

    /// Search for a keypair whose address matches a pattern
    Vanity(VanityArgs),

    /// Fetch an account and decode it when it is a known pump record
    Account { address: Pubkey },

    /// Wait for a signature to reach a confirmation level
    Confirm {
        signature: Signature,
        /// Defaults to the configured level
        #[arg(long)]
        level: Option<ConfirmationLevel>,
    },
}

#[derive(Subcommand, Debug)]
enum CurveCommand {
    /// Buy an exact token amount with a SOL cap
    Buy {
        #[arg(long)]
        mint: Pubkey,
        #[arg(long)]
        amount: u64,
        #[arg(long)]
        max_sol_cost: u64,
        #[command(flatten)]
        trade: TradeFlags,
    },
    /// Spend an exact SOL amount
    BuySol {
        #[arg(long)]
        mint: Pubkey,
        /// Lamports to spend
        #[arg(long)]
        sol_in: u64,
        #[arg(long)]
        slippage_bps: Option<u64>,
        #[command(flatten)]
        trade: TradeFlags,
    },
    /// Sell an exact token amount
    Sell {
        #[arg(long)]
        mint: Pubkey,
        #[arg(long)]
        amount: u64,
        #[arg(long)]
        slippage_bps: Option<u64>,
        /// Close the token account after selling
        #[arg(long)]
        close_ata: bool,
        #[command(flatten)]
        trade: TradeFlags,
    },
    /// Create a token with a fresh or vanity mint
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        uri: String,
        #[arg(long)]
        vanity_prefix: Option<String>,
        #[arg(long)]
        vanity_suffix: Option<String>,
        #[command(flatten)]
        trade: TradeFlags,
    },
    /// Create a Token-2022 mint, optionally in mayhem mode
    CreateV2 {
        #[arg(long)]
        name: String,
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        uri: String,
        #[arg(long)]
        mayhem: bool,
        #[arg(long)]
        vanity_prefix: Option<String>,
        #[arg(long)]
        vanity_suffix: Option<String>,
        #[command(flatten)]
        trade: TradeFlags,
    },
    /// Dry-run a buy of an exact token amount
    SimulateBuy {
        #[arg(long)]
        mint: Pubkey,
        #[arg(long)]
        amount: u64,
        #[arg(long)]
        max_sol_cost: u64,
    },
    /// Dry-run a sell with a fixed minimum output
    SimulateSell {
        #[arg(long)]
        mint: Pubkey,
        #[arg(long)]
        amount: u64,
        #[arg(long, default_value_t = 0)]
        min_sol_output: u64,
    },
    /// Reserves, price and an optional buy estimate
    Info {
        #[arg(long)]
        mint: Pubkey,
        /// Estimate a buy of this many lamports
        #[arg(long)]
        sol_in: Option<u64>,
    },
}

#[derive(Subcommand, Debug)]
enum AmmCommand {
    /// Buy an exact base amount with a quote cap
    Buy {
        #[arg(long)]
        pool: Pubkey,
        #[arg(long)]
        base_out: u64,
        #[arg(long)]
        max_quote_in: u64,
        #[command(flatten)]
        trade: TradeFlags,
    },
    /// Spend an exact quote amount
    BuySol {
        #[arg(long)]
        pool: Pubkey,
        #[arg(long)]
        quote_in: u64,
        #[arg(long)]
        slippage_bps: Option<u64>,
        #[command(flatten)]
        trade: TradeFlags,
    },
    /// Spend an exact quote amount with a fixed minimum base out
    BuyExactQuote {
        #[arg(long)]
        pool: Pubkey,
        #[arg(long)]
        quote_in: u64,
        #[arg(long)]
        min_base_out: u64,
        #[command(flatten)]
        trade: TradeFlags,
    },
    /// Sell an exact base amount
    Sell {
        #[arg(long)]
        pool: Pubkey,
        #[arg(long)]
        base_in: u64,
        #[arg(long)]
        slippage_bps: Option<u64>,
        /// Skip the dry run and derive the minimum from this output
        #[arg(long)]
        expected_quote_out: Option<u64>,
        #[arg(long)]
        close_base_ata: bool,
        #[command(flatten)]
        trade: TradeFlags,
    },
    /// Vault reserves, spot price and optional dry-run quotes
    PoolInfo {
        #[arg(long)]
        pool: Pubkey,
        /// Quote a buy spending this many quote units
        #[arg(long)]
        quote_in: Option<u64>,
        /// Quote a sell of this many base units
        #[arg(long)]
        base_in: Option<u64>,
    },
}

/// Flags shared by every trade subcommand
#[derive(Args, Debug)]
struct TradeFlags {
    /// Print accounts, args and instructions as JSON without sending
    #[arg(long)]
    preview: bool,

    /// JSON file of `{"role": "base58"}` account overrides
    #[arg(long)]
    override_json: Option<PathBuf>,

    #[arg(long)]
    no_track_volume: bool,

    /// Relay tip in lamports; defaults to the configured tip
    #[arg(long)]
    tip_lamports: Option<u64>,

    /// Token accounts known to exist
    #[arg(long, value_delimiter = ',')]
    known_ata: Vec<Pubkey>,

    /// Send through the relay and wait for the bundle to land
    #[arg(long)]
    relay_confirm: bool,
}

#[derive(Args, Debug)]
struct VanityArgs {
    #[arg(long, default_value = "")]
    prefix: String,
    #[arg(long, default_value = "")]
    suffix: String,
    /// 0 uses every core
    #[arg(long, default_value_t = 0)]
    workers: usize,
    #[arg(long)]
    timeout_sec: Option<u64>,
    #[arg(long)]
    case_insensitive: bool,
    /// Write the keypair as a solana-keygen JSON file
    #[arg(long)]
    out: Option<PathBuf>,
}

/// Clients shared by the trade subcommands
struct Runtime {
    config: AppConfig,
    private_key: Option<String>,
    builder: TradeBuilder,
    submitter: TxSubmitter,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_json)?;

    let config = load_config(&cli)?;
    let private_key = cli.private_key.clone();
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            on_signal.cancel();
        }
    });

    match cli.command {
        Command::Vanity(args) => run_vanity(args, &cancel).await,
        Command::Confirm { signature, level } => {
            let runtime = Runtime::new(config, private_key)?;
            let level = match level {
                Some(level) => level,
                None => runtime.config.trading.confirmation_level()?,
            };
            runtime
                .submitter
                .confirm(&cancel, &signature, level)
                .await
                .with_context(|| format!("Confirmation of {} failed", signature))?;
            println!("{} reached {}", signature, level);
            Ok(())
        }
        Command::Account { address } => {
            show_account(&Runtime::new(config, private_key)?, &address, &cancel).await
        }
        Command::Curve(command) => {
            run_curve(Runtime::new(config, private_key)?, command, &cancel).await
        }
        Command::Amm(command) => run_amm(Runtime::new(config, private_key)?, command, &cancel).await,
    }
}

/// Initialize logging subsystem
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .with_context(|| format!("Invalid log level: {}", level))?,
    };
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
    Ok(())
}

/// File (or environment) configuration with command line overrides on top
fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => AppConfig::from_env().context("Failed to load config from environment")?,
    };

    if let Some(network) = &cli.network {
        config.rpc.network = network.parse()?;
    }
    if let Some(url) = &cli.rpc_url {
        config.rpc.url = Some(url.clone());
    }
    if let Some(commitment) = &cli.commitment {
        config.rpc.commitment = commitment.clone();
    }
    if let Some(path) = &cli.keypair {
        config.wallet.keypair_path = path.clone();
    }
    if let Some(secs) = cli.timeout_sec {
        config.rpc.timeout_ms = secs * 1000;
    }
    if let Some(attempts) = cli.retry_attempts {
        config.rpc.retry.max_attempts = attempts;
    }
    if let Some(backoff) = cli.retry_backoff_ms {
        config.rpc.retry.initial_backoff_ms = backoff;
    }
    if let Some(rps) = cli.rate_limit_rps {
        config.rpc.rate_limit.rps = rps;
    }
    if cli.jito {
        config.jito.enabled = true;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

impl Runtime {
    fn new(config: AppConfig, private_key: Option<String>) -> Result<Self> {
        let transport = SolanaTransport::from_config(&config.rpc)?;
        let client = ResilientClient::new(Arc::new(transport), config.rpc.clone())?;
        info!(endpoint = %client.endpoint(), "RPC client ready");

        let mut submitter =
            TxSubmitter::new(client.clone()).with_skip_preflight(config.trading.skip_preflight);
        if config.jito.enabled {
            let jito = JitoClient::new(&config.jito).context("Failed to create relay client")?;
            info!(endpoints = jito.endpoints().len(), "Relay submission enabled");
            submitter = submitter.with_jito(Arc::new(jito));
        }

        Ok(Self {
            builder: TradeBuilder::new(client),
            submitter,
            config,
            private_key,
        })
    }

    fn wallet(&self) -> Result<WalletManager> {
        let wallet = match &self.private_key {
            Some(encoded) => WalletManager::from_base58(encoded),
            None => WalletManager::from_file(&self.config.wallet.keypair_path),
        };
        wallet.context("Failed to load wallet")
    }

    fn options(&self, flags: &TradeFlags) -> Result<TradeOptions> {
        let mut opts = TradeOptions {
            preview: flags.preview,
            track_volume: self.config.trading.track_volume && !flags.no_track_volume,
            vanity_timeout: self.config.trading.vanity_timeout(),
            known_atas: flags.known_ata.clone(),
            jito_tip_lamports: flags
                .tip_lamports
                .unwrap_or(self.config.trading.jito_tip_lamports),
            ..Default::default()
        };
        if let Some(path) = &flags.override_json {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read overrides from {}", path.display()))?;
            opts.merge_overrides_from_json(&raw)?;
        }
        Ok(opts)
    }

    fn slippage(&self, flag: Option<u64>) -> u64 {
        flag.unwrap_or(self.config.trading.slippage_bps)
    }

    /// Print the preview, or sign, send and confirm
    async fn execute<A: AccountSet, G: Serialize>(
        &self,
        cancel: &CancellationToken,
        wallet: &WalletManager,
        build: &TradeBuild<A, G>,
        flags: &TradeFlags,
        extra_signers: &[&dyn Signer],
    ) -> Result<()> {
        if flags.preview {
            println!("{}", serde_json::to_string_pretty(&build.preview())?);
            return Ok(());
        }

        let mut signers: Vec<&dyn Signer> = vec![wallet.keypair()];
        signers.extend_from_slice(extra_signers);
        let transaction = self
            .submitter
            .sign(cancel, &wallet.pubkey(), &signers, &build.instructions)
            .await
            .context("Failed to sign transaction")?;

        if flags.relay_confirm {
            let sent = self
                .submitter
                .send_via_relay_and_confirm(cancel, &transaction)
                .await
                .context("Bundle failed")?;
            println!("tx signature: {} (bundle {})", sent.signature, sent.bundle_id);
            return Ok(());
        }

        let level = self.config.trading.confirmation_level()?;
        let signature = self
            .submitter
            .send_and_confirm(cancel, &transaction, level)
            .await
            .context("Transaction failed")?;
        println!("tx signature: {}", signature);
        Ok(())
    }
}

async fn run_curve(rt: Runtime, command: CurveCommand, cancel: &CancellationToken) -> Result<()> {
    if let CurveCommand::Info { mint, sol_in } = command {
        return curve_info(&rt, &mint, sol_in, cancel).await;
    }
    let wallet = rt.wallet()?;
    let user = wallet.pubkey();
    match command {
        CurveCommand::Buy {
            mint,
            amount,
            max_sol_cost,
            trade,
        } => {
            let opts = rt.options(&trade)?;
            let build = rt
                .builder
                .curve_buy_exact(cancel, &user, &mint, amount, max_sol_cost, &opts)
                .await?;
            rt.execute(cancel, &wallet, &build, &trade, &[]).await
        }
        CurveCommand::BuySol {
            mint,
            sol_in,
            slippage_bps,
            trade,
        } => {
            let opts = rt.options(&trade)?;
            let build = rt
                .builder
                .curve_buy_with_sol(cancel, &user, &mint, sol_in, rt.slippage(slippage_bps), &opts)
                .await?;
            rt.execute(cancel, &wallet, &build, &trade, &[]).await
        }
        CurveCommand::Sell {
            mint,
            amount,
            slippage_bps,
            close_ata,
            trade,
        } => {
            let opts = TradeOptions {
                close_base_ata: close_ata,
                ..rt.options(&trade)?
            };
            let build = rt
                .builder
                .curve_sell(cancel, &user, &mint, amount, rt.slippage(slippage_bps), &opts)
                .await?;
            rt.execute(cancel, &wallet, &build, &trade, &[]).await
        }
        CurveCommand::Create {
            name,
            symbol,
            uri,
            vanity_prefix,
            vanity_suffix,
            trade,
        } => {
            let opts = TradeOptions {
                vanity_prefix,
                vanity_suffix,
                ..rt.options(&trade)?
            };
            let (build, mint) = rt
                .builder
                .curve_create(cancel, &user, &name, &symbol, &uri, &opts)
                .await?;
            info!(mint = %mint.pubkey(), "Mint keypair ready");
            rt.execute(cancel, &wallet, &build, &trade, &[&mint as &dyn Signer])
                .await
        }
        CurveCommand::CreateV2 {
            name,
            symbol,
            uri,
            mayhem,
            vanity_prefix,
            vanity_suffix,
            trade,
        } => {
            let opts = TradeOptions {
                vanity_prefix,
                vanity_suffix,
                ..rt.options(&trade)?
            };
            let (build, mint) = rt
                .builder
                .curve_create_v2(cancel, &user, &name, &symbol, &uri, mayhem, &opts)
                .await?;
            info!(mint = %mint.pubkey(), mayhem, "Mint keypair ready");
            rt.execute(cancel, &wallet, &build, &trade, &[&mint as &dyn Signer])
                .await
        }
        CurveCommand::SimulateBuy {
            mint,
            amount,
            max_sol_cost,
        } => {
            let build = rt
                .builder
                .curve_buy_exact(cancel, &user, &mint, amount, max_sol_cost, &TradeOptions::default())
                .await?;
            simulate(&rt, cancel, &user, &build.instructions).await
        }
        CurveCommand::SimulateSell {
            mint,
            amount,
            min_sol_output,
        } => {
            let opts = TradeOptions {
                expected_sol_out: Some(min_sol_output),
                ..Default::default()
            };
            let build = rt
                .builder
                .curve_sell(cancel, &user, &mint, amount, 0, &opts)
                .await?;
            simulate(&rt, cancel, &user, &build.instructions).await
        }
        CurveCommand::Info { mint, sol_in } => curve_info(&rt, &mint, sol_in, cancel).await,
    }
}

/// Reserves and spot price of a curve, plus a buy estimate when asked
async fn curve_info(
    rt: &Runtime,
    mint: &Pubkey,
    sol_in: Option<u64>,
    cancel: &CancellationToken,
) -> Result<()> {
    let curve = fetch_bonding_curve(rt.builder.client(), cancel, mint).await?;
    let reserves = Reserves::from(&curve);
    let mut report = json!({
        "mint": mint.to_string(),
        "complete": curve.complete,
        "creator": curve.creator.to_string(),
        "virtual_sol_reserves": curve.virtual_sol_reserves,
        "virtual_token_reserves": curve.virtual_token_reserves,
        "real_sol_reserves": curve.real_sol_reserves,
        "real_token_reserves": curve.real_token_reserves,
        "spot_price": scaled_price(reserves.quote, reserves.base),
    });
    if let Some(sol_in) = sol_in {
        report["buy_estimate"] = serde_json::to_value(curve_buy_quote(
            &curve,
            sol_in,
            rt.config.trading.slippage_bps,
        ))?;
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Dry-run `instructions` unsigned and print the outcome
async fn simulate(
    rt: &Runtime,
    cancel: &CancellationToken,
    user: &Pubkey,
    instructions: &[Instruction],
) -> Result<()> {
    let transaction = Transaction::new_unsigned(Message::new(instructions, Some(user)));
    let outcome = rt
        .builder
        .client()
        .simulate_transaction(cancel, &transaction, std::slice::from_ref(user))
        .await
        .context("Simulation request failed")?;

    let report = json!({
        "error": outcome
            .err
            .as_ref()
            .map(|err| decode_simulation_error(Venue::BondingCurve, err, &outcome.logs).to_string()),
        "units_consumed": outcome.units_consumed,
        "user_lamports_after": outcome
            .accounts
            .first()
            .and_then(Option::as_ref)
            .map(|account| account.lamports),
        "logs": outcome.logs,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Raw account summary, with the decoded record for pump accounts
async fn show_account(rt: &Runtime, address: &Pubkey, cancel: &CancellationToken) -> Result<()> {
    let account = rt
        .builder
        .client()
        .get_account(cancel, address)
        .await?
        .with_context(|| format!("Account {} not found", address))?;

    println!("address:  {}", address);
    println!("owner:    {}", account.owner);
    println!("lamports: {}", account.lamports);
    println!("data len: {}", account.data.len());
    match KnownAccount::decode(&account.data) {
        Ok(known) => println!("{}: {:#?}", known.name(), known),
        Err(err) => println!("not a known pump record: {}", err),
    }
    Ok(())
}

/// Vault reserves and spot price of a pool, plus dry-run quotes when asked
async fn pool_info(
    rt: &Runtime,
    pool: &Pubkey,
    quote_in: Option<u64>,
    base_in: Option<u64>,
    cancel: &CancellationToken,
) -> Result<()> {
    let reserves = fetch_pool_reserves(rt.builder.client(), cancel, pool).await?;
    let mut report = json!({
        "pool": pool.to_string(),
        "base_reserves": reserves.base,
        "quote_reserves": reserves.quote,
        "spot_price": quote::pool_spot_price(rt.builder.client(), cancel, pool).await?,
    });

    if quote_in.is_some() || base_in.is_some() {
        let user = rt.wallet()?.pubkey();
        let slippage = rt.config.trading.slippage_bps;
        if let Some(quote_in) = quote_in {
            let buy =
                quote::amm_buy_quote(&rt.builder, cancel, &user, pool, quote_in, slippage).await?;
            report["buy_quote"] = serde_json::to_value(buy)?;
        }
        if let Some(base_in) = base_in {
            let sell =
                quote::amm_sell_quote(&rt.builder, cancel, &user, pool, base_in, slippage).await?;
            report["sell_quote"] = serde_json::to_value(sell)?;
        }
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run_amm(rt: Runtime, command: AmmCommand, cancel: &CancellationToken) -> Result<()> {
    if let AmmCommand::PoolInfo {
        pool,
        quote_in,
        base_in,
    } = command
    {
        return pool_info(&rt, &pool, quote_in, base_in, cancel).await;
    }
    let wallet = rt.wallet()?;
    let user = wallet.pubkey();
    match command {
        AmmCommand::Buy {
            pool,
            base_out,
            max_quote_in,
            trade,
        } => {
            let opts = rt.options(&trade)?;
            let build = rt
                .builder
                .amm_buy_exact_out(cancel, &user, &pool, base_out, max_quote_in, &opts)
                .await?;
            rt.execute(cancel, &wallet, &build, &trade, &[]).await
        }
        AmmCommand::BuySol {
            pool,
            quote_in,
            slippage_bps,
            trade,
        } => {
            let opts = rt.options(&trade)?;
            let build = rt
                .builder
                .amm_buy_with_quote(cancel, &user, &pool, quote_in, rt.slippage(slippage_bps), &opts)
                .await?;
            rt.execute(cancel, &wallet, &build, &trade, &[]).await
        }
        AmmCommand::BuyExactQuote {
            pool,
            quote_in,
            min_base_out,
            trade,
        } => {
            let opts = TradeOptions {
                expected_base_out: Some(min_base_out),
                ..rt.options(&trade)?
            };
            let build = rt
                .builder
                .amm_buy_with_quote(cancel, &user, &pool, quote_in, 0, &opts)
                .await?;
            rt.execute(cancel, &wallet, &build, &trade, &[]).await
        }
        AmmCommand::Sell {
            pool,
            base_in,
            slippage_bps,
            expected_quote_out,
            close_base_ata,
            trade,
        } => {
            let opts = TradeOptions {
                expected_quote_out,
                close_base_ata,
                ..rt.options(&trade)?
            };
            let build = rt
                .builder
                .amm_sell(cancel, &user, &pool, base_in, rt.slippage(slippage_bps), &opts)
                .await?;
            rt.execute(cancel, &wallet, &build, &trade, &[]).await
        }
        AmmCommand::PoolInfo {
            pool,
            quote_in,
            base_in,
        } => pool_info(&rt, &pool, quote_in, base_in, cancel).await,
    }
}

async fn run_vanity(args: VanityArgs, cancel: &CancellationToken) -> Result<()> {
    let options = VanityOptions {
        prefix: args.prefix,
        suffix: args.suffix,
        workers: args.workers,
        timeout: args.timeout_sec.map(Duration::from_secs),
        case_insensitive: args.case_insensitive,
    };
    info!(
        expected_attempts = vanity::estimate_difficulty(options.prefix.len(), options.suffix.len()),
        "Starting vanity search"
    );

    let found = vanity::search(options, cancel).await?;
    println!(
        "{} ({} attempts in {:.1}s)",
        found.keypair.pubkey(),
        found.attempts,
        found.elapsed.as_secs_f64()
    );

    if let Some(path) = args.out {
        let bytes = zeroize::Zeroizing::new(found.keypair.to_bytes().to_vec());
        let json = zeroize::Zeroizing::new(serde_json::to_string(&*bytes)?);
        std::fs::write(&path, json.as_bytes())
            .with_context(|| format!("Failed to write keypair to {}", path.display()))?;
        info!(path = %path.display(), "Keypair written");
    }
    Ok(())
}
