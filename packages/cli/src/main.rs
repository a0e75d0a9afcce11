use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{anyhow, bail, Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use eth_stake::{
    constants::{BASE_DECIMALS, DEFAULT_EMISSION_PER_SECOND, MINIMUM_DEPOSIT},
    Asset, Lifecycle, PoolConfig, PriceQuote, StakeError,
};
use eth_stake_sdk::{unix_now, Error as SdkError, StakeClient};
use serde_json::json;
use solana_sdk::{
    pubkey::Pubkey,
    signature::{read_keypair_file, Keypair, Signer},
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

// ─── Helpers ──────────────────────────────────────────────────────────────────

/// Expand `~/` to `$HOME/` in keypair paths.
fn expand_home(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        format!("{}/{}", std::env::var("HOME").unwrap_or_default(), rest)
    } else {
        path.to_string()
    }
}

fn load_keypair(path: &str) -> Result<Keypair> {
    let expanded = expand_home(path);
    read_keypair_file(&expanded).map_err(|e| {
        anyhow!(
            "Cannot load keypair from '{}': {}\n  \
             Set ETH_STAKE_KEYPAIR, pass --keypair, or name the caller with --participant.",
            expanded,
            e
        )
    })
}

fn parse_pubkey(label: &str, value: &str) -> Result<Pubkey> {
    Pubkey::from_str(value).map_err(|_| anyhow!("{label} '{value}' is not a base-58 public key"))
}

/// `amount` atomic units as a decimal string with `decimals` places, trailing
/// zeros trimmed: 5_000_000_000_000_000_000 @ 18 → "5".
fn fmt_units(amount: u128, decimals: u8) -> String {
    let scale = 10u128.pow(decimals as u32);
    let (whole, frac) = (amount / scale, amount % scale);
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{:0width$}", frac, width = decimals as usize);
    format!("{whole}.{}", frac.trim_end_matches('0'))
}

fn short(key: &Pubkey) -> String {
    let s = key.to_string();
    format!("{}…{}", &s[..4], &s[s.len() - 4..])
}

// ─── CLI definition ───────────────────────────────────────────────────────────

/// ETH-Stake — single-asset staking pool with time-weighted rewards.
///
/// Every command supports --json for machine-readable output.
/// Global options can also be set via environment variables:
///   ETH_STAKE_STATE    — pool state file
///   ETH_STAKE_KEYPAIR  — path to the caller's Ed25519 keypair JSON
///   ETH_STAKE_NOW      — unix timestamp to use instead of the wall clock
#[derive(Parser)]
#[command(
    name    = "eth-stake",
    version = env!("CARGO_PKG_VERSION"),
    about   = "Stake ETH, accrue reward tokens per second, withdraw principal plus reward.",
    after_help = "\
ENVIRONMENT:
  ETH_STAKE_STATE    Pool state file  [default: ./eth-stake-state.json]
  ETH_STAKE_KEYPAIR  Path to Ed25519 keypair JSON  [default: ~/.config/solana/id.json]
  ETH_STAKE_NOW      Unix seconds used as the operation timestamp  [default: wall clock]
  RUST_LOG           Log filter for stderr  [default: warn]

QUICK START:
  eth-stake init      --reward-token <MINT> --price-feed <FEED> --reserve 50000000000000 --mint-reserve
  eth-stake faucet    --asset native --amount 5000000000000000000
  eth-stake deposit   --amount 5000000000000000000
  eth-stake position
  eth-stake withdraw"
)]
struct Cli {
    /// Pool state file (pool snapshot, local ledger, price)
    #[arg(
        long,
        global     = true,
        value_name = "PATH",
        default_value = eth_stake_sdk::DEFAULT_STATE_PATH,
        env = "ETH_STAKE_STATE"
    )]
    state: PathBuf,

    /// Path to the caller's Ed25519 keypair JSON file
    #[arg(
        long,
        global     = true,
        value_name = "PATH",
        default_value = "~/.config/solana/id.json",
        env = "ETH_STAKE_KEYPAIR"
    )]
    keypair: String,

    /// Act as this address instead of the keypair's public key
    #[arg(long, global = true, value_name = "PUBKEY")]
    participant: Option<String>,

    /// Operation timestamp in unix seconds (defaults to the wall clock)
    #[arg(long, global = true, value_name = "UNIX", env = "ETH_STAKE_NOW")]
    now: Option<u64>,

    /// Output machine-readable JSON instead of human-readable text
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn caller(&self) -> Result<Pubkey> {
        match &self.participant {
            Some(p) => parse_pubkey("--participant", p),
            None => Ok(load_keypair(&self.keypair)?.pubkey()),
        }
    }

    fn now(&self) -> Result<u64> {
        match self.now {
            Some(t) => Ok(t),
            None => Ok(unix_now()?),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create the pool and seed its reward reserve (owner only)
    ///
    /// The caller becomes the owner. The reserve is pulled from the caller
    /// into the pool vault, so the vault must be approved first; pass
    /// --mint-reserve on a local pool to credit and approve in one step.
    #[command(
        after_help = "\
EXAMPLES:
  # Fresh local pool, reserve credited and approved automatically
  eth-stake init --reward-token <MINT> --price-feed <FEED> --reserve 50000000000000 --mint-reserve

  # Faster emission, 10 ETH minimum, no price age limit
  eth-stake init --reward-token <MINT> --price-feed <FEED> --reserve 1000000 \\
      --emission-per-second 5000000 --minimum-deposit 10000000000000000000 --max-price-age 0

NOTES:
  If funding fails the pool stays uninitialized and the state file is kept.
  Run `eth-stake approve --amount <RESERVE>`, then `init` again. The retry
  applies the configuration flags it is given; the vault cannot change."
    )]
    Init {
        /// Mint of the token rewards are paid in
        #[arg(long, value_name = "MINT")]
        reward_token: String,

        /// Price feed address used to value positions
        #[arg(long, value_name = "FEED")]
        price_feed: String,

        /// Reward-token units to seed the reserve with
        #[arg(long, value_name = "AMOUNT")]
        reserve: u128,

        /// Custody address for staked ETH and the reserve (default: fresh key)
        #[arg(long, value_name = "PUBKEY")]
        vault: Option<String>,

        /// Reward-token units emitted per second across all stakers
        #[arg(long, value_name = "AMOUNT", default_value_t = DEFAULT_EMISSION_PER_SECOND)]
        emission_per_second: u128,

        /// Smallest accepted deposit in wei
        #[arg(long, value_name = "WEI", default_value_t = MINIMUM_DEPOSIT)]
        minimum_deposit: u128,

        /// Oldest acceptable price quote in seconds; 0 disables the check
        #[arg(long, value_name = "SECS", default_value_t = 3_600)]
        max_price_age: u64,

        /// Credit the reserve to the caller and approve the vault first (local ledger faucet)
        #[arg(long, default_value_t = false)]
        mint_reserve: bool,
    },

    /// Let the pool vault pull reward tokens from the caller
    #[command(after_help = "\
EXAMPLES:
  eth-stake approve --amount 50000000000000")]
    Approve {
        /// Reward-token units the vault may pull
        #[arg(long, value_name = "AMOUNT")]
        amount: u128,

        /// Reward token mint (defaults to the one given to `init`)
        #[arg(long, value_name = "MINT")]
        reward_token: Option<String>,
    },

    /// Credit balance on the local ledger
    #[command(after_help = "\
EXAMPLES:
  eth-stake faucet --asset native --amount 5000000000000000000
  eth-stake faucet --asset reward --amount 100000000 --to <PUBKEY>")]
    Faucet {
        /// `native`, `reward`, or a token mint address
        #[arg(long, value_name = "ASSET", default_value = "native")]
        asset: String,

        /// Atomic units to credit
        #[arg(long, value_name = "AMOUNT")]
        amount: u128,

        /// Recipient (defaults to the caller)
        #[arg(long, value_name = "PUBKEY")]
        to: Option<String>,
    },

    /// Stake ETH (wei) from the caller's balance
    ///
    /// Staking again while already staked settles the reward earned so far
    /// and keeps it; the larger principal earns from now on.
    #[command(after_help = "\
EXAMPLES:
  # Stake 5 ETH
  eth-stake deposit --amount 5000000000000000000

NOTES:
  Deposits below the pool minimum (5 ETH by default) are rejected and refunded.")]
    Deposit {
        /// Wei to stake
        #[arg(long, value_name = "WEI")]
        amount: u128,
    },

    /// Withdraw the whole stake plus accrued reward
    #[command(after_help = "\
NOTES:
  If the ledger refuses the payout the withdrawal stays committed and the
  payout is buffered. Run `eth-stake retry-payout` to complete it.")]
    Withdraw,

    /// Retry a buffered payout
    RetryPayout,

    /// Show pool totals, reserve and configuration
    PoolInfo,

    /// Show a participant's stake, reward and valuation
    Position {
        /// Participant to inspect (defaults to the caller)
        #[arg(long, value_name = "PUBKEY")]
        of: Option<String>,
    },

    /// Publish an oracle price for the pool's pair
    #[command(after_help = "\
EXAMPLES:
  # ETH at 2000.50 USD, 8-decimal rate
  eth-stake set-price --rate 200050000000 --decimals 8")]
    SetPrice {
        /// Quote units per whole ETH, scaled by 10^decimals
        #[arg(long, value_name = "RATE")]
        rate: u128,

        #[arg(long, value_name = "N", default_value_t = 8)]
        decimals: u8,

        /// Publication time in unix seconds (defaults to now)
        #[arg(long, value_name = "UNIX")]
        published_at: Option<u64>,
    },

    /// Show native and reward-token balances
    Balances {
        /// Address to inspect (defaults to the caller)
        #[arg(long, value_name = "PUBKEY")]
        of: Option<String>,
    },
}

fn main() -> Result<()> {
    if std::env::args().len() == 1 {
        Cli::command().print_long_help().ok();
        println!();
        return Ok(());
    }

    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    run(&cli)
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Init {
            reward_token,
            price_feed,
            reserve,
            vault,
            emission_per_second,
            minimum_deposit,
            max_price_age,
            mint_reserve,
        } => {
            let config = PoolConfig::default()
                .with_emission_per_second(*emission_per_second)
                .with_minimum_deposit(*minimum_deposit)
                .with_max_price_age((*max_price_age > 0).then_some(*max_price_age));
            cmd_init(
                cli,
                reward_token,
                price_feed,
                *reserve,
                vault.as_deref(),
                config,
                *mint_reserve,
            )?;
        }
        Commands::Approve { amount, reward_token } => {
            cmd_approve(cli, *amount, reward_token.as_deref())?;
        }
        Commands::Faucet { asset, amount, to } => {
            cmd_faucet(cli, asset, *amount, to.as_deref())?;
        }
        Commands::Deposit { amount } => cmd_deposit(cli, *amount)?,
        Commands::Withdraw => cmd_withdraw(cli)?,
        Commands::RetryPayout => cmd_retry_payout(cli)?,
        Commands::PoolInfo => cmd_pool_info(cli)?,
        Commands::Position { of } => cmd_position(cli, of.as_deref())?,
        Commands::SetPrice { rate, decimals, published_at } => {
            cmd_set_price(cli, *rate, *decimals, *published_at)?;
        }
        Commands::Balances { of } => cmd_balances(cli, of.as_deref())?,
    }
    Ok(())
}

// ─── State file ───────────────────────────────────────────────────────────────

fn open(path: &Path) -> Result<StakeClient> {
    StakeClient::open(path)
        .with_context(|| format!("Cannot open pool state '{}'", path.display()))
}

fn save(client: &StakeClient, path: &Path) -> Result<()> {
    client
        .save(path)
        .with_context(|| format!("Cannot write pool state '{}'", path.display()))
}

// ─── init ─────────────────────────────────────────────────────────────────────

fn cmd_init(
    cli: &Cli,
    reward_token: &str,
    price_feed: &str,
    reserve: u128,
    vault: Option<&str>,
    config: PoolConfig,
    mint_reserve: bool,
) -> Result<()> {
    let caller = cli.caller()?;
    let reward_token = parse_pubkey("--reward-token", reward_token)?;
    let price_feed = parse_pubkey("--price-feed", price_feed)?;

    let client = match StakeClient::open(&cli.state) {
        Ok(existing) => {
            if existing.pool().lifecycle() == Lifecycle::Live {
                bail!(
                    "Pool in '{}' is already initialized. Use a different --state to start over.",
                    cli.state.display()
                );
            }
            let stored = existing.pool().vault();
            if let Some(v) = vault {
                if parse_pubkey("--vault", v)? != stored {
                    bail!(
                        "Pool in '{}' already uses vault {stored}; approvals are bound to it. \
                         Drop --vault or use a different --state.",
                        cli.state.display()
                    );
                }
            }
            debug!(path = %cli.state.display(), "Resuming uninitialized pool");
            existing.reconfigure(config).context("Invalid pool configuration")?
        }
        Err(SdkError::StateNotFound(_)) => {
            let vault = match vault {
                Some(v) => parse_pubkey("--vault", v)?,
                None => Keypair::new().pubkey(),
            };
            StakeClient::create(caller, vault, config).context("Invalid pool configuration")?
        }
        Err(e) => {
            return Err(e).context(format!("Cannot open pool state '{}'", cli.state.display()))
        }
    };

    if mint_reserve {
        client.fund(Asset::Token(reward_token), &caller, reserve)?;
        client.approve_reserve(&caller, reward_token, reserve)?;
    }

    let outcome = client.initialize(&caller, reward_token, price_feed, reserve);
    save(&client, &cli.state)?;
    outcome.map_err(|e| match e {
        SdkError::Stake(StakeError::Ledger(_)) => anyhow!(
            "{e}\n  Funding the reserve failed; the pool is saved uninitialized.\n  \
             Run `eth-stake approve --amount {reserve}` (or pass --mint-reserve), then `init` again."
        ),
        other => anyhow!(other),
    })?;

    let info = client.pool_info();
    if cli.json {
        println!("{}", json!({
            "status":  "ok",
            "command": "init",
            "state":   cli.state.display().to_string(),
            "pool":    info,
        }));
    } else {
        println!("─── Pool Initialized ──────────────────────────────────────────────");
        println!("  Owner            {}", info.owner);
        println!("  Vault            {}", info.vault);
        println!("  Reward token     {reward_token}");
        println!("  Price feed       {price_feed}");
        println!("  Reserve          {:>28}", info.stake_rewards);
        println!("  Emission / sec   {:>28}", info.config.emission_per_second);
        let minimum = fmt_units(info.config.minimum_deposit, BASE_DECIMALS);
        println!("  Minimum deposit  {minimum:>28} ETH");
        println!("  State            {}", cli.state.display());
    }
    Ok(())
}

// ─── approve ──────────────────────────────────────────────────────────────────

fn cmd_approve(cli: &Cli, amount: u128, reward_token: Option<&str>) -> Result<()> {
    let caller = cli.caller()?;
    let client = open(&cli.state)?;
    let reward_token = match reward_token {
        Some(t) => parse_pubkey("--reward-token", t)?,
        None => client.pool().reward_token().ok_or_else(|| {
            anyhow!("Pool has no reward token yet; pass --reward-token <MINT>.")
        })?,
    };
    client.approve_reserve(&caller, reward_token, amount)?;
    save(&client, &cli.state)?;

    let vault = client.pool().vault();
    if cli.json {
        println!("{}", json!({
            "status":  "ok",
            "command": "approve",
            "owner":   caller.to_string(),
            "spender": vault.to_string(),
            "token":   reward_token.to_string(),
            "amount":  amount.to_string(),
        }));
    } else {
        println!("─── Approved ──────────────────────────────────────────────────────");
        println!("  Owner            {caller}");
        println!("  Spender (vault)  {vault}");
        println!("  Token            {reward_token}");
        println!("  Amount           {amount:>28}");
    }
    Ok(())
}

// ─── faucet ───────────────────────────────────────────────────────────────────

fn cmd_faucet(cli: &Cli, asset: &str, amount: u128, to: Option<&str>) -> Result<()> {
    let client = open(&cli.state)?;
    let to = match to {
        Some(t) => parse_pubkey("--to", t)?,
        None => cli.caller()?,
    };
    let asset = match asset {
        "native" | "eth" => Asset::Native,
        "reward" => Asset::Token(client.pool().reward_token().ok_or_else(|| {
            anyhow!("Pool has no reward token yet; pass its mint address instead.")
        })?),
        mint => Asset::Token(parse_pubkey("--asset", mint)?),
    };
    client.fund(asset, &to, amount)?;
    save(&client, &cli.state)?;

    if cli.json {
        println!("{}", json!({
            "status":  "ok",
            "command": "faucet",
            "asset":   asset.to_string(),
            "to":      to.to_string(),
            "amount":  amount.to_string(),
        }));
    } else {
        println!("  Credited {amount} {asset} to {to}");
    }
    Ok(())
}

// ─── deposit ──────────────────────────────────────────────────────────────────

fn cmd_deposit(cli: &Cli, amount: u128) -> Result<()> {
    let caller = cli.caller()?;
    let now = cli.now()?;
    let client = open(&cli.state)?;

    let receipt = client.deposit(&caller, amount, now).map_err(|e| match e {
        SdkError::Ledger(_) => anyhow!(
            "{e}\n  Credit ETH first: `eth-stake faucet --asset native --amount {amount}`."
        ),
        other => anyhow!(other),
    })?;
    save(&client, &cli.state)?;

    if cli.json {
        println!("{}", json!({
            "status":         "ok",
            "command":        "deposit",
            "participant":    caller.to_string(),
            "amount":         receipt.amount.to_string(),
            "principal":      receipt.principal.to_string(),
            "carried_reward": receipt.carried_reward.to_string(),
            "timestamp":      receipt.timestamp,
            "total_staked":   client.pool().total_staked().to_string(),
        }));
    } else {
        println!("─── Deposit ───────────────────────────────────────────────────────");
        println!("  Participant      {caller}");
        println!("  Staked           {:>28} ETH", fmt_units(receipt.amount, BASE_DECIMALS));
        println!("  Principal        {:>28} ETH", fmt_units(receipt.principal, BASE_DECIMALS));
        if receipt.carried_reward > 0 {
            println!("  Reward kept      {:>28}", receipt.carried_reward);
        }
        println!("  Timestamp        {}", receipt.timestamp);
        let total = fmt_units(client.pool().total_staked(), BASE_DECIMALS);
        println!("  Pool total       {total:>28} ETH");
    }
    Ok(())
}

// ─── withdraw ─────────────────────────────────────────────────────────────────

fn cmd_withdraw(cli: &Cli) -> Result<()> {
    let caller = cli.caller()?;
    let now = cli.now()?;
    let client = open(&cli.state)?;

    let result = client.withdraw(&caller, now);
    // A failed payout still commits the withdrawal; persist either way.
    save(&client, &cli.state)?;
    let receipt = result.map_err(|e| match e {
        SdkError::Stake(StakeError::PayoutFailed { .. }) => {
            anyhow!("{e}\n  The payout is buffered. Run `eth-stake retry-payout` to complete it.")
        }
        other => anyhow!(other),
    })?;

    let decimals = client.pool().config().reward_decimals;
    if cli.json {
        println!("{}", json!({
            "status":          "ok",
            "command":         "withdraw",
            "participant":     caller.to_string(),
            "principal":       receipt.principal.to_string(),
            "reward":          receipt.reward.to_string(),
            "principal_quote": receipt.principal_quote.map(|q| q.to_string()),
            "timestamp":       receipt.timestamp,
        }));
    } else {
        println!("─── Withdraw ──────────────────────────────────────────────────────");
        println!("  Participant      {caller}");
        println!("  Principal        {:>28} ETH", fmt_units(receipt.principal, BASE_DECIMALS));
        println!("  Reward           {:>28}", fmt_units(receipt.reward, decimals));
        match receipt.principal_quote {
            Some(q) => println!("  Principal value  {:>28}", fmt_units(q, decimals)),
            None => println!("  Principal value  — (no fresh price)"),
        }
    }
    Ok(())
}

// ─── retry-payout ─────────────────────────────────────────────────────────────

fn cmd_retry_payout(cli: &Cli) -> Result<()> {
    let caller = cli.caller()?;
    let client = open(&cli.state)?;

    let result = client.retry_payout(&caller);
    save(&client, &cli.state)?;
    let paid = result?;

    if cli.json {
        println!("{}", json!({
            "status":      "ok",
            "command":     "retry-payout",
            "participant": caller.to_string(),
            "principal":   paid.principal.to_string(),
            "reward":      paid.reward.to_string(),
        }));
    } else {
        println!("─── Payout Settled ────────────────────────────────────────────────");
        println!("  Participant      {caller}");
        println!("  Principal        {:>28} ETH", fmt_units(paid.principal, BASE_DECIMALS));
        let decimals = client.pool().config().reward_decimals;
        println!("  Reward           {:>28}", fmt_units(paid.reward, decimals));
    }
    Ok(())
}

// ─── pool-info ────────────────────────────────────────────────────────────────

fn cmd_pool_info(cli: &Cli) -> Result<()> {
    let client = open(&cli.state)?;
    let info = client.pool_info();

    if cli.json {
        println!("{}", json!({
            "status":  "ok",
            "command": "pool-info",
            "pool":    info,
        }));
        return Ok(());
    }

    let decimals = info.config.reward_decimals;
    let label = |k: Option<Pubkey>| k.map_or_else(|| "—".to_string(), |k| k.to_string());
    println!("─── Pool Info ─────────────────────────────────────────────────────");
    println!("  Lifecycle        {:?}", info.lifecycle);
    println!("  Owner            {}", info.owner);
    println!("  Vault            {}", info.vault);
    println!("  Reward token     {}", label(info.reward_token));
    println!("  Price feed       {}  ({})", label(info.price_feed), info.config.price_pair);
    println!();
    println!("  Total staked     {:>28} ETH", fmt_units(info.total_staked, BASE_DECIMALS));
    println!("  Stakers          {:>28}", info.participants);
    println!("  Reserve left     {:>28}", fmt_units(info.stake_rewards, decimals));
    println!("  Emitted          {:>28}", fmt_units(info.total_emitted, decimals));
    println!("  Paid out         {:>28}", fmt_units(info.total_reward_paid, decimals));
    println!("  Pending payouts  {:>28}", info.pending_payouts);
    println!("  Last checkpoint  {:>28}", info.latest_reward_timestamp);
    println!();
    println!("  Emission / sec   {:>28}", info.config.emission_per_second);
    let minimum = fmt_units(info.config.minimum_deposit, BASE_DECIMALS);
    println!("  Minimum deposit  {minimum:>28} ETH");
    match info.config.max_price_age_secs {
        Some(secs) => println!("  Max price age    {:>27}s", secs),
        None => println!("  Max price age    {:>28}", "unlimited"),
    }
    Ok(())
}

// ─── position ─────────────────────────────────────────────────────────────────

fn cmd_position(cli: &Cli, of: Option<&str>) -> Result<()> {
    let who = match of {
        Some(p) => parse_pubkey("--of", p)?,
        None => cli.caller()?,
    };
    let now = cli.now()?;
    let client = open(&cli.state)?;
    let pos = client.position(&who, now)?;

    if cli.json {
        println!("{}", json!({
            "status":   "ok",
            "command":  "position",
            "position": pos,
        }));
        return Ok(());
    }

    let decimals = client.pool().config().reward_decimals;
    println!("─── Position: {} ──────────────────────────────────────────", short(&who));
    if pos.principal == 0 && pos.pending_payout.is_none() {
        println!("  No stake.");
        return Ok(());
    }
    println!("  Principal        {:>28} ETH", fmt_units(pos.principal, BASE_DECIMALS));
    println!("  Reward (now)     {:>28}", fmt_units(pos.projected_reward, decimals));
    if let Some(v) = &pos.value {
        println!("  Principal value  {:>28}", fmt_units(v.principal_value, decimals));
        println!("  Total value      {:>28}", fmt_units(v.total_value, decimals));
    } else if let Some(reason) = &pos.value_error {
        println!("  Value            — ({reason})");
    }
    if let Some(p) = &pos.pending_payout {
        println!();
        println!("  Pending payout   {} ETH + {} reward  ({} failed attempt(s))",
                 fmt_units(p.principal, BASE_DECIMALS), fmt_units(p.reward, decimals), p.attempts);
        if p.principal_paid {
            println!("                   principal already paid; reward outstanding");
        }
    }
    Ok(())
}

// ─── set-price ────────────────────────────────────────────────────────────────

fn cmd_set_price(cli: &Cli, rate: u128, decimals: u8, published_at: Option<u64>) -> Result<()> {
    if decimals > 38 {
        bail!("--decimals must be at most 38");
    }
    let published_at = match published_at {
        Some(t) => t,
        None => cli.now()?,
    };
    let client = open(&cli.state)?;
    let quote = PriceQuote { rate, decimals, published_at };
    client.set_price(quote);
    save(&client, &cli.state)?;

    let pair = &client.pool().config().price_pair;
    if cli.json {
        println!("{}", json!({
            "status":  "ok",
            "command": "set-price",
            "pair":    pair,
            "price":   quote,
        }));
    } else {
        println!("  {pair} = {}  (published at {published_at})", fmt_units(rate, decimals));
    }
    Ok(())
}

// ─── balances ─────────────────────────────────────────────────────────────────

fn cmd_balances(cli: &Cli, of: Option<&str>) -> Result<()> {
    let who = match of {
        Some(p) => parse_pubkey("--of", p)?,
        None => cli.caller()?,
    };
    let client = open(&cli.state)?;
    let b = client.balances(&who);

    if cli.json {
        println!("{}", json!({
            "status":   "ok",
            "command":  "balances",
            "balances": b,
        }));
    } else {
        println!("─── Balances: {} ──────────────────────────────────────────", short(&who));
        println!("  ETH              {:>28}", fmt_units(b.native, BASE_DECIMALS));
        let decimals = client.pool().config().reward_decimals;
        match b.reward {
            Some(r) => println!("  Reward token     {:>28}", fmt_units(r, decimals)),
            None => println!("  Reward token     — (pool not initialized)"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use eth_stake::{constants::WEI_PER_ETH, TokenLedger};

    const T0: u64 = 1_700_000_000;
    const RESERVE: &str = "50000000000000";

    /// State file in the temp dir, removed on drop.
    struct TempState(PathBuf);

    impl TempState {
        fn new() -> Self {
            let name = format!("eth-stake-cli-{}.json", Pubkey::new_unique());
            Self(std::env::temp_dir().join(name))
        }

        fn exec(&self, args: &[&str]) -> Result<()> {
            let mut argv = vec!["eth-stake".to_string(), "--state".to_string()];
            argv.push(self.0.display().to_string());
            argv.extend(args.iter().map(|a| a.to_string()));
            run(&Cli::try_parse_from(argv)?)
        }

        fn client(&self) -> StakeClient {
            StakeClient::open(&self.0).unwrap()
        }
    }

    impl Drop for TempState {
        fn drop(&mut self) {
            std::fs::remove_file(&self.0).ok();
        }
    }

    struct Keys {
        owner: String,
        token: String,
        feed: String,
    }

    fn keys() -> Keys {
        Keys {
            owner: Pubkey::new_unique().to_string(),
            token: Pubkey::new_unique().to_string(),
            feed: Pubkey::new_unique().to_string(),
        }
    }

    fn live(state: &TempState, k: &Keys) {
        state
            .exec(&[
                "init", "--participant", &k.owner, "--reward-token", &k.token,
                "--price-feed", &k.feed, "--reserve", RESERVE, "--mint-reserve", "--json",
            ])
            .unwrap();
    }

    fn staked(state: &TempState, wei: u128) -> String {
        let who = Pubkey::new_unique().to_string();
        let (wei, now) = (wei.to_string(), T0.to_string());
        state.exec(&["faucet", "--participant", &who, "--amount", &wei, "--json"]).unwrap();
        state
            .exec(&["deposit", "--participant", &who, "--amount", &wei, "--now", &now, "--json"])
            .unwrap();
        who
    }

    #[test]
    fn units_trim_trailing_zeros() {
        assert_eq!(fmt_units(5_000_000_000_000_000_000, 18), "5");
        assert_eq!(fmt_units(1_500_000_000_000_000_000, 18), "1.5");
        assert_eq!(fmt_units(200_050_000_000, 8), "2000.5");
        assert_eq!(fmt_units(1, 8), "0.00000001");
        assert_eq!(fmt_units(42, 0), "42");
    }

    #[test]
    fn home_is_expanded() {
        std::env::set_var("HOME", "/home/staker");
        let expanded = expand_home("~/.config/solana/id.json");
        assert_eq!(expanded, "/home/staker/.config/solana/id.json");
        assert_eq!(expand_home("/abs/id.json"), "/abs/id.json");
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn json_reads_handle_amounts_past_u64() {
        let state = TempState::new();
        let k = keys();
        live(&state, &k);
        let whale = staked(&state, 20 * WEI_PER_ETH);
        let vault = state.client().pool().vault().to_string();
        let (now, later) = (T0.to_string(), (T0 + 60).to_string());

        state
            .exec(&["set-price", "--rate", "300000000000", "--now", &now, "--json"])
            .unwrap();
        state.exec(&["pool-info", "--json"]).unwrap();
        state.exec(&["position", "--participant", &whale, "--now", &later, "--json"]).unwrap();
        state.exec(&["balances", "--of", &vault, "--json"]).unwrap();
        state.exec(&["balances", "--participant", &whale, "--json"]).unwrap();

        assert_eq!(state.client().pool_info().total_staked, 20 * WEI_PER_ETH);
    }

    #[test]
    fn init_keeps_the_state_when_funding_fails_and_retries_after_approve() {
        let state = TempState::new();
        let k = keys();
        let init = |emission: &str| {
            state.exec(&[
                "init", "--participant", &k.owner, "--reward-token", &k.token,
                "--price-feed", &k.feed, "--reserve", RESERVE, "--emission-per-second", emission,
            ])
        };

        let err = init("7").unwrap_err();
        assert!(err.to_string().contains("eth-stake approve"), "{err}");
        let client = state.client();
        assert_eq!(client.pool().lifecycle(), Lifecycle::Uninitialized);
        assert_eq!(client.pool().config().emission_per_second, 7);

        state
            .exec(&["faucet", "--participant", &k.owner, "--asset", &k.token, "--amount", RESERVE])
            .unwrap();
        state
            .exec(&[
                "approve", "--participant", &k.owner, "--reward-token", &k.token,
                "--amount", RESERVE,
            ])
            .unwrap();
        init("9").unwrap();

        let info = state.client().pool_info();
        assert_eq!(info.lifecycle, Lifecycle::Live);
        assert_eq!(info.config.emission_per_second, 9);
        assert_eq!(info.stake_rewards, 50_000_000_000_000);

        let err = init("9").unwrap_err();
        assert!(err.to_string().contains("already initialized"), "{err}");
    }

    #[test]
    fn init_retry_cannot_move_the_vault() {
        let state = TempState::new();
        let k = keys();
        let init = |vault: &str| {
            state.exec(&[
                "init", "--participant", &k.owner, "--reward-token", &k.token,
                "--price-feed", &k.feed, "--reserve", RESERVE, "--vault", vault,
            ])
        };
        let vault = Pubkey::new_unique().to_string();

        init(&vault).unwrap_err();
        let err = init(&Pubkey::new_unique().to_string()).unwrap_err();
        assert!(err.to_string().contains("already uses vault"), "{err}");
        assert_eq!(state.client().pool().vault().to_string(), vault);
    }

    #[test]
    fn deferred_payouts_are_persisted_until_retried() {
        let state = TempState::new();
        let k = keys();
        live(&state, &k);
        let alice = staked(&state, 5 * WEI_PER_ETH);

        // drain the vault so the principal leg fails
        let client = state.client();
        let vault = client.pool().vault();
        let sink = Pubkey::new_unique();
        client.ledger().transfer(Asset::Native, &vault, &sink, 5 * WEI_PER_ETH).unwrap();
        client.save(&state.0).unwrap();

        let later = (T0 + 60).to_string();
        let err = state
            .exec(&["withdraw", "--participant", &alice, "--now", &later, "--json"])
            .unwrap_err();
        assert!(err.to_string().contains("retry-payout"), "{err}");

        let alice_key = parse_pubkey("alice", &alice).unwrap();
        let client = state.client();
        assert_eq!(client.pool().total_staked(), 0);
        assert_eq!(client.pool().pending_payout(&alice_key).unwrap().attempts, 1);
        state.exec(&["position", "--participant", &alice, "--now", &later, "--json"]).unwrap();

        state.exec(&["retry-payout", "--participant", &alice, "--json"]).unwrap_err();
        assert_eq!(state.client().pool().pending_payout(&alice_key).unwrap().attempts, 2);

        let wei = (5 * WEI_PER_ETH).to_string();
        state
            .exec(&["faucet", "--amount", &wei, "--to", &vault.to_string(), "--participant", &alice])
            .unwrap();
        state.exec(&["retry-payout", "--participant", &alice, "--json"]).unwrap();

        let client = state.client();
        assert!(client.pool().pending_payout(&alice_key).is_none());
        assert_eq!(client.balances(&alice_key).native, 5 * WEI_PER_ETH);
        assert!(client.balances(&alice_key).reward.unwrap() > 0);
    }
}
