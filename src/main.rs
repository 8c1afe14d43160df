// Bank Ledger - admin CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use bank_ledger::{
    AccountNumber, AuditSink, FanoutAuditSink, LedgerConfig, LedgerService, SqliteStore,
    TracingAuditSink,
};

#[derive(Parser)]
#[command(name = "bank-ledger")]
#[command(about = "Player bank ledger - admin tool", version)]
struct Cli {
    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database path (overrides config and environment)
    #[arg(long)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema
    Init,

    /// Create a bank on a lot
    CreateBank { name: String, lot_id: i64 },

    /// Delete a bank and its accounts
    DeleteBank { name: String },

    /// Show a bank and its accounts
    ShowBank { name: String },

    /// Open an account for a player
    OpenAccount {
        bank: String,
        player: String,
        /// Starting balance
        #[arg(long, default_value_t = 0)]
        balance: i64,
    },

    /// Deposit into a player's account
    Deposit { bank: String, player: String, amount: i64 },

    /// Withdraw from a player's account
    Withdraw { bank: String, player: String, amount: i64 },

    /// Overwrite the PIN of an account
    SetPin {
        bank: String,
        account_number: AccountNumber,
        pin: String,
    },

    /// Show a player's balance
    Balance { bank: String, player: String },

    /// Audit trail of one account
    Events {
        bank: String,
        account_number: AccountNumber,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = LedgerConfig::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.database_path = db;
    }

    let store = Arc::new(
        SqliteStore::open(&config.database_path)
            .with_context(|| format!("Failed to open {}", config.database_path.display()))?,
    );
    let sinks: Vec<Arc<dyn AuditSink>> = vec![store.clone(), Arc::new(TracingAuditSink)];
    let audit = Arc::new(FanoutAuditSink::new(sinks));
    let ledger = LedgerService::from_config(store.clone(), &config).with_audit(audit);

    run(&cli.command, &ledger, &store, &config)
}

fn run(
    command: &Commands,
    ledger: &LedgerService<Arc<SqliteStore>>,
    store: &SqliteStore,
    config: &LedgerConfig,
) -> Result<()> {
    match command {
        Commands::Init => {
            // Opening the store already created the schema
            println!("✓ Database initialized: {}", config.database_path.display());
        }

        Commands::CreateBank { name, lot_id } => {
            let bank = ledger.create_bank(name, *lot_id)?;
            println!("✓ Created bank {} (id {}, lot {})", bank.name, bank.id, bank.lot_id);
        }

        Commands::DeleteBank { name } => {
            let bank = ledger.get_bank(name)?;
            let accounts = bank.accounts.len();
            ledger.delete_bank(&bank)?;
            println!("✓ Deleted bank {} ({} accounts removed)", name, accounts);
        }

        Commands::ShowBank { name } => {
            let bank = ledger.get_bank(name)?;
            println!("🏦 {} (id {}, lot {})", bank.name, bank.id, bank.lot_id);
            println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
            for account in &bank.accounts {
                println!(
                    "  {:>14}  {:<20} {:>12}{}",
                    account.masked_number(),
                    account.player,
                    account.balance,
                    if account.has_pin() { "" } else { "  (no PIN)" }
                );
            }
            println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
            println!("  {} accounts, {} total", bank.accounts.len(), bank.total_deposits());
        }

        Commands::OpenAccount {
            bank,
            player,
            balance,
        } => {
            let bank = ledger.get_bank(bank)?;
            let account = ledger.create_account(&bank, player, *balance)?;
            println!(
                "✓ Opened account {} for {} with balance {}",
                account.account_number, account.player, account.balance
            );
        }

        Commands::Deposit {
            bank,
            player,
            amount,
        } => {
            let bank = ledger.get_bank(bank)?;
            let account = ledger.get_account_by_player(&bank, player)?;
            let account = ledger.deposit(&bank, &account, *amount)?;
            println!("✓ Deposited {}; balance is now {}", amount, account.balance);
        }

        Commands::Withdraw {
            bank,
            player,
            amount,
        } => {
            let bank = ledger.get_bank(bank)?;
            let account = ledger.get_account_by_player(&bank, player)?;
            if ledger.withdraw(&bank, &account, *amount)? {
                let account = ledger.get_account_by_player(&bank, player)?;
                println!("✓ Withdrew {}; balance is now {}", amount, account.balance);
            } else {
                println!("❌ Insufficient funds for {} to withdraw {}", player, amount);
            }
        }

        Commands::SetPin {
            bank,
            account_number,
            pin,
        } => {
            let bank = ledger.get_bank(bank)?;
            let account = ledger.get_account_by_number(&bank, *account_number)?;
            ledger.set_pin(&account, pin)?;
            println!("✓ PIN updated for account {}", account.account_number);
        }

        Commands::Balance { bank, player } => {
            let bank = ledger.get_bank(bank)?;
            let account = ledger.get_account_by_player(&bank, player)?;
            println!("{} @ {}: {}", account.player, bank.name, account.balance);
        }

        Commands::Events {
            bank,
            account_number,
        } => {
            let bank = ledger.get_bank(bank)?;
            let events = store.events_for_account(bank.id, *account_number)?;
            println!("📜 {} events for account {}", events.len(), account_number);
            for event in events {
                println!("{}", serde_json::to_string(&event)?);
            }
        }
    }

    Ok(())
}
