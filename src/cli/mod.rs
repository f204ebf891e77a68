use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::application::{BalanceView, LedgerService, PaymentEventProcessor};
use crate::clients::AllowAllOwners;
use crate::domain::{AccountId, AccountStatus, AuditRecord, OwnerType, format_amount, parse_amount};

/// Fiscus - Payment Account Ledger
#[derive(Parser)]
#[command(name = "fiscus")]
#[command(about = "A payment-account balance ledger with reservations, transfers and an audit trail")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, default_value = "fiscus.db")]
    pub database: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Account lifecycle commands
    #[command(subcommand)]
    Account(AccountCommands),

    /// Show the balance of an account
    Balance {
        /// Account id or account number
        account: String,
    },

    /// Credit settled funds
    Increase {
        /// Account id or account number
        account: String,

        /// Amount to credit (e.g., "50.00" or "50")
        amount: String,
    },

    /// Debit settled funds
    Decrease {
        /// Account id or account number
        account: String,

        /// Amount to debit
        amount: String,
    },

    /// Place a hold on available funds
    Reserve {
        /// Account id or account number
        account: String,

        /// Amount to hold
        amount: String,
    },

    /// Settle a hold into a spend (funds leave the account)
    Release {
        /// Account id or account number
        account: String,

        /// Amount to release
        amount: String,
    },

    /// Drop a hold without moving money
    Cancel {
        /// Account id or account number
        account: String,

        /// Amount of the reservation to cancel
        amount: String,
    },

    /// Transfer settled funds between two accounts
    Transfer {
        /// Amount to transfer
        amount: String,

        /// Source account id or number
        #[arg(long)]
        from: String,

        /// Destination account id or number
        #[arg(long)]
        to: String,
    },

    /// Show an account's audit trail
    History {
        /// Account id or account number
        account: String,
    },

    /// Feed a payment-authorization event through the listener boundary
    ApplyEvent {
        /// Event payload as a JSON string
        payload: String,
    },
}

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Open a new account (starts pending; activate it before use)
    Open {
        /// Owner type: user or project
        #[arg(long)]
        owner_type: String,

        /// Owner id in the owning service
        #[arg(long)]
        owner_id: i64,

        /// Currency code
        #[arg(long, default_value = "EUR")]
        currency: String,
    },

    /// Activate an account
    Activate {
        /// Account id or account number
        account: String,
    },

    /// Freeze (block) an account
    Freeze {
        /// Account id or account number
        account: String,
    },

    /// Close an account permanently
    Close {
        /// Account id or account number
        account: String,
    },

    /// Show account details
    Show {
        /// Account id or account number
        account: String,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Init => {
                LedgerService::init(&self.database, Arc::new(AllowAllOwners)).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::Account(account_cmd) => {
                let service = connect(&self.database).await?;
                run_account_command(&service, account_cmd).await?;
            }

            Commands::Balance { account } => {
                let service = connect(&self.database).await?;
                let account_id = resolve_account(&service, &account).await?;
                let view = service.get_balance(account_id).await?;
                print_balance(&view);
            }

            Commands::Increase { account, amount } => {
                let service = connect(&self.database).await?;
                let account_id = resolve_account(&service, &account).await?;
                let amount = parse_amount(&amount).context("Invalid amount format")?;
                let view = service.increase(account_id, amount).await?;
                println!("Credited {}", format_amount(amount));
                print_balance(&view);
            }

            Commands::Decrease { account, amount } => {
                let service = connect(&self.database).await?;
                let account_id = resolve_account(&service, &account).await?;
                let amount = parse_amount(&amount).context("Invalid amount format")?;
                let view = service.decrease(account_id, amount).await?;
                println!("Debited {}", format_amount(amount));
                print_balance(&view);
            }

            Commands::Reserve { account, amount } => {
                let service = connect(&self.database).await?;
                let account_id = resolve_account(&service, &account).await?;
                let amount = parse_amount(&amount).context("Invalid amount format")?;
                let view = service.reserve(account_id, amount).await?;
                println!("Reserved {}", format_amount(amount));
                print_balance(&view);
            }

            Commands::Release { account, amount } => {
                let service = connect(&self.database).await?;
                let account_id = resolve_account(&service, &account).await?;
                let amount = parse_amount(&amount).context("Invalid amount format")?;
                let view = service.release(account_id, amount).await?;
                println!("Released {}", format_amount(amount));
                print_balance(&view);
            }

            Commands::Cancel { account, amount } => {
                let service = connect(&self.database).await?;
                let account_id = resolve_account(&service, &account).await?;
                let amount = parse_amount(&amount).context("Invalid amount format")?;
                let view = service.cancel_reservation(account_id, amount).await?;
                println!("Cancelled reservation of {}", format_amount(amount));
                print_balance(&view);
            }

            Commands::Transfer { amount, from, to } => {
                let service = connect(&self.database).await?;
                let from_id = resolve_account(&service, &from).await?;
                let to_id = resolve_account(&service, &to).await?;
                let amount = parse_amount(&amount).context("Invalid amount format")?;
                let outcome = service.transfer(from_id, to_id, amount).await?;
                println!("Transferred {} from {} to {}", format_amount(amount), from, to);
                print_balance(&outcome.from);
                print_balance(&outcome.to);
            }

            Commands::History { account } => {
                let service = connect(&self.database).await?;
                let account_id = resolve_account(&service, &account).await?;
                let records = service.history(account_id).await?;
                if records.is_empty() {
                    println!("No audit records for account {}", account);
                } else {
                    for record in &records {
                        print_audit_record(record);
                    }
                }
            }

            Commands::ApplyEvent { payload } => {
                let service = connect(&self.database).await?;
                let processor = PaymentEventProcessor::new(Arc::new(service));
                let view = processor.handle(&payload).await?;
                println!("Event applied");
                print_balance(&view);
            }
        }

        Ok(())
    }
}

async fn connect(database: &str) -> Result<LedgerService> {
    Ok(LedgerService::connect(database, Arc::new(AllowAllOwners)).await?)
}

async fn run_account_command(service: &LedgerService, cmd: AccountCommands) -> Result<()> {
    match cmd {
        AccountCommands::Open {
            owner_type,
            owner_id,
            currency,
        } => {
            let owner_type = OwnerType::from_str(&owner_type)
                .with_context(|| format!("Unknown owner type '{}'. Use user or project", owner_type))?;
            let account = service.open_account(owner_type, owner_id, currency).await?;
            println!("Opened account {} ({})", account.number, account.id);
            println!("  Status: {}", account.status);
        }

        AccountCommands::Activate { account } => {
            let account_id = resolve_account(service, &account).await?;
            let account = service
                .update_status(account_id, AccountStatus::Active)
                .await?;
            println!("Account {} is now {}", account.number, account.status);
        }

        AccountCommands::Freeze { account } => {
            let account_id = resolve_account(service, &account).await?;
            let account = service
                .update_status(account_id, AccountStatus::Frozen)
                .await?;
            println!("Account {} is now {}", account.number, account.status);
        }

        AccountCommands::Close { account } => {
            let account_id = resolve_account(service, &account).await?;
            let account = service
                .update_status(account_id, AccountStatus::Closed)
                .await?;
            println!("Account {} is now {}", account.number, account.status);
        }

        AccountCommands::Show { account } => {
            let account_id = resolve_account(service, &account).await?;
            let account = service.get_account(account_id).await?;
            println!("Account: {}", account.number);
            println!("  Id:       {}", account.id);
            println!("  Owner:    {} {}", account.owner_type, account.owner_id);
            println!("  Currency: {}", account.currency);
            println!("  Status:   {}", account.status);
            println!("  Opened:   {}", account.created_at.format("%Y-%m-%d %H:%M"));
            if let Some(closed_at) = account.closed_at {
                println!("  Closed:   {}", closed_at.format("%Y-%m-%d %H:%M"));
            }

            let view = service.get_balance(account_id).await?;
            print_balance(&view);
        }
    }

    Ok(())
}

/// Accept either an account UUID or an account number.
async fn resolve_account(service: &LedgerService, reference: &str) -> Result<AccountId> {
    match Uuid::parse_str(reference) {
        Ok(id) => Ok(id),
        Err(_) => Ok(service.get_account_by_number(reference).await?.id),
    }
}

fn print_balance(view: &BalanceView) {
    println!(
        "Balance {}: actual {}, authorized {}",
        view.account_id,
        format_amount(view.actual),
        format_amount(view.authorized)
    );
}

fn print_audit_record(record: &AuditRecord) {
    let correlation = record
        .correlation_id
        .as_deref()
        .map(|cid| format!(" [{}]", cid))
        .unwrap_or_default();
    println!(
        "{}  {:<20} v{:<4} actual {:>12}  authorized {:>12}{}",
        record.created_at.format("%Y-%m-%d %H:%M:%S"),
        record.operation.as_str(),
        record.version,
        format_amount(record.actual),
        format_amount(record.authorized),
        correlation
    );
}
