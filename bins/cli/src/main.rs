//! Tally CLI
//!
//! Loads a JSON ledger snapshot, runs one engine operation, prints the outcome
//! as JSON on stdout and writes the new snapshot back.

mod store;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use tally_core::allocation::{IntervalPolicy, PaymentAdjustment};
use tally_core::{
    BatchPaymentRequest, Clock, LedgerSnapshot, PaymentMethod, PaymentStatus, ReceivableEngine,
    Sale, StatusFilter,
};
use tally_shared::{AppConfig, AppError, CustomerId, Money, ReceivableId, SaleId};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "tally")]
#[command(about = "Receivable ledger and payment reconciliation")]
struct Cli {
    /// Snapshot file (defaults to `storage.snapshot_path` from configuration).
    #[arg(long, global = true, env = "TALLY_SNAPSHOT")]
    snapshot: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create or update sales.
    Sale(SaleArgs),
    /// Allocate a payment across receivables.
    Pay(PayArgs),
    /// Reverse the most recent payment on a receivable.
    Reverse {
        /// Receivable to reverse.
        receivable: ReceivableId,
        /// Reverse every paid-into installment of the receivable's sale.
        #[arg(long)]
        group: bool,
    },
    /// Move a pending receivable's due date.
    Reschedule {
        /// Receivable to move.
        receivable: ReceivableId,
        /// New due date (YYYY-MM-DD).
        due_date: NaiveDate,
    },
    /// Delete a sale and its receivables.
    DeleteSale {
        /// Sale to delete.
        sale: SaleId,
    },
    /// List receivables.
    List {
        /// Status filter.
        #[arg(long, value_enum, default_value_t = StatusArg::All)]
        status: StatusArg,
    },
    /// Outstanding, overdue and received-today totals.
    Summary,
    /// Check the whole snapshot for consistency.
    Verify,
}

#[derive(Args, Debug)]
struct SaleArgs {
    #[command(subcommand)]
    command: SaleCommand,
}

#[derive(Subcommand, Debug)]
enum SaleCommand {
    /// Save a sale read from a JSON file (`-` for stdin).
    Save {
        /// Path to the sale JSON.
        file: PathBuf,
    },
    /// Record a new sale from flags.
    New(NewSaleArgs),
}

#[derive(Args, Debug)]
struct NewSaleArgs {
    /// Customer ID (a new one is generated when omitted).
    #[arg(long)]
    customer: Option<CustomerId>,
    /// Sale total, e.g. `1000.00`.
    #[arg(long)]
    total: Money,
    /// Payment method.
    #[arg(long, value_enum, default_value_t = MethodArg::Installment)]
    method: MethodArg,
    /// Sale date (defaults to today).
    #[arg(long)]
    date: Option<NaiveDate>,
    /// Number of installments.
    #[arg(long)]
    installments: Option<u32>,
    /// Days between installments (calendar months when omitted).
    #[arg(long, conflicts_with = "every_months")]
    every_days: Option<u32>,
    /// Months between installments.
    #[arg(long)]
    every_months: Option<u32>,
    /// Due date of the first installment.
    #[arg(long)]
    first_due: Option<NaiveDate>,
    /// Explicit due date per installment (repeatable).
    #[arg(long = "due", conflicts_with_all = ["installments", "first_due"])]
    due_dates: Vec<NaiveDate>,
    /// Record the sale as already paid.
    #[arg(long)]
    paid: bool,
}

#[derive(Args, Debug)]
struct PayArgs {
    /// Receivables to pay (repeatable).
    #[arg(long = "receivable", required = true)]
    receivables: Vec<ReceivableId>,
    /// Amount handed over, e.g. `250.00`.
    #[arg(long)]
    amount: Money,
    /// Discount as a fraction of the selected total (`0.10` = 10%).
    #[arg(long, group = "adjustment")]
    discount_rate: Option<Decimal>,
    /// Fixed discount.
    #[arg(long, group = "adjustment")]
    discount: Option<Money>,
    /// Surcharge as a fraction of the selected total.
    #[arg(long, group = "adjustment")]
    surcharge_rate: Option<Decimal>,
    /// Fixed surcharge.
    #[arg(long, group = "adjustment")]
    surcharge: Option<Money>,
    /// Renegotiated due date for whatever stays pending.
    #[arg(long)]
    due_date: Option<NaiveDate>,
}

impl PayArgs {
    fn adjustment(&self) -> Option<PaymentAdjustment> {
        self.discount_rate
            .map(PaymentAdjustment::discount_rate)
            .or_else(|| self.discount.map(PaymentAdjustment::discount_fixed))
            .or_else(|| self.surcharge_rate.map(PaymentAdjustment::surcharge_rate))
            .or_else(|| self.surcharge.map(PaymentAdjustment::surcharge_fixed))
    }

    fn into_request(self) -> BatchPaymentRequest {
        BatchPaymentRequest {
            adjustment: self.adjustment(),
            receivable_ids: self.receivables,
            payment_amount: self.amount,
            new_due_date: self.due_date,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum MethodArg {
    Cash,
    CreditCard,
    DebitCard,
    BankTransfer,
    Installment,
}

impl From<MethodArg> for PaymentMethod {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::Cash => Self::Cash,
            MethodArg::CreditCard => Self::CreditCard,
            MethodArg::DebitCard => Self::DebitCard,
            MethodArg::BankTransfer => Self::BankTransfer,
            MethodArg::Installment => Self::Installment,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum StatusArg {
    All,
    Pending,
    Paid,
    Overdue,
}

impl From<StatusArg> for StatusFilter {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::All => Self::All,
            StatusArg::Pending => Self::Pending,
            StatusArg::Paid => Self::Paid,
            StatusArg::Overdue => Self::Overdue,
        }
    }
}

fn main() -> ExitCode {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Logs go to stderr; stdout carries the JSON result
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tally=info,tally_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = err
                .downcast_ref::<AppError>()
                .map_or(1, AppError::exit_code);
            eprintln!("error: {err:#}");
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::load().map_err(AppError::from)?;
    let path = cli
        .snapshot
        .unwrap_or_else(|| PathBuf::from(&config.storage.snapshot_path));
    let engine = ReceivableEngine::new(config.engine);
    let snapshot = store::load(&path)?;

    let (next, output) = execute(&engine, &snapshot, cli.command)?;

    if let Some(next) = next {
        store::save(&path, &next)?;
        info!(path = %path.display(), "Snapshot written");
    }
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Run one command. Returns the snapshot to persist (for mutating commands)
/// and the JSON to print.
fn execute<C: Clock>(
    engine: &ReceivableEngine<C>,
    snapshot: &LedgerSnapshot,
    command: Command,
) -> anyhow::Result<(Option<LedgerSnapshot>, serde_json::Value)> {
    let result = match command {
        Command::Sale(SaleArgs { command }) => {
            let sale = match command {
                SaleCommand::Save { file } => read_sale(&file)?,
                SaleCommand::New(args) => new_sale(args, engine.clock().today()),
            };
            let sale_id = sale.id;
            let applied = engine.save_sale(snapshot, sale).map_err(AppError::from)?;
            committed(
                applied.snapshot,
                &json!({ "sale_id": sale_id, "outcome": applied.outcome }),
            )?
        }
        Command::Pay(args) => {
            let applied = engine
                .process_batch_payment(snapshot, &args.into_request())
                .map_err(AppError::from)?;
            committed(applied.snapshot, &applied.outcome)?
        }
        Command::Reverse {
            receivable,
            group: false,
        } => {
            let applied = engine
                .reverse_last_payment(snapshot, receivable)
                .map_err(AppError::from)?;
            committed(applied.snapshot, &applied.outcome)?
        }
        Command::Reverse {
            receivable,
            group: true,
        } => {
            let applied = engine
                .reverse_group(snapshot, receivable)
                .map_err(AppError::from)?;
            let failures: Vec<serde_json::Value> = applied
                .outcome
                .failures
                .iter()
                .map(|(id, err)| {
                    json!({
                        "receivable_id": id,
                        "code": err.error_code(),
                        "message": err.to_string(),
                    })
                })
                .collect();
            committed(
                applied.snapshot,
                &json!({ "reversed": applied.outcome.reversed, "failures": failures }),
            )?
        }
        Command::Reschedule {
            receivable,
            due_date,
        } => {
            let applied = engine
                .change_due_date(snapshot, receivable, due_date)
                .map_err(AppError::from)?;
            committed(
                applied.snapshot,
                &json!({ "receivable_id": receivable, "previous": applied.outcome, "due_date": due_date }),
            )?
        }
        Command::DeleteSale { sale } => {
            let applied = engine.delete_sale(snapshot, sale).map_err(AppError::from)?;
            committed(applied.snapshot, &json!({ "removed": applied.outcome }))?
        }
        Command::List { status } => {
            let listed = engine.receivables(snapshot, status.into());
            (None, serde_json::to_value(listed)?)
        }
        Command::Summary => (None, serde_json::to_value(engine.summary(snapshot))?),
        Command::Verify => {
            let violations: Vec<String> = engine
                .verify(snapshot)
                .iter()
                .map(ToString::to_string)
                .collect();
            if !violations.is_empty() {
                return Err(AppError::Internal(violations.join("; ")).into());
            }
            (None, json!({ "consistent": true }))
        }
    };
    Ok(result)
}

fn committed<T: Serialize>(
    snapshot: LedgerSnapshot,
    outcome: &T,
) -> anyhow::Result<(Option<LedgerSnapshot>, serde_json::Value)> {
    Ok((Some(snapshot), serde_json::to_value(outcome)?))
}

fn read_sale(file: &Path) -> anyhow::Result<Sale> {
    let raw = if file.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?
    };
    let sale = serde_json::from_str(&raw)
        .map_err(|e| AppError::Validation(format!("invalid sale JSON: {e}")))?;
    Ok(sale)
}

fn new_sale(args: NewSaleArgs, today: NaiveDate) -> Sale {
    let interval = match (args.every_days, args.every_months) {
        (Some(days), _) => Some(IntervalPolicy::Days(days)),
        (None, Some(months)) => Some(IntervalPolicy::Months(months)),
        (None, None) => None,
    };

    Sale {
        id: SaleId::new(),
        customer_id: args.customer.unwrap_or_default(),
        date: args.date.unwrap_or(today),
        items: vec![],
        total: args.total,
        payment_method: args.method.into(),
        payment_status: if args.paid {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Pending
        },
        installments: args.installments,
        installment_interval: interval,
        first_due_date: args.first_due,
        installment_dates: (!args.due_dates.is_empty()).then_some(args.due_dates),
    }
}
