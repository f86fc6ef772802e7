use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use material_ledger::config::Config;
use material_ledger::report::{self, PurchaseFilter};
use material_ledger::{BlobStore, Database, Ledger, RemovePolicy};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

/// Track material stock, purchases and weighted-average cost.
#[derive(Parser, Debug)]
#[command(name = "material_ledger", version, about)]
struct Cli {
    /// SQLite file holding the ledger (overrides MATERIAL_LEDGER_DB).
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register, list, adjust or remove materials.
    Material {
        #[command(subcommand)]
        action: MaterialCommand,
    },
    /// Record or remove purchases.
    Purchase {
        #[command(subcommand)]
        action: PurchaseCommand,
    },
    /// Show purchases, newest first.
    History(HistoryArgs),
    /// Show stock, invested total and average price per material.
    Dashboard,
}

#[derive(Subcommand, Debug)]
enum MaterialCommand {
    /// Register a new material with empty stock.
    Add { name: String },
    /// List materials sorted by name.
    List,
    /// Blend a weight delta at a unit price into a material's average.
    Adjust {
        id: i64,
        #[arg(allow_negative_numbers = true)]
        delta_weight: f64,
        #[arg(allow_negative_numbers = true)]
        delta_price: f64,
    },
    /// Remove a material.
    Remove {
        id: i64,
        /// Also remove every purchase of this material.
        #[arg(long)]
        cascade: bool,
    },
}

#[derive(Subcommand, Debug)]
enum PurchaseCommand {
    /// Record a purchase of WEIGHT kg at PRICE_PER_KG.
    Add {
        material_id: i64,
        weight: f64,
        price_per_kg: f64,
        /// Purchase time (RFC 3339 or YYYY-MM-DD); defaults to now.
        #[arg(long)]
        date: Option<String>,
    },
    /// Remove a purchase and reverse its effect on the material.
    Remove {
        id: i64,
        /// Skip the confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Args, Debug)]
struct HistoryArgs {
    /// First day to include (YYYY-MM-DD).
    #[arg(long)]
    from: Option<NaiveDate>,
    /// Last day to include (YYYY-MM-DD).
    #[arg(long)]
    to: Option<NaiveDate>,
    /// Only purchases of this material id.
    #[arg(long)]
    material: Option<i64>,
}

// --- Helper Functions ---

/// Parses an RFC 3339 timestamp or a bare date (taken as midnight UTC).
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    let day = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .with_context(|| format!("invalid date {raw:?}, expected RFC 3339 or YYYY-MM-DD"))?;
    start_of_day(day)
}

fn start_of_day(day: NaiveDate) -> Result<DateTime<Utc>> {
    day.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .ok_or_else(|| anyhow!("invalid start of day for {day}"))
}

fn end_of_day(day: NaiveDate) -> Result<DateTime<Utc>> {
    day.and_hms_milli_opt(23, 59, 59, 999)
        .map(|dt| dt.and_utc())
        .ok_or_else(|| anyhow!("invalid end of day for {day}"))
}

/// The `--to` day is covered in full.
fn history_filter(args: &HistoryArgs) -> Result<PurchaseFilter> {
    Ok(PurchaseFilter {
        start: args.from.map(start_of_day).transpose()?,
        end: args.to.map(end_of_day).transpose()?,
        material_id: args.material,
    })
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn print_materials<S: BlobStore>(ledger: &Ledger<S>) {
    if ledger.materials().is_empty() {
        println!("No materials registered.");
        return;
    }
    println!("{:>4}  {:<24} {:>14} {:>12}", "ID", "NAME", "STOCK", "AVG/KG");
    for m in report::sorted_materials(ledger.materials()) {
        println!(
            "{:>4}  {:<24} {:>14} {:>12}",
            m.id,
            m.name,
            report::format_weight(m.weight),
            report::format_money(m.price_per_kg)
        );
    }
}

fn print_dashboard<S: BlobStore>(ledger: &Ledger<S>) {
    let cards = report::dashboard(ledger.materials());
    if cards.is_empty() {
        println!("No stock on hand.");
        return;
    }
    for card in cards {
        println!("{} Dashboard", card.name);
        println!("  Total stock:    {}", report::format_weight(card.total_weight));
        println!("  Total invested: {}", report::format_money(card.total_value));
        println!("  Average price:  {}/kg", report::format_money(card.average_price));
    }
}

fn print_history<S: BlobStore>(ledger: &Ledger<S>, filter: &PurchaseFilter) {
    if ledger.purchases().is_empty() {
        println!("No purchases recorded.");
        return;
    }
    println!(
        "{:>14}  {:<22} {:<20} {:>12} {:>10} {:>12}",
        "ID", "DATE", "MATERIAL", "WEIGHT", "PRICE/KG", "TOTAL"
    );
    for row in report::history(ledger.purchases(), ledger.materials(), filter) {
        let p = row.purchase;
        println!(
            "{:>14}  {:<22} {:<20} {:>12} {:>10} {:>12}",
            p.id,
            report::format_date(&p.date),
            row.material_name.unwrap_or("-"),
            report::format_weight(p.weight),
            report::format_money(p.price_per_kg),
            report::format_money(p.total)
        );
    }
}

fn run<S: BlobStore>(ledger: &mut Ledger<S>, command: Command) -> Result<()> {
    match command {
        Command::Material { action } => match action {
            MaterialCommand::Add { name } => {
                let m = ledger.add_material(&name)?;
                println!("Added material {} ({})", m.id, m.name);
            }
            MaterialCommand::List => print_materials(ledger),
            MaterialCommand::Adjust { id, delta_weight, delta_price } => {
                let m = ledger.update_material(id, delta_weight, delta_price)?;
                println!(
                    "{}: {} at {}/kg",
                    m.name,
                    report::format_weight(m.weight),
                    report::format_money(m.price_per_kg)
                );
            }
            MaterialCommand::Remove { id, cascade } => {
                let policy = if cascade { RemovePolicy::Cascade } else { RemovePolicy::Restrict };
                let removed = ledger.remove_material(id, policy)?;
                println!(
                    "Removed material {} ({}) and {} purchase(s)",
                    removed.material.id,
                    removed.material.name,
                    removed.purchases.len()
                );
            }
        },
        Command::Purchase { action } => match action {
            PurchaseCommand::Add { material_id, weight, price_per_kg, date } => {
                let date = match date {
                    Some(raw) => parse_timestamp(&raw)?,
                    None => Utc::now(),
                };
                let p = ledger.add_purchase(material_id, weight, price_per_kg, date)?;
                println!(
                    "Recorded purchase {}: {} at {}/kg, total {}",
                    p.id,
                    report::format_weight(p.weight),
                    report::format_money(p.price_per_kg),
                    report::format_money(p.total)
                );
            }
            PurchaseCommand::Remove { id, yes } => {
                if ledger.purchase(id).is_none() {
                    return Err(material_ledger::LedgerError::UnknownPurchase { id }.into());
                }
                if !yes && !confirm("Are you sure you want to delete this purchase?")? {
                    println!("Cancelled.");
                    return Ok(());
                }
                let p = ledger.remove_purchase(id)?;
                println!("Removed purchase {}", p.id);
            }
        },
        Command::History(args) => print_history(ledger, &history_filter(&args)?),
        Command::Dashboard => print_dashboard(ledger),
    }
    Ok(())
}

// --- Main Execution ---

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?.with_db_path(cli.db);

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_filter))
        .init();

    let db = Database::open(&config.db_path)
        .with_context(|| format!("failed to open ledger at {}", config.db_path.display()))?;
    let mut ledger = Ledger::open(db).context("failed to load ledger")?;

    run(&mut ledger, cli.command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use material_ledger::MemoryStore;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_rfc3339_and_bare_dates() {
        let ts = parse_timestamp("2024-05-01T10:30:00-03:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-05-01T13:30:00+00:00");
        let day = parse_timestamp("2024-05-01").unwrap();
        assert_eq!(day.to_rfc3339(), "2024-05-01T00:00:00+00:00");
        assert!(parse_timestamp("01/05/2024").is_err());
    }

    #[test]
    fn history_to_covers_whole_day() {
        let args = HistoryArgs {
            from: NaiveDate::from_ymd_opt(2024, 5, 1),
            to: NaiveDate::from_ymd_opt(2024, 5, 2),
            material: Some(3),
        };
        let filter = history_filter(&args).unwrap();
        assert_eq!(filter.start, Some(parse_timestamp("2024-05-01").unwrap()));
        assert!(filter.end.unwrap() > parse_timestamp("2024-05-02T23:59:59Z").unwrap());
        assert_eq!(filter.material_id, Some(3));
    }

    #[test]
    fn run_drives_the_ledger() {
        let mut ledger = Ledger::open(MemoryStore::new()).unwrap();
        let cli = Cli::parse_from(["material_ledger", "material", "add", "Copper"]);
        run(&mut ledger, cli.command).unwrap();
        let cli = Cli::parse_from(["material_ledger", "purchase", "add", "1", "10", "5"]);
        run(&mut ledger, cli.command).unwrap();
        let cli = Cli::parse_from(["material_ledger", "material", "adjust", "1", "-4", "5"]);
        run(&mut ledger, cli.command).unwrap();

        let m = ledger.material(1).unwrap();
        assert_eq!((m.weight, m.price_per_kg), (6.0, 5.0));

        let cli = Cli::parse_from(["material_ledger", "material", "remove", "1"]);
        assert!(run(&mut ledger, cli.command).is_err());
        let cli = Cli::parse_from(["material_ledger", "material", "remove", "1", "--cascade"]);
        run(&mut ledger, cli.command).unwrap();
        assert!(ledger.materials().is_empty());
        assert!(ledger.purchases().is_empty());
    }
}
