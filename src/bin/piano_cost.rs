use clap::Parser;
use piano::cost::estimate;
use piano::params::Params;
use std::error::Error;

#[derive(Parser)]
#[command(about = "Estimate Piano PIR resource costs by component")]
struct Args {
    /// Number of database entries
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    num_entries: u64,

    /// Primary hints (default: derived from the database size)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    primary_hints: Option<u64>,

    /// Backup hints per chunk (default: derived from the database size)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    backup_hints: Option<u64>,

    /// Replacement pairs per chunk (default: same as backup hints)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    replacements: Option<u64>,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let derived = Params::new(args.num_entries)?;
    let mut params = Params::with_counts(
        args.num_entries,
        args.primary_hints.unwrap_or(derived.num_primary_hints),
        args.backup_hints.unwrap_or(derived.backup_hints_per_chunk),
    )?;
    if let Some(r) = args.replacements {
        params = params.with_replacements_per_chunk(r)?;
    }

    let report = estimate(&params);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report);
    }
    Ok(())
}
