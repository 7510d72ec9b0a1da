use clap::Parser;
use piano::client::Client;
use piano::messages::ClientError;
use piano::params::{Params, Word};
use piano::server::{InMemoryDb, Server};
use piano::stream::{ReaderChunks, SliceChunks};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use sha3::{Digest, Sha3_256};
use std::collections::HashSet;
use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(about = "Simulate a Piano PIR session against an in-memory server")]
struct Args {
    /// Number of database entries (ignored with --db)
    #[arg(long, default_value_t = 1 << 16, value_parser = clap::value_parser!(u64).range(1..))]
    num_entries: u64,

    /// Little-endian u64 database image to serve instead of random data
    #[arg(long)]
    db: Option<PathBuf>,

    /// Primary hints (default: derived from the database size)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    primary_hints: Option<u64>,

    /// Backup hints per chunk (default: derived from the database size)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    backup_hints: Option<u64>,

    /// Replacement pairs per chunk (default: same as backup hints)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    replacements: Option<u64>,

    /// Queries to run (default: expected query budget)
    #[arg(long)]
    queries: Option<u64>,

    /// RNG seed; 0 draws fresh entropy
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Write the final session state here
    #[arg(long)]
    state_out: Option<PathBuf>,
}

fn rng_from_seed(seed: u64, label: &str) -> ChaCha20Rng {
    if seed == 0 {
        return ChaCha20Rng::from_entropy();
    }
    let mut hasher = Sha3_256::new();
    hasher.update(label.as_bytes());
    hasher.update(seed.to_le_bytes());
    let out = hasher.finalize();
    let mut key = [0u8; 32];
    key.copy_from_slice(&out);
    ChaCha20Rng::from_seed(key)
}

fn build_params(args: &Args, num_entries: u64) -> Result<Params, ClientError> {
    let derived = Params::new(num_entries)?;
    let params = Params::with_counts(
        num_entries,
        args.primary_hints.unwrap_or(derived.num_primary_hints),
        args.backup_hints.unwrap_or(derived.backup_hints_per_chunk),
    )?;
    match args.replacements {
        Some(r) => params.with_replacements_per_chunk(r),
        None => Ok(params),
    }
}

fn load_db(args: &Args) -> Result<Vec<Word>, Box<dyn Error>> {
    match &args.db {
        Some(path) => {
            let bytes = std::fs::read(path)?;
            Ok(InMemoryDb::from_le_bytes(&bytes)?.as_slice().to_vec())
        }
        None => {
            let mut rng = rng_from_seed(args.seed, "db");
            Ok((0..args.num_entries).map(|_| rng.gen()).collect())
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();

    let entries = load_db(&args)?;
    let params = build_params(&args, entries.len() as u64)?;
    println!(
        "params: entries={} chunk_size={} chunks={} primary={} backups/chunk={} replacements/chunk={}",
        params.num_entries,
        params.chunk_size,
        params.chunk_count,
        params.num_primary_hints,
        params.backup_hints_per_chunk,
        params.replacements_per_chunk
    );

    let start = Instant::now();
    let client_rng = rng_from_seed(args.seed, "client");
    let mut client = match &args.db {
        Some(path) => {
            let reader = BufReader::new(File::open(path)?);
            Client::setup(&params, &mut ReaderChunks::new(reader, &params), client_rng)?
        }
        None => Client::setup(&params, &mut SliceChunks::new(&entries, &params), client_rng)?,
    };
    println!("preprocess_ms={}", start.elapsed().as_millis());

    let server = Server::new(InMemoryDb::new(entries.clone())?)?;
    let num_queries = args
        .queries
        .unwrap_or_else(|| params.expected_query_budget())
        .min(params.num_entries);

    let mut target_rng = rng_from_seed(args.seed, "targets");
    let mut asked = HashSet::new();
    let start = Instant::now();
    let mut answered = 0u64;
    while answered < num_queries {
        let target = target_rng.gen_range(0..params.num_entries);
        if !asked.insert(target) {
            continue;
        }
        match client.query(&mut &server, target) {
            Ok(value) if value == entries[target as usize] => answered += 1,
            Ok(value) => {
                return Err(format!(
                    "wrong answer at index {}: got {:#x}, expected {:#x}",
                    target, value, entries[target as usize]
                )
                .into())
            }
            Err(e) if e.is_exhaustion() => {
                println!("exhausted after {} queries: {}", answered, e);
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        }
    }
    let elapsed = start.elapsed();
    println!(
        "queries={} total_ms={} avg_us={}",
        answered,
        elapsed.as_millis(),
        elapsed.as_micros() / u128::from(answered.max(1))
    );

    if let Some(path) = &args.state_out {
        let bytes = client.state().serialize_state()?;
        std::fs::write(path, &bytes)?;
        println!("state_bytes={} path={}", bytes.len(), path.display());
    }
    Ok(())
}
