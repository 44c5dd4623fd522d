use anyhow::Context;
use clap::Parser;
use mediadup::{
    config::Config, find_duplicate_sets, fingerprint_file, fingerprint_pending,
    verify_candidate_sets, Catalog, Fingerprint,
};
use std::{
    fs::File,
    io::{stdout, BufReader, Write},
    path::{Path, PathBuf},
    process::ExitCode,
};

#[derive(Debug, clap::Parser)]
#[command(name = "mediadup", version, about = "Find near-duplicate cached media")]
struct Args {
    /// Configuration file (default: mediadup.toml, if present)
    #[clap(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, clap::Subcommand)]
enum Command {
    /// Print the fingerprint of each image
    Hash {
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },

    /// Print the bit distance between two images or hex fingerprints
    Compare { a: String, b: String },

    /// Fingerprint every cached catalog entry that has none yet
    Update,

    /// Print groups of visually similar media as JSON
    Clusters {
        /// Largest bit distance still counted as a duplicate
        #[clap(short, long)]
        threshold: Option<u32>,
    },

    /// Re-check candidate id groups against the catalog
    Verify {
        /// JSON file holding an array of id arrays
        candidates: PathBuf,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;

    match &args.command {
        Command::Hash { images } => hash(images),
        Command::Compare { a, b } => compare(a, b).map(|()| ExitCode::SUCCESS),
        Command::Update => update(&config).map(|()| ExitCode::SUCCESS),
        Command::Clusters { threshold } => {
            clusters(&config, threshold.unwrap_or(config.threshold)).map(|()| ExitCode::SUCCESS)
        }
        Command::Verify { candidates } => verify(&config, candidates).map(|()| ExitCode::SUCCESS),
    }
}

fn open_catalog(config: &Config) -> anyhow::Result<Catalog> {
    Catalog::open(&config.catalog)
        .with_context(|| format!("cannot open catalog {}", config.catalog.display()))
}

fn hash(images: &[PathBuf]) -> anyhow::Result<ExitCode> {
    let mut out = stdout().lock();
    let mut failures = 0;
    for path in images {
        match fingerprint_file(path) {
            Ok(fingerprint) => writeln!(out, "{fingerprint}  {}", path.display())?,
            Err(e) => {
                log::error!("{}: {e}", path.display());
                failures += 1;
            }
        }
    }
    Ok(if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn operand(arg: &str) -> anyhow::Result<Fingerprint> {
    let path = Path::new(arg);
    if path.exists() {
        return fingerprint_file(path).with_context(|| format!("cannot fingerprint {arg}"));
    }
    arg.parse()
        .with_context(|| format!("{arg} is neither an image file nor a hex fingerprint"))
}

fn compare(a: &str, b: &str) -> anyhow::Result<()> {
    let a = operand(a)?;
    let b = operand(b)?;
    println!("{}", a.distance(&b));
    Ok(())
}

fn update(config: &Config) -> anyhow::Result<()> {
    let mut catalog = open_catalog(config)?;
    let report = fingerprint_pending(&mut catalog, config.workers())?;
    if !report.hashed.is_empty() {
        catalog
            .save()
            .with_context(|| format!("cannot save catalog {}", config.catalog.display()))?;
    }
    println!(
        "{} fingerprinted, {} skipped",
        report.hashed.len(),
        report.failed.len()
    );
    Ok(())
}

fn clusters(config: &Config, threshold: u32) -> anyhow::Result<()> {
    let catalog = open_catalog(config)?;
    let sets = find_duplicate_sets(&catalog, threshold)?;
    let mut out = stdout().lock();
    serde_json::to_writer_pretty(&mut out, &sets)?;
    writeln!(out)?;
    Ok(())
}

fn verify(config: &Config, candidates_path: &Path) -> anyhow::Result<()> {
    let candidates: Vec<Vec<String>> =
        serde_json::from_reader(BufReader::new(File::open(candidates_path).with_context(
            || format!("cannot open {}", candidates_path.display()),
        )?))
        .with_context(|| format!("invalid candidate list {}", candidates_path.display()))?;

    let catalog = open_catalog(config)?;
    let sets = verify_candidate_sets(&catalog, &candidates)?;
    let mut out = stdout().lock();
    serde_json::to_writer_pretty(&mut out, &sets)?;
    writeln!(out)?;
    Ok(())
}
