//! penguins-train: fit encoding metadata and assemble serving bundles.
//!
//! - `penguins-train prepare --data penguins.csv --out work/`
//!   writes `work/metadata.json`, `work/design.csv` (the matrix to fit the
//!   model on) and `work/test.csv` (held-out rows, stratified by species).
//! - `penguins-train bundle --model model.json --metadata work/metadata.json --out data/`
//!   verifies the fitted model against the metadata and writes the bundle.
//! - `penguins-train evaluate --bundle data/ --data work/test.csv`
//!   scores the bundle on labelled rows through the serving path.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use penguins::artifact::{ArtifactStore, METADATA_FILE};
use penguins::config::ServeConfig;
use penguins::encoding::EncodingMetadata;
use penguins::logging;
use penguins::service::PredictionService;
use penguins::training::{
    encode_dataset, evaluate, fit_encoding, stratified_split, write_bundle, Dataset,
    DEFAULT_SPLIT_SEED, DEFAULT_TEST_FRACTION,
};

const DESIGN_FILE: &str = "design.csv";
const TEST_FILE: &str = "test.csv";

#[derive(Parser)]
#[command(name = "penguins-train")]
#[command(about = "Fit penguin encoding metadata and write serving bundles")]
#[command(version)]
struct Cli {
    /// Log filter (EnvFilter syntax)
    #[arg(long, default_value = "info", global = true)]
    log: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit metadata on a CSV dataset and write the encoded design matrix
    Prepare {
        /// Dataset CSV with a header row
        #[arg(short, long)]
        data: PathBuf,

        /// Output directory for metadata.json, design.csv and test.csv
        #[arg(short, long)]
        out: PathBuf,

        /// Share of each species held out in test.csv (0 disables the split)
        #[arg(long, default_value_t = DEFAULT_TEST_FRACTION)]
        test_fraction: f64,

        /// Seed for the split shuffle
        #[arg(long, default_value_t = DEFAULT_SPLIT_SEED)]
        seed: u64,
    },

    /// Verify a fitted model against metadata and write the bundle
    Bundle {
        /// XGBoost JSON model fitted on design.csv
        #[arg(short, long)]
        model: PathBuf,

        /// Metadata written by `prepare`
        #[arg(long)]
        metadata: PathBuf,

        /// Bundle directory to write
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Score a bundle on labelled rows and print per-class metrics
    Evaluate {
        /// Bundle directory or file:// locator
        #[arg(short, long)]
        bundle: String,

        /// Labelled CSV, e.g. the test.csv written by `prepare`
        #[arg(short, long)]
        data: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = logging::init(&cli.log) {
        eprintln!("Warning: {e}");
    }

    let result = match cli.command {
        Commands::Prepare {
            data,
            out,
            test_fraction,
            seed,
        } => cmd_prepare(&data, &out, test_fraction, seed),
        Commands::Bundle {
            model,
            metadata,
            out,
        } => cmd_bundle(&model, &metadata, &out),
        Commands::Evaluate { bundle, data } => cmd_evaluate(&bundle, &data),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn cmd_prepare(
    data: &Path,
    out: &Path,
    test_fraction: f64,
    seed: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut dataset = Dataset::read(data)?;
    let dropped = dataset.drop_incomplete();
    info!(rows = dataset.len(), dropped, "dataset loaded");

    // The vocabulary comes from every row; only the training split is encoded.
    let metadata = fit_encoding(&dataset)?;
    let (train, test) = stratified_split(&dataset, test_fraction, seed)?;
    let design = encode_dataset(&train, &metadata)?;

    fs::create_dir_all(out)?;
    fs::write(out.join(METADATA_FILE), metadata.to_json_pretty()?)?;
    design.write_csv(BufWriter::new(File::create(out.join(DESIGN_FILE))?))?;
    if !test.is_empty() {
        test.write_csv(BufWriter::new(File::create(out.join(TEST_FILE))?))?;
    }

    println!(
        "{} train / {} test rows x {} columns -> {}",
        design.len(),
        test.len(),
        metadata.num_columns(),
        out.display()
    );
    Ok(())
}

fn cmd_bundle(model: &Path, metadata: &Path, out: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let model_bytes = fs::read(model)?;
    let metadata = EncodingMetadata::from_json(&fs::read(metadata)?)?;
    let stamped = write_bundle(out, &model_bytes, metadata)?;
    println!(
        "bundle {} (model digest {})",
        out.display(),
        stamped.model_digest().unwrap_or("-")
    );
    Ok(())
}

fn cmd_evaluate(bundle: &str, data: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(ArtifactStore::with_fs(ServeConfig::default().load_timeout));
    store.load(bundle)?;
    let service = PredictionService::new(store);

    let report = evaluate(&service, &Dataset::read(data)?)?;
    println!("{report}");
    Ok(())
}
