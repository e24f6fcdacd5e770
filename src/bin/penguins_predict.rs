//! penguins-predict: answer newline-delimited JSON prediction requests.
//!
//! Each stdin line is one request payload; each stdout line is
//! `{"status": <code>, "body": <response>}`.
//!
//! ```text
//! echo '{"bill_length_mm":39.1,"bill_depth_mm":18.7,"flipper_length_mm":181,"body_mass_g":3750,"year":2007,"sex":"male","island":"Torgersen"}' \
//!   | penguins-predict --bundle data
//! ```

use std::io::{self, BufRead, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use penguins::artifact::ArtifactStore;
use penguins::config::{ServeConfig, BUNDLE_ENV};
use penguins::logging;
use penguins::service::{PredictionService, Response};

#[derive(Parser)]
#[command(name = "penguins-predict")]
#[command(about = "Classify penguins from newline-delimited JSON on stdin")]
#[command(version)]
struct Cli {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bundle locator, overriding config and environment
    #[arg(short, long)]
    bundle: Option<String>,

    /// Print the readiness check and exit
    #[arg(long)]
    health: bool,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = ServeConfig::load(cli.config.as_deref())?;
    if let Some(bundle) = &cli.bundle {
        config.bundle = bundle.clone();
    }
    if let Err(e) = logging::init(&config.log_filter) {
        eprintln!("Warning: {e}");
    }

    let store = Arc::new(ArtifactStore::with_fs(config.load_timeout));
    let service = PredictionService::new(Arc::clone(&store));
    if let Err(e) = store.load(&config.bundle) {
        // Keep serving: every request reports 503 until restarted with a good bundle.
        tracing::error!(error = %e, bundle = %config.bundle, hint = BUNDLE_ENV, "bundle unavailable");
    }

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    if cli.health {
        emit(&mut out, &service.health())?;
        return Ok(());
    }

    for line in io::stdin().lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        emit(&mut out, &service.handle_json(&line))?;
    }
    Ok(())
}

fn emit(out: &mut impl Write, response: &Response) -> io::Result<()> {
    serde_json::to_writer(&mut *out, response)?;
    writeln!(out)?;
    out.flush()
}
