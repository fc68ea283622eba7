//! Offline WER scoring of a hypothesis transcript file against a reference.
//!
//! Both files hold one `"<id> <text>"` line per utterance.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use streamscribe::scoring;

#[derive(Parser)]
#[command(name = "wer", about = "Score a hypothesis transcript file against a reference")]
struct Args {
    /// Reference transcript file ("<id> <text>" per line)
    reference: PathBuf,

    /// Hypothesis transcript file in the same format
    hypothesis: PathBuf,

    /// Also print the report as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let report = scoring::wer_from_files(&args.reference, &args.hypothesis)?;

    for file in &report.per_file {
        println!("{} WER: {:.2}%", file.id, file.percent());
    }
    for id in &report.missing {
        println!("{} missing in hypothesis file.", id);
    }
    for id in &report.unexpected {
        println!("{} missing in reference file.", id);
    }
    println!("Overall WER: {:.2}%", report.aggregate_percent());

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}
