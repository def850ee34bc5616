//! CLI for converting icon PNGs to dark-mode variants.
//!
//! Only built with the `clap` feature:
//!
//! ```sh
//! cargo run --features clap -- icon.png
//! ```

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use dark_icon::convert_dark_icon_with_report;

/// Convert a light icon PNG into a dark-mode variant.
#[derive(Parser)]
#[command(name = "dark-icon", version)]
struct Cli {
    /// Input image file
    input: PathBuf,

    /// Output file (defaults to `<input stem>-dark.png`)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print a JSON report of the conversion path
    #[arg(long)]
    report: bool,
}

fn main() -> dark_icon::Result<()> {
    let cli = Cli::parse();

    let bytes = fs::read(&cli.input)?;
    let (png, report) = convert_dark_icon_with_report(&bytes)?;

    let output = cli.output.unwrap_or_else(|| {
        let stem = cli
            .input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "icon".to_string());
        cli.input.with_file_name(format!("{stem}-dark.png"))
    });
    fs::write(&output, png)?;

    if cli.report {
        println!("{}", report.to_json_pretty()?);
    }

    Ok(())
}
