use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::Parser;
use molgrid::chem::Pattern;

/// Draw the molecules in a SMILES file as a grid image.
///
///
/// Each line of the input holds a SMILES string and a name, separated by the delimiter. There is
/// no header line. Molecules that cannot be parsed are left out of the drawing.
#[derive(Debug, Parser)]
#[command(about, version = molgrid::core::version::VERSION)]
pub struct Args {
    /// Path to the SMILES file.
    ///
    /// To read from stdin, pass "-".
    pub input: PathBuf,

    /// Field delimiter.
    ///
    /// Every character in the delimiter separates fields, and runs of them count as one. The
    /// escapes "\t" and "\s" stand for a tab and a space.
    #[arg(short, long, default_value = "\t", value_parser = parse_delimiter)]
    pub delimiter: String,

    /// SMARTS pattern to highlight in each molecule.
    ///
    /// Enclose the pattern in single quotes to keep the shell from interpreting it.
    #[arg(short, long)]
    pub smarts: Option<Pattern>,

    /// Maximum number of molecules to draw.
    #[arg(short, long, default_value = "18")]
    pub max_mols: NonZeroUsize,

    /// Output PNG file path.
    #[arg(short, long, default_value = "rdkit_drawing_2Dgrid.png")]
    pub output: PathBuf,

    /// JSON file with drawing options.
    #[arg(long)]
    pub options: Option<PathBuf>,

    /// Report progress, timings, and skipped lines on stderr.
    #[arg(short, long)]
    pub verbose: bool,
}

fn parse_delimiter(s: &str) -> Result<String, String> {
    let delimiter = s.replace("\\t", "\t").replace("\\s", " ");
    if delimiter.is_empty() {
        return Err("the delimiter cannot be empty".to_string());
    }
    Ok(delimiter)
}
