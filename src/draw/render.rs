use std::io::{self, Read};
use std::path::Path;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use molgrid::chem::{Molecule, Pattern, SmilesSupplier};
use molgrid::depict::{draw_molecule_grid, DrawOptions, Highlight};

use crate::args::Args;

/// Read the whole input, from `stdin` if the path is "-".
fn read_input(path: &Path, mut stdin: impl Read) -> io::Result<String> {
    let mut text = String::new();
    if path.to_str() == Some("-") {
        stdin.read_to_string(&mut text)?;
    } else {
        std::fs::File::open(path)?.read_to_string(&mut text)?;
    }
    Ok(text)
}

fn read_options(path: Option<&Path>) -> Result<DrawOptions> {
    let Some(path) = path else {
        return Ok(DrawOptions::default());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read drawing options from {path:?}"))?;
    DrawOptions::from_json(&json).with_context(|| format!("Invalid drawing options in {path:?}"))
}

/// Parse up to `max` molecules, skipping records that cannot be parsed.
fn read_molecules(text: &str, delimiter: &str, max: usize, verbose: bool) -> Vec<Molecule> {
    let mut molecules = Vec::new();
    for record in SmilesSupplier::new(text, delimiter) {
        match record {
            Ok(record) => {
                molecules.push(record.molecule);
                if molecules.len() == max {
                    if verbose {
                        eprintln!("\tReached {max} molecules on line {}.", record.line);
                    }
                    break;
                }
            }
            Err(err) => {
                if verbose {
                    eprintln!("\tSkipping: {err}");
                }
            }
        }
    }
    molecules
}

fn highlight_matches(pattern: &Pattern, molecules: &[Molecule]) -> Vec<Highlight> {
    molecules
        .iter()
        .map(|mol| Highlight::from_match(mol, pattern.first_match(mol)))
        .collect()
}

fn summary(count: usize, pattern: Option<&Pattern>, output: &Path) -> String {
    let output = output.display();
    match pattern {
        Some(pattern) => {
            let highlight = format!("with SMARTS pattern highlight: {pattern}");
            format!("saved drawing of {count} molecules {highlight} as {output}")
        }
        None => format!("saved drawing of {count} molecules as {output}"),
    }
}

/// Read molecules, draw them, and write the image. The output file is only created once the
/// image has been encoded.
fn draw(args: &Args, stdin: impl Read) -> Result<String> {
    let Args {
        input,
        delimiter,
        smarts,
        max_mols,
        output,
        options,
        verbose,
    } = args;
    let verbose = *verbose;
    let options = read_options(options.as_deref())?;

    if verbose {
        eprintln!("Reading molecules from {input:?}...");
    }
    let t0 = Instant::now();
    let text = read_input(input, stdin)
        .with_context(|| format!("Failed to read molecules from {input:?}"))?;
    let molecules = read_molecules(&text, delimiter, max_mols.get(), verbose);
    if verbose {
        eprintln!("Read {} molecules in {:.3} s.", molecules.len(), t0.elapsed().as_secs_f32());
    }
    if molecules.is_empty() {
        bail!("no molecules to draw");
    }

    let highlights = smarts.as_ref().map(|pattern| {
        let highlights = highlight_matches(pattern, &molecules);
        if verbose {
            let n = highlights.iter().filter(|h| !h.is_empty()).count();
            eprintln!("Pattern {pattern} matched {n} of {} molecules.", molecules.len());
        }
        highlights
    });

    if verbose {
        eprint!("Drawing... ");
    }
    let t0 = Instant::now();
    let png = draw_molecule_grid(&molecules, highlights.as_deref(), &options)
        .context("Failed to draw molecules")?;
    if verbose {
        eprintln!("Took {:.3} s.", t0.elapsed().as_secs_f32());
    }

    std::fs::write(output, png).with_context(|| format!("Failed to write drawing to {output:?}"))?;
    Ok(summary(molecules.len(), smarts.as_ref(), output))
}

pub fn render(args: Args) -> Result<()> {
    let summary = draw(&args, io::stdin().lock())?;
    println!("{summary}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::path::PathBuf;

    use clap::Parser;

    use super::*;

    /// A scratch directory for one test.
    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("molgrid-{}-{name}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn args(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("molgrid-draw").chain(argv.iter().copied())).unwrap()
    }

    fn image_size(path: &Path) -> (u32, u32) {
        let image = image::open(path).unwrap();
        (image.width(), image.height())
    }

    #[test]
    fn truncation_keeps_prefix() {
        let text = "C\ta\nCC\tb\nC1CC\tbad\nCCC\tc\nCCCC\td\n";
        let names = |max| -> Vec<String> {
            read_molecules(text, "\t", max, false).into_iter().map(|m| m.name).collect()
        };
        assert_eq!(names(18), vec!["a", "b", "c", "d"]);
        assert_eq!(names(3), vec!["a", "b", "c"]);
        assert_eq!(names(1), vec!["a"]);
    }

    #[test]
    fn summaries() {
        let output = Path::new("out.png");
        assert_eq!(summary(2, None, output), "saved drawing of 2 molecules as out.png");
        let pattern = Pattern::compile("C=O").unwrap();
        assert_eq!(
            summary(2, Some(&pattern), output),
            "saved drawing of 2 molecules with SMARTS pattern highlight: C=O as out.png"
        );
    }

    #[test]
    fn draws_grid() {
        let dir = scratch("draws_grid");
        let input = dir.join("in.smi");
        let output = dir.join("out.png");
        std::fs::write(&input, "CCO\tethanol\nCC(=O)O\tacetic_acid\n").unwrap();

        let args = args(&[input.to_str().unwrap(), "-s", "C=O", "-o", output.to_str().unwrap()]);
        let summary = draw(&args, io::empty()).unwrap();
        assert_eq!(
            summary,
            format!(
                "saved drawing of 2 molecules with SMARTS pattern highlight: C=O as {}",
                output.display()
            )
        );
        assert_eq!(image_size(&output), (900, 300));
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn malformed_rows_are_dropped() {
        let dir = scratch("malformed_rows");
        let input = dir.join("in.smi");
        let output = dir.join("out.png");
        std::fs::write(&input, "CCO,a\nC(C,b\nc1ccccc1,c\n").unwrap();

        let args = args(&[input.to_str().unwrap(), "-d", ",", "-o", output.to_str().unwrap()]);
        let summary = draw(&args, io::empty()).unwrap();
        assert!(summary.starts_with("saved drawing of 2 molecules as "));
        assert_eq!(image_size(&output), (900, 300));
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn no_molecules_leaves_output_untouched() {
        let dir = scratch("no_molecules");
        let input = dir.join("in.smi");
        let output = dir.join("out.png");
        std::fs::write(&input, "C1CC\tbad\nxyz\tworse\n").unwrap();

        let args = args(&[input.to_str().unwrap(), "-o", output.to_str().unwrap()]);
        let err = draw(&args, io::empty()).unwrap_err();
        assert_eq!(err.to_string(), "no molecules to draw");
        assert!(!output.exists());
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn missing_input() {
        let dir = scratch("missing_input");
        let output = dir.join("out.png");
        let args = args(&[dir.join("nope.smi").to_str().unwrap(), "-o", output.to_str().unwrap()]);
        assert!(draw(&args, io::empty()).is_err());
        assert!(!output.exists());
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn byte_identical_output() {
        let dir = scratch("byte_identical");
        let input = dir.join("in.smi");
        std::fs::write(&input, "c1ccccc1O\tphenol\nCN\tmethylamine\n[Na+].[Cl-]\tsalt\n").unwrap();
        let mut pngs = Vec::new();
        for name in ["a.png", "b.png"] {
            let output = dir.join(name);
            let argv = [input.to_str().unwrap(), "-o", output.to_str().unwrap()];
            draw(&args(&argv), io::empty()).unwrap();
            pngs.push(std::fs::read(output).unwrap());
        }
        assert_eq!(pngs[0], pngs[1]);
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn reads_stdin() {
        let dir = scratch("reads_stdin");
        let output = dir.join("out.png");
        let table = "CC(=O)Oc1ccccc1C(=O)O\taspirin\nCN1C=NC2=C1C(=O)N(C(=O)N2C)C\tcaffeine\n\
                     CCO\tethanol\nc1ccccc1\tbenzene\n";
        let from_stdin = args(&["-", "-s", "C=O", "-o", output.to_str().unwrap()]);
        let summary = draw(&from_stdin, Cursor::new(table)).unwrap();
        assert_eq!(
            summary,
            format!(
                "saved drawing of 4 molecules with SMARTS pattern highlight: C=O as {}",
                output.display()
            )
        );
        assert_eq!(image_size(&output), (900, 600));

        // A file path never touches stdin.
        let input = dir.join("in.smi");
        std::fs::write(&input, "CCO\tethanol\n").unwrap();
        let from_file = args(&[input.to_str().unwrap(), "-o", output.to_str().unwrap()]);
        assert!(draw(&from_file, Cursor::new("xyz\tbad\n")).is_ok());
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn options_file() {
        let dir = scratch("options_file");
        let input = dir.join("in.smi");
        let options = dir.join("options.json");
        let output = dir.join("out.png");
        std::fs::write(&input, "CCO\tethanol\n").unwrap();
        std::fs::write(&options, r#"{ "atom_indices": true }"#).unwrap();
        let argv = [
            input.to_str().unwrap(),
            "--options",
            options.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
        ];
        draw(&args(&argv), io::empty()).unwrap();
        assert_eq!(image_size(&output), (900, 300));

        std::fs::write(&options, "{ not json").unwrap();
        assert!(draw(&args(&argv), io::empty()).is_err());
        std::fs::remove_dir_all(dir).unwrap();
    }
}
