//! Draw molecules from a SMILES file as a grid of 2D depictions.
use clap::Parser;

use crate::args::Args;
use crate::render::render;

mod args;
mod render;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    render(args)
}
