// Command-line argument parsing
use clap::Parser;

use crate::io::DEFAULT_LARGE_GROUP_SIZE;

#[derive(Parser, Debug)]
#[command(
    name = "markdup-se",
    about = "Mark PCR and optical duplicates in a coordinate-sorted single-end SAM file"
)]
pub struct Args {
    /// Input SAM, or '-' for stdin
    #[arg(short, long)]
    pub input: String,
    /// Output SAM, or '-' for stdout
    #[arg(short, long)]
    pub output: String,
    /// Pixel radius used to derive the optical duplicate distance
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
    pub pixels: u32,
    /// Log a diagnostic for position groups larger than this
    #[arg(long, default_value_t = DEFAULT_LARGE_GROUP_SIZE)]
    pub large_group_size: usize,
    /// Disable progress reporting
    #[arg(short, long)]
    pub quiet: bool,
}
