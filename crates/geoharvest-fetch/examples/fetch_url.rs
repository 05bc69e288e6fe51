//! Example: download one URL with skip-if-present semantics.
//!
//! Usage: cargo run --example fetch_url -- <url> <dest>

use geoharvest_fetch::{Fetch, FetchOutcome, HttpFetcher};
use std::env;
use std::path::Path;
use std::time::Instant;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 3 {
        eprintln!("Usage: {} <url> <dest>", args[0]);
        eprintln!(
            "Example: {} https://srtm-pds.s3.amazonaws.com/SRTM1/13S042W.hgt.zip ./13S042W.hgt.zip",
            args[0]
        );
        std::process::exit(1);
    }

    let url = &args[1];
    let dest = Path::new(&args[2]);

    let fetcher = match HttpFetcher::new() {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let start = Instant::now();
    match fetcher.fetch(url, dest) {
        Ok(FetchOutcome::Downloaded { bytes }) => {
            println!(
                "Downloaded {} bytes to {} in {:.2}s",
                bytes,
                dest.display(),
                start.elapsed().as_secs_f64()
            );
        }
        Ok(FetchOutcome::AlreadyPresent) => {
            println!("{} already present, nothing to do", dest.display());
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
