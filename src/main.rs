//! # nmdscan
//! A fast nonsense-mediated decay (NMD) classifier for annotated transcripts.
//!
//! ## Overview
//! `nmdscan` reads a GTF/GFF3 gene annotation, assembles each transcript's
//! exon/codon model, and scores its predicted susceptibility to
//! nonsense-mediated decay with the NMDetective-B decision tree. This tool is
//! intended to be used as a standalone command-line tool.
//!
//! To use `nmdscan` as a standalone command-line tool, follow these steps:
//!
//! 1. install Rust from [here](https://www.rust-lang.org/tools/install)
//!
//! 2. install `nmdscan` by running:
//! ``` bash
//! cargo install nmdscan
//! ```
//!
//! 3. run `nmdscan` by typing:
//! ``` bash
//! nmdscan --input <GTF/GFF> --output <TSV> [--summary <TSV>] [--threads <N>]
//! ```

use clap::{self, Parser};
use colored::Colorize;
use log::Level;
use std::path::PathBuf;

use nmdscan::*;

#[derive(Parser, Debug)]
#[clap(
    name = "nmdscan",
    version = "0.1.0",
    author = "Alejandro Gonzales-Irribarren <alejandrxgzi@gmail.com>",
    about = "A fast nonsense-mediated decay (NMD) classifier for GTF/GFF transcripts based on the NMDetective-B decision tree."
)]
struct Args {
    #[clap(
        short = 'i',
        long = "input",
        help = "Path to GTF/GFF annotation file, plain or gzip-compressed",
        value_name = "ANNOTATION",
        required = true
    )]
    input: PathBuf,

    #[clap(
        short = 'o',
        long = "output",
        help = "Path to output per-transcript score table (TSV)",
        value_name = "OUTPUT",
        required = true
    )]
    output: PathBuf,

    #[clap(
        short = 's',
        long = "summary",
        help = "Optional path to category-count summary table (TSV)",
        value_name = "SUMMARY"
    )]
    summary: Option<PathBuf>,

    #[clap(
        short = 't',
        long,
        help = "Number of threads",
        value_name = "THREADS",
        default_value_t = num_cpus::get()
    )]
    threads: usize,
}

impl Args {
    /// Checks all the arguments for validity using validate_args()
    pub fn check(&self) -> Result<(), NmdScanError> {
        self.validate_args()
    }

    /// Checks the input file for validity. The file must exist and be a GTF
    /// or GFF3 file, optionally gzip-compressed.
    fn check_input(&self) -> Result<(), NmdScanError> {
        if !self.input.exists() {
            let err = format!("file {:?} does not exist", self.input);
            Err(NmdScanError::InvalidInput(err))
        } else if !matches!(
            annotation_extension(&self.input),
            Some("gtf") | Some("gff") | Some("gff3")
        ) {
            let err = format!(
                "file {:?} is not a GTF or GFF3 file, please specify the correct format",
                self.input
            );
            Err(NmdScanError::InvalidInput(err))
        } else if std::fs::metadata(&self.input)
            .map_err(|e| NmdScanError::IoError("reading input file metadata", e))?
            .len()
            == 0
        {
            let err = format!("file {:?} is empty", self.input);
            Err(NmdScanError::InvalidInput(err))
        } else {
            Ok(())
        }
    }

    /// Checks the output files for validity. Score and summary tables must
    /// be TSV or TXT files.
    fn check_output(&self) -> Result<(), NmdScanError> {
        for path in std::iter::once(&self.output).chain(self.summary.iter()) {
            let ext = path.extension().and_then(|e| e.to_str());
            if !matches!(ext, Some("tsv") | Some("txt")) {
                let err = format!(
                    "file {:?} is not a TSV file, please specify the correct output format",
                    path
                );
                return Err(NmdScanError::InvalidOutput(err));
            }
        }
        Ok(())
    }

    /// Checks the number of threads for validity. The number of threads must
    /// be greater than 0 and less than or equal to the number of logical CPUs.
    fn check_threads(&self) -> Result<(), NmdScanError> {
        if self.threads == 0 {
            let err = "number of threads must be greater than 0".to_string();
            Err(NmdScanError::InvalidThreads(err))
        } else if self.threads > num_cpus::get() {
            let err = "number of threads must be less than or equal to the number of logical CPUs"
                .to_string();
            Err(NmdScanError::InvalidThreads(err))
        } else {
            Ok(())
        }
    }

    /// Validates all the arguments
    fn validate_args(&self) -> Result<(), NmdScanError> {
        self.check_input()?;
        self.check_output()?;
        self.check_threads()?;
        Ok(())
    }
}

fn main() {
    simple_logger::init_with_level(Level::Info).unwrap();
    let args = Args::parse();
    args.check().unwrap_or_else(|e| {
        log::error!("{:?}", e);
        std::process::exit(1);
    });

    run(args);

    log::info!(
        "{} {}",
        "Success:".bright_green().bold(),
        "transcripts classified successfully!"
    );
}

fn run(args: Args) {
    msg();

    let start = std::time::Instant::now();

    let job_info = classify_annotations(
        &args.input,
        &args.output,
        args.summary.as_ref(),
        args.threads,
    )
    .unwrap_or_else(|e| {
        log::error!("{}: {}", "Fatal error".bright_red().bold(), e);
        std::process::exit(1);
    });

    let elapsed = start.elapsed().as_secs_f32();
    log::info!("Elapsed time: {:.4} seconds", elapsed);
    log::info!(
        "Memory usage: {:.4} MB",
        job_info.end_mem_mb.unwrap_or(f64::NAN) - job_info.start_mem_mb.unwrap_or(f64::NAN)
    );
}
