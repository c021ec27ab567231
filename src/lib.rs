pub mod gtf;
pub use gtf::{Feature, ParseError, Record, Strand};

pub mod transcript;
pub use transcript::{RowStats, Transcript, TranscriptMap};

pub mod nmd;
pub use nmd::{Category, StopContext};

pub mod report;
pub use report::{ScoreResult, ScoreStats, Summary};

pub mod utils;
use thiserror::Error;
pub use utils::*;

#[cfg(feature = "testing")]
pub mod test_utils;

use std::{io, path::PathBuf};

#[allow(unused_imports)]
use colored::Colorize;

#[derive(Debug, Error)]
pub enum NmdScanError {
    /// The input file does not exist or is not a GTF or GFF3 file.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The output file is not a TSV file.
    #[error("Invalid output: {0}")]
    InvalidOutput(String),

    /// The number of threads is invalid.
    #[error("Invalid number of threads: {0}")]
    InvalidThreads(String),

    /// An IO error occurred.
    #[error("IO error: while {0}: {1}")]
    IoError(&'static str, std::io::Error),

    /// Exon and codon records contradict each other beyond recovery.
    #[error("Inconsistent annotation: {0}")]
    Inconsistent(#[from] nmd::ContextError),
}

/// Counters surfaced to the logging boundary. Every row and transcript the
/// run drops is accounted for here.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ClassifyStats {
    pub rows: RowStats,
    pub transcripts: ScoreStats,
}

pub struct ClassifyJobResult<'a> {
    pub input: &'a str,
    pub output: &'a str,
    pub threads: usize,
    pub parsing_secs: f64,
    pub assembling_secs: f64,
    pub scoring_secs: f64,
    pub writing_secs: f64,
    pub start_mem_mb: Option<f64>,
    pub end_mem_mb: Option<f64>,
    pub stats: ClassifyStats,
    pub summary: Summary,
}

impl ClassifyJobResult<'_> {
    fn log_stats(&self) {
        let rows = &self.stats.rows;
        let transcripts = &self.stats.transcripts;

        log::info!(
            "Rows: {} total, {} comments, {} skipped",
            rows.total,
            rows.comments,
            rows.skipped
        );
        if rows.malformed > 0 {
            log::warn!(
                "{} {} malformed rows skipped",
                "Warning:".bright_yellow().bold(),
                rows.malformed
            );
        }
        log::info!(
            "Transcripts: {} assembled, {} without start/stop codon, {} with a stop outside every exon",
            transcripts.assembled,
            transcripts.missing_codons,
            transcripts.orphan_stop
        );
        for (category, n) in self.summary.iter() {
            log::info!("{}: {}", category, n);
        }
    }
}

/// Runs the whole pipeline over an annotation file: parse and group rows by
/// transcript, assemble transcript models, compute each stop codon's exon
/// context, score with the decision tree, and write the score table sorted
/// by transcript id. `summary` optionally writes the category counts next to
/// the table.
pub fn classify_annotations<'a>(
    input: &'a PathBuf,
    output: &'a PathBuf,
    summary_out: Option<&PathBuf>,
    threads: usize,
) -> Result<ClassifyJobResult<'a>, NmdScanError> {
    let mut ret = ClassifyJobResult {
        input: input.to_str().ok_or(NmdScanError::InvalidInput(
            "Invalid input file path".to_string(),
        ))?,
        output: output.to_str().ok_or(NmdScanError::InvalidOutput(
            "Invalid output file path".to_string(),
        ))?,
        threads,
        parsing_secs: f64::NAN,
        assembling_secs: f64::NAN,
        scoring_secs: f64::NAN,
        writing_secs: f64::NAN,
        start_mem_mb: None,
        end_mem_mb: None,
        stats: ClassifyStats::default(),
        summary: Summary::default(),
    };

    let input_ext = annotation_extension(input).ok_or(NmdScanError::InvalidInput(
        "Missing input file extension".to_string(),
    ))?;

    let tp = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .expect("Failed to build thread pool");

    tp.install(|| {
        ret.start_mem_mb = Some(max_mem_usage_mb());

        log::info!("Using {} threads", threads);

        let contents = read_input(input)?;
        if contents.is_empty() {
            return Err(NmdScanError::InvalidInput(format!(
                "file {:?} is empty",
                input
            )));
        }

        let (builders, rows) = timed("Parsing input", Some(&mut ret.parsing_secs), || {
            match input_ext {
                "gff" | "gff3" => Ok(transcript::accumulate::<b'='>(&contents)),
                "gtf" => Ok(transcript::accumulate::<b' '>(&contents)),
                _ => Err(NmdScanError::InvalidInput(
                    "Unknown file extension, please specify a GTF or GFF3 file".to_string(),
                )),
            }
        })?;
        ret.stats.rows = rows;

        let transcripts = timed(
            "Assembling transcripts",
            Some(&mut ret.assembling_secs),
            || transcript::finalize(builders),
        );

        let (results, summary, transcript_stats) =
            timed("Scoring transcripts", Some(&mut ret.scoring_secs), || {
                report::score_transcripts(&transcripts)
            })?;
        ret.stats.transcripts = transcript_stats;
        ret.summary = summary;

        timed("Writing output", Some(&mut ret.writing_secs), || {
            report::write_scores(output, &results)?;
            if let Some(path) = summary_out {
                report::write_summary(path, &ret.summary)?;
            }
            Ok(())
        })
        .map_err(|e: io::Error| NmdScanError::IoError("writing output file", e))?;

        ret.end_mem_mb = Some(max_mem_usage_mb());

        ret.log_stats();

        Ok(ret)
    })
}

/// Same pipeline over an in-memory annotation string, writing the score
/// table through a byte-chunk callback. `SEP` selects the attribute
/// separator: `b' '` for GTF, `b'='` for GFF3.
pub fn classify_annotations_string<const SEP: u8, OF: FnMut(&[u8]) -> io::Result<usize>>(
    input: &str,
    output: &mut OF,
    threads: usize,
) -> Result<ClassifyJobResult<'static>, NmdScanError> {
    let mut ret = ClassifyJobResult {
        input: "[string]",
        output: "[callback]",
        threads,
        parsing_secs: f64::NAN,
        assembling_secs: f64::NAN,
        scoring_secs: f64::NAN,
        writing_secs: f64::NAN,
        start_mem_mb: None,
        end_mem_mb: None,
        stats: ClassifyStats::default(),
        summary: Summary::default(),
    };

    let tp = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .expect("Failed to build thread pool");

    let results = tp.install(|| {
        ret.start_mem_mb = Some(max_mem_usage_mb());

        let (builders, rows) = timed("Parsing input", Some(&mut ret.parsing_secs), || {
            transcript::accumulate::<SEP>(input)
        });
        ret.stats.rows = rows;

        let transcripts = timed(
            "Assembling transcripts",
            Some(&mut ret.assembling_secs),
            || transcript::finalize(builders),
        );

        let (results, summary, transcript_stats) =
            timed("Scoring transcripts", Some(&mut ret.scoring_secs), || {
                report::score_transcripts(&transcripts)
            })?;
        ret.stats.transcripts = transcript_stats;
        ret.summary = summary;

        Ok::<_, NmdScanError>(results)
    })?;

    let mut writer = ChunkWriter::new(output);
    timed("Writing output", Some(&mut ret.writing_secs), || {
        report::write_scores_to(&mut writer, &results)
    })
    .map_err(|e| NmdScanError::IoError("writing output file", e))?;

    ret.end_mem_mb = Some(max_mem_usage_mb());

    ret.log_stats();

    Ok(ret)
}
