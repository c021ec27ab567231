use std::fmt::Debug;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use rayon::prelude::*;

use crate::nmd::{self, Category, ContextError};
use crate::transcript::TranscriptMap;

/// One scored transcript. Immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreResult {
    pub transcript_id: String,
    pub score: f64,
    pub category: Category,
}

/// Category -> count, iterated in the fixed reporting order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Summary {
    counts: [usize; Category::ALL.len()],
}

impl Summary {
    pub fn add(&mut self, category: Category) {
        self.counts[category as usize] += 1;
    }

    pub fn add_n(&mut self, category: Category, n: usize) {
        self.counts[category as usize] += n;
    }

    pub fn count(&self, category: Category) -> usize {
        self.counts[category as usize]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, usize)> + '_ {
        Category::ALL
            .iter()
            .map(move |&category| (category, self.count(category)))
    }
}

/// Transcript-level tallies from one scoring pass. Exclusions are counted,
/// never silently dropped: `assembled` always equals the scored results plus
/// the two exclusion counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScoreStats {
    pub assembled: usize,
    /// No start or no stop codon observed in the feature set.
    pub missing_codons: usize,
    /// Stop codon position contained in no exon.
    pub orphan_stop: usize,
}

/// Scores every assembled transcript. Transcripts are independent, so the
/// pass shards over them; the category counter is the only shared structure.
pub fn score_transcripts(
    transcripts: &TranscriptMap<'_>,
) -> Result<(Vec<ScoreResult>, Summary, ScoreStats), ContextError> {
    let missing_codons = AtomicUsize::new(0);
    let orphan_stop = AtomicUsize::new(0);
    let counts: DashMap<Category, usize> = DashMap::new();

    let scored = transcripts
        .par_iter()
        .map(|(id, tx)| {
            let (start, stop) = match (tx.start_codon, tx.stop_codon) {
                (Some(start), Some(stop)) => (start, stop),
                _ => {
                    missing_codons.fetch_add(1, Ordering::Relaxed);
                    return Ok(None);
                }
            };

            match nmd::stop_context(tx, start, stop)? {
                Some(ctx) => {
                    let category = Category::from_context(&ctx);
                    *counts.entry(category).or_insert(0) += 1;

                    Ok(Some(ScoreResult {
                        transcript_id: (*id).to_string(),
                        score: category.score(),
                        category,
                    }))
                }
                None => {
                    orphan_stop.fetch_add(1, Ordering::Relaxed);
                    Ok(None)
                }
            }
        })
        .collect::<Result<Vec<Option<ScoreResult>>, ContextError>>()?;

    let mut results: Vec<ScoreResult> = scored.into_iter().flatten().collect();
    results.par_sort_unstable_by(|a, b| natord::compare(&a.transcript_id, &b.transcript_id));

    let mut summary = Summary::default();
    for (category, n) in counts.into_iter() {
        summary.add_n(category, n);
    }

    let stats = ScoreStats {
        assembled: transcripts.len(),
        missing_codons: missing_codons.into_inner(),
        orphan_stop: orphan_stop.into_inner(),
    };

    Ok((results, summary, stats))
}

/// Writes the per-transcript score table: transcript_id, score, category,
/// tab-separated, one row per scored transcript.
pub fn write_scores<P: AsRef<Path> + Debug>(path: P, results: &[ScoreResult]) -> io::Result<()> {
    let file = File::create(path)?;
    write_scores_to(file, results)
}

pub fn write_scores_to<W: Write>(out: W, results: &[ScoreResult]) -> io::Result<()> {
    let mut out = BufWriter::new(out);

    for result in results {
        writeln!(
            out,
            "{}\t{:.2}\t{}",
            result.transcript_id, result.score, result.category
        )?;
    }

    out.flush()
}

/// Writes the category -> count summary in fixed category order.
pub fn write_summary<P: AsRef<Path> + Debug>(path: P, summary: &Summary) -> io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);

    for (category, n) in summary.iter() {
        writeln!(out, "{}\t{}", category, n)?;
    }

    out.flush()
}
