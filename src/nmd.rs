//! NMDetective-B: a fixed decision tree over the stop codon's exon context
//! (Lindeboom et al., 2019, Nat Genet). The tree maps (in last exon, ORF
//! length, stop exon length, stop near the upstream junction) to one of five
//! score/category pairs.

use std::fmt;

use thiserror::Error;

use crate::gtf::Strand;
use crate::transcript::Transcript;

/// ORF lengths under this many nucleotides classify as start-proximal.
pub const START_PROXIMAL_ORF: u64 = 150;

/// Stop-containing exons longer than this classify as long-exon escapes.
pub const LONG_EXON_LEN: u64 = 407;

/// A stop within this many nucleotides of the junction upstream of its exon
/// is shielded from decay.
pub const EJC_WINDOW: u64 = 50;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("Internal consistency error: {0}")]
    Inconsistent(&'static str),
}

/// The Scorer's input tuple, derived from one assembled transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopContext {
    pub in_last_exon: bool,
    pub orf_length: u64,
    pub exon_length: u64,
    pub near_last_junction: bool,
}

/// Projects a genomic coordinate onto an axis that increases along the
/// direction of transcription on either strand, so forward and reverse
/// arithmetic share one code path.
#[inline(always)]
fn txn(strand: Strand, x: u64) -> i64 {
    match strand {
        Strand::Forward => x as i64,
        Strand::Reverse => -(x as i64),
    }
}

/// Computes the ORF length and the stop codon's exon context for a
/// transcript whose codon positions are both known.
///
/// Returns `Ok(None)` when no exon contains the stop position (annotation
/// inconsistency between exon and codon records; the zero-exon case lands
/// here too). When duplicate or overlapping exon records each contain the
/// stop, the last match in genomic sort order wins.
pub fn stop_context(
    tx: &Transcript,
    start: u64,
    stop: u64,
) -> Result<Option<StopContext>, ContextError> {
    let strand = tx.strand;

    let last = match strand {
        Strand::Forward => tx.exons.len().saturating_sub(1),
        Strand::Reverse => 0,
    };

    let mut orf_length: u64 = 0;
    let mut hit: Option<(usize, u64, bool)> = None;
    let mut stop_hits = 0usize;

    for (i, &(exon_start, exon_end)) in tx.exons.iter().enumerate() {
        let lo = exon_start.min(exon_end);
        let hi = exon_start.max(exon_end);
        let (ps, pe) = (txn(strand, exon_start), txn(strand, exon_end));
        if ps > pe {
            return Err(ContextError::Inconsistent(
                "exon span runs against its own strand",
            ));
        }

        let has_start = (lo..=hi).contains(&start);
        let has_stop = (lo..=hi).contains(&stop);

        orf_length += match (has_start, has_stop) {
            (true, true) => txn(strand, stop).abs_diff(txn(strand, start)),
            (true, false) => (pe - txn(strand, start)).max(0) as u64,
            (false, true) => (txn(strand, stop) - ps).max(0) as u64,
            (false, false) if txn(strand, start) <= ps && pe <= txn(strand, stop) => {
                (pe - ps) as u64
            }
            _ => 0,
        };

        if has_stop {
            stop_hits += 1;
            let dist_to_upstream_junction = (txn(strand, stop) - ps).max(0) as u64;
            hit = Some((
                i,
                (pe - ps) as u64,
                dist_to_upstream_junction < EJC_WINDOW,
            ));
        }
    }

    if stop_hits > 1 {
        log::debug!("stop codon at {stop} contained in {stop_hits} exons, keeping last match");
    }

    Ok(hit.map(|(i, exon_length, near_last_junction)| StopContext {
        in_last_exon: i == last,
        orf_length,
        exon_length,
        near_last_junction,
    }))
}

/// Decay-likelihood classes, in fixed reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    LastExon,
    StartProximal,
    LongExon,
    FiftyNtRule,
    TriggerNmd,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::LastExon,
        Category::StartProximal,
        Category::LongExon,
        Category::FiftyNtRule,
        Category::TriggerNmd,
    ];

    /// Scoring decision tree. The checks form a total order, first match
    /// wins:
    ///
    /// 1. a stop in the final exon leaves no downstream exon-junction
    ///    complex bound, so NMD can never trigger;
    /// 2. stops very close to the start codon escape surveillance;
    /// 3. long stop-containing exons reduce NMD efficiency;
    /// 4. a stop within 50 nt of the junction upstream of its exon is
    ///    shielded;
    /// 5. everything else is a predicted NMD substrate.
    pub fn classify(
        in_last_exon: bool,
        orf_length: u64,
        exon_length: u64,
        near_last_junction: bool,
    ) -> Self {
        if in_last_exon {
            Category::LastExon
        } else if orf_length < START_PROXIMAL_ORF {
            Category::StartProximal
        } else if exon_length > LONG_EXON_LEN {
            Category::LongExon
        } else if near_last_junction {
            Category::FiftyNtRule
        } else {
            Category::TriggerNmd
        }
    }

    pub fn from_context(ctx: &StopContext) -> Self {
        Self::classify(
            ctx.in_last_exon,
            ctx.orf_length,
            ctx.exon_length,
            ctx.near_last_junction,
        )
    }

    pub fn score(&self) -> f64 {
        match self {
            Category::LastExon => 0.0,
            Category::StartProximal => 0.12,
            Category::LongExon => 0.41,
            Category::FiftyNtRule => 0.20,
            Category::TriggerNmd => 0.65,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::LastExon => "Last exon",
            Category::StartProximal => "Start-proximal",
            Category::LongExon => "Long exon",
            Category::FiftyNtRule => "50 nt rule",
            Category::TriggerNmd => "Trigger NMD",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forward(exons: Vec<(u64, u64)>, start: u64, stop: u64) -> (Transcript, u64, u64) {
        let exon_numbers = vec![None; exons.len()];
        (
            Transcript {
                strand: Strand::Forward,
                exons,
                exon_numbers,
                start_codon: Some(start),
                stop_codon: Some(stop),
            },
            start,
            stop,
        )
    }

    /// Mirrors a forward-strand layout around `pivot` onto the reverse
    /// strand, preserving transcription-direction geometry.
    fn mirrored(exons: &[(u64, u64)], start: u64, stop: u64, pivot: u64) -> (Transcript, u64, u64) {
        let mut flipped: Vec<(u64, u64)> = exons
            .iter()
            .map(|&(a, b)| (pivot - a, pivot - b))
            .collect();
        flipped.sort_unstable_by_key(|&(a, b)| a.min(b));
        let exon_numbers = vec![None; flipped.len()];
        (
            Transcript {
                strand: Strand::Reverse,
                exons: flipped,
                exon_numbers,
                start_codon: Some(pivot - start),
                stop_codon: Some(pivot - stop),
            },
            pivot - start,
            pivot - stop,
        )
    }

    #[test]
    fn single_exon_orf_length() {
        let (tx, start, stop) = forward(vec![(100, 500)], 150, 300);
        let ctx = stop_context(&tx, start, stop).unwrap().unwrap();

        assert_eq!(ctx.orf_length, 150);
        assert!(ctx.in_last_exon);
    }

    #[test]
    fn orf_length_across_exons() {
        let (tx, start, stop) = forward(vec![(100, 200), (300, 500)], 150, 350);
        let ctx = stop_context(&tx, start, stop).unwrap().unwrap();

        assert_eq!(ctx.orf_length, 100);
        assert_eq!(ctx.exon_length, 200);
        assert!(ctx.in_last_exon);
    }

    #[test]
    fn internal_exon_contributes_full_length() {
        let (tx, start, stop) = forward(vec![(100, 200), (300, 400), (500, 700)], 150, 550);
        let ctx = stop_context(&tx, start, stop).unwrap().unwrap();

        // 50 from exon 1, all 100 of exon 2, 50 into exon 3
        assert_eq!(ctx.orf_length, 200);
    }

    #[test]
    fn stop_outside_every_exon_is_excluded() {
        let (tx, start, stop) = forward(vec![(100, 200)], 150, 250);
        assert_eq!(stop_context(&tx, start, stop).unwrap(), None);
    }

    #[test]
    fn zero_exon_transcript_is_excluded() {
        let tx = Transcript {
            strand: Strand::Forward,
            exons: vec![],
            exon_numbers: vec![],
            start_codon: Some(100),
            stop_codon: Some(200),
        };
        assert_eq!(stop_context(&tx, 100, 200).unwrap(), None);
    }

    #[test]
    fn reversed_exon_span_is_an_error() {
        let tx = Transcript {
            strand: Strand::Forward,
            exons: vec![(200, 100)],
            exon_numbers: vec![None],
            start_codon: Some(120),
            stop_codon: Some(180),
        };
        assert!(stop_context(&tx, 120, 180).is_err());
    }

    #[test]
    fn near_junction_flag_measures_from_upstream_edge() {
        // Stop 30 nt into the second exon of three.
        let (tx, start, stop) = forward(vec![(100, 200), (300, 400), (500, 700)], 110, 330);
        let ctx = stop_context(&tx, start, stop).unwrap().unwrap();

        assert!(!ctx.in_last_exon);
        assert!(ctx.near_last_junction);

        // Stop 80 nt in: outside the window.
        let (tx, start, stop) = forward(vec![(100, 200), (300, 400), (500, 700)], 110, 380);
        let ctx = stop_context(&tx, start, stop).unwrap().unwrap();
        assert!(!ctx.near_last_junction);
    }

    #[test]
    fn reverse_strand_mirrors_forward() {
        let exons = [(100, 200), (300, 500)];
        let (fwd_tx, fs, fe) = forward(exons.to_vec(), 150, 350);
        let fwd_ctx = stop_context(&fwd_tx, fs, fe).unwrap().unwrap();

        let (rev_tx, rs, re) = mirrored(&exons, 150, 350, 600);
        let rev_ctx = stop_context(&rev_tx, rs, re).unwrap().unwrap();

        assert_eq!(fwd_ctx, rev_ctx);
        assert_eq!(
            Category::from_context(&fwd_ctx),
            Category::from_context(&rev_ctx)
        );
    }

    #[test]
    fn reverse_strand_mirrors_forward_mid_transcript_stop() {
        let exons = [(100, 200), (300, 500)];
        let (fwd_tx, fs, fe) = forward(exons.to_vec(), 110, 150);
        let fwd_ctx = stop_context(&fwd_tx, fs, fe).unwrap().unwrap();

        let (rev_tx, rs, re) = mirrored(&exons, 110, 150, 600);
        let rev_ctx = stop_context(&rev_tx, rs, re).unwrap().unwrap();

        assert_eq!(fwd_ctx, rev_ctx);
        assert_eq!(fwd_ctx.orf_length, 40);
        assert!(!fwd_ctx.in_last_exon);
    }

    #[test]
    fn last_exon_dominates_every_other_flag() {
        for orf_length in [0, 149, 150, 10_000] {
            for exon_length in [10, 407, 408, 5_000] {
                for near in [false, true] {
                    assert_eq!(
                        Category::classify(true, orf_length, exon_length, near),
                        Category::LastExon
                    );
                }
            }
        }
    }

    #[test]
    fn last_exon_beats_near_junction_in_context() {
        // Single-exon transcript, stop 30 nt from the exon's start: the
        // near-junction flag is set but rule 1 wins.
        let (tx, start, stop) = forward(vec![(100, 500)], 110, 130);
        let ctx = stop_context(&tx, start, stop).unwrap().unwrap();

        assert!(ctx.in_last_exon);
        assert!(ctx.near_last_junction);
        assert_eq!(Category::from_context(&ctx), Category::LastExon);
    }

    #[test]
    fn decision_tree_branches() {
        assert_eq!(
            Category::classify(false, 100, 300, false),
            Category::StartProximal
        );
        assert_eq!(
            Category::classify(false, 200, 408, true),
            Category::LongExon
        );
        assert_eq!(
            Category::classify(false, 200, 407, true),
            Category::FiftyNtRule
        );
        assert_eq!(
            Category::classify(false, 200, 300, false),
            Category::TriggerNmd
        );
    }

    #[test]
    fn decision_tree_is_exhaustive_and_deterministic() {
        let scores: Vec<f64> = Category::ALL.iter().map(|c| c.score()).collect();

        for in_last in [false, true] {
            for orf_length in [0, 149, 150, 151] {
                for exon_length in [0, 406, 407, 408] {
                    for near in [false, true] {
                        let first = Category::classify(in_last, orf_length, exon_length, near);
                        let second = Category::classify(in_last, orf_length, exon_length, near);

                        assert_eq!(first, second);
                        assert!(scores.contains(&first.score()));
                        assert_eq!(
                            Category::ALL.iter().filter(|c| **c == first).count(),
                            1
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn duplicate_stop_exons_keep_last_match() {
        let tx = Transcript {
            strand: Strand::Forward,
            exons: vec![(100, 200), (150, 500)],
            exon_numbers: vec![None, None],
            start_codon: Some(110),
            stop_codon: Some(180),
        };
        let ctx = stop_context(&tx, 110, 180).unwrap().unwrap();

        // The overlapping (150, 500) exon sorts last and wins.
        assert_eq!(ctx.exon_length, 350);
        assert!(ctx.in_last_exon);
    }
}
