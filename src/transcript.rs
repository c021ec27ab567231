use hashbrown::hash_map::Entry;
use hashbrown::HashMap;
use rayon::prelude::*;

use crate::gtf::{Feature, Record, Strand};

pub type TranscriptId<'a> = &'a str;
pub type BuilderMap<'a> = HashMap<TranscriptId<'a>, Builder>;
pub type TranscriptMap<'a> = HashMap<TranscriptId<'a>, Transcript>;

/// Row-level tallies from one parse pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RowStats {
    /// Every line seen, comments included.
    pub total: usize,
    /// Leading-`#` lines.
    pub comments: usize,
    /// Structurally broken rows (column count, coordinates, strand).
    pub malformed: usize,
    /// Rows the classifier deliberately ignores: gene rows, feature kinds
    /// outside the exon/codon set, rows without a transcript_id.
    pub skipped: usize,
}

impl RowStats {
    fn absorb(&mut self, other: RowStats) {
        self.total += other.total;
        self.comments += other.comments;
        self.malformed += other.malformed;
        self.skipped += other.skipped;
    }
}

/// Per-transcript accumulator filled during the parse pass.
///
/// Exon pairs are stored reoriented to transcription direction (forward:
/// (left, right); reverse: (right, left)) but in arrival order; the genomic
/// sort happens once at the finalization boundary, after the whole input has
/// been consumed, since feature order across transcripts is not guaranteed.
#[derive(Debug, Default)]
pub struct Builder {
    strand: Option<Strand>,
    exons: Vec<((u64, u64), Option<u32>)>,
    start_codon: Option<u64>,
    stop_codon: Option<u64>,
}

/// Codon records can appear more than once per transcript (a codon split
/// across an exon junction yields one row per piece). The kept coordinate is
/// the transcription-direction-earliest one, which is deterministic no matter
/// the order chunks are merged in.
fn update_codon(slot: &mut Option<u64>, pos: u64, strand: Strand) {
    let replace = match (*slot, strand) {
        (None, _) => true,
        (Some(current), Strand::Forward) => pos < current,
        (Some(current), Strand::Reverse) => pos > current,
    };
    if replace {
        *slot = Some(pos);
    }
}

impl Builder {
    pub fn push(&mut self, record: &Record) {
        if self.strand.is_none() {
            self.strand = Some(record.strand);
        }

        match record.feat {
            Feature::Exon => {
                let pair = match record.strand {
                    Strand::Forward => (record.start, record.end),
                    Strand::Reverse => (record.end, record.start),
                };
                self.exons.push((pair, record.exon_number));
            }
            Feature::StartCodon => {
                update_codon(&mut self.start_codon, record.start, record.strand)
            }
            Feature::StopCodon => update_codon(&mut self.stop_codon, record.start, record.strand),
            _ => {}
        }
    }

    pub fn merge(&mut self, other: Builder) {
        if self.strand.is_none() {
            self.strand = other.strand;
        }
        let strand = self.strand.unwrap_or(Strand::Forward);

        self.exons.extend(other.exons);
        if let Some(pos) = other.start_codon {
            update_codon(&mut self.start_codon, pos, strand);
        }
        if let Some(pos) = other.stop_codon {
            update_codon(&mut self.stop_codon, pos, strand);
        }
    }

    /// Sorts exons by genomic left coordinate and freezes the model. The
    /// sort key includes the full pair and the declared rank so duplicate
    /// coordinates still finalize to one deterministic order.
    pub fn finish(mut self) -> Option<Transcript> {
        let strand = self.strand?;

        self.exons
            .sort_unstable_by_key(|&((a, b), rank)| (a.min(b), a, b, rank));

        let (exons, exon_numbers) = self.exons.into_iter().unzip();

        Some(Transcript {
            strand,
            exons,
            exon_numbers,
            start_codon: self.start_codon,
            stop_codon: self.stop_codon,
        })
    }
}

/// One spliced isoform assembled from every record sharing a transcript_id.
///
/// Exon pairs run in transcription direction ((start, end) per exon) while
/// the list itself is sorted by genomic left coordinate ascending on either
/// strand, so the transcription-direction last exon sits at the back of the
/// list on the forward strand and at the front on the reverse strand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub strand: Strand,
    pub exons: Vec<(u64, u64)>,
    /// Declared exon ranks aligned to `exons`; auxiliary only, never an
    /// ordering key.
    pub exon_numbers: Vec<Option<u32>>,
    pub start_codon: Option<u64>,
    pub stop_codon: Option<u64>,
}

/// Parse pass: groups every relevant feature row by transcript_id.
///
/// Chunk results merge commutatively (exon lists concatenate and are sorted
/// at finalization, codon slots merge via the earliest-in-transcription rule),
/// so the parallel fold is deterministic.
pub fn accumulate<const SEP: u8>(contents: &str) -> (BuilderMap<'_>, RowStats) {
    contents
        .par_lines()
        .fold(
            || (BuilderMap::new(), RowStats::default()),
            |(mut map, mut stats): (BuilderMap, RowStats), line| {
                stats.total += 1;

                if line.starts_with('#') {
                    stats.comments += 1;
                    return (map, stats);
                }

                match Record::parse::<SEP>(line) {
                    Ok(record) => match record.feat {
                        Feature::Exon | Feature::StartCodon | Feature::StopCodon => {
                            map.entry(record.transcript_id)
                                .or_default()
                                .push(&record);
                        }
                        _ => stats.skipped += 1,
                    },
                    Err(e) if e.is_malformed() => stats.malformed += 1,
                    Err(_) => stats.skipped += 1,
                }

                (map, stats)
            },
        )
        .reduce(
            || (BuilderMap::new(), RowStats::default()),
            |(mut map, mut stats), (other_map, other_stats)| {
                for (id, builder) in other_map {
                    match map.entry(id) {
                        Entry::Occupied(mut slot) => slot.get_mut().merge(builder),
                        Entry::Vacant(slot) => {
                            slot.insert(builder);
                        }
                    }
                }
                stats.absorb(other_stats);
                (map, stats)
            },
        )
}

/// Finalization boundary: no transcript is considered complete until the
/// whole input has been consumed.
pub fn finalize(builders: BuilderMap<'_>) -> TranscriptMap<'_> {
    builders
        .into_iter()
        .filter_map(|(id, builder)| builder.finish().map(|tx| (id, tx)))
        .collect()
}

/// Parse and assemble in one call.
pub fn assemble<const SEP: u8>(contents: &str) -> (TranscriptMap<'_>, RowStats) {
    let (builders, stats) = accumulate::<SEP>(contents);
    (finalize(builders), stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_TRANSCRIPTS: &str = "\
chr1\tTEST\tgene\t100\t2000\t.\t+\t.\tgene_id \"G1\";
chr1\tTEST\ttranscript\t100\t900\t.\t+\t.\tgene_id \"G1\"; transcript_id \"T1\";
chr1\tTEST\texon\t300\t500\t.\t+\t.\tgene_id \"G1\"; transcript_id \"T1\"; exon_number 2;
chr1\tTEST\texon\t100\t200\t.\t+\t.\tgene_id \"G1\"; transcript_id \"T1\"; exon_number 1;
chr1\tTEST\tstart_codon\t150\t152\t.\t+\t.\tgene_id \"G1\"; transcript_id \"T1\";
chr1\tTEST\tstop_codon\t350\t352\t.\t+\t.\tgene_id \"G1\"; transcript_id \"T1\";
chr1\tTEST\texon\t1000\t2000\t.\t-\t.\tgene_id \"G1\"; transcript_id \"T2\"; exon_number 1;
# a comment in the middle
not\ta\tvalid\trow
";

    #[test]
    fn assemble_groups_by_transcript_id() {
        let (transcripts, stats) = assemble::<b' '>(TWO_TRANSCRIPTS);

        assert_eq!(transcripts.len(), 2);
        assert_eq!(stats.total, 9);
        assert_eq!(stats.comments, 1);
        assert_eq!(stats.malformed, 1);
        // gene row + transcript row
        assert_eq!(stats.skipped, 2);
    }

    #[test]
    fn exons_sorted_by_genomic_left_not_declared_rank() {
        let (transcripts, _) = assemble::<b' '>(TWO_TRANSCRIPTS);
        let t1 = &transcripts["T1"];

        assert_eq!(t1.strand, Strand::Forward);
        assert_eq!(t1.exons, vec![(100, 200), (300, 500)]);
        assert_eq!(t1.exon_numbers, vec![Some(1), Some(2)]);
        assert_eq!(t1.start_codon, Some(150));
        assert_eq!(t1.stop_codon, Some(350));
    }

    #[test]
    fn reverse_strand_exons_are_reoriented() {
        let (transcripts, _) = assemble::<b' '>(TWO_TRANSCRIPTS);
        let t2 = &transcripts["T2"];

        assert_eq!(t2.strand, Strand::Reverse);
        assert_eq!(t2.exons, vec![(2000, 1000)]);
        assert_eq!(t2.start_codon, None);
        assert_eq!(t2.stop_codon, None);
    }

    #[test]
    fn split_codon_keeps_transcription_earliest_piece() {
        // Stop codon split across a junction on the forward strand: two rows,
        // the upstream piece wins.
        let forward = "\
chr1\tTEST\texon\t100\t200\t.\t+\t.\ttranscript_id \"T1\";
chr1\tTEST\tstop_codon\t199\t200\t.\t+\t.\ttranscript_id \"T1\";
chr1\tTEST\tstop_codon\t300\t300\t.\t+\t.\ttranscript_id \"T1\";
";
        let (transcripts, _) = assemble::<b' '>(forward);
        assert_eq!(transcripts["T1"].stop_codon, Some(199));

        // Mirrored on the reverse strand the larger coordinate is upstream.
        let reverse = "\
chr1\tTEST\texon\t100\t200\t.\t-\t.\ttranscript_id \"T1\";
chr1\tTEST\tstop_codon\t100\t100\t.\t-\t.\ttranscript_id \"T1\";
chr1\tTEST\tstop_codon\t199\t200\t.\t-\t.\ttranscript_id \"T1\";
";
        let (transcripts, _) = assemble::<b' '>(reverse);
        assert_eq!(transcripts["T1"].stop_codon, Some(199));
    }

    #[test]
    fn builder_merge_matches_sequential_push() {
        let records = [
            Record::parse::<b' '>(
                "chr1\tTEST\texon\t300\t500\t.\t+\t.\ttranscript_id \"T1\"; exon_number 2;",
            )
            .unwrap(),
            Record::parse::<b' '>(
                "chr1\tTEST\texon\t100\t200\t.\t+\t.\ttranscript_id \"T1\"; exon_number 1;",
            )
            .unwrap(),
            Record::parse::<b' '>("chr1\tTEST\tstop_codon\t350\t352\t.\t+\t.\ttranscript_id \"T1\";")
                .unwrap(),
        ];

        let mut sequential = Builder::default();
        for record in &records {
            sequential.push(record);
        }

        let mut left = Builder::default();
        left.push(&records[0]);
        let mut right = Builder::default();
        right.push(&records[1]);
        right.push(&records[2]);
        left.merge(right);

        assert_eq!(sequential.finish(), left.finish());
    }
}
