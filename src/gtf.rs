mod attr;
pub use attr::*;

/// Transcription direction relative to increasing genomic coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    pub fn parse(symbol: &str) -> Result<Self, ParseError> {
        match symbol {
            "+" => Ok(Strand::Forward),
            "-" => Ok(Strand::Reverse),
            _ => Err(ParseError::BadStrand),
        }
    }
}

/// Feature kinds the classifier distinguishes. Anything outside the
/// closed set maps to `Other` and is consumed without being stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    Gene,
    Exon,
    StartCodon,
    StopCodon,
    Other,
}

impl Feature {
    fn from_column(kind: &str) -> Self {
        match kind {
            "gene" => Feature::Gene,
            "exon" => Feature::Exon,
            "start_codon" => Feature::StartCodon,
            "stop_codon" => Feature::StopCodon,
            _ => Feature::Other,
        }
    }
}

/// One annotation line's relevant content, borrowed from the input buffer.
///
/// Coordinates are kept 1-based inclusive as given by the source format.
/// `exon_number` is the rank declared in column 9 when present; declared
/// ranks are unreliable in the wild and are never used for ordering.
#[derive(Debug, PartialEq)]
pub struct Record<'a> {
    pub chrom: &'a str,
    pub feat: Feature,
    pub start: u64,
    pub end: u64,
    pub strand: Strand,
    pub transcript_id: &'a str,
    pub exon_number: Option<u32>,
}

impl<'a> Record<'a> {
    /// Parses one 9-column GTF/GFF line. `SEP` is the attribute key/value
    /// separator in column 9: `b' '` for GTF, `b'='` for GFF3.
    pub fn parse<const SEP: u8>(line: &'a str) -> Result<Self, ParseError> {
        if line.is_empty() {
            return Err(ParseError::Empty);
        }

        let mut cols = [""; 9];
        let mut n = 0;
        for field in line.splitn(9, '\t') {
            cols[n] = field;
            n += 1;
        }
        if n < 9 {
            return Err(ParseError::Invalid);
        }

        let feat = Feature::from_column(cols[2]);
        if feat == Feature::Gene {
            return Err(ParseError::GeneRow);
        }

        let start: u64 = cols[3].parse().map_err(|_| ParseError::BadCoordinate)?;
        let end: u64 = cols[4].parse().map_err(|_| ParseError::BadCoordinate)?;
        if end < start {
            return Err(ParseError::BadCoordinate);
        }

        let strand = Strand::parse(cols[6])?;
        let attributes = Attribute::parse::<SEP>(cols[8])?;

        Ok(Record {
            chrom: cols[0],
            feat,
            start,
            end,
            strand,
            transcript_id: attributes.transcript_id(),
            exon_number: attributes.exon_number().and_then(|rank| rank.parse().ok()),
        })
    }
}
