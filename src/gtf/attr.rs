use thiserror::Error;

macro_rules! extract_field {
    ($bytes:ident split by $sep:ident to $( $field_name:literal => $output_field:expr; )+) => {
        $(
            if let Some(without_key) = $bytes.strip_prefix($field_name) {
                if let Some(without_eq) = without_key.strip_prefix(&[$sep]) {
                    let value = unsafe { std::str::from_utf8_unchecked(without_eq) };
                    *$output_field = Some(value.trim_matches(|c| c == '"'));
                }
            }
        )+
    };
}

#[inline(always)]
fn split_and_trim_bytes<const BY: u8, const TRIM: u8>(bytes: &[u8]) -> impl Iterator<Item = &[u8]> {
    bytes.split(|b| *b == BY).map(|b| {
        let mut idx = 0;
        while idx < b.len() && b[idx] == TRIM {
            idx += 1;
        }
        &b[idx..]
    })
}

/// The two attributes the classifier consumes from column 9. Everything
/// else in the attribute list is scanned over without being parsed.
#[derive(Debug, PartialEq)]
pub struct Attribute<'a> {
    transcript_id: &'a str,
    exon_number: Option<&'a str>,
}

impl<'a> Attribute<'a> {
    pub fn parse<const SEP: u8>(line: &'a str) -> Result<Attribute<'a>, ParseError> {
        if !line.is_empty() {
            let field_bytes = split_and_trim_bytes::<b';', b' '>(line.trim_end().as_bytes());

            let (mut transcript_id, mut exon_number) = (None, None);

            for field in field_bytes {
                extract_field!(
                    field split by SEP to
                    b"transcript_id" => (&mut transcript_id);
                    b"exon_number" => (&mut exon_number););
            }

            Ok(Attribute {
                transcript_id: transcript_id.ok_or(ParseError::MissingTranscriptId)?,
                exon_number,
            })
        } else {
            Err(ParseError::Empty)
        }
    }

    #[inline(always)]
    pub fn transcript_id(&self) -> &'a str {
        self.transcript_id
    }

    #[inline(always)]
    pub fn exon_number(&self) -> Option<&'a str> {
        self.exon_number
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    // Empty line or attribute column
    #[error("Empty line, cannot parse")]
    Empty,

    // Fewer than 9 tab-separated columns
    #[error("Invalid annotation line, expected 9 columns")]
    Invalid,

    // Columns 4/5 not integers, or right < left
    #[error("Invalid coordinate pair in columns 4-5")]
    BadCoordinate,

    // Strand column outside +/-
    #[error("Unknown strand symbol in column 7")]
    BadStrand,

    // Gene rows carry no transcript-level data
    #[error("Gene row, nothing to extract")]
    GeneRow,

    // Rows without transcript_id cannot be grouped
    #[error("Missing transcript_id attribute")]
    MissingTranscriptId,
}

impl ParseError {
    /// Structurally broken rows, as opposed to rows the classifier
    /// deliberately ignores.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            ParseError::Invalid | ParseError::BadCoordinate | ParseError::BadStrand
        )
    }
}
