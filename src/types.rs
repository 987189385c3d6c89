//! Data carriers exchanged with decoders and encoders
//!
//! Record models belong to the individual codecs; these types are the thin,
//! format-neutral envelope the built-in codecs use to hand data across the
//! [`HtsDecoder`](crate::codec::HtsDecoder) /
//! [`HtsEncoder`](crate::codec::HtsEncoder) boundary.

/// Reference sequence information.
///
/// Each reference sequence (chromosome/contig) has a name and length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Reference sequence name (e.g., "chr1", "chrM")
    pub name: String,
    /// Reference sequence length in bases
    pub length: u32,
}

impl Reference {
    /// Create a new reference.
    pub fn new(name: String, length: u32) -> Self {
        Self { name, length }
    }
}

/// File header as seen by a decoder or handed to an encoder.
///
/// - BAM/SAM/CRAM: SAM header text (`@HD`, `@SQ`, …) plus the reference dictionary
/// - VCF: every `##` meta line and the `#CHROM` column line
/// - FASTA: empty
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HtsHeader {
    /// Header text, newline separated
    pub text: String,
    /// Reference sequences (chromosomes/contigs)
    pub references: Vec<Reference>,
}

impl HtsHeader {
    /// Create a new header.
    pub fn new(text: String, references: Vec<Reference>) -> Self {
        Self { text, references }
    }

    /// Get number of reference sequences.
    pub fn reference_count(&self) -> usize {
        self.references.len()
    }

    /// Reference dictionary built from the `@SQ` lines of SAM header text.
    ///
    /// Lines missing `SN:` or a numeric `LN:` are skipped.
    pub fn references_from_sam_text(text: &str) -> Vec<Reference> {
        let mut references = Vec::new();
        for line in text.lines().filter(|l| l.starts_with("@SQ")) {
            let mut name = None;
            let mut length = None;

            for field in line.split('\t').skip(1) {
                if let Some(value) = field.strip_prefix("SN:") {
                    name = Some(value.to_string());
                } else if let Some(value) = field.strip_prefix("LN:") {
                    length = value.parse::<u32>().ok();
                }
            }

            if let (Some(name), Some(length)) = (name, length) {
                references.push(Reference::new(name, length));
            }
        }
        references
    }
}

/// A FASTA record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastaRecord {
    /// Sequence identifier (without '>' prefix)
    pub id: String,
    /// DNA/RNA/protein sequence
    pub sequence: Vec<u8>,
}

impl FastaRecord {
    /// Create a new FASTA record
    pub fn new(id: String, sequence: Vec<u8>) -> Self {
        Self { id, sequence }
    }
}

/// One record as produced by a decoder or accepted by an encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HtsRecord {
    /// Encoded BAM alignment block, without its leading `block_size` field
    Alignment(Vec<u8>),
    /// One data line of a text format (SAM, VCF), without the line terminator
    Line(String),
    /// A named sequence
    Sequence(FastaRecord),
}

impl HtsRecord {
    /// Short name of the record kind, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            HtsRecord::Alignment(_) => "alignment",
            HtsRecord::Line(_) => "line",
            HtsRecord::Sequence(_) => "sequence",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_references_from_sam_text() {
        let text = "@HD\tVN:1.6\tSO:coordinate\n\
                    @SQ\tSN:chr1\tLN:248956422\n\
                    @SQ\tSN:chrM\tLN:16569\n\
                    @SQ\tSN:broken\n\
                    @PG\tID:bwa\n";
        let refs = HtsHeader::references_from_sam_text(text);
        assert_eq!(
            refs,
            vec![
                Reference::new("chr1".to_string(), 248956422),
                Reference::new("chrM".to_string(), 16569),
            ]
        );
    }

    #[test]
    fn test_record_kind() {
        assert_eq!(HtsRecord::Alignment(vec![]).kind(), "alignment");
        assert_eq!(HtsRecord::Line(String::new()).kind(), "line");
        let seq = FastaRecord::new("chr1".to_string(), b"ACGT".to_vec());
        assert_eq!(HtsRecord::Sequence(seq).kind(), "sequence");
    }
}
