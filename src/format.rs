//! Content categories and the concrete formats within each one.
//!
//! A [`Category`] is a logical content kind (aligned reads, variants, …). Each
//! category owns a closed set of concrete encodings, modelled as one enum per
//! category and joined by [`FileFormat`]. Every category is bound to exactly
//! one bundle content-type string, and every format to exactly one canonical
//! content-subtype string.
//!
//! # Example
//!
//! ```
//! use biometal_codecs::format::{Category, FileFormat, ReadsFormat};
//!
//! assert_eq!(Category::AlignedReads.content_type(), "ALIGNED_READS");
//! assert_eq!(
//!     Category::AlignedReads.format_for_subtype("CRAM"),
//!     Some(FileFormat::Reads(ReadsFormat::Cram))
//! );
//! // Subtype matching is exact
//! assert_eq!(Category::AlignedReads.format_for_subtype("cram"), None);
//! ```

use std::fmt;

/// Standard bundle content types.
pub mod content_types {
    /// Aligned reads (BAM, CRAM, SAM)
    pub const ALIGNED_READS: &str = "ALIGNED_READS";
    /// Index for aligned reads (BAI, CRAI, CSI)
    pub const READS_INDEX: &str = "READS_INDEX";
    /// Variant calls (VCF, BCF)
    pub const VARIANT_CONTEXTS: &str = "VARIANT_CONTEXTS";
    /// Index for variant calls (TBI, CSI)
    pub const VARIANTS_INDEX: &str = "VARIANTS_INDEX";
    /// Haploid reference sequences (FASTA)
    pub const HAPLOID_REFERENCE: &str = "HAPLOID_REFERENCE";
    /// Reference sequence index (FAI)
    pub const REFERENCE_INDEX: &str = "REFERENCE_INDEX";
    /// Reference sequence dictionary (DICT)
    pub const REFERENCE_DICTIONARY: &str = "REFERENCE_DICTIONARY";
    /// Genomic features (BED, GFF3)
    pub const FEATURES: &str = "FEATURES";
}

/// A top-level content kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    /// Aligned sequencing reads
    AlignedReads,
    /// Variant calls
    Variants,
    /// Haploid reference sequences
    HaploidReference,
    /// Genomic features (no resolver yet)
    Features,
}

impl Category {
    /// All categories, in declaration order
    pub const ALL: [Category; 4] = [
        Category::AlignedReads,
        Category::Variants,
        Category::HaploidReference,
        Category::Features,
    ];

    /// The bundle content type a resolver for this category requires
    pub fn content_type(&self) -> &'static str {
        match self {
            Category::AlignedReads => content_types::ALIGNED_READS,
            Category::Variants => content_types::VARIANT_CONTEXTS,
            Category::HaploidReference => content_types::HAPLOID_REFERENCE,
            Category::Features => content_types::FEATURES,
        }
    }

    /// Map a content type string back to its category
    pub fn from_content_type(content_type: &str) -> Option<Category> {
        Category::ALL
            .into_iter()
            .find(|c| c.content_type() == content_type)
    }

    /// Map a content subtype to a format of this category.
    ///
    /// Returns `None` when the subtype is not one of this category's
    /// canonical subtype names. Matching is exact.
    pub fn format_for_subtype(&self, subtype: &str) -> Option<FileFormat> {
        self.formats()
            .iter()
            .copied()
            .find(|f| f.content_subtype() == subtype)
    }

    /// Every format belonging to this category
    pub fn formats(&self) -> &'static [FileFormat] {
        match self {
            Category::AlignedReads => &[
                FileFormat::Reads(ReadsFormat::Bam),
                FileFormat::Reads(ReadsFormat::Cram),
                FileFormat::Reads(ReadsFormat::Sam),
            ],
            Category::Variants => &[
                FileFormat::Variants(VariantsFormat::Vcf),
                FileFormat::Variants(VariantsFormat::Bcf),
            ],
            Category::HaploidReference => {
                &[FileFormat::HaploidReference(HaploidReferenceFormat::Fasta)]
            }
            Category::Features => &[
                FileFormat::Features(FeaturesFormat::Bed),
                FileFormat::Features(FeaturesFormat::Gff3),
            ],
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.content_type())
    }
}

/// Aligned reads encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReadsFormat {
    /// Binary Alignment Map
    Bam,
    /// Reference-compressed alignments
    Cram,
    /// Sequence Alignment Map (text)
    Sam,
}

/// Variant call encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VariantsFormat {
    /// Variant Call Format (text)
    Vcf,
    /// Binary VCF
    Bcf,
}

/// Haploid reference encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HaploidReferenceFormat {
    /// FASTA sequences
    Fasta,
}

/// Feature encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FeaturesFormat {
    /// Browser Extensible Data
    Bed,
    /// General Feature Format v3
    Gff3,
}

/// A concrete encoding, tagged by its category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FileFormat {
    /// An aligned reads format
    Reads(ReadsFormat),
    /// A variants format
    Variants(VariantsFormat),
    /// A haploid reference format
    HaploidReference(HaploidReferenceFormat),
    /// A features format
    Features(FeaturesFormat),
}

impl FileFormat {
    /// Category this format belongs to
    pub fn category(&self) -> Category {
        match self {
            FileFormat::Reads(_) => Category::AlignedReads,
            FileFormat::Variants(_) => Category::Variants,
            FileFormat::HaploidReference(_) => Category::HaploidReference,
            FileFormat::Features(_) => Category::Features,
        }
    }

    /// Canonical content subtype string
    pub fn content_subtype(&self) -> &'static str {
        match self {
            FileFormat::Reads(ReadsFormat::Bam) => "BAM",
            FileFormat::Reads(ReadsFormat::Cram) => "CRAM",
            FileFormat::Reads(ReadsFormat::Sam) => "SAM",
            FileFormat::Variants(VariantsFormat::Vcf) => "VCF",
            FileFormat::Variants(VariantsFormat::Bcf) => "BCF",
            FileFormat::HaploidReference(HaploidReferenceFormat::Fasta) => "FASTA",
            FileFormat::Features(FeaturesFormat::Bed) => "BED",
            FileFormat::Features(FeaturesFormat::Gff3) => "GFF3",
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.content_subtype())
    }
}

impl From<ReadsFormat> for FileFormat {
    fn from(f: ReadsFormat) -> Self {
        FileFormat::Reads(f)
    }
}

impl From<VariantsFormat> for FileFormat {
    fn from(f: VariantsFormat) -> Self {
        FileFormat::Variants(f)
    }
}

impl From<HaploidReferenceFormat> for FileFormat {
    fn from(f: HaploidReferenceFormat) -> Self {
        FileFormat::HaploidReference(f)
    }
}

impl From<FeaturesFormat> for FileFormat {
    fn from(f: FeaturesFormat) -> Self {
        FileFormat::Features(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formats_belong_to_their_category() {
        for category in Category::ALL {
            for format in category.formats() {
                assert_eq!(format.category(), category);
            }
        }
    }

    #[test]
    fn test_content_type_round_trip() {
        for category in Category::ALL {
            assert_eq!(
                Category::from_content_type(category.content_type()),
                Some(category)
            );
        }
        assert_eq!(Category::from_content_type("READS_INDEX"), None);
    }

    #[test]
    fn test_subtype_mapping_is_per_category() {
        assert_eq!(
            Category::Variants.format_for_subtype("VCF"),
            Some(FileFormat::Variants(VariantsFormat::Vcf))
        );
        // BAM is a reads subtype, not a variants one
        assert_eq!(Category::Variants.format_for_subtype("BAM"), None);
        assert_eq!(Category::AlignedReads.format_for_subtype("bam"), None);
    }

    #[test]
    fn test_subtypes_unique() {
        let mut seen = std::collections::HashSet::new();
        for category in Category::ALL {
            for format in category.formats() {
                assert!(seen.insert(format.content_subtype()));
            }
        }
    }
}
