//! biometal-codecs: format resolution for genomic data files
//!
//! # Overview
//!
//! Given a resource (a file, a URL, or a raw stream) and optional hints
//! about its content, the registry picks exactly one codec able to decode
//! it, or exactly one codec able to encode to it. Codecs are plugins: each
//! declares a file format, a version, and how to recognise its files by
//! locator and by leading bytes.
//!
//! ## Key Features
//!
//! - **One probe per resolution**: a single signature prefix is read and
//!   shared by every candidate, so non-seekable streams can still be decoded
//! - **Exact matches only**: zero matches and ambiguous matches are both
//!   errors naming the resource and the candidates
//! - **Built-in codecs**: BAM, SAM, CRAM (header), VCF, FASTA
//!
//! ## Quick Start
//!
//! ```no_run
//! use biometal_codecs::format::content_types;
//! use biometal_codecs::{Bundle, DecoderOptions, Registry};
//!
//! # fn main() -> biometal_codecs::Result<()> {
//! let registry = Registry::with_builtin_codecs()?;
//! let bundle = Bundle::from_path("sample.bam", content_types::ALIGNED_READS);
//!
//! let mut decoder = registry.reads().decoder_for(bundle, &DecoderOptions::default())?;
//! println!("{} references", decoder.header().reference_count());
//! for record in decoder.records() {
//!     let record = record?;
//!     // Process one record at a time
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`bundle`]: Resources, locators, bundles, signature probing
//! - [`codec`]: The codec, decoder and encoder traits
//! - [`codecs`]: Built-in codecs
//! - [`registry`]: Per-category resolvers and the registry
//! - [`format`]: Content types, categories and file formats
//! - [`options`]: Decoder/encoder options, loadable from TOML
//! - [`io`]: File access and compression

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod bundle;
pub mod codec;
pub mod codecs;
pub mod error;
pub mod format;
pub mod io;
pub mod options;
pub mod registry;
pub mod types;
pub mod version;

// Re-export commonly used types
pub use bundle::{Bundle, BundleBuilder, BundleResource, Locator, SignatureProbingStream};
pub use codec::{HtsCodec, HtsDecoder, HtsEncoder};
pub use codecs::builtin_codecs;
pub use error::{CodecError, Result};
pub use format::{Category, FileFormat};
pub use options::{CodecOptions, DecoderOptions, EncoderOptions};
pub use registry::{CategoryResolver, Registry};
pub use types::{FastaRecord, HtsHeader, HtsRecord, Reference};
pub use version::Version;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
