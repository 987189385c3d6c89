//! Built-in codecs
//!
//! Reference implementations of the [`HtsCodec`] contract for the common
//! genomic formats:
//!
//! | Codec | Versions | Extensions | Signature |
//! |---|---|---|---|
//! | [`BamCodec`] | 1.0 | `.bam` | BGZF block inflating to `BAM\1` |
//! | [`SamCodec`] | 1.0 | `.sam` | `@HD`/`@SQ`/`@RG`/`@PG`/`@CO` + TAB |
//! | [`CramCodec`] | 3.0, 3.1 | `.cram` | `CRAM` + major + minor |
//! | [`VcfCodec`] | 4.0, 4.1, 4.2, 4.3 | `.vcf`, `.vcf.gz`, `.vcf.bgz` | `##fileformat=VCFv4.N` |
//! | [`FastaCodec`] | 1.0 | `.fa`, `.fasta`, `.fna` (+ `.gz`) | first non-blank byte `>` |
//!
//! [`builtin_codecs`] is the list handed to
//! [`Registry::discover`](crate::Registry::discover).

mod bam;
mod cram;
mod fasta;
mod sam;
mod text;
mod vcf;

pub use bam::BamCodec;
pub use cram::CramCodec;
pub use fasta::FastaCodec;
pub use sam::SamCodec;
pub use vcf::VcfCodec;

use crate::bundle::{Bundle, Locator};
use crate::codec::HtsCodec;
use crate::error::Result;
use crate::io::compression::BgzfWriter;
use crate::options::EncoderOptions;
use crate::version::Version;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

/// Every built-in codec, one instance per supported version
pub fn builtin_codecs() -> Vec<Arc<dyn HtsCodec>> {
    vec![
        Arc::new(BamCodec::new()),
        Arc::new(SamCodec::new()),
        Arc::new(CramCodec::new(CramCodec::V3_0)),
        Arc::new(CramCodec::new(CramCodec::V3_1)),
        Arc::new(VcfCodec::new(VcfCodec::V4_0)),
        Arc::new(VcfCodec::new(VcfCodec::V4_1)),
        Arc::new(VcfCodec::new(VcfCodec::V4_2)),
        Arc::new(VcfCodec::new(VcfCodec::V4_3)),
        Arc::new(FastaCodec::new()),
    ]
}

/// Primary input of a bundle: display name and content stream
pub(crate) struct Input {
    pub(crate) name: String,
    pub(crate) stream: Box<dyn BufRead + Send>,
}

/// Primary output of a bundle: display name, locator (if any), and stream
pub(crate) struct Output {
    pub(crate) name: String,
    pub(crate) locator: Option<Locator>,
    pub(crate) stream: Box<dyn Write + Send>,
}

impl Output {
    /// Whether the destination names a compressed file
    pub(crate) fn wants_bgzf(&self) -> bool {
        self.locator
            .as_ref()
            .is_some_and(|l| l.has_extension(".gz") || l.has_extension(".bgz"))
    }
}

pub(crate) fn open_input(mut bundle: Bundle) -> Result<Input> {
    let resource = bundle.primary_resource_mut()?;
    let name = resource.display_name().to_string();
    let stream = resource.input_stream()?;
    Ok(Input { name, stream })
}

pub(crate) fn open_output(mut bundle: Bundle) -> Result<Output> {
    let resource = bundle.primary_resource_mut()?;
    let name = resource.display_name().to_string();
    let locator = resource.locator().cloned();
    let stream = resource.output_stream()?;
    Ok(Output {
        name,
        locator,
        stream,
    })
}

/// Encoder destination: plain, or BGZF compressed
pub(crate) enum Sink {
    Plain(Box<dyn Write + Send>),
    Bgzf(BgzfWriter<Box<dyn Write + Send>>),
}

impl Sink {
    pub(crate) fn plain(stream: Box<dyn Write + Send>) -> Self {
        Sink::Plain(stream)
    }

    pub(crate) fn bgzf(stream: Box<dyn Write + Send>, options: &EncoderOptions) -> Self {
        Sink::Bgzf(BgzfWriter::with_settings(
            stream,
            options.compression_level,
            options.bgzf_parallel_blocks,
            options.write_eof_marker,
        ))
    }

    /// Flush buffered data, compress any partial block, write trailers
    pub(crate) fn finish(self) -> Result<()> {
        match self {
            Sink::Plain(mut stream) => stream.flush()?,
            Sink::Bgzf(writer) => writer.finish()?.flush()?,
        }
        Ok(())
    }
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Sink::Plain(stream) => stream.write(buf),
            Sink::Bgzf(writer) => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Plain(stream) => stream.flush(),
            Sink::Bgzf(writer) => writer.flush(),
        }
    }
}

/// Display name for a decoder or encoder bound to `source`
pub(crate) fn instance_name(codec: &str, source: &str) -> String {
    format!("{} ({})", codec, source)
}

/// Display name for a codec of `format` at `version`
pub(crate) fn codec_name(format: &str, version: Version) -> String {
    format!("{} {}.{}", format, version.major(), version.minor())
}
