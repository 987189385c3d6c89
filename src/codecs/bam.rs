//! BAM 1.0 codec
//!
//! # Format
//!
//! A BAM file is a BGZF stream whose decompressed content is:
//!
//! ```text
//! - 4 bytes: Magic ("BAM\1")
//! - 4 bytes: SAM header text length (l_text, int32)
//! - l_text bytes: SAM header text
//! - 4 bytes: Number of reference sequences (n_ref, int32)
//! - For each reference:
//!   - 4 bytes: Reference name length (l_name, int32, includes null terminator)
//!   - l_name bytes: Reference name (null-terminated)
//!   - 4 bytes: Reference length (int32)
//! - Alignment records, each prefixed by its block size (int32)
//! ```
//!
//! The decoder hands out each alignment block as raw bytes; interpreting
//! records is left to the caller.

use super::{codec_name, instance_name, open_input, open_output, Sink};
use crate::bundle::{Bundle, BundleResource, Locator, SignatureProbingStream};
use crate::codec::{HtsCodec, HtsDecoder, HtsEncoder};
use crate::error::{CodecError, Result};
use crate::format::{FileFormat, ReadsFormat};
use crate::io::compression::{decompressed, inflate_prefix, is_bgzf, BGZF_EOF, BGZF_MAX_BLOCK_SIZE};
use crate::options::{DecoderOptions, EncoderOptions};
use crate::types::{HtsHeader, HtsRecord, Reference};
use crate::version::Version;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use tracing::debug;

/// BAM magic bytes
const BAM_MAGIC: &[u8; 4] = b"BAM\x01";
const MAX_PREALLOCATED_REFERENCES: usize = 1024;

/// Binary alignment map.
#[derive(Debug, Clone)]
pub struct BamCodec {
    name: String,
}

impl BamCodec {
    /// BAM format version
    pub const VERSION: Version = Version::new(1, 0, 0);

    /// Create the codec
    pub fn new() -> Self {
        Self {
            name: codec_name("BAM", Self::VERSION),
        }
    }
}

impl Default for BamCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl HtsCodec for BamCodec {
    fn file_format(&self) -> FileFormat {
        FileFormat::Reads(ReadsFormat::Bam)
    }

    fn version(&self) -> Version {
        Self::VERSION
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn can_decode_uri(&self, locator: &Locator) -> bool {
        locator.has_extension(".bam")
    }

    /// The prefix must be a BGZF block whose content starts with `BAM\1`.
    fn can_decode_signature(&self, stream: &mut SignatureProbingStream, source_name: &str) -> bool {
        let prefix = stream.as_bytes();
        if !is_bgzf(prefix) {
            return false;
        }
        let magic = inflate_prefix(prefix, BAM_MAGIC.len());
        let matched = magic == BAM_MAGIC;
        if !matched {
            debug!(source = source_name, "BGZF content is not BAM");
        }
        matched
    }

    fn signature_probe_size(&self) -> usize {
        BGZF_MAX_BLOCK_SIZE
    }

    fn decoder(&self, mut bundle: Bundle, options: &DecoderOptions) -> Result<Box<dyn HtsDecoder>> {
        if options.validate_eof_marker {
            check_eof_marker(bundle.primary_resource_mut()?)?;
        }

        let input = open_input(bundle)?;
        let name = instance_name(&self.name, &input.name);
        let mut reader = BufReader::with_capacity(options.buffer_size, decompressed(input.stream)?);

        let header = read_header(&mut reader).map_err(|e| CodecError::InvalidFormat {
            format: "BAM".to_string(),
            source_name: input.name.clone(),
            msg: e.to_string(),
        })?;

        Ok(Box::new(BamDecoder {
            name,
            reader: Box::new(reader),
            header,
            buffer: Vec::with_capacity(512),
        }))
    }

    fn encoder(&self, bundle: Bundle, options: &EncoderOptions) -> Result<Box<dyn HtsEncoder>> {
        let output = open_output(bundle)?;
        Ok(Box::new(BamEncoder {
            name: instance_name(&self.name, &output.name),
            sink: Sink::bgzf(output.stream, options),
            header_written: false,
        }))
    }
}

// Only locator-backed files are checked: a seekable stream resource can hand
// out its stream once, and the decoder still needs it.
fn check_eof_marker(resource: &mut dyn BundleResource) -> Result<()> {
    if resource.locator().is_none() || !resource.has_seekable_stream() {
        return Ok(());
    }
    let name = resource.display_name().to_string();
    let mut stream = resource.seekable_stream()?;

    let mut trailer = [0u8; BGZF_EOF.len()];
    let present = stream.seek(SeekFrom::End(-(BGZF_EOF.len() as i64))).is_ok()
        && stream.read_exact(&mut trailer).is_ok()
        && trailer == BGZF_EOF;

    if present {
        Ok(())
    } else {
        Err(CodecError::InvalidFormat {
            format: "BAM".to_string(),
            source_name: name,
            msg: "missing BGZF EOF marker (file may be truncated)".to_string(),
        })
    }
}

struct BamDecoder {
    name: String,
    reader: Box<dyn BufRead + Send>,
    header: HtsHeader,
    /// Reused across records
    buffer: Vec<u8>,
}

impl HtsDecoder for BamDecoder {
    fn display_name(&self) -> &str {
        &self.name
    }

    fn file_format(&self) -> FileFormat {
        FileFormat::Reads(ReadsFormat::Bam)
    }

    fn version(&self) -> Version {
        BamCodec::VERSION
    }

    fn header(&self) -> &HtsHeader {
        &self.header
    }

    fn read_record(&mut self) -> Result<Option<HtsRecord>> {
        let mut size_buf = [0u8; 4];
        match self.reader.read_exact(&mut size_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let block_size = i32::from_le_bytes(size_buf);
        if block_size < 0 {
            return Err(CodecError::InvalidFormat {
                format: "BAM".to_string(),
                source_name: self.name.clone(),
                msg: format!("Invalid block size: {}", block_size),
            });
        }

        self.buffer.clear();
        self.buffer.resize(block_size as usize, 0);
        self.reader.read_exact(&mut self.buffer)?;
        Ok(Some(HtsRecord::Alignment(self.buffer.clone())))
    }
}

struct BamEncoder {
    name: String,
    sink: Sink,
    header_written: bool,
}

impl HtsEncoder for BamEncoder {
    fn display_name(&self) -> &str {
        &self.name
    }

    fn file_format(&self) -> FileFormat {
        FileFormat::Reads(ReadsFormat::Bam)
    }

    fn version(&self) -> Version {
        BamCodec::VERSION
    }

    fn write_header(&mut self, header: &HtsHeader) -> Result<()> {
        if self.header_written {
            return Err(CodecError::InvalidInput {
                msg: format!("{}: header already written", self.name),
            });
        }
        write_header(&mut self.sink, header)?;
        self.header_written = true;
        Ok(())
    }

    fn write_record(&mut self, record: &HtsRecord) -> Result<()> {
        if !self.header_written {
            return Err(CodecError::InvalidInput {
                msg: format!("{}: header must be written before records", self.name),
            });
        }

        match record {
            HtsRecord::Alignment(block) => {
                let size = i32::try_from(block.len()).map_err(|_| CodecError::InvalidInput {
                    msg: format!("alignment block too large: {} bytes", block.len()),
                })?;
                self.sink.write_all(&size.to_le_bytes())?;
                self.sink.write_all(block)?;
                Ok(())
            }
            other => Err(CodecError::InvalidInput {
                msg: format!("{} cannot write {} records", self.name, other.kind()),
            }),
        }
    }

    fn finish(self: Box<Self>) -> Result<()> {
        self.sink.finish()
    }
}

fn invalid_data(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

fn read_i32<R: Read>(reader: &mut R) -> io::Result<i32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

/// Read the binary header: magic, SAM text, and reference dictionary.
///
/// When the SAM text carries `@SQ` lines they are expected to agree with the
/// binary dictionary; the binary dictionary wins.
fn read_header<R: Read>(reader: &mut R) -> io::Result<HtsHeader> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != BAM_MAGIC {
        return Err(invalid_data(format!(
            "Invalid BAM magic: expected {:?}, got {:?}",
            BAM_MAGIC, magic
        )));
    }

    let text_len = read_i32(reader)?;
    if text_len < 0 {
        return Err(invalid_data(format!("Invalid SAM header length: {}", text_len)));
    }
    let mut text_bytes = Vec::new();
    Read::take(&mut *reader, text_len as u64).read_to_end(&mut text_bytes)?;
    if text_bytes.len() < text_len as usize {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("SAM header truncated at {} of {} bytes", text_bytes.len(), text_len),
        ));
    }
    // l_text may include trailing NULs
    while text_bytes.last() == Some(&0) {
        text_bytes.pop();
    }
    let text = String::from_utf8(text_bytes)
        .map_err(|e| invalid_data(format!("Invalid UTF-8 in SAM header: {}", e)))?;

    let count = read_i32(reader)?;
    if count < 0 {
        return Err(invalid_data(format!("Invalid reference count: {}", count)));
    }

    // n_ref is untrusted until the references themselves are read
    let mut references = Vec::with_capacity((count as usize).min(MAX_PREALLOCATED_REFERENCES));
    for i in 0..count {
        let reference = read_reference(reader)
            .map_err(|e| invalid_data(format!("Error reading reference {}: {}", i, e)))?;
        references.push(reference);
    }

    Ok(HtsHeader::new(text, references))
}

fn read_reference<R: Read>(reader: &mut R) -> io::Result<Reference> {
    let name_len = read_i32(reader)?;
    if name_len <= 0 {
        return Err(invalid_data(format!("Invalid reference name length: {}", name_len)));
    }

    let mut name_bytes = vec![0u8; name_len as usize];
    reader.read_exact(&mut name_bytes)?;
    if name_bytes.pop() != Some(0) {
        return Err(invalid_data("Reference name not null-terminated".to_string()));
    }
    let name = String::from_utf8(name_bytes)
        .map_err(|e| invalid_data(format!("Invalid UTF-8 in reference name: {}", e)))?;

    let length = read_i32(reader)?;
    if length < 0 {
        return Err(invalid_data(format!("Invalid reference length: {}", length)));
    }

    Ok(Reference::new(name, length as u32))
}

/// Write the binary header. References default to the `@SQ` lines of the
/// text when the header carries none.
fn write_header<W: Write>(writer: &mut W, header: &HtsHeader) -> Result<()> {
    let derived;
    let references = if header.references.is_empty() {
        derived = HtsHeader::references_from_sam_text(&header.text);
        &derived
    } else {
        &header.references
    };

    let too_large = |what: &str| CodecError::InvalidInput {
        msg: format!("BAM header {} too large", what),
    };

    writer.write_all(BAM_MAGIC)?;
    let text_len = i32::try_from(header.text.len()).map_err(|_| too_large("text"))?;
    writer.write_all(&text_len.to_le_bytes())?;
    writer.write_all(header.text.as_bytes())?;

    let count = i32::try_from(references.len()).map_err(|_| too_large("dictionary"))?;
    writer.write_all(&count.to_le_bytes())?;
    for reference in references {
        let name_len =
            i32::try_from(reference.name.len() + 1).map_err(|_| too_large("reference name"))?;
        let length = i32::try_from(reference.length).map_err(|_| too_large("reference length"))?;
        writer.write_all(&name_len.to_le_bytes())?;
        writer.write_all(reference.name.as_bytes())?;
        writer.write_all(&[0])?;
        writer.write_all(&length.to_le_bytes())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::content_types::ALIGNED_READS;
    use crate::io::compression::BgzfWriter;
    use bytes::Bytes;
    use std::io::Cursor;

    fn header() -> HtsHeader {
        HtsHeader::new(
            "@HD\tVN:1.6\n@SQ\tSN:chr1\tLN:1000\n".to_string(),
            vec![Reference::new("chr1".to_string(), 1000)],
        )
    }

    fn bam_bytes(records: &[Vec<u8>]) -> Vec<u8> {
        let mut writer = BgzfWriter::new(Vec::new());
        write_header(&mut writer, &header()).unwrap();
        for record in records {
            writer.write_all(&(record.len() as i32).to_le_bytes()).unwrap();
            writer.write_all(record).unwrap();
        }
        writer.finish().unwrap()
    }

    #[test]
    fn test_signature() {
        let codec = BamCodec::new();
        let mut probe = SignatureProbingStream::new(Bytes::from(bam_bytes(&[])));
        assert!(codec.can_decode_signature(&mut probe, "test.bam"));

        // BGZF that isn't BAM
        let mut writer = BgzfWriter::new(Vec::new());
        writer.write_all(b"##fileformat=VCFv4.2\n").unwrap();
        let mut probe = SignatureProbingStream::new(Bytes::from(writer.finish().unwrap()));
        assert!(!codec.can_decode_signature(&mut probe, "test.vcf.gz"));

        // Uncompressed magic alone is not BAM
        let mut probe = SignatureProbingStream::new(Bytes::from_static(b"BAM\x01"));
        assert!(!codec.can_decode_signature(&mut probe, "raw"));
    }

    #[test]
    fn test_read_header() {
        let mut data = Vec::new();
        write_header(&mut data, &header()).unwrap();
        let parsed = read_header(&mut Cursor::new(data)).unwrap();
        assert_eq!(parsed, header());
    }

    #[test]
    fn test_read_header_invalid_magic() {
        assert!(read_header(&mut Cursor::new(b"BAMX\0\0\0\0".to_vec())).is_err());
    }

    #[test]
    fn test_read_header_oversized_counts_fail_cleanly() {
        // n_ref claims i32::MAX references but none follow
        let mut data = BAM_MAGIC.to_vec();
        data.extend_from_slice(&0i32.to_le_bytes());
        data.extend_from_slice(&i32::MAX.to_le_bytes());
        let err = read_header(&mut Cursor::new(data)).unwrap_err();
        assert!(err.to_string().contains("reference 0"), "{}", err);

        // l_text far beyond the data
        let mut data = BAM_MAGIC.to_vec();
        data.extend_from_slice(&i32::MAX.to_le_bytes());
        data.extend_from_slice(b"@HD");
        let err = read_header(&mut Cursor::new(data)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_references_derived_from_text() {
        let text_only = HtsHeader::new("@SQ\tSN:chrM\tLN:16569\n".to_string(), Vec::new());
        let mut data = Vec::new();
        write_header(&mut data, &text_only).unwrap();
        let parsed = read_header(&mut Cursor::new(data)).unwrap();
        assert_eq!(parsed.references, vec![Reference::new("chrM".to_string(), 16569)]);
    }

    #[test]
    fn test_decode_records() {
        let records = vec![vec![1u8; 40], vec![2u8; 36]];
        let bundle =
            Bundle::from_input_stream(Cursor::new(bam_bytes(&records)), "mem", ALIGNED_READS);

        let mut decoder = BamCodec::new().decoder(bundle, &DecoderOptions::default()).unwrap();
        assert_eq!(decoder.header().reference_count(), 1);
        let decoded: Vec<_> = decoder.records().collect::<Result<_>>().unwrap();
        assert_eq!(
            decoded,
            vec![HtsRecord::Alignment(vec![1u8; 40]), HtsRecord::Alignment(vec![2u8; 36])]
        );
    }

    #[test]
    fn test_encoder_requires_header_and_alignments() {
        let bundle = Bundle::from_output_stream(Vec::new(), "mem", ALIGNED_READS);
        let mut encoder = BamCodec::new().encoder(bundle, &EncoderOptions::default()).unwrap();

        assert!(matches!(
            encoder.write_record(&HtsRecord::Alignment(vec![0; 4])),
            Err(CodecError::InvalidInput { .. })
        ));
        encoder.write_header(&header()).unwrap();
        assert!(matches!(
            encoder.write_record(&HtsRecord::Line("r1".to_string())),
            Err(CodecError::InvalidInput { .. })
        ));
        encoder.write_record(&HtsRecord::Alignment(vec![0; 4])).unwrap();
        encoder.finish().unwrap();
    }

    #[test]
    fn test_eof_marker_validation() {
        let dir = tempfile::tempdir().unwrap();
        let options = DecoderOptions {
            validate_eof_marker: true,
            ..DecoderOptions::default()
        };

        let good = dir.path().join("good.bam");
        std::fs::write(&good, bam_bytes(&[])).unwrap();
        assert!(BamCodec::new()
            .decoder(Bundle::from_path(&good, ALIGNED_READS), &options)
            .is_ok());

        let mut truncated = bam_bytes(&[]);
        truncated.truncate(truncated.len() - BGZF_EOF.len());
        let bad = dir.path().join("bad.bam");
        std::fs::write(&bad, truncated).unwrap();
        assert!(matches!(
            BamCodec::new().decoder(Bundle::from_path(&bad, ALIGNED_READS), &options),
            Err(CodecError::InvalidFormat { .. })
        ));
    }
}
