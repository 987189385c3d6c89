//! FASTA haploid reference codec
//!
//! Sequences are read whole (multi-line records are joined) and written
//! wrapped at [`EncoderOptions::fasta_line_width`]. FASTA has no header;
//! decoders report an empty one and `write_header` is a no-op.

use super::{codec_name, instance_name, open_input, open_output, Sink};
use crate::bundle::{Bundle, Locator, SignatureProbingStream};
use crate::codec::{HtsCodec, HtsDecoder, HtsEncoder};
use crate::error::{CodecError, Result};
use crate::format::{FileFormat, HaploidReferenceFormat};
use crate::io::compression::{decompressed, inflate_prefix, is_gzip, BGZF_MAX_BLOCK_SIZE};
use crate::options::{DecoderOptions, EncoderOptions};
use crate::types::{FastaRecord, HtsHeader, HtsRecord};
use crate::version::Version;
use std::io::{BufRead, BufReader, Write};

const EXTENSIONS: [&str; 3] = [".fa", ".fasta", ".fna"];

/// Plain or gzipped FASTA
#[derive(Debug, Clone)]
pub struct FastaCodec {
    name: String,
}

impl FastaCodec {
    /// FASTA has no versions of its own
    pub const VERSION: Version = Version::new(1, 0, 0);

    /// Create the codec
    pub fn new() -> Self {
        Self {
            name: codec_name("FASTA", Self::VERSION),
        }
    }
}

impl Default for FastaCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl HtsCodec for FastaCodec {
    fn file_format(&self) -> FileFormat {
        FileFormat::HaploidReference(HaploidReferenceFormat::Fasta)
    }

    fn version(&self) -> Version {
        Self::VERSION
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn can_decode_uri(&self, locator: &Locator) -> bool {
        EXTENSIONS.iter().any(|ext| {
            locator.has_extension(ext)
                || locator.has_extension(&format!("{}.gz", ext))
                || locator.has_extension(&format!("{}.bgz", ext))
        })
    }

    /// First non-whitespace byte is `>`, after inflating gzip input.
    fn can_decode_signature(
        &self,
        stream: &mut SignatureProbingStream,
        _source_name: &str,
    ) -> bool {
        let prefix = stream.as_bytes();
        let inflated;
        let content = if is_gzip(prefix) {
            inflated = inflate_prefix(prefix, BGZF_MAX_BLOCK_SIZE);
            &inflated[..]
        } else {
            prefix
        };

        content.iter().find(|b| !b.is_ascii_whitespace()) == Some(&b'>')
    }

    fn signature_probe_size(&self) -> usize {
        BGZF_MAX_BLOCK_SIZE
    }

    fn decoder(&self, bundle: Bundle, options: &DecoderOptions) -> Result<Box<dyn HtsDecoder>> {
        let input = open_input(bundle)?;
        let reader = BufReader::with_capacity(options.buffer_size, decompressed(input.stream)?);
        Ok(Box::new(FastaDecoder {
            name: instance_name(&self.name, &input.name),
            reader: Box::new(reader),
            header: HtsHeader::default(),
            line: String::new(),
            next_header: None,
            line_number: 0,
        }))
    }

    fn encoder(&self, bundle: Bundle, options: &EncoderOptions) -> Result<Box<dyn HtsEncoder>> {
        let output = open_output(bundle)?;
        let name = instance_name(&self.name, &output.name);
        let sink = if output.wants_bgzf() {
            Sink::bgzf(output.stream, options)
        } else {
            Sink::plain(output.stream)
        };
        Ok(Box::new(FastaEncoder {
            name,
            sink,
            line_width: options.fasta_line_width,
        }))
    }
}

struct FastaDecoder {
    name: String,
    reader: Box<dyn BufRead + Send>,
    header: HtsHeader,
    line: String,
    /// Header line of the next record, read while finishing the previous one
    next_header: Option<String>,
    line_number: usize,
}

impl FastaDecoder {
    fn invalid(&self, msg: String) -> CodecError {
        CodecError::InvalidFormat {
            format: "FASTA".to_string(),
            source_name: self.name.clone(),
            msg: format!("line {}: {}", self.line_number, msg),
        }
    }

    /// Next non-blank line, trimmed
    fn next_line(&mut self) -> Result<Option<String>> {
        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line)? == 0 {
                return Ok(None);
            }
            self.line_number += 1;

            let line = self.line.trim();
            if !line.is_empty() {
                return Ok(Some(line.to_string()));
            }
        }
    }
}

impl HtsDecoder for FastaDecoder {
    fn display_name(&self) -> &str {
        &self.name
    }

    fn file_format(&self) -> FileFormat {
        FileFormat::HaploidReference(HaploidReferenceFormat::Fasta)
    }

    fn version(&self) -> Version {
        FastaCodec::VERSION
    }

    fn header(&self) -> &HtsHeader {
        &self.header
    }

    fn read_record(&mut self) -> Result<Option<HtsRecord>> {
        let header = match self.next_header.take() {
            Some(header) => header,
            None => match self.next_line()? {
                Some(line) => line,
                None => return Ok(None),
            },
        };

        let Some(description) = header.strip_prefix('>') else {
            return Err(self.invalid(format!("Expected '>' at start of header, got: {}", header)));
        };
        let id = description.split_whitespace().next().unwrap_or_default().to_string();

        let mut sequence = Vec::new();
        while let Some(line) = self.next_line()? {
            if line.starts_with('>') {
                self.next_header = Some(line);
                break;
            }
            sequence.extend_from_slice(line.as_bytes());
        }

        if sequence.is_empty() {
            return Err(self.invalid(format!("Record '{}' has no sequence", id)));
        }

        Ok(Some(HtsRecord::Sequence(FastaRecord::new(id, sequence))))
    }
}

struct FastaEncoder {
    name: String,
    sink: Sink,
    /// Bases per line; 0 writes each sequence on one line
    line_width: usize,
}

impl HtsEncoder for FastaEncoder {
    fn display_name(&self) -> &str {
        &self.name
    }

    fn file_format(&self) -> FileFormat {
        FileFormat::HaploidReference(HaploidReferenceFormat::Fasta)
    }

    fn version(&self) -> Version {
        FastaCodec::VERSION
    }

    fn write_header(&mut self, _header: &HtsHeader) -> Result<()> {
        Ok(())
    }

    fn write_record(&mut self, record: &HtsRecord) -> Result<()> {
        let HtsRecord::Sequence(record) = record else {
            return Err(CodecError::InvalidInput {
                msg: format!("{} cannot write {} records", self.name, record.kind()),
            });
        };
        if record.id.is_empty() || record.id.contains(char::is_whitespace) {
            return Err(CodecError::InvalidInput {
                msg: format!("Invalid FASTA sequence id: '{}'", record.id),
            });
        }

        writeln!(self.sink, ">{}", record.id)?;
        let width = if self.line_width == 0 {
            record.sequence.len().max(1)
        } else {
            self.line_width
        };
        for chunk in record.sequence.chunks(width) {
            self.sink.write_all(chunk)?;
            self.sink.write_all(b"\n")?;
        }
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<()> {
        self.sink.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::content_types::HAPLOID_REFERENCE;
    use bytes::Bytes;
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    /// Output stream whose bytes stay readable after the encoder drops it
    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn decode(content: &'static [u8]) -> Result<Vec<HtsRecord>> {
        let bundle = Bundle::from_input_stream(Cursor::new(content), "mem", HAPLOID_REFERENCE);
        let mut decoder = FastaCodec::new().decoder(bundle, &DecoderOptions::default())?;
        decoder.records().collect()
    }

    fn sequence(id: &str, seq: &str) -> HtsRecord {
        HtsRecord::Sequence(FastaRecord::new(id.to_string(), seq.as_bytes().to_vec()))
    }

    #[test]
    fn test_signature() {
        let codec = FastaCodec::new();
        let mut probe = SignatureProbingStream::new(Bytes::from_static(b"\n  >chr1\nACGT"));
        assert!(codec.can_decode_signature(&mut probe, "t"));
        let mut probe = SignatureProbingStream::new(Bytes::from_static(b"@read1\nACGT"));
        assert!(!codec.can_decode_signature(&mut probe, "t"));
        let mut probe = SignatureProbingStream::new(Bytes::new());
        assert!(!codec.can_decode_signature(&mut probe, "t"));
    }

    #[test]
    fn test_uri() {
        let codec = FastaCodec::new();
        for ok in ["ref.fa", "ref.fasta", "ref.fna.gz", "ref.FA.BGZ"] {
            assert!(codec.can_decode_uri(&Locator::new(ok).unwrap()), "{}", ok);
        }
        assert!(!codec.can_decode_uri(&Locator::new("ref.fai").unwrap()));
    }

    #[test]
    fn test_decode_multiline_with_blanks() {
        let records = decode(b">seq1 description\nGATT\n\nACA\n>seq2\nACGT\n\n").unwrap();
        assert_eq!(records, vec![sequence("seq1", "GATTACA"), sequence("seq2", "ACGT")]);
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(decode(b"GATTACA\n"), Err(CodecError::InvalidFormat { .. })));
        assert!(matches!(decode(b">seq1\n>seq2\nACGT\n"), Err(CodecError::InvalidFormat { .. })));
        assert!(decode(b"").unwrap().is_empty());
    }

    #[test]
    fn test_encode_wraps_lines() {
        let buffer = SharedBuffer::default();
        let bundle = Bundle::from_output_stream(buffer.clone(), "mem", HAPLOID_REFERENCE);
        let options = EncoderOptions {
            fasta_line_width: 4,
            ..EncoderOptions::default()
        };

        let mut encoder = FastaCodec::new().encoder(bundle, &options).unwrap();
        encoder.write_header(&HtsHeader::default()).unwrap();
        encoder.write_record(&sequence("seq1", "GATTACA")).unwrap();
        assert!(encoder.write_record(&HtsRecord::Line("x".to_string())).is_err());
        assert!(encoder.write_record(&sequence("bad id", "A")).is_err());
        encoder.finish().unwrap();

        assert_eq!(&*buffer.0.lock().unwrap(), b">seq1\nGATT\nACA\n");
    }
}
