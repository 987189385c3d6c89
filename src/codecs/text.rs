//! Line-oriented decoding and encoding shared by SAM and VCF
//!
//! Both formats are a block of header lines, each starting with a fixed
//! prefix byte (`@` or `#`), followed by one record per line.

use super::Sink;
use crate::codec::{HtsDecoder, HtsEncoder};
use crate::error::{CodecError, Result};
use crate::format::FileFormat;
use crate::types::{HtsHeader, HtsRecord, Reference};
use crate::version::Version;
use std::io::{BufRead, Write};

/// Builds the reference dictionary from header text
pub(crate) type ReferenceParser = fn(&str) -> Vec<Reference>;

/// Renders header text for output, validating or completing it
pub(crate) type HeaderRenderer = fn(&str, Version) -> Result<String>;

pub(crate) struct TextDecoder {
    name: String,
    format: FileFormat,
    version: Version,
    reader: Box<dyn BufRead + Send>,
    header: HtsHeader,
    line: String,
}

impl TextDecoder {
    /// Read every leading line starting with `header_prefix` as header
    pub(crate) fn new(
        name: String,
        format: FileFormat,
        version: Version,
        mut reader: Box<dyn BufRead + Send>,
        header_prefix: u8,
        references: ReferenceParser,
    ) -> Result<Self> {
        let mut text = String::new();
        let mut line = String::with_capacity(256);

        while reader.fill_buf()?.first() == Some(&header_prefix) {
            line.clear();
            reader.read_line(&mut line)?;
            text.push_str(line.trim_end_matches(['\r', '\n']));
            text.push('\n');
        }

        let references = references(&text);
        Ok(Self {
            name,
            format,
            version,
            reader,
            header: HtsHeader::new(text, references),
            line,
        })
    }
}

impl HtsDecoder for TextDecoder {
    fn display_name(&self) -> &str {
        &self.name
    }

    fn file_format(&self) -> FileFormat {
        self.format
    }

    fn version(&self) -> Version {
        self.version
    }

    fn header(&self) -> &HtsHeader {
        &self.header
    }

    fn read_record(&mut self) -> Result<Option<HtsRecord>> {
        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line)? == 0 {
                return Ok(None);
            }

            let record = self.line.trim_end_matches(['\r', '\n']);
            if !record.is_empty() {
                return Ok(Some(HtsRecord::Line(record.to_string())));
            }
        }
    }
}

pub(crate) struct TextEncoder {
    name: String,
    format: FileFormat,
    version: Version,
    sink: Sink,
    render_header: HeaderRenderer,
    header_written: bool,
}

impl TextEncoder {
    pub(crate) fn new(
        name: String,
        format: FileFormat,
        version: Version,
        sink: Sink,
        render_header: HeaderRenderer,
    ) -> Self {
        Self {
            name,
            format,
            version,
            sink,
            render_header,
            header_written: false,
        }
    }
}

impl HtsEncoder for TextEncoder {
    fn display_name(&self) -> &str {
        &self.name
    }

    fn file_format(&self) -> FileFormat {
        self.format
    }

    fn version(&self) -> Version {
        self.version
    }

    fn write_header(&mut self, header: &HtsHeader) -> Result<()> {
        if self.header_written {
            return Err(CodecError::InvalidInput {
                msg: format!("{}: header already written", self.name),
            });
        }

        let text = (self.render_header)(&header.text, self.version)?;
        self.sink.write_all(text.as_bytes())?;
        if !text.is_empty() && !text.ends_with('\n') {
            self.sink.write_all(b"\n")?;
        }
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
            HtsRecord::Line(line) if !line.contains('\n') => {
                self.sink.write_all(line.as_bytes())?;
                self.sink.write_all(b"\n")?;
                Ok(())
            }
            HtsRecord::Line(_) => Err(CodecError::InvalidInput {
                msg: "record lines must not contain newlines".to_string(),
            }),
            other => Err(CodecError::InvalidInput {
                msg: format!("{} cannot write {} records", self.name, other.kind()),
            }),
        }
    }

    fn finish(self: Box<Self>) -> Result<()> {
        self.sink.finish()
    }
}

/// Check every non-empty header line starts with `prefix`
pub(crate) fn check_header_lines(text: &str, prefix: char, format: &str) -> Result<()> {
    match text.lines().find(|l| !l.is_empty() && !l.starts_with(prefix)) {
        Some(line) => Err(CodecError::InvalidInput {
            msg: format!("{} header line must start with '{}': {}", format, prefix, line),
        }),
        None => Ok(()),
    }
}
