//! Parsed path-or-URI locators for bundle resources

use crate::error::{CodecError, Result};
use crate::io::compression::open_local_file;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};
use url::Url;

/// Scheme given to plain filesystem paths
pub const FILE_SCHEME: &str = "file";

/// A resource location: either a plain filesystem path or a URI.
///
/// Plain paths and `file://` URIs are backed by the local file system; any
/// other scheme (`s3://`, `htsget://`, custom protocols) is not, and can only
/// be recognised by codecs through [`HtsCodec::can_decode_uri`] and
/// [`HtsCodec::claim_uri`].
///
/// [`HtsCodec::can_decode_uri`]: crate::codec::HtsCodec::can_decode_uri
/// [`HtsCodec::claim_uri`]: crate::codec::HtsCodec::claim_uri
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    raw: String,
    scheme: String,
    path: String,
}

impl Locator {
    /// Parse a locator string.
    ///
    /// Anything with a scheme of two or more characters (`s3://…`,
    /// `file:///…`) is parsed as a URI; everything else, including Windows
    /// drive paths like `C:\data`, is a filesystem path.
    ///
    /// # Errors
    ///
    /// [`CodecError::InvalidLocator`] for an empty string or a malformed URI.
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(CodecError::InvalidLocator {
                raw,
                msg: "empty locator".to_string(),
            });
        }

        if !has_uri_scheme(&raw) {
            return Ok(Self {
                scheme: FILE_SCHEME.to_string(),
                path: raw.clone(),
                raw,
            });
        }

        let url = Url::parse(&raw).map_err(|e| CodecError::InvalidLocator {
            raw: raw.clone(),
            msg: e.to_string(),
        })?;

        let path = if url.scheme() == FILE_SCHEME {
            url.to_file_path()
                .map_err(|_| CodecError::InvalidLocator {
                    raw: raw.clone(),
                    msg: "file URI does not name a local path".to_string(),
                })?
                .to_string_lossy()
                .into_owned()
        } else {
            url.path().to_string()
        };

        Ok(Self {
            scheme: url.scheme().to_string(),
            path,
            raw,
        })
    }

    /// Locator for a local filesystem path
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_string_lossy().into_owned();
        Self {
            raw: path.clone(),
            scheme: FILE_SCHEME.to_string(),
            path,
        }
    }

    /// The string the locator was created from
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// URI scheme (`"file"` for plain paths)
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Path component (the local path for file-backed locators)
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether the locator can be opened as a plain local file
    pub fn has_file_system_provider(&self) -> bool {
        self.scheme == FILE_SCHEME
    }

    /// Case-insensitive suffix test on the path component.
    ///
    /// A leading dot is added when missing, so `"bam"` and `".bam"` are
    /// equivalent; multi-part extensions like `".vcf.gz"` work as expected.
    pub fn has_extension(&self, extension: &str) -> bool {
        let extension = extension.to_ascii_lowercase();
        let wanted = if extension.starts_with('.') {
            extension
        } else {
            format!(".{}", extension)
        };
        self.path.to_ascii_lowercase().ends_with(&wanted)
    }

    /// Final path segment, if any
    pub fn base_name(&self) -> Option<&str> {
        self.path
            .rsplit(['/', '\\'])
            .next()
            .filter(|name| !name.is_empty())
    }

    /// The local path, for file-backed locators
    pub fn to_path(&self) -> Option<PathBuf> {
        self.has_file_system_provider()
            .then(|| PathBuf::from(&self.path))
    }

    /// Open the locator for reading
    ///
    /// # Errors
    ///
    /// [`CodecError::ResourceUnavailable`] for locators without local backing,
    /// or an I/O error from opening the file.
    pub fn open(&self) -> Result<Box<dyn BufRead + Send>> {
        let path = self.local_path("an input stream")?;
        open_local_file(&path)
    }

    /// Create (or truncate) the locator for writing
    pub fn create(&self) -> Result<Box<dyn Write + Send>> {
        let path = self.local_path("an output stream")?;
        let file = File::create(path)?;
        Ok(Box::new(BufWriter::new(file)))
    }

    fn local_path(&self, what: &'static str) -> Result<PathBuf> {
        self.to_path().ok_or_else(|| CodecError::ResourceUnavailable {
            resource: self.raw.clone(),
            what,
        })
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl std::str::FromStr for Locator {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        Locator::new(s)
    }
}

impl From<&Path> for Locator {
    fn from(path: &Path) -> Self {
        Locator::from_path(path)
    }
}

impl From<PathBuf> for Locator {
    fn from(path: PathBuf) -> Self {
        Locator::from_path(path)
    }
}

// RFC 3986 scheme: ALPHA *( ALPHA / DIGIT / "+" / "-" / "." ), followed by ':'.
// Single-letter schemes are treated as drive letters.
fn has_uri_scheme(raw: &str) -> bool {
    let Some((scheme, _)) = raw.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    scheme.len() >= 2
        && chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_path() {
        let locator = Locator::new("data/sample.bam").unwrap();
        assert_eq!(locator.scheme(), "file");
        assert_eq!(locator.path(), "data/sample.bam");
        assert!(locator.has_file_system_provider());
        assert_eq!(locator.base_name(), Some("sample.bam"));
        assert_eq!(locator.to_path(), Some(PathBuf::from("data/sample.bam")));
    }

    #[test]
    fn test_remote_uri() {
        let locator = Locator::new("htsget://server/reads/NA12878").unwrap();
        assert_eq!(locator.scheme(), "htsget");
        assert_eq!(locator.path(), "/reads/NA12878");
        assert!(!locator.has_file_system_provider());
        assert_eq!(locator.to_path(), None);
        assert!(matches!(
            locator.open(),
            Err(CodecError::ResourceUnavailable { .. })
        ));
    }

    #[test]
    fn test_file_uri() {
        let locator = Locator::new("file:///tmp/ref.fa").unwrap();
        assert_eq!(locator.scheme(), "file");
        assert!(locator.has_file_system_provider());
        assert!(locator.has_extension(".fa"));
        assert_eq!(locator.raw(), "file:///tmp/ref.fa");
    }

    #[test]
    fn test_drive_letter_is_path() {
        let locator = Locator::new(r"C:\data\calls.vcf").unwrap();
        assert_eq!(locator.scheme(), "file");
        assert_eq!(locator.base_name(), Some("calls.vcf"));
    }

    #[test]
    fn test_extension_matching() {
        let locator = Locator::new("Calls.VCF.GZ").unwrap();
        assert!(locator.has_extension(".vcf.gz"));
        assert!(locator.has_extension("gz"));
        assert!(!locator.has_extension(".vcf"));
        // Extension must start at a dot
        assert!(!Locator::new("notabam").unwrap().has_extension("bam"));
    }

    #[test]
    fn test_empty_is_invalid() {
        assert!(matches!(
            Locator::new("  "),
            Err(CodecError::InvalidLocator { .. })
        ));
    }

    #[test]
    fn test_open_and_create() {
        use std::io::Read;

        let dir = tempfile::tempdir().unwrap();
        let locator = Locator::from_path(dir.path().join("out.sam"));

        let mut writer = locator.create().unwrap();
        writer.write_all(b"@HD\tVN:1.6\n").unwrap();
        writer.flush().unwrap();
        drop(writer);

        let mut content = String::new();
        locator.open().unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "@HD\tVN:1.6\n");
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_extension_case_insensitive(stem in "[a-z]{1,12}", ext in "[a-z]{1,4}") {
                let locator = Locator::new(format!("{}.{}", stem, ext.to_uppercase())).unwrap();
                prop_assert!(locator.has_extension(&ext));
                let dotted = format!(".{}", ext);
                prop_assert!(locator.has_extension(&dotted));
            }
        }
    }
}
