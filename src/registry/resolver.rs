//! Per-category codec table and resolution
//!
//! # Decoding
//!
//! 1. The bundle's primary content type must be this resolver's, and the
//!    primary resource must be input capable.
//! 2. A declared content subtype narrows candidates to one format; an
//!    unrecognised subtype fails immediately.
//! 3. Locator-backed resources: codecs that claim the locator win outright
//!    and are not probed. Otherwise each candidate must accept the locator,
//!    and, when the locator is a local file, also its signature.
//! 4. Stream-backed resources: each candidate is tested against one shared
//!    signature prefix.
//! 5. Exactly one survivor is the answer; zero or several is an error.
//!
//! # Encoding
//!
//! The same primary-resource and subtype checks (output capable instead of
//! input), the claim and locator tests without any probing, then a version
//! filter: [`Version::NEWEST`] keeps every candidate at the highest version,
//! an explicit version keeps exact matches only.

use crate::bundle::{Bundle, BundleResource, Locator, SignatureProbingStream};
use crate::codec::{HtsCodec, HtsDecoder, HtsEncoder};
use crate::error::{CodecError, Result};
use crate::format::{Category, FileFormat};
use crate::options::{DecoderOptions, EncoderOptions};
use crate::version::Version;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Input,
    Output,
}

impl Direction {
    fn as_str(&self) -> &'static str {
        match self {
            Direction::Input => "input",
            Direction::Output => "output",
        }
    }
}

/// Codec table and resolution algorithms for one [`Category`].
pub struct CategoryResolver {
    category: Category,
    codecs: BTreeMap<(FileFormat, Version), Arc<dyn HtsCodec>>,
}

impl CategoryResolver {
    /// Create an empty resolver for `category`
    pub fn new(category: Category) -> Self {
        Self {
            category,
            codecs: BTreeMap::new(),
        }
    }

    /// Category handled by this resolver
    pub fn category(&self) -> Category {
        self.category
    }

    /// Content type the primary resource must carry
    pub fn required_content_type(&self) -> &'static str {
        self.category.content_type()
    }

    /// Number of registered codecs
    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    /// Whether no codec is registered
    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }

    /// Register `codec` under its (format, version).
    ///
    /// Returns the codec previously bound to the same key, which is no
    /// longer reachable through this resolver.
    ///
    /// # Errors
    ///
    /// - [`CodecError::CategoryMismatch`] if the codec belongs to another category
    /// - [`CodecError::InvalidCodecVersion`] if the codec declares [`Version::NEWEST`]
    pub fn register_codec(
        &mut self,
        codec: Arc<dyn HtsCodec>,
    ) -> Result<Option<Arc<dyn HtsCodec>>> {
        let format = codec.file_format();
        let actual = codec.category();
        if actual != self.category || format.category() != self.category {
            return Err(CodecError::CategoryMismatch {
                codec: codec.display_name().to_string(),
                expected: self.category,
                actual,
            });
        }

        let version = codec.version();
        if version.is_newest() {
            return Err(CodecError::InvalidCodecVersion {
                codec: codec.display_name().to_string(),
            });
        }

        let previous = self.codecs.insert((format, version), Arc::clone(&codec));
        if let Some(previous) = &previous {
            warn!(
                previous = previous.display_name(),
                replacement = codec.display_name(),
                "A previously registered codec was replaced"
            );
        }
        Ok(previous)
    }

    /// Every registered codec, ordered by format then version
    pub fn codecs(&self) -> Vec<Arc<dyn HtsCodec>> {
        self.codecs.values().cloned().collect()
    }

    /// Every registered version of `format`, oldest first
    pub fn codecs_for_format(&self, format: FileFormat) -> Vec<Arc<dyn HtsCodec>> {
        self.codecs
            .iter()
            .filter(|((f, _), _)| *f == format)
            .map(|(_, codec)| Arc::clone(codec))
            .collect()
    }

    /// The codec registered for exactly `format` and `version`
    pub fn codec_for_format_and_version(
        &self,
        format: FileFormat,
        version: Version,
    ) -> Result<Arc<dyn HtsCodec>> {
        let matching: Vec<_> = self.codecs.get(&(format, version)).cloned().into_iter().collect();
        one_or_error(matching, || format!("{}/{}", format, version))
    }

    /// Select the single codec able to decode the bundle's primary resource.
    ///
    /// Probing may consume from a stream-backed resource; the consumed bytes
    /// are replayed by the resource's input stream.
    pub fn resolve_for_decoding(&self, bundle: &mut Bundle) -> Result<Arc<dyn HtsCodec>> {
        let format = self.primary_format(bundle, Direction::Input)?;
        let candidates = self.candidates(format);
        let resource = bundle.resource_for_content_type_mut(self.required_content_type())?;
        debug!(
            resource = resource.display_name(),
            candidates = candidates.len(),
            "Resolving codec for decoding"
        );

        let resolved = match resource.locator().cloned() {
            Some(locator) => resolve_locator_for_decoding(resource, &locator, candidates)?,
            None => resolve_stream_for_decoding(resource, candidates)?,
        };

        let description = context(format, resource);
        one_or_error(resolved, || description)
    }

    /// Select the single codec to encode the bundle's primary resource.
    ///
    /// `version` is either a concrete version or [`Version::NEWEST`]. A bare
    /// output stream with no content subtype only resolves when a single
    /// codec of the requested version is registered.
    pub fn resolve_for_encoding(
        &self,
        bundle: &Bundle,
        version: Version,
    ) -> Result<Arc<dyn HtsCodec>> {
        let format = self.primary_format(bundle, Direction::Output)?;
        let candidates = self.candidates(format);
        let resource = bundle.resource_for_content_type(self.required_content_type())?;
        debug!(
            resource = resource.display_name(),
            candidates = candidates.len(),
            %version,
            "Resolving codec for encoding"
        );

        let filtered = match resource.locator() {
            Some(locator) => {
                let claimed = claimers(&candidates, locator);
                let pool = if claimed.is_empty() { candidates } else { claimed };
                pool.into_iter().filter(|c| c.can_decode_uri(locator)).collect()
            }
            None => candidates,
        };

        let resolved = filter_by_version(filtered, version);
        one_or_error(resolved, || context(format, resource))
    }

    /// Resolve and build a decoder in one step
    pub fn decoder_for(
        &self,
        mut bundle: Bundle,
        options: &DecoderOptions,
    ) -> Result<Box<dyn HtsDecoder>> {
        let codec = self.resolve_for_decoding(&mut bundle)?;
        codec.decoder(bundle, options)
    }

    /// Resolve and build an encoder in one step
    pub fn encoder_for(
        &self,
        bundle: Bundle,
        version: Version,
        options: &EncoderOptions,
    ) -> Result<Box<dyn HtsEncoder>> {
        let codec = self.resolve_for_encoding(&bundle, version)?;
        codec.encoder(bundle, options)
    }

    // Validates the primary resource and maps its declared subtype, if any.
    fn primary_format(&self, bundle: &Bundle, direction: Direction) -> Result<Option<FileFormat>> {
        let required = self.required_content_type();
        if bundle.primary_content_type() != required {
            return Err(CodecError::PrimaryContentTypeMismatch {
                primary: bundle.primary_content_type().to_string(),
                required: required.to_string(),
            });
        }

        let resource = bundle.resource_for_content_type(required)?;
        let capable = match direction {
            Direction::Input => resource.is_input(),
            Direction::Output => resource.is_output(),
        };
        if !capable {
            return Err(CodecError::DirectionMismatch {
                content_type: required.to_string(),
                resource: resource.display_name().to_string(),
                direction: direction.as_str(),
            });
        }

        match resource.content_subtype() {
            None => Ok(None),
            Some(subtype) => match self.category.format_for_subtype(subtype) {
                Some(format) => Ok(Some(format)),
                None => Err(CodecError::UnknownSubtype {
                    subtype: subtype.to_string(),
                    resource: resource.display_name().to_string(),
                    content_type: required.to_string(),
                }),
            },
        }
    }

    fn candidates(&self, format: Option<FileFormat>) -> Vec<Arc<dyn HtsCodec>> {
        match format {
            Some(format) => self.codecs_for_format(format),
            None => self.codecs(),
        }
    }
}

fn resolve_locator_for_decoding(
    resource: &mut dyn BundleResource,
    locator: &Locator,
    candidates: Vec<Arc<dyn HtsCodec>>,
) -> Result<Vec<Arc<dyn HtsCodec>>> {
    let claimed = claimers(&candidates, locator);
    if !claimed.is_empty() {
        debug!(
            locator = locator.raw(),
            claimers = claimed.len(),
            "Locator claimed; skipping signature probing"
        );
        return Ok(claimed
            .into_iter()
            .filter(|c| c.can_decode_uri(locator))
            .collect());
    }

    let probe_size = max_probe_size(&candidates);
    let uri_matches: Vec<_> = candidates
        .into_iter()
        .filter(|c| c.can_decode_uri(locator))
        .collect();

    // Remote resources can't be opened safely here; the selected codec
    // verifies the content itself.
    if !locator.has_file_system_provider() || uri_matches.is_empty() {
        return Ok(uri_matches);
    }

    debug!(locator = locator.raw(), probe_size, "Probing signature");
    let mut probe = resource.signature_probing_stream(probe_size)?;
    Ok(uri_matches
        .into_iter()
        .filter(|c| signature_matches(c.as_ref(), &mut probe, locator.raw()))
        .collect())
}

fn resolve_stream_for_decoding(
    resource: &mut dyn BundleResource,
    candidates: Vec<Arc<dyn HtsCodec>>,
) -> Result<Vec<Arc<dyn HtsCodec>>> {
    if resource.has_seekable_stream() {
        return Err(CodecError::UnsupportedResourceKind {
            resource: resource.display_name().to_string(),
            msg: "decoder resolution for seekable stream resources is not yet implemented"
                .to_string(),
        });
    }
    if candidates.is_empty() {
        return Ok(candidates);
    }

    let probe_size = max_probe_size(&candidates);
    debug!(resource = resource.display_name(), probe_size, "Probing signature");
    let mut probe = resource.signature_probing_stream(probe_size)?;
    let name = resource.display_name();
    Ok(candidates
        .into_iter()
        .filter(|c| signature_matches(c.as_ref(), &mut probe, name))
        .collect())
}

fn claimers(candidates: &[Arc<dyn HtsCodec>], locator: &Locator) -> Vec<Arc<dyn HtsCodec>> {
    candidates
        .iter()
        .filter(|c| c.claim_uri(locator))
        .cloned()
        .collect()
}

fn max_probe_size(candidates: &[Arc<dyn HtsCodec>]) -> usize {
    candidates
        .iter()
        .map(|c| c.signature_probe_size())
        .max()
        .unwrap_or(0)
}

// Every candidate sees the prefix from its first byte.
fn signature_matches(
    codec: &dyn HtsCodec,
    probe: &mut SignatureProbingStream,
    source_name: &str,
) -> bool {
    probe.mark();
    let matched = codec.can_decode_signature(probe, source_name);
    probe.reset();
    trace!(codec = codec.display_name(), matched, "Signature test");
    matched
}

fn filter_by_version(
    candidates: Vec<Arc<dyn HtsCodec>>,
    version: Version,
) -> Vec<Arc<dyn HtsCodec>> {
    let wanted = if version.is_newest() {
        match candidates.iter().map(|c| c.version()).max() {
            Some(newest) => newest,
            None => return candidates,
        }
    } else {
        version
    };
    candidates
        .into_iter()
        .filter(|c| c.version() == wanted)
        .collect()
}

fn context(format: Option<FileFormat>, resource: &dyn BundleResource) -> String {
    match format {
        Some(format) => format!("{}/{}", format, resource.display_name()),
        None => format!("NONE/{}", resource.display_name()),
    }
}

fn one_or_error<F>(mut resolved: Vec<Arc<dyn HtsCodec>>, context: F) -> Result<Arc<dyn HtsCodec>>
where
    F: FnOnce() -> String,
{
    match resolved.len() {
        0 => Err(CodecError::NoSupportingCodec { context: context() }),
        1 => {
            let codec = resolved.remove(0);
            debug!(codec = codec.display_name(), "Resolved codec");
            Ok(codec)
        }
        _ => Err(CodecError::AmbiguousCodecMatch {
            context: context(),
            codecs: resolved
                .iter()
                .map(|c| c.display_name().to_string())
                .collect(),
        }),
    }
}
