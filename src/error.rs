//! Error types for biometal-codecs

use crate::format::Category;
use thiserror::Error;

/// Result type alias for codec registration, resolution, and codec I/O
pub type Result<T> = std::result::Result<T, CodecError>;

/// Error types that can occur while registering, resolving, or running codecs
///
/// Every resolution failure is terminal for the call that produced it; nothing
/// is retried internally.
#[derive(Debug, Error)]
pub enum CodecError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The bundle's primary content type is not the one this resolver handles
    #[error(
        "The primary content type ({primary}) for the bundle does not match the requested content type ({required})"
    )]
    PrimaryContentTypeMismatch {
        /// Primary content type declared by the bundle
        primary: String,
        /// Content type required by the resolver
        required: String,
    },

    /// The bundle has no resource for the requested content type
    #[error("No resource with content type {content_type} is present in the bundle")]
    MissingResource {
        /// Requested content type
        content_type: String,
    },

    /// The resource cannot be used in the requested direction
    #[error("The {content_type} resource ({resource}) cannot be used as an {direction} resource")]
    DirectionMismatch {
        /// Content type of the resource
        content_type: String,
        /// Resource display name
        resource: String,
        /// Required direction ("input" or "output")
        direction: &'static str,
    },

    /// The resource declares a content subtype with no matching format
    #[error(
        "The content subtype ({subtype}) of resource ({resource}) does not correspond to any known subtype for content type ({content_type})"
    )]
    UnknownSubtype {
        /// Declared content subtype
        subtype: String,
        /// Resource display name
        resource: String,
        /// Content type of the resource
        content_type: String,
    },

    /// The resource kind cannot be handled by this resolution path
    #[error("Unsupported resource kind for {resource}: {msg}")]
    UnsupportedResourceKind {
        /// Resource display name
        resource: String,
        /// What is not supported
        msg: String,
    },

    /// A probe larger than the established prefix was requested
    #[error(
        "A signature probing size of {requested} was requested, but a probe size of {established} has already been established for this resource"
    )]
    ProbeSizeViolation {
        /// Requested prefix size
        requested: usize,
        /// Previously established prefix size
        established: usize,
    },

    /// A probe of size zero was requested
    #[error("Signature probing size must be > 0 (resource {resource})")]
    InvalidProbeSize {
        /// Resource display name
        resource: String,
    },

    /// Reading the signature prefix failed
    #[error("Error during signature probing of {resource} with prefix size {size}: {source}")]
    ProbeIo {
        /// Resource display name
        resource: String,
        /// Requested prefix size
        size: usize,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// No registered codec accepts the resource
    #[error("No registered codec accepts the provided resource {context}")]
    NoSupportingCodec {
        /// Format/resource context
        context: String,
    },

    /// More than one registered codec accepts the resource
    #[error(
        "Multiple codecs accept the provided resource ({context}): {}. This indicates an internal error in one or more of the codecs",
        .codecs.join(", ")
    )]
    AmbiguousCodecMatch {
        /// Format/resource context
        context: String,
        /// Display names of every matching codec
        codecs: Vec<String>,
    },

    /// A codec was offered to a resolver for a different category
    #[error("Codec {codec} has category {actual}, but this resolver handles {expected}")]
    CategoryMismatch {
        /// Codec display name
        codec: String,
        /// Category the resolver handles
        expected: Category,
        /// Category declared by the codec
        actual: Category,
    },

    /// No resolver exists for the category
    #[error("{0} codec category not yet implemented")]
    UnsupportedCategory(Category),

    /// A codec declared the NEWEST request sentinel as its own version
    #[error("Codec {codec} declares the NEWEST sentinel as its version")]
    InvalidCodecVersion {
        /// Codec display name
        codec: String,
    },

    /// Locator string could not be parsed
    #[error("Invalid locator '{raw}': {msg}")]
    InvalidLocator {
        /// Raw locator string
        raw: String,
        /// Parse failure
        msg: String,
    },

    /// The underlying stream or path is not available from the resource
    #[error("Resource {resource} cannot supply {what}")]
    ResourceUnavailable {
        /// Resource display name
        resource: String,
        /// What was requested
        what: &'static str,
    },

    /// Content did not match the selected format
    #[error("Invalid {format} content in {source_name}: {msg}")]
    InvalidFormat {
        /// Format name
        format: String,
        /// Resource display name
        source_name: String,
        /// What was wrong
        msg: String,
    },

    /// Encoder or decoder misuse
    #[error("Invalid input: {msg}")]
    InvalidInput {
        /// Error message
        msg: String,
    },

    /// The operation is not provided by this codec
    #[error("{operation} is not supported by {codec}")]
    Unsupported {
        /// Codec display name
        codec: String,
        /// Requested operation
        operation: &'static str,
    },

    /// Option file could not be parsed
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<toml::de::Error> for CodecError {
    fn from(e: toml::de::Error) -> Self {
        CodecError::Config(e.to_string())
    }
}
