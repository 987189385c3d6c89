//! hts-resolve: show which codec the registry picks for a file
//!
//! ```text
//! hts-resolve list
//! hts-resolve decode sample.bam
//! hts-resolve decode reads.txt --subtype SAM
//! hts-resolve encode out.vcf.gz --version 4.2
//! ```

use anyhow::{bail, Context, Result};
use biometal_codecs::bundle::PathResource;
use biometal_codecs::{
    Bundle, Category, CodecError, CodecOptions, HtsCodec, Locator, Registry, Version,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "hts-resolve")]
#[command(
    version,
    about = "Resolve genomic files to the codec that reads or writes them",
    long_about = None
)]
struct Cli {
    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// TOML options file for decoders and encoders
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List registered codecs
    List,

    /// Resolve a decoder and summarise the file
    Decode {
        /// File path or URI
        locator: String,

        /// Format name to require, e.g. BAM or VCF
        #[arg(long, value_name = "SUBTYPE")]
        subtype: Option<String>,
    },

    /// Resolve the codec that would write to a destination
    Encode {
        /// File path or URI
        locator: String,

        /// Format name to require, e.g. BAM or VCF
        #[arg(long, value_name = "SUBTYPE")]
        subtype: Option<String>,

        /// Codec version, or NEWEST
        #[arg(long, default_value = "NEWEST")]
        version: Version,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let options = match &cli.config {
        Some(path) => CodecOptions::from_path(path)
            .with_context(|| format!("Failed to load options from {}", path.display()))?,
        None => CodecOptions::default(),
    };
    let registry = Registry::with_builtin_codecs()?;

    match cli.command {
        Command::List => list(&registry),
        Command::Decode { locator, subtype } => {
            let locator = Locator::new(&locator)?;
            decode(&registry, &locator, subtype.as_deref(), &options)
        }
        Command::Encode {
            locator,
            subtype,
            version,
        } => {
            let locator = Locator::new(&locator)?;
            encode(&registry, &locator, subtype.as_deref(), version)
        }
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("biometal_codecs={level},hts_resolve={level}")))
        .context("Failed to create log filter")?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false).compact())
        .init();
    Ok(())
}

fn list(registry: &Registry) -> Result<()> {
    for codec in registry.codecs() {
        println!(
            "{:<20} {:<6} {:<8} {}",
            codec.category().to_string(),
            codec.file_format().to_string(),
            codec.version().to_string(),
            codec.display_name()
        );
    }
    Ok(())
}

fn bundle(locator: &Locator, category: Category, subtype: Option<&str>) -> Bundle {
    let mut resource = PathResource::new(locator.clone(), category.content_type());
    if let Some(subtype) = subtype {
        resource = resource.with_content_subtype(subtype);
    }
    Bundle::from_resource(resource)
}

/// Categories to try: the one owning `subtype`, or every category with a
/// resolver.
fn categories(registry: &Registry, subtype: Option<&str>) -> Result<Vec<Category>> {
    let mut supported = Category::ALL
        .into_iter()
        .filter(|c| registry.resolver(*c).is_ok());

    match subtype {
        None => Ok(supported.collect()),
        Some(subtype) => match supported.find(|c| c.format_for_subtype(subtype).is_some()) {
            Some(category) => Ok(vec![category]),
            None => bail!("No category has a format named '{}'", subtype),
        },
    }
}

/// Run `resolve` for each candidate category and keep the single success.
///
/// With one category the resolver's own error is returned unchanged.
fn resolve_across<F>(
    registry: &Registry,
    locator: &Locator,
    subtype: Option<&str>,
    mut resolve: F,
) -> Result<Arc<dyn HtsCodec>>
where
    F: FnMut(Category, &Locator) -> biometal_codecs::Result<Arc<dyn HtsCodec>>,
{
    let categories = categories(registry, subtype)?;
    if let [category] = &categories[..] {
        return Ok(resolve(*category, locator)?);
    }

    let mut found = Vec::new();
    for category in categories {
        match resolve(category, locator) {
            Ok(codec) => found.push(codec),
            Err(
                e @ (CodecError::NoSupportingCodec { .. }
                | CodecError::DirectionMismatch { .. }),
            ) => {
                debug!(%category, "{}", e)
            }
            Err(e) => return Err(e.into()),
        }
    }

    match found.len() {
        0 => bail!("No codec in any category supports {}", locator),
        1 => Ok(found.remove(0)),
        _ => bail!(
            "{} matches codecs in several categories: {}",
            locator,
            found.iter().map(|c| c.display_name()).collect::<Vec<_>>().join(", ")
        ),
    }
}

fn decode(
    registry: &Registry,
    locator: &Locator,
    subtype: Option<&str>,
    options: &CodecOptions,
) -> Result<()> {
    let codec = resolve_across(registry, locator, subtype, |category, locator| {
        registry
            .resolver(category)?
            .resolve_for_decoding(&mut bundle(locator, category, subtype))
    })?;
    println!("codec:      {}", codec.display_name());

    let mut decoder = codec.decoder(bundle(locator, codec.category(), subtype), &options.decoder)?;
    println!("references: {}", decoder.header().reference_count());

    let mut records = 0u64;
    let mut unsupported = false;
    for record in decoder.records() {
        match record {
            Ok(_) => records += 1,
            Err(CodecError::Unsupported { operation, .. }) => {
                debug!("{} not available", operation);
                unsupported = true;
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }
    if unsupported {
        println!("records:    (header only)");
    } else {
        println!("records:    {}", records);
    }
    Ok(())
}

fn encode(
    registry: &Registry,
    locator: &Locator,
    subtype: Option<&str>,
    version: Version,
) -> Result<()> {
    let codec = resolve_across(registry, locator, subtype, |category, locator| {
        registry
            .resolver(category)?
            .resolve_for_encoding(&bundle(locator, category, subtype), version)
    })?;
    println!("{}", codec.display_name());
    Ok(())
}
