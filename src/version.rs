//! Format versions and the NEWEST request sentinel
//!
//! A [`Version`] is a `(major, minor, patch)` triple. Codecs declare concrete
//! versions; callers may additionally request [`Version::NEWEST`], which means
//! "the maximal version among whatever codecs still match".
//!
//! # Example
//!
//! ```
//! use biometal_codecs::Version;
//!
//! let v42: Version = "4.2.0".parse()?;
//! assert!(v42 > Version::new(4, 1, 0));
//! assert!(Version::NEWEST > v42);
//! assert_ne!(Version::NEWEST, Version::new(u32::MAX, u32::MAX, u32::MAX));
//! # Ok::<(), biometal_codecs::CodecError>(())
//! ```

use crate::error::{CodecError, Result};
use std::fmt;
use std::str::FromStr;

/// An ordered format revision.
///
/// Ordering is lexicographic over `(major, minor, patch)`, with
/// [`Version::NEWEST`] greater than every concrete version. `NEWEST` is never
/// equal to a concrete triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Version {
    // Must stay the first field: derived ordering puts NEWEST above everything.
    newest: bool,
    major: u32,
    minor: u32,
    patch: u32,
}

impl Version {
    /// Request sentinel: the newest version among matching codecs
    pub const NEWEST: Version = Version {
        newest: true,
        major: 0,
        minor: 0,
        patch: 0,
    };

    /// Create a concrete version
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            newest: false,
            major,
            minor,
            patch,
        }
    }

    /// Major component (0 for `NEWEST`)
    pub fn major(&self) -> u32 {
        self.major
    }

    /// Minor component (0 for `NEWEST`)
    pub fn minor(&self) -> u32 {
        self.minor
    }

    /// Patch component (0 for `NEWEST`)
    pub fn patch(&self) -> u32 {
        self.patch
    }

    /// Whether this is the `NEWEST` sentinel
    pub fn is_newest(&self) -> bool {
        self.newest
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.newest {
            write!(f, "NEWEST")
        } else {
            write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
        }
    }
}

/// Parses `"NEWEST"` or a dotted triple. Missing minor/patch components
/// default to zero (`"4.2"` is `4.2.0`).
impl FromStr for Version {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("newest") {
            return Ok(Version::NEWEST);
        }

        let invalid = || CodecError::InvalidInput {
            msg: format!("Invalid version '{}': expected MAJOR[.MINOR[.PATCH]]", s),
        };

        let mut parts = [0u32; 3];
        let mut count = 0;
        for field in s.split('.') {
            if count == 3 {
                return Err(invalid());
            }
            parts[count] = field.parse().map_err(|_| invalid())?;
            count += 1;
        }

        Ok(Version::new(parts[0], parts[1], parts[2]))
    }
}
