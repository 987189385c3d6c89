//! I/O support shared by resources and codecs
//!
//! Local file access (memory-mapped above [`compression::MMAP_THRESHOLD`]),
//! gzip/BGZF detection and inflation, and parallel BGZF output.

pub mod compression;
