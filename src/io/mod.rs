//! Byte-stream collaborators for the repair passes.
//!
//! Line-oriented input with uniform terminator handling and transparent
//! gzip decompression, plus atomic line-oriented output that never leaves
//! partial files behind.

mod sink;
mod source;

pub use sink::AtomicLineWriter;
pub use source::{open_input, LineEndings, LineReader};

pub(crate) use source::has_gzip_extension;
