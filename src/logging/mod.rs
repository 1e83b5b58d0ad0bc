//! Structured logging.

mod format;

pub use format::{AlertLine, StructuredLogger};
