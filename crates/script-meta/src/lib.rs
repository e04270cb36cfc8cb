//! Tool-source descriptors: the version pragma, the embedded metadata
//! literal, export checks and URL match patterns.
//!
//! A tool source is a small script honouring a bit-exact contract: a
//! directive string pragma as its first statement, an exported `metadata`
//! literal, an exported `execute` function (may be async) and an optional
//! synchronous `should_register` gate. The metadata literal is read with a
//! restricted-grammar parser; the source is never executed.

pub mod literal;
pub mod matcher;
pub mod model;
pub mod parse;

pub use matcher::{url_admitted, MatchPattern};
pub use model::{ScriptMetadata, SourceKind};
pub use parse::parse_source;
