#[macro_use]
mod macros;

/// AST produced by parsing a pipeline definition file.
pub mod ast;

/// Parsers for the `.def` definition format.
mod parse;
pub use parse::{parse, Error};
