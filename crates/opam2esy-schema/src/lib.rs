//! opam document parsing and the text-level transforms used to build esy manifests.
//!
//! This crate is the pure layer of opam2esy: it never touches the filesystem.
//! It splits an opam file into fields (`OpamDocument`), parses the bracketed
//! list mini-language (`parse_flat_list`, `parse_command_list`), normalizes
//! version strings, translates opam version constraints into esy ranges and
//! expands `%{var}%` placeholders inside build commands.

pub mod constraint;
pub mod document;
pub mod lexer;
pub mod list;
pub mod types;
pub mod vars;
pub mod version;

pub use constraint::{translate_available, translate_constraint, ANY_VERSION};
pub use document::{parse_document, OpamDocument};
pub use list::{
    command_words, parse_command_list, parse_flat_list, CommandWord, ListEntry, StructuredList,
};
pub use types::{PackageName, ScopedName};
pub use vars::{expand_variables, BuiltinVars};
pub use version::{normalize_version, prerelease_tag};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("malformed field: {0}")]
    MalformedField(String),
    #[error("duplicate field '{0}'")]
    DuplicateField(String),
    #[error("unsupported constraint (disjunction): '{0}'")]
    UnsupportedConstraint(String),
    #[error("cannot expand variable '{0}'")]
    UnknownVariable(String),
}
