//! Conversion engine from opam package directories to esy manifests.
//!
//! This crate ties the pure transforms of `opam2esy-schema` to the inputs of
//! one opam package (`opam` file, `url` file, `files/` directory) and to the
//! conversion configuration. [`Converter`] is the entry point.

pub mod config;
pub mod convert;
pub mod files;
pub mod manifest;
pub mod origin;

pub use config::{caml_ld_library_path, ConfigError, ConversionConfig, Override, INSTALLER_COMMAND};
pub use convert::{Converter, PackageSource};
pub use files::collect_aux_files;
pub use manifest::{AuxFile, EsySection, ExportedEnvVar, Manifest, OpamOrigin};
pub use origin::{parse_origin, read_origin, OriginMetadata};

use opam2esy_schema::SchemaError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("field '{field}': {source}")]
    Field {
        field: String,
        #[source]
        source: SchemaError,
    },
    #[error("opam file not found: {}", .0.display())]
    MissingOpamFile(PathBuf),
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("refusing to embed binary file: {}", .0.display())]
    BinaryAuxiliaryFile(PathBuf),
    #[error("auxiliary file is not valid UTF-8: {}", .0.display())]
    InvalidAuxiliaryFile(PathBuf),
}

impl ConvertError {
    pub(crate) fn field(field: &str) -> impl FnOnce(SchemaError) -> Self + '_ {
        move |source| Self::Field {
            field: field.to_owned(),
            source,
        }
    }

    /// Short, stable name of the failure, for per-package reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Field { source, .. } => match source {
                SchemaError::MalformedField(_) => "malformed-field",
                SchemaError::DuplicateField(_) => "duplicate-field",
                SchemaError::UnsupportedConstraint(_) => "unsupported-constraint",
                SchemaError::UnknownVariable(_) => "unknown-variable",
            },
            Self::MissingOpamFile(_) => "missing-opam-file",
            Self::Io { .. } => "io",
            Self::BinaryAuxiliaryFile(_) => "binary-auxiliary-file",
            Self::InvalidAuxiliaryFile(_) => "invalid-auxiliary-file",
        }
    }
}
