// SPDX-License-Identifier: Apache-2.0

//! # Gaugecomp Feature Catalog
//!
//! Type-safe loader for the static gauging catalog:
//! - measured features (target value, tolerance band, tool, axis)
//! - equipment table (tool number -> controller address)
//! - linked-feature declarations (width linkage, diameter cross-check pair)
//!
//! The catalog is immutable once loaded. All lookups the decision engine
//! performs at runtime resolve against this table; an unknown feature id is
//! a configuration error and aborts initialization rather than defaulting.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use gaugecomp_catalog::load_catalog;
//!
//! let catalog = load_catalog(None).expect("catalog must load");
//! let spec = catalog.spec("bottom-height").expect("known feature");
//! println!("target {} band [{}, {}]", spec.target, spec.lower, spec.upper);
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod loader;
pub mod types;
pub mod validation;

pub use loader::{find_catalog_file, load_catalog, load_catalog_str};
pub use types::*;
pub use validation::validate_catalog;

/// Catalog error types
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Catalog file not found. Searched: {0}")]
    FileNotFound(String),

    #[error("Failed to read catalog file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax: {0}")]
    ParseError(String),

    #[error("Validation failed:\n{0}")]
    ValidationError(String),

    #[error("Unknown feature: '{0}'")]
    UnknownFeature(String),

    #[error("No equipment address for tool {0}")]
    UnresolvedTool(u8),
}

/// Result type for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;
