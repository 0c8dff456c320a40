// SPDX-License-Identifier: Apache-2.0

//! Catalog file loading
//!
//! Search order mirrors the deployment layout: an explicit path wins, then
//! the `GAUGECOMP_CATALOG_PATH` environment variable, then an upward search
//! from the working directory for `gaugecomp_catalog.toml`.

use crate::{Catalog, CatalogConfig, CatalogError, CatalogResult};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Default catalog file name searched for when no path is given.
pub const CATALOG_FILE_NAME: &str = "gaugecomp_catalog.toml";

/// Environment variable overriding the catalog file location.
pub const CATALOG_PATH_ENV: &str = "GAUGECOMP_CATALOG_PATH";

/// Find the catalog file.
///
/// Search order:
/// 1. `GAUGECOMP_CATALOG_PATH` environment variable
/// 2. Current working directory: `./gaugecomp_catalog.toml`
/// 3. Ancestor directories (up to 5 levels)
///
/// # Errors
///
/// Returns [`CatalogError::FileNotFound`] if no catalog is found.
pub fn find_catalog_file() -> CatalogResult<PathBuf> {
    if let Ok(env_path) = env::var(CATALOG_PATH_ENV) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(CatalogError::FileNotFound(format!(
            "Catalog specified by {} not found: {}",
            CATALOG_PATH_ENV,
            path.display()
        )));
    }

    let mut search_paths = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CATALOG_FILE_NAME));
        let mut current = cwd;
        for _ in 0..5 {
            match current.parent() {
                Some(parent) => {
                    search_paths.push(parent.join(CATALOG_FILE_NAME));
                    current = parent.to_path_buf();
                }
                None => break,
            }
        }
    }

    for path in &search_paths {
        if path.exists() {
            return Ok(path.clone());
        }
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(CatalogError::FileNotFound(format!(
        "'{}' not found in any of these locations:\n{}\n\nSet {} to specify a custom location.",
        CATALOG_FILE_NAME, search_list, CATALOG_PATH_ENV
    )))
}

/// Load and validate the catalog from a TOML file.
///
/// # Arguments
///
/// * `catalog_path` - Optional explicit path. If `None`, the file is searched
///   for via [`find_catalog_file`].
///
/// # Errors
///
/// Returns an error if the file is missing, is not valid TOML, or fails the
/// validation pass. Validation failures abort initialization by design: the
/// engine must never run against a partially-resolved catalog.
pub fn load_catalog(catalog_path: Option<&Path>) -> CatalogResult<Catalog> {
    let path = match catalog_path {
        Some(p) => p.to_path_buf(),
        None => find_catalog_file()?,
    };

    let raw = fs::read_to_string(&path)?;
    load_catalog_str(&raw)
}

/// Load and validate the catalog from an in-memory TOML string.
pub fn load_catalog_str(raw: &str) -> CatalogResult<Catalog> {
    let config: CatalogConfig =
        toml::from_str(raw).map_err(|e| CatalogError::ParseError(e.to_string()))?;
    Catalog::from_config(config)
}
