// SPDX-License-Identifier: Apache-2.0

//! Catalog validation
//!
//! Every problem is collected before reporting so a bad catalog file is
//! fixed in one pass, not one restart per mistake.

use crate::{CatalogConfig, CatalogError, CatalogResult};
use std::collections::{HashMap, HashSet};

/// Validate the raw catalog config.
///
/// Checks:
/// - at least one feature is declared
/// - feature ids are unique
/// - tolerance bands are well-formed (lower <= upper) and the target sits
///   inside the band
/// - every compensation-target tool has an equipment address
/// - equipment table has no duplicate tools
/// - linkage and diameter-pair references resolve to declared features, and
///   the linked width feature is itself a compensation target (a derived
///   correction must be writable)
///
/// # Errors
///
/// Returns [`CatalogError::ValidationError`] listing every problem found.
pub fn validate_catalog(config: &CatalogConfig) -> CatalogResult<()> {
    let mut errors: Vec<String> = Vec::new();

    if config.features.is_empty() {
        errors.push("no features declared".to_string());
    }

    let mut seen_ids = HashSet::new();
    for spec in &config.features {
        if !seen_ids.insert(spec.id.as_str()) {
            errors.push(format!("duplicate feature id '{}'", spec.id));
        }
        if spec.lower > spec.upper {
            errors.push(format!(
                "feature '{}': inverted band [{}, {}]",
                spec.id, spec.lower, spec.upper
            ));
        }
        if spec.target < spec.lower || spec.target > spec.upper {
            errors.push(format!(
                "feature '{}': target {} outside band [{}, {}]",
                spec.id, spec.target, spec.lower, spec.upper
            ));
        }
    }

    let mut equipment: HashMap<u8, u32> = HashMap::new();
    for entry in &config.equipment {
        if equipment.insert(entry.tool, entry.address).is_some() {
            errors.push(format!("duplicate equipment entry for tool {}", entry.tool));
        }
    }

    for spec in &config.features {
        if spec.compensation_target && !equipment.contains_key(&spec.tool) {
            errors.push(format!(
                "feature '{}': compensation target but tool {} has no equipment address",
                spec.id, spec.tool
            ));
        }
    }

    let feature_exists = |id: &str| config.features.iter().any(|s| s.id == id);

    if let Some(linkage) = &config.linkage {
        if !feature_exists(&linkage.primary) {
            errors.push(format!("linkage primary '{}' is not a declared feature", linkage.primary));
        }
        if !feature_exists(&linkage.linked) {
            errors.push(format!("linkage target '{}' is not a declared feature", linkage.linked));
        } else if let Some(spec) = config.features.iter().find(|s| s.id == linkage.linked) {
            if !spec.compensation_target {
                errors.push(format!(
                    "linkage target '{}' must be a compensation target",
                    linkage.linked
                ));
            }
        }
    }

    if let Some(pair) = &config.diameter_pair {
        for id in [&pair.upper, &pair.lower] {
            if !feature_exists(id) {
                errors.push(format!("diameter pair feature '{}' is not declared", id));
            }
        }
    }

    if !errors.is_empty() {
        let message = errors
            .iter()
            .map(|e| format!("  - {}", e))
            .collect::<Vec<_>>()
            .join("\n");
        return Err(CatalogError::ValidationError(message));
    }

    Ok(())
}
