// SPDX-License-Identifier: Apache-2.0

//! Catalog type definitions
//!
//! This module defines the structs that map to sections in
//! `gaugecomp_catalog.toml`, plus the resolved [`Catalog`] the engine
//! queries at runtime.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{CatalogError, CatalogResult};

/// Machining axis a feature is corrected on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Axis {
    X,
    Z,
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Axis::X => write!(f, "X"),
            Axis::Z => write!(f, "Z"),
        }
    }
}

/// One measured feature: tolerance band, owning tool, correction axis.
///
/// Immutable after load. `compensation_target` distinguishes dimensions the
/// engine may correct from diagnostic-only dimensions that are judged and
/// displayed but never acted on.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeatureSpec {
    pub id: String,
    pub tool: u8,
    pub axis: Axis,
    pub target: f64,
    pub lower: f64,
    pub upper: f64,
    #[serde(default)]
    pub compensation_target: bool,
}

/// Equipment table entry: tool number -> controller address.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EquipmentEntry {
    pub tool: u8,
    pub address: u32,
}

/// Width linkage declaration: an accepted correction for `primary` derives a
/// second correction of the same signed magnitude for `linked`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LinkageSpec {
    pub primary: String,
    pub linked: String,
}

/// Diameter cross-check pair: the two features whose latest values feed the
/// rolling |upper - lower| consistency monitor.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiameterPairSpec {
    pub upper: String,
    pub lower: String,
}

/// Root catalog file structure (raw TOML shape, pre-validation).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CatalogConfig {
    #[serde(rename = "feature")]
    pub features: Vec<FeatureSpec>,
    #[serde(rename = "equipment")]
    pub equipment: Vec<EquipmentEntry>,
    pub linkage: Option<LinkageSpec>,
    pub diameter_pair: Option<DiameterPairSpec>,
}

/// Resolved, validated catalog.
///
/// Built from [`CatalogConfig`] by [`Catalog::from_config`], which runs the
/// full validation pass first. Lookup by unknown feature id returns
/// [`CatalogError::UnknownFeature`] rather than a default.
#[derive(Debug, Clone)]
pub struct Catalog {
    features: HashMap<String, FeatureSpec>,
    equipment: HashMap<u8, u32>,
    linkage: Option<LinkageSpec>,
    diameter_pair: Option<DiameterPairSpec>,
}

impl Catalog {
    /// Validate a raw config and build the resolved catalog.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::ValidationError`] listing every problem found
    /// (duplicate ids, inverted bands, unresolvable tools, dangling linkage
    /// or diameter-pair references).
    pub fn from_config(config: CatalogConfig) -> CatalogResult<Self> {
        crate::validation::validate_catalog(&config)?;

        let features = config
            .features
            .into_iter()
            .map(|spec| (spec.id.clone(), spec))
            .collect();
        let equipment = config
            .equipment
            .into_iter()
            .map(|entry| (entry.tool, entry.address))
            .collect();

        Ok(Self {
            features,
            equipment,
            linkage: config.linkage,
            diameter_pair: config.diameter_pair,
        })
    }

    /// Look up a feature spec by id.
    pub fn spec(&self, feature_id: &str) -> CatalogResult<&FeatureSpec> {
        self.features
            .get(feature_id)
            .ok_or_else(|| CatalogError::UnknownFeature(feature_id.to_string()))
    }

    /// Resolve a tool number to its controller address.
    pub fn resolve_tool(&self, tool: u8) -> CatalogResult<u32> {
        self.equipment
            .get(&tool)
            .copied()
            .ok_or(CatalogError::UnresolvedTool(tool))
    }

    /// All feature ids, sorted for deterministic iteration.
    pub fn feature_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.features.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn linkage(&self) -> Option<&LinkageSpec> {
        self.linkage.as_ref()
    }

    pub fn diameter_pair(&self) -> Option<&DiameterPairSpec> {
        self.diameter_pair.as_ref()
    }

    /// Equipment table view (tool -> address).
    pub fn equipment_table(&self) -> &HashMap<u8, u32> {
        &self.equipment
    }
}
