// SPDX-License-Identifier: Apache-2.0

//! Width linkage.
//!
//! The bottom-height and width dimensions are mechanically coupled on the
//! fixture: correcting one without the other reintroduces the error. When a
//! correction is accepted for the linked primary feature, a second request is
//! derived for the width feature carrying the *same signed magnitude* (not
//! recomputed from the width's own measurement) and appended to the same
//! pending batch.

use crate::types::{CompensationRequest, RequestKind};
use gaugecomp_catalog::FeatureSpec;

/// Derive the linked width request from an accepted primary correction.
pub fn derive_linked_request(
    primary: &CompensationRequest,
    width_spec: &FeatureSpec,
    width_address: u32,
) -> CompensationRequest {
    CompensationRequest {
        kind: RequestKind::Correction,
        tool: width_spec.tool,
        feature_id: width_spec.id.clone(),
        axis: width_spec.axis,
        value: primary.value,
        equipment_address: width_address,
        width_linked: true,
    }
}
