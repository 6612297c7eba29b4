// SPDX-License-Identifier: GPL-3.0-only

//! Source catalog: which of the requested sources can be offered

use crate::authorization::{AuthorizationGate, AuthorizationState};
use crate::types::MediaSourceKind;
use std::collections::BTreeMap;
use tracing::debug;

/// Partition of the caller's inputs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogResolution {
    /// Capable sources that are authorized or still undetermined, in input
    /// order. Duplicates keep their positions.
    pub usable: Vec<MediaSourceKind>,
    /// Sources kept out by denial, restriction or missing capability
    pub blocked: BTreeMap<MediaSourceKind, AuthorizationState>,
}

impl CatalogResolution {
    pub fn is_empty(&self) -> bool {
        self.usable.is_empty()
    }
}

/// Computes the usable set from the gate's current classification
///
/// Undetermined sources are kept as usable-pending. They get prompted for
/// when they are picked, not when they are listed.
pub struct SourceCatalog<'a> {
    gate: &'a AuthorizationGate,
}

impl<'a> SourceCatalog<'a> {
    pub fn new(gate: &'a AuthorizationGate) -> Self {
        Self { gate }
    }

    pub fn resolve(&self, inputs: &[MediaSourceKind]) -> CatalogResolution {
        let resolution = Self::resolve_with(inputs, |kind| self.gate.current_state(kind));
        debug!(
            requested = inputs.len(),
            usable = resolution.usable.len(),
            blocked = resolution.blocked.len(),
            "Resolved source catalog"
        );
        resolution
    }

    /// Partition `inputs` using an arbitrary classifier
    pub fn resolve_with<F>(inputs: &[MediaSourceKind], classify: F) -> CatalogResolution
    where
        F: Fn(MediaSourceKind) -> AuthorizationState,
    {
        let mut resolution = CatalogResolution::default();
        for &kind in inputs {
            let state = classify(kind);
            if state.is_blocking() {
                resolution.blocked.insert(kind, state);
            } else {
                resolution.usable.push(kind);
            }
        }
        resolution
    }
}
