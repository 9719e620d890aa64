// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The per-kind behavior the reconciler is generic over.

use crate::equivalence::FieldMismatch;
use crate::planner::PlanError;
use crate::provider::ProviderError;
use serde::Serialize;
use std::fmt::Debug;
use std::fmt::Display;
use vsphere_reconciler_types::ChangeRequest;
use vsphere_reconciler_types::Ensure;
use vsphere_reconciler_types::EntityId;

/// The change request type of resource kind `R`.
pub type ResourceChange<R> =
    ChangeRequest<<R as Resource>::Create, <R as Resource>::Update>;

/// Kinds of managed entities.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResourceKind {
    Cluster,
    Ntp,
    Dns,
    HostServices,
    AdvancedSettings,
    Vss,
    VssBridge,
    VssPolicy,
    Syslog,
    PerfInterval,
    SatpClaimRule,
}

/// A kind of entity that can be reconciled.
///
/// Implementations are stateless: every method is a pure function of its
/// arguments, so the same desired/observed pair always produces the same
/// comparison and the same plan.
pub trait Resource: Debug + Send + Sync + 'static {
    const KIND: ResourceKind;

    type Id: Clone + Debug + Display + Into<EntityId> + Send + Sync + 'static;
    type Desired: Clone + Debug + Send + Sync + 'static;
    type Observed: Clone + Debug + PartialEq + Send + Sync + 'static;
    type Create: Clone + Debug + PartialEq + Serialize + Send + Sync + 'static;
    type Update: Clone + Debug + PartialEq + Serialize + Send + Sync + 'static;

    /// Whether the entity should exist.
    fn ensure(_desired: &Self::Desired) -> Ensure {
        Ensure::Present
    }

    /// Whether reconciliation may create or delete the entity, rather than
    /// only reconfigure it.
    fn manages_lifecycle(_desired: &Self::Desired) -> bool {
        false
    }

    /// Compare an existing entity against the desired spec.
    ///
    /// Returns one entry per managed field that differs; the entity is in sync
    /// iff the result is empty.
    fn mismatches(
        desired: &Self::Desired,
        observed: &Self::Observed,
    ) -> Vec<FieldMismatch>;

    /// Build the request that creates the entity from scratch.
    fn plan_create(
        id: &Self::Id,
        desired: &Self::Desired,
    ) -> Result<Self::Create, PlanError>;

    /// Build the request that reconfigures an existing, mismatched entity.
    ///
    /// Only called when [`Resource::mismatches`] is non-empty.
    fn plan_update(
        desired: &Self::Desired,
        observed: &Self::Observed,
    ) -> Result<Self::Update, PlanError>;

    /// The state a faithful endpoint ends up in after applying `change`.
    ///
    /// This is how the endpoint is expected to behave, not something the
    /// reconciler relies on; it backs the in-memory provider and lets callers
    /// preview a change.
    fn simulate_apply(
        id: &Self::Id,
        observed: Option<&Self::Observed>,
        change: &ResourceChange<Self>,
    ) -> Result<Option<Self::Observed>, ProviderError>;
}
