// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Turning a detected mismatch into a change request.

use crate::equivalence::resource_equivalent;
use crate::resource::Resource;
use crate::resource::ResourceChange;
use crate::resource::ResourceKind;
use vsphere_reconciler_types::ChangeRequest;
use vsphere_reconciler_types::Ensure;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    /// The planner was asked to converge an entity that already matches.
    /// This is a bug in the caller, not a user-facing condition.
    #[error("{kind} entity is already converged; nothing to plan")]
    AlreadyConverged { kind: ResourceKind },

    #[error(
        "{kind} entity does not exist and cannot be created by reconciliation"
    )]
    NotCreatable { kind: ResourceKind },

    #[error("{kind} entity exists and cannot be removed by reconciliation")]
    NotRemovable { kind: ResourceKind },

    #[error("advanced setting {name:?} does not exist on the host")]
    UnknownSetting { name: String },

    #[error("service {key:?} does not exist on the host")]
    UnknownService { key: String },

    #[error("desired spec cannot be evaluated: {reason}")]
    Malformed { reason: String },
}

impl PlanError {
    /// Whether this error indicates a defect rather than a condition of the
    /// remote system.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            PlanError::AlreadyConverged { .. } | PlanError::Malformed { .. }
        )
    }

    /// Whether the entity exists when it should not (or vice versa), or a
    /// member it refers to is missing.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            PlanError::NotCreatable { .. }
                | PlanError::NotRemovable { .. }
                | PlanError::UnknownSetting { .. }
                | PlanError::UnknownService { .. }
        )
    }
}

/// Compute the change that converges `observed` (`None` if the entity does
/// not exist) onto `desired`.
///
/// Must only be called for a pair the equivalence engine reported as out of
/// sync; an already-converged pair yields [`PlanError::AlreadyConverged`].
pub fn plan<R: Resource>(
    id: &R::Id,
    desired: &R::Desired,
    observed: Option<&R::Observed>,
) -> Result<ResourceChange<R>, PlanError> {
    if resource_equivalent::<R>(desired, observed) {
        return Err(PlanError::AlreadyConverged { kind: R::KIND });
    }

    match (R::ensure(desired), observed) {
        (Ensure::Present, None) => {
            if !R::manages_lifecycle(desired) {
                return Err(PlanError::NotCreatable { kind: R::KIND });
            }
            R::plan_create(id, desired).map(ChangeRequest::Create)
        }
        (Ensure::Present, Some(observed)) => {
            R::plan_update(desired, observed).map(ChangeRequest::Update)
        }
        (Ensure::Absent, Some(_)) => {
            if !R::manages_lifecycle(desired) {
                return Err(PlanError::NotRemovable { kind: R::KIND });
            }
            Ok(ChangeRequest::Delete)
        }
        (Ensure::Absent, None) => {
            unreachable!("absent/absent is always equivalent")
        }
    }
}
