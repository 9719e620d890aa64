// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Deadlines on the provider calls a reconciliation makes.

use crate::reconciler::ReconcileError;
use crate::resource::ResourceKind;
use std::future::Future;
use std::time::Duration;
use vsphere_reconciler_types::ChangeOp;
use vsphere_reconciler_types::EntityId;

/// Which provider call a [`CallDeadline`] bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProviderCall {
    Fetch,
    Apply(ChangeOp),
}

/// A time limit on one provider call for one entity.
///
/// An overrun is reported as the [`ReconcileError`] for that call, so the
/// pipeline never sees a bare elapsed timer.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CallDeadline<'a> {
    kind: ResourceKind,
    entity: &'a EntityId,
    call: ProviderCall,
    limit: Duration,
}

impl<'a> CallDeadline<'a> {
    pub fn fetch(
        kind: ResourceKind,
        entity: &'a EntityId,
        limit: Duration,
    ) -> Self {
        Self { kind, entity, call: ProviderCall::Fetch, limit }
    }

    pub fn apply(
        kind: ResourceKind,
        entity: &'a EntityId,
        op: ChangeOp,
        limit: Duration,
    ) -> Self {
        Self { kind, entity, call: ProviderCall::Apply(op), limit }
    }

    /// The error reported when the call outlives its limit.
    pub fn overrun(&self) -> ReconcileError {
        let (kind, entity, timeout) =
            (self.kind, self.entity.clone(), self.limit);
        match self.call {
            ProviderCall::Fetch => {
                ReconcileError::FetchTimedOut { kind, entity, timeout }
            }
            ProviderCall::Apply(op) => {
                ReconcileError::ApplyTimedOut { kind, entity, op, timeout }
            }
        }
    }

    /// Drive `call` to completion unless the limit passes first. An
    /// abandoned call is dropped.
    pub async fn run<F>(self, call: F) -> Result<F::Output, ReconcileError>
    where
        F: Future,
    {
        tokio::time::timeout(self.limit, call)
            .await
            .map_err(|_| self.overrun())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use vsphere_reconciler_types::HostRef;

    fn entity() -> EntityId {
        EntityId::from(HostRef::new("esx-01"))
    }

    #[tokio::test(start_paused = true)]
    async fn slow_fetch_reports_its_limit() {
        let entity = entity();
        let deadline = CallDeadline::fetch(
            ResourceKind::Ntp,
            &entity,
            Duration::from_secs(5),
        );
        let err = deadline
            .run(tokio::time::sleep(Duration::from_secs(10)))
            .await
            .unwrap_err();
        assert_matches!(
            err,
            ReconcileError::FetchTimedOut {
                kind: ResourceKind::Ntp,
                timeout,
                ..
            } if timeout == Duration::from_secs(5)
        );
        assert_eq!(err.entity(), &entity);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_apply_names_the_operation() {
        let entity = entity();
        let deadline = CallDeadline::apply(
            ResourceKind::Dns,
            &entity,
            ChangeOp::Update,
            Duration::from_secs(1),
        );
        let err = deadline
            .run(std::future::pending::<()>())
            .await
            .unwrap_err();
        assert_matches!(
            err,
            ReconcileError::ApplyTimedOut { op: ChangeOp::Update, .. }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn prompt_call_passes_its_output_through() {
        let entity = entity();
        let deadline = CallDeadline::fetch(
            ResourceKind::Ntp,
            &entity,
            Duration::from_secs(5),
        );
        assert_eq!(deadline.run(async { 7 }).await.unwrap(), 7);
    }
}
