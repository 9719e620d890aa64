// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The per-entity reconciliation pipeline.
//!
//! One call to [`Reconciler::reconcile`] runs fetch, compare, plan, apply and
//! verify strictly in sequence against a fresh fetch. Nothing is cached
//! between calls, so running it again on a converged entity fetches once and
//! does nothing else.

use crate::config::ReconcilerConfig;
use crate::equivalence::resource_mismatches;
use crate::equivalence::FieldMismatch;
use crate::planner::plan;
use crate::planner::PlanError;
use crate::provider::ProviderError;
use crate::provider::StateProvider;
use crate::resource::Resource;
use crate::resource::ResourceChange;
use crate::resource::ResourceKind;
use crate::timeout::CallDeadline;
use display_error_chain::DisplayErrorChain;
use serde::Serialize;
use slog::debug;
use slog::error;
use slog::info;
use slog::o;
use slog::warn;
use slog::Logger;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use vsphere_reconciler_types::ChangeOp;
use vsphere_reconciler_types::EntityId;

/// Where a reconciliation stands, or where it stopped.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReconcileState {
    Unchecked,
    Fetched,
    InSync,
    OutOfSync,
    Converging,
    Converged,
    ConvergeFailed,
    FetchFailed,
}

impl ReconcileState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReconcileState::InSync
                | ReconcileState::Converged
                | ReconcileState::ConvergeFailed
                | ReconcileState::FetchFailed
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("failed to fetch {kind} {entity}")]
    FetchFailed {
        kind: ResourceKind,
        entity: EntityId,
        #[source]
        source: ProviderError,
    },

    #[error("timed out after {timeout:?} fetching {kind} {entity}")]
    FetchTimedOut { kind: ResourceKind, entity: EntityId, timeout: Duration },

    #[error("failed to {op} {kind} {entity}")]
    ApplyFailed {
        kind: ResourceKind,
        entity: EntityId,
        op: ChangeOp,
        #[source]
        source: ProviderError,
    },

    /// The request may or may not have taken effect.
    #[error("timed out after {timeout:?} waiting to {op} {kind} {entity}")]
    ApplyTimedOut {
        kind: ResourceKind,
        entity: EntityId,
        op: ChangeOp,
        timeout: Duration,
    },

    /// The entity's existence differs from what the desired spec declares
    /// and reconciliation is not allowed to change it, or a member it
    /// refers to does not exist.
    #[error("{kind} {entity} is missing or cannot be created or removed")]
    NotFound {
        kind: ResourceKind,
        entity: EntityId,
        #[source]
        source: PlanError,
    },

    #[error("cannot plan a change to {kind} {entity}")]
    Plan {
        kind: ResourceKind,
        entity: EntityId,
        #[source]
        source: PlanError,
    },

    #[error(
        "{op} of {kind} {entity} was acknowledged but {} field(s) still \
         differ{}",
        .mismatches.len(),
        unchanged_note(.unchanged)
    )]
    VerifyMismatch {
        kind: ResourceKind,
        entity: EntityId,
        op: ChangeOp,
        mismatches: Vec<FieldMismatch>,
        /// The re-fetched state is identical to the state before the apply.
        unchanged: bool,
    },
}

fn unchanged_note(unchanged: &bool) -> &'static str {
    if *unchanged {
        " (nothing changed)"
    } else {
        ""
    }
}

impl ReconcileError {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ReconcileError::FetchFailed { kind, .. }
            | ReconcileError::FetchTimedOut { kind, .. }
            | ReconcileError::ApplyFailed { kind, .. }
            | ReconcileError::ApplyTimedOut { kind, .. }
            | ReconcileError::NotFound { kind, .. }
            | ReconcileError::Plan { kind, .. }
            | ReconcileError::VerifyMismatch { kind, .. } => *kind,
        }
    }

    pub fn entity(&self) -> &EntityId {
        match self {
            ReconcileError::FetchFailed { entity, .. }
            | ReconcileError::FetchTimedOut { entity, .. }
            | ReconcileError::ApplyFailed { entity, .. }
            | ReconcileError::ApplyTimedOut { entity, .. }
            | ReconcileError::NotFound { entity, .. }
            | ReconcileError::Plan { entity, .. }
            | ReconcileError::VerifyMismatch { entity, .. } => entity,
        }
    }

    /// Whether this error reflects a defect in the desired spec or in this
    /// crate, rather than a condition of the remote system.
    pub fn is_invariant_violation(&self) -> bool {
        match self {
            ReconcileError::Plan { source, .. } => {
                source.is_invariant_violation()
            }
            _ => false,
        }
    }
}

/// How a reconciliation ended.
#[derive(Debug)]
pub enum ReconcileOutcome<R: Resource> {
    /// Nothing needed to change.
    InSync,

    /// The change was acknowledged. `verified` is set when a re-fetch
    /// confirmed the entity now matches.
    Converged { change: ResourceChange<R>, verified: bool },

    /// The entity is (or may still be) out of sync.
    ///
    /// `change` is the request that was submitted, if one was; `mismatches`
    /// are the differences last observed.
    ConvergeFailed {
        change: Option<ResourceChange<R>>,
        mismatches: Vec<FieldMismatch>,
        error: ReconcileError,
    },

    FetchFailed { error: ReconcileError },

    /// The caller cancelled the run before the stage after `state`.
    Cancelled { state: ReconcileState, change: Option<ResourceChange<R>> },
}

impl<R: Resource> ReconcileOutcome<R> {
    /// The state the pipeline stopped in.
    pub fn state(&self) -> ReconcileState {
        match self {
            ReconcileOutcome::InSync => ReconcileState::InSync,
            ReconcileOutcome::Converged { .. } => ReconcileState::Converged,
            ReconcileOutcome::ConvergeFailed { .. } => {
                ReconcileState::ConvergeFailed
            }
            ReconcileOutcome::FetchFailed { .. } => ReconcileState::FetchFailed,
            ReconcileOutcome::Cancelled { state, .. } => *state,
        }
    }

    pub fn change(&self) -> Option<&ResourceChange<R>> {
        match self {
            ReconcileOutcome::Converged { change, .. } => Some(change),
            ReconcileOutcome::ConvergeFailed { change, .. }
            | ReconcileOutcome::Cancelled { change, .. } => change.as_ref(),
            ReconcileOutcome::InSync | ReconcileOutcome::FetchFailed { .. } => {
                None
            }
        }
    }

    pub fn error(&self) -> Option<&ReconcileError> {
        match self {
            ReconcileOutcome::ConvergeFailed { error, .. }
            | ReconcileOutcome::FetchFailed { error } => Some(error),
            ReconcileOutcome::InSync
            | ReconcileOutcome::Converged { .. }
            | ReconcileOutcome::Cancelled { .. } => None,
        }
    }

    /// Whether the entity is known to be in its desired state, or was
    /// acknowledged as converging to it.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            ReconcileOutcome::InSync | ReconcileOutcome::Converged { .. }
        )
    }
}

/// The result of reconciling one entity.
#[derive(Debug)]
pub struct ReconcileReport<R: Resource> {
    pub kind: ResourceKind,
    pub entity: EntityId,
    pub outcome: ReconcileOutcome<R>,
}

impl<R: Resource> ReconcileReport<R> {
    /// Erase the resource type, for reporting alongside other kinds.
    pub fn summary(&self) -> ReconcileSummary {
        let change = self.outcome.change();
        let mismatches = match &self.outcome {
            ReconcileOutcome::ConvergeFailed { mismatches, .. } => {
                mismatches.clone()
            }
            _ => Vec::new(),
        };
        ReconcileSummary {
            kind: self.kind,
            entity: self.entity.clone(),
            state: self.outcome.state(),
            op: change.map(|change| change.op()),
            change: change.and_then(|change| serde_json::to_value(change).ok()),
            mismatches,
            error: self
                .outcome
                .error()
                .map(|error| DisplayErrorChain::new(error).to_string()),
        }
    }
}

/// A [`ReconcileReport`] of any resource kind, as reported to the front end.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconcileSummary {
    pub kind: ResourceKind,
    pub entity: EntityId,
    pub state: ReconcileState,
    pub op: Option<ChangeOp>,
    /// The submitted change request, if any.
    pub change: Option<serde_json::Value>,
    pub mismatches: Vec<FieldMismatch>,
    /// The error and its sources, rendered as one line.
    pub error: Option<String>,
}

impl ReconcileSummary {
    pub fn is_success(&self) -> bool {
        matches!(self.state, ReconcileState::InSync | ReconcileState::Converged)
    }
}

/// Drives entities to their desired state through a [`StateProvider`].
#[derive(Debug, Clone)]
pub struct Reconciler {
    log: Logger,
    fetch_timeout: Duration,
    apply_timeout: Duration,
    verify_after_apply: bool,
}

impl Reconciler {
    pub fn new(log: &Logger, config: &ReconcilerConfig) -> Self {
        Self {
            log: log.new(o!("component" => "Reconciler")),
            fetch_timeout: config.fetch_timeout,
            apply_timeout: config.apply_timeout,
            verify_after_apply: config.verify_after_apply,
        }
    }

    pub fn log(&self) -> &Logger {
        &self.log
    }

    /// Converge the entity `id` onto `desired`.
    ///
    /// `cancel` is checked before each stage that talks to the provider. A
    /// change request that has been submitted is never abandoned; a
    /// cancellation noticed after it was acknowledged only skips
    /// verification.
    pub async fn reconcile<R, P>(
        &self,
        provider: &P,
        id: &R::Id,
        desired: &R::Desired,
        cancel: &CancellationToken,
    ) -> ReconcileReport<R>
    where
        R: Resource,
        P: StateProvider<R>,
    {
        let entity: EntityId = id.clone().into();
        let log = self.log.new(o!(
            "kind" => R::KIND.to_string(),
            "entity" => entity.to_string(),
        ));
        let outcome = self
            .run_pipeline::<R, P>(&log, provider, id, &entity, desired, cancel)
            .await;
        ReconcileReport { kind: R::KIND, entity, outcome }
    }

    async fn run_pipeline<R, P>(
        &self,
        log: &Logger,
        provider: &P,
        id: &R::Id,
        entity: &EntityId,
        desired: &R::Desired,
        cancel: &CancellationToken,
    ) -> ReconcileOutcome<R>
    where
        R: Resource,
        P: StateProvider<R>,
    {
        if cancel.is_cancelled() {
            debug!(log, "cancelled before fetch");
            return ReconcileOutcome::Cancelled {
                state: ReconcileState::Unchecked,
                change: None,
            };
        }

        let observed = match self.fetch::<R, P>(provider, id, entity).await {
            Ok(observed) => observed,
            Err(error) => {
                warn!(
                    log,
                    "fetch failed";
                    "error" => %DisplayErrorChain::new(&error),
                );
                return ReconcileOutcome::FetchFailed { error };
            }
        };
        debug!(
            log,
            "fetched";
            "state" => %ReconcileState::Fetched,
            "exists" => observed.is_some(),
        );

        let mismatches = resource_mismatches::<R>(desired, observed.as_ref());
        if mismatches.is_empty() {
            debug!(log, "in sync"; "state" => %ReconcileState::InSync);
            return ReconcileOutcome::InSync;
        }
        info!(
            log,
            "out of sync";
            "state" => %ReconcileState::OutOfSync,
            "mismatches" => %DisplayMismatches(&mismatches),
        );

        let change = match plan::<R>(id, desired, observed.as_ref()) {
            Ok(change) => change,
            Err(source) => {
                let error = if source.is_not_found() {
                    ReconcileError::NotFound {
                        kind: R::KIND,
                        entity: entity.clone(),
                        source,
                    }
                } else {
                    ReconcileError::Plan {
                        kind: R::KIND,
                        entity: entity.clone(),
                        source,
                    }
                };
                if error.is_invariant_violation() {
                    error!(
                        log,
                        "cannot plan change";
                        "error" => %DisplayErrorChain::new(&error),
                    );
                } else {
                    warn!(
                        log,
                        "cannot plan change";
                        "error" => %DisplayErrorChain::new(&error),
                    );
                }
                return ReconcileOutcome::ConvergeFailed {
                    change: None,
                    mismatches,
                    error,
                };
            }
        };

        if cancel.is_cancelled() {
            debug!(log, "cancelled before apply"; "op" => %change.op());
            return ReconcileOutcome::Cancelled {
                state: ReconcileState::OutOfSync,
                change: Some(change),
            };
        }

        info!(
            log,
            "applying change";
            "state" => %ReconcileState::Converging,
            "op" => %change.op(),
            "change" => ?change,
        );
        if let Err(error) =
            self.apply::<R, P>(provider, id, entity, &change).await
        {
            warn!(
                log,
                "apply failed";
                "op" => %change.op(),
                "error" => %DisplayErrorChain::new(&error),
            );
            return ReconcileOutcome::ConvergeFailed {
                change: Some(change),
                mismatches,
                error,
            };
        }

        if !self.verify_after_apply || cancel.is_cancelled() {
            info!(
                log,
                "change acknowledged";
                "state" => %ReconcileState::Converged,
                "verified" => false,
            );
            return ReconcileOutcome::Converged { change, verified: false };
        }

        let after = match self.fetch::<R, P>(provider, id, entity).await {
            Ok(after) => after,
            Err(error) => {
                warn!(
                    log,
                    "verification fetch failed";
                    "error" => %DisplayErrorChain::new(&error),
                );
                return ReconcileOutcome::ConvergeFailed {
                    change: Some(change),
                    mismatches,
                    error,
                };
            }
        };

        let remaining = resource_mismatches::<R>(desired, after.as_ref());
        if remaining.is_empty() {
            info!(
                log,
                "converged";
                "state" => %ReconcileState::Converged,
                "verified" => true,
            );
            return ReconcileOutcome::Converged { change, verified: true };
        }

        let error = ReconcileError::VerifyMismatch {
            kind: R::KIND,
            entity: entity.clone(),
            op: change.op(),
            mismatches: remaining.clone(),
            unchanged: after == observed,
        };
        error!(
            log,
            "change acknowledged but not applied";
            "state" => %ReconcileState::ConvergeFailed,
            "mismatches" => %DisplayMismatches(&remaining),
            "error" => %DisplayErrorChain::new(&error),
        );
        ReconcileOutcome::ConvergeFailed {
            change: Some(change),
            mismatches: remaining,
            error,
        }
    }

    async fn fetch<R, P>(
        &self,
        provider: &P,
        id: &R::Id,
        entity: &EntityId,
    ) -> Result<Option<R::Observed>, ReconcileError>
    where
        R: Resource,
        P: StateProvider<R>,
    {
        let deadline =
            CallDeadline::fetch(R::KIND, entity, self.fetch_timeout);
        match deadline.run(provider.fetch(id)).await? {
            Ok(observed) => Ok(observed),
            Err(ProviderError::NotFound) => Ok(None),
            Err(source) => Err(ReconcileError::FetchFailed {
                kind: R::KIND,
                entity: entity.clone(),
                source,
            }),
        }
    }

    async fn apply<R, P>(
        &self,
        provider: &P,
        id: &R::Id,
        entity: &EntityId,
        change: &ResourceChange<R>,
    ) -> Result<(), ReconcileError>
    where
        R: Resource,
        P: StateProvider<R>,
    {
        let deadline = CallDeadline::apply(
            R::KIND,
            entity,
            change.op(),
            self.apply_timeout,
        );
        deadline.run(provider.apply(id, change)).await?.map_err(|source| {
            ReconcileError::ApplyFailed {
                kind: R::KIND,
                entity: entity.clone(),
                op: change.op(),
                source,
            }
        })
    }
}

/// Renders mismatches as `field: desired != observed; ...` for log values.
struct DisplayMismatches<'a>(&'a [FieldMismatch]);

impl std::fmt::Display for DisplayMismatches<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, mismatch) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{mismatch}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeProvider;
    use crate::resources::Ntp;
    use assert_matches::assert_matches;
    use vsphere_reconciler_types::datetime::HostDateTimeConfig;
    use vsphere_reconciler_types::datetime::NtpConfig;
    use vsphere_reconciler_types::datetime::NtpSpec;
    use vsphere_reconciler_types::HostRef;

    fn reconciler() -> Reconciler {
        let log = Logger::root(slog::Discard, o!());
        Reconciler::new(&log, &ReconcilerConfig::default())
    }

    fn ntp(servers: &[&str]) -> HostDateTimeConfig {
        HostDateTimeConfig {
            ntp: Some(NtpConfig::with_servers(servers.iter().copied())),
        }
    }

    #[test]
    fn only_outcome_states_are_terminal() {
        assert!(!ReconcileState::Unchecked.is_terminal());
        assert!(!ReconcileState::OutOfSync.is_terminal());
        assert!(ReconcileState::InSync.is_terminal());
        assert!(ReconcileState::FetchFailed.is_terminal());
    }

    #[tokio::test]
    async fn summary_carries_the_error_chain() {
        let host = HostRef::new("esx-01");
        let provider = FakeProvider::<Ntp>::new();
        provider.insert(host.clone(), ntp(&["ntp1"]));
        provider.fail_next_apply(ProviderError::rejected("busy"));

        let desired = NtpSpec {
            servers: Some(vec!["ntp1".to_string(), "ntp2".to_string()]),
        };
        let report = reconciler()
            .reconcile::<Ntp, _>(
                &provider,
                &host,
                &desired,
                &CancellationToken::new(),
            )
            .await;

        let summary = report.summary();
        assert_eq!(summary.state, ReconcileState::ConvergeFailed);
        assert_eq!(summary.op, Some(ChangeOp::Update));
        assert_eq!(summary.mismatches.len(), 1);
        let error = summary.error.unwrap();
        assert!(error.contains("failed to update ntp esx-01"), "{error}");
        assert!(error.contains("busy"), "{error}");
        assert_matches!(summary.change, Some(serde_json::Value::Object(_)));
    }

    #[test]
    fn verify_mismatch_notes_an_unchanged_entity() {
        let error = ReconcileError::VerifyMismatch {
            kind: ResourceKind::Ntp,
            entity: HostRef::new("esx-01").into(),
            op: ChangeOp::Update,
            mismatches: vec![FieldMismatch {
                field: "ntp.servers".to_string(),
                desired: "[\"a\"]".to_string(),
                observed: "[]".to_string(),
            }],
            unchanged: true,
        };
        assert_eq!(
            error.to_string(),
            "update of ntp esx-01 was acknowledged but 1 field(s) still \
             differ (nothing changed)"
        );
        assert!(!error.is_invariant_violation());
        assert_eq!(error.kind(), ResourceKind::Ntp);
    }
}
