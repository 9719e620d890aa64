// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Declarative convergence of vSphere entities.
//!
//! For each entity, a [`Reconciler`] fetches the live state through a
//! [`StateProvider`], compares it with the desired spec, and when they differ
//! submits the one change request that converges it, then re-fetches to
//! confirm. Fields the desired spec leaves unset are never compared and never
//! changed.
//!
//! The per-kind comparison and planning rules live in [`resources`]; the
//! desired and observed data types live in `vsphere-reconciler-types`.

mod config;
mod equivalence;
#[cfg(any(test, feature = "testing"))]
pub mod fake;
mod logging;
mod parallel;
mod planner;
mod provider;
mod reconciler;
mod resource;
pub mod resources;
mod timeout;

pub use config::ConfigError;
pub use config::ReconcilerConfig;
pub use config::DEFAULT_MAX_PARALLELISM;
pub use equivalence::equivalent_opt;
pub use equivalence::resource_equivalent;
pub use equivalence::resource_mismatches;
pub use equivalence::same_elements;
pub use equivalence::Equivalent;
pub use equivalence::FieldComparison;
pub use equivalence::FieldMismatch;
pub use logging::LogConfig;
pub use logging::LogFileError;
pub use logging::LogIfExists;
pub use logging::LogLevel;
pub use parallel::ReconcileSet;
pub use planner::plan;
pub use planner::PlanError;
pub use provider::ProviderError;
pub use provider::StateProvider;
pub use reconciler::ReconcileError;
pub use reconciler::ReconcileOutcome;
pub use reconciler::ReconcileReport;
pub use reconciler::ReconcileState;
pub use reconciler::ReconcileSummary;
pub use reconciler::Reconciler;
pub use resource::Resource;
pub use resource::ResourceChange;
pub use resource::ResourceKind;

pub use vsphere_reconciler_types as types;
