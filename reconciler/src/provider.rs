// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interface to the remote management endpoint.
//!
//! The reconciler never opens sessions, authenticates, or retries; all of that
//! belongs to whatever implements [`StateProvider`]. The provider is passed
//! explicitly to every reconciliation, so tests substitute a fake.

use crate::resource::Resource;
use crate::resource::ResourceChange;
use std::future::Future;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The entity a change targets does not exist.
    #[error("entity not found")]
    NotFound,

    /// Connectivity or authentication failure.
    #[error("transport failure")]
    Transport(#[source] anyhow::Error),

    /// The endpoint refused the change request.
    #[error("change request rejected by endpoint")]
    Rejected(#[source] anyhow::Error),
}

impl ProviderError {
    pub fn transport(message: impl Into<String>) -> Self {
        ProviderError::Transport(anyhow::anyhow!(message.into()))
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        ProviderError::Rejected(anyhow::anyhow!(message.into()))
    }
}

/// Fetches and mutates entities of kind `R` on the management endpoint.
///
/// Implementations must be safe to call concurrently for different entities;
/// any connection pooling or arbitration happens behind this trait.
pub trait StateProvider<R: Resource>: Send + Sync + 'static {
    /// Fetch the current state of `id`, or `None` if it does not exist.
    fn fetch(
        &self,
        id: &R::Id,
    ) -> impl Future<Output = Result<Option<R::Observed>, ProviderError>>
           + Send;

    /// Submit a change request.
    ///
    /// A returned `Ok` acknowledges the request; it does not guarantee that
    /// every field was applied.
    fn apply(
        &self,
        id: &R::Id,
        change: &ResourceChange<R>,
    ) -> impl Future<Output = Result<(), ProviderError>> + Send;
}
