// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reconciling many independent entities at once.

use crate::config::ReconcilerConfig;
use crate::provider::StateProvider;
use crate::reconciler::ReconcileSummary;
use crate::reconciler::Reconciler;
use crate::resource::Resource;
use slog::debug;
use slog::Logger;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// A set of reconciliations running on distinct tokio tasks, at most
/// `max_parallelism` of them at a time.
///
/// Each entity's pipeline is still strictly sequential; only separate
/// entities run concurrently. Callers must not add the same entity twice,
/// since two pipelines racing on one entity could each plan against a
/// snapshot the other is about to change.
///
/// Entities of different kinds can share a set; results are reported as
/// [`ReconcileSummary`] values.
pub struct ReconcileSet {
    reconciler: Reconciler,
    semaphore: Arc<Semaphore>,
    set: JoinSet<ReconcileSummary>,
    cancel: CancellationToken,
}

impl ReconcileSet {
    pub fn new(reconciler: Reconciler, max_parallelism: usize) -> Self {
        Self {
            reconciler,
            semaphore: Arc::new(Semaphore::new(max_parallelism.max(1))),
            set: JoinSet::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn from_config(log: &Logger, config: &ReconcilerConfig) -> Self {
        Self::new(Reconciler::new(log, config), config.max_parallelism)
    }

    /// Cancelling this token stops every reconciliation in the set at its
    /// next stage boundary, including ones still waiting to start.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Queue the reconciliation of `id` onto `desired`.
    ///
    /// The task starts immediately but does not touch the provider until
    /// the set is within its parallelism limit.
    pub fn spawn<R, P>(
        &mut self,
        provider: Arc<P>,
        id: R::Id,
        desired: R::Desired,
    ) where
        R: Resource,
        P: StateProvider<R>,
    {
        let reconciler = self.reconciler.clone();
        let semaphore = Arc::clone(&self.semaphore);
        let cancel = self.cancel.clone();
        debug!(
            reconciler.log(),
            "queued reconciliation";
            "kind" => %R::KIND,
            "entity" => %id,
        );
        self.set.spawn(async move {
            // Once cancelled, a queued task skips the wait and reports
            // itself unchecked without touching the provider.
            let _permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = semaphore.acquire_owned() => permit.ok(),
            };
            let report = reconciler
                .reconcile::<R, P>(&provider, &id, &desired, &cancel)
                .await;
            report.summary()
        });
    }

    /// Wait for the next reconciliation to finish.
    ///
    /// # Panics
    ///
    /// Resumes the panic of a reconciliation task that panicked.
    pub async fn join_next(&mut self) -> Option<ReconcileSummary> {
        loop {
            match self.set.join_next().await? {
                Ok(summary) => return Some(summary),
                Err(err) if err.is_panic() => {
                    std::panic::resume_unwind(err.into_panic())
                }
                // Tasks are only aborted when the set is dropped.
                Err(_) => continue,
            }
        }
    }

    /// Wait for every reconciliation, returning their summaries in
    /// completion order.
    pub async fn join_all(mut self) -> Vec<ReconcileSummary> {
        let mut summaries = Vec::with_capacity(self.set.len());
        while let Some(summary) = self.join_next().await {
            summaries.push(summary);
        }
        summaries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderError;
    use crate::reconciler::ReconcileState;
    use crate::resource::ResourceChange;
    use crate::resources::Ntp;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tokio::sync::Notify;
    use vsphere_reconciler_types::datetime::HostDateTimeConfig;
    use vsphere_reconciler_types::datetime::NtpConfig;
    use vsphere_reconciler_types::datetime::NtpSpec;
    use vsphere_reconciler_types::HostRef;

    /// Tracks how many fetches are in flight at once.
    #[derive(Default)]
    struct GaugeProvider {
        in_flight: AtomicUsize,
        high_water: AtomicUsize,
    }

    impl StateProvider<Ntp> for GaugeProvider {
        async fn fetch(
            &self,
            _id: &HostRef,
        ) -> Result<Option<HostDateTimeConfig>, ProviderError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.high_water.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(Some(HostDateTimeConfig {
                ntp: Some(NtpConfig::with_servers(["ntp1"])),
            }))
        }

        async fn apply(
            &self,
            _id: &HostRef,
            _change: &ResourceChange<Ntp>,
        ) -> Result<(), ProviderError> {
            Ok(())
        }
    }

    /// Holds every fetch until released.
    #[derive(Default)]
    struct GatedProvider {
        started: Notify,
        release: Notify,
        fetches: AtomicUsize,
    }

    impl StateProvider<Ntp> for GatedProvider {
        async fn fetch(
            &self,
            _id: &HostRef,
        ) -> Result<Option<HostDateTimeConfig>, ProviderError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.started.notify_one();
            self.release.notified().await;
            Ok(Some(HostDateTimeConfig {
                ntp: Some(NtpConfig::with_servers(["ntp1"])),
            }))
        }

        async fn apply(
            &self,
            _id: &HostRef,
            _change: &ResourceChange<Ntp>,
        ) -> Result<(), ProviderError> {
            Ok(())
        }
    }

    fn desired() -> NtpSpec {
        NtpSpec { servers: Some(vec!["ntp1".to_string()]) }
    }

    fn set(max_parallelism: usize) -> ReconcileSet {
        let log = Logger::root(slog::Discard, slog::o!());
        ReconcileSet::new(
            Reconciler::new(&log, &ReconcilerConfig::default()),
            max_parallelism,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn parallelism_is_bounded() {
        let limit = 4;
        let provider = Arc::new(GaugeProvider::default());
        let mut set = set(limit);
        for i in 0..limit * 5 {
            set.spawn::<Ntp, _>(
                Arc::clone(&provider),
                HostRef::new(format!("esx-{i:02}")),
                desired(),
            );
        }
        assert_eq!(set.len(), limit * 5);

        let summaries = set.join_all().await;
        assert_eq!(summaries.len(), limit * 5);
        assert!(summaries.iter().all(|s| s.state == ReconcileState::InSync));
        let high_water = provider.high_water.load(Ordering::SeqCst);
        assert!(high_water <= limit, "{high_water} concurrent fetches");
        assert!(high_water > 1, "reconciliations never overlapped");
    }

    #[tokio::test]
    async fn cancelled_set_touches_nothing() {
        let provider = Arc::new(GaugeProvider::default());
        let mut set = set(1);
        set.cancellation_token().cancel();
        let host = HostRef::new("esx-01");
        set.spawn::<Ntp, _>(provider.clone(), host, desired());

        let summaries = set.join_all().await;
        assert_eq!(summaries[0].state, ReconcileState::Unchecked);
        assert_eq!(provider.high_water.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_releases_queued_entities_at_once() {
        let provider = Arc::new(GatedProvider::default());
        let mut set = set(1);
        for i in 0..3 {
            set.spawn::<Ntp, _>(
                Arc::clone(&provider),
                HostRef::new(format!("esx-{i:02}")),
                desired(),
            );
        }
        // One entity holds the only permit, stuck in its fetch.
        provider.started.notified().await;
        set.cancellation_token().cancel();

        let first = set.join_next().await.unwrap();
        let second = set.join_next().await.unwrap();
        assert_eq!(first.state, ReconcileState::Unchecked);
        assert_eq!(second.state, ReconcileState::Unchecked);
        assert_eq!(provider.fetches.load(Ordering::SeqCst), 1);

        provider.release.notify_one();
        let last = set.join_next().await.unwrap();
        assert_eq!(last.state, ReconcileState::InSync);
        assert!(set.join_next().await.is_none());
    }
}
