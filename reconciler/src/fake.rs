// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! An in-memory [`StateProvider`], for tests.
//!
//! By default the fake behaves like a faithful endpoint: changes are applied
//! with [`Resource::simulate_apply`]. Tests can queue failures, slow calls
//! down, or make it acknowledge changes without applying them.

use crate::provider::ProviderError;
use crate::provider::StateProvider;
use crate::resource::Resource;
use crate::resource::ResourceChange;
use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;
use vsphere_reconciler_types::EntityId;

type ApplyFn<R> = Box<
    dyn Fn(
            &<R as Resource>::Id,
            Option<&<R as Resource>::Observed>,
            &ResourceChange<R>,
        ) -> Result<Option<<R as Resource>::Observed>, ProviderError>
        + Send
        + Sync,
>;

/// What the fake does with an apply it does not fail.
pub enum ApplyBehavior<R: Resource> {
    /// Apply the change exactly as requested.
    Faithful,
    /// Acknowledge the change and leave the entity as it was.
    Ignore,
    /// Compute the resulting state with a caller-supplied function.
    Custom(ApplyFn<R>),
}

impl<R: Resource> std::fmt::Debug for ApplyBehavior<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApplyBehavior::Faithful => f.write_str("Faithful"),
            ApplyBehavior::Ignore => f.write_str("Ignore"),
            ApplyBehavior::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[derive(Debug)]
struct Inner<R: Resource> {
    entities: BTreeMap<EntityId, R::Observed>,
    fetch_calls: usize,
    apply_calls: usize,
    applied: Vec<(EntityId, ResourceChange<R>)>,
    fetch_failures: VecDeque<ProviderError>,
    apply_failures: VecDeque<ProviderError>,
    apply_behavior: ApplyBehavior<R>,
    fetch_delay: Option<Duration>,
    apply_delay: Option<Duration>,
}

#[derive(Debug)]
pub struct FakeProvider<R: Resource> {
    inner: Mutex<Inner<R>>,
}

impl<R: Resource> Default for FakeProvider<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Resource> FakeProvider<R> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                entities: BTreeMap::new(),
                fetch_calls: 0,
                apply_calls: 0,
                applied: Vec::new(),
                fetch_failures: VecDeque::new(),
                apply_failures: VecDeque::new(),
                apply_behavior: ApplyBehavior::Faithful,
                fetch_delay: None,
                apply_delay: None,
            }),
        }
    }

    // A panicking test already fails; later calls still see the state.
    fn inner(&self) -> MutexGuard<'_, Inner<R>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert(&self, id: R::Id, observed: R::Observed) {
        self.inner().entities.insert(id.into(), observed);
    }

    pub fn remove(&self, id: &R::Id) -> Option<R::Observed> {
        let entity: EntityId = id.clone().into();
        self.inner().entities.remove(&entity)
    }

    pub fn get(&self, id: &R::Id) -> Option<R::Observed> {
        let entity: EntityId = id.clone().into();
        self.inner().entities.get(&entity).cloned()
    }

    pub fn fetch_count(&self) -> usize {
        self.inner().fetch_calls
    }

    pub fn apply_count(&self) -> usize {
        self.inner().apply_calls
    }

    /// Every change submitted so far, including failed ones.
    pub fn applied(&self) -> Vec<(EntityId, ResourceChange<R>)> {
        self.inner().applied.clone()
    }

    /// Fail the next fetch that would otherwise succeed.
    pub fn fail_next_fetch(&self, error: ProviderError) {
        self.inner().fetch_failures.push_back(error);
    }

    /// Fail the next apply, leaving the entity untouched.
    pub fn fail_next_apply(&self, error: ProviderError) {
        self.inner().apply_failures.push_back(error);
    }

    pub fn set_apply_behavior(&self, behavior: ApplyBehavior<R>) {
        self.inner().apply_behavior = behavior;
    }

    /// Acknowledge every subsequent apply without changing anything.
    pub fn ignore_applies(&self) {
        self.set_apply_behavior(ApplyBehavior::Ignore);
    }

    pub fn apply_with<F>(&self, f: F)
    where
        F: Fn(
                &R::Id,
                Option<&R::Observed>,
                &ResourceChange<R>,
            ) -> Result<Option<R::Observed>, ProviderError>
            + Send
            + Sync
            + 'static,
    {
        self.set_apply_behavior(ApplyBehavior::Custom(Box::new(f)));
    }

    pub fn set_fetch_delay(&self, delay: Duration) {
        self.inner().fetch_delay = Some(delay);
    }

    pub fn set_apply_delay(&self, delay: Duration) {
        self.inner().apply_delay = Some(delay);
    }
}

impl<R: Resource> StateProvider<R> for FakeProvider<R> {
    async fn fetch(
        &self,
        id: &R::Id,
    ) -> Result<Option<R::Observed>, ProviderError> {
        let entity: EntityId = id.clone().into();
        let delay = {
            let mut inner = self.inner();
            inner.fetch_calls += 1;
            inner.fetch_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.inner();
        if let Some(error) = inner.fetch_failures.pop_front() {
            return Err(error);
        }
        Ok(inner.entities.get(&entity).cloned())
    }

    async fn apply(
        &self,
        id: &R::Id,
        change: &ResourceChange<R>,
    ) -> Result<(), ProviderError> {
        let entity: EntityId = id.clone().into();
        let delay = {
            let mut inner = self.inner();
            inner.apply_calls += 1;
            inner.applied.push((entity.clone(), change.clone()));
            inner.apply_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.inner();
        if let Some(error) = inner.apply_failures.pop_front() {
            return Err(error);
        }
        let current = inner.entities.get(&entity);
        let next = match &inner.apply_behavior {
            ApplyBehavior::Faithful => R::simulate_apply(id, current, change)?,
            ApplyBehavior::Ignore => return Ok(()),
            ApplyBehavior::Custom(f) => f(id, current, change)?,
        };
        match next {
            Some(observed) => {
                inner.entities.insert(entity, observed);
            }
            None => {
                inner.entities.remove(&entity);
            }
        }
        Ok(())
    }
}
