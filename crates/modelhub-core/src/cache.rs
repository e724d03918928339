//! Model cache with per-identity single-flight loading.
//!
//! A given (model id, mode) pair is constructed at most once per
//! process; concurrent misses for the same identity collapse into one
//! construction whose outcome every waiter observes. Construction
//! failures are not memorized: the slot is cleared so a later call
//! retries. There is no eviction policy; resident models live until
//! process teardown, and `loaded_identities` exposes occupancy so
//! operators can watch memory growth.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::backend::LoadedModel;
use crate::error::{Error, Result};
use crate::resolver::ModelIdentity;

type LoadFuture = Shared<BoxFuture<'static, Result<Arc<LoadedModel>>>>;

enum Slot {
    /// Construction in flight; waiters clone and await this future.
    Loading(LoadFuture),
    /// Memorized for the remaining process lifetime.
    Ready(Arc<LoadedModel>),
}

/// Owns every loaded model instance in the process.
#[derive(Default)]
pub struct ModelCache {
    slots: Arc<Mutex<HashMap<ModelIdentity, Slot>>>,
}

impl ModelCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the memorized handle for `identity`, or run `construct`
    /// exactly once to produce it.
    ///
    /// The slot map lock is held only to inspect and update slots,
    /// never across construction, so loading one model cannot block
    /// requests for another. Waiters that join an in-flight load all
    /// receive the same handle or the same failure.
    pub async fn get_or_load<F, Fut>(
        &self,
        identity: ModelIdentity,
        construct: F,
    ) -> Result<Arc<LoadedModel>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<LoadedModel>> + Send + 'static,
    {
        let load = {
            let mut slots = self.slots.lock().await;
            match slots.get(&identity) {
                Some(Slot::Ready(handle)) => return Ok(handle.clone()),
                Some(Slot::Loading(load)) => load.clone(),
                None => {
                    info!("Loading model {}", identity);
                    let construction = construct();
                    let slot_map = Arc::clone(&self.slots);
                    let slot_identity = identity.clone();
                    // Slot bookkeeping runs inside the shared future,
                    // so the transition to Ready (or the cleanup after
                    // a failure) happens no matter which waiter drives
                    // the load to completion. The initiating caller
                    // may be dropped mid-await.
                    let load: LoadFuture = async move {
                        let outcome = construction.await.map(Arc::new);
                        let mut slots = slot_map.lock().await;
                        match &outcome {
                            Ok(handle) => {
                                info!("Model {} loaded", slot_identity);
                                slots.insert(slot_identity, Slot::Ready(handle.clone()));
                            }
                            Err(err) => {
                                warn!("Model {} failed to load: {}", slot_identity, err);
                                slots.remove(&slot_identity);
                            }
                        }
                        outcome
                    }
                    .boxed()
                    .shared();
                    slots.insert(identity, Slot::Loading(load.clone()));
                    load
                }
            }
        };

        load.await
    }

    /// Whether a handle for `identity` is memorized.
    pub async fn is_loaded(&self, identity: &ModelIdentity) -> bool {
        matches!(self.slots.lock().await.get(identity), Some(Slot::Ready(_)))
    }

    /// Identities with a memorized handle.
    pub async fn loaded_identities(&self) -> Vec<ModelIdentity> {
        self.slots
            .lock()
            .await
            .iter()
            .filter_map(|(identity, slot)| match slot {
                Slot::Ready(_) => Some(identity.clone()),
                Slot::Loading(_) => None,
            })
            .collect()
    }
}
