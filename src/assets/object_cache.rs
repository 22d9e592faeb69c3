use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use log::trace;

use crate::assets::error::AssetError;
use crate::assets::resource::{ResourceKind, ResourceResult};
use crate::rendering::gpu::GpuDevice;

pub type ResourceFuture = Shared<BoxFuture<'static, ResourceResult>>;

/// Memoizes resource loads of one container. The load future is stored before anyone awaits it,
/// so concurrent requests for the same object all end up awaiting the same build.
pub struct ObjectCache {
    name: String,
    entries: DashMap<(ResourceKind, i64), ResourceFuture>,
    destroyed: AtomicBool,
}

impl ObjectCache {
    pub fn new(name: impl Into<String>) -> Self {
        ObjectCache {
            name: name.into(),
            entries: DashMap::new(),
            destroyed: AtomicBool::new(false),
        }
    }

    /// Returns the memoized result for `(kind, path_id)`, starting `load` if there is none yet.
    /// A failed load stays failed, later calls get the same error.
    pub async fn get_or_load<F>(&self, kind: ResourceKind, path_id: i64, load: F) -> ResourceResult
    where
        F: FnOnce() -> BoxFuture<'static, ResourceResult>,
    {
        if self.is_destroyed() {
            return Err(AssetError::Destroyed(self.name.clone()));
        }

        let future = self
            .entries
            .entry((kind, path_id))
            .or_insert_with(|| {
                trace!("{}: loading {:?} {}", self.name, kind, path_id);
                load().shared()
            })
            .value()
            .clone();
        future.await
    }

    /// The result of a finished load, without waiting for pending ones.
    pub fn peek(&self, kind: ResourceKind, path_id: i64) -> Option<ResourceResult> {
        self.entries
            .get(&(kind, path_id))
            .and_then(|entry| entry.value().peek().cloned())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Frees the GPU objects of every resolved entry and refuses further loads. Pending loads
    /// finish on their own, their results are never handed out by this cache again.
    pub fn destroy(&self, device: &dyn GpuDevice) {
        self.destroyed.store(true, Ordering::SeqCst);
        let mut released = 0;
        for entry in self.entries.iter() {
            if let Some(Ok(Some(resource))) = entry.value().peek() {
                resource.release(device);
                released += 1;
            }
        }
        self.entries.clear();
        trace!("{}: released {} resources", self.name, released);
    }
}
