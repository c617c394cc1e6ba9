//! Lazily initialised, reusable resources.
//!
//! Decoders and codec engines are expensive to create, so a
//! [`SharedResource`] holds one instance for as long as the holder lives and
//! hands out [`Arc`] clones. Initialisation is single-flight: concurrent
//! callers wait on an async mutex while the first one runs the initialiser.
//! A failed initialisation is remembered, and every later caller receives
//! the same failure without retrying.
//!
//! Holders are plain values. Put one behind an `Arc` and pass it to every
//! component that needs the resource.

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicU8, Ordering},
    },
};

use tokio::sync::Mutex;

/// Lifecycle of a [`SharedResource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    /// Nothing has asked for the resource yet.
    Uninitialized,
    /// An initialiser is running.
    Loading,
    /// The resource was created and is being reused.
    Ready,
    /// Initialisation failed; the failure is permanent.
    Failed,
}

impl ResourceState {
    fn to_u8(self) -> u8 {
        match self {
            ResourceState::Uninitialized => 0,
            ResourceState::Loading => 1,
            ResourceState::Ready => 2,
            ResourceState::Failed => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => ResourceState::Loading,
            2 => ResourceState::Ready,
            3 => ResourceState::Failed,
            _ => ResourceState::Uninitialized,
        }
    }
}

enum Slot<T: ?Sized> {
    Empty,
    Ready(Arc<T>),
    Failed(String),
}

/// A lazily created resource shared by every holder of the same `Arc`.
pub struct SharedResource<T: ?Sized> {
    label: &'static str,
    slot: Mutex<Slot<T>>,
    state: AtomicU8,
}

impl<T: ?Sized> SharedResource<T> {
    /// Create an empty holder. `label` names the resource in log output.
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            slot: Mutex::new(Slot::Empty),
            state: AtomicU8::new(ResourceState::Uninitialized.to_u8()),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ResourceState {
        ResourceState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Return the resource, creating it with `init` on first use.
    ///
    /// # Errors
    ///
    /// Returns the initialiser's failure reason, now or from an earlier
    /// failed attempt.
    pub async fn get_or_try_init<F, Fut>(&self, init: F) -> Result<Arc<T>, String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<T>, String>>,
    {
        self.get_or_try_init_if(|_| true, init).await
    }

    /// Like [`get_or_try_init`](SharedResource::get_or_try_init), but a
    /// ready resource for which `is_usable` returns `false` is replaced by a
    /// fresh one.
    pub async fn get_or_try_init_if<U, F, Fut>(
        &self,
        is_usable: U,
        init: F,
    ) -> Result<Arc<T>, String>
    where
        U: Fn(&T) -> bool,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<T>, String>>,
    {
        let mut slot = self.slot.lock().await;
        match &*slot {
            Slot::Ready(value) if is_usable(&**value) => return Ok(Arc::clone(value)),
            Slot::Ready(_) => log::debug!("{} is no longer usable; recreating it", self.label),
            Slot::Failed(reason) => return Err(reason.clone()),
            Slot::Empty => log::debug!("Initialising {}", self.label),
        }

        self.set_state(ResourceState::Loading);
        match init().await {
            Ok(value) => {
                *slot = Slot::Ready(Arc::clone(&value));
                self.set_state(ResourceState::Ready);
                Ok(value)
            }
            Err(reason) => {
                log::warn!("Failed to initialise {}: {}", self.label, reason);
                *slot = Slot::Failed(reason.clone());
                self.set_state(ResourceState::Failed);
                Err(reason)
            }
        }
    }

    fn set_state(&self, state: ResourceState) {
        self.state.store(state.to_u8(), Ordering::Release);
    }
}

impl<T: ?Sized> std::fmt::Debug for SharedResource<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedResource")
            .field("label", &self.label)
            .field("state", &self.state())
            .finish()
    }
}
