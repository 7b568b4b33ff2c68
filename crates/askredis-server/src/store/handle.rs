use std::sync::Arc;

use tokio::sync::RwLock;

use super::{LookupStore, StoreError};

enum State {
    Unprovisioned,
    Ready(Arc<dyn LookupStore>),
    Closed,
}

/// A module's exclusively owned store handle: unprovisioned until
/// [`install`](Self::install), closed after [`release`](Self::release).
pub struct StoreHandle {
    state: RwLock<State>,
}

impl Default for StoreHandle {
    fn default() -> Self {
        Self {
            state: RwLock::new(State::Unprovisioned),
        }
    }
}

impl StoreHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn install(&self, store: Arc<dyn LookupStore>) {
        *self.state.write().await = State::Ready(store);
    }

    pub async fn get(&self) -> Result<Arc<dyn LookupStore>, StoreError> {
        match &*self.state.read().await {
            State::Ready(store) => Ok(Arc::clone(store)),
            State::Unprovisioned => Err(StoreError::NotProvisioned),
            State::Closed => Err(StoreError::Closed),
        }
    }

    /// Drop the store. Returns false when there was nothing to release.
    pub async fn release(&self) -> bool {
        let mut state = self.state.write().await;
        let had_store = matches!(*state, State::Ready(_));
        *state = State::Closed;
        had_store
    }
}
