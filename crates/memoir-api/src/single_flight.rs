//! Coalesce concurrent calls into one in-flight future

use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use tokio::sync::Mutex;

/// At most one call runs at a time; callers arriving meanwhile share its result
pub struct SingleFlight<T: Clone> {
    slot: Mutex<Option<Shared<BoxFuture<'static, T>>>>,
}

impl<T: Clone + Send + Sync + 'static> SingleFlight<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Join the in-flight call, or start one with `make`
    pub async fn run<F, Fut>(&self, make: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let flight = {
            let mut slot = self.slot.lock().await;
            match slot.as_ref() {
                Some(flight) => flight.clone(),
                None => {
                    let flight = make().boxed().shared();
                    *slot = Some(flight.clone());
                    flight
                }
            }
        };

        let output = flight.clone().await;

        // Whoever finishes first empties the slot, unless a newer flight took it
        let mut slot = self.slot.lock().await;
        if slot
            .as_ref()
            .is_some_and(|current| Shared::ptr_eq(current, &flight))
        {
            *slot = None;
        }

        output
    }
}

impl<T: Clone + Send + Sync + 'static> Default for SingleFlight<T> {
    fn default() -> Self {
        Self::new()
    }
}
