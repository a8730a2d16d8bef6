/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Session state change notifications.
//!
//! Observers register a [`SessionStateListener`] with a session and are
//! invoked in registration order. All methods default to no-ops so listeners
//! implement only the transitions they care about.

use parking_lot::Mutex;
use std::sync::Arc;

/// Observer of session state transitions.
pub trait SessionStateListener: Send + Sync {
    /// A responder was attached.
    fn on_connect(&self) {}

    /// The responder was detached.
    fn on_disconnect(&self) {}

    /// The logon handshake completed.
    fn on_logon(&self) {}

    /// The session logged out.
    fn on_logout(&self) {}

    /// Sequence numbers were reset.
    fn on_reset(&self) {}

    /// State was refreshed from the message store.
    fn on_refresh(&self) {}

    /// The peer missed a heartbeat; a test request was sent.
    fn on_missed_heartbeat(&self) {}

    /// The peer stayed silent past the heartbeat timeout.
    fn on_heartbeat_timeout(&self) {}
}

/// Ordered collection of state listeners.
#[derive(Default)]
pub struct Listeners {
    inner: Mutex<Vec<Arc<dyn SessionStateListener>>>,
}

impl Listeners {
    /// Creates an empty listener collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener. Listeners are invoked in registration order.
    pub fn add(&self, listener: Arc<dyn SessionStateListener>) {
        self.inner.lock().push(listener);
    }

    /// Removes a previously registered listener.
    pub fn remove(&self, listener: &Arc<dyn SessionStateListener>) {
        self.inner
            .lock()
            .retain(|existing| !Arc::ptr_eq(existing, listener));
    }

    /// Invokes `f` on every listener in registration order.
    pub fn notify(&self, f: impl Fn(&dyn SessionStateListener)) {
        let listeners = self.inner.lock().clone();
        for listener in &listeners {
            f(listener.as_ref());
        }
    }

    /// Returns the number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Returns true if no listeners are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners").field("len", &self.len()).finish()
    }
}
