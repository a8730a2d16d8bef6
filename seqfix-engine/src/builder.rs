/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Engine assembly and the liveness ticker.
//!
//! [`EngineBuilder`] wires sessions, stores and the application callback
//! sink into an [`Engine`], whose tokio task ticks every registered
//! session's `next()` once per interval (one second by default). I/O wiring
//! (acceptor/initiator sockets) stays outside: connections hand parsed
//! messages to `Session::receive` and attach themselves as responders.

use crate::manager::SessionManager;
use seqfix_core::types::SessionId;
use seqfix_session::{
    Application, NoOpApplication, NonStopSchedule, Session, SessionConfig, SessionSchedule,
};
use seqfix_store::MessageStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::error;

/// Builder for assembling an engine.
pub struct EngineBuilder {
    application: Arc<dyn Application>,
    schedule: Arc<dyn SessionSchedule>,
    tick_interval: Duration,
    sessions: Vec<(SessionId, SessionConfig, Box<dyn MessageStore>)>,
}

impl EngineBuilder {
    /// Creates a builder with a no-op application, a non-stop schedule and
    /// a one second tick.
    #[must_use]
    pub fn new() -> Self {
        Self {
            application: Arc::new(NoOpApplication),
            schedule: Arc::new(NonStopSchedule),
            tick_interval: Duration::from_secs(1),
            sessions: Vec::new(),
        }
    }

    /// Sets the application callback sink shared by all sessions.
    #[must_use]
    pub fn with_application(mut self, application: Arc<dyn Application>) -> Self {
        self.application = application;
        self
    }

    /// Sets the schedule predicate shared by all sessions.
    #[must_use]
    pub fn with_schedule(mut self, schedule: Arc<dyn SessionSchedule>) -> Self {
        self.schedule = schedule;
        self
    }

    /// Sets the liveness tick interval.
    #[must_use]
    pub const fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Adds a session with its own store.
    #[must_use]
    pub fn add_session(
        mut self,
        session_id: SessionId,
        config: SessionConfig,
        store: Box<dyn MessageStore>,
    ) -> Self {
        self.sessions.push((session_id, config, store));
        self
    }

    /// Builds the engine, creating and registering every configured session.
    #[must_use]
    pub fn build(self) -> Engine {
        let manager = Arc::new(SessionManager::new());
        for (session_id, config, store) in self.sessions {
            let session = Session::new(
                session_id,
                config,
                store,
                Arc::clone(&self.application),
                Arc::clone(&self.schedule),
            );
            manager.register(Arc::new(session));
        }
        Engine {
            manager,
            tick_interval: self.tick_interval,
        }
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running collection of sessions plus their liveness driver.
pub struct Engine {
    manager: Arc<SessionManager>,
    tick_interval: Duration,
}

impl Engine {
    /// Returns the session registry.
    #[must_use]
    pub fn manager(&self) -> Arc<SessionManager> {
        Arc::clone(&self.manager)
    }

    /// Spawns the liveness ticker on the current tokio runtime. The task
    /// runs until aborted or until the runtime shuts down.
    pub fn spawn_ticker(&self) -> JoinHandle<()> {
        let manager = Arc::clone(&self.manager);
        let tick_interval = self.tick_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                for session in manager.sessions() {
                    if let Err(e) = session.next() {
                        error!(session_id = %session.session_id(), "timer task error: {e}");
                    }
                }
            }
        })
    }

    /// Stops all sessions and releases their resources.
    pub fn shutdown(&self) {
        self.manager.unregister_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seqfix_core::types::{CompId, FixVersion};
    use seqfix_session::Responder;
    use seqfix_store::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingResponder {
        sent: AtomicUsize,
    }

    impl Responder for CountingResponder {
        fn send(&self, _data: &[u8]) -> bool {
            self.sent.fetch_add(1, Ordering::SeqCst);
            true
        }

        fn disconnect(&self) {}
    }

    fn session_id() -> SessionId {
        SessionId::new(
            FixVersion::Fix44,
            CompId::new("INITIATOR").unwrap(),
            CompId::new("ACCEPTOR").unwrap(),
        )
    }

    #[test]
    fn test_builder_registers_sessions() {
        let engine = EngineBuilder::new()
            .add_session(
                session_id(),
                SessionConfig::acceptor(),
                Box::new(MemoryStore::new()),
            )
            .build();

        assert_eq!(engine.manager().len(), 1);
        assert!(engine.manager().contains(&session_id()));

        engine.shutdown();
        assert!(engine.manager().is_empty());
    }

    #[tokio::test]
    async fn test_ticker_initiates_logon() {
        let engine = EngineBuilder::new()
            .with_tick_interval(Duration::from_millis(10))
            .add_session(
                session_id(),
                SessionConfig::initiator(),
                Box::new(MemoryStore::new()),
            )
            .build();

        let session = engine.manager().lookup(&session_id()).unwrap();
        let responder = Arc::new(CountingResponder::default());
        session.set_responder(Some(responder.clone()));

        let ticker = engine.spawn_ticker();
        tokio::time::sleep(Duration::from_millis(60)).await;
        ticker.abort();

        // The ticker generated the initiator's Logon.
        assert!(responder.sent.load(Ordering::SeqCst) >= 1);
        assert!(session.sent_logon());
    }
}
