//! Auth context shared by every view.
//!
//! `AuthContext` is a distribution layer over the [`SessionStore`]: it
//! performs the login/logout transitions and synchronously notifies
//! subscribers of the resulting [`AuthState`]. Views hold a clone of the
//! context instead of reaching for global state.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, ThreadId};

use tracing::{debug, error, info, warn};

use crate::auth::{AuthState, PersistenceError, Session, SessionStore};

type Callback = dyn Fn(&AuthState) + Send + Sync;

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    entries: Vec<(u64, Arc<Callback>)>,
}

enum Transition {
    Login(Session),
    Logout,
    Invalidate(String),
}

struct Inner {
    store: SessionStore,
    subscribers: Mutex<Subscribers>,
    // Held for write-then-notify so observers never see transitions interleave
    transition: Mutex<()>,
    // Thread running the current transition, to recognise calls from subscribers
    owner: Mutex<Option<ThreadId>>,
    deferred: Mutex<VecDeque<Transition>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clears the transition owner even if a transition unwinds.
struct OwnerGuard<'a>(&'a Mutex<Option<ThreadId>>);

impl Drop for OwnerGuard<'_> {
    fn drop(&mut self) {
        *lock(self.0) = None;
    }
}

/// Cheaply cloneable handle to the session and its subscribers.
#[derive(Clone)]
pub struct AuthContext {
    inner: Arc<Inner>,
}

impl AuthContext {
    pub fn new(store: SessionStore) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                subscribers: Mutex::new(Subscribers::default()),
                transition: Mutex::new(()),
                owner: Mutex::new(None),
                deferred: Mutex::new(VecDeque::new()),
            }),
        }
    }

    pub fn session(&self) -> Option<Session> {
        self.inner.store.get()
    }

    /// Get the bearer token if a session is present
    pub fn token(&self) -> Option<String> {
        self.inner.store.token()
    }

    pub fn state(&self) -> AuthState {
        AuthState::from(self.inner.store.get())
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.store.is_present()
    }

    /// Register a callback invoked after every state transition.
    ///
    /// Callbacks run synchronously, in subscription order, on the thread
    /// performing the transition. A `login`, `logout` or `invalidate` issued
    /// from inside a callback is queued and applied once the current round
    /// of notifications has finished. The nested call returns at once with
    /// `Ok(())`, or `Ok(false)` from `invalidate`.
    #[must_use = "dropping the Subscription unsubscribes immediately"]
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&AuthState) + Send + Sync + 'static,
    {
        let mut subscribers = lock(&self.inner.subscribers);
        let id = subscribers.next_id;
        subscribers.next_id += 1;
        subscribers.entries.push((id, Arc::new(callback)));
        debug!(subscriber = id, total = subscribers.entries.len(), "Subscriber added");

        Subscription {
            id,
            context: Arc::downgrade(&self.inner),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner.subscribers).entries.len()
    }

    /// Store `session` and notify every subscriber before returning.
    ///
    /// A persistence failure is returned, but the session is live for this
    /// process and subscribers still observe it.
    pub fn login(&self, session: Session) -> Result<(), PersistenceError> {
        self.run(Transition::Login(session)).map(|_| ())
    }

    /// Clear the session and notify subscribers. Idempotent.
    pub fn logout(&self) -> Result<(), PersistenceError> {
        self.run(Transition::Logout).map(|_| ())
    }

    /// Log out only if the live session still carries `token`.
    ///
    /// Returns whether the session was cleared. A rejection that arrives
    /// for a token that has since been replaced leaves the newer session
    /// alone.
    pub fn invalidate(&self, token: &str) -> Result<bool, PersistenceError> {
        self.run(Transition::Invalidate(token.to_string()))
    }

    fn run(&self, transition: Transition) -> Result<bool, PersistenceError> {
        if *lock(&self.inner.owner) == Some(thread::current().id()) {
            debug!("Transition requested during notification, deferring");
            lock(&self.inner.deferred).push_back(transition);
            return Ok(false);
        }

        let _transition = lock(&self.inner.transition);
        *lock(&self.inner.owner) = Some(thread::current().id());
        let _owner = OwnerGuard(&self.inner.owner);

        let result = self.apply(transition);

        loop {
            let next = lock(&self.inner.deferred).pop_front();
            match next {
                Some(deferred) => {
                    if let Err(e) = self.apply(deferred) {
                        warn!(error = %e, "Deferred transition not persisted");
                    }
                }
                None => break,
            }
        }

        result
    }

    fn apply(&self, transition: Transition) -> Result<bool, PersistenceError> {
        match transition {
            Transition::Login(session) => {
                let result = self.inner.store.set(session.clone());
                if let Err(ref e) = result {
                    warn!(error = %e, "Session not persisted, it will not survive a restart");
                }
                info!(username = %session.username, "Logged in");

                self.notify(&AuthState::Authenticated(session));
                result.map(|()| true)
            }
            Transition::Logout => {
                let was_present = self.inner.store.is_present();
                let result = self.clear();

                if was_present {
                    info!("Logged out");
                    self.notify(&AuthState::Anonymous);
                }
                result.map(|()| was_present)
            }
            Transition::Invalidate(token) => {
                if self.inner.store.token().as_deref() != Some(token.as_str()) {
                    debug!("Ignoring rejection for a token that is no longer live");
                    return Ok(false);
                }

                let result = self.clear();
                info!("Session invalidated by server");

                self.notify(&AuthState::Anonymous);
                result.map(|()| true)
            }
        }
    }

    fn clear(&self) -> Result<(), PersistenceError> {
        let result = self.inner.store.clear();
        if let Err(ref e) = result {
            warn!(error = %e, "Failed to remove persisted session");
        }
        result
    }

    fn notify(&self, state: &AuthState) {
        let callbacks: Vec<(u64, Arc<Callback>)> = lock(&self.inner.subscribers).entries.clone();

        for (id, callback) in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(state))).is_err() {
                error!(subscriber = id, "Subscriber panicked during notification");
            }
        }
    }
}

impl std::fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthContext")
            .field("authenticated", &self.is_authenticated())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Handle returned by [`AuthContext::subscribe`]; unsubscribes on drop.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    context: Weak<Inner>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        // Drop does the work
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.context.upgrade() {
            let mut subscribers = lock(&inner.subscribers);
            subscribers.entries.retain(|(id, _)| *id != self.id);
            debug!(subscriber = self.id, "Subscriber removed");
        }
    }
}
