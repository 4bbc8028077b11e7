//! Signed-in actor identity, passed explicitly to every write.
//!
//! The hosting platform owns authentication; this process only learns who is
//! signed in and tells interested parties when that changes.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use tracing::info;

use crate::error::AppError;

/// Where the dashboard sends a user without a session.
pub const SIGN_IN_ROUTE: &str = "/auth";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub actor_id: String,
    pub email: Option<String>,
    pub started_at: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    SignedIn(Session),
    SignedOut,
}

type Listener = Box<dyn Fn(&AuthEvent)>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(u64, Listener)>,
}

/// Handle for a registered listener. Dropping it unregisters the listener.
#[must_use = "dropping a Subscription unregisters its listener"]
pub struct Subscription {
    id: u64,
    registry: Weak<RefCell<Registry>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry
                .borrow_mut()
                .listeners
                .retain(|(id, _)| *id != self.id);
        }
    }
}

#[derive(Default)]
pub struct SessionStore {
    current: Option<Session>,
    registry: Rc<RefCell<Registry>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an auth-state listener. Listeners must not subscribe or
    /// drop subscriptions from inside the callback.
    pub fn subscribe(&self, listener: impl Fn(&AuthEvent) + 'static) -> Subscription {
        let mut registry = self.registry.borrow_mut();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.push((id, Box::new(listener)));
        Subscription {
            id,
            registry: Rc::downgrade(&self.registry),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.registry.borrow().listeners.len()
    }

    pub fn sign_in(&mut self, actor_id: &str, email: Option<&str>) -> Result<Session, AppError> {
        let actor_id = actor_id.trim();
        if actor_id.is_empty() {
            return Err(AppError::auth("actor identity must not be empty"));
        }
        let session = Session {
            actor_id: actor_id.to_string(),
            email: email
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(str::to_string),
            started_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        };
        // Switching actors ends the previous session first.
        if let Some(previous) = self.current.take() {
            if previous.actor_id != session.actor_id {
                info!(actor = %previous.actor_id, "signed out");
                self.emit(&AuthEvent::SignedOut);
            }
        }
        info!(actor = %session.actor_id, "signed in");
        self.current = Some(session.clone());
        self.emit(&AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    /// Ends the current session. Returns false when nobody was signed in.
    pub fn sign_out(&mut self) -> bool {
        let Some(session) = self.current.take() else {
            return false;
        };
        info!(actor = %session.actor_id, "signed out");
        self.emit(&AuthEvent::SignedOut);
        true
    }

    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    pub fn require(&self, message: &str) -> Result<&Session, AppError> {
        self.current.as_ref().ok_or_else(|| AppError::auth(message))
    }

    fn emit(&self, event: &AuthEvent) {
        let registry = self.registry.borrow();
        for (_, listener) in &registry.listeners {
            listener(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn listeners_see_sign_in_and_sign_out() {
        let mut store = SessionStore::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let _sub = store.subscribe(move |ev| sink.borrow_mut().push(ev.clone()));

        let session = store.sign_in("user-1", Some(" a@b.org ")).expect("sign in");
        assert_eq!(session.email.as_deref(), Some("a@b.org"));
        assert!(store.sign_out());
        assert!(!store.sign_out(), "second sign out is a no-op");

        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert!(matches!(seen[0], AuthEvent::SignedIn(_)));
        assert_eq!(seen[1], AuthEvent::SignedOut);
    }

    #[test]
    fn switching_actor_ends_the_previous_session() {
        let mut store = SessionStore::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let _sub = store.subscribe(move |ev| sink.borrow_mut().push(ev.clone()));

        store.sign_in("user-1", None).expect("first");
        store.sign_in("user-1", None).expect("same actor again");
        store.sign_in("user-2", None).expect("other actor");

        let seen = seen.borrow();
        let kinds: Vec<bool> = seen
            .iter()
            .map(|ev| matches!(ev, AuthEvent::SignedOut))
            .collect();
        assert_eq!(kinds, vec![false, false, true, false]);
        assert_eq!(store.current().map(|s| s.actor_id.as_str()), Some("user-2"));
    }

    #[test]
    fn dropping_the_subscription_tears_the_listener_down() {
        let mut store = SessionStore::new();
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let sub = store.subscribe(move |_| counter.set(counter.get() + 1));
        assert_eq!(store.listener_count(), 1);

        store.sign_in("user-1", None).expect("sign in");
        drop(sub);
        assert_eq!(store.listener_count(), 0);
        store.sign_out();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn blank_actor_is_rejected_and_require_reports_auth() {
        let mut store = SessionStore::new();
        assert!(matches!(store.sign_in("  ", None), Err(AppError::Auth(_))));
        let err = store.require("sign in first").expect_err("no session");
        assert_eq!(err.code(), "auth_required");
        assert_eq!(err.to_string(), "sign in first");
    }
}
