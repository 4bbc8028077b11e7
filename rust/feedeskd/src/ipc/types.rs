use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use rusqlite::Connection;
use serde::Deserialize;
use tracing::info;

use crate::cache::{Mutation, QueryCache};
use crate::config::Config;
use crate::session::{AuthEvent, SessionStore, Subscription, SIGN_IN_ROUTE};

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub config: Config,
    pub session: SessionStore,
    pub cache: Rc<RefCell<QueryCache>>,
    _auth_listener: Subscription,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let session = SessionStore::new();
        let cache = Rc::new(RefCell::new(QueryCache::new()));

        // Nothing read under one actor may be served to the next.
        let listener_cache = Rc::clone(&cache);
        let auth_listener = session.subscribe(move |event| {
            if let AuthEvent::SignedOut = event {
                let evicted = listener_cache
                    .borrow_mut()
                    .invalidate(&Mutation::SessionEnded);
                info!(evicted, redirect = SIGN_IN_ROUTE, "session ended");
            }
        });

        Self {
            workspace: None,
            db: None,
            config,
            session,
            cache,
            _auth_listener: auth_listener,
        }
    }
}
