//! Memoized dashboard queries and the writes that make them stale.
//!
//! Every cached result is keyed by a [`QueryKey`]. A write is described by a
//! [`Mutation`], and [`Mutation::invalidates`] is the single table that says
//! which keys a write makes stale. Cached values are only ever evicted here;
//! aggregates are recomputed from fresh rows on the next miss.

use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    StudentList { search: String },
    StudentDetail { student_id: String },
    DashboardStats,
    ClassSummary,
}

impl QueryKey {
    pub fn name(&self) -> &'static str {
        match self {
            Self::StudentList { .. } => "students",
            Self::StudentDetail { .. } => "student",
            Self::DashboardStats => "dashboard-stats",
            Self::ClassSummary => "class-summary",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    StudentAdded,
    PaymentRecorded { student_id: String },
    StudentStatusChanged { student_id: String },
    SessionEnded,
}

impl Mutation {
    pub fn invalidates(&self, key: &QueryKey) -> bool {
        match (self, key) {
            (Self::SessionEnded, _) => true,
            (_, QueryKey::StudentList { .. })
            | (_, QueryKey::DashboardStats)
            | (_, QueryKey::ClassSummary) => true,
            (Self::StudentAdded, QueryKey::StudentDetail { .. }) => false,
            (
                Self::PaymentRecorded { student_id } | Self::StudentStatusChanged { student_id },
                QueryKey::StudentDetail { student_id: key_id },
            ) => student_id == key_id,
        }
    }
}

#[derive(Debug, Default)]
pub struct QueryCache {
    entries: HashMap<QueryKey, serde_json::Value>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached value for `key`, running `load` on a miss.
    /// Failed loads are not cached.
    pub fn get_or_load<E, F>(&mut self, key: QueryKey, load: F) -> Result<serde_json::Value, E>
    where
        F: FnOnce() -> Result<serde_json::Value, E>,
    {
        if let Some(hit) = self.entries.get(&key) {
            debug!(query = key.name(), "cache hit");
            return Ok(hit.clone());
        }
        let value = load()?;
        debug!(query = key.name(), "cache fill");
        self.entries.insert(key, value.clone());
        Ok(value)
    }

    /// Evicts every entry the mutation makes stale. Returns the eviction count.
    pub fn invalidate(&mut self, mutation: &Mutation) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !mutation.invalidates(key));
        let evicted = before - self.entries.len();
        debug!(?mutation, evicted, "cache invalidated");
        evicted
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn list(search: &str) -> QueryKey {
        QueryKey::StudentList {
            search: search.to_string(),
        }
    }

    fn detail(id: &str) -> QueryKey {
        QueryKey::StudentDetail {
            student_id: id.to_string(),
        }
    }

    fn filled() -> QueryCache {
        let mut cache = QueryCache::new();
        for key in [
            list(""),
            list("ann"),
            detail("s1"),
            detail("s2"),
            QueryKey::DashboardStats,
            QueryKey::ClassSummary,
        ] {
            cache
                .get_or_load::<(), _>(key, || Ok(json!(1)))
                .expect("load");
        }
        cache
    }

    #[test]
    fn payment_invalidates_lists_aggregates_and_only_its_own_detail() {
        let mut cache = filled();
        let evicted = cache.invalidate(&Mutation::PaymentRecorded {
            student_id: "s1".into(),
        });
        assert_eq!(evicted, 5);
        assert!(cache.contains(&detail("s2")));
        assert!(!cache.contains(&detail("s1")));
        assert!(!cache.contains(&list("ann")));
        assert!(!cache.contains(&QueryKey::DashboardStats));
        assert!(!cache.contains(&QueryKey::ClassSummary));
    }

    #[test]
    fn student_added_leaves_every_detail_cached() {
        let mut cache = filled();
        assert_eq!(cache.invalidate(&Mutation::StudentAdded), 4);
        assert!(cache.contains(&detail("s1")));
        assert!(cache.contains(&detail("s2")));
    }

    #[test]
    fn status_change_behaves_like_payment_for_its_student() {
        let mut cache = filled();
        cache.invalidate(&Mutation::StudentStatusChanged {
            student_id: "s2".into(),
        });
        assert!(cache.contains(&detail("s1")));
        assert!(!cache.contains(&detail("s2")));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn session_end_drops_everything() {
        let mut cache = filled();
        assert_eq!(cache.invalidate(&Mutation::SessionEnded), 6);
        assert!(cache.is_empty());
    }

    #[test]
    fn hits_skip_the_loader_and_failures_are_not_cached() {
        let mut cache = QueryCache::new();
        let first = cache
            .get_or_load::<(), _>(QueryKey::ClassSummary, || Ok(json!([1])))
            .expect("load");
        let second = cache
            .get_or_load::<(), _>(QueryKey::ClassSummary, || panic!("loader must not run"))
            .expect("hit");
        assert_eq!(first, second);

        let failed = cache.get_or_load(QueryKey::DashboardStats, || Err("db down"));
        assert_eq!(failed, Err("db down"));
        assert!(!cache.contains(&QueryKey::DashboardStats));
    }
}
