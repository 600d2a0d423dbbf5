//! Location abstraction
//!
//! The sync manager talks to the browser (or any host) through
//! [`LocationService`]. [`MemoryLocation`] keeps the current query and a
//! history stack in memory, for tests and headless hosts.

use crate::error::LocationError;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use scene_graph::{Subscription, UrlState, UrlValue};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use url::form_urlencoded;

/// Query parameters in order of first appearance; repeated keys keep every
/// value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlQuery {
    params: IndexMap<String, Vec<String>>,
}

impl UrlQuery {
    /// Empty query
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `a=1&b=2&b=3`; a leading `?` is ignored
    #[must_use]
    pub fn parse(query: &str) -> Self {
        let mut params: IndexMap<String, Vec<String>> = IndexMap::new();
        for (key, value) in form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
            params.entry(key.into_owned()).or_default().push(value.into_owned());
        }
        Self { params }
    }

    /// Encoded query string without the leading `?`
    #[must_use]
    pub fn to_query_string(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, values) in &self.params {
            for value in values {
                serializer.append_pair(key, value);
            }
        }
        serializer.finish()
    }

    /// Values of `key`
    #[must_use]
    pub fn get(&self, key: &str) -> UrlValue {
        self.params
            .get(key)
            .map_or(UrlValue::Null, |values| UrlValue::from_values(values.clone()))
    }

    /// Whether `key` is present
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    /// Set `key`; [`UrlValue::Null`] removes it
    pub fn set(&mut self, key: impl Into<String>, value: &UrlValue) {
        let key = key.into();
        match value {
            UrlValue::Null => {
                self.params.shift_remove(&key);
            }
            other => {
                self.params.insert(key, other.values());
            }
        }
    }

    /// Apply every entry of `updates`
    pub fn apply(&mut self, updates: &UrlState) {
        for (key, value) in updates {
            self.set(key.clone(), value);
        }
    }

    /// Keys present
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }

    /// Whether no parameter is present
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl fmt::Display for UrlQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query_string())
    }
}

/// Called with the new query after every location change
pub type LocationListener = Arc<dyn Fn(&UrlQuery) + Send + Sync>;

/// Host location as seen by the sync manager
pub trait LocationService: Send + Sync {
    /// Current query parameters
    fn query(&self) -> UrlQuery;

    /// Merge `updates` into the query; `replace` rewrites the current history
    /// entry instead of pushing a new one
    fn partial(&self, updates: &UrlState, replace: bool);

    /// Observe location changes
    fn subscribe(&self, listener: LocationListener) -> Subscription;
}

struct ListenerEntry {
    id: u64,
    listener: LocationListener,
    closed: Arc<AtomicBool>,
}

#[derive(Default)]
struct MemoryInner {
    path: String,
    history: RwLock<Vec<UrlQuery>>,
    next_id: AtomicU64,
    listeners: Mutex<Vec<ListenerEntry>>,
}

/// In-memory location with a history stack
#[derive(Clone)]
pub struct MemoryLocation {
    inner: Arc<MemoryInner>,
}

impl MemoryLocation {
    /// Location at `/` with an empty query
    #[must_use]
    pub fn new() -> Self {
        Self::with_query("/", UrlQuery::new())
    }

    /// Location at `path` with `query`
    #[must_use]
    pub fn with_query(path: impl Into<String>, query: UrlQuery) -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                path: path.into(),
                history: RwLock::new(vec![query]),
                ..MemoryInner::default()
            }),
        }
    }

    /// Location from an absolute URL
    ///
    /// # Errors
    /// Returns [`LocationError::InvalidUrl`] if `url` does not parse
    pub fn from_url(url: &str) -> Result<Self, LocationError> {
        let parsed = url::Url::parse(url)?;
        Ok(Self::with_query(
            parsed.path(),
            UrlQuery::parse(parsed.query().unwrap_or_default()),
        ))
    }

    /// Path and query, e.g. `/d/abc?from=now-1h`
    #[must_use]
    pub fn href(&self) -> String {
        let query = self.query();
        if query.is_empty() {
            self.inner.path.clone()
        } else {
            format!("{}?{}", self.inner.path, query)
        }
    }

    /// Navigate to a new query, as a user or another component would
    pub fn push(&self, query: UrlQuery) {
        self.inner.history.write().push(query.clone());
        self.notify(&query);
    }

    /// Number of history entries
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.inner.history.read().len()
    }

    fn notify(&self, query: &UrlQuery) {
        let listeners: Vec<(LocationListener, Arc<AtomicBool>)> = self
            .inner
            .listeners
            .lock()
            .iter()
            .map(|entry| (Arc::clone(&entry.listener), Arc::clone(&entry.closed)))
            .collect();
        for (listener, closed) in listeners {
            if !closed.load(Ordering::Acquire) {
                listener(query);
            }
        }
    }
}

impl Default for MemoryLocation {
    fn default() -> Self {
        Self::new()
    }
}

impl LocationService for MemoryLocation {
    fn query(&self) -> UrlQuery {
        self.inner.history.read().last().cloned().unwrap_or_default()
    }

    fn partial(&self, updates: &UrlState, replace: bool) {
        let query = {
            let mut history = self.inner.history.write();
            let mut query = history.last().cloned().unwrap_or_default();
            query.apply(updates);
            if replace && !history.is_empty() {
                let last = history.len() - 1;
                history[last] = query.clone();
            } else {
                history.push(query.clone());
            }
            query
        };
        tracing::trace!(query = %query, replace, "location updated");
        self.notify(&query);
    }

    fn subscribe(&self, listener: LocationListener) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let closed = Arc::new(AtomicBool::new(false));
        self.inner.listeners.lock().push(ListenerEntry {
            id,
            listener,
            closed: Arc::clone(&closed),
        });

        let weak = Arc::downgrade(&self.inner);
        Subscription::new(closed, move || {
            if let Some(inner) = weak.upgrade() {
                let removed = {
                    let mut listeners = inner.listeners.lock();
                    listeners
                        .iter()
                        .position(|entry| entry.id == id)
                        .map(|index| listeners.remove(index))
                };
                drop(removed);
            }
        })
    }
}

impl fmt::Debug for MemoryLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryLocation")
            .field("href", &self.href())
            .field("history", &self.history_len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_repeated_keys() {
        let query = UrlQuery::parse("?from=now-1h&var-host=a&var-host=b");
        assert_eq!(query.get("from"), UrlValue::from("now-1h"));
        assert_eq!(
            query.get("var-host"),
            UrlValue::Multi(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(query.get("missing"), UrlValue::Null);
        assert_eq!(query.to_query_string(), "from=now-1h&var-host=a&var-host=b");
    }

    #[test]
    fn encodes_special_characters() {
        let mut query = UrlQuery::new();
        query.set("q", &UrlValue::from("a b&c"));
        assert_eq!(query.to_query_string(), "q=a+b%26c");
        assert_eq!(UrlQuery::parse(&query.to_query_string()), query);
    }

    #[test]
    fn null_removes_key() {
        let mut query = UrlQuery::parse("a=1&b=2");
        query.set("a", &UrlValue::Null);
        assert_eq!(query.to_query_string(), "b=2");
    }

    #[test]
    fn replace_keeps_history_length() {
        let location = MemoryLocation::from_url("http://localhost/d/abc?from=now-1h").unwrap();
        let mut updates = UrlState::new();
        updates.insert("to".into(), UrlValue::from("now"));

        location.partial(&updates, true);
        assert_eq!(location.history_len(), 1);
        location.partial(&updates, false);
        assert_eq!(location.history_len(), 2);
        assert_eq!(location.href(), "/d/abc?from=now-1h&to=now");
    }

    #[test]
    fn listeners_stop_after_unsubscribe() {
        let location = MemoryLocation::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let mut sub = location.subscribe(Arc::new(move |query: &UrlQuery| {
            s.lock().push(query.to_query_string());
        }));

        location.push(UrlQuery::parse("a=1"));
        sub.unsubscribe();
        location.push(UrlQuery::parse("a=2"));
        assert_eq!(*seen.lock(), vec!["a=1".to_string()]);
    }

    #[test]
    fn invalid_url_is_rejected() {
        assert!(matches!(
            MemoryLocation::from_url("not a url"),
            Err(LocationError::InvalidUrl(_))
        ));
    }
}
