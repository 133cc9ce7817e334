//! Variable scopes (spec §3 `VariableScope`, §5 concurrency notes).
//!
//! Global scope is a concurrent map shared process-wide; thread scope is
//! thread-local with no locking; query scope lives in a per-invocation
//! value that the caller owns and is never shared across threads (spec §9
//! explicitly redesigns away from a thread-local *current-context stack*
//! towards explicit propagation — only the `thread` scope itself stays
//! thread-local, by its own definition).

use crate::error::{Error, Result};
use dashmap::DashMap;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeName {
    Global,
    Thread,
    Query,
}

/// Process-wide variable map (spec: "Global scope is a concurrent map").
#[derive(Clone, Default)]
pub struct GlobalScope(Arc<DashMap<String, String>>);

impl GlobalScope {
    pub fn new() -> Self {
        GlobalScope(Arc::new(DashMap::new()))
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.0.get(name).map(|v| v.clone())
    }

    pub fn set(&self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }
}

thread_local! {
    static THREAD_SCOPE: RefCell<HashMap<String, String>> = RefCell::new(HashMap::new());
}

/// Per-OS-thread variable map, not locked (spec: "no locking").
pub struct ThreadScope;

impl ThreadScope {
    pub fn get(name: &str) -> Option<String> {
        THREAD_SCOPE.with(|s| s.borrow().get(name).cloned())
    }

    pub fn set(name: impl Into<String>, value: impl Into<String>) {
        THREAD_SCOPE.with(|s| {
            s.borrow_mut().insert(name.into(), value.into());
        });
    }
}

/// Per-outermost-invocation variable map. Owned by the caller of `parse`/
/// `execute`; never shared across threads (spec: "lives in a per-invocation
/// stack, not shared across threads").
#[derive(Debug, Clone, Default)]
pub struct QueryScope(HashMap<String, String>);

impl QueryScope {
    pub fn new() -> Self {
        QueryScope(HashMap::new())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(|s| s.as_str())
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }
}

/// The three-scope chain, bundled so resolvers can walk it without
/// threading three separate arguments everywhere.
#[derive(Clone)]
pub struct Scopes {
    pub global: GlobalScope,
}

impl Default for Scopes {
    fn default() -> Self {
        Scopes { global: GlobalScope::new() }
    }
}

impl Scopes {
    pub fn new(global: GlobalScope) -> Self {
        Scopes { global }
    }

    /// Lookup order: `query -> thread -> global` (spec §3).
    pub fn lookup(&self, name: &str, query: Option<&QueryScope>) -> Option<String> {
        if let Some(q) = query {
            if let Some(v) = q.get(name) {
                return Some(v.to_string());
            }
        }
        if let Some(v) = ThreadScope::get(name) {
            return Some(v);
        }
        self.global.get(name)
    }

    /// Write to the named scope. Writing to `Query` outside an active
    /// invocation (i.e. when no `query` scope is supplied) is an error
    /// (spec §3).
    pub fn write(
        &self,
        scope: ScopeName,
        name: impl Into<String>,
        value: impl Into<String>,
        query: Option<&mut QueryScope>,
    ) -> Result<()> {
        match scope {
            ScopeName::Global => {
                self.global.set(name, value);
                Ok(())
            }
            ScopeName::Thread => {
                ThreadScope::set(name, value);
                Ok(())
            }
            ScopeName::Query => match query {
                Some(q) => {
                    q.set(name, value);
                    Ok(())
                }
                None => Err(Error::InvalidState(
                    "cannot write to query scope outside an active invocation".into(),
                )),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_order_prefers_query_then_thread_then_global() {
        let scopes = Scopes::new(GlobalScope::new());
        scopes.global.set("x", "global");
        assert_eq!(scopes.lookup("x", None), Some("global".into()));

        ThreadScope::set("x", "thread");
        assert_eq!(scopes.lookup("x", None), Some("thread".into()));

        let mut q = QueryScope::new();
        q.set("x", "query");
        assert_eq!(scopes.lookup("x", Some(&q)), Some("query".into()));

        // cleanup thread-local so other tests in this thread aren't polluted
        THREAD_SCOPE.with(|s| s.borrow_mut().remove("x"));
    }

    #[test]
    fn writing_query_scope_without_invocation_is_an_error() {
        let scopes = Scopes::new(GlobalScope::new());
        let err = scopes.write(ScopeName::Query, "x", "1", None);
        assert!(err.is_err());
    }
}
