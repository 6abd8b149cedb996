//! Named, replayable command lists.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::command::Command;

/// Session-scoped macro registry shared by both surfaces.
///
/// Names are case-sensitive. Defining an existing name replaces its steps.
/// Bodies are stored as authored; nested macros resolve when performed.
#[derive(Debug, Clone, Default)]
pub struct MacroStore {
    inner: Arc<RwLock<HashMap<String, Vec<Command>>>>,
}

impl MacroStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `steps` under `name`, returning the body it replaced.
    pub fn define(&self, name: &str, steps: Vec<Command>) -> Option<Vec<Command>> {
        self.inner
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string(), steps)
    }

    pub fn get(&self, name: &str) -> Option<Vec<Command>> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(name)
    }

    /// Defined names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Layout;

    #[test]
    fn define_overwrites_and_returns_previous() {
        let store = MacroStore::new();
        assert!(store.define("A", vec![Command::ClearFilters]).is_none());
        let old = store.define("A", vec![Command::ResetView]);
        assert_eq!(old, Some(vec![Command::ClearFilters]));
        assert_eq!(store.get("A"), Some(vec![Command::ResetView]));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn names_are_case_sensitive() {
        let store = MacroStore::new();
        store.define(
            "Morning",
            vec![Command::ChangeLayout {
                layout: Layout::TwoByTwo,
            }],
        );
        assert!(store.contains("Morning"));
        assert!(!store.contains("morning"));
        assert!(store.get("MORNING").is_none());
    }

    #[test]
    fn clones_share_storage() {
        let store = MacroStore::new();
        let other = store.clone();
        other.define("b", Vec::new());
        store.define("a", Vec::new());
        assert_eq!(store.names(), vec!["a".to_string(), "b".to_string()]);
        assert!(!other.is_empty());
    }
}
