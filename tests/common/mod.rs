use std::collections::HashMap;
use std::hash::Hash;

use async_trait::async_trait;
use recency::{Store, StoreError};

/// Which store operation a [`ScriptedStore`] performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Set,
    Get,
    Del,
}

/// In-memory store that records every call and can be scripted to fail
/// per operation kind.
pub struct ScriptedStore<K, V> {
    table: HashMap<K, V>,
    pub fail_set: bool,
    pub fail_get: bool,
    pub fail_del: bool,
    pub log: Vec<(Op, K)>,
}

impl<K, V> ScriptedStore<K, V> {
    pub fn new() -> Self {
        ScriptedStore {
            table: HashMap::new(),
            fail_set: false,
            fail_get: false,
            fail_del: false,
            log: Vec::new(),
        }
    }

    pub fn contains(&self, key: &K) -> bool
    where
        K: Hash + Eq,
    {
        self.table.contains_key(key)
    }

    pub fn ops(&self) -> Vec<Op> {
        self.log.iter().map(|(op, _)| *op).collect()
    }
}

#[async_trait]
impl<K, V> Store for ScriptedStore<K, V>
where
    K: Hash + Eq + Clone + Send + Sync,
    V: Clone + Send,
{
    type Key = K;
    type Value = V;
    type Error = StoreError;

    async fn set(&mut self, key: &K, value: V) -> Result<(), StoreError> {
        self.log.push((Op::Set, key.clone()));
        if self.fail_set {
            return Err(StoreError::new("scripted set failure"));
        }
        self.table.insert(key.clone(), value);
        Ok(())
    }

    async fn get(&mut self, key: &K) -> Result<Option<V>, StoreError> {
        self.log.push((Op::Get, key.clone()));
        if self.fail_get {
            return Err(StoreError::new("scripted get failure"));
        }
        Ok(self.table.get(key).cloned())
    }

    async fn del(&mut self, key: &K) -> Result<(), StoreError> {
        self.log.push((Op::Del, key.clone()));
        if self.fail_del {
            return Err(StoreError::new("scripted del failure"));
        }
        self.table.remove(key);
        Ok(())
    }
}
