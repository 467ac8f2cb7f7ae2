//! Evaluation cache keyed by (canonical FEN, breadth).
//!
//! Eviction is FIFO: insertion order is the only order tracked, reads do
//! not refresh an entry.

use std::collections::{HashMap, VecDeque};

use crate::analysis::{Analysis, MoveVerdict};

pub const DEFAULT_CACHE_CAPACITY: usize = 300;

/// `(fen, multipv)`。breadth を含めることでヒントとレビュー解析が衝突しない。
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub fen: String,
    pub breadth: u32,
}

impl CacheKey {
    pub fn new(fen: impl Into<String>, breadth: u32) -> Self {
        Self {
            fen: fen.into(),
            breadth,
        }
    }
}

/// Cached result for one position: the analysis and, when it was computed,
/// the verdict on the move that led there.
#[derive(Clone, Debug, PartialEq)]
pub struct CachedEval {
    pub analysis: Analysis,
    pub verdict: Option<MoveVerdict>,
}

impl From<Analysis> for CachedEval {
    fn from(analysis: Analysis) -> Self {
        Self {
            analysis,
            verdict: None,
        }
    }
}

#[derive(Debug)]
pub struct EvalCache {
    entries: HashMap<CacheKey, CachedEval>,
    order: VecDeque<CacheKey>,
    capacity: usize,
}

impl Default for EvalCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl EvalCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, fen: &str, breadth: u32) -> Option<&CachedEval> {
        self.entries.get(&CacheKey::new(fen, breadth))
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert or refresh an entry, evicting the oldest insertion when over
    /// capacity. Returns the evicted key, if any.
    pub fn put(&mut self, key: CacheKey, entry: impl Into<CachedEval>) -> Option<CacheKey> {
        let entry = entry.into();
        if let Some(slot) = self.entries.get_mut(&key) {
            *slot = entry;
            return None;
        }
        self.entries.insert(key.clone(), entry);
        self.order.push_back(key);
        if self.order.len() > self.capacity {
            let oldest = self.order.pop_front()?;
            self.entries.remove(&oldest);
            log::debug!("eval cache evicted {} (multipv {})", oldest.fen, oldest.breadth);
            return Some(oldest);
        }
        None
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}
