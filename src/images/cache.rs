use std::num::NonZeroUsize;

use lru::LruCache;
use tokio::sync::Mutex;

use crate::images::element::ImageElement;

/// Per-session registry of resolved image elements, keyed by id. Holds at
/// most `capacity` handles; the least recently used one is dropped first.
pub struct ElementCache {
    elements: Mutex<LruCache<String, ImageElement>>,
}

impl ElementCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            elements: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub async fn insert(&self, element: ImageElement) {
        let id = element.id().to_string();
        if let Some((evicted, _)) = self.elements.lock().await.push(id.clone(), element) {
            if evicted != id {
                tracing::debug!(id = %evicted, "evicted least recently used image element");
            }
        }
    }

    pub async fn get(&self, id: &str) -> Option<ImageElement> {
        self.elements.lock().await.get(id).cloned()
    }

    /// Overwrites an existing entry. Returns `false`, leaving the cache
    /// untouched, when `element` is no longer registered.
    pub async fn replace_if_present(&self, element: ImageElement) -> bool {
        match self.elements.lock().await.get_mut(element.id()) {
            Some(slot) => {
                *slot = element;
                true
            }
            None => false,
        }
    }

    pub async fn remove(&self, id: &str) -> Option<ImageElement> {
        self.elements.lock().await.pop(id)
    }

    pub async fn len(&self) -> usize {
        self.elements.lock().await.len()
    }

    pub async fn clear(&self) -> usize {
        let mut elements = self.elements.lock().await;
        let n = elements.len();
        elements.clear();
        n
    }
}
