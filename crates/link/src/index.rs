use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use graph::{Entity, GraphError, GraphStore};

struct TypeEntry {
    entities: Vec<Entity>,
    last_used: u64,
}

/// Bounded per-type cache over `get_entities_by_type`, so batch linking
/// scores candidates against memory instead of re-scanning cold storage on
/// every call. Capacity counts distinct type lists; eviction is LRU by a
/// monotonic touch counter. Entries are maintained incrementally as the
/// linker creates entities and appends aliases.
pub struct EntityIndex {
    entries: DashMap<String, TypeEntry>,
    capacity: usize,
    tick: AtomicU64,
}

impl EntityIndex {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
            tick: AtomicU64::new(0),
        }
    }

    fn touch(&self) -> u64 {
        self.tick.fetch_add(1, Ordering::Relaxed)
    }

    pub async fn get_or_load<S: GraphStore>(
        &self,
        store: &S,
        entity_type: &str,
    ) -> Result<Vec<Entity>, GraphError> {
        let key = entity_type.to_uppercase();
        if let Some(mut entry) = self.entries.get_mut(&key) {
            entry.last_used = self.touch();
            return Ok(entry.entities.clone());
        }

        let entities = store.get_entities_by_type(&key).await?;
        self.entries.insert(
            key,
            TypeEntry {
                entities: entities.clone(),
                last_used: self.touch(),
            },
        );
        self.evict_over_capacity();
        Ok(entities)
    }

    /// Record a newly created or updated entity in its type's cached list.
    /// A type that was never loaded stays unloaded.
    pub fn record_entity(&self, entity: &Entity) {
        let key = entity.entity_type.to_uppercase();
        if let Some(mut entry) = self.entries.get_mut(&key) {
            match entry.entities.iter_mut().find(|e| e.id == entity.id) {
                Some(existing) => *existing = entity.clone(),
                None => entry.entities.push(entity.clone()),
            }
        }
    }

    /// Mirror a successful link into the cache: alias append plus the
    /// conditional mention-count bump the store performed.
    pub fn record_link(&self, entity_type: &str, entity_id: &str, alias: &str, newly_linked: bool) {
        let key = entity_type.to_uppercase();
        if let Some(mut entry) = self.entries.get_mut(&key) {
            if let Some(entity) = entry.entities.iter_mut().find(|e| e.id == entity_id) {
                if newly_linked {
                    entity.mention_count += 1;
                }
                if !entity.aliases.iter().any(|a| a == alias) {
                    entity.aliases.push(alias.to_string());
                }
            }
        }
    }

    fn evict_over_capacity(&self) {
        while self.entries.len() > self.capacity {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|entry| entry.value().last_used)
                .map(|entry| entry.key().clone());
            match oldest {
                Some(key) => {
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }

    pub fn cached_types(&self) -> usize {
        self.entries.len()
    }
}
