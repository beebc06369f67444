use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Storage key for the cached custom categories.
pub const CUSTOM_CACHE_KEY: &str = "custom_categories";
/// Only the most recently used custom categories are kept; oldest evicted.
pub const MAX_CACHED_CUSTOM_CATEGORIES: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordCategory {
    pub name: String,
    pub words: Vec<String>,
    pub is_custom: bool,
}

impl WordCategory {
    pub fn new(name: impl Into<String>, words: Vec<String>, is_custom: bool) -> Self {
        Self {
            name: name.into(),
            words,
            is_custom,
        }
    }
}

/// Small key->bytes store backing the custom-category cache. Injected so the
/// core never touches ambient global storage.
pub trait CacheStore: Send {
    fn load(&self, key: &str) -> Option<Vec<u8>>;
    fn store(&mut self, key: &str, value: &[u8]);
}

/// External collaborator that produces a word list for a category the bank
/// does not know. Failures are surfaced to the caller; the bank never
/// retries on its own.
#[async_trait]
pub trait WordLookup: Send + Sync {
    async fn lookup_words(&self, category: &str) -> anyhow::Result<Vec<String>>;
}

fn builtin_categories() -> Vec<WordCategory> {
    let cat = |name: &str, words: &[&str]| {
        WordCategory::new(name, words.iter().map(|w| w.to_string()).collect(), false)
    };
    vec![
        cat(
            "Shapes",
            &[
                "Circle", "Square", "Triangle", "Heart", "Star", "Rectangle", "Diamond",
                "Pentagon", "Hexagon", "Crescent", "Sphere", "Cone", "Cylinder", "Trapezoid",
                "Semicircle",
            ],
        ),
        cat(
            "Objects",
            &[
                "Book", "Cup", "Chair", "Car", "Key", "Candle", "Pillow", "Clock", "Balloons",
                "Phone", "Lamp", "Umbrella", "Flower", "Spoon", "Coin", "Table", "Bed", "Window",
                "Mirror", "Suitcase", "Tree", "Cloud",
            ],
        ),
        cat(
            "Fruits",
            &[
                "Apple", "Orange", "Banana", "Grapes", "Strawberry", "Watermelon", "Lemon",
                "Cherry", "Peach", "Pear", "Mango", "Kiwi", "Pineapple", "Papaya", "Blueberry",
                "Raspberry", "Coconut", "Pomegranate", "Dragon fruit", "Avocado", "Pumpkin",
            ],
        ),
        cat(
            "Animals",
            &[
                "Fish", "Cat", "Dog", "Bird", "Butterfly", "Elephant", "Duck", "Snake", "Turtle",
                "Ladybug", "Lion", "Zebra", "Panda", "Frog", "Shark", "Giraffe", "Monkey",
                "Koala", "Crocodile", "Penguin", "Seahorse", "Bear", "Horse",
            ],
        ),
        cat(
            "Instruments",
            &[
                "Guitar", "Piano", "Drums", "Flute", "Trumpet", "Violin", "Saxophone",
                "Tambourine", "Harp", "Clarinet", "Cello", "Trombone", "Accordion", "Xylophone",
                "Triangle",
            ],
        ),
        cat(
            "Clothing",
            &[
                "T Shirt", "Shoes", "Hat", "Socks", "Dress", "Pants", "Glasses", "Tie", "Scarf",
                "Gloves", "Jacket", "Skirt", "Hoodie", "Jeans", "Boots", "Belt", "Necklace",
                "Sunglasses",
            ],
        ),
        cat(
            "Sports",
            &[
                "Soccer", "Basketball", "Baseball", "Tennis", "Golf", "Football", "Volleyball",
                "Bowling", "Hockey", "Surfing", "Cricket", "Skiing", "Skateboarding",
                "Badminton", "Boxing", "Frisbee", "Fencing", "Swimming",
            ],
        ),
    ]
}

/// Resolves a category name to its answer pool. Built-ins are static;
/// unknown names go through the injected lookup collaborator and land in a
/// small persisted most-recently-used cache.
pub struct WordBank {
    builtin: Vec<WordCategory>,
    custom: Vec<WordCategory>,
    store: Box<dyn CacheStore>,
}

impl WordBank {
    /// Loads the custom cache once; a missing or corrupt cache entry just
    /// means no custom categories yet.
    pub fn new(store: Box<dyn CacheStore>) -> Self {
        let custom = store
            .load(CUSTOM_CACHE_KEY)
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .unwrap_or_default();
        Self {
            builtin: builtin_categories(),
            custom,
            store,
        }
    }

    pub fn categories(&self) -> Vec<&WordCategory> {
        self.builtin.iter().chain(self.custom.iter()).collect()
    }

    pub fn resolve(&self, name: &str) -> Option<&WordCategory> {
        self.builtin
            .iter()
            .chain(self.custom.iter())
            .find(|c| c.name == name)
    }

    /// Resolve a category, fetching it through `lookup` on a miss. A fetched
    /// list is cached (and persisted) even when empty; the caller decides
    /// what to do with an empty pool. A lookup error caches nothing.
    pub async fn resolve_or_fetch(
        &mut self,
        name: &str,
        lookup: &dyn WordLookup,
    ) -> anyhow::Result<WordCategory> {
        if let Some(category) = self.resolve(name) {
            return Ok(category.clone());
        }
        let words = lookup.lookup_words(name).await?;
        Ok(self.insert_custom(name, words))
    }

    /// Insert (or refresh) a custom category, evicting the oldest entries
    /// beyond the cache bound and rewriting the persisted cache.
    pub fn insert_custom(&mut self, name: &str, words: Vec<String>) -> WordCategory {
        let category = WordCategory::new(name, words, true);
        self.custom.retain(|c| c.name != name);
        self.custom.push(category.clone());
        while self.custom.len() > MAX_CACHED_CUSTOM_CATEGORIES {
            self.custom.remove(0);
        }
        self.persist();
        category
    }

    fn persist(&mut self) {
        if let Ok(bytes) = serde_json::to_vec(&self.custom) {
            self.store.store(CUSTOM_CACHE_KEY, &bytes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Default, Clone)]
    struct MemoryStore {
        entries: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl CacheStore for MemoryStore {
        fn load(&self, key: &str) -> Option<Vec<u8>> {
            self.entries.lock().unwrap().get(key).cloned()
        }

        fn store(&mut self, key: &str, value: &[u8]) {
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_vec());
        }
    }

    struct StubLookup {
        words: Vec<String>,
        fail: bool,
    }

    #[async_trait]
    impl WordLookup for StubLookup {
        async fn lookup_words(&self, _category: &str) -> anyhow::Result<Vec<String>> {
            if self.fail {
                anyhow::bail!("lookup unavailable");
            }
            Ok(self.words.clone())
        }
    }

    #[test]
    fn test_builtin_categories_resolve() {
        let bank = WordBank::new(Box::new(MemoryStore::default()));
        let animals = bank.resolve("Animals").unwrap();
        assert!(!animals.is_custom);
        assert!(animals.words.iter().any(|w| w == "Cat"));
        assert!(bank.resolve("No Such Category").is_none());
    }

    #[test]
    fn test_custom_cache_evicts_oldest() {
        let mut bank = WordBank::new(Box::new(MemoryStore::default()));
        bank.insert_custom("One", vec!["a".into()]);
        bank.insert_custom("Two", vec!["b".into()]);
        bank.insert_custom("Three", vec!["c".into()]);
        bank.insert_custom("Four", vec!["d".into()]);

        assert!(bank.resolve("One").is_none());
        assert!(bank.resolve("Two").is_some());
        assert!(bank.resolve("Four").is_some());
    }

    #[test]
    fn test_reinsert_refreshes_instead_of_duplicating() {
        let mut bank = WordBank::new(Box::new(MemoryStore::default()));
        bank.insert_custom("Movies", vec!["old".into()]);
        bank.insert_custom("Movies", vec!["new".into()]);

        let movies = bank.resolve("Movies").unwrap();
        assert_eq!(movies.words, vec!["new".to_string()]);
        assert_eq!(
            bank.categories()
                .iter()
                .filter(|c| c.name == "Movies")
                .count(),
            1
        );
    }

    #[test]
    fn test_cache_survives_restart() {
        let store = MemoryStore::default();
        {
            let mut bank = WordBank::new(Box::new(store.clone()));
            bank.insert_custom("Space", vec!["Rocket".into(), "Comet".into()]);
        }
        let reloaded = WordBank::new(Box::new(store));
        let space = reloaded.resolve("Space").unwrap();
        assert!(space.is_custom);
        assert_eq!(space.words.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_on_miss_and_cache() {
        let mut bank = WordBank::new(Box::new(MemoryStore::default()));
        let lookup = StubLookup {
            words: vec!["Mars".into(), "Venus".into()],
            fail: false,
        };

        let fetched = bank.resolve_or_fetch("Planets", &lookup).await.unwrap();
        assert_eq!(fetched.words.len(), 2);

        // Second resolve never hits the collaborator.
        let failing = StubLookup {
            words: vec![],
            fail: true,
        };
        let cached = bank.resolve_or_fetch("Planets", &failing).await.unwrap();
        assert_eq!(cached.words, fetched.words);
    }

    #[tokio::test]
    async fn test_lookup_failure_surfaces_and_caches_nothing() {
        let mut bank = WordBank::new(Box::new(MemoryStore::default()));
        let lookup = StubLookup {
            words: vec![],
            fail: true,
        };
        assert!(bank.resolve_or_fetch("Planets", &lookup).await.is_err());
        assert!(bank.resolve("Planets").is_none());
    }

    #[tokio::test]
    async fn test_empty_lookup_result_yields_empty_pool() {
        let mut bank = WordBank::new(Box::new(MemoryStore::default()));
        let lookup = StubLookup {
            words: vec![],
            fail: false,
        };
        let fetched = bank.resolve_or_fetch("Void", &lookup).await.unwrap();
        assert!(fetched.words.is_empty());
        // The empty pool is still cached; retrying is the caller's call.
        assert!(bank.resolve("Void").is_some());
    }
}
