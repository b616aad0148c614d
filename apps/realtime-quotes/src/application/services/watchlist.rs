//! Watchlist
//!
//! User-curated symbol list persisted as a JSON array under
//! [`WATCHLIST_KEY`]. Storage failures never surface to the caller: a
//! missing or unreadable document loads as empty and failed writes are
//! logged.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::application::ports::{KeyValueStore, StoreError};
use crate::domain::subscription::{Symbol, SymbolError, normalize_symbol};

/// Storage key of the persisted watchlist.
pub const WATCHLIST_KEY: &str = "tsx_watchlist";

/// Persistent, insertion-ordered symbol list.
pub struct Watchlist {
    store: Arc<dyn KeyValueStore>,
    symbols: Mutex<Vec<Symbol>>,
}

impl std::fmt::Debug for Watchlist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watchlist")
            .field("symbols", &*self.symbols.lock())
            .finish_non_exhaustive()
    }
}

impl Watchlist {
    /// Load the persisted list from `store`.
    #[must_use]
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let symbols = match read(store.as_ref()) {
            Ok(symbols) => symbols,
            Err(error) => {
                tracing::warn!(error = %error, "Failed to load watchlist, starting empty");
                Vec::new()
            }
        };
        tracing::debug!(symbols = symbols.len(), "Watchlist loaded");

        Self {
            store,
            symbols: Mutex::new(symbols),
        }
    }

    /// Add a symbol. Returns `Ok(false)` if it was already present.
    ///
    /// # Errors
    ///
    /// Returns [`SymbolError`] for an empty or malformed symbol.
    pub fn add(&self, symbol: &str) -> Result<bool, SymbolError> {
        let symbol = normalize_symbol(symbol)?;
        let mut symbols = self.symbols.lock();
        if symbols.contains(&symbol) {
            return Ok(false);
        }
        symbols.push(symbol);
        self.persist(&symbols);
        Ok(true)
    }

    /// Remove a symbol. Returns `Ok(false)` if it was not present.
    ///
    /// # Errors
    ///
    /// Returns [`SymbolError`] for an empty or malformed symbol.
    pub fn remove(&self, symbol: &str) -> Result<bool, SymbolError> {
        let symbol = normalize_symbol(symbol)?;
        let mut symbols = self.symbols.lock();
        let before = symbols.len();
        symbols.retain(|s| *s != symbol);
        if symbols.len() == before {
            return Ok(false);
        }
        self.persist(&symbols);
        Ok(true)
    }

    /// Case-insensitive membership test.
    #[must_use]
    pub fn contains(&self, symbol: &str) -> bool {
        normalize_symbol(symbol).is_ok_and(|symbol| self.symbols.lock().contains(&symbol))
    }

    /// Symbols in insertion order.
    #[must_use]
    pub fn symbols(&self) -> Vec<Symbol> {
        self.symbols.lock().clone()
    }

    /// Number of symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.lock().len()
    }

    /// True when the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.lock().is_empty()
    }

    /// Remove every symbol.
    pub fn clear(&self) {
        let mut symbols = self.symbols.lock();
        symbols.clear();
        self.persist(&symbols);
    }

    fn persist(&self, symbols: &[Symbol]) {
        let result = serde_json::to_string(symbols)
            .map_err(StoreError::from)
            .and_then(|json| self.store.set(WATCHLIST_KEY, &json));
        if let Err(error) = result {
            tracing::error!(error = %error, "Failed to save watchlist");
        }
    }
}

fn read(store: &dyn KeyValueStore) -> Result<Vec<Symbol>, StoreError> {
    let Some(raw) = store.get(WATCHLIST_KEY)? else {
        return Ok(Vec::new());
    };
    let stored: Vec<String> = serde_json::from_str(&raw)?;

    let mut symbols: Vec<Symbol> = Vec::with_capacity(stored.len());
    for entry in stored {
        match normalize_symbol(&entry) {
            Ok(symbol) if !symbols.contains(&symbol) => symbols.push(symbol),
            Ok(_) => {}
            Err(error) => tracing::warn!(entry = %entry, error = %error, "Dropping invalid watchlist entry"),
        }
    }
    Ok(symbols)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeStore {
        values: Mutex<HashMap<String, String>>,
        fail_writes: bool,
    }

    impl KeyValueStore for FakeStore {
        fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            Ok(self.values.lock().get(key).cloned())
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            if self.fail_writes {
                return Err(StoreError::Io(std::io::Error::other("disk full")));
            }
            self.values.lock().insert(key.to_string(), value.to_string());
            Ok(())
        }

        fn remove(&self, key: &str) -> Result<(), StoreError> {
            self.values.lock().remove(key);
            Ok(())
        }
    }

    fn stored(store: &FakeStore) -> Option<String> {
        store.get(WATCHLIST_KEY).unwrap()
    }

    #[test]
    fn add_uppercases_and_persists() {
        let store = Arc::new(FakeStore::default());
        let watchlist = Watchlist::load(store.clone());

        assert!(watchlist.add("shop.to").unwrap());
        assert!(!watchlist.add("SHOP.TO").unwrap());
        assert!(watchlist.add("ry.to").unwrap());

        assert_eq!(watchlist.symbols(), vec!["SHOP.TO", "RY.TO"]);
        assert_eq!(stored(&store).unwrap(), r#"["SHOP.TO","RY.TO"]"#);
        assert!(watchlist.contains("Shop.To"));
    }

    #[test]
    fn remove_and_clear_persist() {
        let store = Arc::new(FakeStore::default());
        let watchlist = Watchlist::load(store.clone());
        watchlist.add("TD.TO").unwrap();
        watchlist.add("BMO.TO").unwrap();

        assert!(watchlist.remove("td.to").unwrap());
        assert!(!watchlist.remove("td.to").unwrap());
        assert_eq!(stored(&store).unwrap(), r#"["BMO.TO"]"#);

        watchlist.clear();
        assert!(watchlist.is_empty());
        assert_eq!(stored(&store).unwrap(), "[]");
    }

    #[test]
    fn loads_existing_document() {
        let store = Arc::new(FakeStore::default());
        store.set(WATCHLIST_KEY, r#"["cnr.to","CNR.TO","","ENB.TO"]"#).unwrap();

        let watchlist = Watchlist::load(store);
        assert_eq!(watchlist.symbols(), vec!["CNR.TO", "ENB.TO"]);
    }

    #[test]
    fn corrupt_document_loads_empty() {
        let store = Arc::new(FakeStore::default());
        store.set(WATCHLIST_KEY, "{not json").unwrap();

        let watchlist = Watchlist::load(store);
        assert!(watchlist.is_empty());
    }

    #[test]
    fn write_failures_are_swallowed() {
        let store = Arc::new(FakeStore {
            fail_writes: true,
            ..FakeStore::default()
        });
        let watchlist = Watchlist::load(store.clone());

        assert!(watchlist.add("SU.TO").unwrap());
        assert_eq!(watchlist.len(), 1);
        assert!(stored(&store).is_none());
    }

    #[test]
    fn invalid_symbol_is_rejected() {
        let watchlist = Watchlist::load(Arc::new(FakeStore::default()));
        assert!(watchlist.add("  ").is_err());
        assert!(!watchlist.contains(""));
    }
}
