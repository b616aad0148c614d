//! Subscription Set
//!
//! Domain types for tracking which ticker symbols the live feed polls.
//!
//! # Design
//!
//! Symbols are normalized to uppercase on the way in, so `shop.to` and
//! `SHOP.TO` are the same subscription. The set is ordered, which keeps
//! batch requests and snapshots deterministic.

use std::collections::BTreeSet;

// =============================================================================
// Types
// =============================================================================

/// A ticker symbol (e.g. `SHOP.TO`), always uppercase once normalized.
pub type Symbol = String;

/// Reasons a raw symbol string is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SymbolError {
    /// Symbol was empty after trimming.
    #[error("symbol must not be empty")]
    Empty,
    /// Symbol contains embedded whitespace.
    #[error("symbol contains whitespace: {0:?}")]
    Whitespace(String),
}

/// Normalize a raw symbol: trim surrounding whitespace and uppercase it.
///
/// # Errors
///
/// Returns [`SymbolError`] if the symbol is empty or contains inner
/// whitespace.
///
/// # Example
///
/// ```rust
/// use realtime_quotes::domain::subscription::normalize_symbol;
///
/// assert_eq!(normalize_symbol(" shop.to ").unwrap(), "SHOP.TO");
/// assert!(normalize_symbol("   ").is_err());
/// ```
pub fn normalize_symbol(raw: &str) -> Result<Symbol, SymbolError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SymbolError::Empty);
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err(SymbolError::Whitespace(trimmed.to_string()));
    }
    Ok(trimmed.to_uppercase())
}

// =============================================================================
// Subscription Set
// =============================================================================

/// Ordered set of normalized symbols.
///
/// `insert` and `remove` report whether the set actually changed, which is
/// what drives the subscribed/unsubscribed events upstream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionSet {
    symbols: BTreeSet<Symbol>,
}

impl SubscriptionSet {
    /// Create an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            symbols: BTreeSet::new(),
        }
    }

    /// Add a symbol. Returns `true` if it was not already present.
    pub fn insert(&mut self, symbol: Symbol) -> bool {
        self.symbols.insert(symbol)
    }

    /// Remove a symbol. Returns `true` if it was present.
    pub fn remove(&mut self, symbol: &str) -> bool {
        self.symbols.remove(symbol)
    }

    /// Check membership.
    #[must_use]
    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.contains(symbol)
    }

    /// Number of subscribed symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// True when nothing is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Symbols in sorted order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Symbol> {
        self.symbols.iter().cloned().collect()
    }

    /// Drop every symbol.
    pub fn clear(&mut self) {
        self.symbols.clear();
    }
}

impl FromIterator<Symbol> for SubscriptionSet {
    fn from_iter<I: IntoIterator<Item = Symbol>>(iter: I) -> Self {
        Self {
            symbols: iter.into_iter().collect(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test_case("shop.to", "SHOP.TO" ; "lowercase")]
    #[test_case("  RY.TO\t", "RY.TO" ; "surrounding whitespace")]
    #[test_case("Td.To", "TD.TO" ; "mixed case")]
    #[test_case("BRK.B", "BRK.B" ; "already normalized")]
    fn normalize_accepts(raw: &str, expected: &str) {
        assert_eq!(normalize_symbol(raw).unwrap(), expected);
    }

    #[test]
    fn normalize_rejects_empty() {
        assert_eq!(normalize_symbol(""), Err(SymbolError::Empty));
        assert_eq!(normalize_symbol("  \n"), Err(SymbolError::Empty));
    }

    #[test]
    fn normalize_rejects_inner_whitespace() {
        assert!(matches!(
            normalize_symbol("SHOP TO"),
            Err(SymbolError::Whitespace(_))
        ));
    }

    #[test]
    fn insert_reports_change() {
        let mut set = SubscriptionSet::new();

        assert!(set.insert("SHOP.TO".to_string()));
        assert!(!set.insert("SHOP.TO".to_string()));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn remove_reports_change() {
        let mut set = SubscriptionSet::new();
        set.insert("RY.TO".to_string());

        assert!(set.remove("RY.TO"));
        assert!(!set.remove("RY.TO"));
        assert!(set.is_empty());
    }

    #[test]
    fn to_vec_is_sorted() {
        let set: SubscriptionSet = ["TD.TO", "AC.TO", "RY.TO"]
            .into_iter()
            .map(String::from)
            .collect();

        assert_eq!(set.to_vec(), vec!["AC.TO", "RY.TO", "TD.TO"]);
    }

    proptest! {
        #[test]
        fn set_never_holds_duplicates_after_normalization(
            raws in proptest::collection::vec("[a-zA-Z]{1,5}(\\.[a-zA-Z]{1,2})?", 0..40)
        ) {
            let mut set = SubscriptionSet::new();
            let mut expected = BTreeSet::new();

            for raw in &raws {
                let symbol = normalize_symbol(raw).unwrap();
                let changed = set.insert(symbol.clone());
                prop_assert_eq!(changed, expected.insert(symbol));
            }

            prop_assert_eq!(set.len(), expected.len());
            prop_assert!(set.to_vec().iter().all(|s| *s == s.to_uppercase()));
        }
    }
}
