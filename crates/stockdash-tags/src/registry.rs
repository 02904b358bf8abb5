//! Live tag registry with single-focus and one-tag-per-symbol invariants.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use stockdash_cache::StockStore;
use stockdash_core::types::{StockRecord, Symbol};
use tracing::debug;

/// A user-visible tag for one followed symbol.
///
/// Returned by value; it reflects the registry at the time of the call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockTag {
    pub symbol: Symbol,
    pub company_name: String,
    pub is_favorited: bool,
    pub is_focused: bool,
}

impl StockTag {
    /// Look up the cached record this tag displays.
    pub fn record(&self, store: &StockStore) -> Option<Arc<StockRecord>> {
        store.get(&self.symbol)
    }
}

#[derive(Debug, Clone)]
struct TagState {
    company_name: String,
    is_favorited: bool,
}

#[derive(Debug, Default)]
struct RegistryState {
    tags: HashMap<Symbol, TagState>,
    order: Vec<Symbol>,
    // Focus is a single slot, so at most one tag can hold it.
    focused: Option<Symbol>,
}

impl RegistryState {
    fn tag(&self, symbol: &Symbol) -> Option<StockTag> {
        self.tags.get(symbol).map(|state| StockTag {
            symbol: symbol.clone(),
            company_name: state.company_name.clone(),
            is_favorited: state.is_favorited,
            is_focused: self.focused.as_ref() == Some(symbol),
        })
    }

    /// Insert a tag unless the symbol already has one. Focus is untouched.
    fn insert(&mut self, symbol: &Symbol, company_name: Option<&str>) -> &mut TagState {
        if !self.tags.contains_key(symbol) {
            self.order.push(symbol.clone());
            debug!(symbol = %symbol, "Tag added");
        }
        self.tags.entry(symbol.clone()).or_insert_with(|| TagState {
            company_name: company_name
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| symbol.default_company_name()),
            is_favorited: false,
        })
    }
}

/// Tracks the followed symbols, their favorite flags and the focused tag.
///
/// Operations on a symbol without a tag are no-ops.
#[derive(Debug, Default)]
pub struct TagRegistry {
    state: Mutex<RegistryState>,
}

impl TagRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tag and focus it.
    ///
    /// If the symbol already has a tag, that tag is focused and returned
    /// unchanged instead of creating a duplicate.
    pub fn add(&self, symbol: &Symbol, company_name: Option<&str>) -> StockTag {
        let mut state = self.lock();
        let tag = state.insert(symbol, company_name).clone();
        state.focused = Some(symbol.clone());

        StockTag {
            symbol: symbol.clone(),
            company_name: tag.company_name,
            is_favorited: tag.is_favorited,
            is_focused: true,
        }
    }

    /// Remove a tag. If it held focus, no tag is focused afterwards.
    pub fn remove(&self, symbol: &Symbol) -> Option<StockTag> {
        let mut state = self.lock();
        let removed = state.tag(symbol)?;

        state.tags.remove(symbol);
        state.order.retain(|s| s != symbol);
        if state.focused.as_ref() == Some(symbol) {
            state.focused = None;
        }
        debug!(symbol = %symbol, "Tag removed");
        Some(removed)
    }

    /// Focus or unfocus a tag.
    ///
    /// Focusing moves focus away from whichever tag held it. Unfocusing only
    /// has an effect on the currently focused tag.
    pub fn set_focus(&self, symbol: &Symbol, focused: bool) {
        let mut state = self.lock();
        if !state.tags.contains_key(symbol) {
            return;
        }

        if focused {
            state.focused = Some(symbol.clone());
        } else if state.focused.as_ref() == Some(symbol) {
            state.focused = None;
        }
    }

    /// Flip a tag's favorite flag, returning the new value.
    pub fn toggle_favorite(&self, symbol: &Symbol) -> Option<bool> {
        let mut state = self.lock();
        let tag = state.tags.get_mut(symbol)?;
        tag.is_favorited = !tag.is_favorited;
        Some(tag.is_favorited)
    }

    /// Set a tag's favorite flag.
    pub fn set_favorite(&self, symbol: &Symbol, favorited: bool) {
        if let Some(tag) = self.lock().tags.get_mut(symbol) {
            tag.is_favorited = favorited;
        }
    }

    /// Get a tag.
    pub fn get(&self, symbol: &Symbol) -> Option<StockTag> {
        self.lock().tag(symbol)
    }

    /// Check if a symbol has a tag.
    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.lock().tags.contains_key(symbol)
    }

    /// The focused tag, if any.
    pub fn focused(&self) -> Option<StockTag> {
        let state = self.lock();
        state.focused.as_ref().and_then(|symbol| state.tag(symbol))
    }

    /// All tags in insertion order.
    pub fn list_active(&self) -> Vec<StockTag> {
        let state = self.lock();
        state.order.iter().filter_map(|symbol| state.tag(symbol)).collect()
    }

    /// Favorited symbols in insertion order.
    pub fn list_favorited(&self) -> Vec<Symbol> {
        let state = self.lock();
        state
            .order
            .iter()
            .filter(|symbol| state.tags.get(*symbol).is_some_and(|tag| tag.is_favorited))
            .cloned()
            .collect()
    }

    /// Number of tags.
    pub fn len(&self) -> usize {
        self.lock().tags.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().tags.is_empty()
    }

    /// Remove every tag and clear focus.
    pub fn clear_all(&self) {
        let mut state = self.lock();
        state.tags.clear();
        state.order.clear();
        state.focused = None;
    }

    /// Re-create tags from persisted `(symbol, company name, favorited)` entries.
    ///
    /// Favorite flags are kept; focus always starts out cleared. Runs under a
    /// single lock, so readers see either none or all of the restored tags.
    pub fn restore<'a, I>(&self, entries: I)
    where
        I: IntoIterator<Item = (&'a Symbol, &'a str, bool)>,
    {
        let mut state = self.lock();
        for (symbol, company_name, favorited) in entries {
            state.insert(symbol, Some(company_name)).is_favorited = favorited;
        }
        state.focused = None;
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
