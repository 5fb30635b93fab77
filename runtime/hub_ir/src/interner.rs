//! Symbol table for type names, member names, and signatures.
//!
//! Loader threads intern while compiler threads render names for errors and
//! logs. The string -> name index is a `DashMap`, so interning an existing
//! symbol only touches one shard; the name -> string side is an append-only
//! vector behind a `RwLock`, written only when a new symbol is added.
//!
//! Strings are leaked on first intern and live for the rest of the process,
//! so lookups hand out `&'static str` without holding any lock.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use rustc_hash::FxBuildHasher;

use super::Name;

/// Interned strings, shared by the loader, the hierarchy, and compilers.
pub struct SymbolTable {
    index: DashMap<&'static str, Name, FxBuildHasher>,
    strings: RwLock<Vec<&'static str>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        let table = Self {
            index: DashMap::with_hasher(FxBuildHasher),
            strings: RwLock::new(Vec::with_capacity(1024)),
        };
        for text in Name::PREDEFINED {
            table.intern(text);
        }
        table
    }

    /// The name of `text`, interning it on first use.
    ///
    /// # Panics
    /// If more than `u32::MAX` distinct strings are interned.
    pub fn intern(&self, text: &str) -> Name {
        if let Some(name) = self.index.get(text) {
            return *name;
        }

        let mut strings = self.strings.write();
        // Another loader may have added it while we waited for the lock.
        if let Some(name) = self.index.get(text) {
            return *name;
        }
        let Ok(raw) = u32::try_from(strings.len()) else {
            panic!("symbol table is full: {} names", strings.len());
        };
        let name = Name::from_raw(raw);
        let leaked: &'static str = Box::leak(text.to_owned().into_boxed_str());
        strings.push(leaked);
        self.index.insert(leaked, name);
        tracing::trace!(name = raw, text = leaked, "interned symbol");
        name
    }

    /// The string behind `name`, or `"<unknown>"` for a name from another
    /// table.
    pub fn lookup(&self, name: Name) -> &'static str {
        self.strings
            .read()
            .get(name.index())
            .copied()
            .unwrap_or("<unknown>")
    }

    /// Number of interned strings, predefined ones included.
    pub fn len(&self) -> usize {
        self.strings.read().len()
    }

    /// True when only the predefined names are present.
    pub fn is_empty(&self) -> bool {
        self.len() <= Name::PREDEFINED.len()
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SymbolTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymbolTable")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

/// Symbol table shared between the loader, the hierarchy, and compiler threads.
#[derive(Clone, Default, Debug)]
pub struct SharedSymbols(Arc<SymbolTable>);

impl SharedSymbols {
    pub fn new() -> Self {
        SharedSymbols(Arc::new(SymbolTable::new()))
    }
}

impl std::ops::Deref for SharedSymbols {
    type Target = SymbolTable;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
