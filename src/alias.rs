//! Symbolic value tables for decoding boolean and enum-like config values.
//!
//! An [`AliasText`] maps text tokens to typed values: one flat table for
//! booleans (`"on"` → `true`) and one per-key family of integer tables
//! (`"error code"` → `"warn"` → `4`). Lookups are case-insensitive; tokens
//! are lowercased on insert and lookup. Re-registering an alias overwrites
//! the previous value.
//!
//! Tables are shared by explicit reference ([`SharedAlias`]): each config
//! holds its own table and may fall back to a table owned by its source.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::SectionError;

/// An alias table shared between configs and their owning source.
pub type SharedAlias = Rc<RefCell<AliasText>>;

/// Symbol tables for boolean and integer aliases.
#[derive(Debug, Default, Clone)]
pub struct AliasText {
    boolean: HashMap<String, bool>,
    int: HashMap<String, HashMap<String, i32>>,
}

impl AliasText {
    /// An empty table with no registered aliases.
    pub fn new() -> Self {
        Self::default()
    }

    /// A table pre-populated with the conventional boolean spellings:
    /// `true`/`false`, `on`/`off`, `yes`/`no`, `1`/`0`.
    pub fn with_defaults() -> Self {
        let mut alias = Self::new();
        for truthy in ["true", "on", "yes", "1"] {
            alias.add_boolean(truthy, true);
        }
        for falsy in ["false", "off", "no", "0"] {
            alias.add_boolean(falsy, false);
        }
        alias
    }

    /// Wrap a table for shared ownership.
    pub fn into_shared(self) -> SharedAlias {
        Rc::new(RefCell::new(self))
    }

    /// Register a boolean alias. Overwrites any previous registration.
    pub fn add_boolean(&mut self, alias: &str, value: bool) {
        self.boolean.insert(alias.to_lowercase(), value);
    }

    /// Register an integer alias scoped to a key family.
    ///
    /// The `key` is the config key the alias applies to, not a global name:
    /// `"error code"` and `"log level"` may map the same token to different
    /// integers.
    pub fn add_int(&mut self, key: &str, alias: &str, value: i32) {
        self.int
            .entry(key.to_string())
            .or_default()
            .insert(alias.to_lowercase(), value);
    }

    /// Register a whole family of integer aliases at once.
    ///
    /// This is the explicit replacement for reflection-driven enum loading:
    /// callers pass the `(name, value)` pairs directly.
    pub fn add_ints(&mut self, key: &str, pairs: &[(&str, i32)]) {
        for (alias, value) in pairs {
            self.add_int(key, alias, *value);
        }
    }

    pub fn contains_boolean(&self, alias: &str) -> bool {
        self.boolean.contains_key(&alias.to_lowercase())
    }

    pub fn contains_int(&self, key: &str, alias: &str) -> bool {
        self.int
            .get(key)
            .is_some_and(|family| family.contains_key(&alias.to_lowercase()))
    }

    /// Decode a boolean token.
    pub fn get_boolean(&self, alias: &str) -> Result<bool, SectionError> {
        self.boolean
            .get(&alias.to_lowercase())
            .copied()
            .ok_or_else(|| SectionError::AliasNotFound {
                value: alias.to_string(),
            })
    }

    /// Decode an integer token within a key family.
    pub fn get_int(&self, key: &str, alias: &str) -> Result<i32, SectionError> {
        self.int
            .get(key)
            .and_then(|family| family.get(&alias.to_lowercase()))
            .copied()
            .ok_or_else(|| SectionError::IntAliasNotFound {
                key: key.to_string(),
                value: alias.to_string(),
            })
    }
}
