//! The format-agnostic projection of one section: an ordered string map
//! with typed getters, alias decoding, and mutation notifications.
//!
//! A [`Config`] is a cheap-to-clone handle; clones share state. Sources
//! hand out handles from their [`ConfigCollection`] and keep their own, so
//! application mutations are visible to `save()` without any re-fetching.
//!
//! Values are stored as strings. Typed getters parse on demand: absence is
//! [`ValueNotFound`](SectionError::ValueNotFound) unless a default is
//! supplied, and a present-but-malformed value is a
//! [`FormatError`](SectionError::FormatError) even when a default is
//! supplied. Boolean and symbolic integer decoding goes through the alias
//! tables, local first, then the owning source's global table.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use log::trace;

use crate::alias::SharedAlias;
use crate::error::SectionError;

/// A mutation notification delivered to subscribed observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigEvent {
    KeySet { key: String, value: String },
    KeyRemoved { key: String, value: String },
}

/// Handle returned by [`Config::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserverId(usize);

type Observer = Rc<dyn Fn(&ConfigEvent)>;

/// Hook installed by an owning source; runs after every `set` so autosave
/// can flush synchronously.
pub type SaveHook = Rc<dyn Fn() -> Result<(), SectionError>>;

struct ConfigInner {
    name: String,
    values: IndexMap<String, String>,
    alias: SharedAlias,
    fallback_alias: Option<SharedAlias>,
    observers: Vec<(ObserverId, Observer)>,
    next_observer: usize,
    save_hook: Option<SaveHook>,
}

/// A named, ordered bag of string key/value pairs.
#[derive(Clone)]
pub struct Config {
    inner: Rc<RefCell<ConfigInner>>,
}

impl Config {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ConfigInner {
                name: name.into(),
                values: IndexMap::new(),
                alias: crate::alias::AliasText::new().into_shared(),
                fallback_alias: None,
                observers: Vec::new(),
                next_observer: 0,
                save_hook: None,
            })),
        }
    }

    pub fn name(&self) -> String {
        self.inner.borrow().name.clone()
    }

    /// Whether two handles refer to the same underlying config.
    pub fn same_as(&self, other: &Config) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// The config's own alias table.
    pub fn alias(&self) -> SharedAlias {
        self.inner.borrow().alias.clone()
    }

    /// Replace the config's alias table with a shared one. Used by
    /// sources to establish a single symbol table across all sections.
    pub fn set_alias(&self, alias: SharedAlias) {
        self.inner.borrow_mut().alias = alias;
    }

    pub(crate) fn set_fallback_alias(&self, alias: SharedAlias) {
        self.inner.borrow_mut().fallback_alias = Some(alias);
    }

    pub(crate) fn set_save_hook(&self, hook: Option<SaveHook>) {
        self.inner.borrow_mut().save_hook = hook;
    }

    // --- reads ---

    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.borrow().values.get(key).cloned()
    }

    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.borrow().values.contains_key(key)
    }

    /// Key names in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.inner.borrow().values.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().values.is_empty()
    }

    pub fn get_int(&self, key: &str) -> Result<i32, SectionError> {
        parse_number(key, &self.require(key)?, "integer")
    }

    pub fn get_int_or(&self, key: &str, default: i32) -> Result<i32, SectionError> {
        match self.get(key) {
            Some(text) => parse_number(key, &text, "integer"),
            None => Ok(default),
        }
    }

    pub fn get_long(&self, key: &str) -> Result<i64, SectionError> {
        parse_number(key, &self.require(key)?, "long integer")
    }

    pub fn get_long_or(&self, key: &str, default: i64) -> Result<i64, SectionError> {
        match self.get(key) {
            Some(text) => parse_number(key, &text, "long integer"),
            None => Ok(default),
        }
    }

    pub fn get_float(&self, key: &str) -> Result<f32, SectionError> {
        parse_number(key, &self.require(key)?, "float")
    }

    pub fn get_float_or(&self, key: &str, default: f32) -> Result<f32, SectionError> {
        match self.get(key) {
            Some(text) => parse_number(key, &text, "float"),
            None => Ok(default),
        }
    }

    pub fn get_double(&self, key: &str) -> Result<f64, SectionError> {
        parse_number(key, &self.require(key)?, "double")
    }

    pub fn get_double_or(&self, key: &str, default: f64) -> Result<f64, SectionError> {
        match self.get(key) {
            Some(text) => parse_number(key, &text, "double"),
            None => Ok(default),
        }
    }

    /// Decode a boolean through the alias tables, local first, then the
    /// owning source's global table.
    pub fn get_boolean(&self, key: &str) -> Result<bool, SectionError> {
        let text = self.require(key)?;
        self.decode_boolean(&text)
    }

    /// Like [`get_boolean`](Self::get_boolean), but an absent key yields
    /// `default`. A present value that no alias table recognizes still
    /// fails.
    pub fn get_boolean_or(&self, key: &str, default: bool) -> Result<bool, SectionError> {
        match self.get(key) {
            Some(text) => self.decode_boolean(&text),
            None => Ok(default),
        }
    }

    /// Decode a symbolic integer scoped by the key's alias family.
    pub fn get_int_alias(&self, key: &str) -> Result<i32, SectionError> {
        let text = self.require(key)?;
        self.decode_int_alias(key, &text)
    }

    pub fn get_int_alias_or(&self, key: &str, default: i32) -> Result<i32, SectionError> {
        match self.get(key) {
            Some(text) => self.decode_int_alias(key, &text),
            None => Ok(default),
        }
    }

    // --- writes ---

    /// Upsert a key. New keys append at the end; existing keys keep their
    /// position. Notifies observers and, when the owning source has
    /// autosave enabled, flushes the source synchronously.
    pub fn set(&self, key: &str, value: &str) -> Result<(), SectionError> {
        let hook = {
            let mut inner = self.inner.borrow_mut();
            inner.values.insert(key.to_string(), value.to_string());
            trace!("set [{}] {key} = {value}", inner.name);
            inner.save_hook.clone()
        };
        self.notify(&ConfigEvent::KeySet {
            key: key.to_string(),
            value: value.to_string(),
        });
        match hook {
            Some(hook) => hook(),
            None => Ok(()),
        }
    }

    pub fn set_int(&self, key: &str, value: i32) -> Result<(), SectionError> {
        self.set(key, &value.to_string())
    }

    pub fn set_long(&self, key: &str, value: i64) -> Result<(), SectionError> {
        self.set(key, &value.to_string())
    }

    pub fn set_float(&self, key: &str, value: f32) -> Result<(), SectionError> {
        self.set(key, &value.to_string())
    }

    pub fn set_double(&self, key: &str, value: f64) -> Result<(), SectionError> {
        self.set(key, &value.to_string())
    }

    pub fn set_bool(&self, key: &str, value: bool) -> Result<(), SectionError> {
        self.set(key, if value { "true" } else { "false" })
    }

    /// Remove a key. A no-op when the key is absent; otherwise observers
    /// receive the prior value.
    pub fn remove(&self, key: &str) {
        let removed = {
            let mut inner = self.inner.borrow_mut();
            // shift_remove keeps the insertion order of the survivors.
            inner.values.shift_remove(key)
        };
        if let Some(value) = removed {
            self.notify(&ConfigEvent::KeyRemoved {
                key: key.to_string(),
                value,
            });
        }
    }

    /// Load-path insert: no notifications, no autosave.
    pub fn add(&self, key: &str, value: &str) {
        self.inner
            .borrow_mut()
            .values
            .insert(key.to_string(), value.to_string());
    }

    // --- observers ---

    pub fn subscribe(&self, observer: impl Fn(&ConfigEvent) + 'static) -> ObserverId {
        let mut inner = self.inner.borrow_mut();
        let id = ObserverId(inner.next_observer);
        inner.next_observer += 1;
        inner.observers.push((id, Rc::new(observer)));
        id
    }

    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        let mut inner = self.inner.borrow_mut();
        let before = inner.observers.len();
        inner.observers.retain(|(oid, _)| *oid != id);
        inner.observers.len() != before
    }

    fn notify(&self, event: &ConfigEvent) {
        // Snapshot so observers may subscribe/unsubscribe reentrantly.
        let observers: Vec<Observer> = self
            .inner
            .borrow()
            .observers
            .iter()
            .map(|(_, o)| o.clone())
            .collect();
        for observer in observers {
            observer(event);
        }
    }

    fn require(&self, key: &str) -> Result<String, SectionError> {
        self.get(key).ok_or_else(|| SectionError::ValueNotFound {
            key: key.to_string(),
        })
    }

    fn decode_boolean(&self, text: &str) -> Result<bool, SectionError> {
        let (local, fallback) = {
            let inner = self.inner.borrow();
            (inner.alias.clone(), inner.fallback_alias.clone())
        };
        if local.borrow().contains_boolean(text) {
            return local.borrow().get_boolean(text);
        }
        if let Some(global) = fallback {
            return global.borrow().get_boolean(text);
        }
        local.borrow().get_boolean(text)
    }

    fn decode_int_alias(&self, key: &str, text: &str) -> Result<i32, SectionError> {
        let (local, fallback) = {
            let inner = self.inner.borrow();
            (inner.alias.clone(), inner.fallback_alias.clone())
        };
        if local.borrow().contains_int(key, text) {
            return local.borrow().get_int(key, text);
        }
        if let Some(global) = fallback {
            return global.borrow().get_int(key, text);
        }
        local.borrow().get_int(key, text)
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Config")
            .field("name", &inner.name)
            .field("values", &inner.values)
            .finish()
    }
}

fn parse_number<T: std::str::FromStr>(
    key: &str,
    text: &str,
    expected: &'static str,
) -> Result<T, SectionError> {
    text.trim().parse().map_err(|_| SectionError::FormatError {
        key: key.to_string(),
        value: text.to_string(),
        expected,
    })
}

/// An ordered set of configs, keyed both by position and by unique name.
///
/// Like [`Config`], this is a shared handle: a source and its callers see
/// the same collection.
#[derive(Clone, Default)]
pub struct ConfigCollection {
    inner: Rc<RefCell<Vec<Config>>>,
}

impl ConfigCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a config.
    ///
    /// Adding the same handle twice is
    /// [`DuplicateConfig`](SectionError::DuplicateConfig). Adding a
    /// *different* config that shares a name merges its keys into the
    /// existing one, later values winning, rather than creating a second
    /// entry. This upsert is what gives
    /// [`merge`](crate::source::SourceCore::merge) its semantics.
    pub fn add(&self, config: &Config) -> Result<(), SectionError> {
        let existing = {
            let list = self.inner.borrow();
            if list.iter().any(|c| c.same_as(config)) {
                return Err(SectionError::DuplicateConfig {
                    name: config.name(),
                });
            }
            list.iter().find(|c| c.name() == config.name()).cloned()
        };
        match existing {
            Some(target) => {
                for key in config.keys() {
                    if let Some(value) = config.get(&key) {
                        target.set(&key, &value)?;
                    }
                }
            }
            None => self.inner.borrow_mut().push(config.clone()),
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Config> {
        self.inner
            .borrow()
            .iter()
            .find(|c| c.name() == name)
            .cloned()
    }

    pub fn get_index(&self, index: usize) -> Option<Config> {
        self.inner.borrow().get(index).cloned()
    }

    /// Remove by handle identity. Returns whether anything was removed.
    pub fn remove(&self, config: &Config) -> bool {
        let mut list = self.inner.borrow_mut();
        let before = list.len();
        list.retain(|c| !c.same_as(config));
        list.len() != before
    }

    pub fn clear(&self) {
        self.inner.borrow_mut().clear();
    }

    /// A snapshot of the current handles, in order.
    pub fn iter(&self) -> Vec<Config> {
        self.inner.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }
}

impl std::fmt::Debug for ConfigCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.inner.borrow().iter()).finish()
    }
}
