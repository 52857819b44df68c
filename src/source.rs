//! Source orchestration: the shared core every config source embeds.
//!
//! A source owns a [`ConfigCollection`], a global alias table, and the
//! autosave flag, and provides merge, substitution, and save/reload
//! notification plumbing. Concrete sources (the INI-backed one here;
//! XML-, argv-, or registry-backed adapters elsewhere) embed a
//! [`SourceCore`] and implement [`ConfigSource`] on top of it.
//!
//! # Autosave
//!
//! A concrete source registers its flush function once via
//! [`SourceCore::set_save_hook`]. Every config the core adopts gets a
//! wrapper hook that checks the autosave flag and calls the flush, so a
//! plain `config.set(...)` persists immediately when autosave is on. Hooks
//! hold only weak references back to the core; dropping the source drops
//! everything.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use log::debug;

use crate::alias::{AliasText, SharedAlias};
use crate::config::{Config, ConfigCollection, SaveHook};
use crate::error::SectionError;
use crate::substitute;

/// Handle returned by [`SourceCore::on_saved`] / [`SourceCore::on_reloaded`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceObserverId(usize);

type SourceObserver = Rc<dyn Fn()>;

struct CoreInner {
    configs: ConfigCollection,
    alias: SharedAlias,
    auto_save: bool,
    replace_text: bool,
    expanded: bool,
    save_hook: Option<SaveHook>,
    /// Identity tokens of sources merged into this one, for traceability.
    merged: Vec<Rc<()>>,
    saved_observers: Vec<(SourceObserverId, SourceObserver)>,
    reloaded_observers: Vec<(SourceObserverId, SourceObserver)>,
    next_observer: usize,
}

/// The shared state every config source carries. Cheap to clone; clones
/// share state.
#[derive(Clone)]
pub struct SourceCore {
    /// Unique per logical source; used to detect self- and repeat-merges.
    identity: Rc<()>,
    inner: Rc<RefCell<CoreInner>>,
}

impl Default for SourceCore {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceCore {
    pub fn new() -> Self {
        Self {
            identity: Rc::new(()),
            inner: Rc::new(RefCell::new(CoreInner {
                configs: ConfigCollection::new(),
                alias: AliasText::new().into_shared(),
                auto_save: false,
                replace_text: false,
                expanded: false,
                save_hook: None,
                merged: Vec::new(),
                saved_observers: Vec::new(),
                reloaded_observers: Vec::new(),
                next_observer: 0,
            })),
        }
    }

    /// The configs, running the one-shot substitution pass first when
    /// replace-text mode is enabled.
    pub fn configs(&self) -> Result<ConfigCollection, SectionError> {
        let pending = {
            let inner = self.inner.borrow();
            inner.replace_text && !inner.expanded
        };
        if pending {
            substitute::expand_key_values(&self.collection())?;
            self.inner.borrow_mut().expanded = true;
        }
        Ok(self.collection())
    }

    /// The collection without triggering substitution.
    pub(crate) fn collection(&self) -> ConfigCollection {
        self.inner.borrow().configs.clone()
    }

    /// The source-global alias table that configs fall back to.
    pub fn alias(&self) -> SharedAlias {
        self.inner.borrow().alias.clone()
    }

    /// Establish one shared alias table: it becomes the global table and
    /// replaces every current config's own table.
    pub fn set_global_alias(&self, alias: SharedAlias) {
        self.inner.borrow_mut().alias = alias.clone();
        for config in self.collection().iter() {
            config.set_alias(alias.clone());
            config.set_fallback_alias(alias.clone());
        }
    }

    pub fn auto_save(&self) -> bool {
        self.inner.borrow().auto_save
    }

    pub fn set_auto_save(&self, enabled: bool) {
        self.inner.borrow_mut().auto_save = enabled;
    }

    pub fn replace_text(&self) -> bool {
        self.inner.borrow().replace_text
    }

    /// Enable the lazy `${...}` substitution pass. It runs on the next
    /// [`configs`](Self::configs) access and is idempotent afterwards.
    pub fn set_replace_text(&self, enabled: bool) {
        let mut inner = self.inner.borrow_mut();
        inner.replace_text = enabled;
        inner.expanded = false;
    }

    /// Run the substitution pass now.
    pub fn expand_key_values(&self) -> Result<(), SectionError> {
        substitute::expand_key_values(&self.collection())?;
        self.inner.borrow_mut().expanded = true;
        Ok(())
    }

    /// Create an empty config owned by this source.
    pub fn add_config(&self, name: &str) -> Result<Config, SectionError> {
        if self.collection().get(name).is_some() {
            return Err(SectionError::ConfigAlreadyExists {
                name: name.to_string(),
            });
        }
        let config = Config::new(name);
        self.adopt(&config)?;
        Ok(config)
    }

    /// Wire a config into this source: alias fallback, autosave hook, and
    /// collection membership (with the collection's upsert semantics).
    pub fn adopt(&self, config: &Config) -> Result<(), SectionError> {
        config.set_fallback_alias(self.alias());
        config.set_save_hook(Some(self.autosave_hook()));
        self.collection().add(config)
    }

    /// Merge another source's configs into this one, later values winning
    /// per key and no config duplicated by name.
    pub fn merge(&self, other: &SourceCore) -> Result<(), SectionError> {
        if Rc::ptr_eq(&self.identity, &other.identity) {
            return Err(SectionError::SelfMerge);
        }
        {
            let mut inner = self.inner.borrow_mut();
            if inner
                .merged
                .iter()
                .any(|token| Rc::ptr_eq(token, &other.identity))
            {
                return Err(SectionError::AlreadyMerged);
            }
            inner.merged.push(other.identity.clone());
        }
        debug!("merging {} config(s) into source", other.collection().len());
        for config in other.collection().iter() {
            self.collection().add(&config)?;
        }
        Ok(())
    }

    /// How many sources have been merged into this one.
    pub fn merged_count(&self) -> usize {
        self.inner.borrow().merged.len()
    }

    /// Register the concrete source's flush function, used by autosave.
    pub fn set_save_hook(&self, hook: SaveHook) {
        self.inner.borrow_mut().save_hook = Some(hook);
    }

    pub(crate) fn reset_expanded(&self) {
        self.inner.borrow_mut().expanded = false;
    }

    /// The per-config hook: flush through the concrete source when
    /// autosave is on. Holds the core weakly so configs never keep a
    /// dropped source alive.
    fn autosave_hook(&self) -> SaveHook {
        let core: Weak<RefCell<CoreInner>> = Rc::downgrade(&self.inner);
        Rc::new(move || {
            let Some(inner) = core.upgrade() else {
                return Ok(());
            };
            let hook = {
                let inner = inner.borrow();
                if !inner.auto_save {
                    return Ok(());
                }
                inner.save_hook.clone()
            };
            match hook {
                Some(flush) => flush(),
                None => Ok(()),
            }
        })
    }

    // --- save/reload notifications ---

    pub fn on_saved(&self, observer: impl Fn() + 'static) -> SourceObserverId {
        let mut inner = self.inner.borrow_mut();
        let id = SourceObserverId(inner.next_observer);
        inner.next_observer += 1;
        inner.saved_observers.push((id, Rc::new(observer)));
        id
    }

    pub fn on_reloaded(&self, observer: impl Fn() + 'static) -> SourceObserverId {
        let mut inner = self.inner.borrow_mut();
        let id = SourceObserverId(inner.next_observer);
        inner.next_observer += 1;
        inner.reloaded_observers.push((id, Rc::new(observer)));
        id
    }

    pub fn remove_observer(&self, id: SourceObserverId) -> bool {
        let mut inner = self.inner.borrow_mut();
        let before = inner.saved_observers.len() + inner.reloaded_observers.len();
        inner.saved_observers.retain(|(oid, _)| *oid != id);
        inner.reloaded_observers.retain(|(oid, _)| *oid != id);
        inner.saved_observers.len() + inner.reloaded_observers.len() != before
    }

    /// Raised by concrete sources after their own I/O succeeds.
    pub fn notify_saved(&self) {
        for observer in self.snapshot(|inner| &inner.saved_observers) {
            observer();
        }
    }

    pub fn notify_reloaded(&self) {
        for observer in self.snapshot(|inner| &inner.reloaded_observers) {
            observer();
        }
    }

    fn snapshot(
        &self,
        pick: impl Fn(&CoreInner) -> &Vec<(SourceObserverId, SourceObserver)>,
    ) -> Vec<SourceObserver> {
        let inner = self.inner.borrow();
        pick(&inner).iter().map(|(_, o)| o.clone()).collect()
    }
}

/// The contract every config source satisfies, whatever its backing store.
///
/// The provided methods cover the format-agnostic surface; concrete
/// sources override [`save`](Self::save) and [`reload`](Self::reload) to
/// perform their I/O and then raise the notifications.
pub trait ConfigSource {
    /// The embedded orchestration core.
    fn core(&self) -> &SourceCore;

    /// The configs, after the lazy substitution pass if enabled.
    fn configs(&self) -> Result<ConfigCollection, SectionError> {
        self.core().configs()
    }

    /// Create an empty, owned config.
    fn add_config(&self, name: &str) -> Result<Config, SectionError> {
        self.core().add_config(name)
    }

    /// Merge another source's configs into this one.
    fn merge(&self, other: &dyn ConfigSource) -> Result<(), SectionError> {
        self.core().merge(other.core())
    }

    /// Expand `${...}` references across all configs.
    fn expand_key_values(&self) -> Result<(), SectionError> {
        self.core().expand_key_values()
    }

    /// Persist. The default only raises the `Saved` notification, for
    /// sources with no backing store of their own.
    fn save(&self) -> Result<(), SectionError> {
        self.core().notify_saved();
        Ok(())
    }

    /// Re-read the backing store. The default only raises the `Reloaded`
    /// notification.
    fn reload(&self) -> Result<(), SectionError> {
        self.core().notify_reloaded();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct MemorySource {
        core: SourceCore,
    }

    impl MemorySource {
        fn new() -> Self {
            Self {
                core: SourceCore::new(),
            }
        }
    }

    impl ConfigSource for MemorySource {
        fn core(&self) -> &SourceCore {
            &self.core
        }
    }

    #[test]
    fn add_config_rejects_duplicate_name() {
        let source = MemorySource::new();
        source.add_config("app").unwrap();
        let err = source.add_config("app").unwrap_err();
        assert!(matches!(err, SectionError::ConfigAlreadyExists { name } if name == "app"));
    }

    #[test]
    fn merge_upserts_overlapping_sections() {
        let a = MemorySource::new();
        let x = a.add_config("X").unwrap();
        x.set("keep", "a").unwrap();
        x.set("shared", "a").unwrap();

        let b = MemorySource::new();
        let bx = b.add_config("X").unwrap();
        bx.set("shared", "b").unwrap();
        bx.set("extra", "b").unwrap();

        a.merge(&b).unwrap();
        let configs = a.configs().unwrap();
        assert_eq!(configs.len(), 1);
        let merged = configs.get("X").unwrap();
        assert_eq!(merged.get("keep").as_deref(), Some("a"));
        assert_eq!(merged.get("shared").as_deref(), Some("b"));
        assert_eq!(merged.get("extra").as_deref(), Some("b"));
    }

    #[test]
    fn merge_keeps_disjoint_sections() {
        let a = MemorySource::new();
        a.add_config("A").unwrap();
        let b = MemorySource::new();
        b.add_config("B").unwrap();
        a.merge(&b).unwrap();
        let configs = a.configs().unwrap();
        assert_eq!(configs.len(), 2);
        assert!(configs.get("B").is_some());
    }

    #[test]
    fn merging_same_source_twice_fails() {
        let a = MemorySource::new();
        let b = MemorySource::new();
        a.merge(&b).unwrap();
        assert!(matches!(a.merge(&b), Err(SectionError::AlreadyMerged)));
        assert_eq!(a.core().merged_count(), 1);
    }

    #[test]
    fn merging_source_into_itself_fails() {
        let a = MemorySource::new();
        assert!(matches!(a.merge(&a), Err(SectionError::SelfMerge)));
    }

    #[test]
    fn global_alias_shared_across_configs() {
        let source = MemorySource::new();
        let first = source.add_config("first").unwrap();
        let second = source.add_config("second").unwrap();
        first.set("flag", "aye").unwrap();
        second.set("flag", "aye").unwrap();

        let shared = AliasText::new().into_shared();
        shared.borrow_mut().add_boolean("aye", true);
        source.core().set_global_alias(shared);

        assert!(first.get_boolean("flag").unwrap());
        assert!(second.get_boolean("flag").unwrap());
    }

    #[test]
    fn global_alias_starts_empty_until_registered() {
        let source = MemorySource::new();
        let config = source.add_config("app").unwrap();
        config.set("debug", "On").unwrap();
        // No alias is known until the caller registers one.
        let err = config.get_boolean("debug").unwrap_err();
        assert!(matches!(err, SectionError::AliasNotFound { value } if value == "On"));

        source.core().alias().borrow_mut().add_boolean("on", true);
        assert!(config.get_boolean("debug").unwrap());
    }

    #[test]
    fn with_defaults_table_is_an_opt_in_global() {
        let source = MemorySource::new();
        let config = source.add_config("app").unwrap();
        config.set("debug", "On").unwrap();
        source
            .core()
            .set_global_alias(AliasText::with_defaults().into_shared());
        assert!(config.get_boolean("debug").unwrap());
    }

    #[test]
    fn replace_text_expands_lazily_once() {
        let source = MemorySource::new();
        let config = source.add_config("web").unwrap();
        config.set("protocol", "http").unwrap();
        config.set("domain", "${protocol}://x/").unwrap();
        source.core().set_replace_text(true);

        let configs = source.configs().unwrap();
        assert_eq!(
            configs.get("web").unwrap().get("domain").as_deref(),
            Some("http://x/")
        );
        // Second access is a no-op.
        source.configs().unwrap();
        assert_eq!(
            config.get("domain").as_deref(),
            Some("http://x/")
        );
    }

    #[test]
    fn autosave_hook_flushes_on_set() {
        let source = MemorySource::new();
        let flushes = Rc::new(Cell::new(0));
        let counter = flushes.clone();
        source.core().set_save_hook(Rc::new(move || {
            counter.set(counter.get() + 1);
            Ok(())
        }));
        let config = source.add_config("app").unwrap();

        config.set("a", "1").unwrap();
        assert_eq!(flushes.get(), 0); // autosave off

        source.core().set_auto_save(true);
        config.set("a", "2").unwrap();
        config.set("b", "3").unwrap();
        assert_eq!(flushes.get(), 2);
    }

    #[test]
    fn saved_and_reloaded_notifications() {
        let source = MemorySource::new();
        let saved = Rc::new(Cell::new(0));
        let reloaded = Rc::new(Cell::new(0));
        let s = saved.clone();
        let r = reloaded.clone();
        source.core().on_saved(move || s.set(s.get() + 1));
        let id = source.core().on_reloaded(move || r.set(r.get() + 1));

        source.save().unwrap();
        source.reload().unwrap();
        assert_eq!(saved.get(), 1);
        assert_eq!(reloaded.get(), 1);

        assert!(source.core().remove_observer(id));
        source.reload().unwrap();
        assert_eq!(reloaded.get(), 1);
    }
}
