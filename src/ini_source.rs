//! The INI-backed config source.
//!
//! Wraps an [`IniDocument`] and projects its sections into live
//! [`Config`]s. Saving projects the configs back into the document, so
//! comments, blank lines, and ordering written by hand survive a
//! load/modify/save cycle untouched.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use log::info;

use crate::config::{Config, ConfigCollection};
use crate::document::{IniDocument, IniItem};
use crate::error::SectionError;
use crate::reader::{IniStyle, ReaderOptions};
use crate::source::{ConfigSource, SourceCore};

struct IniState {
    document: IniDocument,
    path: Option<PathBuf>,
    extended: bool,
}

/// A config source backed by an INI document, in memory or on disk.
pub struct IniConfigSource {
    core: SourceCore,
    state: Rc<RefCell<IniState>>,
}

impl IniConfigSource {
    /// An empty source with no backing file. Call
    /// [`save_to`](Self::save_to) to give it one.
    pub fn new(style: IniStyle) -> Self {
        Self::build(IniDocument::new(style), None, false)
    }

    /// Parse INI text. The source has no backing file until
    /// [`save_to`](Self::save_to).
    pub fn from_str(text: &str, style: IniStyle) -> Result<Self, SectionError> {
        Ok(Self::build(IniDocument::parse(text, style)?, None, false))
    }

    /// Parse INI text with `[Derived : Base]` section inheritance.
    pub fn from_str_extended(text: &str, style: IniStyle) -> Result<Self, SectionError> {
        Ok(Self::build(IniDocument::parse_extended(text, style)?, None, true))
    }

    /// Parse INI text with explicit dialect options.
    pub fn from_str_with(text: &str, options: ReaderOptions) -> Result<Self, SectionError> {
        Ok(Self::build(IniDocument::parse_with(text, options)?, None, false))
    }

    /// Load a file. The path sticks, so [`save`](ConfigSource::save) and
    /// [`reload`](ConfigSource::reload) work without further setup.
    pub fn from_file(path: impl AsRef<Path>, style: IniStyle) -> Result<Self, SectionError> {
        let path = path.as_ref();
        let document = IniDocument::from_file(path, style)?;
        Ok(Self::build(document, Some(path.to_path_buf()), false))
    }

    /// Load a file with section inheritance enabled.
    pub fn from_file_extended(
        path: impl AsRef<Path>,
        style: IniStyle,
    ) -> Result<Self, SectionError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SectionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let document = IniDocument::parse_extended(&text, style)?;
        Ok(Self::build(document, Some(path.to_path_buf()), true))
    }

    fn build(document: IniDocument, path: Option<PathBuf>, extended: bool) -> Self {
        let core = SourceCore::new();
        let state = Rc::new(RefCell::new(IniState {
            document,
            path,
            extended,
        }));

        // Autosave flush. Captures the document weakly so configs handed
        // out to callers never keep a dropped source's file state alive.
        let hook = {
            let state = Rc::downgrade(&state);
            let configs = core.collection();
            Rc::new(move || match state.upgrade() {
                Some(state) => flush(&state, &configs),
                None => Ok(()),
            })
        };
        core.set_save_hook(hook);

        let source = Self { core, state };
        source.project_document();
        source
    }

    /// Rebuild the collection from the current document.
    fn project_document(&self) {
        let state = self.state.borrow();
        for section in state.document.sections() {
            let config = Config::new(section.name());
            for item in section.items() {
                if let IniItem::Key { key, value, .. } = item {
                    config.add(key, value);
                }
            }
            // Adoption cannot collide: section names are unique after load.
            let _ = self.core.adopt(&config);
        }
    }

    /// The file this source reads and writes, once established.
    pub fn path(&self) -> Option<PathBuf> {
        self.state.borrow().path.clone()
    }

    pub fn auto_save(&self) -> bool {
        self.core.auto_save()
    }

    /// Persist after every key mutation.
    pub fn set_auto_save(&self, enabled: bool) {
        self.core.set_auto_save(enabled);
    }

    /// Expand `${...}` references on the next configs access.
    pub fn set_replace_text(&self, enabled: bool) {
        self.core.set_replace_text(enabled);
    }

    /// Establish (or change) the backing file, then save to it.
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), SectionError> {
        self.state.borrow_mut().path = Some(path.as_ref().to_path_buf());
        self.save()
    }

    /// The document as INI text, with the live configs projected in.
    pub fn to_ini_string(&self) -> String {
        let mut state = self.state.borrow_mut();
        project(&mut state.document, &self.core.collection());
        state.document.to_string()
    }
}

impl ConfigSource for IniConfigSource {
    fn core(&self) -> &SourceCore {
        &self.core
    }

    fn save(&self) -> Result<(), SectionError> {
        flush(&self.state, &self.core.collection())?;
        self.core.notify_saved();
        Ok(())
    }

    fn reload(&self) -> Result<(), SectionError> {
        let (path, options, extended) = {
            let state = self.state.borrow();
            let path = state.path.clone().ok_or(SectionError::NotSavable)?;
            (path, state.document.options().clone(), state.extended)
        };
        let text = std::fs::read_to_string(&path).map_err(|source| SectionError::Io {
            path: path.clone(),
            source,
        })?;
        let document = if extended {
            IniDocument::parse_extended_with(&text, options)?
        } else {
            IniDocument::parse_with(&text, options)?
        };
        info!("reloaded {} section(s) from {}", document.sections().len(), path.display());

        self.state.borrow_mut().document = document;
        self.core.collection().clear();
        self.project_document();
        self.core.reset_expanded();
        self.core.notify_reloaded();
        Ok(())
    }
}

/// Project the configs into the document and write it out.
fn flush(
    state: &RefCell<IniState>,
    configs: &ConfigCollection,
) -> Result<(), SectionError> {
    let mut state = state.borrow_mut();
    let path = state.path.clone().ok_or(SectionError::NotSavable)?;
    project(&mut state.document, configs);
    state.document.save(&path)
}

/// One-way sync: configs are the truth for sections, keys, and values;
/// the document keeps everything else (comments, blanks, order).
fn project(document: &mut IniDocument, configs: &ConfigCollection) {
    let live: Vec<String> = configs.iter().iter().map(Config::name).collect();
    let stale: Vec<String> = document
        .sections()
        .iter()
        .map(|s| s.name().to_string())
        .filter(|name| !live.contains(name))
        .collect();
    for name in stale {
        document.remove_section(&name);
    }

    for config in configs.iter() {
        let section = document.ensure_section(&config.name());
        let removed: Vec<String> = section
            .keys()
            .filter(|key| !config.contains(key))
            .map(str::to_string)
            .collect();
        for key in removed {
            section.remove(&key);
        }
        for key in config.keys() {
            let value = config.get(&key).unwrap_or_default();
            section.set(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::fs;
    use tempfile::tempdir;

    const SAMPLE: &str = "\
; startup settings
[Logging]
level = debug ; verbose for now
file = app.log

[Server]
port = 8080
";

    #[test]
    fn sections_project_into_configs() {
        let source = IniConfigSource::from_str(SAMPLE, IniStyle::Standard).unwrap();
        let configs = source.configs().unwrap();
        assert_eq!(configs.len(), 2);
        let logging = configs.get("Logging").unwrap();
        assert_eq!(logging.get("level").as_deref(), Some("debug"));
        assert_eq!(configs.get("Server").unwrap().get_int("port").unwrap(), 8080);
    }

    #[test]
    fn untouched_source_round_trips_byte_identical() {
        let source = IniConfigSource::from_str(SAMPLE, IniStyle::Standard).unwrap();
        assert_eq!(source.to_ini_string(), SAMPLE);
    }

    #[test]
    fn set_and_save_preserves_comments() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.ini");
        fs::write(&path, SAMPLE).unwrap();

        let source = IniConfigSource::from_file(&path, IniStyle::Standard).unwrap();
        let logging = source.configs().unwrap().get("Logging").unwrap();
        logging.set("level", "warn").unwrap();
        source.save().unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("; startup settings"));
        assert!(written.contains("level = warn ; verbose for now"));
        assert!(written.contains("file = app.log"));
    }

    #[test]
    fn autosave_writes_without_explicit_save() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("auto.ini");
        fs::write(&path, "[App]\nruns = 1\n").unwrap();

        let source = IniConfigSource::from_file(&path, IniStyle::Standard).unwrap();
        source.set_auto_save(true);
        let app = source.configs().unwrap().get("App").unwrap();
        app.set_int("runs", 2).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("runs = 2"));
    }

    #[test]
    fn save_without_path_fails() {
        let source = IniConfigSource::from_str("[A]\nk = v\n", IniStyle::Standard).unwrap();
        assert!(matches!(source.save(), Err(SectionError::NotSavable)));
    }

    #[test]
    fn save_to_establishes_the_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fresh.ini");

        let source = IniConfigSource::new(IniStyle::Standard);
        let app = source.add_config("App").unwrap();
        app.set("name", "demo").unwrap();
        source.save_to(&path).unwrap();

        assert_eq!(source.path(), Some(path.clone()));
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("[App]"));
        assert!(written.contains("name = demo"));

        // Subsequent plain saves reuse the path.
        app.set("name", "demo2").unwrap();
        source.save().unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains("name = demo2"));
    }

    #[test]
    fn removed_keys_and_configs_are_pruned_on_save() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prune.ini");
        fs::write(&path, SAMPLE).unwrap();

        let source = IniConfigSource::from_file(&path, IniStyle::Standard).unwrap();
        let configs = source.configs().unwrap();
        configs.get("Logging").unwrap().remove("file");
        let server = configs.get("Server").unwrap();
        configs.remove(&server);
        source.save().unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(!written.contains("file = app.log"));
        assert!(!written.contains("[Server]"));
        assert!(written.contains("level = debug"));
    }

    #[test]
    fn reload_picks_up_external_edits() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("watched.ini");
        fs::write(&path, "[App]\nmode = a\n").unwrap();

        let source = IniConfigSource::from_file(&path, IniStyle::Standard).unwrap();
        let reloads = Rc::new(Cell::new(0));
        let counter = reloads.clone();
        source.core().on_reloaded(move || counter.set(counter.get() + 1));

        fs::write(&path, "[App]\nmode = b\n[New]\nx = 1\n").unwrap();
        source.reload().unwrap();

        let configs = source.configs().unwrap();
        assert_eq!(configs.get("App").unwrap().get("mode").as_deref(), Some("b"));
        assert!(configs.get("New").is_some());
        assert_eq!(reloads.get(), 1);
    }

    #[test]
    fn merged_sources_save_through_the_target() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("base.ini");
        fs::write(&path, "[App]\na = 1\n").unwrap();

        let base = IniConfigSource::from_file(&path, IniStyle::Standard).unwrap();
        let overlay =
            IniConfigSource::from_str("[App]\na = 2\nb = 3\n", IniStyle::Standard).unwrap();
        base.merge(&overlay).unwrap();
        base.save().unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("a = 2"));
        assert!(written.contains("b = 3"));
    }

    #[test]
    fn replace_text_applies_before_first_configs_access() {
        let text = "[Web]\nprotocol = https\nhost = example.org\nurl = ${protocol}://${host}/\n";
        let source = IniConfigSource::from_str(text, IniStyle::Standard).unwrap();
        source.set_replace_text(true);
        let web = source.configs().unwrap().get("Web").unwrap();
        assert_eq!(web.get("url").as_deref(), Some("https://example.org/"));
    }

    #[test]
    fn python_style_source_round_trips_its_delimiters() {
        let text = "[paths]\nhome : /opt/app\n";
        let source = IniConfigSource::from_str(text, IniStyle::PythonStyle).unwrap();
        assert_eq!(source.to_ini_string(), text);
    }

    #[test]
    fn extended_source_flattens_inheritance() {
        let text = "\
[base]
timeout = 30
retries = 2

[fast : base]
timeout = 5
";
        let source = IniConfigSource::from_str_extended(text, IniStyle::Standard).unwrap();
        let fast = source.configs().unwrap().get("fast").unwrap();
        assert_eq!(fast.get_int("timeout").unwrap(), 5);
        assert_eq!(fast.get_int("retries").unwrap(), 2);
    }
}
