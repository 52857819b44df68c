//! The order-preserving INI document model.
//!
//! An [`IniDocument`] owns sections in declaration order; each [`IniSection`]
//! owns its line-level [`IniItem`]s, including the blank lines and comments
//! interleaved between keys. Keeping those anonymous items is what lets
//! `save()` reproduce a user's file instead of reformatting it.
//!
//! # Duplicate policy
//!
//! Re-declaring a section replaces the earlier one outright, and setting a
//! key that already exists replaces its value in place. Last one wins, both
//! for sections and for keys.
//!
//! # Extended sections
//!
//! With [`IniDocument::parse_extended`], a header of the form
//! `[Derived : Base]` inherits every key of `Base`. Inherited keys keep
//! `Base`'s ordering; keys `Derived` declares itself win on collision. The
//! base section must already exist or loading fails with
//! [`SectionExtendsMissingBase`](crate::SectionError::SectionExtendsMissingBase).

use std::fmt;
use std::path::Path;

use log::debug;

use crate::error::SectionError;
use crate::reader::{IniReader, IniStyle, IniToken, ReaderOptions};
use crate::writer;

/// One line-level entity inside a section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IniItem {
    /// A `key = value` line, with an optional trailing comment.
    Key {
        key: String,
        value: String,
        comment: Option<String>,
    },
    /// A blank line, or a standalone comment line when `comment` is set.
    Blank { comment: Option<String> },
}

impl IniItem {
    /// The key name, for `Key` items.
    pub fn key(&self) -> Option<&str> {
        match self {
            IniItem::Key { key, .. } => Some(key),
            IniItem::Blank { .. } => None,
        }
    }
}

/// A named group of key/value pairs plus its interleaved comments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IniSection {
    name: String,
    comment: Option<String>,
    items: Vec<IniItem>,
}

impl IniSection {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_comment(name, None)
    }

    pub fn with_comment(name: impl Into<String>, comment: Option<String>) -> Self {
        Self {
            name: name.into(),
            comment,
            items: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// All items in declaration order, anonymous ones included.
    pub fn items(&self) -> &[IniItem] {
        &self.items
    }

    /// The key names in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.items.iter().filter_map(IniItem::key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    /// The value of `key`, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.items.iter().find_map(|item| match item {
            IniItem::Key { key: k, value, .. } if k == key => Some(value.as_str()),
            _ => None,
        })
    }

    /// Upsert a key. An existing key keeps its position and trailing
    /// comment; a new one is appended at the end.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        match self.position(&key) {
            Some(at) => {
                if let IniItem::Key { value: v, .. } = &mut self.items[at] {
                    *v = value.into();
                }
            }
            None => self.items.push(IniItem::Key {
                key,
                value: value.into(),
                comment: None,
            }),
        }
    }

    /// Upsert a key, replacing any existing trailing comment as well.
    pub fn set_with_comment(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
        comment: Option<String>,
    ) {
        let key = key.into();
        let value = value.into();
        match self.position(&key) {
            Some(at) => self.items[at] = IniItem::Key { key, value, comment },
            None => self.items.push(IniItem::Key { key, value, comment }),
        }
    }

    /// Append an anonymous item: a blank line, or a comment line.
    pub fn push_blank(&mut self, comment: Option<String>) {
        self.items.push(IniItem::Blank { comment });
    }

    /// Remove a key. Returns whether anything was removed.
    pub fn remove(&mut self, key: &str) -> bool {
        match self.position(key) {
            Some(at) => {
                self.items.remove(at);
                true
            }
            None => false,
        }
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.items.iter().position(|item| item.key() == Some(key))
    }
}

/// An ordered collection of sections plus the leading comment block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IniDocument {
    initial_comment: Vec<Option<String>>,
    sections: Vec<IniSection>,
    options: ReaderOptions,
}

impl IniDocument {
    /// An empty document that will serialize with the given dialect.
    pub fn new(style: IniStyle) -> Self {
        Self::with_options(ReaderOptions::for_style(style))
    }

    pub fn with_options(options: ReaderOptions) -> Self {
        Self {
            initial_comment: Vec::new(),
            sections: Vec::new(),
            options,
        }
    }

    /// Parse a document from text under a dialect preset.
    pub fn parse(text: &str, style: IniStyle) -> Result<Self, SectionError> {
        Self::load(IniReader::with_style(text, style), false)
    }

    /// Parse with explicit dialect options.
    pub fn parse_with(text: &str, options: ReaderOptions) -> Result<Self, SectionError> {
        Self::load(IniReader::new(text, options), false)
    }

    /// Parse with `[Derived : Base]` section inheritance enabled.
    pub fn parse_extended(text: &str, style: IniStyle) -> Result<Self, SectionError> {
        Self::load(IniReader::with_style(text, style), true)
    }

    /// Parse with explicit dialect options and section inheritance.
    pub fn parse_extended_with(text: &str, options: ReaderOptions) -> Result<Self, SectionError> {
        Self::load(IniReader::new(text, options), true)
    }

    /// Read and parse a file.
    pub fn from_file(path: &Path, style: IniStyle) -> Result<Self, SectionError> {
        let text = std::fs::read_to_string(path).map_err(|source| SectionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, style)
    }

    fn load(reader: IniReader<'_>, extended: bool) -> Result<Self, SectionError> {
        let mut doc = Self::with_options(reader.options().clone());
        let mut current: Option<usize> = None;

        for token in reader {
            match token? {
                IniToken::Blank { .. } => match current {
                    None => doc.initial_comment.push(None),
                    Some(at) => doc.sections[at].push_blank(None),
                },
                IniToken::Comment { text, .. } => match current {
                    None => doc.initial_comment.push(Some(text)),
                    Some(at) => doc.sections[at].push_blank(Some(text)),
                },
                IniToken::Section { name, comment, .. } => {
                    // Last one wins: a re-declared section replaces the
                    // earlier one outright rather than merging into it.
                    if let Some(at) = doc.section_position(&name) {
                        doc.sections.remove(at);
                    }
                    doc.sections.push(IniSection::with_comment(name, comment));
                    current = Some(doc.sections.len() - 1);
                }
                IniToken::Key {
                    name,
                    value,
                    comment,
                    line,
                } => {
                    let Some(at) = current else {
                        return Err(SectionError::Syntax {
                            message: format!("key '{name}' appears before any section"),
                            line,
                            column: 1,
                        });
                    };
                    doc.sections[at].set_with_comment(name, value, comment);
                }
            }
        }

        if extended {
            doc.resolve_extended_sections()?;
        }
        debug!("loaded ini document with {} section(s)", doc.sections.len());
        Ok(doc)
    }

    /// Flatten `[Derived : Base]` sections into plain ones.
    fn resolve_extended_sections(&mut self) -> Result<(), SectionError> {
        for at in 0..self.sections.len() {
            let Some((derived_name, base_name)) = split_extends(self.sections[at].name()) else {
                continue;
            };
            let Some(base_at) = self.section_position(&base_name) else {
                return Err(SectionError::SectionExtendsMissingBase {
                    section: derived_name,
                    base: base_name,
                });
            };

            let mut flattened =
                IniSection::with_comment(derived_name, self.sections[at].comment.clone());
            // Inherited keys first, keeping the base's ordering. Pure
            // comments belong to the base and are not copied down.
            for item in self.sections[base_at].items() {
                if let IniItem::Key { key, value, comment } = item {
                    flattened.set_with_comment(key.clone(), value.clone(), comment.clone());
                }
            }
            // The derived section's own items overlay the inherited ones;
            // colliding keys keep the base's position but take the derived
            // value.
            for item in self.sections[at].items.clone() {
                match item {
                    IniItem::Key { key, value, comment } => {
                        flattened.set_with_comment(key, value, comment);
                    }
                    IniItem::Blank { comment } => flattened.push_blank(comment),
                }
            }
            self.sections[at] = flattened;
        }
        Ok(())
    }

    /// Sections in declaration order.
    pub fn sections(&self) -> &[IniSection] {
        &self.sections
    }

    pub fn section(&self, name: &str) -> Option<&IniSection> {
        self.section_position(name).map(|at| &self.sections[at])
    }

    pub fn section_mut(&mut self, name: &str) -> Option<&mut IniSection> {
        self.section_position(name)
            .map(|at| &mut self.sections[at])
    }

    /// Add a section, replacing any existing section of the same name.
    pub fn add_section(&mut self, section: IniSection) {
        match self.section_position(section.name()) {
            Some(at) => self.sections[at] = section,
            None => self.sections.push(section),
        }
    }

    /// The section named `name`, created empty at the end if absent.
    pub fn ensure_section(&mut self, name: &str) -> &mut IniSection {
        let at = match self.section_position(name) {
            Some(at) => at,
            None => {
                self.sections.push(IniSection::new(name));
                self.sections.len() - 1
            }
        };
        &mut self.sections[at]
    }

    /// Remove a section by name. Returns whether anything was removed.
    pub fn remove_section(&mut self, name: &str) -> bool {
        match self.section_position(name) {
            Some(at) => {
                self.sections.remove(at);
                true
            }
            None => false,
        }
    }

    /// The comment block before the first section. `None` entries are blank
    /// lines.
    pub fn initial_comment(&self) -> &[Option<String>] {
        &self.initial_comment
    }

    pub fn push_initial_comment(&mut self, comment: Option<String>) {
        self.initial_comment.push(comment);
    }

    /// The dialect options this document was loaded with (and serializes
    /// under).
    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    /// Serialize to a file through the writer.
    pub fn save(&self, path: &Path) -> Result<(), SectionError> {
        std::fs::write(path, self.to_string()).map_err(|source| SectionError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    fn section_position(&self, name: &str) -> Option<usize> {
        self.sections.iter().position(|s| s.name == name)
    }
}

impl fmt::Display for IniDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&writer::render(self))
    }
}

/// Split a `Derived : Base` section name. Plain names return `None`.
fn split_extends(name: &str) -> Option<(String, String)> {
    let (derived, base) = name.split_once(':')?;
    Some((derived.trim().to_string(), base.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_sections_and_values() {
        let doc = IniDocument::parse("[Pets]\ncat = muffy\ndog = rover\n", IniStyle::Standard)
            .unwrap();
        let pets = doc.section("Pets").unwrap();
        assert_eq!(pets.get("cat"), Some("muffy"));
        assert_eq!(pets.get("dog"), Some("rover"));
        assert_eq!(pets.keys().count(), 2);
    }

    #[test]
    fn initial_comment_block_preserved() {
        let doc =
            IniDocument::parse("; top of file\n\n[S]\nk = v\n", IniStyle::Standard).unwrap();
        assert_eq!(
            doc.initial_comment(),
            &[Some("top of file".to_string()), None]
        );
    }

    #[test]
    fn interleaved_comments_kept_as_items() {
        let doc = IniDocument::parse("[S]\na = 1\n; middle\n\nb = 2\n", IniStyle::Standard)
            .unwrap();
        let items = doc.section("S").unwrap().items();
        assert_eq!(items.len(), 4);
        assert_eq!(
            items[1],
            IniItem::Blank {
                comment: Some("middle".into())
            }
        );
        assert_eq!(items[2], IniItem::Blank { comment: None });
    }

    #[test]
    fn redeclared_section_last_wins() {
        let doc =
            IniDocument::parse("[A]\nfoo=1\n[A]\nfoo=2\n", IniStyle::Standard).unwrap();
        assert_eq!(doc.sections().len(), 1);
        assert_eq!(doc.section("A").unwrap().get("foo"), Some("2"));
    }

    #[test]
    fn duplicate_key_last_wins_in_place() {
        let doc =
            IniDocument::parse("[S]\na = 1\nb = 2\na = 3\n", IniStyle::Standard).unwrap();
        let section = doc.section("S").unwrap();
        assert_eq!(section.get("a"), Some("3"));
        let keys: Vec<_> = section.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn key_before_section_is_a_syntax_error() {
        let err = IniDocument::parse("orphan = 1\n", IniStyle::Standard).unwrap_err();
        assert!(matches!(err, SectionError::Syntax { line: 1, .. }));
    }

    #[test]
    fn set_appends_new_key_at_end() {
        let mut section = IniSection::new("S");
        section.set("a", "1");
        section.set("b", "2");
        section.set("a", "9");
        let keys: Vec<_> = section.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(section.get("a"), Some("9"));
    }

    #[test]
    fn remove_key() {
        let mut section = IniSection::new("S");
        section.set("a", "1");
        assert!(section.remove("a"));
        assert!(!section.remove("a"));
        assert_eq!(section.get("a"), None);
    }

    #[test]
    fn remove_section_by_name() {
        let mut doc = IniDocument::parse("[A]\nx = 1\n[B]\ny = 2\n", IniStyle::Standard).unwrap();
        assert!(doc.remove_section("A"));
        assert!(!doc.remove_section("A"));
        assert_eq!(doc.sections().len(), 1);
    }

    // --- extended sections ---

    #[test]
    fn extended_section_inherits_base_keys() {
        let text = "[Base]\ncolor = red\n[Derived : Base]\nshape = circle\n";
        let doc = IniDocument::parse_extended(text, IniStyle::Standard).unwrap();
        let derived = doc.section("Derived").unwrap();
        assert_eq!(derived.get("color"), Some("red"));
        assert_eq!(derived.get("shape"), Some("circle"));
        // The base keeps its separate existence.
        assert!(doc.section("Base").is_some());
        assert!(doc.section("Derived : Base").is_none());
    }

    #[test]
    fn extended_section_own_value_wins_at_base_position() {
        let text = "[Base]\na = 1\nb = 2\n[D : Base]\nb = 9\nc = 3\n";
        let doc = IniDocument::parse_extended(text, IniStyle::Standard).unwrap();
        let derived = doc.section("D").unwrap();
        let keys: Vec<_> = derived.keys().collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert_eq!(derived.get("b"), Some("9"));
    }

    #[test]
    fn extended_section_missing_base_fails() {
        let text = "[Derived : Base]\nshape = circle\n";
        let err = IniDocument::parse_extended(text, IniStyle::Standard).unwrap_err();
        match err {
            SectionError::SectionExtendsMissingBase { section, base } => {
                assert_eq!(section, "Derived");
                assert_eq!(base, "Base");
            }
            other => panic!("expected SectionExtendsMissingBase, got {other:?}"),
        }
    }

    #[test]
    fn plain_parse_keeps_colon_section_names() {
        let text = "[Derived : Base]\nshape = circle\n";
        let doc = IniDocument::parse(text, IniStyle::Standard).unwrap();
        assert!(doc.section("Derived : Base").is_some());
    }
}
