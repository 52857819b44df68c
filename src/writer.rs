//! Serialize an [`IniDocument`](crate::IniDocument) back to text.
//!
//! Output uses the document's configured dialect delimiters, so a file
//! loaded as Python-style writes with `:` and `#` while a standard file
//! writes with `=` and `;`. Anonymous items (blank lines, comment lines)
//! are reproduced where they appeared, which keeps a load/save cycle close
//! to the original bytes.

use crate::document::{IniDocument, IniItem};
use crate::reader::ReaderOptions;

/// Render a whole document.
pub fn render(doc: &IniDocument) -> String {
    let mut writer = IniWriter::new(doc.options());
    for comment in doc.initial_comment() {
        writer.write_empty(comment.as_deref());
    }
    for section in doc.sections() {
        writer.write_section(section.name(), section.comment());
        for item in section.items() {
            match item {
                IniItem::Key {
                    key,
                    value,
                    comment,
                } => writer.write_key(key, value, comment.as_deref()),
                IniItem::Blank { comment } => writer.write_empty(comment.as_deref()),
            }
        }
    }
    writer.finish()
}

/// Line-by-line INI emitter.
///
/// Separate from [`render`] so sources that stream output (or tests that
/// want a single line) can drive it directly.
pub struct IniWriter<'a> {
    out: String,
    options: &'a ReaderOptions,
}

impl<'a> IniWriter<'a> {
    pub fn new(options: &'a ReaderOptions) -> Self {
        Self {
            out: String::new(),
            options,
        }
    }

    /// Write a `[name]` header, with its trailing comment if present.
    pub fn write_section(&mut self, name: &str, comment: Option<&str>) {
        self.out.push('[');
        self.out.push_str(name);
        self.out.push(']');
        if let Some(comment) = comment {
            self.push_comment(comment);
        }
        self.out.push('\n');
    }

    /// Write a `key = value` line. The trailing comment is emitted only when
    /// the dialect accepts comments after keys; otherwise it would be read
    /// back as part of the value.
    pub fn write_key(&mut self, key: &str, value: &str, comment: Option<&str>) {
        self.out.push_str(key);
        self.out.push(' ');
        self.out.push(self.options.assign_char());
        self.out.push(' ');
        self.out.push_str(value);
        if self.options.accept_comment_after_key
            && let Some(comment) = comment
        {
            self.push_comment(comment);
        }
        self.out.push('\n');
    }

    /// Write a blank line, or a standalone comment line.
    pub fn write_empty(&mut self, comment: Option<&str>) {
        if let Some(comment) = comment {
            self.out.push(self.options.comment_char());
            self.out.push(' ');
            self.out.push_str(comment);
        }
        self.out.push('\n');
    }

    pub fn finish(self) -> String {
        self.out
    }

    fn push_comment(&mut self, comment: &str) {
        self.out.push(' ');
        self.out.push(self.options.comment_char());
        self.out.push(' ');
        self.out.push_str(comment);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::IniStyle;
    use crate::IniDocument;

    #[test]
    fn renders_standard_dialect() {
        let text = "; top\n\n[Pets] ; animals\ncat = muffy\n; note\ndog = rover\n";
        let doc = IniDocument::parse(text, IniStyle::Standard).unwrap();
        assert_eq!(doc.to_string(), text);
    }

    #[test]
    fn renders_python_dialect_delimiters() {
        let doc = IniDocument::parse("# top\n[S]\nkey : value\n", IniStyle::PythonStyle).unwrap();
        // Python style writes `:` assignments and `;` comments (the first
        // configured delimiter).
        assert_eq!(doc.to_string(), "; top\n[S]\nkey : value\n");
    }

    #[test]
    fn mysql_dialect_writes_hash_comments() {
        let doc = IniDocument::parse("# top\n[S]\nkey = v\n", IniStyle::MySqlStyle).unwrap();
        let out = doc.to_string();
        assert!(out.starts_with("# top\n"));
        assert!(out.contains("key : v\n"));
    }

    #[test]
    fn key_comment_suppressed_when_dialect_rejects_it() {
        let mut doc = IniDocument::new(IniStyle::PythonStyle);
        let section = doc.ensure_section("S");
        section.set_with_comment("key", "value", Some("lost".into()));
        assert_eq!(doc.to_string(), "[S]\nkey : value\n");
    }

    #[test]
    fn round_trip_reparse_is_identical() {
        let text = "; leading\n\n[web] ; frontend\nprotocol = http ; scheme\n\n[server]\nhost = x\n";
        let doc = IniDocument::parse(text, IniStyle::Standard).unwrap();
        let reparsed = IniDocument::parse(&doc.to_string(), IniStyle::Standard).unwrap();
        assert_eq!(doc, reparsed);
    }

    #[test]
    fn round_trip_samba_continuation_normalizes_to_one_line() {
        let text = "[S]\nkey = one \\\n   two\n";
        let doc = IniDocument::parse(text, IniStyle::SambaStyle).unwrap();
        let out = doc.to_string();
        assert!(out.contains("key = one two\n"));
        let reparsed = IniDocument::parse(&out, IniStyle::SambaStyle).unwrap();
        assert_eq!(doc, reparsed);
    }

    #[test]
    fn empty_document_renders_empty() {
        let doc = IniDocument::new(IniStyle::Standard);
        assert_eq!(doc.to_string(), "");
    }
}
