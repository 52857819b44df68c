//! The INI tokenizer: turns text into a stream of typed tokens.
//!
//! The reader works on whole logical lines. When line continuation is
//! enabled, physical lines ending in `\` are joined before classification.
//! Each logical line becomes exactly one token:
//!
//! - blank lines → [`IniToken::Blank`]
//! - lines starting with a comment delimiter → [`IniToken::Comment`]
//! - `[name]` headers → [`IniToken::Section`]
//! - `key = value` lines → [`IniToken::Key`]
//!
//! Anything else is a syntax error carrying the line and column where
//! classification failed. The reader never recovers: callers abort the load
//! on the first error.
//!
//! # Dialects
//!
//! Real-world INI is a family of formats, not one. [`ReaderOptions`] exposes
//! each dialect knob independently; [`IniStyle`] bundles the five supported
//! presets. The same options also drive the writer, so a document loaded as
//! [`IniStyle::PythonStyle`] saves with `:` and `#` rather than `=` and `;`.

use crate::error::SectionError;

/// The supported INI dialect presets.
///
/// | Style | Assign | Comment | Trailing comments | Quirks |
/// |-------|--------|---------|-------------------|--------|
/// | `Standard` | `=` | `;` | yes | |
/// | `PythonStyle` | `:` | `;` `#` | no | |
/// | `SambaStyle` | `=` | `;` `#` | no | `\` line continuation |
/// | `MySqlStyle` | `:` `=` | `#` | no | bare keys allowed |
/// | `WindowsStyle` | `=` | `;` | no | value runs to end of line |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IniStyle {
    #[default]
    Standard,
    PythonStyle,
    SambaStyle,
    MySqlStyle,
    WindowsStyle,
}

/// Dialect configuration for the reader and writer.
///
/// All knobs are independent; [`ReaderOptions::for_style`] provides the
/// presets described on [`IniStyle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Characters that start a comment (first entry is used when writing).
    pub comment_delimiters: Vec<char>,
    /// Characters that separate key from value (first entry is used when writing).
    pub assign_delimiters: Vec<char>,
    /// Whether a comment may trail a `key = value` line. When off, comment
    /// characters inside a value are taken literally up to end of line.
    pub accept_comment_after_key: bool,
    /// Whether a line ending in `\` joins with the next physical line.
    pub line_continuation: bool,
    /// Whether a bare token with no assignment delimiter is accepted as a
    /// key with an empty value (MySQL's `loose-mode`).
    pub accept_no_assignment: bool,
    /// Whether everything after the delimiter is taken verbatim as the
    /// value, with no comment stripping (Windows-style `;` in values).
    pub consume_all_key_text: bool,
    /// Skip comment lines instead of surfacing them as tokens. Off by
    /// default so documents round-trip faithfully.
    pub ignore_comments: bool,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self::for_style(IniStyle::Standard)
    }
}

impl ReaderOptions {
    /// The preset options for a dialect.
    pub fn for_style(style: IniStyle) -> Self {
        let base = Self {
            comment_delimiters: vec![';'],
            assign_delimiters: vec!['='],
            accept_comment_after_key: true,
            line_continuation: false,
            accept_no_assignment: false,
            consume_all_key_text: false,
            ignore_comments: false,
        };
        match style {
            IniStyle::Standard => base,
            IniStyle::PythonStyle => Self {
                comment_delimiters: vec![';', '#'],
                assign_delimiters: vec![':'],
                accept_comment_after_key: false,
                ..base
            },
            IniStyle::SambaStyle => Self {
                comment_delimiters: vec![';', '#'],
                accept_comment_after_key: false,
                line_continuation: true,
                ..base
            },
            IniStyle::MySqlStyle => Self {
                comment_delimiters: vec!['#'],
                assign_delimiters: vec![':', '='],
                accept_comment_after_key: false,
                accept_no_assignment: true,
                ..base
            },
            IniStyle::WindowsStyle => Self {
                accept_comment_after_key: false,
                consume_all_key_text: true,
                ..base
            },
        }
    }

    /// The delimiter the writer uses for assignments.
    pub fn assign_char(&self) -> char {
        self.assign_delimiters.first().copied().unwrap_or('=')
    }

    /// The delimiter the writer uses for comments.
    pub fn comment_char(&self) -> char {
        self.comment_delimiters.first().copied().unwrap_or(';')
    }

    fn is_comment(&self, c: char) -> bool {
        self.comment_delimiters.contains(&c)
    }

    fn find_assign(&self, s: &str) -> Option<usize> {
        s.char_indices()
            .find(|(_, c)| self.assign_delimiters.contains(c))
            .map(|(i, _)| i)
    }

    fn find_comment(&self, s: &str) -> Option<usize> {
        s.char_indices()
            .find(|(_, c)| self.is_comment(*c))
            .map(|(i, _)| i)
    }
}

/// One classified logical line. `line` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IniToken {
    Section {
        name: String,
        comment: Option<String>,
        line: usize,
    },
    Key {
        name: String,
        value: String,
        comment: Option<String>,
        line: usize,
    },
    Comment {
        text: String,
        line: usize,
    },
    Blank {
        line: usize,
    },
}

impl IniToken {
    /// The 1-based line this token started on.
    pub fn line(&self) -> usize {
        match self {
            IniToken::Section { line, .. }
            | IniToken::Key { line, .. }
            | IniToken::Comment { line, .. }
            | IniToken::Blank { line } => *line,
        }
    }
}

/// A pull tokenizer over in-memory INI text.
pub struct IniReader<'a> {
    lines: std::iter::Enumerate<std::str::Lines<'a>>,
    options: ReaderOptions,
}

impl<'a> IniReader<'a> {
    pub fn new(input: &'a str, options: ReaderOptions) -> Self {
        // A UTF-8 BOM would otherwise glue itself to the first token.
        let input = input.strip_prefix('\u{feff}').unwrap_or(input);
        Self {
            lines: input.lines().enumerate(),
            options,
        }
    }

    pub fn with_style(input: &'a str, style: IniStyle) -> Self {
        Self::new(input, ReaderOptions::for_style(style))
    }

    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    /// Produce the next token, or `None` at end of input.
    pub fn next_token(&mut self) -> Result<Option<IniToken>, SectionError> {
        loop {
            let Some((idx, raw)) = self.lines.next() else {
                return Ok(None);
            };
            let line_no = idx + 1;
            let logical = self.logical_line(raw);
            let token = self.classify(&logical, line_no)?;
            if self.options.ignore_comments
                && matches!(token, IniToken::Comment { .. })
            {
                continue;
            }
            return Ok(Some(token));
        }
    }

    /// Join continuation lines into one logical line if the dialect asks for it.
    fn logical_line(&mut self, raw: &str) -> String {
        let mut logical = raw.trim_end_matches('\r').to_string();
        if !self.options.line_continuation {
            return logical;
        }
        while logical.trim_end().ends_with('\\') {
            let end = logical.trim_end().len();
            logical.truncate(end - 1);
            let end = logical.trim_end().len();
            logical.truncate(end);
            let Some((_, next)) = self.lines.next() else {
                break;
            };
            let next = next.trim_end_matches('\r').trim_start();
            logical.push(' ');
            logical.push_str(next);
        }
        logical
    }

    fn classify(&self, line: &str, line_no: usize) -> Result<IniToken, SectionError> {
        let trimmed = line.trim_start();
        let column = line.len() - trimmed.len() + 1;
        let trimmed = trimmed.trim_end();

        if trimmed.is_empty() {
            return Ok(IniToken::Blank { line: line_no });
        }

        let first = trimmed.chars().next().unwrap_or_default();
        if self.options.is_comment(first) {
            return Ok(IniToken::Comment {
                text: strip_comment_lead(&trimmed[first.len_utf8()..]),
                line: line_no,
            });
        }

        if first == '[' {
            return self.classify_section(trimmed, line_no, column);
        }

        self.classify_key(trimmed, line_no, column)
    }

    fn classify_section(
        &self,
        trimmed: &str,
        line_no: usize,
        column: usize,
    ) -> Result<IniToken, SectionError> {
        let Some(close) = trimmed.find(']') else {
            return Err(SectionError::Syntax {
                message: "section header has no closing bracket".into(),
                line: line_no,
                column,
            });
        };
        let name = trimmed[1..close].trim().to_string();
        // Sections accept a trailing comment in every dialect.
        let rest = &trimmed[close + 1..];
        let comment = self
            .options
            .find_comment(rest)
            .map(|at| strip_comment_lead(&rest[at + 1..]));
        Ok(IniToken::Section {
            name,
            comment,
            line: line_no,
        })
    }

    fn classify_key(
        &self,
        trimmed: &str,
        line_no: usize,
        column: usize,
    ) -> Result<IniToken, SectionError> {
        let Some(assign) = self.options.find_assign(trimmed) else {
            if self.options.accept_no_assignment {
                return Ok(IniToken::Key {
                    name: trimmed.to_string(),
                    value: String::new(),
                    comment: None,
                    line: line_no,
                });
            }
            return Err(SectionError::Syntax {
                message: "line is neither a section, key assignment, nor comment".into(),
                line: line_no,
                column,
            });
        };

        let name = trimmed[..assign].trim_end().to_string();
        if name.is_empty() {
            return Err(SectionError::Syntax {
                message: "key name is empty".into(),
                line: line_no,
                column,
            });
        }

        let delim_len = trimmed[assign..].chars().next().map_or(1, char::len_utf8);
        let raw_value = &trimmed[assign + delim_len..];
        let (value, comment) = if self.options.consume_all_key_text {
            // Windows-style: the whole remainder is the value, `;` included.
            (raw_value.trim_start().to_string(), None)
        } else if self.options.accept_comment_after_key {
            match self.options.find_comment(raw_value) {
                Some(at) => (
                    raw_value[..at].trim().to_string(),
                    Some(strip_comment_lead(&raw_value[at + 1..])),
                ),
                None => (raw_value.trim().to_string(), None),
            }
        } else {
            (raw_value.trim().to_string(), None)
        };

        Ok(IniToken::Key {
            name,
            value,
            comment,
            line: line_no,
        })
    }
}

impl Iterator for IniReader<'_> {
    type Item = Result<IniToken, SectionError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token().transpose()
    }
}

/// Comments conventionally carry one space after the delimiter; strip it.
fn strip_comment_lead(text: &str) -> String {
    text.strip_prefix(' ').unwrap_or(text).to_string()
}
