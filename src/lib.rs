//! Round-trip INI documents with a layered, format-agnostic config
//! surface. Load a file, read typed values, set new ones, and save —
//! every comment and blank line the author wrote comes back out intact.
//!
//! ```no_run
//! use sectionedit::{ConfigSource, IniConfigSource, IniStyle};
//!
//! # fn main() -> Result<(), sectionedit::SectionError> {
//! let source = IniConfigSource::from_file("app.ini", IniStyle::Standard)?;
//! let logging = source.configs()?.get("Logging").unwrap();
//!
//! let level = logging.get_or("level", "info");
//! logging.set("level", "debug")?;
//! source.save()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Why sectionedit
//!
//! Most INI libraries parse a file into a map and lose everything else:
//! comments, blank lines, key order, the author's choice of `=` vs `:`.
//! Writing the map back produces a file the author no longer recognizes.
//! Sectionedit keeps the document model and the value model separate. The
//! document ([`IniDocument`]) remembers layout; the configs ([`Config`])
//! carry the live values; saving projects the values back into the
//! document, so only the lines you actually changed change.
//!
//! # Dialects
//!
//! Real-world INI is a family of formats, not one. [`IniStyle`] selects a
//! preset: the Windows-classic `Standard` form, Python's configparser
//! flavor (`key : value`, `#` comments), Samba's smb.conf (with `\` line
//! continuation), MySQL's my.cnf (bare flag keys), and a permissive
//! Windows variant in which `;` is legal inside values. Fine-grained
//! control is available through [`ReaderOptions`].
//!
//! # Layers
//!
//! Three layers, each usable on its own:
//!
//! - **Tokens** — [`IniReader`] streams [`IniToken`]s from text, one per
//!   logical line.
//! - **Document** — [`IniDocument`] holds ordered sections of keys,
//!   comments, and blanks, and serializes byte-for-byte when untouched.
//! - **Configs** — [`IniConfigSource`] projects the document into
//!   [`Config`] handles with typed getters, boolean/int alias tables
//!   ([`AliasText`]), `${key}` and `${section|key}` substitution, change
//!   notification, merging across sources, and autosave.
//!
//! Custom backends (an XML store, process arguments, a registry) plug in
//! by embedding a [`SourceCore`] and implementing [`ConfigSource`]; the
//! merge, substitution, and notification machinery comes for free.

mod alias;
mod config;
mod document;
mod error;
mod ini_source;
mod reader;
mod source;
mod substitute;
mod writer;

pub use alias::{AliasText, SharedAlias};
pub use config::{Config, ConfigCollection, ConfigEvent, ObserverId, SaveHook};
pub use document::{IniDocument, IniItem, IniSection};
pub use error::SectionError;
pub use ini_source::IniConfigSource;
pub use reader::{IniReader, IniStyle, IniToken, ReaderOptions};
pub use source::{ConfigSource, SourceCore, SourceObserverId};
pub use substitute::expand_key_values;
pub use writer::{render, IniWriter};
