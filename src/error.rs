use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SectionError {
    #[error("Syntax error at line {line}, column {column}: {message}")]
    Syntax {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Value not found for key '{key}'")]
    ValueNotFound { key: String },

    #[error("Value '{value}' for key '{key}' is not a valid {expected}")]
    FormatError {
        key: String,
        value: String,
        expected: &'static str,
    },

    #[error("No boolean alias registered for '{value}'")]
    AliasNotFound { value: String },

    #[error("No integer alias registered for '{value}' under key '{key}'")]
    IntAliasNotFound { key: String, value: String },

    #[error("Config '{name}' has already been added")]
    DuplicateConfig { name: String },

    #[error("A config named '{name}' already exists")]
    ConfigAlreadyExists { name: String },

    #[error("Config not found: {name}")]
    ConfigNotFound { name: String },

    #[error("Key '{key}' not found in config '{config}'")]
    KeyNotFound { config: String, key: String },

    #[error("Key '{key}' in config '{config}' refers to itself")]
    CircularReference { config: String, key: String },

    #[error("Source is read-only")]
    ReadOnlySource,

    #[error("Source has no backing path — call save_to() with an explicit path")]
    NotSavable,

    #[error("Section '{section}' extends '{base}', which does not exist")]
    SectionExtendsMissingBase { section: String, base: String },

    #[error("Source has already been merged")]
    AlreadyMerged,

    #[error("Cannot merge a source into itself")]
    SelfMerge,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_error_carries_position() {
        let err = SectionError::Syntax {
            message: "section header has no closing bracket".into(),
            line: 12,
            column: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("line 12"));
        assert!(msg.contains("column 3"));
        assert!(msg.contains("closing bracket"));
    }

    #[test]
    fn extends_missing_base_names_both_sections() {
        let err = SectionError::SectionExtendsMissingBase {
            section: "Derived".into(),
            base: "Base".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Derived"));
        assert!(msg.contains("Base"));
    }

    #[test]
    fn format_error_names_expected_type() {
        let err = SectionError::FormatError {
            key: "port".into(),
            value: "abc".into(),
            expected: "integer",
        };
        assert!(err.to_string().contains("integer"));
    }

    #[test]
    fn not_savable_mentions_save_to() {
        assert!(SectionError::NotSavable.to_string().contains("save_to"));
    }
}
