//! Recursive `${...}` variable substitution across a config collection.
//!
//! A value may reference another key in the same config (`${protocol}`) or
//! a key in a sibling config (`${web|protocol}`). References resolve
//! depth-first: the referenced value is itself fully expanded before its
//! text is spliced in, so chained references resolve regardless of key
//! order. The chain of keys being resolved is tracked, and a reference to
//! a key already on the chain fails with `CircularReference` instead of
//! looping, whether the cycle is direct (`x = ${x}`), indirect
//! (`a = ${b}`, `b = ${a}`), or reached from another key (`a = ${b}`,
//! `b = ${b}`).
//!
//! The pass is idempotent: a fully expanded collection contains no `${`
//! markers, so a second run is a no-op.

use log::debug;

use crate::config::{Config, ConfigCollection};
use crate::error::SectionError;

/// Expand every `${...}` marker in every config of the collection.
pub fn expand_key_values(configs: &ConfigCollection) -> Result<(), SectionError> {
    debug!("expanding key values across {} config(s)", configs.len());
    for config in configs.iter() {
        for key in config.keys() {
            expand_key(configs, &config, &key)?;
        }
    }
    Ok(())
}

/// Expand one key and write the result back once.
fn expand_key(
    configs: &ConfigCollection,
    config: &Config,
    key: &str,
) -> Result<(), SectionError> {
    let text = config.get(key).ok_or_else(|| SectionError::KeyNotFound {
        config: config.name(),
        key: key.to_string(),
    })?;
    let mut chain = vec![(config.name(), key.to_string())];
    let expanded = expand_text(configs, config, &text, &mut chain)?;
    if expanded != text {
        config.set(key, &expanded)?;
    }
    Ok(())
}

/// Expand every marker in `text`, left to right.
fn expand_text(
    configs: &ConfigCollection,
    config: &Config,
    text: &str,
    chain: &mut Vec<(String, String)>,
) -> Result<String, SectionError> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    loop {
        let Some(start) = rest.find("${") else {
            out.push_str(rest);
            return Ok(out);
        };
        // First `}` after the marker; references do not nest.
        let Some(end) = rest[start + 2..].find('}').map(|at| start + 2 + at) else {
            out.push_str(rest);
            return Ok(out);
        };
        let reference = &rest[start + 2..end];
        out.push_str(&rest[..start]);
        out.push_str(&resolve(configs, config, reference, chain)?);
        rest = &rest[end + 1..];
    }
}

/// Resolve one reference to its fully expanded replacement text.
fn resolve(
    configs: &ConfigCollection,
    config: &Config,
    reference: &str,
    chain: &mut Vec<(String, String)>,
) -> Result<String, SectionError> {
    let (target, target_key) = match reference.split_once('|') {
        Some((section, key)) => {
            let other = configs
                .get(section)
                .ok_or_else(|| SectionError::ConfigNotFound {
                    name: section.to_string(),
                })?;
            (other, key)
        }
        None => (config.clone(), reference),
    };

    let frame = (target.name(), target_key.to_string());
    if chain.contains(&frame) {
        return Err(SectionError::CircularReference {
            config: frame.0,
            key: frame.1,
        });
    }
    let value = target
        .get(target_key)
        .ok_or_else(|| SectionError::KeyNotFound {
            config: target.name(),
            key: target_key.to_string(),
        })?;

    chain.push(frame);
    let expanded = expand_text(configs, &target, &value, chain)?;
    chain.pop();
    Ok(expanded)
}
