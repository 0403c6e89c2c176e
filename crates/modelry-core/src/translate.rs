//! Display-string translation.

use crate::error::{Error, Result};
use serde_json::Value as Json;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Translates display keys (entity names, attribute names, flagged values).
///
/// Implementations are side-effect free; an unknown key translates to itself.
pub trait Translator {
    /// Translate a key.
    fn translate(&self, key: &str) -> String;
}

/// Returns every key unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTranslator;

impl Translator for IdentityTranslator {
    fn translate(&self, key: &str) -> String {
        key.to_string()
    }
}

/// Translations loaded from a `<locale>.json` catalog.
///
/// The file is a JSON object of key to string. Nested objects flatten to dotted keys, and a
/// single root object named after the locale is unwrapped.
#[derive(Debug, Clone, Default)]
pub struct CatalogTranslator {
    locale: String,
    entries: HashMap<String, String>,
}

impl CatalogTranslator {
    /// Build a catalog from explicit entries.
    pub fn from_entries<K, V>(locale: impl Into<String>, entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            locale: locale.into(),
            entries: entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// Load `<dir>/<locale>.json`, falling back to the language part (`pt` for `pt_BR`).
    pub fn load(dir: impl AsRef<Path>, locale: &str) -> Result<Self> {
        let dir = dir.as_ref();
        let language = locale.split(['_', '-', '.']).next().unwrap_or(locale);
        let candidates = [locale, language];

        for candidate in candidates {
            let path = dir.join(format!("{}.json", candidate));
            if path.is_file() {
                let text = std::fs::read_to_string(&path)?;
                let catalog = Self::parse(candidate, &text)?;
                debug!(path = %path.display(), entries = catalog.len(), "loaded translations");
                return Ok(catalog);
            }
        }
        Err(Error::Translation(format!(
            "no catalog for locale \"{}\" in {}",
            locale,
            dir.display()
        )))
    }

    /// Parse a catalog document.
    pub fn parse(locale: &str, text: &str) -> Result<Self> {
        let mut root: Json = serde_json::from_str(text)?;
        if let Json::Object(map) = &mut root {
            if map.len() == 1 {
                if let Some(inner @ Json::Object(_)) = map.remove(locale) {
                    root = inner;
                }
            }
        }
        let Json::Object(_) = root else {
            return Err(Error::Translation("catalog must be a JSON object".to_string()));
        };

        let mut entries = HashMap::new();
        flatten(String::new(), root, &mut entries)?;
        Ok(Self {
            locale: locale.to_string(),
            entries,
        })
    }

    /// Locale this catalog was loaded for.
    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn flatten(prefix: String, value: Json, out: &mut HashMap<String, String>) -> Result<()> {
    match value {
        Json::Object(map) => {
            for (key, value) in map {
                let key = if prefix.is_empty() {
                    key
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten(key, value, out)?;
            }
        }
        Json::String(s) => {
            out.insert(prefix, s);
        }
        other => {
            return Err(Error::Translation(format!(
                "entry \"{}\" must be a string, got {}",
                prefix, other
            )));
        }
    }
    Ok(())
}

impl Translator for CatalogTranslator {
    fn translate(&self, key: &str) -> String {
        self.entries
            .get(key)
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }
}

/// Uppercase the first character and lowercase the rest.
pub fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
