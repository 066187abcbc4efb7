//! Expansion of the host package-exposure list.
//!
//! The base list lives under [`keys::SYSTEM_PACKAGES_EXTRA`]. Any key that
//! extends it (`framework.system.packages.extra.<suffix>`) contributes more
//! entries, and values may reference other properties with `${name}`.

use super::properties::{keys, SystemProperties};
use super::properties_file::PropertiesFile;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Maximum nesting of `${...}` references followed before giving up.
pub const MAX_RESOLVE_DEPTH: usize = 16;

fn placeholder() -> Option<&'static Regex> {
    static PLACEHOLDER: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    match PLACEHOLDER.get_or_init(|| Regex::new(r"\$\{([^$\{\}]+)\}")) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::error!(error = %e, "Placeholder pattern failed to compile");
            None
        }
    }
}

/// Builds the full package list from a properties file.
#[derive(Debug, Clone)]
pub struct SystemPackageExpander {
    base_key: String,
}

impl Default for SystemPackageExpander {
    fn default() -> Self {
        Self {
            base_key: keys::SYSTEM_PACKAGES_EXTRA.to_string(),
        }
    }
}

impl SystemPackageExpander {
    /// Creates an expander for the default key.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a different base key.
    #[must_use]
    pub fn with_base_key(mut self, key: impl Into<String>) -> Self {
        self.base_key = key.into();
        self
    }

    /// Returns the base key.
    #[must_use]
    pub fn base_key(&self) -> &str {
        &self.base_key
    }

    /// Returns a copy of `properties` with the base key replaced by the
    /// expanded, de-duplicated list.
    #[must_use]
    pub fn expand(&self, properties: &PropertiesFile, system: &SystemProperties) -> PropertiesFile {
        let prefix = format!("{}.", self.base_key);
        let mut sources: Vec<&str> = Vec::new();
        if let Some(base) = properties.get(&self.base_key) {
            sources.push(base);
        }
        sources.extend(
            properties
                .iter()
                .filter(|(k, _)| k.starts_with(&prefix))
                .map(|(_, v)| v),
        );

        let mut seen = HashSet::new();
        let mut packages = Vec::new();
        for source in sources {
            let resolved = resolve(source, properties, system);
            for entry in split_list(&resolved) {
                if seen.insert(entry.clone()) {
                    packages.push(entry);
                }
            }
        }

        let mut expanded = properties.clone();
        expanded.set(self.base_key.clone(), packages.join(","));
        expanded
    }
}

/// Resolves `${name}` references against the file, then the system
/// properties. Unknown references are left as written.
#[must_use]
pub fn resolve(value: &str, properties: &PropertiesFile, system: &SystemProperties) -> String {
    let mut current = value.to_string();
    let Some(pattern) = placeholder() else {
        return current;
    };
    for _ in 0..MAX_RESOLVE_DEPTH {
        let mut changed = false;
        let next = pattern
            .replace_all(&current, |caps: &regex::Captures<'_>| {
                let name = &caps[1];
                properties
                    .get(name)
                    .map(str::to_string)
                    .or_else(|| system.get(name))
                    .map_or_else(
                        || caps[0].to_string(),
                        |v| {
                            changed = true;
                            v
                        },
                    )
            })
            .into_owned();
        current = next;
        if !changed {
            break;
        }
    }
    current
}

/// Splits a package list on commas outside double quotes, trimming entries
/// and dropping empty ones.
#[must_use]
pub fn split_list(value: &str) -> Vec<String> {
    let mut entries = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for c in value.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                current.push(c);
            }
            ',' if !quoted => entries.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    entries.push(current);
    entries
        .into_iter()
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn expand(text: &str) -> String {
        let props = PropertiesFile::parse(text).unwrap();
        let expanded = SystemPackageExpander::new().expand(&props, &SystemProperties::new());
        expanded.get(keys::SYSTEM_PACKAGES_EXTRA).unwrap().to_string()
    }

    #[test]
    fn test_placeholder_pattern_compiles() {
        let pattern = placeholder().unwrap();
        assert_eq!(&pattern.captures("${a.b}").unwrap()[1], "a.b");
        assert!(pattern.captures("${}").is_none());
    }

    #[test]
    fn test_split_list_respects_quotes() {
        assert_eq!(
            split_list(r#"a.b, c.d;version="[1,2)" ,, e"#),
            vec!["a.b", r#"c.d;version="[1,2)""#, "e"]
        );
    }

    #[test]
    fn test_merges_extension_keys_and_dedupes() {
        let value = expand(
            "framework.system.packages.extra=a, b\n\
             framework.system.packages.extra.host=b, c\n\
             framework.system.packages.extra.more=d\n\
             unrelated=z\n",
        );
        assert_eq!(value, "a,b,c,d");
    }

    #[test]
    fn test_resolves_placeholders() {
        let value = expand(
            "common=x.y, x.z\n\
             framework.system.packages.extra=${common}, w\n",
        );
        assert_eq!(value, "x.y,x.z,w");
    }

    #[test]
    fn test_resolves_from_system_properties() {
        let props = PropertiesFile::parse("framework.system.packages.extra=${host.pkgs}\n").unwrap();
        let system = SystemProperties::new();
        system.set("host.pkgs", "h.one,h.two");

        let expanded = SystemPackageExpander::new().expand(&props, &system);
        assert_eq!(expanded.get(keys::SYSTEM_PACKAGES_EXTRA), Some("h.one,h.two"));
    }

    #[test]
    fn test_unknown_and_cyclic_placeholders_terminate() {
        let props = PropertiesFile::parse("a=${b}\nb=${a}\nc=${missing}\n").unwrap();
        let system = SystemProperties::new();

        let cyclic = resolve("${a}", &props, &system);
        assert!(cyclic == "${a}" || cyclic == "${b}");
        assert_eq!(resolve("${c}", &props, &system), "${missing}");
    }

    #[test]
    fn test_missing_base_key_yields_empty_list() {
        assert_eq!(expand("other=1\n"), "");
    }

    #[test]
    fn test_other_entries_are_preserved() {
        let props = PropertiesFile::parse("keep=me\nframework.system.packages.extra=a\n").unwrap();
        let expanded = SystemPackageExpander::new().expand(&props, &SystemProperties::new());
        assert_eq!(expanded.get("keep"), Some("me"));
    }
}
