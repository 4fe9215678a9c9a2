//! Versioned cache generations
//!
//! Names follow `{prefix}-{version}-{kind}`, e.g. `ponto-v1-static`.

use std::fmt;

/// Which bucket a generation holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenerationKind {
    /// Primed at install from the static manifest, sealed afterwards
    Static,
    /// Accumulates responses cached at request time
    Dynamic,
}

impl GenerationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationKind::Static => "static",
            GenerationKind::Dynamic => "dynamic",
        }
    }
}

/// A generation tag: kind plus version
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheGeneration {
    pub kind: GenerationKind,
    pub version: String,
}

impl CacheGeneration {
    pub fn new(kind: GenerationKind, version: impl Into<String>) -> Self {
        Self {
            kind,
            version: version.into(),
        }
    }

    /// Storage name under the application prefix
    pub fn name(&self, prefix: &str) -> String {
        format!("{}-{}-{}", prefix, self.version, self.kind.as_str())
    }

    /// Parse a storage name; `None` if it is not a tag under `prefix`
    pub fn parse(prefix: &str, name: &str) -> Option<Self> {
        let rest = name.strip_prefix(prefix)?.strip_prefix('-')?;
        let (version, kind) = rest.rsplit_once('-')?;
        if version.is_empty() {
            return None;
        }
        let kind = match kind {
            "static" => GenerationKind::Static,
            "dynamic" => GenerationKind::Dynamic,
            _ => return None,
        };
        Some(Self::new(kind, version))
    }
}

/// The allow-set of generations for one application version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationSet {
    prefix: String,
    version: String,
}

impl GenerationSet {
    pub fn new(prefix: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            version: version.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn static_generation(&self) -> CacheGeneration {
        CacheGeneration::new(GenerationKind::Static, &self.version)
    }

    pub fn dynamic_generation(&self) -> CacheGeneration {
        CacheGeneration::new(GenerationKind::Dynamic, &self.version)
    }

    pub fn static_name(&self) -> String {
        self.static_generation().name(&self.prefix)
    }

    pub fn dynamic_name(&self) -> String {
        self.dynamic_generation().name(&self.prefix)
    }

    /// Current names in lookup order (static first)
    pub fn current_names(&self) -> Vec<String> {
        vec![self.static_name(), self.dynamic_name()]
    }

    /// Whether `name` falls under this application's naming scheme
    pub fn owns(&self, name: &str) -> bool {
        name.strip_prefix(&self.prefix)
            .map(|rest| rest.starts_with('-'))
            .unwrap_or(false)
    }

    /// Whether `name` is one of the current generations
    pub fn is_current(&self, name: &str) -> bool {
        match CacheGeneration::parse(&self.prefix, name) {
            Some(tag) => tag.version == self.version,
            None => false,
        }
    }

    /// Names owned by this application that are not current
    ///
    /// Names belonging to other applications are never returned.
    pub fn stale<'a>(&self, names: &'a [String]) -> Vec<&'a str> {
        names
            .iter()
            .map(String::as_str)
            .filter(|name| self.owns(name) && !self.is_current(name))
            .collect()
    }
}

impl fmt::Display for GenerationSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.prefix, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_and_parse() {
        let tag = CacheGeneration::new(GenerationKind::Static, "v1");
        assert_eq!(tag.name("ponto"), "ponto-v1-static");
        assert_eq!(CacheGeneration::parse("ponto", "ponto-v1-static"), Some(tag));

        let tag = CacheGeneration::parse("ponto", "ponto-2024-01-dynamic").unwrap();
        assert_eq!(tag.version, "2024-01");
        assert_eq!(tag.kind, GenerationKind::Dynamic);
    }

    #[test]
    fn test_parse_rejects_foreign_and_malformed_names() {
        assert!(CacheGeneration::parse("ponto", "other-v1-static").is_none());
        assert!(CacheGeneration::parse("ponto", "pontoextra-v1-static").is_none());
        assert!(CacheGeneration::parse("ponto", "ponto-v1").is_none());
        assert!(CacheGeneration::parse("ponto", "ponto--static").is_none());
        assert!(CacheGeneration::parse("ponto", "ponto-v1-images").is_none());
    }

    #[test]
    fn test_stale_keeps_current_and_foreign() {
        let set = GenerationSet::new("ponto", "v2");
        let names = vec![
            "ponto-v1-static".to_string(),
            "ponto-v1-dynamic".to_string(),
            "ponto-v2-static".to_string(),
            "ponto-v2-dynamic".to_string(),
            "ponto-legacy".to_string(),
            "someone-else-v1-static".to_string(),
        ];

        assert_eq!(
            set.stale(&names),
            vec!["ponto-v1-static", "ponto-v1-dynamic", "ponto-legacy"]
        );
    }

    #[test]
    fn test_current_names_order() {
        let set = GenerationSet::new("ponto", "v1");
        assert_eq!(set.current_names(), vec!["ponto-v1-static", "ponto-v1-dynamic"]);
        assert!(set.is_current("ponto-v1-dynamic"));
        assert!(!set.is_current("ponto-v0-dynamic"));
    }
}
