//! Canonical cache keys for pack resources.

use crate::pack::normalize_path;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A resource path plus the decode parameters that shaped the cached value.
///
/// Parameters are kept sorted, so two keys built with the same parameters
/// in any order are equal and hash the same.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey {
    path: String,
    params: BTreeMap<String, String>,
}

impl ResourceKey {
    pub fn new(path: &str) -> Self {
        Self {
            path: normalize_path(path),
            params: BTreeMap::new(),
        }
    }

    /// Add a decode parameter such as a scale factor or target format.
    pub fn with_param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(name.into(), value.to_string());
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn params(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)?;
        for (i, (name, value)) in self.params.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{}{}={}", sep, name, value)?;
        }
        Ok(())
    }
}

impl From<&str> for ResourceKey {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_parameter_order_does_not_matter() {
        let a = ResourceKey::new("icons/a.png")
            .with_param("scale", 2)
            .with_param("format", "rgba");
        let b = ResourceKey::new("./icons/a.png")
            .with_param("format", "rgba")
            .with_param("scale", 2);

        assert_eq!(a, b);
        let set: HashSet<_> = [a.clone(), b].into_iter().collect();
        assert_eq!(set.len(), 1);
        assert_eq!(a.to_string(), "icons/a.png?format=rgba&scale=2");
    }

    #[test]
    fn test_params_distinguish_keys() {
        let plain = ResourceKey::from("icons/a.png");
        let scaled = ResourceKey::new("icons/a.png").with_param("scale", 2);
        assert_ne!(plain, scaled);
        assert_eq!(plain.to_string(), "icons/a.png");
        assert_eq!(scaled.param("scale"), Some("2"));
    }
}
