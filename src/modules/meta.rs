//! # Module identity.
//!
//! [`ModuleMeta`] carries a module's name and version. Both are supplied
//! at construction, immutable for the instance's lifetime, and compared by
//! value — module equality is meta equality, with no semantic side
//! effects.

use std::fmt;
use std::sync::Arc;

/// Identity and version of a module instance.
///
/// Cheap to clone (`Arc`-backed strings). Displays as `name@version`.
///
/// ## Example
/// ```rust
/// use modkit::ModuleMeta;
///
/// let meta = ModuleMeta::new("fetch", "1.2.0");
/// assert_eq!(meta.name(), "fetch");
/// assert_eq!(meta.to_string(), "fetch@1.2.0");
/// assert_eq!(meta, ModuleMeta::new("fetch", "1.2.0"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModuleMeta {
    name: Arc<str>,
    version: Arc<str>,
}

impl ModuleMeta {
    /// Creates a new identity from explicit name and version values.
    pub fn new(name: impl Into<Arc<str>>, version: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// The module name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The module version.
    pub fn version(&self) -> &str {
        &self.version
    }
}

impl fmt::Display for ModuleMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_equality() {
        let a = ModuleMeta::new("worker", "0.3.1");
        let b = ModuleMeta::new("worker", "0.3.1");
        let c = ModuleMeta::new("worker", "0.3.2");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn display_format() {
        assert_eq!(ModuleMeta::new("a", "1").to_string(), "a@1");
    }
}
