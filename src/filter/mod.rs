//! Listing filters
//!
//! Predicates over entry names used to narrow directory listings. The
//! connection layer applies them to file entries only; directories always
//! pass so recursive walks see the whole tree.

/// Predicate over a remote entry name
pub trait NamePredicate {
    /// Whether an entry with this name should be kept
    fn accept(&self, name: &str) -> bool;
}

impl<F> NamePredicate for F
where
    F: Fn(&str) -> bool,
{
    fn accept(&self, name: &str) -> bool {
        self(name)
    }
}

/// Keeps only the entry whose name matches exactly
#[derive(Debug, Clone)]
pub struct NameEqualsFilter {
    name: String,
}

impl NameEqualsFilter {
    /// Match `name` exactly
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl NamePredicate for NameEqualsFilter {
    fn accept(&self, name: &str) -> bool {
        name == self.name
    }
}

/// Keeps entries whose name starts with a prefix
#[derive(Debug, Clone)]
pub struct NamePrefixFilter {
    prefix: String,
}

impl NamePrefixFilter {
    /// Match names beginning with `prefix`
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl NamePredicate for NamePrefixFilter {
    fn accept(&self, name: &str) -> bool {
        name.starts_with(&self.prefix)
    }
}

/// Keeps entries whose name ends with a suffix, e.g. an extension
#[derive(Debug, Clone)]
pub struct NameSuffixFilter {
    suffix: String,
}

impl NameSuffixFilter {
    /// Match names ending with `suffix`
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }
}

impl NamePredicate for NameSuffixFilter {
    fn accept(&self, name: &str) -> bool {
        name.ends_with(&self.suffix)
    }
}
