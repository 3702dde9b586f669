//! Logical paths inside a container.
//!
//! Inner paths always use `/` as separator, independent of the host. Parsing
//! is lenient and mirrors how a shell resolves a relative path:
//! - empty components and `.` are dropped (`a//./b` is `a/b`)
//! - `..` removes the previous component and is ignored at the root
//! - leading and trailing slashes carry no meaning (`/a/b/` is `a/b`)
//!
//! The normalized form is the components joined by `/`, with no leading or
//! trailing slash. The root is the empty path.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

const SEPARATOR: char = '/';

/// A normalized logical path inside a container.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InnerPath(String);

impl InnerPath {
    /// Parse and normalize a raw path. Never fails; the result may be the root.
    pub fn parse(raw: &str) -> Self {
        let mut parts: Vec<&str> = Vec::new();
        for part in raw.split(SEPARATOR) {
            match part {
                "" | "." => {}
                ".." => {
                    parts.pop();
                }
                other => parts.push(other),
            }
        }
        Self(parts.join("/"))
    }

    /// The root path, i.e. the whole container.
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Parse a path that must name an entry.
    ///
    /// Rejects paths that normalize to the root and paths containing NUL.
    pub fn for_entry(raw: &str) -> Result<Self, TypeError> {
        if raw.contains('\0') {
            return Err(TypeError::InvalidPath {
                path: raw.replace('\0', "\\0"),
                reason: "contains NUL byte".into(),
            });
        }
        let path = Self::parse(raw);
        if path.is_root() {
            return Err(TypeError::EmptyPath);
        }
        Ok(path)
    }

    /// Returns `true` if `raw` is already in normalized form.
    pub fn is_normalized(raw: &str) -> bool {
        Self::parse(raw).0 == raw
    }

    /// Returns `true` for the root path.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// The normalized string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over the path components.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEPARATOR).filter(|part| !part.is_empty())
    }

    /// Number of components; zero for the root.
    pub fn depth(&self) -> usize {
        self.components().count()
    }

    /// The last component, or `None` for the root.
    pub fn file_name(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }
        self.0.rsplit(SEPARATOR).next()
    }

    /// The path without its last component, or `None` for the root.
    pub fn parent(&self) -> Option<InnerPath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind(SEPARATOR) {
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => Some(Self::root()),
        }
    }

    /// Append a relative path.
    pub fn join(&self, rest: &str) -> InnerPath {
        Self::parse(&format!("{}/{}", self.0, rest))
    }

    /// Component-wise prefix test.
    ///
    /// `a/b` starts with `a` and with `a/b`, but not with `a/bc` and
    /// `a/bc` does not start with `a/b`. Every path starts with the root.
    pub fn starts_with(&self, prefix: &InnerPath) -> bool {
        Self::has_prefix(&self.0, prefix.as_str())
    }

    /// [`InnerPath::starts_with`] on normalized string forms.
    pub fn has_prefix(path: &str, prefix: &str) -> bool {
        if prefix.is_empty() {
            return true;
        }
        match path.strip_prefix(prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with(SEPARATOR),
            None => false,
        }
    }
}

impl fmt::Debug for InnerPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InnerPath({:?})", self.0)
    }
}

impl fmt::Display for InnerPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for InnerPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for InnerPath {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_normalizes_separators() {
        assert_eq!(InnerPath::parse("/a//b/").as_str(), "a/b");
        assert_eq!(InnerPath::parse("a/./b").as_str(), "a/b");
        assert_eq!(InnerPath::parse("docs/readme.txt").as_str(), "docs/readme.txt");
    }

    #[test]
    fn parse_resolves_parent_components() {
        assert_eq!(InnerPath::parse("a/b/../c").as_str(), "a/c");
        assert_eq!(InnerPath::parse("../../a").as_str(), "a");
        assert!(InnerPath::parse("a/..").is_root());
    }

    #[test]
    fn root_forms() {
        for raw in ["", "/", ".", "//", "./."] {
            assert!(InnerPath::parse(raw).is_root(), "{raw:?} should be root");
        }
        assert_eq!(InnerPath::root().depth(), 0);
    }

    #[test]
    fn for_entry_rejects_root_and_nul() {
        assert_eq!(InnerPath::for_entry("/"), Err(TypeError::EmptyPath));
        assert!(matches!(
            InnerPath::for_entry("a\0b"),
            Err(TypeError::InvalidPath { .. })
        ));
        assert_eq!(InnerPath::for_entry("x/y").unwrap().as_str(), "x/y");
    }

    #[test]
    fn prefix_respects_component_boundaries() {
        let ab = InnerPath::parse("a/b");
        let abc = InnerPath::parse("a/bc");
        let acd = InnerPath::parse("a/c/d");

        assert!(ab.starts_with(&InnerPath::parse("a")));
        assert!(ab.starts_with(&ab));
        assert!(!abc.starts_with(&ab));
        assert!(acd.starts_with(&InnerPath::parse("a/c")));
        assert!(!ab.starts_with(&InnerPath::parse("a/c")));
        assert!(acd.starts_with(&InnerPath::root()));
    }

    #[test]
    fn parent_and_file_name() {
        let path = InnerPath::parse("docs/guide/intro.md");
        assert_eq!(path.file_name(), Some("intro.md"));
        assert_eq!(path.parent().unwrap().as_str(), "docs/guide");
        assert_eq!(InnerPath::parse("top").parent(), Some(InnerPath::root()));
        assert_eq!(InnerPath::root().parent(), None);
        assert_eq!(InnerPath::root().file_name(), None);
    }

    #[test]
    fn join_normalizes() {
        let base = InnerPath::parse("a/b");
        assert_eq!(base.join("../c").as_str(), "a/c");
        assert_eq!(InnerPath::root().join("x").as_str(), "x");
    }

    #[test]
    fn is_normalized_detects_raw_forms() {
        assert!(InnerPath::is_normalized("a/b"));
        assert!(!InnerPath::is_normalized("/a/b"));
        assert!(!InnerPath::is_normalized("a/./b"));
    }

    proptest! {
        #[test]
        fn parse_is_idempotent(raw in "[a-z./]{0,24}") {
            let once = InnerPath::parse(&raw);
            let twice = InnerPath::parse(once.as_str());
            prop_assert_eq!(once, twice);
        }
    }
}
