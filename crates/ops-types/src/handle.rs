//! Hierarchical, path-based identity for stateful objects.
//!
//! Every object the framework persists state for -- the charm, its child
//! objects, each emitted event -- is addressed by a [`Handle`]. A handle is
//! an ordered list of `(kind, key)` segments and renders to a single path
//! string that doubles as the storage key:
//!
//! ```text
//! Charm/on/config_changed[7]
//! Charm/DbHelper[helper]/StoredStateData[_stored]
//! ```
//!
//! Keys are escaped so that they may contain `/` (unit names such as
//! `postgresql/0` are common keys). Inside a key, `\` and `]` are written as
//! `\\` and `\]`. Kinds are not escaped; [`validate_kind`] rejects the
//! ones that would not survive a round trip.

use serde::{Deserialize, Serialize};

use crate::error::HandleParseError;

/// One `(kind, key)` step in a handle path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandleSegment {
    kind: String,
    key: Option<String>,
}

impl HandleSegment {
    /// The object type of this segment.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The sibling discriminator, `None` for singletons.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    fn write_into(&self, out: &mut String) {
        out.push_str(&self.kind);
        if let Some(key) = &self.key {
            out.push('[');
            for ch in key.chars() {
                if ch == '\\' || ch == ']' {
                    out.push('\\');
                }
                out.push(ch);
            }
            out.push(']');
        }
    }
}

/// Identity of a framework-managed object.
///
/// Two handles are equal iff their segment sequences are equal. A handle
/// always has at least one segment.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Handle {
    segments: Vec<HandleSegment>,
}

impl Handle {
    /// Create a root handle.
    pub fn new(kind: impl Into<String>, key: Option<&str>) -> Self {
        Self {
            segments: vec![HandleSegment {
                kind: kind.into(),
                key: key.map(str::to_owned),
            }],
        }
    }

    /// Create a handle for a child object of `self`.
    pub fn nest(&self, kind: impl Into<String>, key: Option<&str>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(HandleSegment {
            kind: kind.into(),
            key: key.map(str::to_owned),
        });
        Self { segments }
    }

    /// The handle one level up, or `None` for a root handle.
    pub fn parent(&self) -> Option<Self> {
        match self.segments.split_last() {
            Some((_, rest)) if !rest.is_empty() => Some(Self {
                segments: rest.to_vec(),
            }),
            _ => None,
        }
    }

    /// Kind of the final segment.
    pub fn kind(&self) -> &str {
        self.segments.last().map_or("", HandleSegment::kind)
    }

    /// Key of the final segment.
    pub fn key(&self) -> Option<&str> {
        self.segments.last().and_then(HandleSegment::key)
    }

    /// All segments, root first.
    pub fn segments(&self) -> &[HandleSegment] {
        &self.segments
    }

    /// Render the handle as its storage path.
    pub fn path(&self) -> String {
        let mut out = String::new();
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                out.push('/');
            }
            segment.write_into(&mut out);
        }
        out
    }

    /// Parse a path produced by [`Handle::path`].
    ///
    /// # Errors
    ///
    /// Returns [`HandleParseError`] if the path is empty, contains an empty
    /// segment, has an unterminated or misplaced key, or trails characters
    /// after a key.
    pub fn from_path(path: &str) -> Result<Self, HandleParseError> {
        if path.is_empty() {
            return Err(HandleParseError::Empty);
        }

        let mut segments = Vec::new();
        let mut kind = String::new();
        let mut key: Option<String> = None;
        let mut chars = path.chars();

        while let Some(ch) = chars.next() {
            match ch {
                '/' => segments.push(finish_segment(path, &mut kind, key.take())?),
                _ if key.is_some() => {
                    return Err(HandleParseError::TrailingCharacters {
                        path: path.to_owned(),
                    });
                }
                '[' => {
                    if kind.is_empty() {
                        return Err(HandleParseError::EmptyKind {
                            path: path.to_owned(),
                        });
                    }
                    let mut buf = String::new();
                    loop {
                        match chars.next() {
                            Some('\\') => match chars.next() {
                                Some(escaped) => buf.push(escaped),
                                None => {
                                    return Err(HandleParseError::UnterminatedKey {
                                        path: path.to_owned(),
                                    });
                                }
                            },
                            Some(']') => break,
                            Some(other) => buf.push(other),
                            None => {
                                return Err(HandleParseError::UnterminatedKey {
                                    path: path.to_owned(),
                                });
                            }
                        }
                    }
                    key = Some(buf);
                }
                ']' => {
                    return Err(HandleParseError::UnexpectedBracket {
                        path: path.to_owned(),
                    });
                }
                other => kind.push(other),
            }
        }
        segments.push(finish_segment(path, &mut kind, key)?);

        Ok(Self { segments })
    }
}

/// Check that `kind` can appear in a handle path unescaped.
///
/// # Errors
///
/// Returns [`HandleParseError::InvalidKind`] if `kind` is empty or contains
/// `/`, `[` or `]`.
pub fn validate_kind(kind: &str) -> Result<(), HandleParseError> {
    if kind.is_empty() || kind.contains(['/', '[', ']']) {
        return Err(HandleParseError::InvalidKind {
            kind: kind.to_owned(),
        });
    }
    Ok(())
}

fn finish_segment(
    path: &str,
    kind: &mut String,
    key: Option<String>,
) -> Result<HandleSegment, HandleParseError> {
    if kind.is_empty() {
        return Err(HandleParseError::EmptyKind {
            path: path.to_owned(),
        });
    }
    Ok(HandleSegment {
        kind: std::mem::take(kind),
        key,
    })
}

impl core::fmt::Display for Handle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.path())
    }
}

impl core::str::FromStr for Handle {
    type Err = HandleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_path(s)
    }
}

impl TryFrom<String> for Handle {
    type Error = HandleParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_path(&value)
    }
}

impl From<Handle> for String {
    fn from(handle: Handle) -> Self {
        handle.path()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn nested_path_renders_kinds_and_keys() {
        let charm = Handle::new("Charm", None);
        let event = charm.nest("on", None).nest("config_changed", Some("7"));
        assert_eq!(event.path(), "Charm/on/config_changed[7]");
        assert_eq!(event.kind(), "config_changed");
        assert_eq!(event.key(), Some("7"));
        assert_eq!(event.parent().map(|p| p.path()), Some("Charm/on".to_owned()));
    }

    #[test]
    fn root_has_no_parent() {
        assert!(Handle::new("Framework", None).parent().is_none());
    }

    #[test]
    fn keys_with_slashes_and_brackets_survive_parsing() {
        let handle = Handle::new("Charm", None)
            .nest("Unit", Some("postgresql/0"))
            .nest("Odd", Some(r"a]b\c"));
        let path = handle.path();
        assert_eq!(path, r"Charm/Unit[postgresql/0]/Odd[a\]b\\c]");
        assert_eq!(Handle::from_path(&path).unwrap(), handle);
    }

    #[test]
    fn equality_is_by_segments() {
        let a = Handle::new("Charm", None).nest("Helper", Some("x"));
        let b = Handle::from_path("Charm/Helper[x]").unwrap();
        let c = Handle::from_path("Charm/Helper[y]").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn malformed_paths_are_rejected() {
        assert!(matches!(Handle::from_path(""), Err(HandleParseError::Empty)));
        assert!(matches!(
            Handle::from_path("Charm//x"),
            Err(HandleParseError::EmptyKind { .. })
        ));
        assert!(matches!(
            Handle::from_path("Charm[open"),
            Err(HandleParseError::UnterminatedKey { .. })
        ));
        assert!(matches!(
            Handle::from_path("Charm[k]tail"),
            Err(HandleParseError::TrailingCharacters { .. })
        ));
        assert!(matches!(
            Handle::from_path("Charm]"),
            Err(HandleParseError::UnexpectedBracket { .. })
        ));
    }

    #[test]
    fn kinds_that_would_not_parse_back_are_invalid() {
        assert!(validate_kind("config_changed").is_ok());
        assert!(validate_kind("foo-bar_action").is_ok());
        for bad in ["", "a[b", "a]b", "a/b"] {
            assert_eq!(
                validate_kind(bad),
                Err(HandleParseError::InvalidKind {
                    kind: bad.to_owned()
                })
            );
        }
        let rendered = Handle::new("Charm", None).nest("a[b", Some("1")).path();
        let parsed = Handle::from_path(&rendered).unwrap();
        assert_eq!(parsed.kind(), "a");
        assert_eq!(parsed.key(), Some("b[1"));
    }

    #[test]
    fn serializes_as_path_string() {
        let handle = Handle::new("Charm", Some("app/0"));
        let json = serde_json::to_string(&handle).unwrap();
        assert_eq!(json, r#""Charm[app/0]""#);
        let back: Handle = serde_json::from_str(&json).unwrap();
        assert_eq!(back, handle);
    }
}
