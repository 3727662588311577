use std::fmt;

use super::error::StorageError;

const MAX_KEY_LEN: usize = 512;

/// A validated, slash-separated object key relative to the store root.
///
/// Keys never escape the store: no absolute paths, no `..`, no hidden
/// segments, and only `a-zA-Z0-9`, `/`, `-`, `_`, `.` characters.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Validate a raw key string.
    pub fn parse(raw: &str) -> Result<Self, StorageError> {
        let key = raw.trim();

        if key.is_empty() {
            return Err(StorageError::InvalidKey("key cannot be empty".into()));
        }

        if key.len() > MAX_KEY_LEN {
            return Err(StorageError::InvalidKey(format!(
                "key exceeds maximum length of {MAX_KEY_LEN} characters"
            )));
        }

        if key.starts_with('/') || key.ends_with('/') {
            return Err(StorageError::InvalidKey(
                "key must not start or end with '/'".into(),
            ));
        }

        for segment in key.split('/') {
            if segment.is_empty() {
                return Err(StorageError::InvalidKey(
                    "key must not contain empty segments".into(),
                ));
            }
            if segment.starts_with('.') {
                return Err(StorageError::InvalidKey(format!(
                    "segment '{segment}' must not start with '.'"
                )));
            }
        }

        if let Some(bad) = key.chars().find(|c| !is_key_char(*c) && *c != '/') {
            return Err(StorageError::InvalidKey(format!(
                "key contains invalid character {bad:?}"
            )));
        }

        Ok(Self(key.to_string()))
    }

    /// Build a key from individual segments, sanitizing each one.
    pub fn from_segments<I, S>(segments: I) -> Result<Self, StorageError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = segments
            .into_iter()
            .flat_map(|s| {
                s.as_ref()
                    .split('/')
                    .filter(|part| !part.is_empty())
                    .map(sanitize_segment)
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>()
            .join("/");
        Self::parse(&joined)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The last segment of the key.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
}

/// Replace characters a key segment cannot hold with `_`.
///
/// Leading dots are replaced too so the segment never turns hidden.
pub fn sanitize_segment(segment: &str) -> String {
    let mut out: String = segment
        .trim()
        .chars()
        .map(|c| if is_key_char(c) { c } else { '_' })
        .collect();

    let leading_dots = out.chars().take_while(|c| *c == '.').count();
    if leading_dots > 0 {
        out.replace_range(..leading_dots, &"_".repeat(leading_dots));
    }

    if out.is_empty() { "_".to_string() } else { out }
}

impl fmt::Debug for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectKey({})", self.0)
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
