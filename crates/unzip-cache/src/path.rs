use std::fmt;

/// Separator used by repository item paths.
pub const PATH_SEPARATOR: char = '/';

/// Normalized repository path of an archive.
///
/// The path is the cache key for the archive; its [`parent_folder`](Self::parent_folder) is
/// the key of the lock serializing every cache operation in that folder.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArchivePath(String);

impl ArchivePath {
    pub fn new(raw: &str) -> Self {
        Self(normalize_item_path(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn parent_folder(&self) -> String {
        parent_folder(&self.0)
    }

    /// Last path segment (the archive file name).
    pub fn file_name(&self) -> &str {
        self.0
            .trim_end_matches(PATH_SEPARATOR)
            .rsplit(PATH_SEPARATOR)
            .next()
            .unwrap_or("")
    }
}

impl fmt::Display for ArchivePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ArchivePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ArchivePath {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Lexically normalizes a repository item path.
///
/// Backslashes become `/`, repeated separators collapse, and the result always starts with a
/// single `/`. A trailing separator is kept so folder paths and version prefixes stay
/// distinguishable from item paths.
pub fn normalize_item_path(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 1);
    out.push(PATH_SEPARATOR);
    for ch in raw.chars() {
        let ch = if ch == '\\' { PATH_SEPARATOR } else { ch };
        if ch == PATH_SEPARATOR && out.ends_with(PATH_SEPARATOR) {
            continue;
        }
        out.push(ch);
    }
    out
}

/// Parent folder of `path`, with a trailing separator.
///
/// The last segment is stripped (ignoring a trailing separator), so `/a/b.zip` and `/a/c/`
/// both map to their enclosing folder (`/a/`). The root is its own parent.
pub fn parent_folder(path: &str) -> String {
    let normalized = normalize_item_path(path);
    let trimmed = normalized.trim_end_matches(PATH_SEPARATOR);
    match trimmed.rfind(PATH_SEPARATOR) {
        Some(idx) => format!("{}{PATH_SEPARATOR}", &trimmed[..idx]),
        None => PATH_SEPARATOR.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_separators() {
        assert_eq!(normalize_item_path("a/b.zip"), "/a/b.zip");
        assert_eq!(normalize_item_path("//a\\\\b//c.zip"), "/a/b/c.zip");
        assert_eq!(normalize_item_path("a/"), "/a/");
        assert_eq!(normalize_item_path(""), "/");
    }

    #[test]
    fn parent_folder_strips_last_segment() {
        assert_eq!(parent_folder("/org/x/1.0/x-1.0.zip"), "/org/x/1.0/");
        assert_eq!(parent_folder("/org/x/1.0-SNAPSHOT/x-"), "/org/x/1.0-SNAPSHOT/");
        assert_eq!(parent_folder("a/"), "/");
        assert_eq!(parent_folder("/b.zip"), "/");
        assert_eq!(parent_folder("/"), "/");
    }

    #[test]
    fn siblings_share_a_parent_folder() {
        let a = ArchivePath::new("org/x/1.0/x-1.0.zip");
        let b = ArchivePath::new("/org/x/1.0/x-1.0-sources.zip");
        assert_eq!(a.parent_folder(), b.parent_folder());
        assert_eq!(a.file_name(), "x-1.0.zip");
    }
}
