// Path normalization for pattern matching
//
// Registry patterns and detector file patterns are written Unix-style
// ("/nginx/*.conf"), so every path is compared in an absolute, `/`-separated
// form regardless of platform.

use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR};

/// Convert a path to an absolute Unix-style string (with `/` separators)
///
/// Relative paths are anchored at the current directory; `.` and `..`
/// components are resolved lexically so the file does not need to exist.
/// The result always starts with `/` so path-convention fragments like
/// `"/nginx/"` match a directory at any depth, including the first.
///
/// # Examples
/// ```
/// use reveal_core::utils::paths::to_unix_style;
/// use std::path::Path;
///
/// assert_eq!(to_unix_style(Path::new("/etc/nginx/../nginx/site.conf")), "/etc/nginx/site.conf");
/// ```
pub fn to_unix_style(path: &Path) -> String {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::Prefix(prefix) => normalized.push(prefix.as_os_str()),
            Component::RootDir => normalized.push("/"),
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            Component::Normal(name) => normalized.push(name),
        }
    }

    let text = normalized.to_string_lossy();
    // On Unix, MAIN_SEPARATOR is already '/', so this is a no-op
    let unix_style = if MAIN_SEPARATOR == '\\' {
        text.replace('\\', "/")
    } else {
        text.to_string()
    };

    if unix_style.starts_with('/') {
        unix_style
    } else {
        format!("/{}", unix_style)
    }
}

/// Lowercased final component ("Dockerfile" -> "dockerfile")
pub fn file_name_lower(path: &Path) -> Option<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().to_lowercase())
}

/// Lowercased extension without the dot ("Schema.SQL" -> "sql")
pub fn extension_lower(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unix_style_is_absolute_and_resolved() {
        let path = to_unix_style(Path::new("/srv/app/./conf/../nginx/site.conf"));
        assert_eq!(path, "/srv/app/nginx/site.conf");
    }

    #[test]
    fn test_relative_paths_are_anchored() {
        let path = to_unix_style(Path::new("nginx/site.conf"));
        assert!(path.starts_with('/'));
        assert!(path.ends_with("/nginx/site.conf"));
    }

    #[test]
    fn test_name_and_extension_are_lowercased() {
        let path = Path::new("/tmp/Schema.SQL");
        assert_eq!(file_name_lower(path).as_deref(), Some("schema.sql"));
        assert_eq!(extension_lower(path).as_deref(), Some("sql"));
        assert_eq!(extension_lower(Path::new("Dockerfile")), None);
    }
}
