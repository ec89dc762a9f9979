//! Helpers for the game-style paths models are named after.
//!
//! Both `/` and `\` are treated as separators, paths inside game data aren't
//! necessarily native to the host.

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

/// The final component of `path`.
#[must_use]
pub fn file_name(path: &str) -> &str {
    path.rsplit(is_separator).next().unwrap_or(path)
}

/// `path` without the extension of its final component.
#[must_use]
pub fn strip_extension(path: &str) -> &str {
    let name_start = path.len() - file_name(path).len();

    match path[name_start..].rfind('.') {
        Some(0) | None => path,
        Some(dot) => &path[..name_start + dot],
    }
}

/// The final component of `path` without its extension.
#[must_use]
pub fn file_stem(path: &str) -> &str {
    strip_extension(file_name(path))
}

/// The extension of the final component, without the dot.
#[must_use]
pub fn extension(path: &str) -> Option<&str> {
    let name = file_name(path);
    match name.rfind('.') {
        Some(0) | None => None,
        Some(dot) => Some(&name[dot + 1..]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_only_the_last_extension() {
        assert_eq!(
            strip_extension("../tests/assets/model.mdl"),
            "../tests/assets/model"
        );
        assert_eq!(strip_extension("a.b/c"), "a.b/c");
        assert_eq!(strip_extension("archive.tar.gz"), "archive.tar");
        assert_eq!(strip_extension("dir/.hidden"), "dir/.hidden");
    }

    #[test]
    fn stems_and_names() {
        assert_eq!(file_stem("models/players/head.md3"), "head");
        assert_eq!(file_stem("models\\mapobjects\\box.MDC"), "box");
        assert_eq!(file_stem("plain"), "plain");
        assert_eq!(file_name("a/b/"), "");
    }

    #[test]
    fn extensions() {
        assert_eq!(extension("x/model.md3"), Some("md3"));
        assert_eq!(extension("x.y/model"), None);
    }
}
