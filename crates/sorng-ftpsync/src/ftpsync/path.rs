//! Remote path helpers. Remote paths always use `/`; directory paths carry
//! a trailing slash so they can be joined by plain concatenation.

/// Strip stray carriage returns and surrounding whitespace.
fn clean(path: &str) -> String {
    path.replace('\r', "").trim().to_string()
}

/// Normalise a remote directory path: leading and trailing `/`.
pub fn normalize_dir(path: &str) -> String {
    let mut p = clean(path);
    if !p.starts_with('/') {
        p.insert(0, '/');
    }
    if !p.ends_with('/') {
        p.push('/');
    }
    p
}

/// Normalise a remote file path: leading `/`, no trailing `/`.
pub fn normalize_file(path: &str) -> String {
    let mut p = clean(path);
    while p.len() > 1 && p.ends_with('/') {
        p.pop();
    }
    if !p.starts_with('/') {
        p.insert(0, '/');
    }
    p
}

/// Join a child name onto a directory path.
pub fn join(dir: &str, name: &str) -> String {
    format!("{}{}", normalize_dir(dir), name)
}

/// Join a child directory name onto a directory path, keeping the trailing `/`.
pub fn join_dir(dir: &str, name: &str) -> String {
    format!("{}{}/", normalize_dir(dir), name)
}

/// Last path component, ignoring a trailing slash. Root yields `/`.
pub fn basename(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/";
    }
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// Lexical parent of a directory path. Root is its own parent.
///
/// `/a/b/c/` → `/a/b/`, `/a/` → `/`, `/` → `/`.
pub fn parent_directory(path: &str) -> String {
    if path.is_empty() || path == "/" {
        return "/".to_string();
    }
    let work = path.strip_suffix('/').unwrap_or(path);
    match work.rfind('/') {
        Some(idx) if idx > 0 => work[..=idx].to_string(),
        _ => "/".to_string(),
    }
}

/// A name that can safely become a single local path component.
pub fn is_safe_component(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_of_nested_directory() {
        assert_eq!(parent_directory("/a/b/c/"), "/a/b/");
    }

    #[test]
    fn parent_of_top_level_directory_is_root() {
        assert_eq!(parent_directory("/a/"), "/");
    }

    #[test]
    fn root_is_its_own_parent() {
        assert_eq!(parent_directory("/"), "/");
        assert_eq!(parent_directory(""), "/");
    }

    #[test]
    fn parent_without_trailing_slash() {
        assert_eq!(parent_directory("/a/b"), "/a/");
    }

    #[test]
    fn normalize_adds_slashes_and_drops_cr() {
        assert_eq!(normalize_dir("pub\r"), "/pub/");
        assert_eq!(normalize_dir("/"), "/");
        assert_eq!(normalize_file("pub/x.txt/"), "/pub/x.txt");
    }

    #[test]
    fn basename_handles_directories() {
        assert_eq!(basename("/a/b/"), "b");
        assert_eq!(basename("/a/f.txt"), "f.txt");
        assert_eq!(basename("/"), "/");
    }

    #[test]
    fn unsafe_components_are_rejected() {
        assert!(is_safe_component("report.pdf"));
        assert!(!is_safe_component("../etc"));
        assert!(!is_safe_component("a\\b"));
        assert!(!is_safe_component(".."));
    }

    #[test]
    fn joins_keep_separators() {
        assert_eq!(join("/a", "f.txt"), "/a/f.txt");
        assert_eq!(join_dir("/a/", "b"), "/a/b/");
    }
}
