/// Check if a path contains traversal attempts, raw or percent-encoded.
pub fn contains_path_traversal(path: &str) -> bool {
    let lower = path.to_lowercase();

    // Direct traversal patterns
    if path.contains("/..") || path.contains("\\..") || path.starts_with("..") {
        return true;
    }

    // Current directory references
    if path.contains("/./") || path.contains("\\.\\") {
        return true;
    }

    // Multiple dots (bypass attempt: ....)
    if path.contains("....") {
        return true;
    }

    // URL-encoded variants (single and double encoding)
    let encoded_patterns = [
        "%2e%2e",
        "%252e%252e", // .. and double-encoded ..
        "%2e/",
        "%252e%2f", // ./
        "/%2e",
        "%2f%2e", // /.
        "%2e\\",
        "%2e%5c", // .\\
        "%5c%2e",
        "%5c%5c", // \\.
        "%00",    // Null byte
    ];

    if encoded_patterns.iter().any(|pattern| lower.contains(pattern)) {
        return true;
    }

    path.contains('\0')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_traversal_detection() {
        assert!(contains_path_traversal("/static/../etc/passwd"));
        assert!(contains_path_traversal("/static/%2e%2e/secret"));
        assert!(contains_path_traversal("/a/./b"));
        assert!(contains_path_traversal("/a%00.txt"));
        assert!(!contains_path_traversal("/static/css/site.css"));
        assert!(!contains_path_traversal("/docs/v1.2/readme.md"));
    }
}
