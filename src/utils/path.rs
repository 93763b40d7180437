use std::path::{Path, PathBuf};

const USER_DIR_PREFIX: &str = "user";

/// Per-user storage directory, e.g. `<base>/user3`.
///
/// Training images and menu images share this layout so a user's files can be
/// located (and cleared) from the user id alone.
pub fn user_dir(base: &Path, user_id: i32) -> PathBuf {
    base.join(format!("{}{}", USER_DIR_PREFIX, user_id))
}

/// Inverse of [`user_dir`]: `user12` -> `Some(12)`. Anything else is not a
/// user directory.
pub fn parse_user_dir_name(name: &str) -> Option<i32> {
    let digits = name.strip_prefix(USER_DIR_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Accept a client-supplied file name only when it names a plain file inside
/// the target directory (no separators, no parent references).
pub fn safe_file_name(name: &str) -> Option<&str> {
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    if name.contains('/') || name.contains('\\') || name.contains('\0') {
        return None;
    }
    Some(name)
}

pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "jpg" | "jpeg" | "png"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_dir_round_trips_through_name() {
        let dir = user_dir(Path::new("/data/training_images"), 42);
        assert_eq!(dir, PathBuf::from("/data/training_images/user42"));
        let name = dir.file_name().unwrap().to_str().unwrap();
        assert_eq!(parse_user_dir_name(name), Some(42));
    }

    #[test]
    fn rejects_non_user_dirs() {
        assert_eq!(parse_user_dir_name("user"), None);
        assert_eq!(parse_user_dir_name("users"), None);
        assert_eq!(parse_user_dir_name("user-1"), None);
        assert_eq!(parse_user_dir_name("guest1"), None);
        assert_eq!(parse_user_dir_name("user99999999999"), None);
    }

    #[test]
    fn rejects_traversal_names() {
        assert_eq!(safe_file_name("menu_1.jpg"), Some("menu_1.jpg"));
        assert_eq!(safe_file_name("../secret"), None);
        assert_eq!(safe_file_name(".."), None);
        assert_eq!(safe_file_name("a\\b.jpg"), None);
        assert_eq!(safe_file_name(""), None);
    }

    #[test]
    fn recognizes_image_extensions() {
        assert!(is_supported_image(Path::new("a/image1.jpg")));
        assert!(is_supported_image(Path::new("a/image1.PNG")));
        assert!(is_supported_image(Path::new("a/image1.jpeg")));
        assert!(!is_supported_image(Path::new("a/notes.txt")));
        assert!(!is_supported_image(Path::new("a/noext")));
    }
}
