//! UUID utilities

use uuid::Uuid;

/// Generate a new UUIDv4 in its hyphenated string form
///
/// Session and row identifiers are stored as text.
pub fn generate_string() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_string_is_v4() {
        let id = generate_string();
        assert_eq!(id.len(), 36);
        assert_eq!(Uuid::parse_str(&id).unwrap().get_version_num(), 4);
    }

    #[test]
    fn test_generate_string_is_unique() {
        assert_ne!(generate_string(), generate_string());
    }
}
