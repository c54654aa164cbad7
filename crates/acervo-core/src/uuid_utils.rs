//! UUID v7 utilities for time-ordered identifiers.
//!
//! Every primary key in acervo is a UUIDv7 so rows sort by creation time
//! without a separate index on `created_at`.

use uuid::Uuid;

/// Generate a new UUIDv7 identifier.
///
/// # Example
///
/// ```
/// use acervo_core::uuid_utils::new_v7;
///
/// let id = new_v7();
/// assert_eq!(id.get_version_num(), 7);
/// ```
#[inline]
pub fn new_v7() -> Uuid {
    Uuid::now_v7()
}

/// Check whether an identifier is a UUIDv7.
pub fn is_v7(uuid: &Uuid) -> bool {
    uuid.get_version_num() == 7
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_v7_is_v7() {
        assert!(is_v7(&new_v7()));
    }

    #[test]
    fn test_v4_is_not_v7() {
        assert!(!is_v7(&Uuid::new_v4()));
    }

    #[test]
    fn test_v7_ids_are_ordered() {
        let a = new_v7();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = new_v7();
        assert!(a < b);
    }
}
