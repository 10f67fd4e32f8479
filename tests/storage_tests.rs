//! Integration tests for the key-value backends
//!
//! Exercises the file backend against a temporary directory

use gunadarma_assistant::storage::{FileStore, KeyValueStore, MemoryStore};
use std::sync::Arc;
use tempfile::TempDir;

fn temp_store() -> (TempDir, FileStore) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = FileStore::new(dir.path().join("data"));
    (dir, store)
}

mod file_store_tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let (_dir, store) = temp_store();
        let value = r#"[{"id": "c1", "title": "Test"}]"#;

        store.set("conversations", value).expect("Failed to set");

        assert_eq!(store.get("conversations"), Some(value.to_string()));
    }

    #[test]
    fn test_get_nonexistent() {
        let (_dir, store) = temp_store();
        assert_eq!(store.get("nonexistent_key"), None);
    }

    #[test]
    fn test_set_creates_root() {
        let (_dir, store) = temp_store();
        assert!(!store.root().exists());

        store.set("key", "value").expect("Failed to set");

        assert!(store.root().is_dir());
        assert!(store.path_for("key").is_file());
    }

    #[test]
    fn test_overwrite() {
        let (_dir, store) = temp_store();

        store.set("key", "first").expect("Failed to set");
        store.set("key", "second").expect("Failed to overwrite");

        assert_eq!(store.get("key"), Some("second".to_string()));
    }

    #[test]
    fn test_remove() {
        let (_dir, store) = temp_store();

        store.set("to_delete", "value").expect("Failed to set");
        assert!(store.get("to_delete").is_some());

        store.remove("to_delete").expect("Failed to delete");
        assert!(store.get("to_delete").is_none());
        assert!(!store.path_for("to_delete").exists());
    }

    #[test]
    fn test_remove_missing_key_is_ok() {
        let (_dir, store) = temp_store();
        store.remove("never_written").expect("Removing a missing key failed");
    }

    #[test]
    fn test_unsafe_key_stays_inside_root() {
        let (_dir, store) = temp_store();

        store.set("../outside", "value").expect("Failed to set");

        let path = store.path_for("../outside");
        assert!(path.starts_with(store.root()));
        assert_eq!(store.get("../outside"), Some("value".to_string()));
    }

    #[test]
    fn test_set_fails_when_root_is_a_file() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let blocker = dir.path().join("blocked");
        std::fs::write(&blocker, "not a directory").expect("Failed to write blocker");

        let store = FileStore::new(&blocker);
        let err = store.set("key", "value").unwrap_err();

        assert!(err.to_string().contains("blocked"));
    }
}

mod shared_store_tests {
    use super::*;

    #[test]
    fn test_arc_handle_shares_entries() {
        let memory = Arc::new(MemoryStore::new());
        let handle: Arc<MemoryStore> = Arc::clone(&memory);

        handle.set("key", "value").expect("Failed to set");

        assert!(memory.contains_key("key"));
        assert_eq!(KeyValueStore::get(&memory, "key"), Some("value".to_string()));
    }

    #[test]
    fn test_trait_object_backend() {
        let (_dir, store) = temp_store();
        let backend: Arc<dyn KeyValueStore> = Arc::new(store);

        backend.set("key", "value").expect("Failed to set");
        assert_eq!(backend.get("key"), Some("value".to_string()));
    }
}
