/// Integration tests for clearing and inspecting caches by name
#[cfg(feature = "stats")]
#[cfg(test)]
mod tests {
    use framecache::{timed_lru_cache, CacheRegistry};
    use serial_test::serial;

    #[timed_lru_cache(name = "registry_custom_name")]
    fn doubled(x: i32) -> i32 {
        x * 2
    }

    #[timed_lru_cache(maxsize = 10)]
    fn tripled(x: i32) -> i32 {
        x * 3
    }

    #[test]
    #[serial]
    fn test_caches_register_on_first_call() {
        doubled(1);
        tripled(1);

        let names = CacheRegistry::global().names();
        assert!(names.contains(&"registry_custom_name".to_string()));
        assert!(names.contains(&"tripled".to_string()));
        assert!(!names.contains(&"doubled".to_string()));
    }

    #[test]
    #[serial]
    fn test_info_counts_hits_and_misses() {
        doubled(0);
        assert!(framecache::cache_clear("registry_custom_name"));

        doubled(5); // miss
        doubled(5); // hit
        doubled(6); // miss
        doubled(5); // hit

        let info = framecache::cache_info("registry_custom_name").unwrap();
        assert_eq!(info.hits, 2);
        assert_eq!(info.misses, 2);
        assert_eq!(info.currsize, 2);
        assert_eq!(info.maxsize, None);
    }

    #[test]
    #[serial]
    fn test_clear_resets_entries_and_counters() {
        tripled(7);
        tripled(7);
        assert!(framecache::cache_clear("tripled"));

        let info = framecache::cache_info("tripled").unwrap();
        assert_eq!((info.hits, info.misses, info.currsize), (0, 0, 0));
        assert_eq!(info.maxsize, Some(10));
    }

    #[test]
    #[serial]
    fn test_unknown_names() {
        assert!(!framecache::cache_clear("never_registered"));
        assert!(framecache::cache_info("never_registered").is_none());
    }

    #[test]
    #[serial]
    fn test_clear_all() {
        doubled(9);
        tripled(9);
        assert!(framecache::cache_clear_all() >= 2);
        assert_eq!(framecache::cache_info("tripled").unwrap().currsize, 0);
        assert_eq!(framecache::cache_info("registry_custom_name").unwrap().currsize, 0);
    }
}
