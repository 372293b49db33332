/// Integration tests for statistics registration of memoized methods

#[cfg(feature = "stats")]
#[cfg(test)]
mod tests {
    use memoslot::{memoize, stats_registry, MemoSlots, Memoizable};
    use serial_test::serial;

    #[derive(Default, Memoizable)]
    struct Catalog {
        slots: MemoSlots,
    }

    impl Catalog {
        #[memoize(name = "catalog_price")]
        fn price(&self, sku: u32) -> u32 {
            sku * 10
        }

        #[memoize]
        fn catalog_title(&self) -> String {
            "Spring catalog".to_string()
        }
    }

    #[test]
    #[serial]
    fn test_methods_registered_on_first_call() {
        let catalog = Catalog::default();
        catalog.price(1);
        catalog.catalog_title();

        let registered = stats_registry::list();
        assert!(
            registered.contains(&"catalog_price".to_string()),
            "Custom name should be registered"
        );
        assert!(
            registered.contains(&"catalog_title".to_string()),
            "Method name should be the default"
        );
        assert!(!registered.contains(&"price".to_string()));
    }

    #[test]
    #[serial]
    fn test_hits_and_misses_counted() {
        let catalog = Catalog::default();
        catalog.price(0);

        let stats = stats_registry::get_ref("catalog_price").unwrap();
        stats.reset();

        catalog.price(7);
        catalog.price(7);
        catalog.price(7);
        catalog.price(8);

        assert_eq!(stats.misses(), 2);
        assert_eq!(stats.hits(), 2);
        assert_eq!(stats.total_accesses(), 4);
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    #[serial]
    fn test_stats_span_instances() {
        let first = Catalog::default();
        first.catalog_title();

        let stats = stats_registry::get_ref("catalog_title").unwrap();
        stats.reset();

        let second = Catalog::default();
        first.catalog_title();
        second.catalog_title();
        second.catalog_title();

        let snapshot = stats_registry::get("catalog_title").unwrap();
        assert_eq!(snapshot.hits(), 2);
        assert_eq!(snapshot.misses(), 1);
    }
}
