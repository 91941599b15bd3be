//! Property tests for segment routing through the service.

use proptest::prelude::*;
use segstore_server::{SegmentToContainerMapper, StreamSegmentStore};
use segstore_testkit::prelude::*;
use std::sync::Arc;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn requests_land_on_the_mapped_container(
        names in segment_names(16),
        count in container_count(),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let log = ReleaseLog::new();
            let stubs = Arc::new(StubRegistry::new(count, log.clone()));
            let builder = stub_builder(count, &log, Arc::clone(&stubs));
            let store = builder.create_segment_service().unwrap();

            for name in &names {
                store.get_segment_info(name, TEST_TIMEOUT).await.unwrap();
            }

            let mapper = SegmentToContainerMapper::new(count).unwrap();
            for id in 0..count {
                let expected = names
                    .iter()
                    .filter(|name| mapper.container_id(name) == id)
                    .count();
                assert_eq!(stubs.container(id).unwrap().dispatch_count(), expected);
            }
            builder.close().await;
        });
    }

    #[test]
    fn every_name_maps_into_range(name in segment_name(), count in container_count()) {
        let mapper = SegmentToContainerMapper::new(count).unwrap();
        let id = mapper.container_id(&name);
        prop_assert!(id < count);
        prop_assert_eq!(id, SegmentToContainerMapper::new(count).unwrap().container_id(&name));
    }
}
