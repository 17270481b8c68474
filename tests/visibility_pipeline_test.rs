//! End-to-end visibility path: recorder → bus → index processor → bulk
//! processor → Elasticsearch, with acks reconciled back to the bus.

use std::sync::Arc;
use std::time::Duration;

use waypoint_core::config::IndexerConfig;
use waypoint_core::indexer::{EsBulkProcessor, IndexProcessor, VERSION_FOR_CLOSE, VERSION_FOR_OPEN};
use waypoint_core::matching::MatchingClient;
use waypoint_core::messaging::bus::{InMemoryBus, VisibilityProducer};
use waypoint_core::messaging::message::{VisibilityMessage, WorkflowCloseStatus};
use waypoint_core::metrics::MetricsClient;
use waypoint_core::persistence::WorkflowExecution;
use waypoint_core::standby::TransferRecorder;
use waypoint_core::test_helpers::{
    MemoryVisibilityStore, MockMatchingClient, ScriptedEsClient, StaticDomainCache,
};

fn fast_config() -> IndexerConfig {
    IndexerConfig {
        num_of_workers: 1,
        bulk_actions: 1,
        bulk_size_bytes: 1 << 20,
        flush_interval: Duration::from_millis(20),
        retry_interval: Duration::from_millis(10),
        bulk_retry_initial_interval: Duration::from_millis(5),
        bulk_retry_max_interval: Duration::from_millis(10),
        indexer_concurrency: 16,
        index_name: "vis".to_string(),
        doc_type: "visibility".to_string(),
    }
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within timeout");
}

#[tokio::test]
async fn workflow_lifecycle_flows_from_recorder_to_index() {
    let (producer, consumer, stats) = InMemoryBus::channel();

    let domain_cache = Arc::new(StaticDomainCache::default());
    domain_cache.insert_global_with_retention("d1", "orders", "remote", 3);
    let visibility_store = Arc::new(MemoryVisibilityStore::default());
    let matching: Arc<dyn MatchingClient> = Arc::new(MockMatchingClient::default());
    let recorder = TransferRecorder::new(
        domain_cache,
        visibility_store.clone(),
        Some(Arc::new(producer) as Arc<dyn VisibilityProducer>),
        matching,
    );

    let es_client = Arc::new(ScriptedEsClient::default());
    let metrics = MetricsClient::new();
    let bulk = Arc::new(EsBulkProcessor::start(
        fast_config(),
        es_client.clone(),
        metrics.clone(),
    ));
    let index_processor = IndexProcessor::new(fast_config(), bulk.clone(), metrics);
    index_processor.start(Box::new(consumer));

    let execution = WorkflowExecution {
        workflow_id: "wf1".to_string(),
        run_id: "run1".to_string(),
    };
    recorder
        .record_workflow_started("d1", &execution, "OrderWorkflow", 100, 60)
        .await
        .unwrap();
    recorder
        .record_workflow_closed(
            "d1",
            &execution,
            "OrderWorkflow",
            100,
            900,
            WorkflowCloseStatus::Completed,
            12,
        )
        .await
        .unwrap();

    // Both messages published, indexed, and acked back to the bus.
    wait_for(|| stats.acked() == 2).await;
    assert_eq!(stats.published(), 2);
    assert_eq!(bulk.in_flight_count(), 0);

    // The primary store saw both rows.
    assert_eq!(visibility_store.started().len(), 1);
    assert_eq!(visibility_store.closed().len(), 1);

    // The index received both versions of the document.
    let bodies = es_client.bodies().join("\n");
    assert!(bodies.contains(&format!("\"version\":{VERSION_FOR_OPEN}")));
    assert!(bodies.contains(&format!("\"version\":{VERSION_FOR_CLOSE}")));
    assert!(bodies.contains("\"_id\":\"run1\""));

    index_processor.stop().await;
    bulk.stop().await;
}

#[tokio::test]
async fn open_after_closed_collapses_to_highest_version() {
    let (producer, consumer, stats) = InMemoryBus::channel();

    let es_client = Arc::new(ScriptedEsClient::default());
    // With bulk_actions = 1 and one worker, requests flush in publish
    // order: Closed lands first (200), the late Open conflicts (409).
    es_client.enqueue_ok(ScriptedEsClient::response(&[("run1", 200)]));
    es_client.enqueue_ok(ScriptedEsClient::response(&[("run1", 409)]));

    let metrics = MetricsClient::new();
    let bulk = Arc::new(EsBulkProcessor::start(
        fast_config(),
        es_client.clone(),
        metrics.clone(),
    ));
    let index_processor = IndexProcessor::new(fast_config(), bulk.clone(), metrics);
    index_processor.start(Box::new(consumer));

    let closed = VisibilityMessage::closed(
        "d1",
        "wf1",
        "run1",
        "OrderWorkflow",
        100,
        900,
        WorkflowCloseStatus::Completed,
        12,
    );
    let open = VisibilityMessage::open("d1", "wf1", "run1", "OrderWorkflow", 100);
    producer.publish(&closed).await.unwrap();
    producer.publish(&open).await.unwrap();

    // Both end up acked: the conflicted Open counts as represented.
    wait_for(|| stats.acked() == 2).await;
    assert_eq!(bulk.in_flight_count(), 0);
    assert_eq!(es_client.call_count(), 2);

    index_processor.stop().await;
    bulk.stop().await;
}

#[tokio::test]
async fn undecodable_bus_message_is_counted_and_skipped() {
    let (producer, consumer, stats) = InMemoryBus::channel();

    let es_client = Arc::new(ScriptedEsClient::default());
    let metrics = MetricsClient::new();
    let bulk = Arc::new(EsBulkProcessor::start(
        fast_config(),
        es_client,
        metrics.clone(),
    ));
    let index_processor = IndexProcessor::new(fast_config(), bulk.clone(), metrics.clone());
    index_processor.start(Box::new(consumer));

    // A valid message sandwiched by garbage keeps flowing.
    producer.publish_raw(b"not a visibility message".to_vec());
    producer
        .publish(&VisibilityMessage::open("d1", "wf1", "run1", "OrderWorkflow", 1))
        .await
        .unwrap();

    wait_for(|| stats.acked() == 2).await;
    assert_eq!(metrics.es_processor_corrupted_data(), 1);

    index_processor.stop().await;
    bulk.stop().await;
}
