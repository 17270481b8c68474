//! Bulk processor staging, de-duplication, and reconciliation.

use std::sync::Arc;
use std::time::Duration;

use waypoint_core::config::IndexerConfig;
use waypoint_core::indexer::{
    BulkRequest, EsBulkProcessor, VERSION_FOR_DELETE, VERSION_FOR_OPEN,
};
use waypoint_core::messaging::message::VisibilityMessage;
use waypoint_core::metrics::MetricsClient;
use waypoint_core::test_helpers::{ScriptedEsClient, TestBusMessage, TestMessageProbe};

fn fast_config() -> IndexerConfig {
    IndexerConfig {
        num_of_workers: 1,
        bulk_actions: 10,
        bulk_size_bytes: 1 << 20,
        flush_interval: Duration::from_millis(30),
        retry_interval: Duration::from_millis(10),
        bulk_retry_initial_interval: Duration::from_millis(5),
        bulk_retry_max_interval: Duration::from_millis(10),
        indexer_concurrency: 16,
        index_name: "vis".to_string(),
        doc_type: "visibility".to_string(),
    }
}

fn open_request(run_id: &str) -> BulkRequest {
    let doc = VisibilityMessage::open("d1", "wf1", run_id, "OrderWorkflow", 42);
    BulkRequest::index("vis", "visibility", run_id, VERSION_FOR_OPEN, doc)
}

fn open_message(run_id: &str) -> (Box<TestBusMessage>, TestMessageProbe) {
    let msg = VisibilityMessage::open("d1", "wf1", run_id, "OrderWorkflow", 42);
    TestBusMessage::from_message(&msg)
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
async fn successful_flush_acks_the_message() {
    let client = Arc::new(ScriptedEsClient::default());
    let processor = EsBulkProcessor::start(fast_config(), client.clone(), MetricsClient::new());

    let (msg, probe) = open_message("runA");
    processor.add(open_request("runA"), "runAOpen".to_string(), msg);

    wait_for(|| probe.is_acked()).await;
    assert_eq!(processor.in_flight_count(), 0);
    assert_eq!(client.call_count(), 1);
    processor.stop().await;
}

// S5: version conflict is success; the handle is acked, nothing resubmits.
#[tokio::test]
async fn version_conflict_is_acked_and_removed() {
    let client = Arc::new(ScriptedEsClient::default());
    client.enqueue_ok(ScriptedEsClient::response(&[("runA", 409)]));
    let processor = EsBulkProcessor::start(fast_config(), client.clone(), MetricsClient::new());

    let (msg, probe) = open_message("runA");
    processor.add(open_request("runA"), "runAOpen".to_string(), msg);

    wait_for(|| probe.is_acked()).await;
    assert_eq!(processor.in_flight_count(), 0);

    // Give any erroneous resubmit a chance to show up.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(client.call_count(), 1);
    processor.stop().await;
}

// S6: duplicate add acks the second handle immediately, submits once.
#[tokio::test]
async fn duplicate_add_acks_new_handle_immediately() {
    let client = Arc::new(ScriptedEsClient::default());
    let metrics = MetricsClient::new();
    let mut config = fast_config();
    config.flush_interval = Duration::from_millis(200);
    let processor = EsBulkProcessor::start(config, client.clone(), metrics.clone());

    let (first, first_probe) = open_message("runA");
    let (second, second_probe) = open_message("runA");
    processor.add(open_request("runA"), "runAOpen".to_string(), first);
    processor.add(open_request("runA"), "runAOpen".to_string(), second);

    assert!(second_probe.is_acked());
    assert!(!first_probe.is_acked());
    assert_eq!(metrics.es_processor_duplicate_messages(), 1);

    wait_for(|| first_probe.is_acked()).await;
    assert_eq!(client.call_count(), 1);
    let body = client.bodies().remove(0);
    assert_eq!(body.lines().count(), 2); // one header, one document
    processor.stop().await;
}

#[tokio::test]
async fn failed_item_is_resubmitted_until_success() {
    let client = Arc::new(ScriptedEsClient::default());
    client.enqueue_ok(ScriptedEsClient::response(&[("runA", 503)]));
    // Second call falls through to auto-success.
    let processor = EsBulkProcessor::start(fast_config(), client.clone(), MetricsClient::new());

    let (msg, probe) = open_message("runA");
    processor.add(open_request("runA"), "runAOpen".to_string(), msg);

    wait_for(|| probe.is_acked()).await;
    assert!(client.call_count() >= 2);
    assert_eq!(processor.in_flight_count(), 0);
    processor.stop().await;
}

#[tokio::test]
async fn whole_batch_failure_resubmits_without_acking() {
    let client = Arc::new(ScriptedEsClient::default());
    // Enough transport errors to exhaust the in-flush backoff once.
    for _ in 0..3 {
        client.enqueue_err("connection refused");
    }
    let metrics = MetricsClient::new();
    let processor = EsBulkProcessor::start(fast_config(), client.clone(), metrics.clone());

    let (msg, probe) = open_message("runA");
    processor.add(open_request("runA"), "runAOpen".to_string(), msg);

    wait_for(|| metrics.es_processor_failures() == 1).await;
    assert!(!probe.is_acked());

    // The rebuilt request goes through on the auto-success path.
    wait_for(|| probe.is_acked()).await;
    assert_eq!(processor.in_flight_count(), 0);
    processor.stop().await;
}

#[tokio::test]
async fn flush_triggers_on_bulk_actions_before_interval() {
    let client = Arc::new(ScriptedEsClient::default());
    let mut config = fast_config();
    config.bulk_actions = 2;
    config.flush_interval = Duration::from_secs(30);
    let processor = EsBulkProcessor::start(config, client.clone(), MetricsClient::new());

    let (first, first_probe) = open_message("runA");
    let (second, second_probe) = open_message("runB");
    processor.add(open_request("runA"), "runAOpen".to_string(), first);
    processor.add(open_request("runB"), "runBOpen".to_string(), second);

    wait_for(|| first_probe.is_acked() && second_probe.is_acked()).await;
    assert_eq!(client.call_count(), 1);
    processor.stop().await;
}

#[tokio::test]
async fn delete_requests_retry_symmetrically() {
    let client = Arc::new(ScriptedEsClient::default());
    client.enqueue_ok(ScriptedEsClient::response(&[("runA", 503)]));
    let processor = EsBulkProcessor::start(fast_config(), client.clone(), MetricsClient::new());

    let delete_msg = VisibilityMessage::delete("d1", "wf1", "runA");
    let (msg, probe) = TestBusMessage::from_message(&delete_msg);
    let request = BulkRequest::delete("vis", "visibility", "runA", VERSION_FOR_DELETE);
    processor.add(request, "runADelete".to_string(), msg);

    // The failed delete is rebuilt and resubmitted, not dropped.
    wait_for(|| probe.is_acked()).await;
    assert!(client.call_count() >= 2);
    processor.stop().await;
}

#[tokio::test]
async fn stop_flushes_staged_requests() {
    let client = Arc::new(ScriptedEsClient::default());
    let mut config = fast_config();
    config.flush_interval = Duration::from_secs(30);
    config.bulk_actions = 100;
    let processor = EsBulkProcessor::start(config, client.clone(), MetricsClient::new());

    let (msg, probe) = open_message("runA");
    processor.add(open_request("runA"), "runAOpen".to_string(), msg);
    // Let the worker pick the request up before stopping.
    tokio::time::sleep(Duration::from_millis(50)).await;

    processor.stop().await;
    assert!(probe.is_acked());
}
