// Hello-world runs driven through the gateway against a live worker

use std::sync::Arc;
use std::time::Duration;

use flowgate_core::gateway::{self, GatewayConfig, GatewayContext, GatewayError};
use flowgate_core::{EventType, ExecutionDetail, ExecutionStatus, FixedClock};
use flowgate_durable::ActivityError;
use flowgate_worker::{DurableWorker, WorkerConfig, ACTIVITY_TYPE};

fn worker() -> DurableWorker {
    DurableWorker::new(WorkerConfig::default().with_timeout_sweep_interval(Duration::from_millis(50)))
}

fn context(worker: &DurableWorker) -> GatewayContext {
    GatewayContext::new(Arc::new(worker.backend()), GatewayConfig::default())
}

async fn wait_for_close(ctx: &GatewayContext, id: &str) -> ExecutionDetail {
    for _ in 0..100 {
        let detail = gateway::describe_execution(ctx, id, None).await.unwrap();
        if detail.status != ExecutionStatus::Running {
            return detail;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("execution {} did not close", id);
}

#[tokio::test]
async fn test_hello_world_completes() {
    let worker = worker();
    worker.start().await.unwrap();
    let ctx = context(&worker);

    let started = gateway::start_execution(&ctx, Some("Ada")).await.unwrap();
    assert!(started.id.starts_with("hello-world-"));

    let detail = wait_for_close(&ctx, &started.id).await;
    assert_eq!(detail.status, ExecutionStatus::Completed);
    assert_eq!(detail.run_id, started.run_id);
    assert_eq!(detail.history_length, 11);
    assert!(detail.close_time.is_some());
    assert!(detail.pending_activities.is_empty());

    let history = gateway::get_history(&ctx, &started.id, Some(&started.run_id))
        .await
        .unwrap();
    assert_eq!(history.len(), 11);
    assert_eq!(history[0].details, "Workflow started with input");
    assert_eq!(history[4].details, format!("Activity: {}", ACTIVITY_TYPE));
    assert_eq!(history[6].event_type, EventType::ActivityTaskCompleted);
    assert_eq!(history[10].event_type, EventType::WorkflowExecutionCompleted);
    assert_eq!(history[10].details, "Workflow completed successfully");

    let listed = gateway::list_executions(&ctx).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].status, ExecutionStatus::Completed);

    worker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_activity_failure_fails_the_run() {
    let worker = worker();
    worker
        .pool()
        .register_handler(ACTIVITY_TYPE, |_ctx, _input| async {
            Err(ActivityError::non_retryable("boom"))
        });
    worker.start().await.unwrap();
    let ctx = context(&worker);

    let started = gateway::start_execution(&ctx, None).await.unwrap();
    let detail = wait_for_close(&ctx, &started.id).await;
    assert_eq!(detail.status, ExecutionStatus::Failed);

    let history = gateway::get_history(&ctx, &started.id, None).await.unwrap();
    let last = history.last().unwrap();
    assert_eq!(last.event_type, EventType::WorkflowExecutionFailed);
    assert_eq!(last.details, "Workflow failed: boom");
    assert!(history
        .iter()
        .any(|e| e.details == "Activity failed: boom"));

    worker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_run_without_worker_stays_open_with_pending_activity() {
    let worker = worker();
    let ctx = context(&worker);

    let started = gateway::start_execution(&ctx, Some("Ada")).await.unwrap();
    let detail = gateway::describe_execution(&ctx, &started.id, None).await.unwrap();

    assert_eq!(detail.status, ExecutionStatus::Running);
    assert_eq!(detail.close_time, None);
    assert_eq!(detail.pending_activities.len(), 1);
    assert_eq!(detail.pending_activities[0].activity_type, ACTIVITY_TYPE);

    let value = serde_json::to_value(&detail).unwrap();
    assert_eq!(value["pendingActivities"][0]["state"], "SCHEDULED");
}

#[tokio::test]
async fn test_history_of_unknown_execution_is_empty() {
    let worker = worker();
    let ctx = context(&worker);

    let history = gateway::get_history(&ctx, "hello-world-19700101-000000", None)
        .await
        .unwrap();
    assert!(history.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_starts_and_queries_finish() {
    let worker = worker();
    worker.start().await.unwrap();
    let base = chrono::DateTime::from_timestamp(1_714_564_800, 0).unwrap();

    let mut calls = tokio::task::JoinSet::new();
    for i in 0..64 {
        // One clock second per start keeps the generated ids distinct.
        let ctx = context(&worker).with_clock(Arc::new(FixedClock(base + chrono::Duration::seconds(i))));
        let id = gateway::execution_id(base + chrono::Duration::seconds(i));

        let start_ctx = ctx.clone();
        calls.spawn(async move {
            gateway::start_execution(&start_ctx, Some("Ada")).await.unwrap();
        });

        let query_ctx = ctx.clone();
        calls.spawn(async move {
            for _ in 0..10 {
                match gateway::describe_execution(&query_ctx, &id, None).await {
                    Ok(_) | Err(GatewayError::NotFound(_)) => {}
                    Err(e) => panic!("describe {} failed: {}", id, e),
                }
                gateway::get_history(&query_ctx, &id, None).await.unwrap();
                tokio::task::yield_now().await;
            }
        });
    }

    tokio::time::timeout(Duration::from_secs(30), async {
        while let Some(joined) = calls.join_next().await {
            joined.unwrap();
        }
    })
    .await
    .expect("concurrent gateway calls did not finish");

    let ctx = context(&worker);
    let listed = gateway::list_executions(&ctx).await.unwrap();
    assert_eq!(listed.len(), 64);

    worker.shutdown().await.unwrap();
}
