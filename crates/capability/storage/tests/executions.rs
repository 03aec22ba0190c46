use domain::{ApprovalStatus, ExecutionStatus, LogLevel};
use scada_storage::{
    ExecutionLogRecord, ExecutionLogStore, ExecutionRecord, ExecutionStore, ExecutionUpdate,
    InMemoryExecutionLogStore, InMemoryExecutionStore,
};
use std::sync::Arc;

fn pending(execution_id: &str) -> ExecutionRecord {
    ExecutionRecord {
        execution_id: execution_id.to_string(),
        sequence_id: "seq-1".to_string(),
        site_id: "site-1".to_string(),
        status: ExecutionStatus::Pending,
        current_step: None,
        approval_status: ApprovalStatus::Pending,
        is_emergency: false,
        bypass_interlocks: false,
        initiated_by: "op-1".to_string(),
        reason: "planned".to_string(),
        approved_by: None,
        started_ms: 1_000,
        completed_ms: None,
        error: None,
    }
}

#[tokio::test]
async fn transition_applies_only_from_expected_status() {
    let store = InMemoryExecutionStore::new();
    store.create_execution(pending("ex-1")).await.expect("create");

    let approved = store
        .transition_execution(
            "ex-1",
            &[ExecutionStatus::Pending],
            ExecutionUpdate::status(ExecutionStatus::Running)
                .with_approval(ApprovalStatus::Approved, "sup-1")
                .with_step(Some(1)),
        )
        .await
        .expect("transition")
        .expect("applied");
    assert_eq!(approved.status, ExecutionStatus::Running);
    assert_eq!(approved.approved_by.as_deref(), Some("sup-1"));
    assert_eq!(approved.current_step, Some(1));

    let again = store
        .transition_execution(
            "ex-1",
            &[ExecutionStatus::Pending],
            ExecutionUpdate::status(ExecutionStatus::Running),
        )
        .await
        .expect("transition");
    assert!(again.is_none());

    let missing = store
        .transition_execution(
            "ex-404",
            &ExecutionStatus::ACTIVE,
            ExecutionUpdate::status(ExecutionStatus::Aborted),
        )
        .await
        .expect("transition");
    assert!(missing.is_none());
}

#[tokio::test]
async fn racing_transitions_have_single_winner() {
    let store = Arc::new(InMemoryExecutionStore::new());
    store.create_execution(pending("ex-2")).await.expect("create");
    let mut handles = Vec::new();
    for status in [ExecutionStatus::Aborted, ExecutionStatus::Completed] {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .transition_execution(
                    "ex-2",
                    &ExecutionStatus::ACTIVE,
                    ExecutionUpdate::status(status).completed_at(2_000),
                )
                .await
                .expect("transition")
        }));
    }
    let mut winners = 0;
    for handle in handles {
        if handle.await.expect("join").is_some() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
    let record = store.find_execution("ex-2").await.expect("find").expect("exists");
    assert!(record.status.is_terminal());
    assert_eq!(record.completed_ms, Some(2_000));
}

#[tokio::test]
async fn duplicate_execution_id_is_rejected() {
    let store = InMemoryExecutionStore::new();
    store.create_execution(pending("ex-3")).await.expect("create");
    assert!(store.create_execution(pending("ex-3")).await.is_err());
}

#[tokio::test]
async fn logs_keep_append_order() {
    let store = InMemoryExecutionLogStore::new();
    for (idx, message) in ["start", "step 1", "done"].iter().enumerate() {
        store
            .append_log(ExecutionLogRecord {
                log_id: format!("log-{idx}"),
                execution_id: "ex-1".to_string(),
                step_number: Some(idx as u32),
                level: LogLevel::Info,
                message: message.to_string(),
                ts_ms: 100,
            })
            .await
            .expect("append");
    }
    let logs = store.list_logs("ex-1").await.expect("list");
    let messages: Vec<&str> = logs.iter().map(|log| log.message.as_str()).collect();
    assert_eq!(messages, vec!["start", "step 1", "done"]);
    assert!(store.list_logs("ex-2").await.expect("list").is_empty());
}
