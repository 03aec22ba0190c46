mod support;

use domain::{
    ApprovalStatus, AuthorizationLevel, ExecutionStatus, LogLevel, PermissivePolicy, Severity,
    TagValue,
};
use scada_sequencer::SequenceError;
use std::time::Duration;
use support::{harness, messages, operator};

#[tokio::test(start_paused = true)]
async fn pauses_before_hold_point_after_wait() {
    let h = harness(PermissivePolicy::Block);
    let op = operator(AuthorizationLevel::Operator);
    let started = tokio::time::Instant::now();

    let execution = h
        .sequencer
        .initiate("S1", &op, "Scheduled maintenance", false, false)
        .await
        .expect("initiate");
    assert_eq!(execution.status, ExecutionStatus::Running);
    assert_eq!(execution.approval_status, ApprovalStatus::NotRequired);

    h.sequencer.wait_idle(&execution.execution_id).await;
    assert!(started.elapsed() >= Duration::from_secs(5));

    let view = h.view(&execution.execution_id).await;
    assert_eq!(view.execution.status, ExecutionStatus::Paused);
    assert_eq!(view.execution.current_step, Some(3));
    assert_eq!(
        h.device.writes(),
        vec![("00001".to_string(), TagValue::Bool(false))]
    );
    let logs = messages(&view);
    assert_eq!(
        logs.first(),
        Some(&"Shutdown sequence initiated by Dana. Reason: Scheduled maintenance")
    );
    assert!(logs.contains(&"Executing step 2: Settle"));
    assert_eq!(logs.last(), Some(&"Paused at step 3 - awaiting confirmation"));
    assert!(!logs.iter().any(|message| message.starts_with("Executing step 3")));

    let resumed = h
        .sequencer
        .continue_execution(&execution.execution_id, &op)
        .await
        .expect("continue");
    assert_eq!(resumed.status, ExecutionStatus::Running);
    h.sequencer.wait_idle(&execution.execution_id).await;

    let view = h.view(&execution.execution_id).await;
    assert_eq!(view.execution.status, ExecutionStatus::Completed);
    assert!(view.execution.completed_ms.is_some());
    assert_eq!(
        h.device.writes().last(),
        Some(&("00002".to_string(), TagValue::Bool(true)))
    );
    let last = view.logs.last().expect("log");
    assert_eq!(last.level, LogLevel::Success);
    assert_eq!(last.message, "Shutdown sequence completed successfully");
}

#[tokio::test(start_paused = true)]
async fn abort_while_paused_is_terminal() {
    let h = harness(PermissivePolicy::Block);
    let op = operator(AuthorizationLevel::Operator);
    let execution = h
        .sequencer
        .initiate("S1", &op, "Scheduled maintenance", false, false)
        .await
        .expect("initiate");
    h.sequencer.wait_idle(&execution.execution_id).await;

    let aborted = h
        .sequencer
        .abort(&execution.execution_id, &op, "Crew on site")
        .await
        .expect("abort");
    assert_eq!(aborted.status, ExecutionStatus::Aborted);
    assert_eq!(aborted.current_step, Some(3));

    let err = h
        .sequencer
        .continue_execution(&execution.execution_id, &op)
        .await
        .expect_err("terminal");
    assert!(matches!(
        err,
        SequenceError::InvalidState {
            status: ExecutionStatus::Aborted,
            ..
        }
    ));

    let err = h
        .sequencer
        .abort(&execution.execution_id, &op, "again")
        .await
        .expect_err("already aborted");
    assert!(matches!(err, SequenceError::InvalidState { .. }));

    let view = h.view(&execution.execution_id).await;
    let last = view.logs.last().expect("log");
    assert_eq!(last.level, LogLevel::Warning);
    assert_eq!(last.message, "Execution aborted by Dana. Reason: Crew on site");
    assert_eq!(h.device.writes().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn abort_interrupts_wait_step() {
    let h = harness(PermissivePolicy::Block);
    let op = operator(AuthorizationLevel::Operator);
    let execution = h
        .sequencer
        .initiate("S1", &op, "Scheduled maintenance", false, false)
        .await
        .expect("initiate");

    tokio::time::sleep(Duration::from_secs(2)).await;
    let view = h.view(&execution.execution_id).await;
    assert_eq!(view.execution.current_step, Some(2));

    h.sequencer
        .abort(&execution.execution_id, &op, "Gas detected")
        .await
        .expect("abort");
    let before = tokio::time::Instant::now();
    h.sequencer.wait_idle(&execution.execution_id).await;
    assert!(before.elapsed() < Duration::from_secs(1));

    let view = h.view(&execution.execution_id).await;
    assert_eq!(view.execution.status, ExecutionStatus::Aborted);
    assert!(!messages(&view).iter().any(|m| m.starts_with("Step 2 completed")));
    assert_eq!(h.device.writes().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn approval_gates_execution() {
    let h = harness(PermissivePolicy::Block);
    let op = operator(AuthorizationLevel::Operator);
    let execution = h
        .sequencer
        .initiate("S2", &op, "Tank high level", false, false)
        .await
        .expect("initiate");
    assert_eq!(execution.status, ExecutionStatus::Pending);
    assert_eq!(execution.approval_status, ApprovalStatus::Pending);
    tokio::task::yield_now().await;
    assert!(h.device.writes().is_empty());

    let err = h
        .sequencer
        .approve(&execution.execution_id, &op)
        .await
        .expect_err("operator cannot approve");
    assert!(matches!(
        err,
        SequenceError::Authorization {
            required: AuthorizationLevel::Supervisor,
            actual: AuthorizationLevel::Operator,
        }
    ));

    let supervisor = operator(AuthorizationLevel::Supervisor);
    let approved = h
        .sequencer
        .approve(&execution.execution_id, &supervisor)
        .await
        .expect("approve");
    assert_eq!(approved.status, ExecutionStatus::Running);
    assert_eq!(approved.approval_status, ApprovalStatus::Approved);
    assert_eq!(approved.approved_by.as_deref(), Some("op-7"));
    h.sequencer.wait_idle(&execution.execution_id).await;

    let view = h.view(&execution.execution_id).await;
    assert_eq!(view.execution.status, ExecutionStatus::Completed);
    assert!(messages(&view).contains(&"Shutdown approved by Dana"));
    assert_eq!(
        h.device.writes(),
        vec![
            ("00010".to_string(), TagValue::Bool(false)),
            ("40030".to_string(), TagValue::Float(5.0)),
        ]
    );

    let err = h
        .sequencer
        .approve(&execution.execution_id, &supervisor)
        .await
        .expect_err("already approved");
    assert!(matches!(err, SequenceError::InvalidState { .. }));
}

#[tokio::test(start_paused = true)]
async fn emergency_skips_approval() {
    let h = harness(PermissivePolicy::Block);
    let op = operator(AuthorizationLevel::Operator);
    let execution = h
        .sequencer
        .initiate("S2", &op, "Fire", true, false)
        .await
        .expect("initiate");
    assert_eq!(execution.status, ExecutionStatus::Running);
    assert_eq!(execution.approval_status, ApprovalStatus::Approved);
    h.sequencer.wait_idle(&execution.execution_id).await;
    let view = h.view(&execution.execution_id).await;
    assert_eq!(view.execution.status, ExecutionStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn partial_open_step_drives_valve_position() {
    let h = harness(PermissivePolicy::Block);
    let op = operator(AuthorizationLevel::Operator);
    let execution = h
        .sequencer
        .initiate("S6", &op, "Restart after shut-in", false, false)
        .await
        .expect("initiate");
    h.sequencer.wait_idle(&execution.execution_id).await;
    let view = h.view(&execution.execution_id).await;
    assert_eq!(view.execution.status, ExecutionStatus::Completed);
    // 未指定开度的步骤按全开处理
    assert_eq!(
        h.device.writes(),
        vec![
            ("40040".to_string(), TagValue::Float(25.0)),
            ("00003".to_string(), TagValue::Bool(true)),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn site_interlocks_reject_unless_emergency_or_bypass() {
    let h = harness(PermissivePolicy::Block);
    let op = operator(AuthorizationLevel::Operator);
    h.set("PT-101", TagValue::Float(990.0));

    let err = h
        .sequencer
        .initiate("S1", &op, "Routine", false, false)
        .await
        .expect_err("interlocked");
    match err {
        SequenceError::InterlockViolation(violations) => {
            assert_eq!(violations.len(), 1);
            assert_eq!(violations[0].rule_id, "r-1");
            assert_eq!(violations[0].severity, Severity::Critical);
        }
        other => panic!("unexpected error: {other}"),
    }

    let emergency = h
        .sequencer
        .initiate("S1", &op, "Wellhead leak", true, false)
        .await
        .expect("emergency");
    h.sequencer.wait_idle(&emergency.execution_id).await;
    let view = h.view(&emergency.execution_id).await;
    let warning = view
        .logs
        .iter()
        .find(|log| log.message.starts_with("Interlock violation ignored"))
        .expect("violation logged");
    assert_eq!(warning.level, LogLevel::Warning);
    assert!(warning.message.contains("Overpressure"));

    let bypassed = h
        .sequencer
        .initiate("S1", &op, "Commissioning", false, true)
        .await
        .expect("bypass");
    assert!(bypassed.bypass_interlocks);
    h.sequencer.wait_idle(&bypassed.execution_id).await;
    let view = h.view(&bypassed.execution_id).await;
    assert!(messages(&view).contains(&"Interlock checks bypassed"));
}

#[tokio::test(start_paused = true)]
async fn unmet_permissive_blocks_step_by_default() {
    let h = harness(PermissivePolicy::Block);
    let op = operator(AuthorizationLevel::Operator);
    let execution = h
        .sequencer
        .initiate("S3", &op, "Transfer complete", false, false)
        .await
        .expect("initiate");
    h.sequencer.wait_idle(&execution.execution_id).await;

    let view = h.view(&execution.execution_id).await;
    assert_eq!(view.execution.status, ExecutionStatus::Paused);
    assert_eq!(view.execution.current_step, Some(2));
    assert!(messages(&view).contains(&"Permissives not satisfied for step 2: Tank vent open"));
    assert!(!h.device.writes().iter().any(|(address, _)| address == "00010"));

    // 许可仍不满足时继续会再次暂停
    h.sequencer
        .continue_execution(&execution.execution_id, &op)
        .await
        .expect("continue");
    h.sequencer.wait_idle(&execution.execution_id).await;
    assert_eq!(
        h.view(&execution.execution_id).await.execution.status,
        ExecutionStatus::Paused
    );

    h.set("ZS-201", TagValue::Bool(true));
    h.sequencer
        .continue_execution(&execution.execution_id, &op)
        .await
        .expect("continue");
    h.sequencer.wait_idle(&execution.execution_id).await;
    let view = h.view(&execution.execution_id).await;
    assert_eq!(view.execution.status, ExecutionStatus::Completed);
    assert_eq!(
        h.device.writes().last(),
        Some(&("00010".to_string(), TagValue::Bool(false)))
    );
}

#[tokio::test(start_paused = true)]
async fn warn_policy_proceeds_with_warning() {
    let h = harness(PermissivePolicy::Warn);
    let op = operator(AuthorizationLevel::Operator);
    let execution = h
        .sequencer
        .initiate("S3", &op, "Transfer complete", false, false)
        .await
        .expect("initiate");
    h.sequencer.wait_idle(&execution.execution_id).await;

    let view = h.view(&execution.execution_id).await;
    assert_eq!(view.execution.status, ExecutionStatus::Completed);
    let warning = view
        .logs
        .iter()
        .find(|log| log.message == "Proceeding with step 2 despite unmet permissives")
        .expect("warning");
    assert_eq!(warning.level, LogLevel::Warning);
    assert_eq!(warning.step_number, Some(2));
}

#[tokio::test(start_paused = true)]
async fn check_condition_waits_for_value_then_raises_alarm() {
    let h = harness(PermissivePolicy::Block);
    let op = operator(AuthorizationLevel::Operator);
    let execution = h
        .sequencer
        .initiate("S4", &op, "Bleed down", false, false)
        .await
        .expect("initiate");

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(
        h.view(&execution.execution_id).await.execution.status,
        ExecutionStatus::Running
    );
    h.set("PT-101", TagValue::Float(40.0));
    h.sequencer.wait_idle(&execution.execution_id).await;

    let view = h.view(&execution.execution_id).await;
    assert_eq!(view.execution.status, ExecutionStatus::Completed);
    let alerts = h.alerts.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].severity, Severity::High);
    assert_eq!(alerts[0].message, "Well shut in");
}

#[tokio::test(start_paused = true)]
async fn check_condition_times_out_and_fails_execution() {
    let h = harness(PermissivePolicy::Block);
    let op = operator(AuthorizationLevel::Operator);
    let execution = h
        .sequencer
        .initiate("S4", &op, "Bleed down", false, false)
        .await
        .expect("initiate");
    h.sequencer.wait_idle(&execution.execution_id).await;

    let view = h.view(&execution.execution_id).await;
    assert_eq!(view.execution.status, ExecutionStatus::Failed);
    assert_eq!(
        view.execution.error.as_deref(),
        Some("Step 1 failed: step timed out after 10 s")
    );
    let last = view.logs.last().expect("log");
    assert_eq!(last.level, LogLevel::Error);
    assert_eq!(last.step_number, Some(1));
    assert!(h.alerts.alerts().is_empty());
}

#[tokio::test(start_paused = true)]
async fn write_failure_fails_execution_at_step() {
    let h = harness(PermissivePolicy::Block);
    let op = operator(AuthorizationLevel::Operator);
    h.device.fail_writes(Some("exception code 4"));
    let execution = h
        .sequencer
        .initiate("S1", &op, "Scheduled maintenance", false, false)
        .await
        .expect("initiate");
    h.sequencer.wait_idle(&execution.execution_id).await;

    let view = h.view(&execution.execution_id).await;
    assert_eq!(view.execution.status, ExecutionStatus::Failed);
    assert_eq!(view.execution.current_step, Some(1));
    assert_eq!(
        view.execution.error.as_deref(),
        Some("Step 1 failed: dispatch failed: protocol error: exception code 4")
    );
    assert!(!messages(&view).contains(&"Executing step 2: Settle"));
}

#[tokio::test(start_paused = true)]
async fn sequence_without_steps_fails() {
    let h = harness(PermissivePolicy::Block);
    let op = operator(AuthorizationLevel::Operator);
    let execution = h
        .sequencer
        .initiate("S5", &op, "Test", false, false)
        .await
        .expect("initiate");
    h.sequencer.wait_idle(&execution.execution_id).await;

    let view = h.view(&execution.execution_id).await;
    assert_eq!(view.execution.status, ExecutionStatus::Failed);
    assert_eq!(
        view.execution.error.as_deref(),
        Some("No steps defined for this sequence")
    );
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let h = harness(PermissivePolicy::Block);
    let op = operator(AuthorizationLevel::Administrator);
    assert!(matches!(
        h.sequencer.initiate("S9", &op, "x", false, false).await,
        Err(SequenceError::NotFound(_))
    ));
    assert!(matches!(
        h.sequencer.abort("missing", &op, "x").await,
        Err(SequenceError::NotFound(_))
    ));
    assert!(matches!(
        h.sequencer.status("missing").await,
        Err(SequenceError::NotFound(_))
    ));
}
