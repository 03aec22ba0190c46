//! 停机序列状态机
//!
//! `Pending → Running → {Paused ⇄ Running, Completed, Aborted, Failed}`。
//! 每个执行同一时刻至多一个驱动任务推进步骤；所有状态迁移都是条件更新，
//! 终止（Aborted）一旦写入，驱动任务后续的迁移全部落空并退出。

use crate::action::ActionExecutor;
use crate::error::{ActionError, SequenceError};
use domain::{
    ApprovalStatus, AuthorizationLevel, ExecutionStatus, LogLevel, OperatorContext,
    PermissivePolicy, now_epoch_ms,
};
use scada_config::SequencerConfig;
use scada_interlock::InterlockEvaluator;
use scada_storage::{
    ExecutionLogRecord, ExecutionRecord, ExecutionUpdate, PermissiveScope, StepAction, StepRecord,
    Stores,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

/// 审批所需的最低授权等级。
pub const APPROVAL_LEVEL: AuthorizationLevel = AuthorizationLevel::Supervisor;

/// 执行记录与有序日志。
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionView {
    pub execution: ExecutionRecord,
    pub logs: Vec<ExecutionLogRecord>,
}

#[derive(Debug, Clone, Copy)]
enum Start {
    /// 从第一步开始
    First,
    /// 重新执行 current_step
    Current,
}

struct Driver {
    generation: u64,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

struct Inner {
    stores: Stores,
    interlocks: Arc<InterlockEvaluator>,
    executor: Arc<dyn ActionExecutor>,
    config: SequencerConfig,
    drivers: Mutex<HashMap<String, Driver>>,
    generation: AtomicU64,
}

/// 停机序列执行器。
#[derive(Clone)]
pub struct ShutdownSequencer {
    inner: Arc<Inner>,
}

impl ShutdownSequencer {
    pub fn new(
        stores: Stores,
        interlocks: Arc<InterlockEvaluator>,
        executor: Arc<dyn ActionExecutor>,
        config: SequencerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                stores,
                interlocks,
                executor,
                config,
                drivers: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// 发起停机序列。
    ///
    /// 非旁路时先评估现场联锁：有违反且非紧急则拒绝；紧急发起时违反项写入执行日志。
    /// 需要审批且非紧急的序列停在 Pending，不执行任何动作。
    pub async fn initiate(
        &self,
        sequence_id: &str,
        operator: &OperatorContext,
        reason: &str,
        is_emergency: bool,
        bypass_interlocks: bool,
    ) -> Result<ExecutionRecord, SequenceError> {
        let sequence = self
            .inner
            .stores
            .sequences
            .find_sequence(sequence_id)
            .await?
            .ok_or_else(|| SequenceError::NotFound(format!("sequence {sequence_id}")))?;

        let violations = if bypass_interlocks {
            Vec::new()
        } else {
            self.inner.interlocks.evaluate_site(&sequence.site_id).await?
        };
        if !violations.is_empty() && !is_emergency {
            warn!(
                target: "scada.sequencer",
                sequence_id = %sequence_id,
                operator_id = %operator.operator_id,
                violations = violations.len(),
                "shutdown_rejected_by_interlocks"
            );
            return Err(SequenceError::InterlockViolation(violations));
        }

        let awaiting_approval = sequence.requires_approval && !is_emergency;
        let (status, approval_status) = if awaiting_approval {
            (ExecutionStatus::Pending, ApprovalStatus::Pending)
        } else if sequence.requires_approval {
            (ExecutionStatus::Running, ApprovalStatus::Approved)
        } else {
            (ExecutionStatus::Running, ApprovalStatus::NotRequired)
        };
        let record = ExecutionRecord {
            execution_id: Uuid::new_v4().to_string(),
            sequence_id: sequence.sequence_id.clone(),
            site_id: sequence.site_id.clone(),
            status,
            current_step: None,
            approval_status,
            is_emergency,
            bypass_interlocks,
            initiated_by: operator.operator_id.clone(),
            reason: reason.to_string(),
            approved_by: None,
            started_ms: now_epoch_ms(),
            completed_ms: None,
            error: None,
        };
        let record = self.inner.stores.executions.create_execution(record).await?;
        let execution_id = record.execution_id.as_str();

        self.log(
            execution_id,
            None,
            LogLevel::Info,
            format!(
                "Shutdown sequence initiated by {}. Reason: {reason}",
                operator.name
            ),
        )
        .await?;
        if bypass_interlocks {
            self.log(
                execution_id,
                None,
                LogLevel::Warning,
                "Interlock checks bypassed".to_string(),
            )
            .await?;
        }
        for violation in &violations {
            self.log(
                execution_id,
                None,
                LogLevel::Warning,
                format!(
                    "Interlock violation ignored for emergency shutdown: {}: {}",
                    violation.name, violation.reason
                ),
            )
            .await?;
        }

        info!(
            target: "scada.sequencer",
            execution_id = %execution_id,
            sequence_id = %sequence_id,
            operator_id = %operator.operator_id,
            emergency = is_emergency,
            status = %record.status,
            "shutdown_initiated"
        );
        if awaiting_approval {
            self.log(
                execution_id,
                None,
                LogLevel::Info,
                "Awaiting approval".to_string(),
            )
            .await?;
        } else {
            self.spawn(execution_id, Start::First);
        }
        Ok(record)
    }

    /// 审批 Pending 的执行并开始执行第一步。
    pub async fn approve(
        &self,
        execution_id: &str,
        approver: &OperatorContext,
    ) -> Result<ExecutionRecord, SequenceError> {
        if !approver.meets(APPROVAL_LEVEL) {
            return Err(SequenceError::Authorization {
                required: APPROVAL_LEVEL,
                actual: approver.level,
            });
        }
        let current = self.find(execution_id).await?;
        if current.approval_status != ApprovalStatus::Pending {
            return Err(SequenceError::InvalidState {
                execution_id: execution_id.to_string(),
                status: current.status,
            });
        }
        let update = ExecutionUpdate::status(ExecutionStatus::Running)
            .with_approval(ApprovalStatus::Approved, approver.operator_id.clone());
        let record = self
            .transition(execution_id, &[ExecutionStatus::Pending], update)
            .await?;
        self.log(
            execution_id,
            None,
            LogLevel::Info,
            format!("Shutdown approved by {}", approver.name),
        )
        .await?;
        info!(
            target: "scada.sequencer",
            execution_id = %execution_id,
            approver_id = %approver.operator_id,
            "shutdown_approved"
        );
        self.spawn(execution_id, Start::First);
        Ok(record)
    }

    /// 从 Paused 恢复，重新执行当前步骤。
    pub async fn continue_execution(
        &self,
        execution_id: &str,
        confirmer: &OperatorContext,
    ) -> Result<ExecutionRecord, SequenceError> {
        let record = self
            .transition(
                execution_id,
                &[ExecutionStatus::Paused],
                ExecutionUpdate::status(ExecutionStatus::Running),
            )
            .await?;
        self.log(
            execution_id,
            record.current_step,
            LogLevel::Info,
            format!("Execution continued by {}", confirmer.name),
        )
        .await?;
        info!(
            target: "scada.sequencer",
            execution_id = %execution_id,
            operator_id = %confirmer.operator_id,
            step = ?record.current_step,
            "execution_continued"
        );
        self.spawn(execution_id, Start::Current);
        Ok(record)
    }

    /// 终止任意非终态执行；正在执行的等待立即结束，后续步骤不再下发。
    pub async fn abort(
        &self,
        execution_id: &str,
        actor: &OperatorContext,
        reason: &str,
    ) -> Result<ExecutionRecord, SequenceError> {
        let update = ExecutionUpdate::status(ExecutionStatus::Aborted).completed_at(now_epoch_ms());
        let record = self
            .transition(execution_id, &ExecutionStatus::ACTIVE, update)
            .await?;
        if let Some(driver) = self.drivers().get(execution_id) {
            driver.cancel.cancel();
        }
        self.log(
            execution_id,
            record.current_step,
            LogLevel::Warning,
            format!("Execution aborted by {}. Reason: {reason}", actor.name),
        )
        .await?;
        warn!(
            target: "scada.sequencer",
            execution_id = %execution_id,
            operator_id = %actor.operator_id,
            reason = %reason,
            "execution_aborted"
        );
        Ok(record)
    }

    /// 执行记录与日志。
    pub async fn status(&self, execution_id: &str) -> Result<ExecutionView, SequenceError> {
        let execution = self.find(execution_id).await?;
        let logs = self
            .inner
            .stores
            .execution_logs
            .list_logs(execution_id)
            .await?;
        Ok(ExecutionView { execution, logs })
    }

    /// 等待当前驱动任务退出（暂停、完成、失败或终止）。
    pub async fn wait_idle(&self, execution_id: &str) {
        let handle = self
            .drivers()
            .get_mut(execution_id)
            .and_then(|driver| driver.handle.take());
        if let Some(handle) = handle
            && let Err(err) = handle.await
        {
            error!(
                target: "scada.sequencer",
                execution_id = %execution_id,
                error = %err,
                "sequence_driver_panicked"
            );
        }
    }

    /// 取消全部驱动任务（进程退出时）。
    pub fn cancel_all(&self) {
        for driver in self.drivers().values() {
            driver.cancel.cancel();
        }
    }

    fn drivers(&self) -> std::sync::MutexGuard<'_, HashMap<String, Driver>> {
        self.inner
            .drivers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn spawn(&self, execution_id: &str, start: Start) {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst);
        let cancel = CancellationToken::new();
        let sequencer = self.clone();
        let id = execution_id.to_string();
        let token = cancel.clone();
        let mut drivers = self.drivers();
        let handle = tokio::spawn(async move {
            sequencer.drive(&id, start, &token).await;
            sequencer.release(&id, generation);
        });
        drivers.insert(
            execution_id.to_string(),
            Driver {
                generation,
                cancel,
                handle: Some(handle),
            },
        );
    }

    fn release(&self, execution_id: &str, generation: u64) {
        let mut drivers = self.drivers();
        if drivers
            .get(execution_id)
            .is_some_and(|driver| driver.generation == generation)
        {
            drivers.remove(execution_id);
        }
    }

    async fn drive(&self, execution_id: &str, start: Start, cancel: &CancellationToken) {
        if let Err(err) = self.run_steps(execution_id, start, cancel).await {
            error!(
                target: "scada.sequencer",
                execution_id = %execution_id,
                error = %err,
                "sequence_driver_failed"
            );
            let update = ExecutionUpdate::status(ExecutionStatus::Failed)
                .completed_at(now_epoch_ms())
                .with_error(err.to_string());
            if let Ok(Some(_)) = self
                .inner
                .stores
                .executions
                .transition_execution(execution_id, &[ExecutionStatus::Running], update)
                .await
            {
                scada_telemetry::record_sequence_failure();
            }
        }
    }

    async fn run_steps(
        &self,
        execution_id: &str,
        start: Start,
        cancel: &CancellationToken,
    ) -> Result<(), SequenceError> {
        let execution = self.find(execution_id).await?;
        let steps = self
            .inner
            .stores
            .sequences
            .list_steps(&execution.sequence_id)
            .await?;
        if steps.is_empty() {
            return self
                .fail(execution_id, None, "No steps defined for this sequence")
                .await;
        }
        let mut index = match start {
            Start::First => 0,
            Start::Current => {
                let position = execution
                    .current_step
                    .and_then(|number| steps.iter().position(|step| step.step_number == number));
                match position {
                    Some(index) => index,
                    None => {
                        return self
                            .fail(
                                execution_id,
                                execution.current_step,
                                "Current step not found in sequence",
                            )
                            .await;
                    }
                }
            }
        };

        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }
            let step = &steps[index];
            let number = step.step_number;
            let update = ExecutionUpdate::status(ExecutionStatus::Running).with_step(Some(number));
            if self
                .inner
                .stores
                .executions
                .transition_execution(execution_id, &[ExecutionStatus::Running], update)
                .await?
                .is_none()
            {
                return Ok(());
            }
            self.log(
                execution_id,
                Some(number),
                LogLevel::Info,
                format!("Executing step {number}: {}", step.name),
            )
            .await?;

            let scope = PermissiveScope::Step {
                sequence_id: step.sequence_id.clone(),
                step_number: number,
            };
            let check = self.inner.interlocks.check_permissives(&scope).await?;
            if !check.is_met() {
                self.log(
                    execution_id,
                    Some(number),
                    LogLevel::Warning,
                    format!(
                        "Permissives not satisfied for step {number}: {}",
                        check.unmet.join(", ")
                    ),
                )
                .await?;
                if step.hold_point || self.inner.config.permissive_policy == PermissivePolicy::Block
                {
                    return self.pause(execution_id, number).await;
                }
                self.log(
                    execution_id,
                    Some(number),
                    LogLevel::Warning,
                    format!("Proceeding with step {number} despite unmet permissives"),
                )
                .await?;
            }

            if cancel.is_cancelled() {
                return Ok(());
            }
            match self.run_action(step, cancel).await {
                Ok(detail) => {
                    self.log(
                        execution_id,
                        Some(number),
                        LogLevel::Success,
                        format!("Step {number} completed successfully: {detail}"),
                    )
                    .await?;
                    scada_telemetry::record_sequence_step_completed();
                    info!(
                        target: "scada.sequencer",
                        execution_id = %execution_id,
                        step = number,
                        action = step.action.name(),
                        "sequence_step_completed"
                    );
                }
                Err(ActionError::Cancelled) => return Ok(()),
                Err(err) => {
                    let message = format!("Step {number} failed: {err}");
                    return self.fail(execution_id, Some(number), &message).await;
                }
            }

            if cancel.is_cancelled() {
                return Ok(());
            }
            let Some(next) = steps.get(index + 1) else {
                return self.complete(execution_id).await;
            };
            if next.hold_point || next.requires_confirmation {
                return self.pause(execution_id, next.step_number).await;
            }
            index += 1;
        }
    }

    /// 等待类动作受最大等待时间约束，其余动作受步骤超时约束。
    async fn run_action(
        &self,
        step: &StepRecord,
        cancel: &CancellationToken,
    ) -> Result<String, ActionError> {
        let action = self.inner.executor.execute(step, cancel);
        match step.timeout_seconds {
            Some(seconds) if !matches!(step.action, StepAction::Wait { .. }) => {
                tokio::time::timeout(Duration::from_secs(seconds), action)
                    .await
                    .map_err(|_| ActionError::Timeout(seconds))?
            }
            _ => action.await,
        }
    }

    async fn pause(&self, execution_id: &str, step_number: u32) -> Result<(), SequenceError> {
        let update = ExecutionUpdate::status(ExecutionStatus::Paused).with_step(Some(step_number));
        if self
            .inner
            .stores
            .executions
            .transition_execution(execution_id, &[ExecutionStatus::Running], update)
            .await?
            .is_some()
        {
            self.log(
                execution_id,
                Some(step_number),
                LogLevel::Info,
                format!("Paused at step {step_number} - awaiting confirmation"),
            )
            .await?;
            info!(
                target: "scada.sequencer",
                execution_id = %execution_id,
                step = step_number,
                "execution_paused"
            );
        }
        Ok(())
    }

    async fn complete(&self, execution_id: &str) -> Result<(), SequenceError> {
        let update =
            ExecutionUpdate::status(ExecutionStatus::Completed).completed_at(now_epoch_ms());
        if self
            .inner
            .stores
            .executions
            .transition_execution(execution_id, &[ExecutionStatus::Running], update)
            .await?
            .is_some()
        {
            self.log(
                execution_id,
                None,
                LogLevel::Success,
                "Shutdown sequence completed successfully".to_string(),
            )
            .await?;
            info!(
                target: "scada.sequencer",
                execution_id = %execution_id,
                "execution_completed"
            );
        }
        Ok(())
    }

    async fn fail(
        &self,
        execution_id: &str,
        step_number: Option<u32>,
        message: &str,
    ) -> Result<(), SequenceError> {
        let update = ExecutionUpdate::status(ExecutionStatus::Failed)
            .completed_at(now_epoch_ms())
            .with_error(message);
        if self
            .inner
            .stores
            .executions
            .transition_execution(execution_id, &[ExecutionStatus::Running], update)
            .await?
            .is_some()
        {
            scada_telemetry::record_sequence_failure();
            self.log(
                execution_id,
                step_number,
                LogLevel::Error,
                message.to_string(),
            )
            .await?;
            warn!(
                target: "scada.sequencer",
                execution_id = %execution_id,
                step = ?step_number,
                error = %message,
                "execution_failed"
            );
        }
        Ok(())
    }

    async fn find(&self, execution_id: &str) -> Result<ExecutionRecord, SequenceError> {
        self.inner
            .stores
            .executions
            .find_execution(execution_id)
            .await?
            .ok_or_else(|| SequenceError::NotFound(format!("execution {execution_id}")))
    }

    /// 条件迁移；状态不符时返回 InvalidState。
    async fn transition(
        &self,
        execution_id: &str,
        from: &[ExecutionStatus],
        update: ExecutionUpdate,
    ) -> Result<ExecutionRecord, SequenceError> {
        match self
            .inner
            .stores
            .executions
            .transition_execution(execution_id, from, update)
            .await?
        {
            Some(record) => Ok(record),
            None => {
                let current = self.find(execution_id).await?;
                Err(SequenceError::InvalidState {
                    execution_id: execution_id.to_string(),
                    status: current.status,
                })
            }
        }
    }

    async fn log(
        &self,
        execution_id: &str,
        step_number: Option<u32>,
        level: LogLevel,
        message: String,
    ) -> Result<(), SequenceError> {
        let record = ExecutionLogRecord {
            log_id: Uuid::new_v4().to_string(),
            execution_id: execution_id.to_string(),
            step_number,
            level,
            message,
            ts_ms: now_epoch_ms(),
        };
        self.inner.stores.execution_logs.append_log(record).await?;
        Ok(())
    }
}
