//! 序列定义、执行记录与执行日志内存存储

use crate::error::StorageError;
use crate::models::{
    ExecutionLogRecord, ExecutionRecord, ExecutionUpdate, SequenceRecord, StepRecord,
};
use crate::traits::{ExecutionLogStore, ExecutionStore, SequenceStore};
use domain::ExecutionStatus;
use std::collections::HashMap;
use std::sync::RwLock;

pub struct InMemorySequenceStore {
    sequences: RwLock<HashMap<String, SequenceRecord>>,
    steps: RwLock<Vec<StepRecord>>,
}

impl InMemorySequenceStore {
    pub fn new(sequences: Vec<SequenceRecord>, steps: Vec<StepRecord>) -> Self {
        let sequences = sequences
            .into_iter()
            .map(|record| (record.sequence_id.clone(), record))
            .collect();
        Self {
            sequences: RwLock::new(sequences),
            steps: RwLock::new(steps),
        }
    }
}

#[async_trait::async_trait]
impl SequenceStore for InMemorySequenceStore {
    async fn find_sequence(
        &self,
        sequence_id: &str,
    ) -> Result<Option<SequenceRecord>, StorageError> {
        let sequences = self.sequences.read().map_err(|_| StorageError::lock())?;
        Ok(sequences.get(sequence_id).cloned())
    }

    async fn list_steps(&self, sequence_id: &str) -> Result<Vec<StepRecord>, StorageError> {
        let steps = self.steps.read().map_err(|_| StorageError::lock())?;
        let mut items: Vec<StepRecord> = steps
            .iter()
            .filter(|step| step.sequence_id == sequence_id)
            .cloned()
            .collect();
        items.sort_by_key(|step| step.step_number);
        Ok(items)
    }
}

/// 执行记录内存存储
///
/// `transition_execution` 在写锁内比较并更新状态，供审批、继续、终止与驱动循环竞争使用。
pub struct InMemoryExecutionStore {
    executions: RwLock<HashMap<String, ExecutionRecord>>,
}

impl InMemoryExecutionStore {
    pub fn new() -> Self {
        Self {
            executions: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryExecutionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ExecutionStore for InMemoryExecutionStore {
    async fn create_execution(
        &self,
        record: ExecutionRecord,
    ) -> Result<ExecutionRecord, StorageError> {
        let mut executions = self.executions.write().map_err(|_| StorageError::lock())?;
        if executions.contains_key(&record.execution_id) {
            return Err(StorageError::new(format!(
                "execution {} already exists",
                record.execution_id
            )));
        }
        executions.insert(record.execution_id.clone(), record.clone());
        Ok(record)
    }

    async fn find_execution(
        &self,
        execution_id: &str,
    ) -> Result<Option<ExecutionRecord>, StorageError> {
        let executions = self.executions.read().map_err(|_| StorageError::lock())?;
        Ok(executions.get(execution_id).cloned())
    }

    async fn transition_execution(
        &self,
        execution_id: &str,
        from: &[ExecutionStatus],
        update: ExecutionUpdate,
    ) -> Result<Option<ExecutionRecord>, StorageError> {
        let mut executions = self.executions.write().map_err(|_| StorageError::lock())?;
        let Some(record) = executions.get_mut(execution_id) else {
            return Ok(None);
        };
        if !from.contains(&record.status) {
            return Ok(None);
        }
        update.apply(record);
        Ok(Some(record.clone()))
    }
}

pub struct InMemoryExecutionLogStore {
    logs: RwLock<Vec<ExecutionLogRecord>>,
}

impl InMemoryExecutionLogStore {
    pub fn new() -> Self {
        Self {
            logs: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryExecutionLogStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ExecutionLogStore for InMemoryExecutionLogStore {
    async fn append_log(&self, record: ExecutionLogRecord) -> Result<(), StorageError> {
        let mut logs = self.logs.write().map_err(|_| StorageError::lock())?;
        logs.push(record);
        Ok(())
    }

    async fn list_logs(
        &self,
        execution_id: &str,
    ) -> Result<Vec<ExecutionLogRecord>, StorageError> {
        let logs = self.logs.read().map_err(|_| StorageError::lock())?;
        Ok(logs
            .iter()
            .filter(|item| item.execution_id == execution_id)
            .cloned()
            .collect())
    }
}
