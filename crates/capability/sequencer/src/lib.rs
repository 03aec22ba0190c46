//! 停机序列能力模块
//!
//! - [`ShutdownSequencer`]：发起、审批、继续、终止与状态查询
//! - [`ActionExecutor`]：步骤动作执行抽象；[`ControlActionExecutor`] 经由阀门与设备控制器落地
//!
//! 每个执行由单独的驱动任务推进，终止通过 `CancellationToken` 协作取消。

mod action;
mod error;
mod sequencer;

pub use action::{
    ActionExecutor, CONDITION_POLL_INTERVAL, ControlActionExecutor, condition_met,
    service_identity,
};
pub use error::{ActionError, SequenceError};
pub use sequencer::{APPROVAL_LEVEL, ExecutionView, ShutdownSequencer};
