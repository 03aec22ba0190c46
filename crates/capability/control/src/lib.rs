//! # 控制能力模块
//!
//! 现场执行机构的控制入口：
//! - [`ValveController`]：阀门开 / 关 / 开度 / 急停，手动锁定与解锁
//! - [`EquipmentController`]：泵启停、关井、泄压（停机序列调用）
//! - [`TagWriter`]：输出点写入抽象，默认经由协议客户端池
//!
//! 所有控制结果（完成、失败、拒绝）都会同步返回给调用方并写入控制审计。

mod audit;
mod equipment;
mod error;
mod locks;
mod valve;
mod writer;

pub use equipment::{EquipmentAction, EquipmentController, EquipmentOutcome};
pub use error::ControlError;
pub use valve::{LOCK_LEVEL, PlannedWrite, ValveController, plan_command};
pub use writer::{PoolTagWriter, TagWriter};
