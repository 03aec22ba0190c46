//! # 联锁能力模块
//!
//! 阀门命令下发前的安全判定：
//! - [`decide`]：纯函数，输入为阀门状态、规则、许可、点位读数与紧急停机标志
//! - [`InterlockEvaluator`]：从存储和点位注册表装载输入后调用 [`decide`]
//! - 全站评估：停机序列发起前检查现场全部启用规则
//! - 许可检查：阀门或停机步骤作用域

mod decide;
mod error;
mod evaluator;

pub use decide::{
    EQUALS_EPSILON, InterlockDecision, InterlockInputs, TagReading, check_rule, condition_holds,
    decide, permissive_met, requirement_met, rule_applies,
};
pub use error::InterlockError;
pub use evaluator::{InterlockEvaluator, InterlockViolation, PermissiveCheck};
