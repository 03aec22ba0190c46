//! 内存存储实现模块
//!
//! 单机部署与测试使用；装载文件经 [`crate::provision`] 填充。
//!
//! - SiteStore / DeviceStore: InMemorySiteStore / InMemoryDeviceStore
//! - TagStore: InMemoryTagStore
//! - AlarmStore: InMemoryAlarmStore
//! - InterlockRuleStore / PermissiveStore: InMemoryInterlockRuleStore / InMemoryPermissiveStore
//! - AssetStore / ValveStore: InMemoryAssetStore / InMemoryValveStore
//! - SequenceStore / ExecutionStore / ExecutionLogStore
//! - ControlActionStore / TagHistoryStore

pub mod alarm;
pub mod asset;
pub mod audit;
pub mod safety;
pub mod sequence;
pub mod site;
pub mod tag;

pub use alarm::*;
pub use asset::*;
pub use audit::*;
pub use safety::*;
pub use sequence::*;
pub use site::*;
pub use tag::*;
