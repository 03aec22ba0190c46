//! # SCADA Storage 模块
//!
//! 采集、报警、联锁、控制与停机序列共用的存储抽象层。
//!
//! ## 分层
//!
//! 1. **接口抽象层** (`traits.rs`)：每类资源一个异步 Trait
//! 2. **数据模型层** (`models.rs`)：记录类型与条件更新
//! 3. **错误处理层** (`error.rs`)：统一的 `StorageError`
//! 4. **连接管理层** (`connection.rs`)：Postgres 连接池
//! 5. **装载层** (`provision.rs`)：JSON 现场配置 → 内存存储
//! 6. **实现层**：
//!    - `in_memory/`：`RwLock` 内存实现，承载配置与运行类数据
//!    - `postgres/`：追加型数据（审计、执行日志、点位历史）
//!
//! ## 并发约束
//!
//! - 报警开启是"不存在才插入"的原子操作
//! - 执行记录的状态迁移是比较后更新（CAS），竞争方只有一个成功
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! use scada_storage::{ProvisionData, Stores, connect_pool};
//!
//! let data = ProvisionData::load("site.json")?;
//! let mut stores = Stores::in_memory(data);
//! if let Some(url) = database_url {
//!     stores = stores.with_postgres(connect_pool(&url).await?);
//! }
//! let tag = stores.tags.find_tag("PT-101").await?;
//! ```

pub mod connection;
pub mod error;
pub mod in_memory;
pub mod models;
pub mod postgres;
pub mod provision;
pub mod traits;

pub use connection::*;
pub use error::*;
pub use models::*;
pub use provision::{ProvisionData, Stores};
pub use traits::*;

pub use in_memory::{
    InMemoryAlarmStore, InMemoryAssetStore, InMemoryControlActionStore, InMemoryDeviceStore,
    InMemoryExecutionLogStore, InMemoryExecutionStore, InMemoryInterlockRuleStore,
    InMemoryPermissiveStore, InMemorySequenceStore, InMemorySiteStore, InMemoryTagHistoryStore,
    InMemoryTagStore, InMemoryValveStore,
};

pub use postgres::{PgControlActionStore, PgExecutionLogStore, PgTagHistoryStore};
