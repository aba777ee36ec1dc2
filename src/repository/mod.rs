// ==========================================
// 配置器导入管道 - 数据仓储层
// ==========================================
// 红线: Repository 不含导入规则
// 职责: 提供关系存储原语,屏蔽数据库细节
// 约束: 所有值使用参数化,标识符统一校验
// ==========================================

pub mod catalog_repo;
pub mod catalog_repo_impl;
pub mod error;

// 重导出核心仓储
pub use catalog_repo::{BulkInsertOutcome, CatalogRepository, ImportRunRecord, SURROGATE_ID_COLUMN};
pub use catalog_repo_impl::SqliteCatalogRepository;
pub use error::{RepositoryError, RepositoryResult};
