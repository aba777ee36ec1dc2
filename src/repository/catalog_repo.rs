// ==========================================
// 配置器导入管道 - 目录数据 Repository Trait
// ==========================================
// 职责: 定义导入管道所需的关系存储原语（不包含导入规则）
// 红线: Repository 不做去重/校验/ID 解析,只做写入
// ==========================================

use crate::domain::types::{Payload, SurrogateId};
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// 代理主键列名约定
pub const SURROGATE_ID_COLUMN: &str = "id";

// ==========================================
// BulkInsertOutcome - 批量 insert-or-ignore 结果
// ==========================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkInsertOutcome {
    pub inserted: usize, // 新插入
    pub ignored: usize,  // 仅唯一约束冲突: 自然键对已存在
    pub failed: usize,   // 单行被存储拒绝（NOT NULL / CHECK / 外键等）
}

// ==========================================
// ImportRunRecord - 运行日志
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRunRecord {
    pub run_id: String,
    pub mode: String,
    pub started_at: String,  // RFC 3339
    pub finished_at: String, // RFC 3339
    pub elapsed_ms: i64,
    pub total_written: i64,
    pub total_skipped: i64,
    pub report_json: String,
}

// ==========================================
// CatalogRepository Trait
// ==========================================
// 实现者: SqliteCatalogRepository（使用 rusqlite）
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    // ===== 参考表 / 实体表 =====

    /// 按自然键 upsert: 不存在则用 create 负载创建,存在则用 update 负载更新非键字段
    ///
    /// # 参数
    /// - table: 目标表
    /// - key_field: 自然键列（需有唯一约束）
    /// - create: 创建负载（含自然键）
    /// - update: 更新负载（不含自然键；为空时不修改任何字段）
    ///
    /// # 返回
    /// - Ok(SurrogateId): 记录的代理主键（新建或已存在）
    async fn upsert_by_key(
        &self,
        table: &str,
        key_field: &str,
        create: Payload,
        update: Payload,
    ) -> RepositoryResult<SurrogateId>;

    // ===== 关联表 =====

    /// 批量 insert-or-ignore（单事务）
    ///
    /// # 说明
    /// - 只有唯一约束冲突（自然键对已存在）静默跳过,计入 ignored
    /// - 其他约束违反不会被吞掉: 单行计入 failed,不影响同批其他行
    async fn bulk_insert_or_ignore(
        &self,
        table: &str,
        rows: Vec<Payload>,
    ) -> RepositoryResult<BulkInsertOutcome>;

    /// 按组合自然键 upsert,update 负载替换字段值（不累加）
    ///
    /// # 参数
    /// - key_fields: 组合键列（需有唯一约束）
    async fn upsert_by_composite_key(
        &self,
        table: &str,
        key_fields: &[String],
        create: Payload,
        update: Payload,
    ) -> RepositoryResult<()>;

    // ===== 运行日志 / 查询 =====

    /// 插入一条运行日志
    async fn insert_import_run(&self, run: ImportRunRecord) -> RepositoryResult<()>;

    /// 统计表记录数
    async fn count_rows(&self, table: &str) -> RepositoryResult<usize>;
}
