// ==========================================
// 配置器导入管道 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入管道所需的运行参数读取接口（不包含实现）
// 红线: 不包含配置写入、不包含导入逻辑
// 说明: 运行模式不在此处读取,由调用方显式传入
// ==========================================

use crate::config::import_config::ImportConfig;
use crate::importer::error::ImportResult;
use async_trait::async_trait;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 导入管道所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    /// 获取单表并发写入上限
    ///
    /// # 默认值
    /// - 16
    ///
    /// # 约束
    /// - 必须 ≥ 1
    async fn get_max_in_flight_writes(&self) -> ImportResult<usize>;

    /// 是否在 import_run 表记录每次运行
    ///
    /// # 默认值
    /// - true
    async fn get_record_runs(&self) -> ImportResult<bool>;

    /// 获取表配置
    ///
    /// # 返回
    /// - config_kv 中 import/table_config 存在时解析并校验该 JSON
    /// - 否则返回内置目录配置
    async fn get_table_config(&self) -> ImportResult<ImportConfig>;
}
