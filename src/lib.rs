// ==========================================
// 配置器导入管道 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 定位: 把一份多工作表的工作簿按配置分阶段导入关系库
// - 参考表 → 主实体 → 关联（多对多 / 数量 / 价格）
// - 可重复运行: 同一工作簿再次导入不产生重复数据
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 工作簿 / 类型 / 报告
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 导入层 - 各阶段导入器与编排器
pub mod importer;

// 配置层 - 表配置与运行参数
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::{
    CellValue, FieldValue, ImportReport, ImportStage, Payload, Row, RunMode, Sheet, StageReport,
    SurrogateId, TableOutcome, TableReport, TableStats, Workbook, WriteStrategy,
};

// 配置
pub use config::{default_catalog, ConfigManager, ImportConfig, ImportConfigReader, TableConfig};

// 导入
pub use importer::{
    CatalogImporter, ImportError, ImportOrchestrator, ImportResult, UniversalWorkbookLoader,
    WorkbookLoader,
};

// 仓储
pub use repository::{CatalogRepository, RepositoryError, SqliteCatalogRepository};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "配置器目录导入";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
