// ==========================================
// 配置器导入管道 - 导入层
// ==========================================
// 职责: 工作簿 → 参考表 → 主实体 → 关联,分阶段落库
// 支持: Excel, CSV（单文件 / 目录）
// ==========================================

// 模块声明
pub mod dedup;
pub mod entity_importer;
pub mod error;
pub mod id_maps;
pub mod importer_trait;
pub mod orchestrator;
pub mod reference_importer;
pub mod relation_importer;
pub mod row_mapper;
pub mod transform;
pub mod workbook_loader;
pub mod write_limiter;

// 重导出核心类型
pub use dedup::{CompositeKey, SeenKeys};
pub use entity_importer::EntityImporter;
pub use error::{ImportError, ImportResult};
pub use id_maps::{normalize_key, IdBucket, IdMaps};
pub use orchestrator::ImportOrchestrator;
pub use reference_importer::ReferenceImporter;
pub use relation_importer::RelationImporter;
pub use row_mapper::{MappedRow, RowMapper, RowRejection};
pub use transform::{Transform, TransformContext};
pub use workbook_loader::{CsvWorkbookLoader, ExcelWorkbookLoader, UniversalWorkbookLoader};
pub use write_limiter::WriteLimiter;

// 重导出 Trait 接口
pub use importer_trait::{CatalogImporter, WorkbookLoader};
