// ==========================================
// 配置器导入管道 - 领域模型层
// ==========================================
// 职责: 工作簿输入模型、类型化值、运行报告
// 红线: 不含数据访问逻辑,不含导入流程逻辑
// ==========================================

pub mod report;
pub mod types;
pub mod workbook;

// 重导出核心类型
pub use report::{ImportReport, StageReport, TableOutcome, TableReport, TableStats};
pub use types::{FieldValue, ImportStage, Payload, RunMode, SurrogateId, WriteStrategy};
pub use workbook::{CellValue, Row, Sheet, Workbook};
