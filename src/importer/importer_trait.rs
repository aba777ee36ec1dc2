// ==========================================
// 配置器导入管道 - 导入接口
// ==========================================
// 职责: 定义导入接口（不包含实现）
// ==========================================

use crate::domain::report::ImportReport;
use crate::domain::types::RunMode;
use crate::domain::workbook::Workbook;
use crate::importer::error::ImportResult;
use async_trait::async_trait;
use std::path::Path;

// ==========================================
// CatalogImporter Trait
// ==========================================
// 用途: 目录导入主接口
// 实现者: ImportOrchestrator
#[async_trait]
pub trait CatalogImporter: Send + Sync {
    /// 对已加载的工作簿执行一次完整导入
    ///
    /// # 参数
    /// - workbook: 整次运行只读的工作簿
    /// - mode: 全量重载 / 增量
    ///
    /// # 返回
    /// - Ok(ImportReport): 各阶段各表的统计（含被中止的表）
    /// - Err: 致命错误（配置非法、运行记录以外的存储初始化失败等）
    ///
    /// # 阶段（严格顺序）
    /// 1. 参考表
    /// 2. 主实体
    /// 3. 关联 / 数量 / 价格
    async fn import_workbook(&self, workbook: &Workbook, mode: RunMode)
        -> ImportResult<ImportReport>;

    /// 从文件加载工作簿后导入
    ///
    /// # 返回
    /// - Err: 工作簿无法打开（致命,不产生报告）
    async fn import_from_path(&self, path: &Path, mode: RunMode) -> ImportResult<ImportReport>;
}

// ==========================================
// WorkbookLoader Trait
// ==========================================
// 用途: 工作簿加载接口
// 实现者: ExcelWorkbookLoader, CsvWorkbookLoader, UniversalWorkbookLoader
pub trait WorkbookLoader: Send + Sync {
    /// 读取全部工作表
    ///
    /// # 返回
    /// - Ok(Workbook): 工作表名 → 行（首行为表头,完全空白的行被丢弃）
    /// - Err: 文件不存在 / 格式不支持 / 解析失败
    fn load(&self, path: &Path) -> ImportResult<Workbook>;
}
