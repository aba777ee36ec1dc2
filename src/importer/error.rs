// ==========================================
// 配置器导入管道 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 分层:
// - 行级错误不在此处: 行级问题一律"跳过并计数"
// - 表级错误: 工作表缺失 / ID 映射桶缺失 → 该表中止,其余继续
// - 致命错误: 工作簿无法打开 / 配置非法 → 向调用方传播
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 工作簿相关错误（致命）=====
    #[error("工作簿不存在: {0}")]
    WorkbookNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .xlsx/.xls/.csv 或 CSV 目录）")]
    UnsupportedFormat(String),

    #[error("工作簿读取失败: {0}")]
    WorkbookReadError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    // ===== 表级错误 =====
    #[error("工作表不存在 (表 {table}): {sheet}")]
    SheetNotFound { table: String, sheet: String },

    #[error("ID 映射桶不存在 (表 {table}): mapRef={map_ref}")]
    MissingIdBucket { table: String, map_ref: String },

    // ===== 配置错误 =====
    #[error("导入配置非法: {0}")]
    InvalidConfig(String),

    #[error("配置读取失败 (key: {key}): {message}")]
    ConfigReadError { key: String, message: String },

    #[error("配置值格式错误 (key: {key}, value: {value}): {message}")]
    ConfigValueError {
        key: String,
        value: String,
        message: String,
    },

    // ===== 数据库错误 =====
    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    // ===== 通用错误 =====
    #[error("JSON 处理失败: {0}")]
    Json(#[from] serde_json::Error),

    #[error("内部错误: {0}")]
    InternalError(String),
}

impl ImportError {
    /// 是否为表级错误（只中止当前表）
    pub fn is_table_level(&self) -> bool {
        matches!(
            self,
            ImportError::SheetNotFound { .. } | ImportError::MissingIdBucket { .. }
        )
    }
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::WorkbookReadError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
