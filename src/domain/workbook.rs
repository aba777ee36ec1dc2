// ==========================================
// 配置器导入管道 - 工作簿领域模型
// ==========================================
// 用途: 外部加载器产出,整次运行只读
// 结构: 工作簿 → 具名工作表 → 有序行 → 列名/原始值映射
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ==========================================
// CellValue - 原始单元格值
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Empty,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl CellValue {
    /// 空单元格或仅含空白的文本都视为空
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// 原始值的文本形式（不做 trim / 大小写处理）
    ///
    /// 整数值的浮点数去掉小数部分（Excel 数字列 "12" 会被读成 12.0）
    pub fn as_raw_string(&self) -> Option<String> {
        match self {
            CellValue::Empty => None,
            CellValue::Bool(v) => Some(v.to_string()),
            CellValue::Int(v) => Some(v.to_string()),
            CellValue::Float(v) => {
                if v.fract() == 0.0 && v.is_finite() && v.abs() < 1e15 {
                    Some(format!("{}", *v as i64))
                } else {
                    Some(v.to_string())
                }
            }
            CellValue::Text(s) => {
                if s.trim().is_empty() {
                    None
                } else {
                    Some(s.clone())
                }
            }
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_raw_string() {
            Some(s) => write!(f, "{}", s),
            None => Ok(()),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Int(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Float(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

static EMPTY_CELL: CellValue = CellValue::Empty;

// ==========================================
// Row - 一行数据
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub row_number: usize, // 工作表中的行号（表头之后从 1 开始）
    pub cells: HashMap<String, CellValue>,
}

impl Row {
    pub fn new(row_number: usize) -> Self {
        Self {
            row_number,
            cells: HashMap::new(),
        }
    }

    /// 按列名取值,列名大小写敏感；列不存在返回空值
    pub fn get(&self, column: &str) -> &CellValue {
        self.cells.get(column).unwrap_or(&EMPTY_CELL)
    }

    pub fn with_cell(mut self, column: &str, value: impl Into<CellValue>) -> Self {
        self.cells.insert(column.to_string(), value.into());
        self
    }

    pub fn is_blank(&self) -> bool {
        self.cells.values().all(|v| v.is_empty())
    }
}

// ==========================================
// Sheet - 工作表
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Row>,
}

impl Sheet {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            rows: Vec::new(),
        }
    }

    /// 追加一行,行号按追加顺序自动分配
    pub fn push_row(&mut self, cells: Vec<(&str, CellValue)>) {
        let mut row = Row::new(self.rows.len() + 1);
        for (column, value) in cells {
            row.cells.insert(column.to_string(), value);
        }
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ==========================================
// Workbook - 工作簿
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workbook {
    pub sheets: HashMap<String, Sheet>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sheet(&mut self, sheet: Sheet) {
        self.sheets.insert(sheet.name.clone(), sheet);
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.get(name)
    }

    pub fn sheet_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sheets.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_column_is_empty() {
        let row = Row::new(1).with_cell("code", "eco");
        assert_eq!(row.get("code"), &CellValue::Text("eco".to_string()));
        assert!(row.get("Code").is_empty());
        assert!(row.get("name").is_empty());
    }

    #[test]
    fn test_float_raw_string() {
        assert_eq!(CellValue::Float(12.0).as_raw_string(), Some("12".to_string()));
        assert_eq!(CellValue::Float(2.5).as_raw_string(), Some("2.5".to_string()));
        assert_eq!(CellValue::Text("   ".to_string()).as_raw_string(), None);
    }

    #[test]
    fn test_sheet_row_numbers() {
        let mut sheet = Sheet::new("location");
        sheet.push_row(vec![("code", "indoor".into())]);
        sheet.push_row(vec![("code", "outdoor".into())]);
        assert_eq!(sheet.rows[0].row_number, 1);
        assert_eq!(sheet.rows[1].row_number, 2);
    }
}
