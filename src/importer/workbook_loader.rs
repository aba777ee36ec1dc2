// ==========================================
// 配置器导入管道 - 工作簿加载器实现
// ==========================================
// 支持: Excel (.xlsx/.xls/.xlsb/.ods) 全部工作表
//       CSV 单文件（工作表名取文件名）/ CSV 目录（每个文件一张工作表）
// ==========================================

use crate::domain::workbook::{CellValue, Row, Sheet, Workbook};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::importer_trait::WorkbookLoader;
use calamine::{open_workbook_auto, Data, Reader};
use csv::ReaderBuilder;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info};

const EXCEL_EXTENSIONS: [&str; 4] = ["xlsx", "xls", "xlsb", "ods"];

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

fn sheet_name_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn ensure_exists(path: &Path) -> ImportResult<()> {
    if !path.exists() {
        return Err(ImportError::WorkbookNotFound(path.display().to_string()));
    }
    Ok(())
}

// ==========================================
// CSV Loader 实现
// ==========================================
pub struct CsvWorkbookLoader;

impl CsvWorkbookLoader {
    fn read_sheet(&self, path: &Path) -> ImportResult<Sheet> {
        let file = File::open(path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .from_reader(file);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut sheet = Sheet::new(&sheet_name_of(path));
        for (row_idx, result) in reader.records().enumerate() {
            let record = result?;
            let mut row = Row::new(row_idx + 1);

            for (col_idx, value) in record.iter().enumerate() {
                if let Some(header) = headers.get(col_idx) {
                    let cell = if value.trim().is_empty() {
                        CellValue::Empty
                    } else {
                        CellValue::Text(value.to_string())
                    };
                    row.cells.insert(header.clone(), cell);
                }
            }

            if row.is_blank() {
                continue;
            }
            sheet.rows.push(row);
        }

        debug!(sheet = %sheet.name, rows = sheet.len(), "CSV 工作表已读取");
        Ok(sheet)
    }
}

impl WorkbookLoader for CsvWorkbookLoader {
    fn load(&self, path: &Path) -> ImportResult<Workbook> {
        ensure_exists(path)?;
        let mut workbook = Workbook::new();

        if path.is_dir() {
            let mut files: Vec<_> = std::fs::read_dir(path)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && extension_of(p) == "csv")
                .collect();
            files.sort();

            for file in files {
                workbook.add_sheet(self.read_sheet(&file)?);
            }
        } else {
            let ext = extension_of(path);
            if ext != "csv" {
                return Err(ImportError::UnsupportedFormat(ext));
            }
            workbook.add_sheet(self.read_sheet(path)?);
        }

        Ok(workbook)
    }
}

// ==========================================
// Excel Loader 实现
// ==========================================
pub struct ExcelWorkbookLoader;

fn cell_from_excel(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::Int(v) => CellValue::Int(*v),
        Data::Float(v) => CellValue::Float(*v),
        Data::Bool(v) => CellValue::Bool(*v),
        Data::String(s) if s.trim().is_empty() => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        // 日期 / 时长 / 错误单元格按显示文本保留
        other => CellValue::Text(other.to_string()),
    }
}

impl WorkbookLoader for ExcelWorkbookLoader {
    fn load(&self, path: &Path) -> ImportResult<Workbook> {
        ensure_exists(path)?;

        let ext = extension_of(path);
        if !EXCEL_EXTENSIONS.contains(&ext.as_str()) {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        let mut excel = open_workbook_auto(path)?;
        let mut workbook = Workbook::new();

        for sheet_name in excel.sheet_names() {
            let range = excel.worksheet_range(&sheet_name)?;
            let mut rows = range.rows();
            let mut sheet = Sheet::new(&sheet_name);

            // 无表头的空工作表仍然登记,导入时表现为零行
            let Some(header_row) = rows.next() else {
                workbook.add_sheet(sheet);
                continue;
            };

            let headers: Vec<String> = header_row
                .iter()
                .map(|cell| cell.to_string().trim().to_string())
                .collect();

            for (row_idx, data_row) in rows.enumerate() {
                let mut row = Row::new(row_idx + 1);
                for (col_idx, cell) in data_row.iter().enumerate() {
                    match headers.get(col_idx) {
                        Some(header) if !header.is_empty() => {
                            row.cells.insert(header.clone(), cell_from_excel(cell));
                        }
                        _ => {}
                    }
                }

                if row.is_blank() {
                    continue;
                }
                sheet.rows.push(row);
            }

            debug!(sheet = %sheet.name, rows = sheet.len(), "Excel 工作表已读取");
            workbook.add_sheet(sheet);
        }

        Ok(workbook)
    }
}

// ==========================================
// 通用加载器（根据扩展名 / 目录自动选择）
// ==========================================
pub struct UniversalWorkbookLoader;

impl WorkbookLoader for UniversalWorkbookLoader {
    fn load(&self, path: &Path) -> ImportResult<Workbook> {
        ensure_exists(path)?;

        let workbook = if path.is_dir() {
            CsvWorkbookLoader.load(path)?
        } else {
            let ext = extension_of(path);
            match ext.as_str() {
                "csv" => CsvWorkbookLoader.load(path)?,
                e if EXCEL_EXTENSIONS.contains(&e) => ExcelWorkbookLoader.load(path)?,
                _ => return Err(ImportError::UnsupportedFormat(ext)),
            }
        };

        info!(
            path = %path.display(),
            sheets = workbook.sheets.len(),
            "工作簿加载完成"
        );
        Ok(workbook)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_csv(dir: &TempDir, name: &str, lines: &[&str]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        path
    }

    #[test]
    fn test_csv_single_file() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "location.csv", &["code,name", "eco, Eco Line", "pro,Pro"]);

        let workbook = CsvWorkbookLoader.load(&path).unwrap();
        let sheet = workbook.sheet("location").unwrap();

        assert_eq!(sheet.len(), 2);
        assert_eq!(sheet.rows[0].get("code"), &CellValue::Text("eco".to_string()));
        // 值保持原样,不 trim
        assert_eq!(
            sheet.rows[0].get("name"),
            &CellValue::Text(" Eco Line".to_string())
        );
    }

    #[test]
    fn test_csv_directory_one_sheet_per_file() {
        let dir = TempDir::new().unwrap();
        write_csv(&dir, "location.csv", &["code", "eco"]);
        write_csv(&dir, "item.csv", &["code,sku", "panel1,SKU-1"]);
        write_csv(&dir, "notes.txt", &["ignored"]);

        let workbook = UniversalWorkbookLoader.load(dir.path()).unwrap();
        assert_eq!(workbook.sheet_names(), vec!["item", "location"]);
    }

    #[test]
    fn test_csv_skips_blank_rows() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "color.csv", &["code,hex", "red,ff0000", ",", "blue,0000ff"]);

        let workbook = CsvWorkbookLoader.load(&path).unwrap();
        let sheet = workbook.sheet("color").unwrap();
        assert_eq!(sheet.len(), 2);
        assert_eq!(sheet.rows[1].row_number, 3);
    }

    #[test]
    fn test_missing_workbook() {
        let result = UniversalWorkbookLoader.load(Path::new("non_existent.xlsx"));
        assert!(matches!(result, Err(ImportError::WorkbookNotFound(_))));
    }

    #[test]
    fn test_unsupported_format() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "catalog.json", &["{}"]);
        let result = UniversalWorkbookLoader.load(&path);
        assert!(matches!(result, Err(ImportError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_excel_cell_conversion() {
        assert_eq!(cell_from_excel(&Data::Int(3)), CellValue::Int(3));
        assert_eq!(cell_from_excel(&Data::Float(2.5)), CellValue::Float(2.5));
        assert_eq!(
            cell_from_excel(&Data::String("  ".to_string())),
            CellValue::Empty
        );
        assert_eq!(cell_from_excel(&Data::Empty), CellValue::Empty);
    }
}
