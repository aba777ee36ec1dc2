// ==========================================
// 配置器目录导入 - 命令行入口
// ==========================================
// 用法:
//   configurator-import <workbook> [db_path] [full-reload|incremental]
//
// - workbook: .xlsx/.xls 文件、.csv 文件或 CSV 目录
// - db_path: 缺省读 CONFIGURATOR_IMPORT_DB_PATH,再退回用户数据目录
// - 运行模式缺省为 incremental
// 导入报告以 JSON 输出到 stdout
// ==========================================

use anyhow::{bail, Context};
use configurator_import::db::{
    default_db_path, init_catalog_schema, open_sqlite_connection, read_schema_version,
    CURRENT_SCHEMA_VERSION,
};
use configurator_import::{
    logging, CatalogImporter, ConfigManager, ImportOrchestrator, RunMode, SqliteCatalogRepository,
};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

const USAGE: &str = "用法: configurator-import <workbook> [db_path] [full-reload|incremental]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let mut args = std::env::args().skip(1);
    let Some(workbook_path) = args.next().map(PathBuf::from) else {
        bail!(USAGE);
    };
    let db_path = args
        .next()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(default_db_path);
    let mode: RunMode = match args.next() {
        Some(raw) => raw.parse().map_err(anyhow::Error::msg)?,
        None => RunMode::Incremental,
    };

    tracing::info!("==================================================");
    tracing::info!("{} v{}", configurator_import::APP_NAME, configurator_import::VERSION);
    tracing::info!(db_path = %db_path, mode = %mode, "使用数据库");
    tracing::info!("==================================================");

    // 存储与配置共享同一连接
    let conn = open_sqlite_connection(&db_path)
        .with_context(|| format!("无法打开数据库: {}", db_path))?;
    if let Some(version) = read_schema_version(&conn)? {
        if version > CURRENT_SCHEMA_VERSION {
            bail!(
                "数据库 schema_version={} 高于当前程序支持的 {}",
                version,
                CURRENT_SCHEMA_VERSION
            );
        }
    }
    init_catalog_schema(&conn).context("初始化目录 schema 失败")?;
    let conn = Arc::new(Mutex::new(conn));

    let config = ConfigManager::from_connection(conn.clone())?;
    let repo = SqliteCatalogRepository::from_connection(conn);
    let orchestrator = ImportOrchestrator::new(repo, config);

    let report = orchestrator
        .import_from_path(&workbook_path, mode)
        .await
        .with_context(|| format!("导入失败: {}", workbook_path.display()))?;

    println!("{}", serde_json::to_string_pretty(&report)?);

    for table in report.aborted_tables() {
        tracing::warn!(table = %table.table, sheet = %table.sheet, "表被中止");
    }

    Ok(())
}
