// ==========================================
// 配置器导入管道 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键、busy_timeout）
// - 提供内置目录表的建表语句（幂等）
// - 提供 SQL 标识符校验/引用,表名与列名来自配置,不能直接拼接
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::path::PathBuf;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要"每个连接"单独开启
/// - busy_timeout 需要"每个连接"单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 数据库路径环境变量（便于调试/测试/CI）
pub const DB_PATH_ENV: &str = "CONFIGURATOR_IMPORT_DB_PATH";

/// 默认数据库路径
///
/// 优先级: 环境变量 → 用户数据目录 → 当前目录
pub fn default_db_path() -> String {
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./configurator.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("configurator-import");
        // 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("configurator.db");
        }
    }

    path.to_string_lossy().to_string()
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

// ==========================================
// 标识符校验
// ==========================================

/// 合法 SQL 标识符: [A-Za-z_][A-Za-z0-9_]*
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// 双引号引用标识符（调用前需已通过 is_valid_identifier）
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name)
}

// ==========================================
// 内置目录 schema
// ==========================================
// 与 config::catalog_config::default_catalog() 对齐
// 自然键列统一 COLLATE NOCASE,与"大小写不敏感唯一"一致
pub const CATALOG_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS import_run (
    run_id TEXT PRIMARY KEY,
    mode TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT NOT NULL,
    elapsed_ms INTEGER NOT NULL,
    total_written INTEGER NOT NULL,
    total_skipped INTEGER NOT NULL,
    report_json TEXT NOT NULL
);

-- ===== 参考表 =====
CREATE TABLE IF NOT EXISTS location (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    code TEXT NOT NULL COLLATE NOCASE UNIQUE,
    name TEXT,
    active INTEGER NOT NULL DEFAULT 1,
    updated_at TEXT
);

CREATE TABLE IF NOT EXISTS category (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    code TEXT NOT NULL COLLATE NOCASE UNIQUE,
    name TEXT,
    sort_order INTEGER,
    active INTEGER NOT NULL DEFAULT 1,
    updated_at TEXT
);

CREATE TABLE IF NOT EXISTS color (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    code TEXT NOT NULL COLLATE NOCASE UNIQUE,
    name TEXT,
    hex TEXT,
    active INTEGER NOT NULL DEFAULT 1,
    updated_at TEXT
);

CREATE TABLE IF NOT EXISTS voltage (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    code TEXT NOT NULL COLLATE NOCASE UNIQUE,
    name TEXT,
    value INTEGER NOT NULL,
    active INTEGER NOT NULL DEFAULT 1,
    updated_at TEXT
);

-- ===== 主业务实体 =====
CREATE TABLE IF NOT EXISTS item (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    code TEXT NOT NULL COLLATE NOCASE UNIQUE,
    sku TEXT COLLATE NOCASE UNIQUE,
    name TEXT,
    comment TEXT,
    width_mm INTEGER,
    height_mm INTEGER,
    active INTEGER NOT NULL DEFAULT 1,
    updated_at TEXT
);

CREATE TABLE IF NOT EXISTS component (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    code TEXT NOT NULL COLLATE NOCASE UNIQUE,
    sku TEXT COLLATE NOCASE UNIQUE,
    name TEXT,
    comment TEXT,
    active INTEGER NOT NULL DEFAULT 1,
    updated_at TEXT
);

-- ===== 关联表 =====
-- 端点以原始自然键落库；大小写不同的同一键对由 NOCASE 唯一约束判重
CREATE TABLE IF NOT EXISTS item_category (
    item_code TEXT NOT NULL COLLATE NOCASE,
    category_code TEXT NOT NULL COLLATE NOCASE,
    UNIQUE (item_code, category_code)
);

CREATE TABLE IF NOT EXISTS item_location (
    item_code TEXT NOT NULL COLLATE NOCASE,
    location_code TEXT NOT NULL COLLATE NOCASE,
    UNIQUE (item_code, location_code)
);

CREATE TABLE IF NOT EXISTS item_color (
    item_code TEXT NOT NULL COLLATE NOCASE,
    color_code TEXT NOT NULL COLLATE NOCASE,
    UNIQUE (item_code, color_code)
);

CREATE TABLE IF NOT EXISTS item_component (
    item_code TEXT NOT NULL COLLATE NOCASE,
    component_code TEXT NOT NULL COLLATE NOCASE,
    quantity INTEGER NOT NULL CHECK (quantity > 0),
    updated_at TEXT,
    UNIQUE (item_code, component_code)
);

CREATE TABLE IF NOT EXISTS item_price (
    item_code TEXT NOT NULL COLLATE NOCASE UNIQUE,
    price_usd TEXT,
    price_local TEXT,
    updated_at TEXT
);

INSERT OR IGNORE INTO schema_version (version) VALUES (1);
"#;

/// 初始化内置目录 schema（幂等）
pub fn init_catalog_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(CATALOG_SCHEMA_SQL)
}
