// ==========================================
// 配置器导入管道 - 配置管理器
// ==========================================
// 职责: 运行参数的读取与写入
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::catalog_config::default_catalog;
use crate::config::import_config::ImportConfig;
use crate::config::import_config_trait::ImportConfigReader;
use crate::db::open_sqlite_connection;
use crate::importer::error::{ImportError, ImportResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

/// 配置键常量
pub mod config_keys {
    pub const MAX_IN_FLIGHT_WRITES: &str = "import/max_in_flight_writes";
    pub const RECORD_RUNS: &str = "import/record_runs";
    pub const TABLE_CONFIG: &str = "import/table_config";
}

/// 默认单表并发写入上限
pub const DEFAULT_MAX_IN_FLIGHT_WRITES: usize = 16;

const GLOBAL_SCOPE: &str = "global";

// ==========================================
// ImportSettings - 一次运行的参数快照
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct ImportSettings {
    pub max_in_flight_writes: usize,
    pub record_runs: bool,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            max_in_flight_writes: DEFAULT_MAX_IN_FLIGHT_WRITES,
            record_runs: true,
        }
    }
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ImportResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| ImportError::DatabaseConnectionError(e.to_string()))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ImportResult<Self> {
        {
            let conn_guard = conn
                .lock()
                .map_err(|e| ImportError::InternalError(format!("锁获取失败: {}", e)))?;
            crate::db::configure_sqlite_connection(&conn_guard)
                .map_err(|e| ImportError::DatabaseConnectionError(e.to_string()))?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> ImportResult<Option<String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| ImportError::InternalError(format!("锁获取失败: {}", e)))?;

        conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
            params![GLOBAL_SCOPE, key],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(|e| ImportError::ConfigReadError {
            key: key.to_string(),
            message: e.to_string(),
        })
    }

    /// 写入 global scope 配置（存在则覆盖）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ImportResult<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| ImportError::InternalError(format!("锁获取失败: {}", e)))?;

        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES (?1, ?2, ?3, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![GLOBAL_SCOPE, key, value],
        )
        .map_err(|e| ImportError::ConfigReadError {
            key: key.to_string(),
            message: e.to_string(),
        })?;

        Ok(())
    }

    /// 读取本次运行的参数快照
    pub async fn load_import_settings(&self) -> ImportResult<ImportSettings> {
        Ok(ImportSettings {
            max_in_flight_writes: self.get_max_in_flight_writes().await?,
            record_runs: self.get_record_runs().await?,
        })
    }
}

fn parse_bool_value(key: &str, raw: &str) -> ImportResult<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ImportError::ConfigValueError {
            key: key.to_string(),
            value: raw.to_string(),
            message: "期望布尔值".to_string(),
        }),
    }
}

#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_max_in_flight_writes(&self) -> ImportResult<usize> {
        let key = config_keys::MAX_IN_FLIGHT_WRITES;
        match self.get_global_config_value(key)? {
            None => Ok(DEFAULT_MAX_IN_FLIGHT_WRITES),
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(v) if v >= 1 => Ok(v),
                _ => Err(ImportError::ConfigValueError {
                    key: key.to_string(),
                    value: raw,
                    message: "期望 ≥ 1 的整数".to_string(),
                }),
            },
        }
    }

    async fn get_record_runs(&self) -> ImportResult<bool> {
        let key = config_keys::RECORD_RUNS;
        match self.get_global_config_value(key)? {
            None => Ok(true),
            Some(raw) => parse_bool_value(key, &raw),
        }
    }

    async fn get_table_config(&self) -> ImportResult<ImportConfig> {
        let key = config_keys::TABLE_CONFIG;
        match self.get_global_config_value(key)? {
            None => Ok(default_catalog()),
            Some(raw) => ImportConfig::from_json_str(&raw).map_err(|e| {
                ImportError::ConfigValueError {
                    key: key.to_string(),
                    value: "<json>".to_string(),
                    message: e.to_string(),
                }
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_catalog_schema;

    fn manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        init_catalog_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[tokio::test]
    async fn test_defaults_when_missing() {
        let manager = manager();
        let settings = manager.load_import_settings().await.unwrap();
        assert_eq!(settings, ImportSettings::default());
        assert_eq!(manager.get_table_config().await.unwrap(), default_catalog());
    }

    #[tokio::test]
    async fn test_overrides() {
        let manager = manager();
        manager
            .set_global_config_value(config_keys::MAX_IN_FLIGHT_WRITES, "4")
            .unwrap();
        manager
            .set_global_config_value(config_keys::RECORD_RUNS, "false")
            .unwrap();

        let settings = manager.load_import_settings().await.unwrap();
        assert_eq!(settings.max_in_flight_writes, 4);
        assert!(!settings.record_runs);
    }

    #[tokio::test]
    async fn test_invalid_values_rejected() {
        let manager = manager();
        manager
            .set_global_config_value(config_keys::MAX_IN_FLIGHT_WRITES, "0")
            .unwrap();
        assert!(matches!(
            manager.get_max_in_flight_writes().await,
            Err(ImportError::ConfigValueError { .. })
        ));

        manager
            .set_global_config_value(config_keys::TABLE_CONFIG, "{not json")
            .unwrap();
        assert!(manager.get_table_config().await.is_err());
    }
}
