// ==========================================
// 配置器导入管道 - 目录数据 Repository 实现
// ==========================================
// 职责: 实现关系存储原语（使用 rusqlite）
// 约束: 表名/列名来自配置,统一校验并加引号；值一律参数化绑定
// ==========================================

use crate::db::{is_valid_identifier, open_sqlite_connection, quote_identifier};
use crate::domain::types::{FieldValue, Payload, SurrogateId};
use crate::repository::catalog_repo::{
    BulkInsertOutcome, CatalogRepository, ImportRunRecord, SURROGATE_ID_COLUMN,
};
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use rusqlite::types::{ToSql, ToSqlOutput, Value, ValueRef};
use rusqlite::{params, params_from_iter, Connection};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;

// FieldValue → SQLite 值
// 布尔存 0/1,定点小数存文本（不经过浮点）
impl ToSql for FieldValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            FieldValue::Null => ToSqlOutput::Owned(Value::Null),
            FieldValue::Boolean(v) => ToSqlOutput::Owned(Value::Integer(i64::from(*v))),
            FieldValue::Integer(v) => ToSqlOutput::Owned(Value::Integer(*v)),
            FieldValue::Decimal(v) => ToSqlOutput::Owned(Value::Text(v.to_string())),
            FieldValue::Text(v) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())),
        })
    }
}

fn ident(name: &str) -> RepositoryResult<String> {
    if is_valid_identifier(name) {
        Ok(quote_identifier(name))
    } else {
        Err(RepositoryError::InvalidIdentifier(name.to_string()))
    }
}

/// 生成 INSERT ... ON CONFLICT(key) DO UPDATE SET ... 语句
///
/// 参数顺序: create 负载的值 (?1..?n) 之后接 update 负载的值 (?n+1..)
/// update 为空时 SET 第一个键列为自身,保证冲突时依旧返回已存在的行
fn build_upsert_sql(
    table: &str,
    key_fields: &[&str],
    create: &Payload,
    update: &Payload,
    returning: bool,
) -> RepositoryResult<String> {
    if create.is_empty() {
        return Err(RepositoryError::EmptyPayload(table.to_string()));
    }
    let first_key = key_fields
        .first()
        .ok_or_else(|| RepositoryError::InternalError(format!("表 {} 未指定冲突键", table)))?;

    let columns = create
        .keys()
        .map(|c| ident(c))
        .collect::<RepositoryResult<Vec<_>>>()?;
    let placeholders: Vec<String> = (1..=create.len()).map(|i| format!("?{}", i)).collect();
    let conflict = key_fields
        .iter()
        .map(|c| ident(c))
        .collect::<RepositoryResult<Vec<_>>>()?;

    let assignments = if update.is_empty() {
        let key = ident(first_key)?;
        vec![format!("{} = {}", key, key)]
    } else {
        update
            .keys()
            .enumerate()
            .map(|(i, c)| Ok(format!("{} = ?{}", ident(c)?, create.len() + i + 1)))
            .collect::<RepositoryResult<Vec<_>>>()?
    };

    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) DO UPDATE SET {}",
        ident(table)?,
        columns.join(", "),
        placeholders.join(", "),
        conflict.join(", "),
        assignments.join(", ")
    );
    if returning {
        sql.push_str(&format!(" RETURNING {}", ident(SURROGATE_ID_COLUMN)?));
    }
    Ok(sql)
}

/// 生成 INSERT ... ON CONFLICT DO NOTHING 语句
///
/// 不用 INSERT OR IGNORE: 后者会把 NOT NULL / CHECK 违反也当作"已存在"吞掉
fn build_insert_or_ignore_sql(table: &str, row: &Payload) -> RepositoryResult<String> {
    if row.is_empty() {
        return Err(RepositoryError::EmptyPayload(table.to_string()));
    }
    let columns = row
        .keys()
        .map(|c| ident(c))
        .collect::<RepositoryResult<Vec<_>>>()?;
    let placeholders: Vec<String> = (1..=row.len()).map(|i| format!("?{}", i)).collect();

    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT DO NOTHING",
        ident(table)?,
        columns.join(", "),
        placeholders.join(", ")
    ))
}

// ==========================================
// SqliteCatalogRepository
// ==========================================
pub struct SqliteCatalogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCatalogRepository {
    /// 创建新的 Repository 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建（与 ConfigManager 共享同一连接）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn lock(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }
}

#[async_trait]
impl CatalogRepository for SqliteCatalogRepository {
    async fn upsert_by_key(
        &self,
        table: &str,
        key_field: &str,
        create: Payload,
        update: Payload,
    ) -> RepositoryResult<SurrogateId> {
        let sql = build_upsert_sql(table, &[key_field], &create, &update, true)?;
        let values: Vec<&FieldValue> = create.values().chain(update.values()).collect();

        let conn = self.lock()?;
        let id = conn.query_row(&sql, params_from_iter(values), |row| row.get::<_, i64>(0))?;
        Ok(id)
    }

    async fn bulk_insert_or_ignore(
        &self,
        table: &str,
        rows: Vec<Payload>,
    ) -> RepositoryResult<BulkInsertOutcome> {
        let mut outcome = BulkInsertOutcome::default();
        if rows.is_empty() {
            return Ok(outcome);
        }

        let conn = self.lock()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        for row in &rows {
            let sql = build_insert_or_ignore_sql(table, row)?;
            let mut stmt = tx.prepare_cached(&sql)?;
            match stmt.execute(params_from_iter(row.values())) {
                Ok(0) => outcome.ignored += 1,
                Ok(_) => outcome.inserted += 1,
                Err(e) => {
                    // 单行被拒绝: 记录并继续,不回滚同批其他行
                    warn!(table = %table, error = %e, "关联行写入被存储拒绝");
                    outcome.failed += 1;
                }
            }
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(outcome)
    }

    async fn upsert_by_composite_key(
        &self,
        table: &str,
        key_fields: &[String],
        create: Payload,
        update: Payload,
    ) -> RepositoryResult<()> {
        let keys: Vec<&str> = key_fields.iter().map(String::as_str).collect();
        let sql = build_upsert_sql(table, &keys, &create, &update, false)?;
        let values: Vec<&FieldValue> = create.values().chain(update.values()).collect();

        let conn = self.lock()?;
        conn.execute(&sql, params_from_iter(values))?;
        Ok(())
    }

    async fn insert_import_run(&self, run: ImportRunRecord) -> RepositoryResult<()> {
        let conn = self.lock()?;

        conn.execute(
            r#"
            INSERT INTO import_run (
                run_id, mode, started_at, finished_at, elapsed_ms,
                total_written, total_skipped, report_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                run.run_id,
                run.mode,
                run.started_at,
                run.finished_at,
                run.elapsed_ms,
                run.total_written,
                run.total_skipped,
                run.report_json,
            ],
        )?;

        Ok(())
    }

    async fn count_rows(&self, table: &str) -> RepositoryResult<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}", ident(table)?);
        let conn = self.lock()?;
        let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_catalog_schema;

    fn repo() -> SqliteCatalogRepository {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        init_catalog_schema(&conn).unwrap();
        SqliteCatalogRepository::from_connection(Arc::new(Mutex::new(conn)))
    }

    fn payload(pairs: &[(&str, FieldValue)]) -> Payload {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn text(v: &str) -> FieldValue {
        FieldValue::Text(v.to_string())
    }

    #[test]
    fn test_build_upsert_sql() {
        let create = payload(&[("code", text("eco")), ("name", text("Eco"))]);
        let update = payload(&[("name", text("Eco"))]);
        let sql = build_upsert_sql("location", &["code"], &create, &update, true).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO \"location\" (\"code\", \"name\") VALUES (?1, ?2) \
             ON CONFLICT(\"code\") DO UPDATE SET \"name\" = ?3 RETURNING \"id\""
        );
    }

    #[test]
    fn test_build_sql_rejects_bad_identifier() {
        let create = payload(&[("code; --", text("x"))]);
        assert!(matches!(
            build_upsert_sql("location", &["code"], &create, &Payload::new(), false),
            Err(RepositoryError::InvalidIdentifier(_))
        ));
    }

    #[tokio::test]
    async fn test_upsert_by_key_returns_same_id() {
        let repo = repo();
        let first = repo
            .upsert_by_key(
                "location",
                "code",
                payload(&[("code", text("Indoor")), ("name", text("Indoor"))]),
                payload(&[("name", text("Indoor"))]),
            )
            .await
            .unwrap();
        // 大小写不同的同一自然键命中同一条记录,且不修改自然键
        let second = repo
            .upsert_by_key(
                "location",
                "code",
                payload(&[("code", text("indoor")), ("name", text("Inside"))]),
                payload(&[("name", text("Inside"))]),
            )
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(repo.count_rows("location").await.unwrap(), 1);

        let conn = repo.lock().unwrap();
        let (code, name): (String, String) = conn
            .query_row("SELECT code, name FROM location WHERE id = ?1", [first], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .unwrap();
        assert_eq!(code, "Indoor");
        assert_eq!(name, "Inside");
    }

    #[tokio::test]
    async fn test_upsert_with_empty_update_is_noop() {
        let repo = repo();
        let create = payload(&[("code", text("outdoor"))]);
        let a = repo
            .upsert_by_key("location", "code", create.clone(), Payload::new())
            .await
            .unwrap();
        let b = repo
            .upsert_by_key("location", "code", create, Payload::new())
            .await
            .unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_bulk_insert_or_ignore_counts() {
        let repo = repo();
        let row = payload(&[("item_code", text("Panel1")), ("category_code", text("Display"))]);
        let missing_category = payload(&[("item_code", text("panel2"))]);

        let first = repo
            .bulk_insert_or_ignore("item_category", vec![row.clone(), missing_category])
            .await
            .unwrap();
        assert_eq!(
            first,
            BulkInsertOutcome {
                inserted: 1,
                ignored: 0,
                failed: 1
            }
        );

        // 大小写不同的同一键对按已存在处理
        let same_pair = payload(&[("item_code", text("panel1")), ("category_code", text("display"))]);
        let second = repo
            .bulk_insert_or_ignore("item_category", vec![row, same_pair])
            .await
            .unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.ignored, 2);
        assert_eq!(repo.count_rows("item_category").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_bulk_insert_check_violation_is_failed_not_ignored() {
        let repo = repo();
        let valid = payload(&[
            ("item_code", text("panel1")),
            ("component_code", text("bolt")),
            ("quantity", FieldValue::Integer(4)),
        ]);
        let zero = payload(&[
            ("item_code", text("panel1")),
            ("component_code", text("psu")),
            ("quantity", FieldValue::Integer(0)),
        ]);

        let outcome = repo
            .bulk_insert_or_ignore("item_component", vec![valid, zero])
            .await
            .unwrap();

        assert_eq!(
            outcome,
            BulkInsertOutcome {
                inserted: 1,
                ignored: 0,
                failed: 1
            }
        );
        assert_eq!(repo.count_rows("item_component").await.unwrap(), 1);
    }
}
