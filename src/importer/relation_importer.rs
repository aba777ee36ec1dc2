// ==========================================
// 配置器导入管道 - 关联导入器
// ==========================================
// 覆盖三种配置: 纯多对多 / 带数量 / 价格挂载
// 前置: 参考与实体阶段已全部完成,ID 映射只读
// 规则:
// - 任一端点无法解析 → 跳过该行（不写悬空关联）
// - 同一组合键重复 → 保留首条
// - 写入策略: 全量重载 = insert-or-ignore（批量单事务）
//             增量 = upsert,数量/金额替换而非累加
// ==========================================

use crate::config::import_config::{
    PersistAs, PriceConfig, RelationCountConfig, RelationField, RelationMnConfig, TableConfig,
};
use crate::domain::report::TableStats;
use crate::domain::types::{FieldValue, Payload, RunMode, SurrogateId, WriteStrategy};
use crate::domain::workbook::{Row, Workbook};
use crate::importer::dedup::{CompositeKey, SeenKeys};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::id_maps::{normalize_key, IdBucket, IdMaps};
use crate::importer::reference_importer::find_sheet;
use crate::importer::row_mapper::map_field;
use crate::importer::transform::TransformContext;
use crate::importer::write_limiter::WriteLimiter;
use crate::repository::CatalogRepository;
use tracing::{debug, info, instrument, warn};

// ==========================================
// Endpoint - 已绑定 ID 映射桶的关联端点
// ==========================================
struct Endpoint<'a> {
    field: &'a RelationField,
    bucket: &'a IdBucket,
}

/// 端点读取结果
enum EndpointValue {
    Blank,
    Unresolved(String),
    Resolved { key: String, value: FieldValue },
}

impl<'a> Endpoint<'a> {
    fn bind(table: &str, field: &'a RelationField, id_maps: &'a IdMaps) -> ImportResult<Self> {
        let bucket = id_maps
            .bucket(&field.map_ref)
            .ok_or_else(|| ImportError::MissingIdBucket {
                table: table.to_string(),
                map_ref: field.map_ref.clone(),
            })?;
        Ok(Self { field, bucket })
    }

    fn read(&self, row: &Row) -> EndpointValue {
        let Some(raw) = row.get(&self.field.column).as_raw_string() else {
            return EndpointValue::Blank;
        };
        let key = normalize_key(&raw);
        if key.is_empty() {
            return EndpointValue::Blank;
        }

        match self.bucket.get(self.field.map_key, &key) {
            Some(id) => EndpointValue::Resolved {
                value: self.persist_value(raw, id),
                key,
            },
            None => EndpointValue::Unresolved(raw),
        }
    }

    fn persist_value(&self, raw: String, id: SurrogateId) -> FieldValue {
        match self.field.persist {
            PersistAs::Id => FieldValue::Integer(id),
            PersistAs::Raw => FieldValue::Text(raw),
        }
    }
}

/// 单行端点解析结果
enum Resolution {
    Resolved(Vec<(String, FieldValue)>, CompositeKey), // (字段, 值) 列表, 组合去重键
    Skipped,
    Unresolved,
}

fn resolve_row(endpoints: &[Endpoint<'_>], row: &Row) -> Resolution {
    let mut fields = Vec::with_capacity(endpoints.len());
    let mut keys = Vec::with_capacity(endpoints.len());

    for endpoint in endpoints {
        match endpoint.read(row) {
            EndpointValue::Blank => return Resolution::Skipped,
            EndpointValue::Unresolved(raw) => {
                debug!(
                    row = row.row_number,
                    map_ref = %endpoint.field.map_ref,
                    value = %raw,
                    "关联端点未解析"
                );
                return Resolution::Unresolved;
            }
            EndpointValue::Resolved { key, value } => {
                keys.push(key);
                fields.push((endpoint.field.field.clone(), value));
            }
        }
    }

    Resolution::Resolved(fields, CompositeKey::new(keys))
}

/// 待写入的关联行
struct PendingRelation {
    row_number: usize,
    dedup_key: CompositeKey,
    create: Payload,
    update: Payload,
}

// ==========================================
// RelationImporter - 关联阶段
// ==========================================
pub struct RelationImporter<'a, R: CatalogRepository + ?Sized> {
    repo: &'a R,
    limiter: &'a WriteLimiter,
    mode: RunMode,
    touched_at: &'a str,
}

impl<'a, R: CatalogRepository + ?Sized> RelationImporter<'a, R> {
    pub fn new(repo: &'a R, limiter: &'a WriteLimiter, mode: RunMode, touched_at: &'a str) -> Self {
        Self {
            repo,
            limiter,
            mode,
            touched_at,
        }
    }

    /// 按配置变体分派；非关联配置返回内部错误
    pub async fn import_table(
        &self,
        config: &TableConfig,
        workbook: &Workbook,
        id_maps: &IdMaps,
    ) -> ImportResult<TableStats> {
        match config {
            TableConfig::RelationMn(c) => self.import_mn(c, workbook, id_maps).await,
            TableConfig::RelationCount(c) => self.import_count(c, workbook, id_maps).await,
            TableConfig::Price(c) => self.import_price(c, workbook, id_maps).await,
            other => Err(ImportError::InternalError(format!(
                "表 {} 不属于关联阶段",
                other.table()
            ))),
        }
    }

    /// 纯多对多: 两端解析后批量 insert-or-ignore（与运行模式无关）
    #[instrument(skip_all, fields(table = %config.table, sheet = %config.sheet))]
    pub async fn import_mn(
        &self,
        config: &RelationMnConfig,
        workbook: &Workbook,
        id_maps: &IdMaps,
    ) -> ImportResult<TableStats> {
        let sheet = find_sheet(workbook, &config.table, &config.sheet)?;
        let endpoints = [
            Endpoint::bind(&config.table, &config.left, id_maps)?,
            Endpoint::bind(&config.table, &config.right, id_maps)?,
        ];

        let mut stats = TableStats::default();
        let mut seen = SeenKeys::new();
        let mut staged = Vec::new();

        for row in &sheet.rows {
            stats.seen += 1;
            let (fields, dedup_key) = match resolve_row(&endpoints, row) {
                Resolution::Resolved(fields, key) => (fields, key),
                Resolution::Skipped => {
                    stats.skipped += 1;
                    continue;
                }
                Resolution::Unresolved => {
                    stats.skipped += 1;
                    stats.unresolved += 1;
                    continue;
                }
            };

            if !seen.mark(&dedup_key) {
                stats.duplicates += 1;
                continue;
            }
            staged.push(fields.into_iter().collect::<Payload>());
        }

        self.write_bulk(&config.table, staged, &mut stats).await;
        log_relation_stats(&stats);
        Ok(stats)
    }

    /// 带数量: 数量经转换后必须为正整数
    #[instrument(skip_all, fields(table = %config.table, sheet = %config.sheet))]
    pub async fn import_count(
        &self,
        config: &RelationCountConfig,
        workbook: &Workbook,
        id_maps: &IdMaps,
    ) -> ImportResult<TableStats> {
        let sheet = find_sheet(workbook, &config.table, &config.sheet)?;
        let endpoints = [
            Endpoint::bind(&config.table, &config.left, id_maps)?,
            Endpoint::bind(&config.table, &config.right, id_maps)?,
        ];

        let mut stats = TableStats::default();
        let mut seen = SeenKeys::new();
        let mut pending = Vec::new();

        for row in &sheet.rows {
            stats.seen += 1;
            let (fields, dedup_key) = match resolve_row(&endpoints, row) {
                Resolution::Resolved(fields, key) => (fields, key),
                Resolution::Skipped => {
                    stats.skipped += 1;
                    continue;
                }
                Resolution::Unresolved => {
                    stats.skipped += 1;
                    stats.unresolved += 1;
                    continue;
                }
            };

            if !seen.mark(&dedup_key) {
                stats.duplicates += 1;
                continue;
            }

            let row_key = dedup_key.to_string();
            let ctx = TransformContext::new(&config.table, &row_key, &config.count_field.field);
            let count = map_field(&config.count_field, row, &ctx)
                .and_then(|v| v.as_i64())
                .filter(|v| *v > 0);
            let Some(count) = count else {
                debug!(row = row.row_number, key = %dedup_key, "数量无效,跳过");
                seen.unmark(&dedup_key);
                stats.skipped += 1;
                continue;
            };

            let mut update = Payload::new();
            update.insert(config.count_field.field.clone(), FieldValue::Integer(count));
            if let Some(touch) = &config.touch_field {
                update.insert(touch.clone(), FieldValue::Text(self.touched_at.to_string()));
            }
            let mut create: Payload = fields.into_iter().collect();
            create.extend(update.clone());

            pending.push(PendingRelation {
                row_number: row.row_number,
                dedup_key,
                create,
                update,
            });
        }

        let key_fields = vec![config.left.field.clone(), config.right.field.clone()];
        self.write_pending(&config.table, config.strategy, &key_fields, pending, &mut stats)
            .await;
        log_relation_stats(&stats);
        Ok(stats)
    }

    /// 价格挂载: 单端点,1~2 个金额字段；金额全部无效时跳过该行
    #[instrument(skip_all, fields(table = %config.table, sheet = %config.sheet))]
    pub async fn import_price(
        &self,
        config: &PriceConfig,
        workbook: &Workbook,
        id_maps: &IdMaps,
    ) -> ImportResult<TableStats> {
        let sheet = find_sheet(workbook, &config.table, &config.sheet)?;
        let endpoints = [Endpoint::bind(&config.table, &config.entity, id_maps)?];

        let mut stats = TableStats::default();
        let mut seen = SeenKeys::new();
        let mut pending = Vec::new();

        for row in &sheet.rows {
            stats.seen += 1;
            let (fields, dedup_key) = match resolve_row(&endpoints, row) {
                Resolution::Resolved(fields, key) => (fields, key),
                Resolution::Skipped => {
                    stats.skipped += 1;
                    continue;
                }
                Resolution::Unresolved => {
                    stats.skipped += 1;
                    stats.unresolved += 1;
                    continue;
                }
            };

            if !seen.mark(&dedup_key) {
                stats.duplicates += 1;
                continue;
            }

            let row_key = dedup_key.to_string();
            let mut update = Payload::new();
            for mapping in &config.price_fields {
                let ctx = TransformContext::new(&config.table, &row_key, &mapping.field);
                if let Some(value) = map_field(mapping, row, &ctx) {
                    update.insert(mapping.field.clone(), value);
                }
            }
            if update.is_empty() {
                debug!(row = row.row_number, key = %dedup_key, "金额全部无效,跳过");
                seen.unmark(&dedup_key);
                stats.skipped += 1;
                continue;
            }
            if let Some(touch) = &config.touch_field {
                update.insert(touch.clone(), FieldValue::Text(self.touched_at.to_string()));
            }
            let mut create: Payload = fields.into_iter().collect();
            create.extend(update.clone());

            pending.push(PendingRelation {
                row_number: row.row_number,
                dedup_key,
                create,
                update,
            });
        }

        let key_fields = vec![config.entity.field.clone()];
        self.write_pending(&config.table, config.strategy, &key_fields, pending, &mut stats)
            .await;
        log_relation_stats(&stats);
        Ok(stats)
    }

    // ==========================================
    // 写入
    // ==========================================

    /// 批量 insert-or-ignore；整批失败时全部计入 skipped
    async fn write_bulk(&self, table: &str, rows: Vec<Payload>, stats: &mut TableStats) {
        if rows.is_empty() {
            return;
        }

        let total = rows.len();
        match self.repo.bulk_insert_or_ignore(table, rows).await {
            Ok(outcome) => {
                stats.written += outcome.inserted;
                stats.ignored += outcome.ignored;
                stats.skipped += outcome.failed;
            }
            Err(e) => {
                warn!(table = %table, rows = total, error = %e, "批量写入失败,整批跳过");
                stats.skipped += total;
            }
        }
    }

    /// 按策略写入: 配置固定的策略优先,否则跟随运行模式
    async fn write_pending(
        &self,
        table: &str,
        pinned: Option<WriteStrategy>,
        key_fields: &[String],
        pending: Vec<PendingRelation>,
        stats: &mut TableStats,
    ) {
        let strategy = pinned.unwrap_or_else(|| self.mode.default_write_strategy());
        debug!(table = %table, ?strategy, rows = pending.len(), "关联写入");

        match strategy {
            WriteStrategy::InsertOrIgnore => {
                let rows = pending.into_iter().map(|p| p.create).collect();
                self.write_bulk(table, rows, stats).await;
            }
            WriteStrategy::Upsert => {
                let repo = self.repo;
                let results = self
                    .limiter
                    .run_bounded(pending, |p| async move {
                        let result = repo
                            .upsert_by_composite_key(table, key_fields, p.create, p.update)
                            .await;
                        (p.row_number, p.dedup_key, result)
                    })
                    .await;

                for (row_number, key, result) in results {
                    match result {
                        Ok(()) => stats.written += 1,
                        Err(e) => {
                            warn!(table = %table, key = %key, row = row_number, error = %e, "写入失败,跳过");
                            stats.skipped += 1;
                        }
                    }
                }
            }
        }
    }
}

fn log_relation_stats(stats: &TableStats) {
    info!(
        seen = stats.seen,
        written = stats.written,
        ignored = stats.ignored,
        duplicates = stats.duplicates,
        unresolved = stats.unresolved,
        skipped = stats.skipped,
        "关联表导入完成"
    );
}
