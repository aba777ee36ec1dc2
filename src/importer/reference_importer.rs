// ==========================================
// 配置器导入管道 - 参考表导入器
// ==========================================
// 流程（单表）:
// 1. 按行序同步: 读自然键 → 去重标记 → 行映射（无效则撤销标记）
// 2. 并发派发 upsert（受写入并发上限约束）,等待全部结果
// 3. 成功的行写入 ID 映射桶；失败的行记 skipped 并撤销标记
// 实体导入器复用同一流程（额外做 SKU 唯一性检查）
// ==========================================

use crate::config::import_config::ReferenceConfig;
use crate::domain::report::TableStats;
use crate::domain::workbook::{Sheet, Workbook};
use crate::importer::dedup::SeenKeys;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::id_maps::{IdBucket, IdMaps};
use crate::importer::row_mapper::{MappedRow, RowMapper};
use crate::importer::write_limiter::WriteLimiter;
use crate::repository::CatalogRepository;
use tracing::{debug, info, instrument, warn};

/// 查找表对应的工作表；缺失为表级错误
pub(crate) fn find_sheet<'w>(
    workbook: &'w Workbook,
    table: &str,
    sheet: &str,
) -> ImportResult<&'w Sheet> {
    workbook.sheet(sheet).ok_or_else(|| ImportError::SheetNotFound {
        table: table.to_string(),
        sheet: sheet.to_string(),
    })
}

/// 参考表与实体表共用的单表导入流程
pub(crate) async fn import_lookup_rows<R>(
    repo: &R,
    limiter: &WriteLimiter,
    mapper: &RowMapper<'_>,
    sheet: &Sheet,
    bucket: &mut IdBucket,
) -> TableStats
where
    R: CatalogRepository + ?Sized,
{
    let table = mapper.table();
    let key_field = mapper.key_field();
    let mut stats = TableStats::default();
    let mut seen = SeenKeys::new();
    let mut seen_skus = SeenKeys::new();
    let mut pending: Vec<MappedRow> = Vec::new();

    // ===== 同步阶段: 去重必须在任何写入派发之前完成 =====
    for row in &sheet.rows {
        stats.seen += 1;

        let Some((key_raw, key)) = mapper.natural_key(row) else {
            debug!(table = %table, row = row.row_number, "自然键为空,跳过");
            stats.skipped += 1;
            continue;
        };

        if !seen.mark(&key) {
            debug!(table = %table, key = %key, row = row.row_number, "自然键重复,保留首条");
            stats.duplicates += 1;
            continue;
        }

        let mapped = match mapper.map(row, &key_raw, &key) {
            Ok(mapped) => mapped,
            Err(rejection) => {
                debug!(table = %table, key = %key, row = row.row_number, ?rejection, "行无效,跳过");
                seen.unmark(&key);
                stats.skipped += 1;
                continue;
            }
        };

        if let Some(sku) = &mapped.sku_key {
            if !seen_skus.mark(sku) {
                warn!(table = %table, key = %key, sku = %sku, "SKU 与前序行重复,跳过");
                seen.unmark(&key);
                stats.skipped += 1;
                continue;
            }
        }

        pending.push(mapped);
    }

    // ===== 并发写入 =====
    let results = limiter
        .run_bounded(pending, |mapped| async move {
            let MappedRow {
                row_number,
                key,
                name_key,
                sku_key,
                create,
                update,
            } = mapped;
            let result = repo.upsert_by_key(table, key_field, create, update).await;
            (row_number, key, name_key, sku_key, result)
        })
        .await;

    for (row_number, key, name_key, sku_key, result) in results {
        match result {
            Ok(id) => {
                bucket.insert_code(key, id);
                if let Some(name) = name_key {
                    bucket.insert_name(name, id);
                }
                stats.written += 1;
            }
            Err(e) => {
                warn!(table = %table, key = %key, row = row_number, error = %e, "写入失败,跳过");
                seen.unmark(&key);
                if let Some(sku) = sku_key {
                    seen_skus.unmark(&sku);
                }
                stats.skipped += 1;
            }
        }
    }

    stats
}

// ==========================================
// ReferenceImporter - 参考表阶段
// ==========================================
pub struct ReferenceImporter<'a, R: CatalogRepository + ?Sized> {
    repo: &'a R,
    limiter: &'a WriteLimiter,
    touched_at: &'a str,
}

impl<'a, R: CatalogRepository + ?Sized> ReferenceImporter<'a, R> {
    pub fn new(repo: &'a R, limiter: &'a WriteLimiter, touched_at: &'a str) -> Self {
        Self {
            repo,
            limiter,
            touched_at,
        }
    }

    /// 导入一张参考表并填充其 ID 映射桶
    ///
    /// # 返回
    /// - Err(SheetNotFound): 表级错误,桶不会被创建
    #[instrument(skip_all, fields(table = %config.table, sheet = %config.sheet))]
    pub async fn import_table(
        &self,
        config: &ReferenceConfig,
        workbook: &Workbook,
        id_maps: &mut IdMaps,
    ) -> ImportResult<TableStats> {
        let sheet = find_sheet(workbook, &config.table, &config.sheet)?;
        let mapper = RowMapper::new(config, self.touched_at);
        let bucket = id_maps.bucket_mut(&config.table);

        let stats = import_lookup_rows(self.repo, self.limiter, &mapper, sheet, bucket).await;

        info!(
            seen = stats.seen,
            written = stats.written,
            duplicates = stats.duplicates,
            skipped = stats.skipped,
            "参考表导入完成"
        );
        Ok(stats)
    }
}
