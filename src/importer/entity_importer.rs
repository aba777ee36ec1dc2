// ==========================================
// 配置器导入管道 - 主实体导入器
// ==========================================
// 与参考表流程一致,另外保证 SKU（若配置）在同一工作表内唯一:
// SKU 与前序行重复时整行跳过
// ==========================================

use crate::config::import_config::EntityConfig;
use crate::domain::report::TableStats;
use crate::domain::workbook::Workbook;
use crate::importer::error::ImportResult;
use crate::importer::id_maps::IdMaps;
use crate::importer::reference_importer::{find_sheet, import_lookup_rows};
use crate::importer::row_mapper::RowMapper;
use crate::importer::write_limiter::WriteLimiter;
use crate::repository::CatalogRepository;
use tracing::{info, instrument};

pub struct EntityImporter<'a, R: CatalogRepository + ?Sized> {
    repo: &'a R,
    limiter: &'a WriteLimiter,
    touched_at: &'a str,
}

impl<'a, R: CatalogRepository + ?Sized> EntityImporter<'a, R> {
    pub fn new(repo: &'a R, limiter: &'a WriteLimiter, touched_at: &'a str) -> Self {
        Self {
            repo,
            limiter,
            touched_at,
        }
    }

    /// 导入一张实体表并填充其 ID 映射桶
    #[instrument(skip_all, fields(table = %config.base.table, sheet = %config.base.sheet))]
    pub async fn import_table(
        &self,
        config: &EntityConfig,
        workbook: &Workbook,
        id_maps: &mut IdMaps,
    ) -> ImportResult<TableStats> {
        let sheet = find_sheet(workbook, &config.base.table, &config.base.sheet)?;
        let mapper =
            RowMapper::new(&config.base, self.touched_at).with_sku(config.sku_field.as_ref());
        let bucket = id_maps.bucket_mut(&config.base.table);

        let stats = import_lookup_rows(self.repo, self.limiter, &mapper, sheet, bucket).await;

        info!(
            seen = stats.seen,
            written = stats.written,
            duplicates = stats.duplicates,
            skipped = stats.skipped,
            "实体表导入完成"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::import_config::{FieldMapping, MapKey, ReferenceConfig};
    use crate::db::init_catalog_schema;
    use crate::domain::workbook::Sheet;
    use crate::repository::SqliteCatalogRepository;
    use rusqlite::Connection;
    use std::sync::{Arc, Mutex};

    fn repo() -> SqliteCatalogRepository {
        let conn = Connection::open_in_memory().unwrap();
        init_catalog_schema(&conn).unwrap();
        SqliteCatalogRepository::from_connection(Arc::new(Mutex::new(conn)))
    }

    fn item_config() -> EntityConfig {
        EntityConfig {
            base: ReferenceConfig::new("item", "item", FieldMapping::key("code", "code")),
            sku_field: Some(FieldMapping::new("sku", "sku")),
        }
    }

    #[tokio::test]
    async fn test_duplicate_sku_skips_row() {
        let repo = repo();
        let limiter = WriteLimiter::new(4);
        let importer = EntityImporter::new(&repo, &limiter, "2026-01-01T00:00:00Z");

        let mut sheet = Sheet::new("item");
        sheet.push_row(vec![("code", "panel1".into()), ("sku", "SKU-1".into())]);
        sheet.push_row(vec![("code", "panel2".into()), ("sku", "sku-1".into())]);
        sheet.push_row(vec![("code", "panel3".into()), ("sku", "SKU-3".into())]);
        let mut workbook = Workbook::new();
        workbook.add_sheet(sheet);

        let mut id_maps = IdMaps::new();
        let stats = importer
            .import_table(&item_config(), &workbook, &mut id_maps)
            .await
            .unwrap();

        assert_eq!(stats.written, 2);
        assert_eq!(stats.skipped, 1);
        assert!(id_maps.resolve("item", MapKey::Code, "panel1").is_some());
        assert!(id_maps.resolve("item", MapKey::Code, "panel2").is_none());
        assert_eq!(repo.count_rows("item").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_store_rejected_row_is_skipped_and_unmapped() {
        let conn = Connection::open_in_memory().unwrap();
        init_catalog_schema(&conn).unwrap();
        conn.execute("INSERT INTO item (code, sku) VALUES ('legacy', 'SKU-9')", [])
            .unwrap();
        let repo = SqliteCatalogRepository::from_connection(Arc::new(Mutex::new(conn)));
        let limiter = WriteLimiter::new(4);
        let importer = EntityImporter::new(&repo, &limiter, "2026-01-01T00:00:00Z");

        // panel1 的 SKU 与库中已有的 legacy 冲突,存储拒绝该行
        let mut sheet = Sheet::new("item");
        sheet.push_row(vec![("code", "panel1".into()), ("sku", "sku-9".into())]);
        sheet.push_row(vec![("code", "panel2".into()), ("sku", "SKU-2".into())]);
        let mut workbook = Workbook::new();
        workbook.add_sheet(sheet);

        let mut id_maps = IdMaps::new();
        let stats = importer
            .import_table(&item_config(), &workbook, &mut id_maps)
            .await
            .unwrap();

        assert_eq!(stats.seen, 2);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.written, 1);
        assert!(id_maps.resolve("item", MapKey::Code, "panel1").is_none());
        assert!(id_maps.resolve("item", MapKey::Code, "panel2").is_some());
        assert_eq!(repo.count_rows("item").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_empty_sheet_creates_empty_bucket() {
        let repo = repo();
        let limiter = WriteLimiter::new(4);
        let importer = EntityImporter::new(&repo, &limiter, "2026-01-01T00:00:00Z");

        let mut workbook = Workbook::new();
        workbook.add_sheet(Sheet::new("item"));

        let mut id_maps = IdMaps::new();
        let stats = importer
            .import_table(&item_config(), &workbook, &mut id_maps)
            .await
            .unwrap();

        assert_eq!(stats, TableStats::default());
        assert!(id_maps.contains_bucket("item"));
        assert_eq!(id_maps.sizes().get("item"), Some(&0));
    }
}
