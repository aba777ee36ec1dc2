// ==========================================
// 配置器导入管道 - 导入编排器
// ==========================================
// 状态机: ReferenceStage → EntityStage → RelationStage → Done
// - 严格顺序: 前一阶段所有写入结果落定后才进入下一阶段
// - 运行模式原样下发到每个导入器,只影响写入方式,不影响去重/校验
// - 表级错误只中止该表；已完成阶段的写入不回滚
// ==========================================

use crate::config::import_config::{ImportConfig, TableConfig};
use crate::config::ImportConfigReader;
use crate::domain::report::{ImportReport, StageReport, TableReport};
use crate::domain::types::{ImportStage, RunMode};
use crate::domain::workbook::Workbook;
use crate::importer::entity_importer::EntityImporter;
use crate::importer::error::ImportResult;
use crate::importer::id_maps::IdMaps;
use crate::importer::importer_trait::{CatalogImporter, WorkbookLoader};
use crate::importer::reference_importer::ReferenceImporter;
use crate::importer::relation_importer::RelationImporter;
use crate::importer::workbook_loader::UniversalWorkbookLoader;
use crate::importer::write_limiter::WriteLimiter;
use crate::repository::{CatalogRepository, ImportRunRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::time::Instant;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

// ==========================================
// RunContext - 单次运行的共享参数
// ==========================================
struct RunContext {
    mode: RunMode,
    touched_at: String,
    limiter: WriteLimiter,
}

// ==========================================
// ImportOrchestrator - 导入编排器
// ==========================================
pub struct ImportOrchestrator<R, C>
where
    R: CatalogRepository,
    C: ImportConfigReader,
{
    // 数据访问层
    repo: R,

    // 配置读取器
    config: C,

    // 工作簿加载器
    loader: Box<dyn WorkbookLoader>,
}

impl<R, C> ImportOrchestrator<R, C>
where
    R: CatalogRepository,
    C: ImportConfigReader,
{
    /// 创建编排器（默认按扩展名自动选择工作簿加载器）
    ///
    /// # 参数
    /// - repo: 目录数据仓储
    /// - config: 配置读取器
    pub fn new(repo: R, config: C) -> Self {
        Self {
            repo,
            config,
            loader: Box::new(UniversalWorkbookLoader),
        }
    }

    pub fn with_loader(mut self, loader: Box<dyn WorkbookLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// 执行一次完整导入
    #[instrument(skip(self, workbook), fields(run_id = tracing::field::Empty))]
    pub async fn run(&self, workbook: &Workbook, mode: RunMode) -> ImportResult<ImportReport> {
        let started_at = Utc::now();
        let clock = Instant::now();
        let run_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("run_id", run_id.as_str());

        // ===== 运行参数（配置非法为致命错误）=====
        let table_config = self.config.get_table_config().await?;
        table_config.validate()?;
        let max_in_flight = self.config.get_max_in_flight_writes().await?;
        let record_runs = self.config.get_record_runs().await?;

        info!(
            run_id = %run_id,
            mode = %mode,
            tables = table_config.tables.len(),
            sheets = workbook.sheets.len(),
            max_in_flight,
            "开始导入"
        );

        let ctx = RunContext {
            mode,
            touched_at: started_at.to_rfc3339(),
            limiter: WriteLimiter::new(max_in_flight),
        };

        // ===== 阶段状态机 =====
        let mut id_maps = IdMaps::new();
        let mut stages = Vec::new();
        let mut stage = ImportStage::ReferenceStage;

        while stage != ImportStage::Done {
            let report = self
                .run_stage(stage, &table_config, workbook, &ctx, &mut id_maps)
                .await;
            let totals = report.totals();
            info!(
                stage = %stage,
                tables = report.tables.len(),
                written = totals.written,
                skipped = totals.skipped,
                "阶段完成"
            );
            stages.push(report);
            stage = stage.next();
        }

        let report = ImportReport {
            run_id,
            mode,
            stages,
            id_map_sizes: id_maps.sizes(),
            elapsed_ms: clock.elapsed().as_millis(),
        };

        info!(
            written = report.total_written(),
            skipped = report.total_skipped(),
            aborted = report.aborted_tables().len(),
            elapsed_ms = report.elapsed_ms as u64,
            "导入完成"
        );

        if record_runs {
            self.record_run(&report, started_at).await;
        }

        Ok(report)
    }

    /// 加载工作簿后导入；工作簿无法打开为致命错误
    pub async fn run_from_path(&self, path: &Path, mode: RunMode) -> ImportResult<ImportReport> {
        let workbook = self.loader.load(path).map_err(|e| {
            error!(path = %path.display(), error = %e, "工作簿加载失败");
            e
        })?;
        self.run(&workbook, mode).await
    }

    /// 执行单个阶段: 阶段内各表按配置顺序处理,表级错误转为 Aborted
    async fn run_stage(
        &self,
        stage: ImportStage,
        table_config: &ImportConfig,
        workbook: &Workbook,
        ctx: &RunContext,
        id_maps: &mut IdMaps,
    ) -> StageReport {
        let mut report = StageReport::new(stage);

        for config in table_config.tables_for(stage) {
            let result = match config {
                TableConfig::Reference(c) => {
                    ReferenceImporter::new(&self.repo, &ctx.limiter, &ctx.touched_at)
                        .import_table(c, workbook, id_maps)
                        .await
                }
                TableConfig::Entity(c) => {
                    EntityImporter::new(&self.repo, &ctx.limiter, &ctx.touched_at)
                        .import_table(c, workbook, id_maps)
                        .await
                }
                TableConfig::RelationMn(_)
                | TableConfig::RelationCount(_)
                | TableConfig::Price(_) => {
                    // 关联阶段只读 ID 映射
                    let frozen: &IdMaps = id_maps;
                    RelationImporter::new(&self.repo, &ctx.limiter, ctx.mode, &ctx.touched_at)
                        .import_table(config, workbook, frozen)
                        .await
                }
            };

            let table_report = match result {
                Ok(stats) => TableReport::completed(config.table(), config.sheet(), stats),
                Err(e) => {
                    warn!(
                        stage = %stage,
                        table = %config.table(),
                        sheet = %config.sheet(),
                        error = %e,
                        "表导入中止"
                    );
                    TableReport::aborted(config.table(), config.sheet(), e.to_string())
                }
            };
            report.tables.push(table_report);
        }

        report
    }

    /// 写入运行日志；失败只记录告警,不影响本次结果
    async fn record_run(&self, report: &ImportReport, started_at: DateTime<Utc>) {
        let report_json = match serde_json::to_string(report) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "运行报告序列化失败,跳过运行日志");
                return;
            }
        };

        let record = ImportRunRecord {
            run_id: report.run_id.clone(),
            mode: report.mode.to_string(),
            started_at: started_at.to_rfc3339(),
            finished_at: Utc::now().to_rfc3339(),
            elapsed_ms: report.elapsed_ms as i64,
            total_written: report.total_written() as i64,
            total_skipped: report.total_skipped() as i64,
            report_json,
        };

        if let Err(e) = self.repo.insert_import_run(record).await {
            warn!(run_id = %report.run_id, error = %e, "运行日志写入失败");
        }
    }
}

#[async_trait]
impl<R, C> CatalogImporter for ImportOrchestrator<R, C>
where
    R: CatalogRepository,
    C: ImportConfigReader,
{
    async fn import_workbook(
        &self,
        workbook: &Workbook,
        mode: RunMode,
    ) -> ImportResult<ImportReport> {
        self.run(workbook, mode).await
    }

    async fn import_from_path(&self, path: &Path, mode: RunMode) -> ImportResult<ImportReport> {
        self.run_from_path(path, mode).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{config_keys, ConfigManager};
    use crate::db::init_catalog_schema;
    use crate::domain::workbook::Sheet;
    use crate::repository::SqliteCatalogRepository;
    use rusqlite::Connection;
    use std::sync::{Arc, Mutex};

    fn orchestrator() -> ImportOrchestrator<SqliteCatalogRepository, ConfigManager> {
        let conn = Connection::open_in_memory().unwrap();
        init_catalog_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));
        ImportOrchestrator::new(
            SqliteCatalogRepository::from_connection(conn.clone()),
            ConfigManager::from_connection(conn).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_empty_workbook_aborts_every_table_but_completes() {
        let orchestrator = orchestrator();
        let report = orchestrator
            .run(&Workbook::new(), RunMode::FullReload)
            .await
            .unwrap();

        assert_eq!(report.stages.len(), 3);
        assert_eq!(report.stages[0].stage, ImportStage::ReferenceStage);
        assert_eq!(report.stages[2].stage, ImportStage::RelationStage);
        assert_eq!(report.total_written(), 0);
        assert!(!report.aborted_tables().is_empty());
        assert!(report.id_map_sizes.is_empty());
    }

    #[tokio::test]
    async fn test_run_is_recorded() {
        let orchestrator = orchestrator();
        let mut workbook = Workbook::new();
        let mut sheet = Sheet::new("location");
        sheet.push_row(vec![("code", "eco".into())]);
        workbook.add_sheet(sheet);

        let report = orchestrator
            .run(&workbook, RunMode::Incremental)
            .await
            .unwrap();

        assert_eq!(report.table("location").unwrap().stats.written, 1);
        assert_eq!(report.id_map_sizes.get("location"), Some(&1));
        assert_eq!(
            orchestrator.repository().count_rows("import_run").await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_record_runs_disabled() {
        let conn = Connection::open_in_memory().unwrap();
        init_catalog_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));
        let config = ConfigManager::from_connection(conn.clone()).unwrap();
        config
            .set_global_config_value(config_keys::RECORD_RUNS, "false")
            .unwrap();
        let orchestrator =
            ImportOrchestrator::new(SqliteCatalogRepository::from_connection(conn), config);

        orchestrator
            .run(&Workbook::new(), RunMode::FullReload)
            .await
            .unwrap();
        assert_eq!(
            orchestrator.repository().count_rows("import_run").await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_invalid_table_config_is_fatal() {
        let conn = Connection::open_in_memory().unwrap();
        init_catalog_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));
        let config = ConfigManager::from_connection(conn.clone()).unwrap();
        config
            .set_global_config_value(config_keys::TABLE_CONFIG, r#"{"tables": "nope"}"#)
            .unwrap();
        let orchestrator =
            ImportOrchestrator::new(SqliteCatalogRepository::from_connection(conn), config);

        assert!(orchestrator
            .run(&Workbook::new(), RunMode::FullReload)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_missing_workbook_is_fatal() {
        let orchestrator = orchestrator();
        let result = orchestrator
            .run_from_path(Path::new("does-not-exist.xlsx"), RunMode::FullReload)
            .await;
        assert!(result.is_err());
    }
}
