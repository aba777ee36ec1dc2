// ==========================================
// 导入管道集成测试
// ==========================================
// 测试目标: 内置目录配置 + 真实 SQLite 存储下的端到端行为
// ==========================================


use configurator_import::domain::{ImportStage, RunMode, TableOutcome};
use configurator_import::logging;
use test_helpers::{
    catalog_snapshot, catalog_workbook, count_rows, create_test_db, create_test_orchestrator, open,
    query_i64, query_string, sheet, workbook,
};

#[tokio::test]
async fn test_full_catalog_import() {
    logging::init_test();
    let (_tmp, db_path) = create_test_db().unwrap();
    let orchestrator = create_test_orchestrator(&db_path);

    let report = orchestrator
        .run(&catalog_workbook(), RunMode::FullReload)
        .await
        .unwrap();

    assert!(report.aborted_tables().is_empty());
    assert_eq!(report.stages.len(), 3);

    for table in ["location", "category", "color", "voltage", "item", "component"] {
        assert_eq!(count_rows(&db_path, table), 2, "table {}", table);
        assert_eq!(report.id_map_sizes.get(table), Some(&2), "id map {}", table);
    }
    assert_eq!(count_rows(&db_path, "item_category"), 3);
    assert_eq!(count_rows(&db_path, "item_location"), 2);
    assert_eq!(count_rows(&db_path, "item_color"), 1);
    assert_eq!(count_rows(&db_path, "item_component"), 2);
    assert_eq!(count_rows(&db_path, "item_price"), 2);

    // 转换结果落库
    assert_eq!(
        query_string(&db_path, "SELECT hex FROM color WHERE code = 'white'"),
        "FFFFFF"
    );
    assert_eq!(query_i64(&db_path, "SELECT value FROM voltage WHERE code = 'v24'"), 24);
    assert_eq!(
        query_string(
            &db_path,
            "SELECT price_local FROM item_price WHERE item_code = 'panel1'"
        ),
        "1599.00"
    );
    assert_eq!(
        query_i64(
            &db_path,
            "SELECT COUNT(*) FROM item_price WHERE item_code = 'panel2' AND price_local IS NULL"
        ),
        1
    );

    // 运行日志
    assert_eq!(count_rows(&db_path, "import_run"), 1);
    assert_eq!(
        query_string(&db_path, "SELECT mode FROM import_run"),
        "full-reload"
    );
}

#[tokio::test]
async fn test_end_to_end_minimal_workbook() {
    logging::init_test();
    let (_tmp, db_path) = create_test_db().unwrap();
    let orchestrator = create_test_orchestrator(&db_path);

    let wb = workbook(vec![
        sheet("location", &["code"], &[&["indoor"], &["outdoor"]]),
        sheet("category", &["code"], &[&["display"]]),
        sheet("item", &["code"], &[&["panel1"]]),
        sheet("item>category", &["item", "category"], &[&["panel1", "display"]]),
    ]);

    let report = orchestrator.run(&wb, RunMode::FullReload).await.unwrap();

    assert_eq!(count_rows(&db_path, "location"), 2);
    assert_eq!(count_rows(&db_path, "item"), 1);
    assert_eq!(count_rows(&db_path, "category"), 1);
    assert_eq!(count_rows(&db_path, "item_category"), 1);

    assert_eq!(report.id_map_sizes.get("location"), Some(&2));
    assert_eq!(report.id_map_sizes.get("category"), Some(&1));
    assert_eq!(report.id_map_sizes.get("item"), Some(&1));

    // 未提供的工作表只中止各自的表
    let color = report.table("color").unwrap();
    assert!(color.is_aborted());
    assert_eq!(report.table("item_category").unwrap().stats.written, 1);
    assert_eq!(
        report.table("item_category").unwrap().outcome,
        TableOutcome::Completed
    );
}

#[tokio::test]
async fn test_incremental_rerun_is_idempotent() {
    logging::init_test();
    let (_tmp, db_path) = create_test_db().unwrap();
    let orchestrator = create_test_orchestrator(&db_path);
    let wb = catalog_workbook();

    let first = orchestrator.run(&wb, RunMode::Incremental).await.unwrap();
    let after_first = catalog_snapshot(&db_path);

    let second = orchestrator.run(&wb, RunMode::Incremental).await.unwrap();
    let after_second = catalog_snapshot(&db_path);

    assert_eq!(after_first, after_second);
    assert_eq!(first.id_map_sizes, second.id_map_sizes);
    assert_eq!(count_rows(&db_path, "item_component"), 2);
    assert_eq!(
        query_i64(
            &db_path,
            "SELECT quantity FROM item_component WHERE component_code = 'bolt'"
        ),
        4
    );
    assert_eq!(count_rows(&db_path, "import_run"), 2);
}

#[tokio::test]
async fn test_full_reload_rerun_ignores_existing_relations() {
    logging::init_test();
    let (_tmp, db_path) = create_test_db().unwrap();
    let orchestrator = create_test_orchestrator(&db_path);
    let wb = catalog_workbook();

    orchestrator.run(&wb, RunMode::FullReload).await.unwrap();
    let after_first = catalog_snapshot(&db_path);
    let second = orchestrator.run(&wb, RunMode::FullReload).await.unwrap();

    assert_eq!(catalog_snapshot(&db_path), after_first);

    let item_category = report_stats(&second, "item_category");
    assert_eq!(item_category.written, 0);
    assert_eq!(item_category.ignored, 3);
}

#[tokio::test]
async fn test_join_rows_store_raw_cell_values() {
    logging::init_test();
    let (_tmp, db_path) = create_test_db().unwrap();
    let orchestrator = create_test_orchestrator(&db_path);

    let with_pair = |item: &str, category: &str| {
        workbook(vec![
            sheet("category", &["code"], &[&["display"]]),
            sheet("item", &["code"], &[&["panel1"]]),
            sheet("item>category", &["item", "category"], &[&[item, category]]),
        ])
    };

    let first = orchestrator
        .run(&with_pair("Panel1", "Display"), RunMode::Incremental)
        .await
        .unwrap();
    assert_eq!(report_stats(&first, "item_category").written, 1);

    // 关联表保存单元格原值,而不是代理 ID 或归一化后的键
    assert_eq!(
        query_string(&db_path, "SELECT item_code || '/' || category_code FROM item_category"),
        "Panel1/Display"
    );

    // 大小写不同的同一键对按已存在处理
    let second = orchestrator
        .run(&with_pair("PANEL1", "display"), RunMode::FullReload)
        .await
        .unwrap();
    let stats = report_stats(&second, "item_category");
    assert_eq!(stats.written, 0);
    assert_eq!(stats.ignored, 1);
    assert_eq!(count_rows(&db_path, "item_category"), 1);
    assert_eq!(
        query_string(&db_path, "SELECT item_code FROM item_category"),
        "Panel1"
    );
}

#[tokio::test]
async fn test_store_rejected_entity_row_is_skipped_and_unresolvable() {
    logging::init_test();
    let (_tmp, db_path) = create_test_db().unwrap();
    open(&db_path)
        .execute("INSERT INTO item (code, sku) VALUES ('legacy', 'SKU-P1')", [])
        .unwrap();
    let orchestrator = create_test_orchestrator(&db_path);

    let wb = workbook(vec![
        sheet("category", &["code"], &[&["display"]]),
        sheet(
            "item",
            &["code", "sku"],
            &[&["panel1", "SKU-P1"], &["panel2", "SKU-P2"]],
        ),
        sheet(
            "item>category",
            &["item", "category"],
            &[&["panel1", "display"], &["panel2", "display"]],
        ),
    ]);
    let report = orchestrator.run(&wb, RunMode::Incremental).await.unwrap();

    // SKU 冲突只影响该行,同表其余行照常写入
    let item = report.table("item").unwrap();
    assert_eq!(item.outcome, TableOutcome::Completed);
    assert_eq!(item.stats.skipped, 1);
    assert_eq!(item.stats.written, 1);
    assert_eq!(report.id_map_sizes.get("item"), Some(&1));
    assert_eq!(
        query_i64(&db_path, "SELECT COUNT(*) FROM item WHERE code = 'panel1'"),
        0
    );
    assert_eq!(
        query_string(&db_path, "SELECT sku FROM item WHERE code = 'panel2'"),
        "SKU-P2"
    );

    // 失败行未进入 ID 映射,引用它的关联行按未解析处理
    let relation = report_stats(&report, "item_category");
    assert_eq!(relation.written, 1);
    assert_eq!(relation.unresolved, 1);
    assert_eq!(
        query_string(&db_path, "SELECT item_code FROM item_category"),
        "panel2"
    );
}

#[tokio::test]
async fn test_case_insensitive_key_uniqueness() {
    logging::init_test();
    let (_tmp, db_path) = create_test_db().unwrap();
    let orchestrator = create_test_orchestrator(&db_path);

    let wb = workbook(vec![sheet("location", &["code"], &[&["Eco"], &["eco"]])]);
    let report = orchestrator.run(&wb, RunMode::FullReload).await.unwrap();

    assert_eq!(count_rows(&db_path, "location"), 1);
    assert_eq!(report.id_map_sizes.get("location"), Some(&1));

    let stats = report_stats(&report, "location");
    assert_eq!(stats.written, 1);
    assert_eq!(stats.duplicates, 1);
}

#[tokio::test]
async fn test_first_wins_duplicate_policy() {
    logging::init_test();
    let (_tmp, db_path) = create_test_db().unwrap();
    let orchestrator = create_test_orchestrator(&db_path);

    let wb = workbook(vec![sheet(
        "location",
        &["code", "name"],
        &[&["eco", "First"], &["ECO", "Second"]],
    )]);
    orchestrator.run(&wb, RunMode::Incremental).await.unwrap();

    assert_eq!(
        query_string(&db_path, "SELECT name FROM location WHERE code = 'eco'"),
        "First"
    );
}

#[tokio::test]
async fn test_dangling_relation_row_is_skipped() {
    logging::init_test();
    let (_tmp, db_path) = create_test_db().unwrap();
    let orchestrator = create_test_orchestrator(&db_path);

    let wb = workbook(vec![
        sheet("category", &["code"], &[&["display"]]),
        sheet("item", &["code"], &[&["panel1"]]),
        sheet(
            "item>category",
            &["item", "category"],
            &[&["panel1", "display"], &["panel1", "ghost"]],
        ),
    ]);
    let report = orchestrator.run(&wb, RunMode::FullReload).await.unwrap();

    assert_eq!(count_rows(&db_path, "item_category"), 1);
    let stats = report_stats(&report, "item_category");
    assert_eq!(stats.written, 1);
    assert_eq!(stats.unresolved, 1);
    assert_eq!(stats.skipped, 1);
}

#[tokio::test]
async fn test_quantity_replace_semantics() {
    logging::init_test();
    let (_tmp, db_path) = create_test_db().unwrap();
    let orchestrator = create_test_orchestrator(&db_path);

    let with_quantity = |qty: &str| {
        workbook(vec![
            sheet("item", &["code"], &[&["panel1"]]),
            sheet("component", &["code"], &[&["bolt"]]),
            sheet(
                "item>component",
                &["item", "component", "quantity"],
                &[&["panel1", "bolt", qty]],
            ),
        ])
    };

    orchestrator
        .run(&with_quantity("3"), RunMode::Incremental)
        .await
        .unwrap();
    orchestrator
        .run(&with_quantity("7"), RunMode::Incremental)
        .await
        .unwrap();

    assert_eq!(count_rows(&db_path, "item_component"), 1);
    assert_eq!(query_i64(&db_path, "SELECT quantity FROM item_component"), 7);
}

#[tokio::test]
async fn test_zero_valid_rows_is_noop() {
    logging::init_test();
    let (_tmp, db_path) = create_test_db().unwrap();
    let orchestrator = create_test_orchestrator(&db_path);

    let wb = workbook(vec![
        sheet("category", &["code"], &[&["display"]]),
        sheet("item", &["code"], &[&["panel1"]]),
        sheet(
            "item>category",
            &["item", "category"],
            &[&["ghost1", "display"], &["panel1", "ghost2"]],
        ),
    ]);
    let report = orchestrator.run(&wb, RunMode::FullReload).await.unwrap();

    let table = report.table("item_category").unwrap();
    assert_eq!(table.outcome, TableOutcome::Completed);
    assert_eq!(table.stats.written, 0);
    assert_eq!(table.stats.unresolved, 2);
    assert_eq!(count_rows(&db_path, "item_category"), 0);
}

#[tokio::test]
async fn test_missing_reference_sheet_aborts_dependent_relation_only() {
    logging::init_test();
    let (_tmp, db_path) = create_test_db().unwrap();
    let orchestrator = create_test_orchestrator(&db_path);

    // color 工作表缺失: color 表中止,item>color 因 ID 映射桶缺失中止,其余正常
    let wb = workbook(vec![
        sheet("location", &["code"], &[&["indoor"]]),
        sheet("item", &["code"], &[&["panel1"]]),
        sheet("item>color", &["item", "color"], &[&["panel1", "black"]]),
        sheet("item>location", &["item", "location"], &[&["panel1", "indoor"]]),
    ]);
    let report = orchestrator.run(&wb, RunMode::FullReload).await.unwrap();

    assert!(report.table("color").unwrap().is_aborted());
    match &report.table("item_color").unwrap().outcome {
        TableOutcome::Aborted { reason } => assert!(reason.contains("color")),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(count_rows(&db_path, "item_location"), 1);

    let relation = report.stage(ImportStage::RelationStage).unwrap();
    assert_eq!(relation.totals().written, 1);
}

#[tokio::test]
async fn test_invalid_values_are_skipped_not_fatal() {
    logging::init_test();
    let (_tmp, db_path) = create_test_db().unwrap();
    let orchestrator = create_test_orchestrator(&db_path);

    let wb = workbook(vec![
        sheet(
            "voltage",
            &["code", "value"],
            &[&["v0", "0"], &["vx", "abc"], &["v12", "12"]],
        ),
        sheet("item", &["code"], &[&["panel1"]]),
        sheet("component", &["code"], &[&["bolt"]]),
        sheet(
            "item>component",
            &["item", "component", "quantity"],
            &[&["panel1", "bolt", "-2"]],
        ),
    ]);
    let report = orchestrator.run(&wb, RunMode::Incremental).await.unwrap();

    assert_eq!(count_rows(&db_path, "voltage"), 1);
    assert_eq!(report_stats(&report, "voltage").skipped, 2);
    assert_eq!(count_rows(&db_path, "item_component"), 0);
    assert_eq!(report_stats(&report, "item_component").skipped, 1);
}

fn report_stats(
    report: &configurator_import::ImportReport,
    table: &str,
) -> configurator_import::TableStats {
    report.table(table).unwrap().stats
}
