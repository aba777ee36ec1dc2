// ==========================================
// 配置器导入管道 - 内置目录配置
// ==========================================
// 与 db::CATALOG_SCHEMA_SQL 建表语句对齐
// 工作表命名: 参考/实体表用表名,关联表用 "左>右"
// ==========================================

use crate::config::import_config::{
    EntityConfig, FieldMapping, ImportConfig, PriceConfig, ReferenceConfig, RelationCountConfig,
    RelationField, RelationMnConfig, TableConfig,
};
use crate::domain::types::FieldValue;
use crate::importer::transform::Transform;

const TOUCH_FIELD: &str = "updated_at";

fn name_field() -> FieldMapping {
    FieldMapping::new("name", "name").with_transform(Transform::Text)
}

fn active_field() -> FieldMapping {
    FieldMapping::new("active", "active")
        .with_transform(Transform::Boolean)
        .with_default(FieldValue::Boolean(true))
}

/// 构造只有 code/name/active 的参考表配置
fn simple_reference(table: &str) -> ReferenceConfig {
    let mut config = ReferenceConfig::new(table, table, FieldMapping::key("code", "code"));
    config.name_field = Some(name_field());
    config.active_field = Some(active_field());
    config.touch_field = Some(TOUCH_FIELD.to_string());
    config
}

fn simple_entity(table: &str, other_fields: Vec<FieldMapping>) -> EntityConfig {
    let mut base = simple_reference(table);
    base.other_fields = other_fields;
    EntityConfig {
        base,
        sku_field: Some(FieldMapping::new("sku", "sku").with_transform(Transform::Text)),
    }
}

fn item_relation(sheet: &str, table: &str, target: &str) -> TableConfig {
    TableConfig::RelationMn(RelationMnConfig {
        sheet: sheet.to_string(),
        table: table.to_string(),
        left: RelationField::new("item", "item_code", "item"),
        right: RelationField::new(target, &format!("{}_code", target), target),
    })
}

/// 内置目录配置
pub fn default_catalog() -> ImportConfig {
    // ===== 参考表 =====
    let location = simple_reference("location");

    let mut category = simple_reference("category");
    category.other_fields = vec![FieldMapping::new("sort", "sort_order").with_transform(
        Transform::Integer {
            reject_negative: true,
            reject_zero: false,
        },
    )];

    let mut color = simple_reference("color");
    color.other_fields = vec![FieldMapping::new("hex", "hex").with_transform(Transform::Uppercase)];

    let mut voltage = simple_reference("voltage");
    voltage.value_field = Some(FieldMapping::new("value", "value").with_transform(
        Transform::Integer {
            reject_negative: true,
            reject_zero: true,
        },
    ));

    // ===== 主业务实体 =====
    let item = simple_entity(
        "item",
        vec![
            FieldMapping::new("comment", "comment").with_transform(Transform::Text),
            FieldMapping::new("width", "width_mm").with_transform(Transform::positive_integer()),
            FieldMapping::new("height", "height_mm").with_transform(Transform::positive_integer()),
        ],
    );
    let component = simple_entity(
        "component",
        vec![FieldMapping::new("comment", "comment").with_transform(Transform::Text)],
    );

    // ===== 关联 =====
    let item_component = RelationCountConfig {
        sheet: "item>component".to_string(),
        table: "item_component".to_string(),
        left: RelationField::new("item", "item_code", "item"),
        right: RelationField::new("component", "component_code", "component"),
        count_field: FieldMapping::new("quantity", "quantity")
            .with_transform(Transform::positive_integer()),
        strategy: None,
        touch_field: Some(TOUCH_FIELD.to_string()),
    };

    let item_price = PriceConfig {
        sheet: "item>price".to_string(),
        table: "item_price".to_string(),
        entity: RelationField::new("item", "item_code", "item"),
        price_fields: vec![
            FieldMapping::new("usd", "price_usd").with_transform(Transform::money()),
            FieldMapping::new("local", "price_local").with_transform(Transform::money()),
        ],
        strategy: None,
        touch_field: Some(TOUCH_FIELD.to_string()),
    };

    ImportConfig::new(vec![
        TableConfig::Reference(location),
        TableConfig::Reference(category),
        TableConfig::Reference(color),
        TableConfig::Reference(voltage),
        TableConfig::Entity(item),
        TableConfig::Entity(component),
        item_relation("item>category", "item_category", "category"),
        item_relation("item>location", "item_location", "location"),
        item_relation("item>color", "item_color", "color"),
        TableConfig::RelationCount(item_component),
        TableConfig::Price(item_price),
    ])
}
