// ==========================================
// 配置器导入管道 - 导入配置模型
// ==========================================
// 职责: 声明式描述每张可导入的表
// - 哪张工作表供数、哪一列映射到哪个字段、自然键是哪个字段、可选转换
// 约束: 纯数据,无行为；封闭的配置变体集合,按变体分派到各阶段导入器
// ==========================================

use crate::db::is_valid_identifier;
use crate::domain::types::{FieldValue, ImportStage, WriteStrategy};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::transform::Transform;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ==========================================
// FieldMapping - 单列 → 单字段投影
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMapping {
    pub column: String, // 源列名（大小写敏感）
    pub field: String,  // 目标字段名
    #[serde(default)]
    pub transform: Option<Transform>,
    #[serde(default)]
    pub natural_key: bool,
    #[serde(default)]
    pub default: Option<FieldValue>,
}

impl FieldMapping {
    pub fn new(column: &str, field: &str) -> Self {
        Self {
            column: column.to_string(),
            field: field.to_string(),
            transform: None,
            natural_key: false,
            default: None,
        }
    }

    /// 自然键字段
    pub fn key(column: &str, field: &str) -> Self {
        Self {
            natural_key: true,
            ..Self::new(column, field)
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn with_default(mut self, default: FieldValue) -> Self {
        self.default = Some(default);
        self
    }
}

// ==========================================
// ReferenceConfig - 参考/查找表
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceConfig {
    pub sheet: String,
    pub table: String,
    pub code_field: FieldMapping,
    #[serde(default)]
    pub name_field: Option<FieldMapping>,
    #[serde(default)]
    pub value_field: Option<FieldMapping>,
    #[serde(default)]
    pub active_field: Option<FieldMapping>,
    #[serde(default)]
    pub other_fields: Vec<FieldMapping>,
    /// 时间戳列: 设置后创建/更新负载都写入本次运行时间
    #[serde(default)]
    pub touch_field: Option<String>,
}

impl ReferenceConfig {
    pub fn new(sheet: &str, table: &str, code_field: FieldMapping) -> Self {
        Self {
            sheet: sheet.to_string(),
            table: table.to_string(),
            code_field: FieldMapping {
                natural_key: true,
                ..code_field
            },
            name_field: None,
            value_field: None,
            active_field: None,
            other_fields: Vec::new(),
            touch_field: None,
        }
    }

    /// 所有非自然键映射
    pub fn non_key_fields(&self) -> impl Iterator<Item = &FieldMapping> {
        self.name_field
            .iter()
            .chain(self.value_field.iter())
            .chain(self.active_field.iter())
            .chain(self.other_fields.iter())
    }
}

// ==========================================
// EntityConfig - 主业务实体
// ==========================================
// 在 ReferenceConfig 基础上增加可选的唯一 skuField
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityConfig {
    #[serde(flatten)]
    pub base: ReferenceConfig,
    #[serde(default)]
    pub sku_field: Option<FieldMapping>,
}

// ==========================================
// RelationField - 关联端点描述
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MapKey {
    Code,
    Name,
}

/// 端点写入存储的值
///
/// 缺省写原始单元格值: 关联行以自然键对落库,重复判定交给存储的唯一约束
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PersistAs {
    #[default]
    Raw, // 原始（未归一化）单元格值
    Id,  // 解析得到的代理主键
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationField {
    pub column: String,
    pub field: String,
    pub map_ref: String,
    #[serde(default = "default_map_key")]
    pub map_key: MapKey,
    #[serde(default)]
    pub persist: PersistAs,
}

fn default_map_key() -> MapKey {
    MapKey::Code
}

impl RelationField {
    pub fn new(column: &str, field: &str, map_ref: &str) -> Self {
        Self {
            column: column.to_string(),
            field: field.to_string(),
            map_ref: map_ref.to_string(),
            map_key: MapKey::Code,
            persist: PersistAs::Raw,
        }
    }

    pub fn by_name(mut self) -> Self {
        self.map_key = MapKey::Name;
        self
    }

    /// 写解析得到的代理主键而不是原始值
    pub fn persist_id(mut self) -> Self {
        self.persist = PersistAs::Id;
        self
    }
}

// ==========================================
// RelationMnConfig - 纯多对多关联
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationMnConfig {
    pub sheet: String,
    pub table: String,
    pub left: RelationField,
    pub right: RelationField,
}

// ==========================================
// RelationCountConfig - 带数量的关联
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationCountConfig {
    pub sheet: String,
    pub table: String,
    pub left: RelationField,
    pub right: RelationField,
    pub count_field: FieldMapping,
    /// 固定写入策略；None 时跟随运行模式
    #[serde(default)]
    pub strategy: Option<WriteStrategy>,
    #[serde(default)]
    pub touch_field: Option<String>,
}

// ==========================================
// PriceConfig - 价格挂载（单端点）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceConfig {
    pub sheet: String,
    pub table: String,
    pub entity: RelationField,
    /// 一到两个金额字段（如 USD / 本币）
    pub price_fields: Vec<FieldMapping>,
    #[serde(default)]
    pub strategy: Option<WriteStrategy>,
    #[serde(default)]
    pub touch_field: Option<String>,
}

// ==========================================
// TableConfig - 封闭的配置变体集合
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TableConfig {
    Reference(ReferenceConfig),
    Entity(EntityConfig),
    RelationMn(RelationMnConfig),
    RelationCount(RelationCountConfig),
    Price(PriceConfig),
}

impl TableConfig {
    pub fn stage(&self) -> ImportStage {
        match self {
            TableConfig::Reference(_) => ImportStage::ReferenceStage,
            TableConfig::Entity(_) => ImportStage::EntityStage,
            TableConfig::RelationMn(_) | TableConfig::RelationCount(_) | TableConfig::Price(_) => {
                ImportStage::RelationStage
            }
        }
    }

    pub fn table(&self) -> &str {
        match self {
            TableConfig::Reference(c) => &c.table,
            TableConfig::Entity(c) => &c.base.table,
            TableConfig::RelationMn(c) => &c.table,
            TableConfig::RelationCount(c) => &c.table,
            TableConfig::Price(c) => &c.table,
        }
    }

    pub fn sheet(&self) -> &str {
        match self {
            TableConfig::Reference(c) => &c.sheet,
            TableConfig::Entity(c) => &c.base.sheet,
            TableConfig::RelationMn(c) => &c.sheet,
            TableConfig::RelationCount(c) => &c.sheet,
            TableConfig::Price(c) => &c.sheet,
        }
    }

    /// 配置中出现的全部 SQL 标识符（表名 + 目标列名）
    fn identifiers(&self) -> Vec<&str> {
        let mut ids = vec![self.table()];
        match self {
            TableConfig::Reference(c) => collect_reference_identifiers(c, &mut ids),
            TableConfig::Entity(c) => {
                collect_reference_identifiers(&c.base, &mut ids);
                if let Some(sku) = &c.sku_field {
                    ids.push(sku.field.as_str());
                }
            }
            TableConfig::RelationMn(c) => {
                ids.push(c.left.field.as_str());
                ids.push(c.right.field.as_str());
            }
            TableConfig::RelationCount(c) => {
                ids.push(c.left.field.as_str());
                ids.push(c.right.field.as_str());
                ids.push(c.count_field.field.as_str());
                if let Some(t) = &c.touch_field {
                    ids.push(t.as_str());
                }
            }
            TableConfig::Price(c) => {
                ids.push(c.entity.field.as_str());
                ids.extend(c.price_fields.iter().map(|f| f.field.as_str()));
                if let Some(t) = &c.touch_field {
                    ids.push(t.as_str());
                }
            }
        }
        ids
    }
}

fn collect_reference_identifiers<'a>(c: &'a ReferenceConfig, ids: &mut Vec<&'a str>) {
    ids.push(c.code_field.field.as_str());
    ids.extend(c.non_key_fields().map(|f| f.field.as_str()));
    if let Some(t) = &c.touch_field {
        ids.push(t.as_str());
    }
}

// ==========================================
// ImportConfig - 整份导入配置
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportConfig {
    pub tables: Vec<TableConfig>,
}

impl ImportConfig {
    pub fn new(tables: Vec<TableConfig>) -> Self {
        Self { tables }
    }

    pub fn from_json_str(raw: &str) -> ImportResult<Self> {
        let config: ImportConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// 指定阶段的表配置（保持配置中的声明顺序）
    pub fn tables_for(&self, stage: ImportStage) -> Vec<&TableConfig> {
        self.tables.iter().filter(|t| t.stage() == stage).collect()
    }

    /// 配置校验
    ///
    /// # 规则
    /// - 表名/列名必须是合法 SQL 标识符
    /// - 目标表不可重复
    /// - 自然键列不可为空
    /// - 价格配置必须有 1~2 个金额字段
    ///
    /// mapRef 指向不存在的 ID 映射桶不在此处拦截,运行时按表级错误处理
    pub fn validate(&self) -> ImportResult<()> {
        let mut tables = HashSet::new();

        for table in &self.tables {
            if table.sheet().trim().is_empty() {
                return Err(ImportError::InvalidConfig(format!(
                    "表 {} 未指定工作表",
                    table.table()
                )));
            }

            for ident in table.identifiers() {
                if !is_valid_identifier(ident) {
                    return Err(ImportError::InvalidConfig(format!(
                        "表 {} 含非法标识符: {:?}",
                        table.table(),
                        ident
                    )));
                }
            }

            if !tables.insert(table.table().to_string()) {
                return Err(ImportError::InvalidConfig(format!(
                    "目标表重复: {}",
                    table.table()
                )));
            }

            match table {
                TableConfig::Reference(c) => validate_code_field(c)?,
                TableConfig::Entity(c) => validate_code_field(&c.base)?,
                TableConfig::RelationMn(c) => {
                    validate_relation_field(&c.table, &c.left)?;
                    validate_relation_field(&c.table, &c.right)?;
                }
                TableConfig::RelationCount(c) => {
                    validate_relation_field(&c.table, &c.left)?;
                    validate_relation_field(&c.table, &c.right)?;
                }
                TableConfig::Price(c) => {
                    validate_relation_field(&c.table, &c.entity)?;
                    if c.price_fields.is_empty() || c.price_fields.len() > 2 {
                        return Err(ImportError::InvalidConfig(format!(
                            "价格表 {} 需要 1~2 个金额字段,实际 {}",
                            c.table,
                            c.price_fields.len()
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

fn validate_code_field(c: &ReferenceConfig) -> ImportResult<()> {
    if c.code_field.column.trim().is_empty() {
        return Err(ImportError::InvalidConfig(format!(
            "表 {} 的自然键列为空",
            c.table
        )));
    }
    Ok(())
}

fn validate_relation_field(table: &str, f: &RelationField) -> ImportResult<()> {
    if f.column.trim().is_empty() || f.map_ref.trim().is_empty() {
        return Err(ImportError::InvalidConfig(format!(
            "关联表 {} 的端点 {} 缺少源列或 mapRef",
            table, f.field
        )));
    }
    Ok(())
}
