// ==========================================
// 配置器导入管道 - 行映射器
// ==========================================
// 职责: 源列 → 目标字段映射 + 值转换,产出创建/更新两份负载
// 规则:
// - 自然键按原始单元格值写入创建负载,不做转换,永不进入更新负载
// - 值转换为 None 时使用字段默认值；valueField 仍为空则整行无效
// - activeField 缺省为 true
// - touchField 在两份负载中都写入本次运行时间
// ==========================================

use crate::config::import_config::{FieldMapping, ReferenceConfig};
use crate::domain::types::{FieldValue, Payload};
use crate::domain::workbook::Row;
use crate::importer::id_maps::normalize_key;
use crate::importer::transform::{Transform, TransformContext};

/// 读取并转换单个字段（空单元格不经过转换,直接走默认值）
pub fn map_field(mapping: &FieldMapping, row: &Row, ctx: &TransformContext<'_>) -> Option<FieldValue> {
    let raw = row.get(&mapping.column);
    let value = if raw.is_empty() {
        None
    } else {
        mapping.transform.unwrap_or(Transform::Text).apply(raw, ctx)
    };
    value.or_else(|| mapping.default.clone())
}

/// 行被拒绝的原因（行级,只计数不报错）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowRejection {
    InvalidValue { field: String },
}

// ==========================================
// MappedRow - 映射结果
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct MappedRow {
    pub row_number: usize,
    pub key: String,              // 归一化自然键
    pub name_key: Option<String>, // 归一化名称（名称索引用）
    pub sku_key: Option<String>,  // 归一化 SKU（实体唯一性检查用）
    pub create: Payload,
    pub update: Payload,
}

// ==========================================
// RowMapper - 参考/实体表行映射
// ==========================================
pub struct RowMapper<'a> {
    config: &'a ReferenceConfig,
    sku_field: Option<&'a FieldMapping>,
    touched_at: &'a str,
}

impl<'a> RowMapper<'a> {
    pub fn new(config: &'a ReferenceConfig, touched_at: &'a str) -> Self {
        Self {
            config,
            sku_field: None,
            touched_at,
        }
    }

    pub fn with_sku(mut self, sku_field: Option<&'a FieldMapping>) -> Self {
        self.sku_field = sku_field;
        self
    }

    pub fn table(&self) -> &str {
        &self.config.table
    }

    pub fn key_field(&self) -> &str {
        &self.config.code_field.field
    }

    /// 读取自然键: (原始值, 归一化值)；空值返回 None
    pub fn natural_key(&self, row: &Row) -> Option<(String, String)> {
        let raw = row.get(&self.config.code_field.column).as_raw_string()?;
        let normalized = normalize_key(&raw);
        if normalized.is_empty() {
            return None;
        }
        Some((raw, normalized))
    }

    /// 构建创建/更新负载
    pub fn map(&self, row: &Row, key_raw: &str, key: &str) -> Result<MappedRow, RowRejection> {
        let table = self.table();
        let mut create = Payload::new();
        let mut update = Payload::new();

        // 自然键（仅创建负载）
        create.insert(
            self.config.code_field.field.clone(),
            FieldValue::Text(key_raw.to_string()),
        );

        let mut put = |field: &str, value: FieldValue| {
            create.insert(field.to_string(), value.clone());
            update.insert(field.to_string(), value);
        };

        // 名称
        let mut name_key = None;
        if let Some(mapping) = &self.config.name_field {
            let ctx = TransformContext::new(table, key_raw, &mapping.field);
            if let Some(value) = map_field(mapping, row, &ctx) {
                if let FieldValue::Text(name) = &value {
                    name_key = Some(normalize_key(name)).filter(|n| !n.is_empty());
                }
                put(&mapping.field, value);
            }
        }

        // 值字段（必填）
        if let Some(mapping) = &self.config.value_field {
            let ctx = TransformContext::new(table, key_raw, &mapping.field);
            match map_field(mapping, row, &ctx) {
                Some(value) => put(&mapping.field, value),
                None => {
                    return Err(RowRejection::InvalidValue {
                        field: mapping.field.clone(),
                    })
                }
            }
        }

        // 启用标记（缺省 true）
        if let Some(mapping) = &self.config.active_field {
            let ctx = TransformContext::new(table, key_raw, &mapping.field);
            let value = map_field(mapping, row, &ctx).unwrap_or(FieldValue::Boolean(true));
            put(&mapping.field, value);
        }

        // 其他可选字段: 转换失败只跳过该字段
        for mapping in &self.config.other_fields {
            let ctx = TransformContext::new(table, key_raw, &mapping.field);
            if let Some(value) = map_field(mapping, row, &ctx) {
                put(&mapping.field, value);
            }
        }

        // SKU
        let mut sku_key = None;
        if let Some(mapping) = self.sku_field {
            let ctx = TransformContext::new(table, key_raw, &mapping.field);
            if let Some(value) = map_field(mapping, row, &ctx) {
                sku_key = Some(normalize_key(&value.to_string())).filter(|s| !s.is_empty());
                put(&mapping.field, value);
            }
        }

        if let Some(touch) = &self.config.touch_field {
            put(touch, FieldValue::Text(self.touched_at.to_string()));
        }

        Ok(MappedRow {
            row_number: row.row_number,
            key: key.to_string(),
            name_key,
            sku_key,
            create,
            update,
        })
    }
}
