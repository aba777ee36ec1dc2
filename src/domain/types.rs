// ==========================================
// 配置器导入管道 - 领域类型定义
// ==========================================
// 职责: 运行模式 / 阶段 / 写入策略 / 类型化字段值
// ==========================================

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ==========================================
// 运行模式 (Run Mode)
// ==========================================
// 唯一的外部控制面: 由调用方提供,原样下发到每个阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    FullReload,  // 全量重载: 关联表使用 insert-or-ignore
    Incremental, // 增量对账: 关联表逐行 upsert(替换语义)
}

impl RunMode {
    /// 该模式下关联类表(数量/价格)的默认写入策略
    pub fn default_write_strategy(&self) -> WriteStrategy {
        match self {
            RunMode::FullReload => WriteStrategy::InsertOrIgnore,
            RunMode::Incremental => WriteStrategy::Upsert,
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::FullReload => write!(f, "full-reload"),
            RunMode::Incremental => write!(f, "incremental"),
        }
    }
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "full-reload" | "full_reload" | "full" => Ok(RunMode::FullReload),
            "incremental" | "inc" => Ok(RunMode::Incremental),
            other => Err(format!("未知运行模式: {}（仅支持 full-reload / incremental）", other)),
        }
    }
}

// ==========================================
// 写入策略 (Write Strategy)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WriteStrategy {
    InsertOrIgnore, // 批量插入,自然键冲突的行静默跳过
    Upsert,         // 逐行 upsert,更新负载替换字段值(不累加)
}

// ==========================================
// 导入阶段 (Import Stage)
// ==========================================
// 严格顺序: Reference → Entity → Relation → Done
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportStage {
    ReferenceStage,
    EntityStage,
    RelationStage,
    Done,
}

impl ImportStage {
    /// 下一个阶段（Done 之后仍为 Done）
    pub fn next(&self) -> ImportStage {
        match self {
            ImportStage::ReferenceStage => ImportStage::EntityStage,
            ImportStage::EntityStage => ImportStage::RelationStage,
            ImportStage::RelationStage => ImportStage::Done,
            ImportStage::Done => ImportStage::Done,
        }
    }
}

impl fmt::Display for ImportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportStage::ReferenceStage => write!(f, "REFERENCE_STAGE"),
            ImportStage::EntityStage => write!(f, "ENTITY_STAGE"),
            ImportStage::RelationStage => write!(f, "RELATION_STAGE"),
            ImportStage::Done => write!(f, "DONE"),
        }
    }
}

// ==========================================
// 类型化字段值 (Field Value)
// ==========================================
// 转换函数的输出,也是写入存储的值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Text(String),
    Decimal(Decimal),
}

impl FieldValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "NULL"),
            FieldValue::Boolean(v) => write!(f, "{}", v),
            FieldValue::Integer(v) => write!(f, "{}", v),
            FieldValue::Decimal(v) => write!(f, "{}", v),
            FieldValue::Text(v) => write!(f, "{}", v),
        }
    }
}

/// 写入负载: 列名 → 值（有序,保证生成的 SQL 稳定）
pub type Payload = BTreeMap<String, FieldValue>;

/// 存储分配的代理主键
pub type SurrogateId = i64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_mode_parse() {
        assert_eq!("full-reload".parse::<RunMode>().unwrap(), RunMode::FullReload);
        assert_eq!(" Incremental ".parse::<RunMode>().unwrap(), RunMode::Incremental);
        assert!("append".parse::<RunMode>().is_err());
    }

    #[test]
    fn test_run_mode_write_strategy() {
        assert_eq!(
            RunMode::FullReload.default_write_strategy(),
            WriteStrategy::InsertOrIgnore
        );
        assert_eq!(
            RunMode::Incremental.default_write_strategy(),
            WriteStrategy::Upsert
        );
    }

    #[test]
    fn test_stage_order() {
        let mut stage = ImportStage::ReferenceStage;
        let mut visited = vec![stage];
        while stage != ImportStage::Done {
            stage = stage.next();
            visited.push(stage);
        }
        assert_eq!(
            visited,
            vec![
                ImportStage::ReferenceStage,
                ImportStage::EntityStage,
                ImportStage::RelationStage,
                ImportStage::Done
            ]
        );
    }
}
