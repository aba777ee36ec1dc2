// ==========================================
// 配置器导入管道 - 值转换函数库
// ==========================================
// 契约: (原始值, 上下文) -> 类型化值 | None
// - None: 可选字段 → 跳过该字段；必填字段 → 跳过该行
// - 全函数: 不 panic、不返回 Err,结果只取决于输入
// - 上下文仅用于诊断日志,不参与控制流
// ==========================================

use crate::domain::types::FieldValue;
use crate::domain::workbook::CellValue;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// 金额字段默认保留的小数位
pub const DEFAULT_DECIMAL_SCALE: u32 = 2;

fn default_scale() -> u32 {
    DEFAULT_DECIMAL_SCALE
}

// ==========================================
// TransformContext - 诊断上下文
// ==========================================
#[derive(Debug, Clone)]
pub struct TransformContext<'a> {
    pub table: &'a str,
    pub row_key: &'a str,
    pub field: &'a str,
}

impl<'a> TransformContext<'a> {
    pub fn new(table: &'a str, row_key: &'a str, field: &'a str) -> Self {
        Self {
            table,
            row_key,
            field,
        }
    }
}

impl fmt::Display for TransformContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}].{}", self.table, self.row_key, self.field)
    }
}

// ==========================================
// Transform - 封闭的转换函数集合
// ==========================================
// 配置中按名字引用: {"kind": "integer", "rejectNegative": true}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Transform {
    /// 文本: 去首尾空白,空串视为 None
    Text,
    /// 文本转大写
    Uppercase,
    /// 布尔: 接受常见的真/假文本与数字编码
    Boolean,
    /// 整数: 可选拒绝负数 / 零
    Integer {
        #[serde(default, rename = "rejectNegative")]
        reject_negative: bool,
        #[serde(default, rename = "rejectZero")]
        reject_zero: bool,
    },
    /// 定点小数（金额）
    Decimal {
        #[serde(default = "default_scale")]
        scale: u32,
    },
}

impl Transform {
    /// 正整数（数量字段）
    pub fn positive_integer() -> Self {
        Transform::Integer {
            reject_negative: true,
            reject_zero: true,
        }
    }

    pub fn money() -> Self {
        Transform::Decimal {
            scale: DEFAULT_DECIMAL_SCALE,
        }
    }

    pub fn apply(&self, raw: &CellValue, ctx: &TransformContext<'_>) -> Option<FieldValue> {
        let result = match self {
            Transform::Text => to_text(raw).map(FieldValue::Text),
            Transform::Uppercase => to_text(raw).map(|s| FieldValue::Text(s.to_uppercase())),
            Transform::Boolean => to_bool(raw).map(FieldValue::Boolean),
            Transform::Integer {
                reject_negative,
                reject_zero,
            } => to_integer(raw)
                .filter(|v| !(*reject_negative && *v < 0))
                .filter(|v| !(*reject_zero && *v == 0))
                .map(FieldValue::Integer),
            Transform::Decimal { scale } => to_decimal(raw, *scale).map(FieldValue::Decimal),
        };

        if result.is_none() && !raw.is_empty() {
            debug!(context = %ctx, raw = %raw, transform = ?self, "值转换未通过");
        }
        result
    }
}

// ==========================================
// 转换实现
// ==========================================

fn to_text(raw: &CellValue) -> Option<String> {
    raw.as_raw_string()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn to_bool(raw: &CellValue) -> Option<bool> {
    match raw {
        CellValue::Empty => None,
        CellValue::Bool(v) => Some(*v),
        CellValue::Int(v) => match v {
            0 => Some(false),
            1 => Some(true),
            _ => None,
        },
        CellValue::Float(v) => {
            if *v == 0.0 {
                Some(false)
            } else if *v == 1.0 {
                Some(true)
            } else {
                None
            }
        }
        CellValue::Text(s) => match s.trim().to_lowercase().as_str() {
            "1" | "true" | "t" | "yes" | "y" | "x" | "on" | "是" => Some(true),
            "0" | "false" | "f" | "no" | "n" | "off" | "否" => Some(false),
            _ => None,
        },
    }
}

fn to_integer(raw: &CellValue) -> Option<i64> {
    match raw {
        CellValue::Int(v) => Some(*v),
        CellValue::Float(v) => float_to_integer(*v),
        CellValue::Text(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().and_then(float_to_integer))
        }
        CellValue::Empty | CellValue::Bool(_) => None,
    }
}

fn float_to_integer(v: f64) -> Option<i64> {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
        Some(v as i64)
    } else {
        None
    }
}

fn to_decimal(raw: &CellValue, scale: u32) -> Option<Decimal> {
    let value = match raw {
        CellValue::Int(v) => Some(Decimal::from(*v)),
        CellValue::Float(v) => Decimal::from_f64(*v),
        CellValue::Text(s) => parse_decimal_text(s),
        CellValue::Empty | CellValue::Bool(_) => None,
    }?;
    Some(value.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero))
}

/// 解析金额文本: 去掉货币符号与空白后按分隔符形态归一化
///
/// - 同时出现 ',' 和 '.': 靠后的一个是小数点,另一个是千分位
/// - 只有 ',': 每组 3 位时是千分位 ("1,234,567")；唯一一个 ',' 后跟 1~2 位时是小数点 ("12,5")
/// - 其余形态无法判定,返回 None
fn parse_decimal_text(s: &str) -> Option<Decimal> {
    let cleaned: String = s
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '$' | '€' | '£' | '¥'))
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let normalized = match (cleaned.rfind(','), cleaned.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(_), None) if is_thousands_grouped(&cleaned) => cleaned.replace(',', ""),
        (Some(comma), None) => {
            let fraction = &cleaned[comma + 1..];
            if cleaned.matches(',').count() == 1 && (1..=2).contains(&fraction.len()) {
                cleaned.replace(',', ".")
            } else {
                return None;
            }
        }
        (None, _) => cleaned,
    };
    Decimal::from_str(&normalized).ok()
}

/// 整数部分形如 "1,234,567": 首组 1~3 位数字,其后每组恰好 3 位
fn is_thousands_grouped(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    let mut groups = digits.split(',');
    let head_ok = groups
        .next()
        .map(|g| (1..=3).contains(&g.len()) && g.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false);
    head_ok && groups.all(|g| g.len() == 3 && g.chars().all(|c| c.is_ascii_digit()))
}
