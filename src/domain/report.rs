// ==========================================
// 配置器导入管道 - 导入报告
// ==========================================
// 用途: 编排器运行结束后返回给调用方（CLI/日志）
// 说明: "成功"仅代表流程跑完,数据质量看 skipped 计数
// ==========================================

use crate::domain::types::{ImportStage, RunMode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// TableStats - 单表计数
// ==========================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableStats {
    pub seen: usize,       // 读取的行数
    pub skipped: usize,    // 因数据/存储原因丢弃的行（含 unresolved）
    pub duplicates: usize, // 自然键重复,按"首条优先"丢弃
    pub unresolved: usize, // 关联端点未解析（skipped 的子集）
    pub ignored: usize,    // insert-or-ignore 时存储中已存在的行
    pub written: usize,    // 实际写入（创建或更新）的行
}

impl TableStats {
    pub fn merge(&mut self, other: &TableStats) {
        self.seen += other.seen;
        self.skipped += other.skipped;
        self.duplicates += other.duplicates;
        self.unresolved += other.unresolved;
        self.ignored += other.ignored;
        self.written += other.written;
    }
}

// ==========================================
// TableOutcome - 单表结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableOutcome {
    Completed,
    Aborted { reason: String }, // 表级错误: 工作表缺失 / ID 映射桶缺失
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableReport {
    pub table: String,
    pub sheet: String,
    pub outcome: TableOutcome,
    pub stats: TableStats,
}

impl TableReport {
    pub fn completed(table: &str, sheet: &str, stats: TableStats) -> Self {
        Self {
            table: table.to_string(),
            sheet: sheet.to_string(),
            outcome: TableOutcome::Completed,
            stats,
        }
    }

    pub fn aborted(table: &str, sheet: &str, reason: String) -> Self {
        Self {
            table: table.to_string(),
            sheet: sheet.to_string(),
            outcome: TableOutcome::Aborted { reason },
            stats: TableStats::default(),
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self.outcome, TableOutcome::Aborted { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: ImportStage,
    pub tables: Vec<TableReport>,
}

impl StageReport {
    pub fn new(stage: ImportStage) -> Self {
        Self {
            stage,
            tables: Vec::new(),
        }
    }

    pub fn totals(&self) -> TableStats {
        let mut totals = TableStats::default();
        for table in &self.tables {
            totals.merge(&table.stats);
        }
        totals
    }
}

// ==========================================
// ImportReport - 整次运行报告
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub run_id: String,
    pub mode: RunMode,
    pub stages: Vec<StageReport>,
    pub id_map_sizes: BTreeMap<String, usize>,
    pub elapsed_ms: u128,
}

impl ImportReport {
    /// 按目标表名查找单表报告
    pub fn table(&self, table: &str) -> Option<&TableReport> {
        self.stages
            .iter()
            .flat_map(|s| s.tables.iter())
            .find(|t| t.table == table)
    }

    pub fn stage(&self, stage: ImportStage) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    pub fn total_written(&self) -> usize {
        self.stages.iter().map(|s| s.totals().written).sum()
    }

    pub fn total_skipped(&self) -> usize {
        self.stages.iter().map(|s| s.totals().skipped).sum()
    }

    pub fn aborted_tables(&self) -> Vec<&TableReport> {
        self.stages
            .iter()
            .flat_map(|s| s.tables.iter())
            .filter(|t| t.is_aborted())
            .collect()
    }
}
