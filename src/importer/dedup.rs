// ==========================================
// 配置器导入管道 - 工作表内去重
// ==========================================
// 规则: 同一工作表内自然键重复时"首条优先",后续重复行静默丢弃（计数）
// 约束: 标记必须在派发写入之前、按行序同步完成,
//       这样慢的重复写入不可能越过去重检查
// ==========================================

use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;

// ==========================================
// CompositeKey - 关联行的组合去重键
// ==========================================
// 各端点的归一化键按端点顺序保存,不拼接成单个字符串
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompositeKey(Vec<String>);

impl CompositeKey {
    pub fn new(parts: Vec<String>) -> Self {
        Self(parts)
    }
}

/// 仅用于日志与诊断上下文
impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(" / "))
    }
}

// ==========================================
// SeenKeys - 已见键集合（单表单次运行）
// ==========================================
#[derive(Debug, Clone)]
pub struct SeenKeys<K = String> {
    keys: HashSet<K>,
}

impl<K> Default for SeenKeys<K> {
    fn default() -> Self {
        Self {
            keys: HashSet::new(),
        }
    }
}

impl<K: Eq + Hash + Clone> SeenKeys<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 标记键；首次出现返回 true,重复返回 false
    pub fn mark(&mut self, key: &K) -> bool {
        if self.keys.contains(key) {
            return false;
        }
        self.keys.insert(key.clone())
    }

    /// 撤销标记（行无效或写入失败时）,让后续同键的行或下次运行不被挡住
    pub fn unmark(&mut self, key: &K) {
        self.keys.remove(key);
    }
}
