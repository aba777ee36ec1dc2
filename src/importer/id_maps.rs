// ==========================================
// 配置器导入管道 - ID 解析映射
// ==========================================
// 每种可引用实体一个桶: 归一化自然键 → 代理主键
// 生命周期:
// - 运行开始时为空
// - 参考/实体阶段处理某表时创建该表的桶并写入（桶由该阶段独占）
// - 关联阶段只读（以 &IdMaps 传入,类型上即冻结）
// 不变量: 同一 (实体, 键) 在一次运行中至多写入一次
// ==========================================

use crate::config::import_config::MapKey;
use crate::domain::types::SurrogateId;
use std::collections::{BTreeMap, HashMap};

/// 自然键归一化: 去首尾空白 + 小写
pub fn normalize_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}

// ==========================================
// IdBucket - 单实体的映射
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct IdBucket {
    by_code: HashMap<String, SurrogateId>,
    by_name: HashMap<String, SurrogateId>, // mapKey = name 时使用,首个名称优先
}

impl IdBucket {
    /// 写入自然键映射；键已存在时不覆盖并返回 false
    pub fn insert_code(&mut self, normalized_key: String, id: SurrogateId) -> bool {
        if self.by_code.contains_key(&normalized_key) {
            return false;
        }
        self.by_code.insert(normalized_key, id);
        true
    }

    /// 写入名称索引；名称已存在时不覆盖并返回 false
    pub fn insert_name(&mut self, normalized_name: String, id: SurrogateId) -> bool {
        if self.by_name.contains_key(&normalized_name) {
            return false;
        }
        self.by_name.insert(normalized_name, id);
        true
    }

    pub fn get(&self, map_key: MapKey, normalized: &str) -> Option<SurrogateId> {
        match map_key {
            MapKey::Code => self.by_code.get(normalized).copied(),
            MapKey::Name => self.by_name.get(normalized).copied(),
        }
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }
}

// ==========================================
// IdMaps - 全部实体的映射
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct IdMaps {
    buckets: HashMap<String, IdBucket>,
}

impl IdMaps {
    pub fn new() -> Self {
        Self::default()
    }

    /// 取得（必要时创建）实体的桶,供所属阶段写入
    pub fn bucket_mut(&mut self, entity: &str) -> &mut IdBucket {
        self.buckets.entry(entity.to_string()).or_default()
    }

    pub fn bucket(&self, entity: &str) -> Option<&IdBucket> {
        self.buckets.get(entity)
    }

    pub fn contains_bucket(&self, entity: &str) -> bool {
        self.buckets.contains_key(entity)
    }

    /// 解析原始键: 先归一化再查表
    pub fn resolve(&self, entity: &str, map_key: MapKey, raw: &str) -> Option<SurrogateId> {
        self.bucket(entity)
            .and_then(|b| b.get(map_key, &normalize_key(raw)))
    }

    /// 每个桶的条目数（按实体名排序）
    pub fn sizes(&self) -> BTreeMap<String, usize> {
        self.buckets
            .iter()
            .map(|(entity, bucket)| (entity.clone(), bucket.len()))
            .collect()
    }
}
