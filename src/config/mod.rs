// ==========================================
// 配置器导入管道 - 配置层
// ==========================================
// 职责:
// - 表配置（配置即数据）: 每张可导入表的声明式描述
// - 运行参数: config_kv 表读取,带默认值
// ==========================================

pub mod catalog_config;
pub mod config_manager;
pub mod import_config;
pub mod import_config_trait;

// 重导出核心配置类型
pub use catalog_config::default_catalog;
pub use config_manager::{config_keys, ConfigManager, ImportSettings};
pub use import_config::{
    EntityConfig, FieldMapping, ImportConfig, MapKey, PersistAs, PriceConfig, ReferenceConfig,
    RelationCountConfig, RelationField, RelationMnConfig, TableConfig,
};
pub use import_config_trait::ImportConfigReader;
