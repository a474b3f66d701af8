use crate::cache::CacheConfig;
use std::time::Duration;

/// Engine configuration
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | DB_PATH | tableside.db | SQLite 数据库路径 |
/// | ENTITY_CACHE_TTL_SECS | 300 | 单实体缓存 TTL |
/// | ACTIVE_LIST_CACHE_TTL_SECS | 30 | 单桌活跃列表缓存 TTL |
/// | ALL_ACTIVE_CACHE_TTL_SECS | 15 | 全局活跃列表缓存 TTL |
///
/// List caches go stale faster than single-entity caches, so their TTLs
/// default shorter and are tunable independently.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite 数据库文件路径
    pub db_path: String,
    /// 单实体缓存 TTL（秒）
    pub entity_cache_ttl_secs: u64,
    /// 单桌活跃列表缓存 TTL（秒）
    pub active_list_cache_ttl_secs: u64,
    /// 全局活跃列表缓存 TTL（秒）
    pub all_active_cache_ttl_secs: u64,
}

impl Config {
    /// 从环境变量加载配置，未设置时使用默认值
    pub fn from_env() -> Self {
        Self {
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "tableside.db".into()),
            entity_cache_ttl_secs: env_u64("ENTITY_CACHE_TTL_SECS", 300),
            active_list_cache_ttl_secs: env_u64("ACTIVE_LIST_CACHE_TTL_SECS", 30),
            all_active_cache_ttl_secs: env_u64("ALL_ACTIVE_CACHE_TTL_SECS", 15),
        }
    }

    /// Cache TTLs derived from this config.
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            entity_ttl: Duration::from_secs(self.entity_cache_ttl_secs),
            active_list_ttl: Duration::from_secs(self.active_list_cache_ttl_secs),
            all_active_ttl: Duration::from_secs(self.all_active_cache_ttl_secs),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: "tableside.db".into(),
            entity_cache_ttl_secs: 300,
            active_list_cache_ttl_secs: 30,
            all_active_cache_ttl_secs: 15,
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
