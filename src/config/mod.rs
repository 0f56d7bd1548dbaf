pub mod loader;
pub mod schema;

pub use loader::{get_config_path, get_db_path, load_config, save_config};
pub use schema::{
    CacheConfig, Config, GuardConfig, PerceptionConfig, ReminderConfig, StorageConfig,
};
