pub mod loader;
pub mod schema;

pub use loader::{find_config_path, load_config, quill_home, save_config};
pub use schema::{
    AgentOptions, Config, MemoryConfig, ProviderConfig, ProvidersConfig, DEFAULT_MEMORY_BASE_URL,
    DEFAULT_MODEL, DEFAULT_PROVIDER, DEFAULT_STUDENT_ID, SUPPORTED_AGENT_SCHEMA_VERSIONS,
};
