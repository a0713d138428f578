pub mod config_service;
pub mod json_dir_context_store;
pub mod memory_context_store;
pub mod report_store;

pub use config_service::{AduanaConfig, ConfigService, PlannerConfig};
pub use json_dir_context_store::JsonDirContextStore;
pub use memory_context_store::MemoryContextStore;
pub use report_store::ReportStore;
