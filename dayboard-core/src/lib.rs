//! Dayboard core library: the status model and its stores.
//!
//! - [`types`]: newtypes, templates, status rows, change events
//! - [`projector`]: template-to-date projection and flag parsing
//! - [`snapshot`]: baseline snapshots and day stats
//! - [`store`] / [`file_store`]: the status store port and its backends
//! - [`config`]: optional `config.yaml`
//! - [`export`]: CSV renderings

pub mod config;
pub mod error;
pub mod export;
pub mod file_store;
pub mod projector;
pub mod seed;
pub mod snapshot;
pub mod store;
pub mod types;

pub use config::BoardConfig;
pub use error::{ConfigError, CoreError, ProjectionError, StoreError};
pub use file_store::FileStatusStore;
pub use projector::{parse_must_review, project_templates, project_timestamp, TimeOfDay};
pub use store::{MemoryStatusStore, StatusStore};
pub use types::{
    BoardDate, ChangeEvent, DailyStatus, DaySnapshot, DayStats, ScheduledTask, StatusChange,
    StatusEntry, TaskId, TaskTemplate, TemplateRecord,
};
