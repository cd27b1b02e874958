//! smk-core
//!
//! Migration reconciliation and execution engine.
//!
//! - `plan`: which changes to apply or revert for a requested target state.
//!   Deterministic, pure logic. No IO.
//! - `driver`: one operation per transaction; the bookkeeping row is written
//!   in the same transaction as the change body.
//! - `migrator`: lock bracket + mode sequencing (up / down / to) + preview.
//!
//! The catalog reader and the backend adapter are collaborators injected
//! through the [`Catalog`] and [`Backend`] traits.

mod backend;
mod catalog;
mod driver;
mod error;
mod events;
mod migrator;
mod plan;
mod types;

pub use backend::{
    validate_table_name, Backend, BackendConfig, Transaction, DEFAULT_LOCK_KEY, DEFAULT_TABLE,
};
pub use catalog::Catalog;
pub use driver::{runnable_body, Driver};
pub use error::{ExecStage, MigrateError, MigrateResult};
pub use events::{EventSink, MigrationEvent, TracingSink};
pub use migrator::Migrator;
pub use plan::{plan_down, plan_status, plan_to, plan_up};
pub use types::*;
