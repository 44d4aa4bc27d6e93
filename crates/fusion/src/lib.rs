//! `ledgerfuse-fusion`: revenue and expense fusion over UN-system
//! financial sources.
//!
//! Sources are fused per (entity, year) and then validated against the
//! reported totals. No CLI.

pub mod config;
pub mod engine;
pub mod error;
pub mod expense;
pub mod model;
pub mod normalize;
pub mod reference;
pub mod revenue;
pub mod rollup;
pub mod roster;
pub mod source;
pub mod tier;
pub mod validate;

pub use config::{FusionConfig, RunKind};
pub use engine::{run_expenses, run_revenue};
pub use error::FusionError;
pub use model::{ExpenseRun, FusedContributionRecord, FusedExpenseRecord, RevenueRun};
pub use normalize::Normalizer;
pub use reference::ReferenceTables;
pub use tier::{TierPolicy, TierSelector};
pub use validate::ValidationSummary;
