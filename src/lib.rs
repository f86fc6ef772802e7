//! Material inventory ledger: materials with a running weighted-average cost,
//! the purchases that feed them, and read-only stock and history views.

pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod model;
pub mod report;

pub use db::{BlobStore, Database, MemoryStore};
pub use error::{LedgerError, Result};
pub use ledger::{Ledger, RemovePolicy, RemovedMaterial};
pub use model::{Material, Purchase, StockSummary};
