use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("material name must not be empty")]
    EmptyName,
    #[error("material already registered: {name}")]
    DuplicateName { name: String },
    #[error("unknown material id {id}")]
    UnknownMaterial { id: i64 },
    #[error("unknown purchase id {id}")]
    UnknownPurchase { id: i64 },
    #[error("material {id} is referenced by {purchases} purchase(s)")]
    MaterialInUse { id: i64, purchases: usize },
    #[error("weight must be a positive number of kilograms, got {weight}")]
    InvalidWeight { weight: f64 },
    #[error("price per kg must be a non-negative number, got {price}")]
    InvalidPrice { price: f64 },
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("storage lock poisoned")]
    Lock,
}
