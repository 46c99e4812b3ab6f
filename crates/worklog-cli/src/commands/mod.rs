pub mod category;
pub mod config;
pub mod session;
pub mod stats;
pub mod timer;

use worklog_core::{Category, Store, StoreError};

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Look a category up by id or name, failing with `NotFound`.
pub fn find_category(store: &impl Store, key: &str) -> Result<Category, StoreError> {
    let categories = store.list_categories()?;
    worklog_core::category::resolve(&categories, key)
        .cloned()
        .ok_or_else(|| StoreError::NotFound {
            entity: "category",
            id: key.to_string(),
        })
}
