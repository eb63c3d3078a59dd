pub mod api;
pub mod client;
#[cfg(test)]
pub(crate) mod fake;
pub mod types;

pub use api::{fetch_work_items, ApiError, TestManagementApi, WORK_ITEM_BATCH_LIMIT};
pub use client::AzureDevOpsClient;
pub use types::*;
