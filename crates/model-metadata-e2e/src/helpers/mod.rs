//! Helpers for the model metadata editor
//!
//! Each helper is a free function over a [`Session`](crate::Session) and
//! performs one user-level step. They fail on the first command that fails.

mod columns;
mod edit_bar;
mod metadata;
mod shared;

pub use columns::{map_column_to, open_column_options, rename_column, set_column_type, ColumnMapping};
pub use edit_bar::{dataset_edit_bar, save_metadata_changes};
pub use metadata::{map_result_metadata, set_model_metadata};
pub use shared::{popover, sidebar_right, table_interactive};
