//! Direct metadata patching over the card API

use tracing::{info, instrument};

use crate::api::{ApiClient, Card, ColumnMetadata};
use crate::error::{HelperError, Result};

/// Apply `f` to every column descriptor, keeping order and length
pub fn map_result_metadata<F>(columns: Vec<ColumnMetadata>, f: F) -> Vec<ColumnMetadata>
where
    F: FnMut(ColumnMetadata) -> ColumnMetadata,
{
    columns.into_iter().map(f).collect()
}

/// Fetch model `model_id`, map `f` over its `result_metadata` and write the
/// result back. Returns the card as the server saved it.
///
/// # Example
///
/// ```no_run
/// use model_metadata_e2e::ApiClient;
/// use model_metadata_e2e::helpers::set_model_metadata;
///
/// # async fn example() -> model_metadata_e2e::Result<()> {
/// let api = ApiClient::new("http://localhost:3000").with_session_token("token");
/// set_model_metadata(&api, 7, |column| {
///     if column.name() == Some("TAX") {
///         column.with_display_name("Tax amount").with_semantic_type(None)
///     } else {
///         column
///     }
/// })
/// .await?;
/// # Ok(())
/// # }
/// ```
#[instrument(skip(api, f))]
pub async fn set_model_metadata<F>(api: &ApiClient, model_id: u64, f: F) -> Result<Card>
where
    F: FnMut(ColumnMetadata) -> ColumnMetadata,
{
    let card = api.get_card(model_id).await?;
    let columns = card
        .result_metadata
        .ok_or(HelperError::MissingMetadata(model_id))?;

    let count = columns.len();
    let updated = map_result_metadata(columns, f);
    let saved = api.update_card_metadata(model_id, &updated).await?;
    info!("Updated metadata of {} columns on model {}", count, model_id);
    Ok(saved)
}
