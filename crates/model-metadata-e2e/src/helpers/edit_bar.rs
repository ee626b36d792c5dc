use tracing::{debug, instrument};

use crate::error::Result;
use crate::locator::Locator;
use crate::session::{ClickOptions, Session};

/// The bar shown at the top of the editor while a model is being edited
pub fn dataset_edit_bar() -> Locator {
    Locator::document().test_id("dataset-edit-bar")
}

/// Click "Save changes" and wait for the metadata update, the editor to
/// close and the results query to rerun, in that order
#[instrument(skip(session))]
pub async fn save_metadata_changes(session: &Session) -> Result<()> {
    session.intercept_if_not_defined("POST", "/api/dataset", "dataset")?;
    session.intercept("PUT", "/api/card/*", "updateModelMetadata")?;

    session
        .click(
            &dataset_edit_bar().button("Save changes"),
            ClickOptions::default(),
        )
        .await?;

    let update = session.wait("updateModelMetadata").await?;
    debug!("Metadata saved with status {:?}", update.status);
    session.should_not_exist(&dataset_edit_bar()).await?;
    session.wait("dataset").await?;
    Ok(())
}
