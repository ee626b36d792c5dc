//! Column level edits in the metadata editor

use tracing::{debug, instrument, warn};

use super::shared::{popover, sidebar_right, table_interactive};
use crate::driver::{Action, Probe};
use crate::error::Result;
use crate::locator::{Locator, TextMatch};
use crate::session::{ClickOptions, Session};

/// Text of the field that picks the database column a model column maps to
const MAPPING_FIELD_LABEL: &str = "Database column this maps to";

const TYPE_SEARCH_PLACEHOLDER: &str = "Search for a special type";

/// Virtualized list rendering the semantic type options
const VIRTUALIZED_LIST: &str = ".ReactVirtualized__Grid";

/// Database column a model column can be mapped to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pub table: String,
    pub column: String,
}

impl ColumnMapping {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

fn header_cell(column: &str) -> Locator {
    table_interactive()
        .all_by_test_id("header-cell")
        .contains(TextMatch::exact_pattern(column))
}

/// Select a column by clicking its header in the results table
#[instrument(skip(session))]
pub async fn open_column_options(session: &Session, column: &str) -> Result<()> {
    let header = header_cell(column);
    session.scroll_into_view(&header).await?;
    session.should_be_visible(&header).await?;
    // Scrolling can re-render the header row, so query again before clicking
    session.click(&header, ClickOptions::default()).await?;
    Ok(())
}

/// Rename a column through its display name input
#[instrument(skip(session))]
pub async fn rename_column(session: &Session, old_name: &str, new_name: &str) -> Result<()> {
    let input = session
        .get(&Locator::document().display_value(old_name))
        .await?;
    session.act(&input, Action::Clear).await?;
    session
        .act(&input, Action::Type(new_name.to_string()))
        .await?;
    session.act(&input, Action::Blur).await?;
    Ok(())
}

/// Change the selected column's semantic type
#[instrument(skip(session))]
pub async fn set_column_type(session: &Session, old_type: &str, new_type: &str) -> Result<()> {
    let picker = sidebar_right()
        .all_by_test_id("select-button")
        .contains_text(old_type);
    session.click(&picker, ClickOptions::default()).await?;

    // The list keeps its last scroll offset; options past the fold are not
    // rendered until it is back at the top
    let list = popover().text(old_type).closest(VIRTUALIZED_LIST);
    session.scroll_to_top(&list).await?;

    session
        .real_type(&popover().placeholder(TYPE_SEARCH_PLACEHOLDER), new_type)
        .await?;
    session
        .click(&popover().label_text(new_type), ClickOptions::default())
        .await?;
    Ok(())
}

/// Map the selected column to a database column
#[instrument(skip(session), fields(table = %mapping.table, column = %mapping.column))]
pub async fn map_column_to(session: &Session, mapping: &ColumnMapping) -> Result<()> {
    let field = Locator::document()
        .text(MAPPING_FIELD_LABEL)
        .parent()
        .test_id("select-button");

    // The field can sit hidden or covered by a closing overlay, so only
    // existence is required before falling back to a forced click
    let button = session.get(&field).await?;
    let clickable = button.visible && session.settle(&button, Probe::Unobstructed).await?;
    if !clickable {
        warn!(
            "{} is hidden or covered, dispatching the click directly",
            field
        );
    }
    session
        .act(&button, Action::Click { force: !clickable })
        .await?;

    debug!("Picking table {}", mapping.table);
    session
        .click(
            &popover().contains_text(mapping.table.as_str()),
            ClickOptions::default(),
        )
        .await?;
    session
        .click(
            &popover().contains_text(mapping.column.as_str()),
            ClickOptions::default(),
        )
        .await?;
    Ok(())
}
