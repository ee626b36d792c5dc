//! Locators shared across application screens

use crate::locator::Locator;

/// Visible popover containers, whichever component library rendered them
pub fn popover() -> Locator {
    Locator::document()
        .css(r#"[data-testid="popover"], [data-element-id="mantine-popover"], .popover[data-state~="visible"]"#)
        .visible()
}

/// The interactive results table
pub fn table_interactive() -> Locator {
    Locator::document().test_id("TableInteractive-root")
}

pub fn sidebar_right() -> Locator {
    Locator::document().test_id("sidebar-right")
}
