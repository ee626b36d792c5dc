//! Element locators
//!
//! A [`Locator`] is an ordered chain of query steps starting at the document.
//! Each step is applied to the set of elements produced by the previous one:
//!
//! ```
//! use model_metadata_e2e::locator::{Locator, TextMatch};
//!
//! let save = Locator::document()
//!     .test_id("dataset-edit-bar")
//!     .button("Save changes");
//! assert_eq!(
//!     save.to_string(),
//!     r#"test_id("dataset-edit-bar") > button("Save changes")"#
//! );
//!
//! let header = Locator::document()
//!     .all_by_test_id("header-cell")
//!     .contains(TextMatch::exact_pattern("Tax"));
//! assert_eq!(header.to_string(), r#"all_by_test_id("header-cell") > contains(/^Tax$/)"#);
//! ```
//!
//! Locators are plain data. Resolution happens in the driver, which
//! serializes the steps with [`Locator::to_json`].

use serde::Serialize;
use std::fmt;

use crate::error::{HelperError, Result};

/// How text content is compared. Text is whitespace-normalized before
/// comparison (trimmed, inner runs collapsed to one space).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum TextMatch {
    /// Whole text equals the value
    Exact(String),
    /// Text contains the value
    Substring(String),
    /// Text matches the regular expression source
    Pattern(String),
}

impl TextMatch {
    /// Validated regular expression match
    pub fn pattern(source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        regex::Regex::new(&source).map_err(|e| HelperError::InvalidPattern {
            pattern: source.clone(),
            reason: e.to_string(),
        })?;
        Ok(TextMatch::Pattern(source))
    }

    /// Anchored pattern matching `text` literally, i.e. `^text$`
    pub fn exact_pattern(text: &str) -> Self {
        TextMatch::Pattern(format!("^{}$", regex::escape(text)))
    }

    /// Evaluate against already-normalized text.
    ///
    /// Mirrors what the in-page resolver does, so fakes and the browser agree.
    pub fn matches(&self, text: &str) -> bool {
        let text = normalize_text(text);
        match self {
            TextMatch::Exact(value) => text == normalize_text(value),
            TextMatch::Substring(value) => text.contains(value.as_str()),
            TextMatch::Pattern(source) => regex::Regex::new(source)
                .map(|re| re.is_match(&text))
                .unwrap_or(false),
        }
    }
}

impl fmt::Display for TextMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextMatch::Exact(value) => write!(f, "={:?}", value),
            TextMatch::Substring(value) => write!(f, "{:?}", value),
            TextMatch::Pattern(source) => write!(f, "/{}/", source),
        }
    }
}

/// Trim and collapse whitespace runs, matching the resolver script
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A single query step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    /// Descendants with `data-testid`; unique unless `all`
    TestId { id: String, all: bool },
    /// Descendant whose own text equals the value
    Text { text: String },
    /// Form control whose current value equals the value
    DisplayValue { value: String },
    /// Descendant with the placeholder attribute
    Placeholder { text: String },
    /// Control labelled by a `<label>` or `aria-label`
    LabelText { text: String },
    /// Button (element or role) with the accessible name
    Button { name: String },
    /// Descendants matching a CSS selector
    Css { selector: String },
    /// First, deepest element of the subject (inclusive) whose text matches
    Contains { matcher: TextMatch },
    /// Nearest inclusive ancestor matching a CSS selector
    Closest { selector: String },
    /// Parent element
    Parent,
    /// Keep only rendered, visible elements
    Visible,
}

impl Step {
    /// Whether more than one match is an error
    pub fn is_single(&self) -> bool {
        matches!(
            self,
            Step::TestId { all: false, .. }
                | Step::Text { .. }
                | Step::DisplayValue { .. }
                | Step::Placeholder { .. }
                | Step::LabelText { .. }
                | Step::Button { .. }
        )
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::TestId { id, all: false } => write!(f, "test_id({:?})", id),
            Step::TestId { id, all: true } => write!(f, "all_by_test_id({:?})", id),
            Step::Text { text } => write!(f, "text({:?})", text),
            Step::DisplayValue { value } => write!(f, "display_value({:?})", value),
            Step::Placeholder { text } => write!(f, "placeholder({:?})", text),
            Step::LabelText { text } => write!(f, "label_text({:?})", text),
            Step::Button { name } => write!(f, "button({:?})", name),
            Step::Css { selector } => write!(f, "css({:?})", selector),
            Step::Contains { matcher } => write!(f, "contains({})", matcher),
            Step::Closest { selector } => write!(f, "closest({:?})", selector),
            Step::Parent => f.write_str("parent()"),
            Step::Visible => f.write_str("visible()"),
        }
    }
}

/// Chain of query steps rooted at the document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Locator {
    steps: Vec<Step>,
}

impl Locator {
    /// The document root; resolves to `<body>` when used as is
    pub fn document() -> Self {
        Self::default()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    fn push(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn test_id(self, id: impl Into<String>) -> Self {
        self.push(Step::TestId {
            id: id.into(),
            all: false,
        })
    }

    pub fn all_by_test_id(self, id: impl Into<String>) -> Self {
        self.push(Step::TestId {
            id: id.into(),
            all: true,
        })
    }

    pub fn text(self, text: impl Into<String>) -> Self {
        self.push(Step::Text { text: text.into() })
    }

    pub fn display_value(self, value: impl Into<String>) -> Self {
        self.push(Step::DisplayValue {
            value: value.into(),
        })
    }

    pub fn placeholder(self, text: impl Into<String>) -> Self {
        self.push(Step::Placeholder { text: text.into() })
    }

    pub fn label_text(self, text: impl Into<String>) -> Self {
        self.push(Step::LabelText { text: text.into() })
    }

    pub fn button(self, name: impl Into<String>) -> Self {
        self.push(Step::Button { name: name.into() })
    }

    pub fn css(self, selector: impl Into<String>) -> Self {
        self.push(Step::Css {
            selector: selector.into(),
        })
    }

    pub fn contains(self, matcher: TextMatch) -> Self {
        self.push(Step::Contains { matcher })
    }

    /// Shorthand for `contains(TextMatch::Substring(text))`
    pub fn contains_text(self, text: impl Into<String>) -> Self {
        self.contains(TextMatch::Substring(text.into()))
    }

    pub fn closest(self, selector: impl Into<String>) -> Self {
        self.push(Step::Closest {
            selector: selector.into(),
        })
    }

    pub fn parent(self) -> Self {
        self.push(Step::Parent)
    }

    pub fn visible(self) -> Self {
        self.push(Step::Visible)
    }

    /// Steps as the JSON array consumed by the in-page resolver
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(&self.steps)?)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return f.write_str("document");
        }
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str(" > ")?;
            }
            write!(f, "{}", step)?;
        }
        Ok(())
    }
}
