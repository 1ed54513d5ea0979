//! Grade-cell write protection.
//!
//! A cell that already holds a finalized grade must not be overwritten by a
//! later grading run. Only blank cells, failure marks and questionable marks
//! are open for writing.

use serde::Serialize;

use crate::messages::{Catalog, Notice};

/// Token written when CI failed.
pub const FAILED_MARK: &str = "x";

/// Token for a grade that could not be determined.
pub const UNKNOWN_MARK: &str = "?";

/// Any value starting with this prefix is questionable and may be replaced.
pub const QUESTIONABLE_PREFIX: &str = "?";

/// Whether a grade cell holding `current` may be overwritten.
pub fn can_overwrite_cell(current: &str) -> bool {
    let value = current.trim();
    value.is_empty()
        || value == FAILED_MARK
        || value == UNKNOWN_MARK
        || value.starts_with(QUESTIONABLE_PREFIX)
}

/// Decision about writing `new_value` over a cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GradeUpdate {
    pub allowed: bool,
    pub previous_value: String,
    /// The value to write; `None` when the write is refused.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_value: Option<String>,
}

pub fn prepare_grade_update(current: &str, new_value: &str) -> GradeUpdate {
    let allowed = can_overwrite_cell(current);
    GradeUpdate {
        allowed,
        previous_value: current.to_string(),
        new_value: allowed.then(|| new_value.to_string()),
    }
}

/// Message shown when a protected cell refuses a write.
pub fn format_cell_protection_message(current: &str, catalog: &Catalog) -> String {
    catalog.render(&Notice::CellProtected {
        current: current.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::Locale;
    use crate::taskid::WRONG_TASKID_MARK;

    #[test]
    fn open_values() {
        for value in ["", "   ", "x", " x ", "?", "?anything", WRONG_TASKID_MARK] {
            assert!(can_overwrite_cell(value), "{value:?} should be overwritable");
        }
    }

    #[test]
    fn finalized_grades_are_protected() {
        for value in ["v", "v-5", "v@10.5", "X", "5", "xx"] {
            assert!(!can_overwrite_cell(value), "{value:?} should be protected");
        }
    }

    #[test]
    fn prepare_update_carries_new_value_only_when_allowed() {
        let ok = prepare_grade_update("", "v");
        assert!(ok.allowed);
        assert_eq!(ok.new_value.as_deref(), Some("v"));

        let refused = prepare_grade_update("v", "v-2");
        assert!(!refused.allowed);
        assert_eq!(refused.previous_value, "v");
        assert_eq!(refused.new_value, None);

        let replaced = prepare_grade_update(WRONG_TASKID_MARK, "v");
        assert!(replaced.allowed);
    }

    #[test]
    fn protection_message_quotes_current_value() {
        let ru = format_cell_protection_message("v-1", &Catalog::new(Locale::Ru));
        assert!(ru.contains("'v-1'"));
        assert!(ru.contains("преподавателю"));

        let en = format_cell_protection_message("v", &Catalog::new(Locale::En));
        assert!(en.contains("'v'"));
    }
}
