//! Column selection with a URL size budget

use log::warn;

use crate::api::constants::MAX_SELECT_PARAM_SIZE;

/// Ordered set of columns to request.
///
/// When the encoded list would exceed the byte budget the selection is dropped and
/// the service returns every column instead.
#[derive(Debug, Clone)]
pub struct SelectSpec {
    columns: Vec<String>,
    max_bytes: usize,
}

impl SelectSpec {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ordered: Vec<String> = Vec::new();
        for column in columns {
            let column = column.into();
            if !ordered.contains(&column) {
                ordered.push(column);
            }
        }

        Self {
            columns: ordered,
            max_bytes: MAX_SELECT_PARAM_SIZE,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Value for `$select`, or `None` when empty or over budget
    pub fn to_param(&self) -> Option<String> {
        if self.columns.is_empty() {
            return None;
        }

        let joined = self.columns.join(",");
        if joined.len() > self.max_bytes {
            warn!(
                "$select of {} columns is {} bytes (limit {}), requesting all columns",
                self.columns.len(),
                joined.len(),
                self.max_bytes
            );
            return None;
        }

        Some(joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns_keep_order_without_duplicates() {
        let select = SelectSpec::new(["name", "accountid", "name", "modifiedon"]);
        assert_eq!(select.columns(), ["name", "accountid", "modifiedon"]);
        assert_eq!(select.to_param(), Some("name,accountid,modifiedon".to_string()));
    }

    #[test]
    fn test_over_budget_is_dropped() {
        let select = SelectSpec::new(["accountid", "modifiedon"]).with_max_bytes(10);
        assert_eq!(select.to_param(), None);
    }

    #[test]
    fn test_exactly_at_budget_is_kept() {
        let select = SelectSpec::new(["abcd", "efgh"]).with_max_bytes(9);
        assert_eq!(select.to_param(), Some("abcd,efgh".to_string()));
    }

    #[test]
    fn test_default_budget() {
        let many: Vec<String> = (0..200).map(|i| format!("new_customfield{:03}", i)).collect();
        assert_eq!(SelectSpec::new(many).to_param(), None);
    }

    #[test]
    fn test_empty_selection_has_no_param() {
        assert_eq!(SelectSpec::new(Vec::<String>::new()).to_param(), None);
    }
}
