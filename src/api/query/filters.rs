//! OData filter building
//!
//! Provides type-safe filter construction for `$filter` expressions

#[derive(Debug, Clone)]
pub enum Filter {
    /// `field ge value`
    Ge(String, FilterValue),
}

#[derive(Debug, Clone)]
pub enum FilterValue {
    /// Timestamp literal, written unquoted as OData expects for `Edm.DateTimeOffset`
    DateTime(String),
}

impl Filter {
    pub fn ge(field: impl Into<String>, value: FilterValue) -> Self {
        Self::Ge(field.into(), value)
    }

    /// Convert to OData filter string
    pub fn to_odata_string(&self) -> String {
        match self {
            Filter::Ge(field, value) => format!("{} ge {}", field, value.to_odata_string()),
        }
    }
}

impl FilterValue {
    pub fn datetime(value: impl Into<String>) -> Self {
        Self::DateTime(value.into())
    }

    pub fn to_odata_string(&self) -> String {
        match self {
            FilterValue::DateTime(ts) => ts.clone(),
        }
    }
}
