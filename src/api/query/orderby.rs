//! OData `$orderby` building

#[derive(Debug, Clone)]
pub enum OrderBy {
    Asc(String),
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self::Asc(field.into())
    }

    pub fn to_odata_string(&self) -> String {
        match self {
            OrderBy::Asc(field) => format!("{} asc", field),
        }
    }
}

/// Ordered list of sort clauses
#[derive(Debug, Clone, Default)]
pub struct OrderByClause {
    clauses: Vec<OrderBy>,
}

impl OrderByClause {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, order: OrderBy) -> Self {
        self.clauses.push(order);
        self
    }

    pub fn to_odata_string(&self) -> Option<String> {
        if self.clauses.is_empty() {
            None
        } else {
            let order_strings: Vec<String> =
                self.clauses.iter().map(|o| o.to_odata_string()).collect();
            Some(order_strings.join(", "))
        }
    }
}
