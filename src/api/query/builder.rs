//! Fluent construction of collection queries

use super::filters::{Filter, FilterValue};
use super::orderby::{OrderBy, OrderByClause};
use super::select::SelectSpec;
use crate::api::request::RequestContext;
use crate::api::constants::headers;

/// Read query against one entity set
#[derive(Debug, Clone)]
pub struct Query {
    pub entity_set: String,
    pub select: Option<SelectSpec>,
    pub filter: Option<Filter>,
    pub orderby: OrderByClause,
    pub max_pagesize: Option<u32>,
}

impl Query {
    pub fn new(entity_set: impl Into<String>) -> Self {
        Self {
            entity_set: entity_set.into(),
            select: None,
            filter: None,
            orderby: OrderByClause::new(),
            max_pagesize: None,
        }
    }

    /// Ascending by `replication_key`, from `bookmark` onwards when one is known
    pub fn incremental(
        entity_set: impl Into<String>,
        replication_key: &str,
        bookmark: Option<&str>,
    ) -> Self {
        let query = Self::new(entity_set).orderby(OrderBy::asc(replication_key));
        match bookmark {
            Some(value) => query.filter(Filter::ge(replication_key, FilterValue::datetime(value))),
            None => query,
        }
    }

    pub fn select(mut self, select: SelectSpec) -> Self {
        self.select = Some(select);
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn orderby(mut self, order: OrderBy) -> Self {
        self.orderby = self.orderby.add(order);
        self
    }

    pub fn max_pagesize(mut self, pagesize: u32) -> Self {
        self.max_pagesize = Some(pagesize);
        self
    }

    /// OData system query options in a stable order
    pub fn to_query_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();

        if let Some(orderby) = self.orderby.to_odata_string() {
            params.push(("$orderby".to_string(), orderby));
        }

        if let Some(filter) = &self.filter {
            let filter = filter.to_odata_string();
            if !filter.is_empty() {
                params.push(("$filter".to_string(), filter));
            }
        }

        if let Some(select) = self.select.as_ref().and_then(SelectSpec::to_param) {
            params.push(("$select".to_string(), select));
        }

        params
    }

    /// Request for the first page
    pub fn to_request(&self) -> RequestContext {
        let mut request = RequestContext::get(&self.entity_set).with_params(self.to_query_params());
        if let Some(pagesize) = self.max_pagesize {
            request = request.with_header("Prefer", headers::prefer_max_pagesize(pagesize));
        }
        request
    }
}
