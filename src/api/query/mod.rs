//! OData query building for collection reads
//!
//! `Query` assembles `$orderby`, `$filter` and `$select`; `QueryResponse` parses the pages that come back.

pub mod builder;
pub mod filters;
pub mod orderby;
pub mod result;
pub mod select;

pub use builder::Query;
pub use filters::{Filter, FilterValue};
pub use orderby::{OrderBy, OrderByClause};
pub use result::QueryResponse;
pub use select::SelectSpec;
