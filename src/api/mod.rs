//! Dynamics 365 Web API client
//!
//! Token lifecycle, request execution with retry layers, OData query building,
//! paged reads and entity metadata for the extraction engine.

pub mod auth;
pub mod client;
pub mod constants;
pub mod error;
pub mod metadata;
pub mod models;
pub mod pagination;
pub mod query;
pub mod request;
pub mod resilience;

pub use auth::TokenManager;
pub use client::{ClientSettings, DynamicsClient};
pub use error::DynamicsError;
pub use metadata::{EntityDefinition, EntityTypeMetadata, PropertyMetadata};
pub use models::{Credentials, TokenInfo};
pub use pagination::Pages;
pub use query::{Filter, FilterValue, OrderBy, Query, QueryResponse, SelectSpec};
pub use request::RequestContext;
pub use resilience::{ResilienceConfig, RetryConfig, RetryPolicy, Sleeper, TokioSleeper};
