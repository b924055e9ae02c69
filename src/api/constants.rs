//! API Constants and Configuration for Dynamics 365 Web API

/// Default Dynamics 365 Web API version
pub const API_VERSION: &str = "9.2";

/// Base API path for Dynamics 365
pub const API_BASE_PATH: &str = "/api/data";

/// OAuth token endpoint used when the config does not override it
pub const DEFAULT_TOKEN_URL: &str = "https://login.microsoftonline.com/common/oauth2/token";

/// Hard service ceiling for `odata.maxpagesize`
pub const MAX_PAGESIZE: u32 = 5000;

/// Longest `$select` value we are willing to send before falling back to all columns
pub const MAX_SELECT_PARAM_SIZE: usize = 1800;

/// Seconds shaved off every access token lifetime to absorb clock drift
pub const TOKEN_EXPIRY_MARGIN_SECS: i64 = 10;

/// Response field carrying the continuation URL
pub const NEXT_LINK_FIELD: &str = "@odata.nextLink";

/// Standard headers for Dynamics 365 requests
pub mod headers {
    /// OData version header
    pub const ODATA_VERSION: &str = "4.0";

    /// Suppresses conditional-request (ETag) handling on reads
    pub const IF_NONE_MATCH_NULL: &str = "null";

    /// Prefer header for server-side paging
    pub fn prefer_max_pagesize(pagesize: u32) -> String {
        format!("odata.maxpagesize={}", pagesize)
    }
}

/// HTTP methods for operations
pub mod methods {
    pub const GET: &str = "GET";
    pub const POST: &str = "POST";
}

/// Full API path with version
pub fn api_path(api_version: &str) -> String {
    format!("{}/v{}", API_BASE_PATH, api_version)
}

/// Build full endpoint URL below the versioned API root
pub fn entity_endpoint(base_url: &str, api_version: &str, endpoint: &str) -> String {
    format!(
        "{}{}/{}",
        base_url.trim_end_matches('/'),
        api_path(api_version),
        endpoint.trim_start_matches('/')
    )
}

/// Clamp a configured page size to the service ceiling
pub fn effective_pagesize(configured: Option<u32>) -> u32 {
    configured.unwrap_or(MAX_PAGESIZE).min(MAX_PAGESIZE)
}
