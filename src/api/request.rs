//! Immutable description of a single Web API call

use super::constants::methods;

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: String,
    /// Relative API path, or an absolute continuation URL when `is_paging` is set
    pub endpoint: String,
    pub is_paging: bool,
    pub headers: Vec<(String, String)>,
    pub params: Vec<(String, String)>,
    pub body: Option<String>,
}

impl RequestContext {
    pub fn get(endpoint: impl Into<String>) -> Self {
        Self {
            method: methods::GET.to_string(),
            endpoint: endpoint.into(),
            is_paging: false,
            headers: Vec::new(),
            params: Vec::new(),
            body: None,
        }
    }

    /// Follow a service-supplied continuation URL. It is used verbatim with no extra params.
    pub fn next_page(next_link: impl Into<String>) -> Self {
        Self {
            is_paging: true,
            ..Self::get(next_link)
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn with_params(mut self, params: Vec<(String, String)>) -> Self {
        self.params.extend(params);
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_page_keeps_url_and_drops_params() {
        let ctx = RequestContext::next_page("https://org/api/data/v9.2/accounts?$skiptoken=x");

        assert!(ctx.is_paging);
        assert_eq!(ctx.method, "GET");
        assert!(ctx.params.is_empty());
        assert_eq!(ctx.endpoint, "https://org/api/data/v9.2/accounts?$skiptoken=x");
    }

    #[test]
    fn test_builder_accumulates() {
        let ctx = RequestContext::get("accounts")
            .with_header("Prefer", "odata.maxpagesize=10")
            .with_params(vec![("$orderby".to_string(), "modifiedon asc".to_string())]);

        assert!(!ctx.is_paging);
        assert_eq!(ctx.headers.len(), 1);
        assert_eq!(ctx.params[0].0, "$orderby");
    }

    #[test]
    fn test_post_with_body() {
        let ctx = RequestContext::get("accounts")
            .with_method(methods::POST)
            .with_body(r#"{"name":"Contoso"}"#);

        assert_eq!(ctx.method, "POST");
        assert_eq!(ctx.body.as_deref(), Some(r#"{"name":"Contoso"}"#));
    }
}
