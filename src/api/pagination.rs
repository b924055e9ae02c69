//! Lazy page-by-page traversal of a collection read

use futures::Stream;
use log::debug;

use super::client::DynamicsClient;
use super::error::DynamicsError;
use super::query::QueryResponse;
use super::request::RequestContext;

/// Finite, non-restartable sequence of pages.
///
/// Each page is fetched only when asked for. Continuation requests reuse the
/// service's `@odata.nextLink` verbatim with no query parameters; headers from the
/// first request (the page size preference) are carried along. After an error or
/// the last page the sequence stays exhausted.
pub struct Pages<'a> {
    client: &'a DynamicsClient,
    next: Option<RequestContext>,
    headers: Vec<(String, String)>,
    fetched: usize,
}

impl<'a> Pages<'a> {
    pub fn new(client: &'a DynamicsClient, first: RequestContext) -> Self {
        Self {
            client,
            headers: first.headers.clone(),
            next: Some(first),
            fetched: 0,
        }
    }

    /// Number of pages fetched so far
    pub fn fetched(&self) -> usize {
        self.fetched
    }

    pub fn is_exhausted(&self) -> bool {
        self.next.is_none()
    }

    /// Fetch the next page, or `None` once the last one has been returned
    pub async fn next_page(&mut self) -> Result<Option<QueryResponse>, DynamicsError> {
        let Some(request) = self.next.take() else {
            return Ok(None);
        };

        let body = self.client.get(&request).await?;
        let page = QueryResponse::from_json(body)?;
        self.fetched += 1;

        self.next = page
            .next_link
            .as_ref()
            .map(|link| RequestContext::next_page(link.as_str()).with_headers(self.headers.clone()));

        debug!(
            "Fetched page {} with {} records (more: {})",
            self.fetched,
            page.len(),
            page.has_more()
        );

        Ok(Some(page))
    }

    /// Adapt into a `Stream` of pages; an error is yielded once and ends the stream
    pub fn into_stream(self) -> impl Stream<Item = Result<QueryResponse, DynamicsError>> + 'a {
        futures::stream::unfold(self, |mut pages| async move {
            match pages.next_page().await {
                Ok(Some(page)) => Some((Ok(page), pages)),
                Ok(None) => None,
                Err(e) => Some((Err(e), pages)),
            }
        })
    }
}

impl DynamicsClient {
    /// Start a paged read from `first`
    pub fn pages(&self, first: RequestContext) -> Pages<'_> {
        Pages::new(self, first)
    }
}
