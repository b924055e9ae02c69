mod common;

use common::*;
use futures::StreamExt;
use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dynamics_tap::api::{OrderBy, Query, RequestContext};

async fn mount_three_pages(server: &MockServer) {
    let next = |token: &str| format!("{}{}?$skiptoken={}", server.uri(), data_path("accounts"), token);

    Mock::given(method("GET"))
        .and(path(data_path("accounts")))
        .and(query_param("$orderby", "name asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{"accountid": "1"}, {"accountid": "2"}],
            "@odata.nextLink": next("p2")
        })))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(data_path("accounts")))
        .and(query_param("$skiptoken", "p2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{"accountid": "3"}],
            "@odata.nextLink": next("p3")
        })))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(data_path("accounts")))
        .and(query_param("$skiptoken", "p3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{"accountid": "4"}, {"accountid": "5"}]
        })))
        .expect(1)
        .mount(server)
        .await;
}

fn first_request() -> RequestContext {
    Query::new("accounts")
        .orderby(OrderBy::asc("name"))
        .max_pagesize(2)
        .to_request()
}

#[tokio::test]
async fn test_every_record_once_in_order() {
    let (server, client, _sleeper) = setup().await;
    mount_three_pages(&server).await;

    let mut pages = client.pages(first_request());
    let mut ids = Vec::new();
    while let Some(page) = pages.next_page().await.unwrap() {
        ids.extend(page.value.iter().map(|r| r["accountid"].as_str().unwrap().to_string()));
    }

    assert_eq!(ids, ["1", "2", "3", "4", "5"]);
    assert_eq!(pages.fetched(), 3);
    assert!(pages.is_exhausted());

    // not restartable
    assert!(pages.next_page().await.unwrap().is_none());
}

#[tokio::test]
async fn test_continuation_url_is_used_verbatim() {
    let (server, client, _sleeper) = setup().await;
    mount_three_pages(&server).await;

    let mut pages = client.pages(first_request());
    while pages.next_page().await.unwrap().is_some() {}

    let requests = data_requests(&server).await;
    assert_eq!(requests.len(), 3);

    assert_eq!(query_value(&requests[0], "$orderby").as_deref(), Some("name asc"));
    assert_eq!(requests[1].url.query(), Some("$skiptoken=p2"));
    assert_eq!(requests[2].url.query(), Some("$skiptoken=p3"));

    for request in &requests {
        assert_eq!(
            request.headers.get("prefer").and_then(|v| v.to_str().ok()),
            Some("odata.maxpagesize=2")
        );
    }
}

#[tokio::test]
async fn test_pages_as_stream() {
    let (server, client, _sleeper) = setup().await;
    mount_three_pages(&server).await;

    let sizes: Vec<usize> = client
        .pages(first_request())
        .into_stream()
        .map(|page| page.unwrap().len())
        .collect()
        .await;

    assert_eq!(sizes, vec![2, 1, 2]);
}

#[tokio::test]
async fn test_failed_page_ends_sequence() {
    let (server, client, _sleeper) = setup().await;

    Mock::given(method("GET"))
        .and(path(data_path("accounts")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!("not a page")))
        .mount(&server)
        .await;

    let mut pages = client.pages(RequestContext::get("accounts"));

    assert!(pages.next_page().await.is_err());
    assert!(pages.is_exhausted());
    assert!(pages.next_page().await.unwrap().is_none());
}

#[tokio::test]
async fn test_single_page_without_next_link() {
    let (server, client, _sleeper) = setup().await;

    Mock::given(method("GET"))
        .and(path(data_path("accounts")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": []})))
        .expect(1)
        .mount(&server)
        .await;

    let results: Vec<Value> = {
        let mut pages = client.pages(RequestContext::get("accounts"));
        let mut all = Vec::new();
        while let Some(page) = pages.next_page().await.unwrap() {
            all.extend(page.value);
        }
        all
    };

    assert!(results.is_empty());
}
