use mux_core::{ErrorBody, FetchResult, UrlsRequest};
use pretty_assertions::assert_eq;

#[test]
fn request_body_decodes_url_list() {
    let request: UrlsRequest =
        serde_json::from_str(r#"{"urls": ["http://a", "http://b"]}"#).unwrap();
    assert_eq!(request.urls, vec!["http://a".to_string(), "http://b".to_string()]);
}

#[test]
fn request_without_urls_field_is_rejected() {
    assert!(serde_json::from_str::<UrlsRequest>(r#"{"links": []}"#).is_err());
}

#[test]
fn fetch_result_serializes_body_as_response() {
    let result = FetchResult {
        url: "http://a".into(),
        body: "hello".into(),
    };
    assert_eq!(
        serde_json::to_string(&vec![result]).unwrap(),
        r#"[{"url":"http://a","response":"hello"}]"#
    );
}

#[test]
fn error_body_shape() {
    assert_eq!(
        serde_json::to_string(&ErrorBody::new("boom")).unwrap(),
        r#"{"error":"boom"}"#
    );
}
