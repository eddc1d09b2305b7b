use chat_api::url::DEFAULT_BASE_URL;
use chat_api::{ChatApiError, Endpoints};

#[test]
fn endpoints_hang_off_the_base_origin() {
    let endpoints = Endpoints::new("http://127.0.0.1:61990/").expect("endpoints");
    assert_eq!(endpoints.chat().as_str(), "http://127.0.0.1:61990/api/chat");
    assert_eq!(endpoints.retry().as_str(), "http://127.0.0.1:61990/api/chat/retry");
    assert_eq!(endpoints.edit().as_str(), "http://127.0.0.1:61990/api/chat/edit");
    assert_eq!(
        endpoints.abort("c-1").as_str(),
        "http://127.0.0.1:61990/api/chat/c-1/abort"
    );
    assert_eq!(
        endpoints.history("c-1").as_str(),
        "http://127.0.0.1:61990/api/chat/c-1"
    );
}

#[test]
fn base_path_is_kept_as_prefix() {
    let endpoints = Endpoints::new("https://example.test/proxy/").expect("endpoints");
    assert_eq!(endpoints.chat().as_str(), "https://example.test/proxy/api/chat");

    let endpoints = Endpoints::new("https://example.test/proxy?x=1").expect("endpoints");
    assert_eq!(endpoints.chat().as_str(), "https://example.test/proxy/api/chat");
}

#[test]
fn chat_ids_are_single_segments() {
    let endpoints = Endpoints::new("http://localhost:1").expect("endpoints");
    assert_eq!(
        endpoints.history("a/b c").as_str(),
        "http://localhost:1/api/chat/a%2Fb%20c"
    );
}

#[test]
fn blank_base_falls_back_to_default() {
    let endpoints = Endpoints::new("  ").expect("endpoints");
    assert_eq!(endpoints.base().as_str(), format!("{DEFAULT_BASE_URL}/"));
}

#[test]
fn unusable_bases_are_rejected() {
    assert!(matches!(
        Endpoints::new("not a url"),
        Err(ChatApiError::InvalidBaseUrl(_))
    ));
    assert!(matches!(
        Endpoints::new("mailto:someone@example.test"),
        Err(ChatApiError::InvalidBaseUrl(_))
    ));
}
