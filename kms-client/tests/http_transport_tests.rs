//! reqwest transport against a local KMS stand-in

use async_trait::async_trait;
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use kms_client::{
    FailureKind, Identity, KeyDiscovery, KeyNameMatch, KmsClientError, KmsClientResult, LoginMethod,
    SecureLogin, Secret,
};
use kms_lookup_config::KmsClientConfig;
use std::collections::HashMap;
use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn discovery(provider: String) -> KeyDiscovery {
    let mut configs = HashMap::new();
    configs.insert("provider".to_string(), provider);
    configs.insert("username".to_string(), "alice".to_string());
    configs.insert("timeout".to_string(), "5".to_string());
    KeyDiscovery::new(KmsClientConfig::from_map(&configs).unwrap())
}

/// Answers only JSON requests made as alice
async fn key_names(Query(params): Query<HashMap<String, String>>, headers: HeaderMap) -> Response {
    let accepts_json = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        == Some("application/json");
    if !accepts_json {
        return (StatusCode::NOT_ACCEPTABLE, "json only").into_response();
    }
    if params.get("user.name").map(String::as_str) != Some("alice") {
        let message = "User:anonymous not allowed to do 'GET_KEYS'";
        return (StatusCode::FORBIDDEN, message).into_response();
    }
    Json(vec!["key1", "key2", "k9"]).into_response()
}

#[tokio::test]
async fn test_lists_and_filters_names() {
    let app = Router::new().route("/kms/v1/keys/names", get(key_names));
    let addr = serve(app).await;

    let keys = discovery(format!("http://{}/kms", addr))
        .get_kms_key(" k ", &["key1".to_string()])
        .await
        .unwrap();

    assert_eq!(keys, Some(vec!["key2".to_string(), "k9".to_string()]));
}

#[tokio::test]
async fn test_forbidden_carries_server_message() {
    let app = Router::new().route(
        "/kms/v1/keys/names",
        get(|| async { (StatusCode::FORBIDDEN, "User:alice not allowed to do 'GET_KEYS'") }),
    );
    let addr = serve(app).await;

    match discovery(format!("http://{}/kms", addr)).get_kms_key("", &[]).await {
        Err(KmsClientError::Authorization { status, message }) => {
            assert_eq!(status, 403);
            assert_eq!(message, "User:alice not allowed to do 'GET_KEYS'");
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_server_error_is_soft() {
    let app = Router::new().route(
        "/kms/v1/keys/names",
        get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
    );
    let addr = serve(app).await;

    let keys = discovery(format!("http://{}/kms", addr))
        .get_kms_key("", &[])
        .await
        .unwrap();
    assert!(keys.is_none());
}

#[tokio::test]
async fn test_closed_port_is_fatal_transport() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let outcome = discovery(format!("http://{}/kms", addr))
        .discover(&KeyNameMatch::new())
        .await;

    let failure = outcome.failure().expect("nothing is listening");
    assert_eq!(failure.kind, FailureKind::Transport);
    assert!(failure.detail.is_some());
}

#[tokio::test]
async fn test_mirror_failover_over_http() {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route(
            "/kms/v1/keys/names",
            get(|State(hits): State<Arc<AtomicUsize>>| async move {
                if hits.fetch_add(1, Ordering::SeqCst) == 0 {
                    (StatusCode::SERVICE_UNAVAILABLE, Json(Vec::<String>::new()))
                } else {
                    (StatusCode::OK, Json(vec!["mirror-key".to_string()]))
                }
            }),
        )
        .with_state(hits.clone());
    let addr = serve(app).await;

    let provider = format!("kms://http@127.0.0.1;127.0.0.1:{}/kms", addr.port());
    let outcome = discovery(provider).discover(&KeyNameMatch::new()).await;

    assert_eq!(outcome.keys(), Some(&["mirror-key".to_string()][..]));
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_redirect_is_followed() {
    let app = Router::new()
        .route(
            "/old/v1/keys/names",
            get(|| async { Redirect::temporary("/kms/v1/keys/names?user.name=alice") }),
        )
        .route("/kms/v1/keys/names", get(key_names));
    let addr = serve(app).await;

    let outcome = discovery(format!("http://{}/old", addr))
        .discover(&KeyNameMatch::new().with_prefix("key"))
        .await;

    assert_eq!(
        outcome.keys(),
        Some(&["key1".to_string(), "key2".to_string()][..])
    );
}

/// Login backend that hands out a fixed negotiate token
struct TokenLogin;

#[async_trait]
impl SecureLogin for TokenLogin {
    async fn login(&self, username: &str) -> KmsClientResult<Identity> {
        Ok(Identity::new(username, LoginMethod::Simple).with_negotiate_token("dG9rZW4="))
    }

    async fn login_from_keytab(
        &self,
        principal: &str,
        _keytab: &Path,
    ) -> KmsClientResult<Identity> {
        Ok(Identity::new(principal, LoginMethod::Keytab).with_negotiate_token("dG9rZW4="))
    }

    async fn login_with_password(
        &self,
        username: &str,
        _password: &Secret,
    ) -> KmsClientResult<Identity> {
        Ok(Identity::new(username, LoginMethod::Password).with_negotiate_token("dG9rZW4="))
    }
}

/// Lists keys only for requests carrying the negotiate token
async fn negotiated(
    State(hits): State<Arc<AtomicUsize>>,
    headers: HeaderMap,
) -> (StatusCode, Json<Vec<String>>) {
    hits.fetch_add(1, Ordering::SeqCst);
    match headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        Some("Negotiate dG9rZW4=") => (StatusCode::OK, Json(vec!["secured".to_string()])),
        _ => (StatusCode::UNAUTHORIZED, Json(Vec::new())),
    }
}

async fn serve_negotiated() -> (SocketAddr, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/kms/v1/keys/names", get(negotiated))
        .with_state(hits.clone());
    (serve(app).await, hits)
}

fn keytab_discovery(addr: SocketAddr, keytab: &tempfile::NamedTempFile) -> KeyDiscovery {
    let mut configs = HashMap::new();
    configs.insert("provider".to_string(), format!("http://{}/kms", addr));
    configs.insert("authtype".to_string(), "kerberos".to_string());
    configs.insert("rangerprincipal".to_string(), "keyadmin@EXAMPLE.COM".to_string());
    configs.insert(
        "rangerkeytab".to_string(),
        keytab.path().to_string_lossy().into_owned(),
    );
    KeyDiscovery::new(KmsClientConfig::from_map(&configs).unwrap())
}

#[tokio::test]
async fn test_identity_token_is_sent() {
    let (addr, _hits) = serve_negotiated().await;

    let outcome = discovery(format!("http://{}/kms", addr))
        .with_login(Arc::new(TokenLogin))
        .discover(&KeyNameMatch::new())
        .await;

    assert_eq!(outcome.keys(), Some(&["secured".to_string()][..]));
}

#[tokio::test]
async fn test_keytab_login_reaches_negotiating_kms() {
    let (addr, hits) = serve_negotiated().await;
    let mut keytab = tempfile::NamedTempFile::new().unwrap();
    keytab.write_all(&[0x05, 0x02, 0x00, 0x00]).unwrap();

    let keys = keytab_discovery(addr, &keytab)
        .with_login(Arc::new(TokenLogin))
        .get_kms_key("", &[])
        .await
        .unwrap();

    assert_eq!(keys, Some(vec!["secured".to_string()]));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_keytab_without_backend_never_reaches_kms() {
    let (addr, hits) = serve_negotiated().await;
    let mut keytab = tempfile::NamedTempFile::new().unwrap();
    keytab.write_all(&[0x05, 0x02, 0x00, 0x00]).unwrap();

    let result = keytab_discovery(addr, &keytab).get_kms_key("", &[]).await;

    assert!(matches!(result, Err(KmsClientError::Credential(_))));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}
