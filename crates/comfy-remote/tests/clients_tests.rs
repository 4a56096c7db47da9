//! Registry and GitHub clients against a local canned-response server.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use comfy_remote::{
    Error, GitHubClient, RegistryClient, RemoteConfig, RetryPolicy, parse_github_url,
};
use pretty_assertions::assert_eq;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

#[derive(Clone)]
struct Canned {
    status: u16,
    headers: Vec<(&'static str, &'static str)>,
    body: String,
}

impl Canned {
    fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: "{}".into(),
        }
    }
}

/// Each path maps to a queue of responses; the last one repeats.
struct Server {
    base: String,
    hits: Arc<Mutex<Vec<String>>>,
}

async fn serve(routes: Vec<(&str, Vec<Canned>)>) -> Server {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let routes: Arc<Mutex<HashMap<String, Vec<Canned>>>> = Arc::new(Mutex::new(
        routes
            .into_iter()
            .map(|(path, responses)| (path.to_string(), responses))
            .collect(),
    ));
    let hits = Arc::new(Mutex::new(Vec::new()));

    let server_hits = Arc::clone(&hits);
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let routes = Arc::clone(&routes);
            let hits = Arc::clone(&server_hits);
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = socket.read(&mut chunk).await.unwrap_or(0);
                    if n == 0 {
                        return;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                }
                let request = String::from_utf8_lossy(&buf);
                let path = request
                    .split_whitespace()
                    .nth(1)
                    .unwrap_or("/")
                    .to_string();
                hits.lock().unwrap().push(path.clone());

                let canned = {
                    let mut routes = routes.lock().unwrap();
                    match routes.get_mut(&path) {
                        Some(queue) if queue.len() > 1 => queue.remove(0),
                        Some(queue) => queue[0].clone(),
                        None => Canned::status(404),
                    }
                };
                let mut response = format!(
                    "HTTP/1.1 {} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n",
                    canned.status,
                    canned.body.len()
                );
                for (k, v) in &canned.headers {
                    response.push_str(&format!("{k}: {v}\r\n"));
                }
                response.push_str("\r\n");
                response.push_str(&canned.body);
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    Server { base, hits }
}

fn config(base: &str) -> RemoteConfig {
    RemoteConfig {
        registry_url: base.to_string(),
        github_api_url: base.to_string(),
        min_interval: Duration::ZERO,
        page_size: 2,
        retry: RetryPolicy {
            initial_interval: Duration::from_millis(1),
            max_interval: Duration::from_millis(5),
            randomization_factor: 0.0,
            max_retries: 3,
            ..RetryPolicy::default()
        },
        ..RemoteConfig::default()
    }
}

#[tokio::test]
async fn registry_node_lookup_and_negative_cache() {
    let server = serve(vec![(
        "/nodes/comfyui-impact-pack",
        vec![Canned::ok(
            r#"{"id": "comfyui-impact-pack", "name": "Impact Pack",
                "repository": "https://github.com/ltdrdata/ComfyUI-Impact-Pack",
                "latest_version": {"version": "8.1.0", "downloadUrl": "https://cdn/x.zip"}}"#,
        )],
    )])
    .await;
    let client = RegistryClient::new(&config(&server.base)).unwrap();

    let node = client.get_node("comfyui-impact-pack").await.unwrap().unwrap();
    assert_eq!(node.latest_version.unwrap().version, "8.1.0");

    assert_eq!(client.get_node("unknown-node").await.unwrap(), None);
    assert_eq!(client.get_node("unknown-node").await.unwrap(), None);
    client.get_node("comfyui-impact-pack").await.unwrap();

    // cached: one request per distinct URL
    assert_eq!(server.hits.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn registry_versions_follow_pages_until_short() {
    let server = serve(vec![
        (
            "/nodes/n/versions?page=1&limit=2",
            vec![Canned::ok(r#"[{"version": "1.2.0"}, {"version": "1.1.0"}]"#)],
        ),
        (
            "/nodes/n/versions?page=2&limit=2",
            vec![Canned::ok(r#"[{"version": "1.0.0"}]"#)],
        ),
    ])
    .await;
    let client = RegistryClient::new(&config(&server.base)).unwrap();

    let versions: Vec<String> = client
        .list_versions("n")
        .await
        .unwrap()
        .into_iter()
        .map(|v| v.version)
        .collect();
    assert_eq!(versions, vec!["1.2.0", "1.1.0", "1.0.0"]);
    assert_eq!(server.hits.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn rate_limit_is_retried_then_succeeds() {
    let limited = Canned {
        status: 403,
        headers: vec![("x-ratelimit-remaining", "0")],
        body: "{}".into(),
    };
    let server = serve(vec![(
        "/repos/o/r/tags?per_page=2&page=1",
        vec![
            limited,
            Canned::status(502),
            Canned::ok(r#"[{"name": "v1.0.0", "commit": {"sha": "abc"}}]"#),
        ],
    )])
    .await;
    let client = GitHubClient::new(&config(&server.base)).unwrap();
    let repo = parse_github_url("https://github.com/o/r").unwrap();

    let tags = client.list_tags(&repo).await.unwrap();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].commit.sha, "abc");
    assert_eq!(server.hits.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn permanent_status_is_not_retried() {
    let server = serve(vec![(
        "/repos/o/r/releases?per_page=2&page=1",
        vec![Canned::status(401)],
    )])
    .await;
    let client = GitHubClient::new(&config(&server.base)).unwrap();
    let repo = parse_github_url("git@github.com:o/r.git").unwrap();

    let err = client.list_releases(&repo).await.unwrap_err();
    assert!(matches!(err, Error::Status { status: 401, .. }));
    assert_eq!(server.hits.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn missing_repository_yields_empty_list() {
    let server = serve(Vec::new()).await;
    let client = GitHubClient::new(&config(&server.base)).unwrap();
    let repo = parse_github_url("https://github.com/o/gone").unwrap();
    assert!(client.list_releases(&repo).await.unwrap().is_empty());
}
