use mbot_helper::error::ApiError;
use mbot_helper::mattermost::{HttpClient, Platform};
use mbot_helper::models::{ChannelType, NewChannel, NewPost};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

struct Canned {
    status: &'static str,
    headers: Vec<(&'static str, &'static str)>,
    body: String,
}

impl Canned {
    fn ok(body: serde_json::Value) -> Self {
        Self {
            status: "200 OK",
            headers: vec![],
            body: body.to_string(),
        }
    }
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

async fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = find_header_end(&buf) {
            let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
            let content_length = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .map_or(0, |v| v.trim().parse::<usize>().unwrap());
            if buf.len() >= end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Serves the canned responses in order, one connection each, and returns the raw requests.
async fn mock_server(responses: Vec<Canned>) -> (String, tokio::task::JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let mut requests = Vec::new();
        for canned in responses {
            let (mut stream, _) = listener.accept().await.unwrap();
            requests.push(read_request(&mut stream).await);

            let mut response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n",
                canned.status,
                canned.body.len()
            );
            for (name, value) in &canned.headers {
                response.push_str(&format!("{name}: {value}\r\n"));
            }
            response.push_str("\r\n");
            response.push_str(&canned.body);
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
        }
        requests
    });

    (base, handle)
}

fn login_response() -> Canned {
    Canned {
        status: "201 Created",
        headers: vec![("Token", "session-token-1")],
        body: serde_json::json!({
            "id": "bot-id",
            "username": "samplebot",
            "email": "bot@example.com",
            "first_name": "Sample",
            "last_name": "Bot",
            "roles": "system_user"
        })
        .to_string(),
    }
}

#[tokio::test]
async fn server_version_reads_old_client_config() {
    let (base, server) = mock_server(vec![Canned::ok(serde_json::json!({
        "Version": "9.11.0",
        "BuildNumber": "123"
    }))])
    .await;

    let client = HttpClient::new(&base).unwrap();
    assert_eq!(client.server_version().await.unwrap(), "9.11.0");

    let requests = server.await.unwrap();
    assert!(requests[0].starts_with("GET /api/v4/config/client?format=old HTTP/1.1"));
}

#[tokio::test]
async fn login_stores_token_for_later_calls() {
    let (base, server) = mock_server(vec![
        login_response(),
        Canned::ok(serde_json::json!({"id": "team-id", "name": "botsample", "display_name": "Bot Sample"})),
    ])
    .await;

    let client = HttpClient::new(&base).unwrap();
    let user = client.login("bot@example.com", "password1").await.unwrap();
    assert_eq!(user.id, "bot-id");
    assert_eq!(client.auth_token().as_deref(), Some("session-token-1"));

    let team = client.team_by_name("botsample").await.unwrap();
    assert_eq!(team.id, "team-id");

    let requests = server.await.unwrap();
    assert!(requests[0].starts_with("POST /api/v4/users/login HTTP/1.1"));
    assert!(requests[0].contains(r#""login_id":"bot@example.com""#));
    assert!(requests[1].starts_with("GET /api/v4/teams/name/botsample HTTP/1.1"));
    assert!(
        requests[1]
            .to_lowercase()
            .contains("authorization: bearer session-token-1")
    );
}

#[tokio::test]
async fn login_without_token_header_is_invalid() {
    let (base, server) = mock_server(vec![Canned {
        headers: vec![],
        ..login_response()
    }])
    .await;

    let client = HttpClient::new(&base).unwrap();
    let err = client.login("bot@example.com", "password1").await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidResponse(_)));
    assert!(client.auth_token().is_none());
    server.await.unwrap();
}

#[tokio::test]
async fn error_body_becomes_app_error() {
    let (base, server) = mock_server(vec![Canned {
        status: "401 Unauthorized",
        headers: vec![],
        body: serde_json::json!({
            "id": "api.user.login.invalid_credentials_email_username",
            "message": "Enter a valid email or username and/or password.",
            "detailed_error": "",
            "request_id": "r1",
            "status_code": 401
        })
        .to_string(),
    }])
    .await;

    let client = HttpClient::new(&base).unwrap();
    let err = client.login("bot@example.com", "wrong").await.unwrap_err();
    match err {
        ApiError::App(app) => {
            assert_eq!(app.id, "api.user.login.invalid_credentials_email_username");
            assert_eq!(app.status_code, 401);
        }
        other => panic!("unexpected error: {other}"),
    }
    server.await.unwrap();
}

#[tokio::test]
async fn non_json_error_keeps_status_and_body() {
    let (base, server) = mock_server(vec![Canned {
        status: "502 Bad Gateway",
        headers: vec![],
        body: "upstream unavailable".to_string(),
    }])
    .await;

    let client = HttpClient::new(&base).unwrap();
    let err = client.server_version().await.unwrap_err();
    match err {
        ApiError::App(app) => {
            assert_eq!(app.status_code, 502);
            assert_eq!(app.detailed_error, "upstream unavailable");
        }
        other => panic!("unexpected error: {other}"),
    }
    server.await.unwrap();
}

#[tokio::test]
async fn channel_and_post_calls_hit_expected_routes() {
    let (base, server) = mock_server(vec![
        login_response(),
        Canned::ok(serde_json::json!({
            "id": "debug-id", "team_id": "team-id", "name": "debugging-for-sample-bot", "type": "O"
        })),
        Canned::ok(serde_json::json!({
            "id": "new-id", "team_id": "team-id", "name": "bot-status", "type": "O"
        })),
        Canned::ok(serde_json::json!({"channel_id": "new-id", "user_id": "bot-id"})),
        Canned::ok(serde_json::json!({
            "id": "post-1", "channel_id": "debug-id", "user_id": "bot-id",
            "root_id": "p0", "message": "Yes I'm running", "create_at": 1
        })),
    ])
    .await;

    let client = HttpClient::new(&base).unwrap();
    client.login("bot@example.com", "password1").await.unwrap();

    let channel = client
        .channel_by_name("debugging-for-sample-bot", "team-id")
        .await
        .unwrap();
    assert_eq!(channel.channel_type, ChannelType::Open);

    let created = client
        .create_channel(&NewChannel {
            team_id: "team-id".to_string(),
            name: "bot-status".to_string(),
            display_name: "Bot Status".to_string(),
            purpose: String::new(),
            channel_type: ChannelType::Open,
        })
        .await
        .unwrap();
    assert_eq!(created.id, "new-id");

    client.add_channel_member("new-id", "bot-id").await.unwrap();

    let post = client
        .create_post(&NewPost {
            channel_id: "debug-id".to_string(),
            message: "Yes I'm running".to_string(),
            root_id: "p0".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(post.root_id, "p0");

    let requests = server.await.unwrap();
    assert!(
        requests[1].starts_with(
            "GET /api/v4/teams/team-id/channels/name/debugging-for-sample-bot HTTP/1.1"
        )
    );
    assert!(requests[2].starts_with("POST /api/v4/channels HTTP/1.1"));
    assert!(requests[2].contains(r#""type":"O""#));
    assert!(requests[3].starts_with("POST /api/v4/channels/new-id/members HTTP/1.1"));
    assert!(requests[3].contains(r#""user_id":"bot-id""#));
    assert!(requests[4].starts_with("POST /api/v4/posts HTTP/1.1"));
    assert!(requests[4].contains(r#""root_id":"p0""#));
}
