use std::process::Command;
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use serde_json::{json, Value};
use tiny_http::{Header, Response, Server};

use bsky_comments::bluesky::{Client, ClientConfig};
use bsky_comments::data::{BlueskyThreadService, ThreadService};
use bsky_comments::filters;
use bsky_comments::widget::{
    CommentSection, CommentSectionOptions, Notice, PostSource, State, WidgetError,
};

struct MockApi {
    search_status: u16,
    search_body: Value,
    thread_status: u16,
    thread_body: Value,
}

impl MockApi {
    fn spawn(self) -> String {
        let server = Server::http("127.0.0.1:0").expect("bind mock api");
        let addr = server.server_addr().to_ip().expect("tcp listener");
        thread::spawn(move || {
            for request in server.incoming_requests() {
                let url = request.url().to_string();
                if url.starts_with("/xrpc/app.bsky.feed.searchPosts") {
                    respond_json(request, self.search_status, &self.search_body);
                } else if url.starts_with("/xrpc/app.bsky.feed.getPostThread") {
                    respond_json(request, self.thread_status, &self.thread_body);
                } else {
                    let _ = request.respond(Response::from_string("not found").with_status_code(404));
                }
            }
        });
        format!("http://{}", addr)
    }
}

fn respond_json(request: tiny_http::Request, status: u16, body: &Value) {
    let header = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap();
    let response = Response::from_string(body.to_string())
        .with_status_code(status)
        .with_header(header);
    let _ = request.respond(response);
}

fn post_json(rkey: &str, text: &str, likes: i64) -> Value {
    json!({
        "uri": format!("at://did:plc:author/app.bsky.feed.post/{}", rkey),
        "cid": format!("cid-{}", rkey),
        "author": {
            "did": "did:plc:author",
            "handle": "author.example.com",
            "displayName": "Author"
        },
        "record": {
            "$type": "app.bsky.feed.post",
            "text": text,
            "createdAt": "2025-06-01T12:00:00Z"
        },
        "likeCount": likes,
        "repostCount": 0,
        "replyCount": 0
    })
}

fn reply_json(rkey: &str, text: &str, likes: i64) -> Value {
    json!({
        "$type": "app.bsky.feed.defs#threadViewPost",
        "post": post_json(rkey, text, likes),
        "replies": []
    })
}

fn thread_json() -> Value {
    json!({
        "thread": {
            "$type": "app.bsky.feed.defs#threadViewPost",
            "post": post_json("root", "the root post", 42),
            "replies": [
                reply_json("r0", "a mediocre reply", 3),
                {
                    "$type": "app.bsky.feed.defs#notFoundPost",
                    "uri": "at://did:plc:gone/app.bsky.feed.post/deleted",
                    "notFound": true
                },
                reply_json("r1", "the best reply", 7),
                reply_json("r2", "also a great reply", 7),
                reply_json("r3", "a quiet reply", 1),
                reply_json("pin", "\u{1F4CC}", 5)
            ]
        }
    })
}

fn service_at(base_url: &str) -> Arc<dyn ThreadService> {
    let client = Client::new(ClientConfig {
        user_agent: "bsky-comments-tests/0.1".into(),
        base_url: Some(base_url.to_string()),
        timeout: None,
        http_client: None,
    })
    .expect("build client");
    Arc::new(BlueskyThreadService::new(Arc::new(client)))
}

fn notice_sink() -> (Arc<Mutex<Vec<Notice>>>, bsky_comments::widget::NoticeCallback) {
    let notices: Arc<Mutex<Vec<Notice>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = notices.clone();
    (notices, Arc::new(move |notice| sink.lock().push(notice)))
}

#[test]
fn direct_mode_ranks_and_filters_the_thread() {
    let base = MockApi {
        search_status: 200,
        search_body: json!({"posts": []}),
        thread_status: 200,
        thread_body: thread_json(),
    }
    .spawn();

    let mut section = CommentSection::new(CommentSectionOptions {
        source: PostSource::Identifier(
            "https://bsky.app/profile/did:plc:author/post/root".into(),
        ),
        filters: vec![filters::no_pins()],
        on_empty: None,
    });
    section.load(service_at(&base).as_ref());

    assert_eq!(section.state(), State::Ready);
    assert_eq!(
        section.resolved_uri(),
        Some("at://did:plc:author/app.bsky.feed.post/root")
    );

    let rkeys: Vec<&str> = section
        .visible()
        .iter()
        .map(|reply| reply.post.uri.rsplit('/').next().unwrap())
        .collect();
    // placeholder dropped, pin filtered, ties keep fetched order
    assert_eq!(rkeys, ["r1", "r2", "r0", "r3"]);
    assert_eq!(section.hidden_count(), 0);
}

#[test]
fn discovery_mode_resolves_via_search() {
    let base = MockApi {
        search_status: 200,
        search_body: json!({"posts": [post_json("root", "the root post", 42)]}),
        thread_status: 200,
        thread_body: thread_json(),
    }
    .spawn();

    let mut section = CommentSection::new(CommentSectionOptions {
        source: PostSource::Discover {
            author: "author.example.com".into(),
            page_url: "https://example.com/writing/a-post/".into(),
        },
        filters: Vec::new(),
        on_empty: None,
    });
    section.load(service_at(&base).as_ref());

    assert_eq!(section.state(), State::Ready);
    assert_eq!(
        section.resolved_uri(),
        Some("at://did:plc:author/app.bsky.feed.post/root")
    );
    assert_eq!(section.visible().len(), 5);
}

#[test]
fn discovery_with_no_results_is_not_found() {
    let base = MockApi {
        search_status: 200,
        search_body: json!({"posts": []}),
        thread_status: 200,
        thread_body: thread_json(),
    }
    .spawn();

    let (notices, callback) = notice_sink();
    let mut section = CommentSection::new(CommentSectionOptions {
        source: PostSource::Discover {
            author: "author.example.com".into(),
            page_url: "https://example.com/writing/a-post/".into(),
        },
        filters: Vec::new(),
        on_empty: Some(callback),
    });
    section.load(service_at(&base).as_ref());

    assert_eq!(section.state(), State::Errored);
    assert_eq!(section.error(), Some(WidgetError::NotFound));
    let seen = notices.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].code, "not_found");
}

#[test]
fn thread_http_failure_is_a_comment_loading_error() {
    let base = MockApi {
        search_status: 200,
        search_body: json!({"posts": []}),
        thread_status: 500,
        thread_body: json!({"error": "InternalServerError"}),
    }
    .spawn();

    let (notices, callback) = notice_sink();
    let mut section = CommentSection::new(CommentSectionOptions {
        source: PostSource::Identifier("at://did:plc:author/app.bsky.feed.post/root".into()),
        filters: Vec::new(),
        on_empty: Some(callback),
    });
    section.load(service_at(&base).as_ref());

    assert_eq!(section.state(), State::Errored);
    assert_eq!(section.error(), Some(WidgetError::CommentLoading));
    assert_eq!(
        section.error_message().as_deref(),
        Some("Error loading comments")
    );
    assert_eq!(notices.lock()[0].code, "comment_loading_error");
}

#[test]
fn cli_renders_a_thread_end_to_end() {
    let base = MockApi {
        search_status: 200,
        search_body: json!({"posts": []}),
        thread_status: 200,
        thread_body: thread_json(),
    }
    .spawn();

    let output = Command::new(env!("CARGO_BIN_EXE_bsky-comments"))
        .arg("https://bsky.app/profile/did:plc:author/post/root")
        .env("BSKY_COMMENTS_BLUESKY__SERVICE_URL", &base)
        .output()
        .expect("run bsky-comments");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8(output.stdout).expect("stdout utf8");
    assert!(stdout.contains("42 likes, 0 reposts, 0 replies"));
    assert!(stdout.contains("the best reply"));
    assert!(stdout.contains("https://bsky.app/profile/did:plc:author/post/root"));
}
