//! RestGateway against a local PostgREST stand-in.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use chrono::Utc;
use prodboard::board::controller::{ControllerOptions, MoveResult};
use prodboard::board::gateway::{DEFAULT_TABLE, PersistenceGateway, PlacementRow, RestGateway};
use prodboard::board::store::MemoryPlacementStore;
use prodboard::{BoardController, BoardError, GatewayError, PendingMove, ProjectRecord, Stage};

#[derive(Debug, Clone)]
struct Captured {
    apikey: Option<String>,
    authorization: Option<String>,
    prefer: Option<String>,
    query: HashMap<String, String>,
    body: serde_json::Value,
}

#[derive(Clone)]
struct Mock {
    status: StatusCode,
    reply: &'static str,
    delay: Duration,
    seen: Arc<Mutex<Vec<Captured>>>,
}

async fn handle(
    State(mock): State<Mock>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, String) {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    mock.seen.lock().unwrap().push(Captured {
        apikey: header("apikey"),
        authorization: header("authorization"),
        prefer: header("prefer"),
        query,
        body: serde_json::from_str(&body).unwrap_or(serde_json::Value::Null),
    });
    if !mock.delay.is_zero() {
        tokio::time::sleep(mock.delay).await;
    }
    (mock.status, mock.reply.to_string())
}

/// Start a server answering every upsert with `status`/`reply`. Returns the
/// base URL and the requests it received.
async fn serve(
    status: StatusCode,
    reply: &'static str,
    delay: Duration,
) -> (String, Arc<Mutex<Vec<Captured>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mock = Mock {
        status,
        reply,
        delay,
        seen: seen.clone(),
    };
    let app = Router::new()
        .route(&format!("/rest/v1/{}", DEFAULT_TABLE), post(handle))
        .with_state(mock);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), seen)
}

fn sample_rows() -> Vec<PlacementRow> {
    let now = Utc::now();
    vec![
        PlacementRow {
            id: "1".into(),
            stage: Stage::Corte,
            position: 0,
            updated_at: now,
        },
        PlacementRow {
            id: "2".into(),
            stage: Stage::Corte,
            position: 1,
            updated_at: now,
        },
    ]
}

#[tokio::test]
async fn upsert_posts_rows_with_conflict_key_and_auth() {
    let (url, seen) = serve(StatusCode::CREATED, "", Duration::ZERO).await;
    let gateway = RestGateway::new(&url, "anon-key", DEFAULT_TABLE, Duration::from_secs(5)).unwrap();

    gateway.upsert(&sample_rows()).await.unwrap();

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    let request = &seen[0];
    assert_eq!(request.apikey.as_deref(), Some("anon-key"));
    assert_eq!(request.authorization.as_deref(), Some("Bearer anon-key"));
    assert!(request
        .prefer
        .as_deref()
        .is_some_and(|p| p.contains("resolution=merge-duplicates")));
    assert_eq!(request.query.get("on_conflict").map(String::as_str), Some("id"));

    let body = request.body.as_array().expect("body should be a JSON array");
    assert_eq!(body.len(), 2);
    assert_eq!(body[0]["id"], "1");
    assert_eq!(body[0]["stage"], "corte");
    assert_eq!(body[1]["position"], 1);
}

#[tokio::test]
async fn rejected_upsert_reports_status_and_message() {
    let (url, _) = serve(
        StatusCode::UNAUTHORIZED,
        r#"{"code":"PGRST301","message":"JWT expired","details":null}"#,
        Duration::ZERO,
    )
    .await;
    let gateway = RestGateway::new(&url, "stale", DEFAULT_TABLE, Duration::from_secs(5)).unwrap();

    match gateway.upsert(&sample_rows()).await {
        Err(GatewayError::Rejected { status, message }) => {
            assert_eq!(status, 401);
            assert_eq!(message, "JWT expired");
        }
        other => panic!("Expected Rejected, got {:?}", other),
    }
}

#[tokio::test]
async fn plain_text_error_body_is_kept() {
    let (url, _) = serve(StatusCode::BAD_GATEWAY, "upstream down", Duration::ZERO).await;
    let gateway = RestGateway::new(&url, "k", DEFAULT_TABLE, Duration::from_secs(5)).unwrap();

    match gateway.upsert(&sample_rows()).await {
        Err(GatewayError::Rejected { status, message }) => {
            assert_eq!(status, 502);
            assert_eq!(message, "upstream down");
        }
        other => panic!("Expected Rejected, got {:?}", other),
    }
}

#[tokio::test]
async fn slow_remote_times_out() {
    let (url, _) = serve(StatusCode::CREATED, "", Duration::from_secs(3)).await;
    let gateway = RestGateway::new(&url, "k", DEFAULT_TABLE, Duration::from_millis(200)).unwrap();

    let err = gateway.upsert(&sample_rows()).await.unwrap_err();
    assert!(matches!(err, GatewayError::Timeout), "got {:?}", err);
}

#[tokio::test]
async fn controller_rolls_back_when_remote_fails() {
    let (url, seen) = serve(
        StatusCode::INTERNAL_SERVER_ERROR,
        r#"{"message":"db offline"}"#,
        Duration::ZERO,
    )
    .await;
    let gateway = RestGateway::new(&url, "k", DEFAULT_TABLE, Duration::from_secs(5)).unwrap();
    let ctl = BoardController::new(
        Arc::new(MemoryPlacementStore::new()),
        Arc::new(gateway),
        ControllerOptions::default(),
    );
    ctl.load(&[ProjectRecord {
        id: Some("1".into()),
        status: "Orçamento".into(),
        ..Default::default()
    }])
    .await
    .unwrap();

    let result = ctl
        .move_card(PendingMove::new("1", Stage::Orcamento, Stage::Aprovado, 0))
        .await
        .unwrap();

    match result {
        MoveResult::RolledBack { state, error, .. } => {
            assert_eq!(state.ids(Stage::Orcamento), vec!["1"]);
            match error {
                BoardError::Persistence { card_id, source } => {
                    assert_eq!(card_id, "1");
                    assert!(source.to_string().contains("db offline"));
                }
                other => panic!("Expected Persistence, got {:?}", other),
            }
        }
        other => panic!("Expected RolledBack, got {:?}", other),
    }

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].body[0]["stage"], "aprovado");
}
