//! Unit RPC across a real HTTP hop.

use std::sync::{Arc, Mutex};

use axum::http::StatusCode;
use serde_json::{json, Value};
use unit_router::error::{FetchError, RpcError, TransportError};
use unit_router::http::response::{self, Outcome};
use unit_router::routing::{Fetcher, RouteContext, Router};
use unit_router::rpc::{HttpStub, MethodCall, RpcClient, Unit};

mod common;

type Log = Arc<Mutex<Vec<String>>>;

fn notebook(log: Log) -> Unit<Log> {
    Unit::builder(log)
        .method("append", |log: Log, _call, (line,): (String,)| async move {
            let mut lines = log.lock().unwrap();
            lines.push(line);
            response::ok(StatusCode::OK, &lines.len())
        })
        .method("lines", |log: Log, _call, (): ()| async move {
            response::ok(StatusCode::OK, &*log.lock().unwrap())
        })
        .method("secret", |_, _call, (who,): (String,)| async move {
            response::error(StatusCode::UNAUTHORIZED, &format!("{}bar", who))
        })
        .method("raw", |_, _call, (): ()| async move {
            response::body(StatusCode::OK, "just bytes")
        })
        .method("whoami", |_, call: MethodCall, (): ()| async move {
            let agent = call
                .headers
                .get("x-caller")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("anonymous")
                .to_string();
            response::ok(StatusCode::OK, &agent)
        })
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_call_over_http() {
    let log: Log = Arc::default();
    let (addr, shutdown) = common::serve(Arc::new(notebook(Arc::clone(&log)))).await;
    let client = RpcClient::new(HttpStub::new(&format!("http://{}", addr)).unwrap());

    let count: Outcome<usize, Value> = client.invoke("append", &("first",)).await.unwrap();
    assert_eq!(count.success(), Some(1));
    client.call_raw("append", &("second",)).await.unwrap();

    let lines: Outcome<Vec<String>, Value> = client.invoke("lines", &()).await.unwrap();
    assert_eq!(lines.success().unwrap(), vec!["first", "second"]);
    assert_eq!(log.lock().unwrap().len(), 2);

    shutdown.trigger();
}

#[tokio::test]
async fn test_typed_failure_and_raw_body() {
    let (addr, shutdown) = common::serve(Arc::new(notebook(Arc::default()))).await;
    let client = RpcClient::new(HttpStub::new(&format!("http://{}", addr)).unwrap());

    let typed = client.call::<Value, String, _>("secret", &("foo",)).await.unwrap();
    assert!(!typed.is_ok());
    assert_eq!(typed.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        typed.json().unwrap().into_result(),
        Err((StatusCode::UNAUTHORIZED, "foobar".to_string()))
    );

    let raw = client.call::<(), (), _>("raw", &()).await.unwrap();
    assert_eq!(
        raw.bytes(),
        Outcome::Success {
            value: axum::body::Bytes::from_static(b"just bytes")
        }
    );

    shutdown.trigger();
}

#[tokio::test]
async fn test_get_variant_and_forwarded_headers() {
    let (addr, shutdown) = common::serve(Arc::new(notebook(Arc::default()))).await;
    let stub = HttpStub::new(&format!("http://{}", addr)).unwrap();

    let inbound = axum::http::Request::builder()
        .header("x-caller", "gateway")
        .body(())
        .unwrap();
    let client = RpcClient::new(stub).forwarding(&inbound);

    let response = client.call_get_raw("append", &("needs %2F escaping / ok",)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let lines: Outcome<Vec<String>, Value> = client.invoke("lines", &()).await.unwrap();
    assert_eq!(lines.success().unwrap(), vec!["needs %2F escaping / ok"]);

    let who: Outcome<String, Value> = client.invoke("whoami", &()).await.unwrap();
    assert_eq!(who.success().as_deref(), Some("gateway"));

    shutdown.trigger();
}

#[tokio::test]
async fn test_unknown_method_and_bad_arguments() {
    let (addr, shutdown) = common::serve(Arc::new(notebook(Arc::default()))).await;
    let client = RpcClient::new(HttpStub::new(&format!("http://{}", addr)).unwrap());

    let missing: Outcome<Value, String> = client.invoke("nope", &()).await.unwrap();
    assert_eq!(missing.failure_status(), Some(StatusCode::INTERNAL_SERVER_ERROR));

    let bad: Outcome<Value, String> = client.invoke("append", &(1, 2, 3)).await.unwrap();
    assert_eq!(bad.failure_status(), Some(StatusCode::BAD_REQUEST));

    shutdown.trigger();
}

#[tokio::test]
async fn test_transport_failure_surfaces_as_error() {
    let (addr, shutdown) = common::serve(Arc::new(notebook(Arc::default()))).await;
    shutdown.trigger();
    // Let the listener close.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let client = RpcClient::new(HttpStub::new(&format!("http://{}", addr)).unwrap());
    let err = client.invoke::<Value, Value, _>("lines", &()).await.unwrap_err();
    assert!(matches!(err, RpcError::Transport(TransportError::Http(_))));
}

#[tokio::test]
async fn test_fetcher_over_http() {
    let router = Router::builder()
        .get("/users/:id", |ctx: RouteContext, _: ()| async move {
            response::ok(StatusCode::OK, &json!({ "id": ctx.param("id") }))
        })
        .post("/users/:id/rename", |ctx: RouteContext, _: ()| async move {
            let body: Value = serde_json::from_slice(ctx.request.body())?;
            Ok::<_, serde_json::Error>(response::ok(
                StatusCode::OK,
                &json!({ "id": ctx.param("id"), "name": body["name"] }),
            ))
        })
        .build()
        .unwrap();
    let service = router.clone().with_state(());
    let (addr, shutdown) = common::serve(Arc::new(service)).await;

    let fetcher = Fetcher::new(&router, HttpStub::new(&format!("http://{}", addr)).unwrap());

    let user: Outcome<Value, Value> = fetcher
        .get("/users/:id")
        .unwrap()
        .param("id", "7")
        .invoke()
        .await
        .unwrap();
    assert_eq!(user.success().unwrap(), json!({"id": "7"}));

    let renamed: Outcome<Value, Value> = fetcher
        .post("/users/:id/rename")
        .unwrap()
        .param("id", "7")
        .json(&json!({"name": "ada"}))
        .unwrap()
        .invoke()
        .await
        .unwrap();
    assert_eq!(renamed.success().unwrap(), json!({"id": "7", "name": "ada"}));

    let err = fetcher.get("/users/:id").unwrap().send().await.unwrap_err();
    assert!(matches!(err, FetchError::MissingParam(ref name) if name == "id"));

    shutdown.trigger();
}
