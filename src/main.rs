mod helpers;

use std::convert::Infallible;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use serde_json::json;

use log::{error, info};

use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{header, Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;

use tokio::net::TcpListener;

use helpers::config::HandlerConfig;
use helpers::event_log::{EventLogger, FacadeLogger, InvocationLogger};
use helpers::health::{HealthStatus, PONG};
use helpers::invocation::{InvocationRequest, InvocationResponse};
use helpers::processor::EventBatchProcessor;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

pub struct AppState {
    pub config: HandlerConfig,
    pub logger: Arc<dyn EventLogger>,
}

fn respond(
    status: StatusCode,
    content_type: &'static str,
    body: impl Into<Bytes>,
) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, header::HeaderValue::from_static(content_type));
    response
}

fn respond_json(status: StatusCode, value: &serde_json::Value) -> Response<Full<Bytes>> {
    respond(status, "application/json", value.to_string())
}

async fn handler<B>(req: Request<B>, state: Arc<AppState>) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body<Data = Bytes>,
    B::Error: Debug,
{
    let response = match (req.method(), req.uri().path()) {
        (&Method::POST, "/ProcessBlobEvents") => process_blob_events(req, &state).await,
        (&Method::GET, "/api/health" | "/health") => health(&state),
        (&Method::GET, "/api/ping" | "/ping") => ping(),
        (_, "/ProcessBlobEvents" | "/api/health" | "/health" | "/api/ping" | "/ping") => {
            respond(StatusCode::METHOD_NOT_ALLOWED, "text/plain; charset=utf-8", "Method Not Allowed")
        }
        _ => respond(StatusCode::NOT_FOUND, "text/plain; charset=utf-8", "Not Found"),
    };

    Ok(response)
}

async fn process_blob_events<B>(req: Request<B>, state: &AppState) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes>,
    B::Error: Debug,
{
    // Read the request body as bytes.
    let body_bytes = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            error!("Error reading request body: {:?}", err);
            return respond_json(StatusCode::BAD_REQUEST, &json!({ "Body": "Error reading request body" }));
        }
    };

    // Check if the Body is Empty
    if body_bytes.is_empty() {
        return respond(StatusCode::NO_CONTENT, "application/json", Bytes::new());
    }

    let batch = match serde_json::from_slice::<InvocationRequest>(&body_bytes)
        .and_then(|invocation| invocation.event_bodies())
    {
        Ok(batch) => batch,
        Err(err) => {
            error!("Error parsing JSON: {:?}", err);
            return respond_json(
                StatusCode::BAD_REQUEST,
                &json!({ "Body": format!("Error parsing JSON: {:?}", err) }),
            );
        }
    };

    info!("Processing {} Event Hub message(s)", batch.len());

    let invocation_logger = Arc::new(InvocationLogger::new(Arc::clone(&state.logger)));
    EventBatchProcessor::new(invocation_logger.clone()).process(&batch);

    // The processor is gone, so this is the only reference left.
    let logs = Arc::try_unwrap(invocation_logger)
        .map(InvocationLogger::into_lines)
        .unwrap_or_default();

    match serde_json::to_string(&InvocationResponse::with_logs(logs)) {
        Ok(body) => respond(StatusCode::OK, "application/json", body),
        Err(err) => {
            error!("Error serializing invocation response: {:?}", err);
            respond(StatusCode::INTERNAL_SERVER_ERROR, "application/json", "{}")
        }
    }
}

fn health(state: &AppState) -> Response<Full<Bytes>> {
    info!("Health check endpoint called");

    let status = HealthStatus::healthy(&state.config, chrono::Utc::now());
    match serde_json::to_string_pretty(&status) {
        Ok(body) => respond(StatusCode::OK, "application/json; charset=utf-8", body),
        Err(err) => {
            error!("Error serializing health status: {:?}", err);
            respond(StatusCode::INTERNAL_SERVER_ERROR, "application/json; charset=utf-8", "{}")
        }
    }
}

fn ping() -> Response<Full<Bytes>> {
    info!("Ping endpoint called");

    respond(StatusCode::OK, "text/plain; charset=utf-8", PONG)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = HandlerConfig::from_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level)).init();

    let addr = config.addr();
    let state = Arc::new(AppState {
        config,
        logger: Arc::new(FacadeLogger),
    });

    let listener = TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    serve(listener, state).await;

    Ok(())
}

// Accept failures (EMFILE, ECONNABORTED, ...) only cost the one connection.
fn accepted<T>(result: std::io::Result<T>) -> Option<T> {
    match result {
        Ok(accepted) => Some(accepted),
        Err(err) => {
            error!("Error accepting connection: {:?}", err);
            None
        }
    }
}

async fn serve(listener: TcpListener, state: Arc<AppState>) {
    loop {
        let Some((stream, _)) = accepted(listener.accept().await) else {
            tokio::time::sleep(ACCEPT_BACKOFF).await;
            continue;
        };
        let io = TokioIo::new(stream);
        let state = Arc::clone(&state);

        tokio::task::spawn(async move {
            let service = service_fn(move |req: Request<Incoming>| handler(req, Arc::clone(&state)));

            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                error!("Error serving connection: {:?}", err);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::event_log::testing::RecordingLogger;
    use serde_json::Value;

    fn state() -> (Arc<AppState>, Arc<RecordingLogger>) {
        let logger = Arc::new(RecordingLogger::default());
        let state = AppState {
            config: HandlerConfig::default(),
            logger: logger.clone(),
        };
        (Arc::new(state), logger)
    }

    fn request(method: Method, path: &str, body: impl Into<Bytes>) -> Request<Full<Bytes>> {
        Request::builder()
            .method(method)
            .uri(path)
            .body(Full::new(body.into()))
            .unwrap()
    }

    async fn send(req: Request<Full<Bytes>>, state: Arc<AppState>) -> (StatusCode, String, Bytes) {
        let response = handler(req, state).await.unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string())
            .unwrap_or_default();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, content_type, body)
    }

    #[tokio::test]
    async fn health_reports_healthy() {
        let (state, _) = state();

        for path in ["/api/health", "/health"] {
            let (status, content_type, body) = send(request(Method::GET, path, ""), state.clone()).await;

            assert_eq!(status, StatusCode::OK);
            assert_eq!(content_type, "application/json; charset=utf-8");
            let health: Value = serde_json::from_slice(&body).unwrap();
            assert_eq!(health["status"], "healthy");
            assert_eq!(health["functionApp"], "BlobEventProcessor");
            assert_eq!(health["version"], "1.0.0");
            assert_eq!(health["environment"], "Development");
            assert!(health["timestamp"].is_string());
        }
    }

    #[test]
    fn accept_errors_do_not_stop_the_server() {
        let aborted = std::io::Error::from(std::io::ErrorKind::ConnectionAborted);
        assert_eq!(accepted::<u8>(Err(aborted)), None);
        assert_eq!(accepted::<u8>(Ok(7)), Some(7));
    }

    #[tokio::test]
    async fn serves_requests_over_tcp() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let (state, _) = state();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, state));

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /api/ping HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut raw = String::new();
        stream.read_to_string(&mut raw).await.unwrap();

        assert!(raw.starts_with("HTTP/1.1 200 OK"), "{}", raw);
        assert!(raw.ends_with("pong"), "{}", raw);
    }

    #[tokio::test]
    async fn ping_answers_pong() {
        let (state, _) = state();

        let (status, content_type, body) = send(request(Method::GET, "/api/ping", ""), state).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type, "text/plain; charset=utf-8");
        assert_eq!(&body[..], b"pong");
    }

    #[tokio::test]
    async fn unknown_routes_and_methods() {
        let (state, _) = state();

        let (status, _, _) = send(request(Method::GET, "/nope", ""), state.clone()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _, _) = send(request(Method::POST, "/api/ping", ""), state.clone()).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

        let (status, _, _) = send(request(Method::GET, "/ProcessBlobEvents", ""), state).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn invocation_processes_batch_and_returns_logs() {
        let (state, logger) = state();
        let good = json!([{
            "id": "1",
            "eventType": "Microsoft.Storage.BlobCreated",
            "eventTime": "2024-03-01T10:15:30Z",
            "data": { "url": "https://acct.blob.core.windows.net/container/file.txt" }
        }])
        .to_string();
        let invocation = json!({
            "Data": { "events": ["{broken", good] },
            "Metadata": {}
        });

        let (status, content_type, body) = send(
            request(Method::POST, "/ProcessBlobEvents", invocation.to_string()),
            state,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type, "application/json");
        let response: Value = serde_json::from_slice(&body).unwrap();
        assert!(response["ReturnValue"].is_null());
        let logs: Vec<String> = serde_json::from_value(response["Logs"].clone()).unwrap();
        assert_eq!(logs.len(), 2);
        assert!(logs[0].starts_with("[ERROR] Failed to parse event data from Event Hub: "));
        assert_eq!(
            logs[1],
            "[INFO] Blob created event processed: file.txt in container container at 2024-03-01T10:15:30+00:00"
        );
        assert_eq!(logger.records().len(), 2);
    }

    #[tokio::test]
    async fn invocation_rejects_invalid_json() {
        let (state, logger) = state();

        let (status, _, body) = send(request(Method::POST, "/ProcessBlobEvents", "{oops"), state).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let response: Value = serde_json::from_slice(&body).unwrap();
        assert!(response["Body"].as_str().unwrap().starts_with("Error parsing JSON"));
        assert!(logger.records().is_empty());
    }

    #[tokio::test]
    async fn empty_invocation_body_is_no_content() {
        let (state, _) = state();

        let (status, _, _) = send(request(Method::POST, "/ProcessBlobEvents", ""), state).await;

        assert_eq!(status, StatusCode::NO_CONTENT);
    }
}
