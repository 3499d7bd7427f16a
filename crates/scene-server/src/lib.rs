use std::sync::{Arc, Mutex};

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use http::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use scene_engine::{Engine, GenerateError, GenerateRequest, LayerMeta, LayerSummary};

type SharedEngine = Arc<Mutex<Engine>>;

pub fn app() -> Router {
    app_with_engine(Arc::new(Mutex::new(Engine::default())))
}

pub fn app_with_engine(engine: SharedEngine) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/generate", post(generate))
        .route("/layers", get(list_layers))
        .route("/layers/{id}", delete(remove_layer))
        .route("/layers/{id}/mesh", get(layer_mesh))
        .route("/clear", post(clear))
        .route("/ws", get(websocket))
        .with_state(engine)
        .layer(cors_layer())
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
}

#[derive(Debug, Deserialize)]
struct GenerateBody {
    code: String,
    description: Option<String>,
    seed: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct HealthResponse {
    status: &'static str,
}

/// Render-facing buffers for one layer. Normals are omitted when nothing in
/// the layer supplied custom normals.
#[derive(Debug, Serialize, Deserialize)]
struct MeshPayload {
    positions: Vec<f32>,
    colors: Vec<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    normals: Option<Vec<f32>>,
    has_custom_normals: bool,
    material: MaterialPayload,
}

#[derive(Debug, Serialize, Deserialize)]
struct MaterialPayload {
    roughness: Option<f32>,
    metalness: Option<f32>,
    opacity: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ErrorResponse {
    error: String,
    kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    vertices_so_far: Option<u32>,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorResponse {
                error: message.into(),
                kind: "bad_request".to_string(),
                line: None,
                vertices_so_far: None,
            },
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            body: ErrorResponse {
                error: message.into(),
                kind: "not_found".to_string(),
                line: None,
                vertices_so_far: None,
            },
        }
    }
}

impl From<GenerateError> for ApiError {
    fn from(error: GenerateError) -> Self {
        let (status, kind, line, vertices) = match &error {
            GenerateError::Validation(_) => (StatusCode::BAD_REQUEST, "validation", None, None),
            GenerateError::Timeout(_) => (StatusCode::REQUEST_TIMEOUT, "timeout", None, None),
            GenerateError::Runtime {
                line,
                vertices_so_far,
                ..
            } => (
                StatusCode::BAD_REQUEST,
                "runtime",
                *line,
                Some(*vertices_so_far),
            ),
            GenerateError::MeshValidation(_) => {
                (StatusCode::BAD_REQUEST, "mesh_validation", None, None)
            }
            GenerateError::Cancelled => (StatusCode::CONFLICT, "cancelled", None, None),
        };
        Self {
            status,
            body: ErrorResponse {
                error: error.to_string(),
                kind: kind.to_string(),
                line,
                vertices_so_far: vertices,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn generate(
    State(engine): State<SharedEngine>,
    body: Bytes,
) -> Result<Json<LayerSummary>, ApiError> {
    let body: GenerateBody = parse_json(&body)?;
    let request = GenerateRequest {
        code: body.code,
        description: body.description.unwrap_or_default(),
        seed: body.seed.unwrap_or(0),
    };

    let summary = run_generation(engine, request).await?;
    Ok(Json(summary))
}

/// The engine's pipeline is synchronous compute; run it off the async
/// executor. The mutex serializes generations per store.
async fn run_generation(
    engine: SharedEngine,
    request: GenerateRequest,
) -> Result<LayerSummary, ApiError> {
    tokio::task::spawn_blocking(move || {
        let mut engine = engine.lock().expect("engine lock");
        engine.generate(&request)
    })
    .await
    .map_err(|err| ApiError::bad_request(format!("generation task failed: {err}")))?
    .map_err(ApiError::from)
}

async fn list_layers(State(engine): State<SharedEngine>) -> Json<Vec<LayerMeta>> {
    let engine = engine.lock().expect("engine lock");
    Json(engine.list_meta())
}

async fn remove_layer(
    State(engine): State<SharedEngine>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let mut engine = engine.lock().expect("engine lock");
    if engine.remove(&id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("no layer '{id}'")))
    }
}

async fn layer_mesh(
    State(engine): State<SharedEngine>,
    Path(id): Path<String>,
) -> Result<Json<MeshPayload>, ApiError> {
    let engine = engine.lock().expect("engine lock");
    let layer = engine
        .layer(&id)
        .ok_or_else(|| ApiError::not_found(format!("no layer '{id}'")))?;

    let has_custom_normals = layer.mesh.has_custom_normals();
    Ok(Json(MeshPayload {
        positions: layer.mesh.positions().to_vec(),
        colors: layer.mesh.colors().to_vec(),
        normals: has_custom_normals.then(|| layer.mesh.normals().to_vec()),
        has_custom_normals,
        material: MaterialPayload {
            roughness: layer.material.roughness,
            metalness: layer.material.metalness,
            opacity: layer.material.opacity,
        },
    }))
}

async fn clear(State(engine): State<SharedEngine>) -> StatusCode {
    let mut engine = engine.lock().expect("engine lock");
    engine.clear();
    StatusCode::NO_CONTENT
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsClientMessage {
    Generate {
        code: String,
        description: Option<String>,
        seed: Option<u32>,
    },
    Cancel,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsServerMessage {
    Summary(LayerSummary),
    Error(ErrorResponse),
}

async fn websocket(
    State(engine): State<SharedEngine>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, engine))
}

/// One generation may be in flight per socket; a `cancel` message flips the
/// engine's cancel token and the pending task resolves to `Cancelled`.
async fn handle_websocket(mut socket: WebSocket, engine: SharedEngine) {
    let mut pending: Option<tokio::task::JoinHandle<Result<LayerSummary, ApiError>>> = None;
    let mut cancel = None;

    loop {
        tokio::select! {
            result = async { pending.as_mut().expect("pending generation").await }, if pending.is_some() => {
                pending = None;
                cancel = None;
                let message = match result {
                    Ok(Ok(summary)) => WsServerMessage::Summary(summary),
                    Ok(Err(err)) => WsServerMessage::Error(err.body),
                    Err(join_err) => WsServerMessage::Error(
                        ApiError::bad_request(format!("generation task failed: {join_err}")).body,
                    ),
                };
                if send_ws(&mut socket, message).await.is_err() {
                    break;
                }
            }
            message = socket.recv() => {
                let Some(message) = message else { break };
                match message {
                    Ok(Message::Text(text)) => {
                        match serde_json::from_str::<WsClientMessage>(text.as_str()) {
                            Ok(WsClientMessage::Generate { code, description, seed }) => {
                                if pending.is_some() {
                                    let err = ApiError::bad_request(
                                        "a generation is already in flight",
                                    );
                                    if send_ws(&mut socket, WsServerMessage::Error(err.body)).await.is_err() {
                                        break;
                                    }
                                    continue;
                                }
                                let request = GenerateRequest {
                                    code,
                                    description: description.unwrap_or_default(),
                                    seed: seed.unwrap_or(0),
                                };
                                cancel = Some(engine.lock().expect("engine lock").cancel_token());
                                let engine = Arc::clone(&engine);
                                pending = Some(tokio::spawn(run_generation(engine, request)));
                            }
                            Ok(WsClientMessage::Cancel) => {
                                if let Some(token) = &cancel {
                                    token.cancel();
                                } else if send_ws(
                                    &mut socket,
                                    WsServerMessage::Error(
                                        ApiError::bad_request("nothing to cancel").body,
                                    ),
                                )
                                .await
                                .is_err()
                                {
                                    break;
                                }
                            }
                            Err(err) => {
                                let api = ApiError::bad_request(format!("invalid message: {err}"));
                                if send_ws(&mut socket, WsServerMessage::Error(api.body)).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    Ok(Message::Ping(payload)) => {
                        if socket.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Binary(_)) => {
                        let api = ApiError::bad_request("binary messages are not supported");
                        if send_ws(&mut socket, WsServerMessage::Error(api.body)).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Pong(_)) => {}
                    Ok(Message::Close(_)) => break,
                    Err(_) => break,
                }
            }
        }
    }
}

async fn send_ws(socket: &mut WebSocket, message: WsServerMessage) -> Result<(), ()> {
    let payload = serde_json::to_string(&message).map_err(|_| ())?;
    socket
        .send(Message::Text(payload.into()))
        .await
        .map_err(|_| ())
}

fn parse_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    if body.is_empty() {
        return Err(ApiError::bad_request("request body is required"));
    }
    serde_json::from_slice(body)
        .map_err(|err| ApiError::bad_request(format!("invalid JSON body: {err}")))
}
