use axum::{
    body::Bytes,
    extract::{
        multipart::{Field, MultipartError},
        DefaultBodyLimit, Multipart, State,
    },
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::{
    app_state::AppState,
    errors::MSG_FILE_TOO_LARGE,
    models::SelectedFile,
    render,
    upload_state::{Action, Surface, UploadState},
};

// --- Respuestas de la API ---

/// Instantánea del estado más los indicadores derivados que usa el frontend.
#[derive(Serialize)]
pub struct StateResponse {
    #[serde(flatten)]
    state: UploadState,
    surface: Surface,
    loading: bool,
    controls_disabled: bool,
    show_placeholder: bool,
}

impl From<UploadState> for StateResponse {
    fn from(state: UploadState) -> Self {
        Self {
            surface: state.surface(),
            loading: state.is_loading(),
            controls_disabled: state.controls_disabled(),
            show_placeholder: state.show_placeholder(),
            state,
        }
    }
}

// --- Router ---

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/view", get(view_handler))
        .route("/api/state", get(state_handler))
        .route(
            "/api/drop",
            // El límite se aplica por fichero en `read_file_field`.
            post(drop_handler).layer(DefaultBodyLimit::disable()),
        )
        .route("/api/submit", post(submit_handler))
        .route("/api/reset", post(reset_handler))
        .route("/api/shutdown", post(shutdown_handler))
        .with_state(app_state)
}

// --- Handlers ---

#[axum::debug_handler]
async fn index_handler(State(state): State<AppState>) -> Html<String> {
    Html(render::render_page(&state.snapshot()))
}

/// Sólo el contenido de `<main>`, para refrescar la página sin recargarla.
#[axum::debug_handler]
async fn view_handler(State(state): State<AppState>) -> Html<String> {
    Html(render::render_main(&state.snapshot()))
}

#[axum::debug_handler]
async fn state_handler(State(state): State<AppState>) -> Json<StateResponse> {
    Json(state.snapshot().into())
}

/// Recibe lo que el usuario soltó en el selector. Se conserva el primer
/// fichero que cabe en el límite; el resto se consume sin guardarlo.
#[axum::debug_handler]
async fn drop_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<StateResponse>, (StatusCode, Json<serde_json::Value>)> {
    let max_bytes = state.config.max_upload_bytes;
    let mut accepted: Option<SelectedFile> = None;
    let mut rejected = 0usize;
    let mut discarded = 0usize;

    loop {
        let mut field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(multipart_error(e)),
        };
        if field.name() != Some("file") {
            continue;
        }
        let name = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_default();

        let limit = if accepted.is_some() { 0 } else { max_bytes };
        match read_file_field(&mut field, limit).await {
            Ok(Some(content)) if accepted.is_none() => {
                accepted = Some(SelectedFile::new(name, content));
            }
            Ok(Some(_)) => discarded += 1,
            Ok(None) if accepted.is_some() => discarded += 1,
            Ok(None) => {
                warn!("Fichero '{}' descartado: supera {} bytes", name, max_bytes);
                rejected += 1;
            }
            Err(e) => return Err(multipart_error(e)),
        }
    }

    let action = match accepted {
        Some(file) => {
            info!(
                "Fichero recibido: '{}' ({} descartados)",
                file.name,
                rejected + discarded
            );
            Action::FilesDropped(vec![file])
        }
        None if rejected > 0 => Action::FilesRejected {
            reason: MSG_FILE_TOO_LARGE.to_string(),
        },
        None => Action::FilesDropped(Vec::new()),
    };

    Ok(Json(state.dispatch(action).state.into()))
}

/// Lee un campo por trozos. Devuelve `None` si supera `max_bytes`; en ese
/// caso el resto del campo se consume sin acumularlo.
async fn read_file_field(
    field: &mut Field<'_>,
    max_bytes: u64,
) -> Result<Option<Bytes>, MultipartError> {
    let mut buffer = Vec::new();
    let mut oversized = false;

    while let Some(chunk) = field.chunk().await? {
        if oversized {
            continue;
        }
        if (buffer.len() + chunk.len()) as u64 > max_bytes {
            oversized = true;
            buffer = Vec::new();
            continue;
        }
        buffer.extend_from_slice(&chunk);
    }

    Ok((!oversized).then(|| Bytes::from(buffer)))
}

fn multipart_error(err: MultipartError) -> (StatusCode, Json<serde_json::Value>) {
    let status = err.status();
    warn!("Error leyendo la subida: {}", err.body_text());
    (
        status,
        Json(json!({"error": format!("No se pudo leer el fichero subido: {}", err.body_text())})),
    )
}

/// 202 si se lanzó la petición de análisis; 200 si la acción no tuvo efecto
/// o falló la validación local.
#[axum::debug_handler]
async fn submit_handler(State(state): State<AppState>) -> (StatusCode, Json<StateResponse>) {
    let dispatched = state.submit();
    let status = if dispatched.task.is_some() {
        StatusCode::ACCEPTED
    } else {
        StatusCode::OK
    };
    (status, Json(dispatched.state.into()))
}

#[axum::debug_handler]
async fn reset_handler(State(state): State<AppState>) -> Json<StateResponse> {
    Json(state.dispatch(Action::Reset).state.into())
}

// --- Handler de Apagado ---

#[axum::debug_handler]
async fn shutdown_handler(State(state): State<AppState>) -> impl IntoResponse {
    info!("Petición de apagado recibida.");
    let sender = state
        .shutdown_sender
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .take();
    if let Some(sender) = sender {
        let _ = sender.send(());
    }
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis_client::AnalysisService, config::AppConfig, errors::AnalysisError,
        models::AnalysisResult,
    };
    use futures::future::BoxFuture;
    use std::sync::Arc;
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    struct EchoService;

    impl AnalysisService for EchoService {
        fn analyze(&self, file: SelectedFile) -> BoxFuture<'_, Result<AnalysisResult, AnalysisError>> {
            Box::pin(async move {
                if file.content.is_empty() {
                    return Err(AnalysisError::Application {
                        status: 400,
                        detail: "empty csv".into(),
                    });
                }
                serde_json::from_value(json!({
                    "business_metrics": {
                        "sentiment_index": 0.3,
                        "total_count": 100,
                        "counts": {"Neutral": 10, "Positive": 60, "Negative": 30}
                    },
                    "images": {"sentiment_pie": "data:image/png;base64,AAAA"}
                }))
                .map_err(|e| AnalysisError::Decode(e.to_string()))
            })
        }
    }

    async fn spawn_app(max_upload_mb: &str) -> (String, AppState, oneshot::Receiver<()>) {
        let limit = max_upload_mb.to_string();
        let config =
            AppConfig::from_lookup(move |key| (key == "MAX_UPLOAD_MB").then(|| limit.clone()))
                .unwrap();
        let (tx, rx) = oneshot::channel();
        let app_state = AppState::new(config, Arc::new(EchoService), Some(tx));
        let router = create_router(app_state.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        (format!("http://{addr}"), app_state, rx)
    }

    fn file_part(name: &str, content: impl Into<Vec<u8>>) -> reqwest::multipart::Part {
        reqwest::multipart::Part::bytes(content.into()).file_name(name.to_string())
    }

    fn file_form(name: &str, content: &str) -> reqwest::multipart::Form {
        reqwest::multipart::Form::new().part("file", file_part(name, content))
    }

    async fn wait_until_settled(state: &AppState) -> UploadState {
        for _ in 0..100 {
            let snapshot = state.snapshot();
            if !snapshot.is_loading() {
                return snapshot;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("la petición no terminó");
    }

    #[tokio::test]
    async fn full_flow_over_http() {
        let (base, app_state, _rx) = spawn_app("1").await;
        let http = reqwest::Client::new();

        let page = http.get(format!("{base}/")).send().await.unwrap().text().await.unwrap();
        assert!(page.contains("Results will appear here"));

        let dropped: serde_json::Value = http
            .post(format!("{base}/api/drop"))
            .multipart(file_form("reviews.csv", "text\nbueno\n"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(dropped["status"], "idle");
        assert_eq!(dropped["file"]["name"], "reviews.csv");
        assert_eq!(dropped["show_placeholder"], false);

        let submitted = http.post(format!("{base}/api/submit")).send().await.unwrap();
        assert_eq!(submitted.status(), StatusCode::ACCEPTED);

        let settled = wait_until_settled(&app_state).await;
        assert_eq!(settled.surface(), Surface::Results);

        let view = http.get(format!("{base}/api/view")).send().await.unwrap().text().await.unwrap();
        assert!(view.contains("60.0%"));

        let reset: serde_json::Value = http
            .post(format!("{base}/api/reset"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(reset["status"], "idle");
        assert_eq!(reset["surface"], "upload");
        assert!(reset["file"].is_null());
        assert!(reset["result"].is_null());
    }

    #[tokio::test]
    async fn submit_without_file_is_a_local_error() {
        let (base, _app_state, _rx) = spawn_app("1").await;
        let response = reqwest::Client::new()
            .post(format!("{base}/api/submit"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["status"], "failed");
        assert_eq!(body["error"], "please select a file");
    }

    #[tokio::test]
    async fn oversized_file_is_rejected_at_the_picker() {
        let (base, app_state, _rx) = spawn_app("0").await;
        let body: serde_json::Value = reqwest::Client::new()
            .post(format!("{base}/api/drop"))
            .multipart(file_form("reviews.csv", "text\nbueno\n"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "failed");
        assert_eq!(body["error"], MSG_FILE_TOO_LARGE);
        assert!(app_state.snapshot().file.is_none());
    }

    #[tokio::test]
    async fn multi_file_drop_keeps_first_even_when_total_exceeds_limit() {
        let (base, app_state, _rx) = spawn_app("1").await;
        let mut first = b"text\n".to_vec();
        first.resize(700 * 1024, b'a');
        let second = vec![b'b'; 700 * 1024];
        let form = reqwest::multipart::Form::new()
            .part("file", file_part("reviews.csv", first))
            .part("file", file_part("other.csv", second));

        let response = reqwest::Client::new()
            .post(format!("{base}/api/drop"))
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["status"], "idle");
        assert!(body["error"].is_null());
        assert_eq!(body["file"]["name"], "reviews.csv");

        let file = app_state.snapshot().file.expect("debe conservarse el primer fichero");
        assert_eq!(file.size_bytes, 700 * 1024);
    }

    #[tokio::test]
    async fn oversized_first_file_falls_back_to_next_that_fits() {
        let (base, app_state, _rx) = spawn_app("1").await;
        let form = reqwest::multipart::Form::new()
            .part("file", file_part("big.csv", vec![b'a'; 1024 * 1024 + 1]))
            .part("file", file_part("small.csv", "text\nbueno\n"));

        let body: serde_json::Value = reqwest::Client::new()
            .post(format!("{base}/api/drop"))
            .multipart(form)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "idle");
        assert_eq!(body["file"]["name"], "small.csv");
        assert!(app_state.snapshot().error.is_none());
    }

    #[tokio::test]
    async fn shutdown_fires_the_signal_once() {
        let (base, _app_state, rx) = spawn_app("1").await;
        let http = reqwest::Client::new();
        for _ in 0..2 {
            let response = http.post(format!("{base}/api/shutdown")).send().await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
        assert!(rx.await.is_ok());
    }
}
