//! Cliente del servicio remoto de análisis de reseñas.
//!
//! El servicio recibe un `POST` multipart con un único campo `file` y responde
//! con el JSON de `AnalysisResult`, o con un estado no-2xx que puede traer un
//! campo `detail` con el mensaje para el usuario.

use anyhow::Result;
use futures::future::BoxFuture;
use mime_guess::MimeGuess;
use reqwest::multipart::{Form, Part};
use tracing::{info, warn};
use url::Url;

use crate::config::AppConfig;
use crate::errors::AnalysisError;
use crate::models::{AnalysisResult, SelectedFile};

/// Punto de extensión para sustituir el backend real (p. ej. en pruebas).
pub trait AnalysisService: Send + Sync {
    fn analyze(&self, file: SelectedFile) -> BoxFuture<'_, Result<AnalysisResult, AnalysisError>>;
}

/// Implementación HTTP sobre `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpAnalysisClient {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpAnalysisClient {
    /// Construye el cliente a partir de la configuración.
    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            endpoint: cfg.analysis_api_url.clone(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn post_file(&self, file: SelectedFile) -> Result<AnalysisResult, AnalysisError> {
        let mime = MimeGuess::from_path(&file.name).first_or_octet_stream();
        let part = Part::bytes(file.content.to_vec())
            .file_name(file.name.clone())
            .mime_str(mime.as_ref())?;
        let form = Form::new().part("file", part);

        info!(
            "Enviando '{}' ({} bytes) a {}",
            file.name, file.size_bytes, self.endpoint
        );
        let response = self
            .client
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let err = error_from_response(status.as_u16(), &body);
            warn!("El servicio de análisis rechazó '{}': {}", file.name, err);
            return Err(err);
        }

        let result: AnalysisResult = serde_json::from_slice(&body)
            .map_err(|e| AnalysisError::Decode(e.to_string()))?;
        for warning in result.consistency_warnings() {
            warn!("Resultado de '{}' incoherente: {}", file.name, warning);
        }
        Ok(result)
    }
}

impl AnalysisService for HttpAnalysisClient {
    fn analyze(&self, file: SelectedFile) -> BoxFuture<'_, Result<AnalysisResult, AnalysisError>> {
        Box::pin(self.post_file(file))
    }
}

/// Traduce una respuesta no-2xx. Sólo un `detail` de tipo texto no vacío se
/// considera utilizable; el resto (listas de validación, HTML, cuerpo vacío)
/// cae en el mensaje genérico.
pub(crate) fn error_from_response(status: u16, body: &[u8]) -> AnalysisError {
    let detail = serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|value| match value.get("detail") {
            Some(serde_json::Value::String(detail)) if !detail.trim().is_empty() => {
                Some(detail.clone())
            }
            _ => None,
        });

    match detail {
        Some(detail) => AnalysisError::Application { status, detail },
        None => AnalysisError::Status(status),
    }
}
