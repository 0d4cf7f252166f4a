//! Errores de una petición de análisis: validación local y fallos remotos.

use thiserror::Error;

pub const MSG_NO_FILE: &str = "please select a file";
pub const MSG_NOT_CSV: &str = "please upload a CSV file";
pub const MSG_GENERIC_FAILURE: &str = "analysis failed, please try again";
pub const MSG_FILE_TOO_LARGE: &str = "file exceeds the size limit";

/// Fallos detectados antes de enviar nada por la red.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{}", MSG_NO_FILE)]
    NoFile,
    #[error("{}", MSG_NOT_CSV)]
    NotCsv,
}

/// Fallos de la llamada al servicio de análisis.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// Respuesta no-2xx con un campo `detail` utilizable.
    #[error("el servicio respondió {status}: {detail}")]
    Application { status: u16, detail: String },

    /// Respuesta no-2xx sin `detail`.
    #[error("el servicio respondió con estado HTTP {0}")]
    Status(u16),

    #[error("error de red: {0}")]
    Transport(String),

    #[error("respuesta no válida del servicio: {0}")]
    Decode(String),

    #[error("sin respuesta tras {0} segundos")]
    Timeout(u64),
}

impl AnalysisError {
    /// Mensaje visible para el usuario: el `detail` del backend tal cual o el genérico.
    pub fn user_message(&self) -> String {
        match self {
            Self::Application { detail, .. } => detail.clone(),
            _ => MSG_GENERIC_FAILURE.to_string(),
        }
    }
}

impl From<reqwest::Error> for AnalysisError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_application_errors_surface_their_detail() {
        let app = AnalysisError::Application {
            status: 400,
            detail: "bad csv".to_string(),
        };
        assert_eq!(app.user_message(), "bad csv");

        for err in [
            AnalysisError::Status(502),
            AnalysisError::Transport("connection refused".to_string()),
            AnalysisError::Decode("expected value".to_string()),
            AnalysisError::Timeout(30),
        ] {
            assert_eq!(err.user_message(), MSG_GENERIC_FAILURE);
        }
    }

    #[test]
    fn validation_messages_are_fixed() {
        assert_eq!(ValidationError::NoFile.to_string(), "please select a file");
        assert_eq!(ValidationError::NotCsv.to_string(), "please upload a CSV file");
    }
}
