//! Máquina de estados de subida y análisis.
//!
//! Todo el estado mutable de la página vive en un único valor `UploadState`
//! que sólo cambia a través de `reduce`. El reductor es puro: no hace E/S,
//! devuelve el nuevo estado y, como mucho, un `Effect` que el llamador debe
//! ejecutar (lanzar la petición de análisis).

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::errors::{AnalysisError, ValidationError};
use crate::models::{AnalysisResult, SelectedFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    #[default]
    Idle,
    /// Estado transitorio dentro de `reduce(Submit)`; nunca queda almacenado.
    Validating,
    InFlight,
    Succeeded,
    Failed,
}

/// Superficie principal a mostrar, derivada del estado.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Surface {
    Upload,
    Results,
}

/// Instantánea inmutable del estado de la página.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UploadState {
    pub status: SubmissionStatus,
    pub file: Option<SelectedFile>,
    pub error: Option<String>,
    pub result: Option<AnalysisResult>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Identificador de la petición en curso; sólo con `InFlight`.
    pub submission_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub enum Action {
    /// El selector entrega uno o más ficheros. Se conserva el primero.
    FilesDropped(Vec<SelectedFile>),
    /// El selector descartó todo lo soltado (p. ej. por tamaño).
    FilesRejected { reason: String },
    /// Pulsación de "enviar". El identificador lo genera el llamador.
    Submit { submission_id: Uuid },
    AnalysisSucceeded {
        submission_id: Uuid,
        result: AnalysisResult,
        completed_at: DateTime<Utc>,
    },
    AnalysisFailed {
        submission_id: Uuid,
        error: AnalysisError,
    },
    Reset,
}

/// Efecto secundario pedido por una transición.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    StartAnalysis {
        submission_id: Uuid,
        file: SelectedFile,
    },
}

#[derive(Debug, Clone)]
pub struct Transition {
    pub state: UploadState,
    pub effect: Option<Effect>,
}

impl Transition {
    fn unchanged(state: &UploadState) -> Self {
        Self {
            state: state.clone(),
            effect: None,
        }
    }

    fn to(state: UploadState) -> Self {
        Self {
            state,
            effect: None,
        }
    }
}

/// Guardas de envío en orden estricto: primero "sin fichero", luego la extensión.
pub fn validate_submission(file: Option<&SelectedFile>) -> Result<&SelectedFile, ValidationError> {
    let file = file.ok_or(ValidationError::NoFile)?;
    if !file.has_csv_extension() {
        return Err(ValidationError::NotCsv);
    }
    Ok(file)
}

/// Aplica una acción al estado actual.
pub fn reduce(state: &UploadState, action: Action) -> Transition {
    use SubmissionStatus::*;

    match (state.status, action) {
        // Con una petición en curso el selector y los botones están deshabilitados.
        (InFlight, Action::FilesDropped(_))
        | (InFlight, Action::FilesRejected { .. })
        | (InFlight, Action::Submit { .. })
        | (InFlight, Action::Reset) => Transition::unchanged(state),

        (Idle | Failed, Action::FilesDropped(files)) => {
            let dropped = files.len();
            let Some(first) = files.into_iter().next() else {
                return Transition::unchanged(state);
            };
            if dropped > 1 {
                debug!("Se soltaron {dropped} ficheros; se conserva sólo '{}'", first.name);
            }
            Transition::to(UploadState {
                status: Idle,
                file: Some(first),
                ..UploadState::default()
            })
        }

        (Idle | Failed, Action::FilesRejected { reason }) => Transition::to(UploadState {
            status: Failed,
            error: Some(reason),
            ..state.clone()
        }),

        (Idle | Failed, Action::Submit { submission_id }) => {
            let validating = UploadState {
                status: Validating,
                ..state.clone()
            };
            match validate_submission(state.file.as_ref()).cloned() {
                Err(err) => Transition::to(UploadState {
                    status: Failed,
                    error: Some(err.to_string()),
                    ..validating
                }),
                Ok(file) => {
                    Transition {
                        state: UploadState {
                            status: InFlight,
                            error: None,
                            submission_id: Some(submission_id),
                            ..validating
                        },
                        effect: Some(Effect::StartAnalysis {
                            submission_id,
                            file,
                        }),
                    }
                }
            }
        }

        (
            InFlight,
            Action::AnalysisSucceeded {
                submission_id,
                result,
                completed_at,
            },
        ) if state.submission_id == Some(submission_id) => Transition::to(UploadState {
            status: Succeeded,
            file: state.file.clone(),
            error: None,
            result: Some(result),
            completed_at: Some(completed_at),
            submission_id: None,
        }),

        (InFlight, Action::AnalysisFailed { submission_id, error })
            if state.submission_id == Some(submission_id) =>
        {
            Transition::to(UploadState {
                status: Failed,
                file: state.file.clone(),
                error: Some(error.user_message()),
                result: None,
                completed_at: None,
                submission_id: None,
            })
        }

        (Idle | Failed | Succeeded, Action::Reset) => Transition::to(UploadState::default()),

        // Resultados de peticiones antiguas, o acciones sin efecto en este estado.
        _ => Transition::unchanged(state),
    }
}

impl UploadState {
    pub fn surface(&self) -> Surface {
        match self.status {
            SubmissionStatus::Succeeded => Surface::Results,
            _ => Surface::Upload,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.status == SubmissionStatus::InFlight
    }

    /// Selector y botón de envío deshabilitados.
    pub fn controls_disabled(&self) -> bool {
        self.is_loading()
    }

    /// "Los resultados aparecerán aquí": en reposo y sin fichero.
    pub fn show_placeholder(&self) -> bool {
        self.status == SubmissionStatus::Idle && self.file.is_none()
    }
}
