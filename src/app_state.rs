use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::{
    analysis_client::AnalysisService,
    config::AppConfig,
    errors::AnalysisError,
    models::SelectedFile,
    upload_state::{reduce, Action, Effect, UploadState},
};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub analysis: Arc<dyn AnalysisService>,
    pub upload: Arc<Mutex<UploadState>>,
    pub shutdown_sender: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

/// Resultado de despachar una acción: el estado resultante y, si se lanzó
/// una petición, la tarea que la ejecuta.
pub struct Dispatched {
    pub state: UploadState,
    pub task: Option<JoinHandle<()>>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        analysis: Arc<dyn AnalysisService>,
        shutdown_sender: Option<oneshot::Sender<()>>,
    ) -> Self {
        Self {
            config,
            analysis,
            upload: Arc::new(Mutex::new(UploadState::default())),
            shutdown_sender: Arc::new(Mutex::new(shutdown_sender)),
        }
    }

    pub fn snapshot(&self) -> UploadState {
        self.upload
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Aplica la acción bajo el lock y ejecuta el efecto resultante fuera de él.
    pub fn dispatch(&self, action: Action) -> Dispatched {
        let transition = {
            let mut current = self.upload.lock().unwrap_or_else(PoisonError::into_inner);
            let transition = reduce(&current, action);
            if current.status != transition.state.status {
                debug!("Estado: {:?} -> {:?}", current.status, transition.state.status);
            }
            *current = transition.state.clone();
            transition
        };

        let task = transition.effect.map(|effect| match effect {
            Effect::StartAnalysis {
                submission_id,
                file,
            } => self.spawn_analysis(submission_id, file),
        });

        Dispatched {
            state: transition.state,
            task,
        }
    }

    pub fn submit(&self) -> Dispatched {
        self.dispatch(Action::Submit {
            submission_id: Uuid::new_v4(),
        })
    }

    fn spawn_analysis(&self, submission_id: Uuid, file: SelectedFile) -> JoinHandle<()> {
        let state = self.clone();
        tokio::spawn(async move {
            let timeout = state.config.analysis_timeout;
            let file_name = file.name.clone();
            let outcome = tokio::time::timeout(timeout, state.analysis.analyze(file))
                .await
                .unwrap_or_else(|_| Err(AnalysisError::Timeout(timeout.as_secs())));

            let action = match outcome {
                Ok(result) => {
                    info!(
                        "Análisis de '{}' completado: {} reseñas",
                        file_name, result.business_metrics.total_count
                    );
                    Action::AnalysisSucceeded {
                        submission_id,
                        result,
                        completed_at: Utc::now(),
                    }
                }
                Err(err) => {
                    error!("Error analizando '{}': {}", file_name, err);
                    Action::AnalysisFailed {
                        submission_id,
                        error: err,
                    }
                }
            };
            state.dispatch(action);
        })
    }
}
