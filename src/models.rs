//! Modelos de dominio: fichero seleccionado y resultado del servicio de análisis.
//!
//! Los nombres de campo del resultado siguen el JSON que devuelve el backend
//! (`business_metrics`, `quality_metrics` con el formato de un
//! `classification_report`, e `images` con data URIs).

use axum::body::Bytes;
use serde::{Deserialize, Serialize};

/// Fichero soltado en el selector. Sólo vive en memoria.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectedFile {
    pub name: String,
    pub size_bytes: u64,
    #[serde(skip)]
    pub content: Bytes,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        let content = content.into();
        Self {
            name: name.into(),
            size_bytes: content.len() as u64,
            content,
        }
    }

    /// Comprobación de extensión: sufijo `.csv` exacto, sensible a mayúsculas.
    pub fn has_csv_extension(&self) -> bool {
        self.name.ends_with(".csv")
    }
}

/// Clases de sentimiento tal y como las etiqueta el modelo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentimentClass {
    Neutral,
    Positive,
    Negative,
}

impl SentimentClass {
    /// Orden de las etiquetas numéricas 0/1/2.
    pub const ALL: [SentimentClass; 3] = [Self::Neutral, Self::Positive, Self::Negative];

    pub fn label_id(self) -> u8 {
        match self {
            Self::Neutral => 0,
            Self::Positive => 1,
            Self::Negative => 2,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Neutral => "Neutral",
            Self::Positive => "Positive",
            Self::Negative => "Negative",
        }
    }
}

/// Respuesta completa del servicio de análisis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default)]
    pub business_metrics: BusinessMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_metrics: Option<QualityMetrics>,
    #[serde(default)]
    pub images: ResultImages,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BusinessMetrics {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub counts: ClassCounts,
    #[serde(default)]
    pub sentiment_index: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCounts {
    #[serde(rename = "Positive", default)]
    pub positive: u64,
    #[serde(rename = "Negative", default)]
    pub negative: u64,
    #[serde(rename = "Neutral", default)]
    pub neutral: u64,
}

impl ClassCounts {
    pub fn get(&self, class: SentimentClass) -> u64 {
        match class {
            SentimentClass::Neutral => self.neutral,
            SentimentClass::Positive => self.positive,
            SentimentClass::Negative => self.negative,
        }
    }

    pub fn sum(&self) -> u64 {
        self.positive + self.negative + self.neutral
    }
}

/// Fila de un `classification_report`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassScores {
    pub precision: f64,
    pub recall: f64,
    #[serde(rename = "f1-score")]
    pub f1_score: f64,
    #[serde(default)]
    pub support: f64,
}

/// Métricas de calidad; sólo existen si el CSV traía etiquetas reales.
/// Una clase ausente en los datos no aparece en el informe, de ahí los `Option`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    #[serde(rename = "0", default, skip_serializing_if = "Option::is_none")]
    pub neutral: Option<ClassScores>,
    #[serde(rename = "1", default, skip_serializing_if = "Option::is_none")]
    pub positive: Option<ClassScores>,
    #[serde(rename = "2", default, skip_serializing_if = "Option::is_none")]
    pub negative: Option<ClassScores>,
    #[serde(rename = "macro avg")]
    pub macro_avg: ClassScores,
    #[serde(rename = "weighted avg")]
    pub weighted_avg: ClassScores,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
}

impl QualityMetrics {
    pub fn class(&self, class: SentimentClass) -> Option<&ClassScores> {
        match class {
            SentimentClass::Neutral => self.neutral.as_ref(),
            SentimentClass::Positive => self.positive.as_ref(),
            SentimentClass::Negative => self.negative.as_ref(),
        }
    }
}

/// Imágenes embebidas (data URIs); el cliente no las decodifica.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultImages {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment_pie: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confusion_matrix: Option<String>,
}

impl AnalysisResult {
    /// Invariantes que se asumen del backend pero no se imponen en el cliente.
    /// Devuelve una descripción por cada incoherencia detectada.
    pub fn consistency_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let metrics = &self.business_metrics;

        if metrics.counts.sum() != metrics.total_count {
            warnings.push(format!(
                "la suma de clases ({}) no coincide con total_count ({})",
                metrics.counts.sum(),
                metrics.total_count
            ));
        }
        if self.quality_metrics.is_some() != self.images.confusion_matrix.is_some() {
            warnings.push(
                "quality_metrics y images.confusion_matrix deberían venir juntos".to_string(),
            );
        }
        if metrics.total_count > 0 && self.images.sentiment_pie.is_none() {
            warnings.push("falta images.sentiment_pie con un dataset no vacío".to_string());
        }

        warnings
    }
}
