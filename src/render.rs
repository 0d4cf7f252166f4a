//! Renderizado HTML de la página a partir de una instantánea del estado.
//!
//! La superficie (subida o resultados) se decide con `UploadState::surface`;
//! aquí sólo se formatea. Todo texto que venga del usuario o del backend se
//! escapa antes de insertarlo.

use std::fmt::Write as _;

use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::models::{AnalysisResult, BusinessMetrics, ClassScores, QualityMetrics, SentimentClass};
use crate::upload_state::{Surface, UploadState};

/// Marcador para porcentajes sin base (total = 0) o métricas ausentes.
pub const NOT_AVAILABLE: &str = "—";

/// Porcentaje de una clase sobre el total, con un decimal.
pub fn format_share(count: u64, total: u64) -> String {
    if total == 0 {
        return NOT_AVAILABLE.to_string();
    }
    format!("{:.1}%", count as f64 / total as f64 * 100.0)
}

/// Métrica de calidad en [0, 1] como porcentaje con dos decimales.
pub fn format_score(value: f64) -> String {
    if !value.is_finite() {
        return NOT_AVAILABLE.to_string();
    }
    format!("{:.2}%", value * 100.0)
}

pub fn format_index(value: f64) -> String {
    format!("{value:.2}")
}

pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}

/// Página completa.
pub fn render_page(state: &UploadState) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Review sentiment analysis</title>
<link rel="stylesheet" href="/styles.css">
<script src="/app.js" defer></script>
</head>
<body>
<header class="site-header">
<h1>Review sentiment analysis</h1>
</header>
<main class="site-content" id="app">
{}
</main>
</body>
</html>
"#,
        render_main(state)
    )
}

/// Contenido de `<main>`; el frontend lo sustituye tras cada acción.
pub fn render_main(state: &UploadState) -> String {
    match (state.surface(), state.result.as_ref()) {
        (Surface::Results, Some(result)) => render_results_surface(state, result),
        _ => render_upload_surface(state),
    }
}

fn render_upload_surface(state: &UploadState) -> String {
    let disabled = if state.controls_disabled() { " disabled" } else { "" };
    let mut html = String::new();

    html.push_str(
        "<div class=\"intro\">\n<h2>Upload a list of reviews</h2>\n\
         <p>Upload a CSV file with reviews for analysis</p>\n</div>\n",
    );

    let _ = write!(
        html,
        "<section class=\"upload\" id=\"upload\">\n\
         <label class=\"dropzone{disabled}\" id=\"dropzone\">\n\
         <input type=\"file\" id=\"file-input\" name=\"file\" accept=\".csv,text/csv\"{disabled}>\n\
         <span class=\"dropzone-hint\">Drag and drop a CSV file here, or click to choose one</span>\n"
    );
    if let Some(file) = &state.file {
        let _ = write!(
            html,
            "<span class=\"selected-file\">{} ({})</span>\n",
            encode_text(&file.name),
            format_size(file.size_bytes)
        );
    }
    html.push_str("</label>\n");

    if let Some(error) = &state.error {
        let _ = write!(
            html,
            "<div class=\"error\" role=\"alert\">{}</div>\n",
            encode_text(error)
        );
    }

    if state.is_loading() {
        let _ = write!(
            html,
            "<button type=\"button\" id=\"submit\" class=\"primary\"{disabled}>\
             <span class=\"spinner\"></span> Analyzing…</button>\n"
        );
    } else {
        let _ = write!(
            html,
            "<button type=\"button\" id=\"submit\" class=\"primary\"{disabled}>Submit</button>\n"
        );
    }
    html.push_str("</section>\n");

    if state.show_placeholder() {
        html.push_str(
            "<div class=\"placeholder\"><p>Results will appear here</p></div>\n",
        );
    }

    html
}

fn render_results_surface(state: &UploadState, result: &AnalysisResult) -> String {
    let mut html = String::new();

    html.push_str("<section class=\"results\" id=\"results\">\n<div class=\"results-header\">\n<h2>Analysis results</h2>\n");
    let mut caption = Vec::new();
    if let Some(file) = &state.file {
        caption.push(encode_text(&file.name).into_owned());
    }
    if let Some(at) = state.completed_at {
        caption.push(at.format("%Y-%m-%d %H:%M:%S UTC").to_string());
    }
    if !caption.is_empty() {
        let _ = write!(html, "<span class=\"caption\">{}</span>\n", caption.join(" · "));
    }
    html.push_str("<button type=\"button\" id=\"reset\">Analyze another file</button>\n</div>\n");

    html.push_str(&render_business(&result.business_metrics));
    if let Some(quality) = &result.quality_metrics {
        html.push_str(&render_quality(quality));
    }
    html.push_str(&render_images(result));
    html.push_str("</section>\n");
    html
}

fn render_business(metrics: &BusinessMetrics) -> String {
    let total = metrics.total_count;
    let mut html = String::from("<div class=\"business-metrics\">\n");

    let _ = write!(
        html,
        "<div class=\"card\"><span class=\"label\">Total reviews</span><span class=\"value\">{total}</span></div>\n"
    );
    for class in [SentimentClass::Positive, SentimentClass::Negative, SentimentClass::Neutral] {
        let count = metrics.counts.get(class);
        let _ = write!(
            html,
            "<div class=\"card {css}\"><span class=\"label\">{name}</span>\
             <span class=\"value\">{count}</span><span class=\"share\">{share}</span></div>\n",
            css = class.display_name().to_lowercase(),
            name = class.display_name(),
            share = format_share(count, total),
        );
    }
    let _ = write!(
        html,
        "<div class=\"card\"><span class=\"label\">Sentiment index</span><span class=\"value\">{}</span></div>\n",
        format_index(metrics.sentiment_index)
    );

    html.push_str("</div>\n");
    html
}

fn score_cells(scores: Option<&ClassScores>) -> String {
    match scores {
        Some(s) => format!(
            "<td>{}</td><td>{}</td><td>{}</td>",
            format_score(s.precision),
            format_score(s.recall),
            format_score(s.f1_score)
        ),
        None => format!("<td>{NOT_AVAILABLE}</td><td>{NOT_AVAILABLE}</td><td>{NOT_AVAILABLE}</td>"),
    }
}

fn render_quality(quality: &QualityMetrics) -> String {
    let mut html = String::from(
        "<div class=\"quality-metrics\">\n<h3>Model quality</h3>\n<table>\n\
         <thead><tr><th>Class</th><th>Precision</th><th>Recall</th><th>F1</th></tr></thead>\n<tbody>\n",
    );

    for class in SentimentClass::ALL {
        let _ = write!(
            html,
            "<tr><td>{} ({})</td>{}</tr>\n",
            class.display_name(),
            class.label_id(),
            score_cells(quality.class(class))
        );
    }
    let _ = write!(
        html,
        "<tr class=\"avg\"><td>Macro avg</td>{}</tr>\n",
        score_cells(Some(&quality.macro_avg))
    );
    let _ = write!(
        html,
        "<tr class=\"avg\"><td>Weighted avg</td>{}</tr>\n",
        score_cells(Some(&quality.weighted_avg))
    );
    html.push_str("</tbody>\n</table>\n");

    let accuracy = quality
        .accuracy
        .map(format_score)
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());
    let _ = write!(
        html,
        "<p class=\"accuracy\">Accuracy: <strong>{accuracy}</strong></p>\n</div>\n"
    );
    html
}

fn render_images(result: &AnalysisResult) -> String {
    let mut html = String::from("<div class=\"charts\">\n");
    match &result.images.sentiment_pie {
        Some(src) => {
            let _ = write!(
                html,
                "<figure><img src=\"{}\" alt=\"Sentiment distribution\"><figcaption>Sentiment distribution</figcaption></figure>\n",
                encode_double_quoted_attribute(src)
            );
        }
        None => html.push_str("<p class=\"no-chart\">No chart available</p>\n"),
    }
    if let Some(src) = &result.images.confusion_matrix {
        let _ = write!(
            html,
            "<figure><img src=\"{}\" alt=\"Confusion matrix\"><figcaption>Confusion matrix</figcaption></figure>\n",
            encode_double_quoted_attribute(src)
        );
    }
    html.push_str("</div>\n");
    html
}
