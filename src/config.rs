//! Carga y gestión de configuración de la aplicación (servidor local + servicio de análisis).

use std::env;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use url::Url;

const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:3322";
const DEFAULT_ANALYSIS_API_URL: &str = "http://localhost:8000/api/analyze";
const DEFAULT_TIMEOUT_SECS: u64 = 300;
const DEFAULT_MAX_UPLOAD_MB: u64 = 100;

/// Configuración completa de la aplicación.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server_addr: String,
    pub analysis_api_url: Url,
    /// Límite de espera de una petición de análisis. Sin límite en la versión web original.
    pub analysis_timeout: Duration,
    /// Tamaño máximo aceptado por el selector de ficheros, en bytes.
    pub max_upload_bytes: u64,
    pub open_browser: bool,
}

impl AppConfig {
    /// Carga la configuración desde variables de entorno (usando .env si existe).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Construye la configuración a partir de una función de búsqueda de claves.
    /// Separado de `from_env` para poder probarlo sin tocar el entorno del proceso.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server_addr =
            lookup("SERVER_ADDR").unwrap_or_else(|| DEFAULT_SERVER_ADDR.to_string());

        let analysis_api_url = parse_api_url(
            &lookup("ANALYSIS_API_URL").unwrap_or_else(|| DEFAULT_ANALYSIS_API_URL.to_string()),
        )?;

        let analysis_timeout = match lookup("ANALYSIS_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("ANALYSIS_TIMEOUT_SECS no es un número: {raw}"))?;
                if secs == 0 {
                    return Err(anyhow!("ANALYSIS_TIMEOUT_SECS debe ser mayor que 0"));
                }
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        let max_upload_bytes = match lookup("MAX_UPLOAD_MB") {
            Some(raw) => {
                let mb: u64 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("MAX_UPLOAD_MB no es un número: {raw}"))?;
                mb.checked_mul(1024 * 1024)
                    .ok_or_else(|| anyhow!("MAX_UPLOAD_MB demasiado grande: {mb}"))?
            }
            None => DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
        };

        let open_browser = match lookup("OPEN_BROWSER") {
            Some(raw) => parse_bool(&raw)?,
            None => true,
        };

        Ok(Self {
            server_addr,
            analysis_api_url,
            analysis_timeout,
            max_upload_bytes,
            open_browser,
        })
    }
}

fn parse_api_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .with_context(|| format!("ANALYSIS_API_URL no es una URL válida: {raw}"))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(anyhow!("Esquema no soportado en ANALYSIS_API_URL: {other}")),
    }
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(anyhow!("Valor booleano no reconocido: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() {
        let cfg = AppConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(cfg.server_addr, "127.0.0.1:3322");
        assert_eq!(cfg.analysis_api_url.as_str(), "http://localhost:8000/api/analyze");
        assert_eq!(cfg.analysis_timeout, Duration::from_secs(300));
        assert_eq!(cfg.max_upload_bytes, 100 * 1024 * 1024);
        assert!(cfg.open_browser);
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = AppConfig::from_lookup(lookup_from(&[
            ("SERVER_ADDR", "0.0.0.0:9000"),
            ("ANALYSIS_API_URL", "https://api.example.com/analyze"),
            ("ANALYSIS_TIMEOUT_SECS", "15"),
            ("MAX_UPLOAD_MB", "2"),
            ("OPEN_BROWSER", "no"),
        ]))
        .unwrap();
        assert_eq!(cfg.server_addr, "0.0.0.0:9000");
        assert_eq!(cfg.analysis_api_url.host_str(), Some("api.example.com"));
        assert_eq!(cfg.analysis_timeout, Duration::from_secs(15));
        assert_eq!(cfg.max_upload_bytes, 2 * 1024 * 1024);
        assert!(!cfg.open_browser);
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(AppConfig::from_lookup(lookup_from(&[("ANALYSIS_API_URL", "ftp://x/y")])).is_err());
        assert!(AppConfig::from_lookup(lookup_from(&[("ANALYSIS_API_URL", "no es url")])).is_err());
        assert!(AppConfig::from_lookup(lookup_from(&[("ANALYSIS_TIMEOUT_SECS", "0")])).is_err());
        assert!(AppConfig::from_lookup(lookup_from(&[("MAX_UPLOAD_MB", "muchos")])).is_err());
        assert!(AppConfig::from_lookup(lookup_from(&[("MAX_UPLOAD_MB", "18446744073709551615")])).is_err());
        assert!(AppConfig::from_lookup(lookup_from(&[("OPEN_BROWSER", "quizás")])).is_err());
    }
}
