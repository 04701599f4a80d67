//! Configuração unificada via TOML.
//!
//! Caminhos do device e tempos da thread de telemetria num único
//! `simtemp.toml`, ao lado do executável ou em `$SIMTEMP_CONFIG`.

use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Variável de ambiente que sobrepõe o caminho padrão do config.
pub const CONFIG_ENV: &str = "SIMTEMP_CONFIG";

/// Erros ao carregar ou salvar configuração.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Erro de parse: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Erro de serialização: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Erro de I/O em {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

impl ConfigError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        ConfigError::Io {
            path: path.display().to_string(),
            source,
        }
    }

    fn is_missing_file(&self) -> bool {
        matches!(self, ConfigError::Io { source, .. } if source.kind() == ErrorKind::NotFound)
    }
}

/// Localização do device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Device de stream (registros binários)
    pub stream_path: PathBuf,
    /// Diretório com `sampling_ms`, `threshold_mC` e `mode`
    pub params_dir: PathBuf,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            stream_path: PathBuf::from("/dev/simtemp"),
            params_dir: PathBuf::from("/sys/class/misc/simtemp"),
        }
    }
}

/// Tempos e buffers da thread de telemetria.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Espera após leitura vazia (ms)
    pub empty_backoff_ms: u64,
    /// Espera após registro malformado (ms)
    pub error_backoff_ms: u64,
    /// Capacidade do channel thread → consumidor
    pub channel_capacity: usize,
    /// Amostras mantidas no histórico da view
    pub history_size: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            empty_backoff_ms: 100,
            error_backoff_ms: 250,
            channel_capacity: 64,
            history_size: 120,
        }
    }
}

/// Configuração raiz do aplicativo.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub device: DeviceConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Lê e interpreta o arquivo, sem fallback.
    pub fn try_load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        Ok(toml::from_str(&content)?)
    }

    /// Carrega o config; qualquer falha cai nos padrões do device.
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(config) => {
                info!("Configuração carregada de {}", path.display());
                config
            }
            Err(e) if e.is_missing_file() => {
                info!("{} não existe, usando configuração padrão", path.display());
                AppConfig::default()
            }
            Err(e) => {
                warn!("{e}; usando configuração padrão");
                AppConfig::default()
            }
        }
    }

    /// Salva configuração em arquivo TOML.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| ConfigError::io(path, e))?;
        info!("Configuração salva em {}", path.display());
        Ok(())
    }

    /// `$SIMTEMP_CONFIG`, ou `simtemp.toml` ao lado do executável.
    pub fn default_path() -> PathBuf {
        if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
            return PathBuf::from(path);
        }
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join("simtemp.toml")))
            .unwrap_or_else(|| PathBuf::from("simtemp.toml"))
    }

    /// Valida a configuração e retorna lista de erros.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.device.stream_path.as_os_str().is_empty() {
            errors.push("Caminho do device de stream vazio".into());
        }
        if self.device.params_dir.as_os_str().is_empty() {
            errors.push("Diretório de parâmetros vazio".into());
        }
        if self.telemetry.empty_backoff_ms == 0 || self.telemetry.empty_backoff_ms > 1000 {
            errors.push(format!(
                "Backoff de leitura vazia inválido: {} ms (1–1000)",
                self.telemetry.empty_backoff_ms
            ));
        }
        if self.telemetry.error_backoff_ms == 0 || self.telemetry.error_backoff_ms > 5000 {
            errors.push(format!(
                "Backoff de erro inválido: {} ms (1–5000)",
                self.telemetry.error_backoff_ms
            ));
        }
        if self.telemetry.channel_capacity == 0 {
            errors.push("Capacidade do channel não pode ser 0".into());
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_the_simtemp_device() {
        let config = AppConfig::default();
        assert!(config.validate().is_empty(), "Erros: {:?}", config.validate());
        assert_eq!(config.device.stream_path, PathBuf::from("/dev/simtemp"));
        assert_eq!(config.telemetry.empty_backoff_ms, 100);
    }

    #[test]
    fn try_load_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("simtemp.toml");
        std::fs::write(&path, "[telemetry]\nempty_backoff_ms = \"rápido\"\n").unwrap();
        assert!(matches!(AppConfig::try_load(&path), Err(ConfigError::Parse(_))));
        // `load` cai nos padrões
        assert_eq!(AppConfig::load(&path).telemetry.empty_backoff_ms, 100);
    }

    #[test]
    fn try_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::try_load(&dir.path().join("nenhum.toml")).unwrap_err();
        assert!(err.is_missing_file());
    }

    #[test]
    fn roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.device.stream_path, parsed.device.stream_path);
        assert_eq!(
            config.telemetry.empty_backoff_ms,
            parsed.telemetry.empty_backoff_ms
        );
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let partial = r#"
[device]
stream_path = "/tmp/simtemp"
"#;
        let config: AppConfig = toml::from_str(partial).unwrap();
        assert_eq!(config.device.stream_path, PathBuf::from("/tmp/simtemp"));
        // Outros campos devem ter valor padrão
        assert_eq!(config.device.params_dir, PathBuf::from("/sys/class/misc/simtemp"));
        assert_eq!(config.telemetry.empty_backoff_ms, 100);
    }

    #[test]
    fn rejects_zero_backoff() {
        let mut config = AppConfig::default();
        config.telemetry.empty_backoff_ms = 0;
        config.telemetry.channel_capacity = 0;
        assert_eq!(config.validate().len(), 2);
    }

    #[test]
    fn load_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("simtemp.toml"));
        assert_eq!(config.telemetry.channel_capacity, 64);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("simtemp.toml");
        let mut config = AppConfig::default();
        config.telemetry.history_size = 10;
        config.save(&path).unwrap();
        assert_eq!(AppConfig::load(&path).telemetry.history_size, 10);
    }
}
