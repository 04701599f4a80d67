//! Cliente dos arquivos de parâmetros do device.
//!
//! Cada parâmetro vive num arquivo texto próprio dentro do diretório do
//! device (`sampling_ms`, `threshold_mC`, `mode`). O backend é a fonte da
//! verdade: este cliente não guarda cache e toda escrita é confirmada por
//! releitura do mesmo arquivo.

use crate::types::{DeviceParameters, Mode, ParameterUpdate};
use std::fmt::Debug;
use std::fs::OpenOptions;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Erros do cliente de parâmetros.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParamError {
    #[error("Parâmetro {file} indisponível: {reason}")]
    NotAvailable { file: &'static str, reason: String },

    #[error("Valor {attempted:?} rejeitado para {file}: {reason}")]
    Rejected {
        file: &'static str,
        attempted: String,
        reason: String,
        /// Valor que o backend manteve, quando foi possível reler
        current: Option<String>,
    },
}

// ──────────────────────────────────────────────
// Parâmetros
// ──────────────────────────────────────────────

/// Descrição de um arquivo de parâmetro.
pub trait Parameter {
    type Value: Copy + PartialEq + Debug;

    /// Nome do arquivo dentro do diretório do device.
    const FILE: &'static str;

    fn parse(text: &str) -> Option<Self::Value>;

    fn format(value: &Self::Value) -> String;

    /// Validação local, antes de qualquer escrita.
    fn validate(_value: &Self::Value) -> Result<(), String> {
        Ok(())
    }
}

/// Período de amostragem (ms).
pub struct SamplingPeriod;

impl Parameter for SamplingPeriod {
    type Value = u32;
    const FILE: &'static str = "sampling_ms";

    fn parse(text: &str) -> Option<u32> {
        text.parse().ok()
    }

    fn format(value: &u32) -> String {
        value.to_string()
    }

    fn validate(value: &u32) -> Result<(), String> {
        if *value == 0 {
            return Err("período de amostragem deve ser > 0 ms".into());
        }
        Ok(())
    }
}

/// Threshold de alerta (m°C).
pub struct Threshold;

impl Parameter for Threshold {
    type Value = u32;
    const FILE: &'static str = "threshold_mC";

    fn parse(text: &str) -> Option<u32> {
        text.parse().ok()
    }

    fn format(value: &u32) -> String {
        value.to_string()
    }

    fn validate(value: &u32) -> Result<(), String> {
        if *value == 0 {
            return Err("threshold deve ser > 0 m°C".into());
        }
        Ok(())
    }
}

/// Modo de operação (`normal` | `ramp`).
pub struct ModeParam;

impl Parameter for ModeParam {
    type Value = Mode;
    const FILE: &'static str = "mode";

    fn parse(text: &str) -> Option<Mode> {
        text.parse().ok()
    }

    fn format(value: &Mode) -> String {
        value.as_str().to_string()
    }
}

/// Converte °C (uma casa decimal) para m°C.
pub fn celsius_to_mc(celsius: f64) -> Option<u32> {
    if !celsius.is_finite() || celsius < 0.0 {
        return None;
    }
    let mc = (celsius * 10.0).round() * 100.0;
    if mc > f64::from(u32::MAX) {
        return None;
    }
    Some(mc as u32)
}

pub fn mc_to_celsius(mc: u32) -> f64 {
    f64::from(mc) / 1000.0
}

// ──────────────────────────────────────────────
// ParamStore
// ──────────────────────────────────────────────

/// Acesso bruto aos endpoints de texto do device.
pub trait ParamBackend {
    fn read_text(&self, file: &'static str) -> io::Result<String>;

    fn write_text(&self, file: &'static str, text: &str) -> io::Result<()>;
}

/// Backend sobre um diretório (sysfs ou equivalente).
#[derive(Debug, Clone)]
pub struct DirBackend {
    dir: PathBuf,
}

impl ParamBackend for DirBackend {
    fn read_text(&self, file: &'static str) -> io::Result<String> {
        std::fs::read_to_string(self.dir.join(file))
    }

    fn write_text(&self, file: &'static str, text: &str) -> io::Result<()> {
        write_text(&self.dir.join(file), text)
    }
}

/// Acesso sem estado aos arquivos de parâmetros.
#[derive(Debug, Clone)]
pub struct ParamStore<B = DirBackend> {
    backend: B,
}

impl ParamStore<DirBackend> {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            backend: DirBackend { dir: dir.into() },
        }
    }

    pub fn dir(&self) -> &Path {
        &self.backend.dir
    }
}

impl<B: ParamBackend> ParamStore<B> {
    pub fn with_backend(backend: B) -> Self {
        Self { backend }
    }

    /// Lê e interpreta o arquivo do parâmetro.
    pub fn read<P: Parameter>(&self) -> Result<P::Value, ParamError> {
        let content = self.backend.read_text(P::FILE).map_err(|e| ParamError::NotAvailable {
            file: P::FILE,
            reason: e.to_string(),
        })?;

        let text = content.trim();
        P::parse(text).ok_or_else(|| ParamError::NotAvailable {
            file: P::FILE,
            reason: format!("conteúdo não reconhecido: {text:?}"),
        })
    }

    /// Escreve o valor e confirma por releitura.
    ///
    /// Retorna o valor aceito pelo backend. Se a releitura mostrar outro
    /// valor, a escrita é reportada como rejeitada.
    pub fn write<P: Parameter>(&self, value: P::Value) -> Result<P::Value, ParamError> {
        let text = P::format(&value);

        if let Err(reason) = P::validate(&value) {
            warn!("{} = {text:?} rejeitado localmente: {reason}", P::FILE);
            return Err(ParamError::Rejected {
                file: P::FILE,
                attempted: text,
                reason,
                current: None,
            });
        }

        if let Err(e) = self.backend.write_text(P::FILE, &text) {
            if e.kind() == ErrorKind::NotFound {
                return Err(ParamError::NotAvailable {
                    file: P::FILE,
                    reason: e.to_string(),
                });
            }
            warn!("Backend recusou {} = {text:?}: {e}", P::FILE);
            return Err(ParamError::Rejected {
                file: P::FILE,
                attempted: text,
                reason: e.to_string(),
                current: self.read::<P>().ok().map(|v| P::format(&v)),
            });
        }

        let confirmed = confirm::<P>(value, self.read::<P>()?)?;
        info!("{} = {text} confirmado", P::FILE);
        Ok(confirmed)
    }

    pub fn read_sampling_ms(&self) -> Result<u32, ParamError> {
        self.read::<SamplingPeriod>()
    }

    pub fn write_sampling_ms(&self, ms: u32) -> Result<u32, ParamError> {
        self.write::<SamplingPeriod>(ms)
    }

    pub fn read_threshold_mc(&self) -> Result<u32, ParamError> {
        self.read::<Threshold>()
    }

    /// Threshold em °C.
    pub fn read_threshold_celsius(&self) -> Result<f64, ParamError> {
        self.read::<Threshold>().map(mc_to_celsius)
    }

    /// Aceita °C com uma casa decimal e grava em m°C.
    pub fn write_threshold_celsius(&self, celsius: f64) -> Result<f64, ParamError> {
        let mc = celsius_to_mc(celsius).ok_or_else(|| ParamError::Rejected {
            file: Threshold::FILE,
            attempted: celsius.to_string(),
            reason: "temperatura fora da faixa representável".into(),
            current: None,
        })?;
        self.write::<Threshold>(mc).map(mc_to_celsius)
    }

    pub fn read_mode(&self) -> Result<Mode, ParamError> {
        self.read::<ModeParam>()
    }

    pub fn write_mode(&self, mode: Mode) -> Result<Mode, ParamError> {
        self.write::<ModeParam>(mode)
    }

    /// Valida o texto antes de escrever: só `normal` e `ramp` chegam ao device.
    pub fn write_mode_str(&self, mode: &str) -> Result<Mode, ParamError> {
        let parsed = mode.trim().parse::<Mode>().map_err(|e| {
            warn!("mode = {mode:?} rejeitado localmente");
            ParamError::Rejected {
                file: ModeParam::FILE,
                attempted: mode.to_string(),
                reason: e.to_string(),
                current: None,
            }
        })?;
        self.write_mode(parsed)
    }

    /// Snapshot dos três parâmetros. Falhas viram `None`.
    pub fn read_all(&self) -> DeviceParameters {
        let params = DeviceParameters {
            sampling_ms: self.read::<SamplingPeriod>().ok(),
            threshold_mc: self.read::<Threshold>().ok(),
            mode: self.read::<ModeParam>().ok(),
        };
        debug!("Parâmetros lidos: {params:?}");
        params
    }

    /// Aplica as mudanças pedidas, uma escrita confirmada por parâmetro.
    ///
    /// Para na primeira falha; as escritas anteriores já confirmadas ficam.
    pub fn apply(&self, update: &ParameterUpdate) -> Result<DeviceParameters, ParamError> {
        if let Some(ms) = update.sampling_ms {
            self.write_sampling_ms(ms)?;
        }
        if let Some(celsius) = update.threshold_celsius {
            self.write_threshold_celsius(celsius)?;
        }
        if let Some(mode) = update.mode {
            self.write_mode(mode)?;
        }
        Ok(self.read_all())
    }
}

/// Compara o valor escrito com o relido.
fn confirm<P: Parameter>(attempted: P::Value, confirmed: P::Value) -> Result<P::Value, ParamError> {
    if confirmed == attempted {
        return Ok(confirmed);
    }
    let attempted = P::format(&attempted);
    let current = P::format(&confirmed);
    warn!("{} = {attempted:?} não confirmado (backend manteve {current:?})", P::FILE);
    Err(ParamError::Rejected {
        file: P::FILE,
        attempted,
        reason: "releitura divergente".into(),
        current: Some(current),
    })
}

/// Escreve sem criar o arquivo: um arquivo ausente é um parâmetro ausente.
fn write_text(path: &Path, text: &str) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).truncate(true).open(path)?;
    file.write_all(text.as_bytes())?;
    file.flush()
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
