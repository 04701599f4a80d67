//! # simtemp Core
//!
//! Cliente userspace do sensor de temperatura simulado: decodifica os
//! registros binários do device de stream, classifica alertas, lê e escreve
//! os parâmetros do device com confirmação por releitura e mantém a thread
//! de telemetria separada do consumidor.
//!
//! ## Módulos
//! - [`types`] – Sample, AlertState, Mode, DeviceParameters
//! - [`record`] – Decode/encode do registro de 16 bytes
//! - [`alerts`] – Estado de alerta a partir das flags
//! - [`params`] – Arquivos `sampling_ms`, `threshold_mC`, `mode`
//! - [`telemetry`] – Thread de leitura cancelável e hand-off por channel
//! - [`view`] – View model para a camada de apresentação
//! - [`config`] – Configuração unificada via TOML
//! - [`timefmt`] – Timestamps ISO 8601 e linhas de amostra

pub mod types;
pub mod record;
pub mod alerts;
pub mod params;
pub mod telemetry;
pub mod view;
pub mod config;
pub mod timefmt;

// Re-exports convenientes
pub use types::{AlertState, DeviceParameters, Mode, Sample};
pub use record::{RECORD_SIZE, RecordError, decode_record};
pub use params::{ParamError, ParamStore};
pub use telemetry::{
    LoopSettings, LoopState, SampleSink, StopReason, TelemetryEvent, TelemetryHandle,
};
pub use config::AppConfig;
