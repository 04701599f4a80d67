//! Definição de tipos/structs do sensor simtemp.
//!
//! Valores produzidos pelo core e entregues à camada de apresentação.
//! Nenhum deles guarda referência a objetos de renderização.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ──────────────────────────────────────────────
// Flags
// ──────────────────────────────────────────────

/// bit0: amostra nova presente (marcador do produtor).
pub const NEW_SAMPLE: u16 = 1 << 0;

/// bit1: threshold cruzado (afirmado pelo backend).
pub const THRESHOLD_CROSSED: u16 = 1 << 1;

// ──────────────────────────────────────────────
// Sample
// ──────────────────────────────────────────────

/// Uma amostra decodificada de um registro do device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// Timestamp monotônico do device (ns)
    pub timestamp_ns: u64,
    /// Temperatura (m°C)
    pub temp_mc: u32,
    /// Bitfield de flags (`NEW_SAMPLE`, `THRESHOLD_CROSSED`)
    pub flags: u16,
}

impl Sample {
    /// Temperatura em °C.
    pub fn temp_celsius(&self) -> f64 {
        f64::from(self.temp_mc) / 1000.0
    }

    pub fn is_new(&self) -> bool {
        self.flags & NEW_SAMPLE != 0
    }
}

// ──────────────────────────────────────────────
// AlertState
// ──────────────────────────────────────────────

/// Estado de alerta derivado das flags de uma amostra.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertState {
    pub crossed: bool,
    /// Flags brutas de onde `crossed` foi calculado
    pub flags: u16,
}

// ──────────────────────────────────────────────
// Mode
// ──────────────────────────────────────────────

/// Modo de operação do simulador.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Normal,
    Ramp,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Normal => "normal",
            Mode::Ramp => "ramp",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Modo desconhecido (qualquer texto além de `normal`/`ramp`).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Modo inválido: {0:?} (aceitos: normal, ramp)")]
pub struct UnknownMode(pub String);

impl FromStr for Mode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(Mode::Normal),
            "ramp" => Ok(Mode::Ramp),
            other => Err(UnknownMode(other.to_string())),
        }
    }
}

// ──────────────────────────────────────────────
// DeviceParameters
// ──────────────────────────────────────────────

/// Snapshot dos parâmetros do device.
///
/// `None` significa "desconhecido": o arquivo não pôde ser lido.
/// Nunca é preenchido com valor padrão.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceParameters {
    pub sampling_ms: Option<u32>,
    pub threshold_mc: Option<u32>,
    pub mode: Option<Mode>,
}

impl DeviceParameters {
    /// Threshold em °C, se conhecido.
    pub fn threshold_celsius(&self) -> Option<f64> {
        self.threshold_mc.map(|mc| f64::from(mc) / 1000.0)
    }
}

/// Mudanças pedidas pelo operador. Campos `None` não são escritos.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ParameterUpdate {
    pub sampling_ms: Option<u32>,
    pub threshold_celsius: Option<f64>,
    pub mode: Option<Mode>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_only_known_literals() {
        assert_eq!("normal".parse::<Mode>(), Ok(Mode::Normal));
        assert_eq!("ramp".parse::<Mode>(), Ok(Mode::Ramp));
        assert_eq!(
            "turbo".parse::<Mode>(),
            Err(UnknownMode("turbo".into()))
        );
        assert!("Ramp".parse::<Mode>().is_err());
    }

    #[test]
    fn mode_display_matches_file_literal() {
        assert_eq!(Mode::Ramp.to_string(), "ramp");
        assert_eq!(Mode::Normal.as_str(), "normal");
    }

    #[test]
    fn sample_temp_in_celsius() {
        let s = Sample {
            temp_mc: 44_123,
            ..Default::default()
        };
        assert!((s.temp_celsius() - 44.123).abs() < 1e-9);
    }

    #[test]
    fn unknown_parameters_stay_unknown() {
        let p = DeviceParameters::default();
        assert_eq!(p.threshold_celsius(), None);
        assert_eq!(p.mode, None);
    }
}
