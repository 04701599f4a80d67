//! Classificação de alertas a partir das flags do registro.
//!
//! O cliente apenas reporta o que o backend afirma no bit
//! `THRESHOLD_CROSSED`. A comparação temperatura × threshold é do driver.

use crate::types::{AlertState, Sample, THRESHOLD_CROSSED};

/// Deriva o [`AlertState`] das flags brutas.
pub fn classify(flags: u16) -> AlertState {
    AlertState {
        crossed: flags & THRESHOLD_CROSSED != 0,
        flags,
    }
}

/// Atalho para [`classify`] sobre uma amostra.
pub fn classify_sample(sample: &Sample) -> AlertState {
    classify(sample.flags)
}

/// Indica se a regra local (`temp >= threshold`) discorda do bit afirmado.
///
/// Apenas diagnóstico: divergências são esperadas quando o threshold muda
/// entre amostras. Não altera o [`AlertState`].
pub fn local_disagreement(sample: &Sample, threshold_mc: u32) -> bool {
    let local = sample.temp_mc >= threshold_mc;
    local != classify_sample(sample).crossed
}
