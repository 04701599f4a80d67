//! Codec do registro binário entregue pelo device.
//!
//! Formato do registro (16 bytes, little-endian):
//!
//! ```text
//! ┌────────────────┬──────────────┬──────────┬────────────┐
//! │ Timestamp (8)  │ Temp mC (4)  │ Flags(2) │ Reserved(2)│
//! └────────────────┴──────────────┴──────────┴────────────┘
//! ```
//!
//! - Timestamp em ns, monotônico por device
//! - Temperatura em mili-graus
//! - Flags: bit0 = amostra nova, bit1 = threshold cruzado
//! - Os 2 bytes finais são padding e nunca são interpretados

use crate::types::Sample;

/// Tamanho de um registro completo.
pub const RECORD_SIZE: usize = 16;

const TIMESTAMP_OFFSET: usize = 0;
const TEMP_OFFSET: usize = 8;
const FLAGS_OFFSET: usize = 12;

/// Erros do codec.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("Registro malformado ({len} bytes, esperado {RECORD_SIZE})")]
    Malformed { len: usize },
}

/// Decodifica um registro em [`Sample`].
///
/// Buffers menores que [`RECORD_SIZE`] falham sem produzir amostra.
/// Bytes além do primeiro registro são ignorados.
pub fn decode_record(data: &[u8]) -> Result<Sample, RecordError> {
    let record: &[u8; RECORD_SIZE] = data
        .get(..RECORD_SIZE)
        .and_then(|r| r.try_into().ok())
        .ok_or(RecordError::Malformed { len: data.len() })?;

    let mut ts = [0u8; 8];
    ts.copy_from_slice(&record[TIMESTAMP_OFFSET..TEMP_OFFSET]);
    let mut temp = [0u8; 4];
    temp.copy_from_slice(&record[TEMP_OFFSET..FLAGS_OFFSET]);
    let flags = [record[FLAGS_OFFSET], record[FLAGS_OFFSET + 1]];

    Ok(Sample {
        timestamp_ns: u64::from_le_bytes(ts),
        temp_mc: u32::from_le_bytes(temp),
        flags: u16::from_le_bytes(flags),
    })
}

/// Codifica uma [`Sample`] no formato do device (padding zerado).
///
/// Usado por backends simulados e testes.
pub fn encode_record(sample: &Sample) -> [u8; RECORD_SIZE] {
    let mut out = [0u8; RECORD_SIZE];
    out[TIMESTAMP_OFFSET..TEMP_OFFSET].copy_from_slice(&sample.timestamp_ns.to_le_bytes());
    out[TEMP_OFFSET..FLAGS_OFFSET].copy_from_slice(&sample.temp_mc.to_le_bytes());
    out[FLAGS_OFFSET..FLAGS_OFFSET + 2].copy_from_slice(&sample.flags.to_le_bytes());
    out
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NEW_SAMPLE, THRESHOLD_CROSSED};

    fn hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    #[test]
    fn decodes_known_record() {
        let bytes = hex("00000000000000000A00000001000000");
        let sample = decode_record(&bytes).unwrap();
        assert_eq!(sample.timestamp_ns, 0);
        assert_eq!(sample.temp_mc, 10);
        assert_eq!(sample.flags, NEW_SAMPLE);
    }

    #[test]
    fn decodes_little_endian_fields() {
        // ts = 0x0102030405060708, temp = 44123 (0xAC5B), flags = 0x0003
        let bytes = hex("08070605040302015BAC000003000000");
        let sample = decode_record(&bytes).unwrap();
        assert_eq!(sample.timestamp_ns, 0x0102_0304_0506_0708);
        assert_eq!(sample.temp_mc, 44_123);
        assert_eq!(sample.flags, NEW_SAMPLE | THRESHOLD_CROSSED);
    }

    #[test]
    fn padding_is_ignored() {
        let mut bytes = hex("00000000000000000A00000001000000");
        bytes[14] = 0xFF;
        bytes[15] = 0xEE;
        let sample = decode_record(&bytes).unwrap();
        assert_eq!(sample.flags, NEW_SAMPLE);
        assert_eq!(sample.temp_mc, 10);
    }

    #[test]
    fn rejects_short_buffers() {
        for len in 0..RECORD_SIZE {
            let buf = vec![0xAB; len];
            assert_eq!(decode_record(&buf), Err(RecordError::Malformed { len }));
        }
    }

    #[test]
    fn zeroed_record_has_no_flags() {
        let sample = decode_record(&[0u8; RECORD_SIZE]).unwrap();
        assert!(!sample.is_new());
        assert_eq!(sample, Sample::default());
    }

    #[test]
    fn encode_matches_wire_layout() {
        let sample = Sample {
            timestamp_ns: 0,
            temp_mc: 10,
            flags: NEW_SAMPLE,
        };
        assert_eq!(
            encode_record(&sample).to_vec(),
            hex("00000000000000000A00000001000000")
        );
    }
}
