//! View model para a camada de apresentação.
//!
//! Drena os eventos da thread de telemetria no contexto do consumidor
//! (ex.: o loop de eventos de uma GUI) e expõe valores prontos para exibir.

use crate::config::TelemetryConfig;
use crate::telemetry::{StopReason, TelemetryEvent};
use crate::types::{AlertState, DeviceParameters, Sample};
use crossbeam_channel::Receiver;
use std::collections::VecDeque;

/// Estado exibível do monitor.
pub struct MonitorView {
    rx: Receiver<TelemetryEvent>,
    history_size: usize,

    // Dados
    latest: Option<(Sample, AlertState)>,
    history: VecDeque<Sample>,
    alert_count: u64,
    stopped: Option<StopReason>,

    /// Últimos parâmetros confirmados pelo device
    pub params: DeviceParameters,
}

impl MonitorView {
    pub fn new(rx: Receiver<TelemetryEvent>, history_size: usize) -> Self {
        Self {
            rx,
            history_size: history_size.max(1),
            latest: None,
            history: VecDeque::with_capacity(history_size.max(1)),
            alert_count: 0,
            stopped: None,
            params: DeviceParameters::default(),
        }
    }

    /// Histórico dimensionado pelo `[telemetry]` do config.
    pub fn from_config(rx: Receiver<TelemetryEvent>, cfg: &TelemetryConfig) -> Self {
        Self::new(rx, cfg.history_size)
    }

    /// Processa eventos pendentes sem bloquear. Retorna quantos chegaram.
    pub fn poll(&mut self) -> usize {
        let mut count = 0;
        while let Ok(event) = self.rx.try_recv() {
            count += 1;
            self.apply(&event);
        }
        count
    }

    /// Espera o próximo evento, para consumidores sem loop de eventos.
    ///
    /// `None` quando a thread de telemetria já encerrou e o channel esvaziou.
    pub fn recv(&mut self) -> Option<TelemetryEvent> {
        let event = self.rx.recv().ok()?;
        self.apply(&event);
        Some(event)
    }

    fn apply(&mut self, event: &TelemetryEvent) {
        match event {
            TelemetryEvent::Sample { sample, alert } => {
                if self.history.len() >= self.history_size {
                    self.history.pop_front();
                }
                self.history.push_back(*sample);
                if alert.crossed {
                    self.alert_count += 1;
                }
                self.latest = Some((*sample, *alert));
            }
            TelemetryEvent::Stopped(reason) => {
                self.stopped = Some(reason.clone());
            }
        }
    }

    pub fn latest(&self) -> Option<&(Sample, AlertState)> {
        self.latest.as_ref()
    }

    pub fn history(&self) -> impl Iterator<Item = &Sample> {
        self.history.iter()
    }

    pub fn alert_count(&self) -> u64 {
        self.alert_count
    }

    pub fn stopped(&self) -> Option<&StopReason> {
        self.stopped.as_ref()
    }

    /// Fração temp/threshold para um gauge (0.0–1.0).
    ///
    /// `None` sem amostra ou com threshold desconhecido ou zero.
    pub fn gauge_fraction(&self) -> Option<f64> {
        let (sample, _) = self.latest?;
        let threshold = self.params.threshold_mc.filter(|t| *t > 0)?;
        Some((f64::from(sample.temp_mc) / f64::from(threshold)).min(1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::classify;
    use crate::types::{NEW_SAMPLE, THRESHOLD_CROSSED};
    use crossbeam_channel::bounded;

    fn event(ts: u64, temp_mc: u32, flags: u16) -> TelemetryEvent {
        TelemetryEvent::Sample {
            sample: Sample {
                timestamp_ns: ts,
                temp_mc,
                flags,
            },
            alert: classify(flags),
        }
    }

    #[test]
    fn poll_keeps_latest_and_bounded_history() {
        let (tx, rx) = bounded(16);
        let mut view = MonitorView::new(rx, 2);
        tx.send(event(1, 10_000, NEW_SAMPLE)).unwrap();
        tx.send(event(2, 20_000, NEW_SAMPLE | THRESHOLD_CROSSED)).unwrap();
        tx.send(event(3, 30_000, NEW_SAMPLE)).unwrap();

        assert_eq!(view.poll(), 3);
        assert_eq!(view.latest().map(|(s, _)| s.timestamp_ns), Some(3));
        assert_eq!(
            view.history().map(|s| s.timestamp_ns).collect::<Vec<_>>(),
            vec![2, 3]
        );
        assert_eq!(view.alert_count(), 1);
        assert_eq!(view.poll(), 0);
    }

    #[test]
    fn gauge_needs_a_positive_threshold() {
        let (tx, rx) = bounded(4);
        let mut view = MonitorView::new(rx, 8);
        tx.send(event(1, 25_000, NEW_SAMPLE)).unwrap();
        view.poll();

        assert_eq!(view.gauge_fraction(), None);
        view.params.threshold_mc = Some(0);
        assert_eq!(view.gauge_fraction(), None);
        view.params.threshold_mc = Some(50_000);
        assert_eq!(view.gauge_fraction(), Some(0.5));
        view.params.threshold_mc = Some(10_000);
        assert_eq!(view.gauge_fraction(), Some(1.0));
    }

    #[test]
    fn recv_applies_events_in_order() {
        let (tx, rx) = bounded(4);
        let cfg = TelemetryConfig {
            history_size: 1,
            ..Default::default()
        };
        let mut view = MonitorView::from_config(rx, &cfg);
        tx.send(event(1, 10_000, NEW_SAMPLE)).unwrap();
        tx.send(event(2, 20_000, NEW_SAMPLE | THRESHOLD_CROSSED)).unwrap();
        drop(tx);

        assert!(matches!(view.recv(), Some(TelemetryEvent::Sample { .. })));
        assert!(matches!(view.recv(), Some(TelemetryEvent::Sample { .. })));
        assert!(view.recv().is_none());
        assert_eq!(view.history().count(), 1);
        assert_eq!(view.alert_count(), 1);
    }

    #[test]
    fn records_stop_reason() {
        let (tx, rx) = bounded(4);
        let mut view = MonitorView::new(rx, 8);
        tx.send(TelemetryEvent::Stopped(StopReason::Cancelled)).unwrap();
        view.poll();
        assert_eq!(view.stopped(), Some(&StopReason::Cancelled));
        assert!(view.latest().is_none());
    }
}
