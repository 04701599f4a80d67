//! Thread de telemetria: lê registros do device e publica para o consumidor.
//!
//! Estados: `Idle → Streaming → Stopped`. O device é aberto na própria
//! thread, em modo não bloqueante; as esperas entre leituras vazias usam um
//! channel de wake que o dono desconecta ao cancelar, então a thread sai
//! dentro de um intervalo de polling.

use crate::alerts::classify_sample;
use crate::config::TelemetryConfig;
use crate::record::{RECORD_SIZE, decode_record};
use crate::types::{AlertState, Sample};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, Read};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

// ──────────────────────────────────────────────
// Estado e eventos
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Streaming,
    Stopped,
}

impl LoopState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => LoopState::Idle,
            1 => LoopState::Streaming,
            _ => LoopState::Stopped,
        }
    }
}

/// Motivo do fim da thread. Reportado uma única vez.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StopReason {
    #[error("Cancelado pelo dono")]
    Cancelled,

    #[error("Device {device} indisponível: {reason}")]
    DeviceUnavailable { device: String, reason: String },
}

/// Consumidor das amostras.
///
/// Chamado sempre da thread de telemetria, em ordem de entrega. Não deve
/// bloquear: consumidores com contexto próprio usam [`ChannelSink`].
pub trait SampleSink: Send {
    fn on_sample(&mut self, sample: Sample, alert: AlertState);

    fn on_stopped(&mut self, _reason: &StopReason) {}
}

impl<F> SampleSink for F
where
    F: FnMut(Sample, AlertState) + Send,
{
    fn on_sample(&mut self, sample: Sample, alert: AlertState) {
        self(sample, alert)
    }
}

/// Mensagem enviada da thread de telemetria para o consumidor.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryEvent {
    Sample { sample: Sample, alert: AlertState },
    Stopped(StopReason),
}

/// Sink que repassa eventos por um channel limitado, sem bloquear.
///
/// Amostras são descartadas com o channel cheio. O evento final nunca é:
/// abre espaço descartando a amostra mais antiga ainda não consumida.
pub struct ChannelSink {
    tx: Sender<TelemetryEvent>,
    evict: Receiver<TelemetryEvent>,
}

/// Cria o par sink/receiver com o buffer pedido.
pub fn channel(capacity: usize) -> (ChannelSink, Receiver<TelemetryEvent>) {
    let (tx, rx) = bounded(capacity.max(1));
    let evict = rx.clone();
    (ChannelSink { tx, evict }, rx)
}

impl ChannelSink {
    fn push(&self, event: TelemetryEvent) {
        // Non-blocking send: se o consumidor está lento, descarta
        if self.tx.try_send(event).is_err() {
            debug!("Channel cheio, descartando amostra");
        }
    }

    fn push_final(&self, mut event: TelemetryEvent) {
        loop {
            match self.tx.try_send(event) {
                Ok(()) => return,
                Err(TrySendError::Full(back)) => {
                    if self.evict.try_recv().is_ok() {
                        debug!("Channel cheio, descartando amostra antiga para o evento final");
                    }
                    event = back;
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }
}

impl SampleSink for ChannelSink {
    fn on_sample(&mut self, sample: Sample, alert: AlertState) {
        self.push(TelemetryEvent::Sample { sample, alert });
    }

    fn on_stopped(&mut self, reason: &StopReason) {
        self.push_final(TelemetryEvent::Stopped(reason.clone()));
    }
}

// ──────────────────────────────────────────────
// Configuração da thread
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct LoopSettings {
    /// Espera após leitura vazia
    pub empty_backoff: Duration,
    /// Espera após registro malformado
    pub error_backoff: Duration,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            empty_backoff: Duration::from_millis(100),
            error_backoff: Duration::from_millis(250),
        }
    }
}

impl From<&TelemetryConfig> for LoopSettings {
    fn from(cfg: &TelemetryConfig) -> Self {
        Self {
            empty_backoff: Duration::from_millis(cfg.empty_backoff_ms),
            error_backoff: Duration::from_millis(cfg.error_backoff_ms),
        }
    }
}

// ──────────────────────────────────────────────
// Handle
// ──────────────────────────────────────────────

struct Shared {
    cancelled: AtomicBool,
    state: AtomicU8,
    stop_reason: Mutex<Option<StopReason>>,
}

impl Shared {
    fn set_state(&self, state: LoopState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

/// Handle do dono da thread. Dropar o handle cancela e espera a thread.
pub struct TelemetryHandle {
    shared: Arc<Shared>,
    wake: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl TelemetryHandle {
    pub fn state(&self) -> LoopState {
        LoopState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.shared.stop_reason.lock().ok().and_then(|r| r.clone())
    }

    /// Pede cancelamento. Qualquer espera em andamento retorna na hora.
    pub fn stop(&mut self) {
        self.shared.cancelled.store(true, Ordering::Release);
        // Desconectar o wake destrava `recv_timeout` na thread
        self.wake.take();
    }

    /// Espera a thread terminar (sem cancelar) e retorna o motivo.
    pub fn join(mut self) -> Option<StopReason> {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Thread de telemetria terminou com panic");
            }
        }
        self.stop_reason()
    }
}

impl Drop for TelemetryHandle {
    fn drop(&mut self) {
        self.stop();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Thread de telemetria terminou com panic");
            }
        }
    }
}

// ──────────────────────────────────────────────
// Spawn
// ──────────────────────────────────────────────

/// Abre o device de stream em modo leitura, não bloqueante.
pub fn open_device(path: &Path) -> io::Result<File> {
    let mut opts = OpenOptions::new();
    opts.read(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.custom_flags(libc::O_NONBLOCK);
    }
    opts.open(path)
}

/// Inicia a thread sobre o device em `path`.
pub fn spawn_device<K>(path: &Path, sink: K, settings: LoopSettings) -> io::Result<TelemetryHandle>
where
    K: SampleSink + 'static,
{
    let owned = path.to_path_buf();
    spawn(
        path.display().to_string(),
        move || open_device(&owned),
        sink,
        settings,
    )
}

/// Inicia a thread com uma fonte arbitrária, aberta dentro da thread.
pub fn spawn<S, F, K>(
    device: String,
    opener: F,
    sink: K,
    settings: LoopSettings,
) -> io::Result<TelemetryHandle>
where
    S: Read,
    F: FnOnce() -> io::Result<S> + Send + 'static,
    K: SampleSink + 'static,
{
    let shared = Arc::new(Shared {
        cancelled: AtomicBool::new(false),
        state: AtomicU8::new(LoopState::Idle as u8),
        stop_reason: Mutex::new(None),
    });
    let (wake_tx, wake_rx) = bounded::<()>(0);

    let thread_shared = Arc::clone(&shared);
    let thread = std::thread::Builder::new()
        .name("simtemp-telemetry".into())
        .spawn(move || {
            let mut sink = sink;
            let reason = run(&device, opener, &mut sink, settings, &thread_shared, &wake_rx);
            finish(&thread_shared, &mut sink, reason);
        })?;

    Ok(TelemetryHandle {
        shared,
        wake: Some(wake_tx),
        thread: Some(thread),
    })
}

// ──────────────────────────────────────────────
// Loop
// ──────────────────────────────────────────────

enum ReadOutcome {
    Empty,
    Bytes(usize),
}

/// Lê até um registro, juntando continuações imediatas.
fn read_record<S: Read>(source: &mut S, buf: &mut [u8; RECORD_SIZE]) -> io::Result<ReadOutcome> {
    let mut filled = 0;
    while filled < RECORD_SIZE {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => break,
            Err(e) => return Err(e),
        }
    }
    Ok(if filled == 0 {
        ReadOutcome::Empty
    } else {
        ReadOutcome::Bytes(filled)
    })
}

/// Espera `pause` ou até o cancelamento. Retorna `true` se cancelado.
fn wait(wake: &Receiver<()>, pause: Duration) -> bool {
    !matches!(wake.recv_timeout(pause), Err(RecvTimeoutError::Timeout))
}

fn run<S, F, K>(
    device: &str,
    opener: F,
    sink: &mut K,
    settings: LoopSettings,
    shared: &Shared,
    wake: &Receiver<()>,
) -> StopReason
where
    S: Read,
    F: FnOnce() -> io::Result<S>,
    K: SampleSink,
{
    let mut source = match opener() {
        Ok(source) => source,
        Err(e) => {
            return StopReason::DeviceUnavailable {
                device: device.to_string(),
                reason: e.to_string(),
            };
        }
    };

    shared.set_state(LoopState::Streaming);
    info!("Telemetria lendo de {device}");

    let mut buf = [0u8; RECORD_SIZE];
    loop {
        if shared.cancelled.load(Ordering::Acquire) {
            return StopReason::Cancelled;
        }

        let pause = match read_record(&mut source, &mut buf) {
            Ok(ReadOutcome::Empty) => settings.empty_backoff,
            Ok(ReadOutcome::Bytes(n)) => match decode_record(&buf[..n]) {
                // Sem NEW_SAMPLE equivale a não haver dado
                Ok(sample) if !sample.is_new() => settings.empty_backoff,
                Ok(sample) => {
                    let alert = classify_sample(&sample);
                    debug!(
                        "Amostra ts={} temp={} mC flags=0x{:04X}",
                        sample.timestamp_ns, sample.temp_mc, sample.flags
                    );
                    sink.on_sample(sample, alert);
                    continue;
                }
                Err(e) => {
                    warn!("Leitura transitória inválida de {device}: {e}");
                    settings.error_backoff
                }
            },
            Err(e) => {
                return StopReason::DeviceUnavailable {
                    device: device.to_string(),
                    reason: e.to_string(),
                };
            }
        };

        if wait(wake, pause) {
            return StopReason::Cancelled;
        }
    }
    // `source` é dropado aqui, liberando o device
}

fn finish<K: SampleSink>(shared: &Shared, sink: &mut K, reason: StopReason) {
    match &reason {
        StopReason::Cancelled => info!("Telemetria encerrada"),
        StopReason::DeviceUnavailable { .. } => error!("Telemetria parada: {reason}"),
    }
    if let Ok(mut slot) = shared.stop_reason.lock() {
        *slot = Some(reason.clone());
    }
    shared.set_state(LoopState::Stopped);
    sink.on_stopped(&reason);
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
