//! # simtemp CLI
//!
//! Ajusta os parâmetros do sensor simulado e acompanha amostras/alertas.
//!
//! ## Uso
//! ```bash
//! simtemp -s 100            # período de amostragem (ms)
//! simtemp -t 45.5           # threshold (°C, uma casa decimal)
//! simtemp -m ramp           # modo (normal|ramp)
//! simtemp -i 100:45.5:ramp  # os três de uma vez (ms:°C:modo)
//! simtemp -g                # mostra os parâmetros atuais
//! simtemp -p                # poll: imprime amostras e alertas
//! simtemp -c cfg.toml -p    # config alternativo
//! ```

use simtemp_core::alerts::local_disagreement;
use simtemp_core::config::AppConfig;
use simtemp_core::params::{ParamError, ParamStore};
use simtemp_core::telemetry::{self, LoopSettings, TelemetryEvent};
use simtemp_core::timefmt::format_sample_line;
use simtemp_core::types::{DeviceParameters, ParameterUpdate};
use simtemp_core::view::MonitorView;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error, info, warn};

enum Command {
    SetSampling(u32),
    SetThreshold(f64),
    SetMode(String),
    SetAll(ParameterUpdate),
    Show,
    Poll,
}

fn print_help(prog: &str) {
    eprintln!("Uso: {prog} [-c <config.toml>] <opção>");
    eprintln!("Opções:");
    eprintln!("  -s <ms>      Define o período de amostragem.");
    eprintln!("  -t <°C>      Define o threshold (ex: 45.5).");
    eprintln!("  -m <modo>    Define o modo (normal|ramp).");
    eprintln!("  -i <ms>:<°C>:<modo>  Define os três parâmetros.");
    eprintln!("  -g           Mostra os parâmetros atuais.");
    eprintln!("  -p           Poll: imprime amostras e alertas.");
}

/// `<ms>:<°C>:<modo>`; um campo vazio fica inalterado.
fn parse_update(text: &str) -> Option<ParameterUpdate> {
    let mut fields = text.split(':');
    let (ms, celsius, mode) = (fields.next()?, fields.next()?, fields.next()?);
    if fields.next().is_some() {
        return None;
    }
    let update = ParameterUpdate {
        sampling_ms: optional(ms)?,
        threshold_celsius: optional(celsius)?,
        mode: optional(mode)?,
    };
    (update != ParameterUpdate::default()).then_some(update)
}

fn optional<T: std::str::FromStr>(field: &str) -> Option<Option<T>> {
    if field.is_empty() {
        Some(None)
    } else {
        field.parse().ok().map(Some)
    }
}

fn parse_args(args: &[String]) -> Option<(Option<PathBuf>, Command)> {
    let mut rest = args;
    let mut config_path = None;
    if rest.first().map(String::as_str) == Some("-c") {
        config_path = Some(PathBuf::from(rest.get(1)?));
        rest = &rest[2..];
    }

    let command = match (rest.first()?.as_str(), rest.get(1)) {
        ("-s", Some(v)) => Command::SetSampling(v.parse().ok()?),
        ("-t", Some(v)) => Command::SetThreshold(v.parse().ok()?),
        ("-m", Some(v)) => Command::SetMode(v.clone()),
        ("-i", Some(v)) => Command::SetAll(parse_update(v)?),
        ("-g", None) => Command::Show,
        ("-p", None) => Command::Poll,
        _ => return None,
    };
    Some((config_path, command))
}

fn main() -> ExitCode {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let prog = args.first().cloned().unwrap_or_else(|| "simtemp".into());
    let Some((config_path, command)) = parse_args(&args[1.min(args.len())..]) else {
        print_help(&prog);
        return ExitCode::FAILURE;
    };

    // ── Carregar config ──
    let config_path = config_path.unwrap_or_else(AppConfig::default_path);
    let config = AppConfig::load(&config_path);

    // Salva config padrão se não existir
    if !config_path.exists() {
        if let Err(e) = config.save(&config_path) {
            warn!("Não foi possível salvar config padrão: {e}");
        }
    }
    for problem in config.validate() {
        warn!("Config: {problem}");
    }

    let store = ParamStore::new(&config.device.params_dir);

    let result = match command {
        Command::SetSampling(ms) => store
            .write_sampling_ms(ms)
            .map(|v| println!("sampling_ms = {v} (confirmado)")),
        Command::SetThreshold(celsius) => store
            .write_threshold_celsius(celsius)
            .map(|v| println!("threshold = {v:.1} °C (confirmado)")),
        Command::SetMode(mode) => store
            .write_mode_str(&mode)
            .map(|v| println!("mode = {v} (confirmado)")),
        Command::SetAll(update) => store.apply(&update).map(|params| print_params(&params)),
        Command::Show => {
            print_params(&store.read_all());
            Ok(())
        }
        Command::Poll => return poll(&config, &store),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}

fn report(e: &ParamError) {
    match e {
        ParamError::Rejected {
            current: Some(current),
            ..
        } => error!("{e} (valor atual: {current})"),
        _ => error!("{e}"),
    }
}

fn print_params(params: &DeviceParameters) {
    let unknown = || "desconhecido".to_string();
    println!(
        "sampling_ms = {}",
        params.sampling_ms.map_or_else(unknown, |v| v.to_string())
    );
    println!(
        "threshold   = {}",
        params
            .threshold_celsius()
            .map_or_else(unknown, |v| format!("{v:.1} °C"))
    );
    println!(
        "mode        = {}",
        params.mode.map_or_else(unknown, |m| m.to_string())
    );
}

fn poll(config: &AppConfig, store: &ParamStore) -> ExitCode {
    let (sink, rx) = telemetry::channel(config.telemetry.channel_capacity);
    let settings = LoopSettings::from(&config.telemetry);
    let handle = match telemetry::spawn_device(&config.device.stream_path, sink, settings) {
        Ok(handle) => handle,
        Err(e) => {
            error!("Falha ao criar thread de telemetria: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut view = MonitorView::from_config(rx, &config.telemetry);
    view.params = store.read_all();
    info!(
        "Polling de {} (Ctrl+C para sair)",
        config.device.stream_path.display()
    );

    // ── Loop principal ──
    while let Some(event) = view.recv() {
        match event {
            TelemetryEvent::Sample { sample, alert } => {
                println!("{}", format_sample_line(&sample, &alert));
                if let Some(t) = view.params.threshold_mc {
                    if local_disagreement(&sample, t) {
                        debug!("Alerta do backend diverge da regra local (threshold {t} mC)");
                    }
                }
            }
            TelemetryEvent::Stopped(reason) => {
                error!("{reason}");
                break;
            }
        }
    }

    info!(
        "{} alertas em {} amostras recentes",
        view.alert_count(),
        view.history().count()
    );
    drop(handle);
    ExitCode::FAILURE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_each_command() {
        assert!(matches!(
            parse_args(&args(&["-s", "100"])),
            Some((None, Command::SetSampling(100)))
        ));
        assert!(matches!(
            parse_args(&args(&["-t", "45.5"])),
            Some((None, Command::SetThreshold(t))) if t == 45.5
        ));
        assert!(matches!(
            parse_args(&args(&["-m", "ramp"])),
            Some((None, Command::SetMode(ref m))) if m == "ramp"
        ));
        assert!(matches!(parse_args(&args(&["-g"])), Some((None, Command::Show))));
        assert!(matches!(parse_args(&args(&["-p"])), Some((None, Command::Poll))));
    }

    #[test]
    fn parses_set_all() {
        let parsed = parse_args(&args(&["-i", "100:45.5:ramp"]));
        let Some((None, Command::SetAll(update))) = parsed else {
            panic!("esperava -i");
        };
        assert_eq!(
            update,
            ParameterUpdate {
                sampling_ms: Some(100),
                threshold_celsius: Some(45.5),
                mode: Some(simtemp_core::Mode::Ramp),
            }
        );
    }

    #[test]
    fn set_all_allows_empty_fields() {
        assert_eq!(
            parse_update("::normal"),
            Some(ParameterUpdate {
                mode: Some(simtemp_core::Mode::Normal),
                ..Default::default()
            })
        );
        assert_eq!(
            parse_update("250::"),
            Some(ParameterUpdate {
                sampling_ms: Some(250),
                ..Default::default()
            })
        );
    }

    #[test]
    fn set_all_rejects_bad_fields() {
        assert!(parse_update("100:45.5:turbo").is_none());
        assert!(parse_update("100:45.5").is_none());
        assert!(parse_update("100:45.5:ramp:x").is_none());
        assert!(parse_update("abc:45.5:ramp").is_none());
        assert!(parse_update("::").is_none());
        assert!(parse_args(&args(&["-i"])).is_none());
    }

    #[test]
    fn config_flag_comes_first() {
        let parsed = parse_args(&args(&["-c", "/tmp/x.toml", "-p"]));
        assert!(matches!(
            parsed,
            Some((Some(ref p), Command::Poll)) if p == &PathBuf::from("/tmp/x.toml")
        ));
    }

    #[test]
    fn rejects_bad_usage() {
        assert!(parse_args(&args(&[])).is_none());
        assert!(parse_args(&args(&["-s"])).is_none());
        assert!(parse_args(&args(&["-s", "abc"])).is_none());
        assert!(parse_args(&args(&["-x"])).is_none());
        assert!(parse_args(&args(&["-c"])).is_none());
    }
}
