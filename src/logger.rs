use std::io::Write;

use env_logger::{Builder, Env};
use log::Level;

/// Inicializa el logger global. Nivel por RUST_LOG, por defecto "info".
/// Los logs van a stderr; stdout queda libre para los resultados.
pub fn init_logger() {
    let _ = Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let level_color = match record.level() {
                Level::Error => "\x1b[31m\x1b[1m",
                Level::Warn => "\x1b[33m\x1b[1m",
                Level::Info => "\x1b[32m\x1b[1m",
                Level::Debug => "\x1b[36m\x1b[1m",
                Level::Trace => "\x1b[90m\x1b[1m",
            };
            writeln!(
                buf,
                "{}{} {:<5}\x1b[0m [{}] {}",
                buf.timestamp_millis(),
                level_color,
                record.level(),
                record.target(),
                record.args(),
            )
        })
        .try_init();
}
