use chrono::Local;
use env_logger::{Builder, Env};
use log::LevelFilter;
use std::io::Write;

/// `RUST_LOG` overrides the default `info` level.
pub fn init() {
    Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter_module("html5ever", LevelFilter::Warn)
        .filter_module("selectors", LevelFilter::Warn)
        .init();

    log::debug!("Logger initialized.");
}
