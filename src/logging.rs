//! Optional `env_logger` backend for the `log` macros used across the codec.
//!
//! Library code only emits through the `log` facade. Applications that do not
//! install their own logger can call [`init_logging`] once at startup.

use std::fs::OpenOptions;
use std::sync::Once;

use log::LevelFilter;

use crate::error::CodecError;

static INIT_LOGGER: Once = Once::new();

/// Installs a `[LEVEL] message` logger at `level`, optionally appending to
/// `log_file` instead of stderr. Only the first call has any effect.
pub fn init_logging(level: LevelFilter, log_file: Option<&str>) -> Result<(), CodecError> {
    let target = match log_file {
        Some(filename) => Some(OpenOptions::new().append(true).create(true).open(filename)?),
        None => None,
    };

    INIT_LOGGER.call_once(move || {
        let mut builder = env_logger::Builder::new();

        builder.is_test(false);
        builder.filter_level(level);

        builder.format(|buf, record| {
            use std::io::Write;
            writeln!(buf, "[{}] {}", record.level(), record.args())?;
            buf.flush()?;
            Ok(())
        });

        if let Some(file) = target {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }

        // Another logger may already be installed by the host application.
        let _ = builder.try_init();
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_logging(LevelFilter::Debug, None).unwrap();
        init_logging(LevelFilter::Trace, None).unwrap();
        log::debug!("logger installed");
    }
}
