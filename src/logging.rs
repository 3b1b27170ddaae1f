use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::error::Error;

/// Filter directive for a `-v` count: warn, info, debug, then trace.
pub const fn level_for_verbosity(verbose: u8) -> &'static str {
    return match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
}

/// Install the stderr subscriber. `RUST_LOG` wins over the `-v` count.
///
/// # Errors
///
/// Returns `Error::Logging` if the filter is invalid or a subscriber is already set.
pub fn init(verbose: u8) -> Result<(), Error> {
    let fmt_layer = fmt::layer().with_writer(std::io::stderr).with_target(false).compact();

    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| return EnvFilter::try_new(level_for_verbosity(verbose)))
        .map_err(|e| return Error::Logging { reason: e.to_string() })?;

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| return Error::Logging { reason: e.to_string() })?;

    return Ok(());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(level_for_verbosity(0), "warn");
        assert_eq!(level_for_verbosity(2), "debug");
        assert_eq!(level_for_verbosity(9), "trace");
    }

    #[test]
    fn second_init_fails_cleanly() {
        let _ = init(0);
        assert!(matches!(init(0), Err(Error::Logging { .. })));
    }
}
