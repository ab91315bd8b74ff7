use std::env;
use std::str::FromStr;
use std::time::Duration;

/// The form size limit used when none is configured.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 16 * 1024 * 1024;

/// Returns the value of the named environment variable if it exists or panics.
pub fn get_variable(name: &str) -> String {
    env::var(name).unwrap_or_else(|_| panic!("must define {} environment variable", name))
}

/// Parses the named environment variable or panics.
pub fn parse_variable<T: FromStr>(name: &str) -> T {
    get_variable(name)
        .parse()
        .unwrap_or_else(|_| panic!("could not parse {} environment variable", name))
}

/// Limits applied to uploads.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// How long a storage upload may take before it counts as failed.
    pub upload_timeout: Duration,

    pub max_upload_bytes: u64,
}

impl Config {
    pub fn new(upload_timeout: Duration, max_upload_bytes: u64) -> Self {
        Self {
            upload_timeout,
            max_upload_bytes,
        }
    }

    pub fn from_env() -> Self {
        let upload_timeout = Duration::from_secs(parse_variable("PETRANSPORT_UPLOAD_TIMEOUT_SECONDS"));

        let max_upload_bytes = match env::var("PETRANSPORT_MAX_UPLOAD_BYTES") {
            Ok(_) => parse_variable("PETRANSPORT_MAX_UPLOAD_BYTES"),
            Err(_) => DEFAULT_MAX_UPLOAD_BYTES,
        };

        Self::new(upload_timeout, max_upload_bytes)
    }
}
