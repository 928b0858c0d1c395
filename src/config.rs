use std::sync::OnceLock;

/// Default cap on successive requests per keep-alive connection.
pub const DEFAULT_KEEPALIVE_REQUESTS: u32 = 100;

/// Default cap on the total size of a request header block.
pub const DEFAULT_MAX_HEADER_LEN: usize = 112 * 1024;

static GLOBAL: OnceLock<ParserConfig> = OnceLock::new();

/// Process-wide parser knobs.
///
/// The configuration is set once during startup with [`install`] and read
/// without synchronization afterwards: every
/// [`RequestParser::new`][crate::RequestParser::new] snapshots the installed
/// (or default) record by value, so a parser never observes a mix of two
/// configurations.
///
/// [`install`]: ParserConfig::install
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserConfig {
    /// Requests allowed per connection before `next_request` forces a
    /// close. `None` means unlimited.
    pub keepalive_requests: Option<u32>,
    /// Honor `X-Forwarded-Proto` / `X-Forwarded-SSL` when deriving the
    /// request scheme. When `false` the scheme is always `http`.
    pub trust_x_forwarded: bool,
    /// Cap on the total size of a request header block (trailer blocks are
    /// held to the same cap).
    pub max_header_len: usize,
}

impl ParserConfig {
    /// Install this record as the process-wide configuration.
    ///
    /// Returns `false` if a configuration was already installed; the first
    /// install wins and later writers are rejected.
    pub fn install(self) -> bool {
        GLOBAL.set(self).is_ok()
    }

    /// The installed configuration, or the default if none was installed.
    pub fn global() -> ParserConfig {
        GLOBAL.get().copied().unwrap_or_default()
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            keepalive_requests: Some(DEFAULT_KEEPALIVE_REQUESTS),
            trust_x_forwarded: true,
            max_header_len: DEFAULT_MAX_HEADER_LEN,
        }
    }
}
