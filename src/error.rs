/// Error raised while parsing a request.
///
/// All three kinds are fatal to the current request: the parser goes into a
/// sticky error state and keeps returning the same error until
/// [`clear`][crate::RequestParser::clear] is called. The connection should
/// be closed after reporting the matching status code.
///
/// These are client-driven conditions; no backtrace is captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpParserError {
    /// Malformed HTTP syntax. Maps to `400 Bad Request`.
    Parse(&'static str),
    /// The header block exceeded the configured
    /// [`max_header_len`][crate::ParserConfig::max_header_len].
    /// Maps to `413 Request Entity Too Large`.
    HeaderTooLarge,
    /// A request-target component exceeded [`MAX_URI_LEN`][crate::MAX_URI_LEN].
    /// Maps to `414 Request-URI Too Long`.
    UriTooLong,
}

impl std::error::Error for HttpParserError {}

impl std::fmt::Display for HttpParserError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(reason) => write!(f, "invalid HTTP request: {reason}"),
            Self::HeaderTooLarge => f.write_str("HTTP header is too large"),
            Self::UriTooLong => f.write_str("request URI is too long"),
        }
    }
}
