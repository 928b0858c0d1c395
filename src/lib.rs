//! HTTP/1.x request parsing for a preforking Rack-style server.
//!
//! The parser consumes request bytes handed to it incrementally — it never
//! touches a socket — and produces a CGI-style [`Env`] mapping
//! (`REQUEST_METHOD`, `HTTP_HOST`, `rack.url_scheme`, ...) ready to hand
//! to an application. Chunked and length-delimited bodies are filtered out
//! of the stream on the caller's schedule, and one parser instance serves
//! every request of a keep-alive connection.
//!
//! ```
//! use rackline::RequestParser;
//!
//! let mut parser = RequestParser::new();
//! let env = parser
//!     .add_parse(b"GET /search?q=shell HTTP/1.1\r\nHost: example.com\r\n\r\n")
//!     .unwrap()
//!     .expect("complete request");
//!
//! assert_eq!(env.get("REQUEST_METHOD"), Some("GET"));
//! assert_eq!(env.get("REQUEST_PATH"), Some("/search"));
//! assert_eq!(env.get("QUERY_STRING"), Some("q=shell"));
//! assert_eq!(env.get("SERVER_NAME"), Some("example.com"));
//! assert_eq!(env.get("SERVER_PORT"), Some("80"));
//! assert!(parser.keepalive());
//! ```
//!
//! Feeding may stop at any byte boundary; partial tokens keep their
//! progress as offsets into the parser's own buffer. Errors are sticky
//! until [`RequestParser::clear`].
#![warn(missing_debug_implementations)]

mod config;
mod date;
mod env;
mod error;
mod log;
mod matches;
mod parser;

pub use config::{DEFAULT_KEEPALIVE_REQUESTS, DEFAULT_MAX_HEADER_LEN, ParserConfig};
pub use date::{httpdate, httpdate_now};
pub use env::{Env, key};
pub use error::HttpParserError;
pub use parser::{MAX_FIELD_NAME_LEN, MAX_FIELD_VALUE_LEN, MAX_URI_LEN, RequestParser};
