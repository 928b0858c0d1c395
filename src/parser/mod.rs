//! HTTP Request Parser
//!
//! # Parsing
//!
//! [`RequestParser`] consumes request bytes fed incrementally with
//! [`add_parse`][RequestParser::add_parse] and builds a CGI-style [`Env`].
//! Parsing is resumable at any byte boundary: partial tokens keep their
//! progress as offsets into the parser-owned buffer, never as borrowed
//! slices, because the buffer reallocates as it grows.
//!
//! One parser is reused across every request of a keep-alive connection:
//!
//! - zero or more `add_parse`/`parse` calls, until the header block is done
//!   and the env is returned
//! - zero or more [`filter_body`][RequestParser::filter_body] calls until
//!   [`body_eof`][RequestParser::body_eof] (chunked bodies may end with a
//!   trailer block, finished through [`headers`][RequestParser::headers])
//! - [`next_request`][RequestParser::next_request] to account the
//!   keep-alive budget and arm the auto-reset for the next request
//!
//! # Errors
//!
//! Errors are sticky: once an operation fails, the parser stops consuming
//! and every later operation reports the same error until
//! [`clear`][RequestParser::clear].

use bytes::{Buf, BytesMut};

use crate::config::ParserConfig;
use crate::env::{Env, key};
use crate::error::HttpParserError;
use crate::log::{debug, trace, warning};

mod canon;
mod finalize;
mod scan;


use scan::State;

/// Cap on a header field name.
pub const MAX_FIELD_NAME_LEN: usize = 256;

/// Cap on a header field value.
pub const MAX_FIELD_VALUE_LEN: usize = 80 * 1024;

/// Cap on each request-target component (`REQUEST_URI`, `REQUEST_PATH`,
/// `QUERY_STRING`, `FRAGMENT`), enforced separately.
pub const MAX_URI_LEN: usize = 12 * 1024;

// ===== Flags =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct Flags(u16);

impl Flags {
    /// `Transfer-Encoding: chunked` seen; implies HASBODY.
    pub const CHUNKED: Flags = Flags(1 << 0);
    /// The request carries a body.
    pub const HASBODY: Flags = Flags(1 << 1);
    /// Inside a length-delimited body.
    pub const INBODY: Flags = Flags(1 << 2);
    /// A `Trailer` header was seen.
    pub const HASTRAILER: Flags = Flags(1 << 3);
    /// The terminating chunk was seen; header machine runs in trailer mode.
    pub const INTRAILER: Flags = Flags(1 << 4);
    /// Suspended in the middle of chunk data.
    pub const INCHUNK: Flags = Flags(1 << 5);
    /// The request, including any body, is fully consumed.
    pub const REQEOF: Flags = Flags(1 << 6);
    /// The protocol version permits keep-alive (`HTTP/1.1`, or overridden
    /// by a `Connection` header).
    pub const KAVERSION: Flags = Flags(1 << 7);
    /// An HTTP/1.x request line with a version token was seen.
    pub const HASHEADER: Flags = Flags(1 << 8);
    /// Auto-reset on the next parse call.
    pub const TO_CLEAR: Flags = Flags(1 << 9);

    /// The protocol-layer keep-alive predicate.
    pub const KEEPALIVE: Flags =
        Flags(Self::KAVERSION.0 | Self::REQEOF.0 | Self::HASHEADER.0);

    pub fn set(&mut self, f: Flags) {
        self.0 |= f.0;
    }

    pub fn unset(&mut self, f: Flags) {
        self.0 &= !f.0;
    }

    pub fn test(&self, f: Flags) -> bool {
        self.0 & f.0 == f.0
    }
}

impl std::ops::BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

// ===== Continuation slot =====

/// The extendable slot of the last scanned header, used to resolve folded
/// continuation lines and duplicate fields without a map lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum Cont {
    /// No header scanned yet on this request.
    #[default]
    None,
    /// The last header is discarded (`Version`, or a duplicate `Host`);
    /// its continuations are discarded with it.
    Ignore,
    /// Index of the env entry holding the last header's value.
    Entry(usize),
}

// ===== Parser =====

/// Resumable HTTP/1.x request parser producing a CGI-style [`Env`].
///
/// See the [module docs][self] for the call sequence. One instance is
/// created per connection and reused across pipelined requests.
#[derive(Debug)]
pub struct RequestParser {
    state: State,
    flags: Flags,
    err: Option<HttpParserError>,
    /// Keep-alive budget; `None` is unlimited.
    requests_remaining: Option<u32>,
    /// Primary token mark: method, request-target, version, header value.
    mark: usize,
    /// Secondary mark: target component or field-name start.
    start: usize,
    /// Length of the field name being scanned.
    field_len: usize,
    /// Resume position; bytes before it are consumed.
    offset: usize,
    /// Remaining length-delimited body, or remaining current-chunk bytes
    /// while CHUNKED.
    len: u64,
    cont: Cont,
    cfg: ParserConfig,
    buf: BytesMut,
    env: Env,
}

impl RequestParser {
    /// Create a parser from the process-wide [`ParserConfig`].
    pub fn new() -> Self {
        Self::with_config(ParserConfig::global())
    }

    /// Create a parser with an explicit configuration.
    pub fn with_config(cfg: ParserConfig) -> Self {
        Self {
            state: State::Start,
            flags: Flags::default(),
            err: None,
            requests_remaining: cfg.keepalive_requests,
            mark: 0,
            start: 0,
            field_len: 0,
            offset: 0,
            len: 0,
            cont: Cont::None,
            cfg,
            buf: BytesMut::new(),
            env: Env::new(),
        }
    }

    /// Reset to the initial state: machine, flags, marks, sticky error and
    /// env are cleared. Buffered bytes of a pipelined request and the
    /// connection's keep-alive budget survive.
    pub fn clear(&mut self) {
        self.state = State::Start;
        self.flags = Flags::default();
        self.err = None;
        self.mark = 0;
        self.start = 0;
        self.field_len = 0;
        self.offset = 0;
        self.len = 0;
        self.cont = Cont::None;
        self.env.clear();
    }

    #[deprecated(note = "use `clear`")]
    pub fn reset(&mut self) {
        self.clear();
    }

    /// The request environment built so far.
    ///
    /// After a successful header parse the env is complete; on error it
    /// reflects exactly what was seen.
    pub fn env(&self) -> &Env {
        &self.env
    }

    /// Append raw bytes to the input buffer without parsing. Used while a
    /// body is being read, where [`filter_body`][Self::filter_body]
    /// consumes the buffer.
    pub fn append(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Append `bytes` and [`parse`][Self::parse].
    pub fn add_parse(&mut self, bytes: &[u8]) -> Result<Option<&Env>, HttpParserError> {
        self.append(bytes);
        self.parse()
    }

    /// Run the scanner over the buffered bytes.
    ///
    /// Returns the env once the header block (or, later, the trailer
    /// block) is complete, `None` when more input is needed. A parser that
    /// finished its previous request via
    /// [`next_request`][Self::next_request] resets itself first.
    pub fn parse(&mut self) -> Result<Option<&Env>, HttpParserError> {
        if let Some(err) = self.err {
            return Err(err);
        }
        if self.flags.test(Flags::TO_CLEAR) {
            self.clear();
        }

        trace!("parse: {:?} offset={} buffered={}", self.state, self.offset, self.buf.len());

        let done = match self.scan(None) {
            Ok(done) => done,
            Err(err) => return Err(self.fail(err)),
        };
        if self.offset > self.cfg.max_header_len {
            return Err(self.fail(HttpParserError::HeaderTooLarge));
        }

        if done {
            debug!("header block complete: {} env entries", self.env.len());
            self.drain();
            Ok(Some(&self.env))
        } else if self.state == State::Final {
            // completed on an earlier call
            Ok(Some(&self.env))
        } else {
            Ok(None)
        }
    }

    /// Alias of [`parse`][Self::parse]; the entry point for finishing a
    /// chunked request's trailer block.
    pub fn headers(&mut self) -> Result<Option<&Env>, HttpParserError> {
        self.parse()
    }

    /// Filter body bytes out of the input buffer into `dst`.
    ///
    /// In chunked mode `dst` receives de-framed chunk payload; once the
    /// terminating chunk is seen the machine stops at the trailer
    /// boundary, and the trailer block (often just its final CRLF) is
    /// consumed through [`headers`][Self::headers]. In length mode `dst`
    /// receives up to the remaining `Content-Length` bytes. Bytes beyond
    /// the body stay buffered for the next request.
    ///
    /// Returns `true` only when the body is fully consumed and this call
    /// produced no output.
    pub fn filter_body(&mut self, dst: &mut BytesMut) -> Result<bool, HttpParserError> {
        if let Some(err) = self.err {
            return Err(err);
        }
        dst.clear();

        // not until the header block is done
        if !self.state.past_headers() && !self.flags.test(Flags::INTRAILER) {
            return Ok(false);
        }

        if self.flags.test(Flags::CHUNKED) {
            if let Err(err) = self.scan(Some(dst)) {
                return Err(self.fail(err));
            }
            // keep a partially scanned trailer line buffered; everything
            // else behind `offset` is consumed framing
            if self.state == State::Final
                || self.state == State::HeaderStart
                || !self.flags.test(Flags::INTRAILER)
            {
                self.drain();
            }
            trace!("filter_body: {:?} produced={}", self.state, dst.len());
            let terminated =
                self.flags.test(Flags::INTRAILER) || self.state == State::Final;
            Ok(terminated && dst.is_empty())
        } else {
            if self.flags.test(Flags::INBODY) && self.len > 0 {
                let avail = self.buf.len() - self.offset;
                let n = self.len.min(avail as u64) as usize;
                dst.extend_from_slice(&self.buf[self.offset..self.offset + n]);
                self.offset += n;
                self.len -= n as u64;
                if self.len == 0 {
                    self.flags.set(Flags::REQEOF);
                    self.state = State::Final;
                }
                self.drain();
            }
            trace!("filter_body: {} body bytes remaining", self.len);
            Ok(self.len == 0 && dst.is_empty())
        }
    }

    /// Remaining body bytes, or `None` for a chunked body.
    pub fn content_length(&self) -> Option<u64> {
        if self.flags.test(Flags::CHUNKED) {
            None
        } else {
            Some(self.len)
        }
    }

    /// `true` once the body is fully consumed: a length-delimited body
    /// reached zero remaining bytes, or a chunked body saw its
    /// terminating chunk.
    pub fn body_eof(&self) -> bool {
        if self.flags.test(Flags::CHUNKED) {
            self.flags.test(Flags::INTRAILER) || self.state == State::Final
        } else {
            self.len == 0
        }
    }

    /// `true` if the connection may serve another request: the version
    /// permits keep-alive, the request was fully consumed, and the method
    /// is `GET` or `HEAD`.
    pub fn keepalive(&self) -> bool {
        self.flags.test(Flags::KEEPALIVE)
            && matches!(self.env.get(key::REQUEST_METHOD), Some("GET" | "HEAD"))
    }

    /// Like [`keepalive`][Self::keepalive], but accounts the keep-alive
    /// budget and arms the auto-reset for the next request. Returns
    /// `false` once the budget is exhausted.
    pub fn next_request(&mut self) -> bool {
        if !self.keepalive() {
            return false;
        }
        match &mut self.requests_remaining {
            Some(0) => return false,
            Some(n) => *n -= 1,
            None => {}
        }
        self.flags.set(Flags::TO_CLEAR);
        true
    }

    /// `true` if an HTTP/1.x request line with a version token was seen.
    pub fn has_headers(&self) -> bool {
        self.flags.test(Flags::HASHEADER)
    }

    /// Drop the consumed prefix of the buffer. Called only at block
    /// boundaries, where no mark is live.
    fn drain(&mut self) {
        if self.offset > 0 {
            self.buf.advance(self.offset);
            self.offset = 0;
        }
        self.mark = 0;
        self.start = 0;
    }

    fn fail(&mut self, err: HttpParserError) -> HttpParserError {
        warning!("request rejected: {err}");
        self.err = Some(err);
        err
    }
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new()
    }
}
