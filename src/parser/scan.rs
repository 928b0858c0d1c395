use bytes::BytesMut;

use super::{Cont, Flags, MAX_FIELD_NAME_LEN, RequestParser};
use crate::error::HttpParserError;
use crate::matches;

macro_rules! err {
    ($reason:literal) => {
        return Err(HttpParserError::Parse($reason))
    };
}

/// Scan machine position. `Final` means the request, including any body,
/// is fully consumed.
///
/// Lf-suffixed states have consumed a CR and expect the matching LF; line
/// endings are strictly CRLF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum State {
    Start,
    Method,
    TargetStart,
    Star,
    Scheme,
    SchemeSlash1,
    SchemeSlash2,
    Authority,
    Path,
    Query,
    Fragment,
    Version,
    ReqlineLf,
    /// Start of a header (or trailer) line.
    HeaderStart,
    FieldName,
    /// After the name's colon, skipping optional whitespace.
    FieldSep,
    FieldValue,
    FieldLf,
    /// Folded continuation line, skipping leading whitespace.
    ContStart,
    ContValue,
    /// CR of the empty line ending a header or trailer block.
    HeadersLf,
    /// Expecting the first hex digit of a chunk size.
    ChunkStart,
    ChunkSize,
    /// Chunk extension, consumed and ignored.
    ChunkExt,
    ChunkSizeLf,
    ChunkData,
    /// Chunk payload consumed, expecting the closing CR.
    ChunkDataEnd,
    ChunkDataEndLf,
    /// Length-delimited body; not machine-driven.
    Body,
    Final,
}

impl State {
    /// Past the header block: chunk framing, length body, or done. Trailer
    /// parsing reuses header states and is recognized by INTRAILER instead.
    pub(super) fn past_headers(self) -> bool {
        matches!(
            self,
            State::ChunkStart
                | State::ChunkSize
                | State::ChunkExt
                | State::ChunkSizeLf
                | State::ChunkData
                | State::ChunkDataEnd
                | State::ChunkDataEndLf
                | State::Body
                | State::Final
        )
    }
}

impl RequestParser {
    /// Advance the machine over the buffered bytes from `self.offset`.
    ///
    /// `dst` receives chunk payload and must be `Some` for the machine to
    /// enter chunk-framing states; without it the scan stops at the body
    /// boundary. Returns `true` when a block completed this call: the
    /// header block (env ready), an HTTP/0.9 request, or the trailer
    /// block.
    pub(super) fn scan(
        &mut self,
        mut dst: Option<&mut BytesMut>,
    ) -> Result<bool, HttpParserError> {
        let mut off = self.offset;
        let mut done = false;
        let mut suspend = false;

        while off < self.buf.len() {
            match self.state {
                State::Final | State::Body => break,
                // trailer lines are fed through `parse`, not `filter_body`
                _ if dst.is_some() && self.flags.test(Flags::INTRAILER) => break,
                State::ChunkData => {
                    let Some(dst) = dst.as_mut() else { break };
                    let n = self.len.min((self.buf.len() - off) as u64) as usize;
                    dst.extend_from_slice(&self.buf[off..off + n]);
                    off += n;
                    self.len -= n as u64;
                    if self.len == 0 {
                        self.flags.unset(Flags::INCHUNK);
                        self.state = State::ChunkDataEnd;
                    }
                    continue;
                }
                State::ChunkStart
                | State::ChunkSize
                | State::ChunkExt
                | State::ChunkSizeLf
                | State::ChunkDataEnd
                | State::ChunkDataEndLf
                    if dst.is_none() =>
                {
                    break;
                }
                _ => {}
            }

            let b = self.buf[off];
            match self.state {
                // ===== Request line =====
                State::Start => {
                    if !matches::is_token(b) {
                        err!("invalid request method");
                    }
                    self.mark = off;
                    self.state = State::Method;
                }
                State::Method => {
                    if !matches::is_token(b) {
                        if b != b' ' {
                            err!("invalid request method");
                        }
                        self.end_method(off);
                        self.state = State::TargetStart;
                    }
                }
                State::TargetStart => match b {
                    b'/' => {
                        self.mark = off;
                        self.start = off;
                        self.state = State::Path;
                    }
                    b'*' => {
                        self.mark = off;
                        self.state = State::Star;
                    }
                    _ if b.is_ascii_alphabetic() => {
                        self.mark = off;
                        self.start = off;
                        self.state = State::Scheme;
                    }
                    _ => err!("invalid request target"),
                },
                State::Star => match b {
                    b' ' => {
                        self.end_star(off)?;
                        self.mark = off + 1;
                        self.state = State::Version;
                    }
                    b'\r' => {
                        self.end_star(off)?;
                        self.state = State::ReqlineLf;
                    }
                    _ => err!("invalid request target"),
                },
                State::Scheme => {
                    if !matches::is_scheme(b) {
                        if b != b':' {
                            err!("invalid URI scheme");
                        }
                        self.end_scheme(off);
                        self.state = State::SchemeSlash1;
                    }
                }
                State::SchemeSlash1 => match b {
                    b'/' => self.state = State::SchemeSlash2,
                    _ => err!("invalid absolute URI"),
                },
                State::SchemeSlash2 => match b {
                    b'/' => {
                        self.start = off + 1;
                        self.state = State::Authority;
                    }
                    _ => err!("invalid absolute URI"),
                },
                State::Authority => {
                    if !matches::is_authority(b) {
                        match b {
                            b'/' => {
                                self.end_authority(off)?;
                                self.start = off;
                                self.state = State::Path;
                            }
                            b'?' => {
                                self.end_authority(off)?;
                                self.start = off + 1;
                                self.state = State::Query;
                            }
                            b'#' => {
                                self.end_authority(off)?;
                                self.start = off + 1;
                                self.state = State::Fragment;
                            }
                            b' ' => {
                                self.end_authority(off)?;
                                self.end_uri(off)?;
                                self.mark = off + 1;
                                self.state = State::Version;
                            }
                            b'\r' => {
                                self.end_authority(off)?;
                                self.end_uri(off)?;
                                self.state = State::ReqlineLf;
                            }
                            _ => err!("invalid URI host"),
                        }
                    }
                }
                State::Path => {
                    if !matches::is_path(b) {
                        match b {
                            b'?' => {
                                self.end_path(off)?;
                                self.start = off + 1;
                                self.state = State::Query;
                            }
                            b'#' => {
                                self.end_path(off)?;
                                self.start = off + 1;
                                self.state = State::Fragment;
                            }
                            b' ' => {
                                self.end_path(off)?;
                                self.end_uri(off)?;
                                self.mark = off + 1;
                                self.state = State::Version;
                            }
                            b'\r' => {
                                self.end_path(off)?;
                                self.end_uri(off)?;
                                self.state = State::ReqlineLf;
                            }
                            _ => err!("invalid URI path"),
                        }
                    }
                }
                State::Query => {
                    if !matches::is_query(b) {
                        match b {
                            b'#' => {
                                self.end_query(off)?;
                                self.start = off + 1;
                                self.state = State::Fragment;
                            }
                            b' ' => {
                                self.end_query(off)?;
                                self.end_uri(off)?;
                                self.mark = off + 1;
                                self.state = State::Version;
                            }
                            b'\r' => {
                                self.end_query(off)?;
                                self.end_uri(off)?;
                                self.state = State::ReqlineLf;
                            }
                            _ => err!("invalid query string"),
                        }
                    }
                }
                State::Fragment => {
                    if !matches::is_fragment(b) {
                        match b {
                            b' ' => {
                                self.end_fragment(off)?;
                                self.end_uri(off)?;
                                self.mark = off + 1;
                                self.state = State::Version;
                            }
                            b'\r' => {
                                self.end_fragment(off)?;
                                self.end_uri(off)?;
                                self.state = State::ReqlineLf;
                            }
                            _ => err!("invalid URI fragment"),
                        }
                    }
                }
                State::Version => match b {
                    b'A'..=b'Z' | b'0'..=b'9' | b'/' | b'.' => {}
                    b'\r' => {
                        self.end_version(off)?;
                        self.state = State::ReqlineLf;
                    }
                    _ => err!("invalid HTTP version"),
                },
                State::ReqlineLf => {
                    if b != b'\n' {
                        err!("expected LF after CR");
                    }
                    if self.flags.test(Flags::HASHEADER) {
                        self.state = State::HeaderStart;
                    } else {
                        // HTTP/0.9: the request ends with its line
                        self.finalize_header();
                        self.flags.set(Flags::REQEOF);
                        self.state = State::Final;
                        done = true;
                    }
                }

                // ===== Header and trailer lines =====
                State::HeaderStart => match b {
                    b'\r' => self.state = State::HeadersLf,
                    b' ' | b'\t' => {
                        if self.cont == Cont::None {
                            err!("continuation line without a header");
                        }
                        self.state = State::ContStart;
                    }
                    _ => {
                        let nb = matches::FIELD_NAME[b as usize];
                        if nb & 0x80 != 0 {
                            err!("invalid header field name");
                        }
                        self.buf[off] = nb;
                        self.start = off;
                        self.field_len = 1;
                        self.state = State::FieldName;
                    }
                },
                State::FieldName => {
                    if b == b':' {
                        self.state = State::FieldSep;
                    } else {
                        let nb = matches::FIELD_NAME[b as usize];
                        if nb & 0x80 != 0 {
                            err!("invalid header field name");
                        }
                        self.buf[off] = nb;
                        self.field_len += 1;
                        if self.field_len > MAX_FIELD_NAME_LEN {
                            err!("header field name too long");
                        }
                    }
                }
                State::FieldSep => match b {
                    b' ' | b'\t' => {}
                    b'\r' => {
                        self.mark = off;
                        self.end_field_value(off)?;
                        self.state = State::FieldLf;
                    }
                    _ if matches::is_value(b) => {
                        self.mark = off;
                        self.state = State::FieldValue;
                    }
                    _ => err!("invalid header value"),
                },
                State::FieldValue => {
                    if !matches::is_value(b) {
                        if b != b'\r' {
                            err!("invalid header value");
                        }
                        self.end_field_value(off)?;
                        self.state = State::FieldLf;
                    }
                }
                State::FieldLf => match b {
                    b'\n' => self.state = State::HeaderStart,
                    _ => err!("expected LF after CR"),
                },
                State::ContStart => match b {
                    b' ' | b'\t' => {}
                    b'\r' => {
                        self.mark = off;
                        self.end_cont(off);
                        self.state = State::FieldLf;
                    }
                    _ if matches::is_value(b) => {
                        self.mark = off;
                        self.state = State::ContValue;
                    }
                    _ => err!("invalid header value"),
                },
                State::ContValue => {
                    if !matches::is_value(b) {
                        if b != b'\r' {
                            err!("invalid header value");
                        }
                        self.end_cont(off);
                        self.state = State::FieldLf;
                    }
                }
                State::HeadersLf => {
                    if b != b'\n' {
                        err!("expected LF after CR");
                    }
                    if self.flags.test(Flags::INTRAILER) {
                        self.flags.set(Flags::REQEOF);
                        self.state = State::Final;
                    } else {
                        self.header_done();
                    }
                    done = true;
                }

                // ===== Chunk framing =====
                State::ChunkStart => match hexval(b) {
                    Some(v) => {
                        self.len = v;
                        self.state = State::ChunkSize;
                    }
                    None => err!("invalid chunk size"),
                },
                State::ChunkSize => match hexval(b) {
                    Some(v) => {
                        self.len = self
                            .len
                            .checked_mul(16)
                            .and_then(|n| n.checked_add(v))
                            .ok_or(HttpParserError::Parse("invalid chunk size"))?;
                    }
                    None => match b {
                        b'\r' => self.state = State::ChunkSizeLf,
                        b';' => self.state = State::ChunkExt,
                        _ => err!("invalid chunk size"),
                    },
                },
                State::ChunkExt => match b {
                    b'\r' => self.state = State::ChunkSizeLf,
                    b'\n' => err!("invalid chunk extension"),
                    _ => {}
                },
                State::ChunkSizeLf => {
                    if b != b'\n' {
                        err!("expected LF after CR");
                    }
                    if self.len == 0 {
                        // terminating chunk: stop here so the consumed
                        // framing can be dropped before trailer offsets
                        // start counting
                        self.flags.set(Flags::INTRAILER);
                        self.state = State::HeaderStart;
                        suspend = true;
                    } else {
                        self.flags.set(Flags::INCHUNK);
                        self.state = State::ChunkData;
                    }
                }
                State::ChunkDataEnd => match b {
                    b'\r' => self.state = State::ChunkDataEndLf,
                    _ => err!("expected CRLF after chunk"),
                },
                State::ChunkDataEndLf => match b {
                    b'\n' => self.state = State::ChunkStart,
                    _ => err!("expected CRLF after chunk"),
                },

                // handled before the byte dispatch
                State::ChunkData | State::Body | State::Final => unreachable!(),
            }

            off += 1;
            if done || suspend {
                break;
            }
        }

        self.offset = off;
        Ok(done)
    }

    /// End of the header block: finalize the env and route to the body.
    fn header_done(&mut self) {
        self.finalize_header();
        if self.flags.test(Flags::CHUNKED) {
            // a Content-Length alongside chunked loses; the counter now
            // tracks chunk framing
            self.len = 0;
            self.state = State::ChunkStart;
        } else if self.flags.test(Flags::HASBODY) {
            self.flags.set(Flags::INBODY);
            self.state = State::Body;
        } else {
            self.flags.set(Flags::REQEOF);
            self.state = State::Final;
        }
    }
}

fn hexval(b: u8) -> Option<u64> {
    match b {
        b'0'..=b'9' => Some((b - b'0') as u64),
        b'a'..=b'f' => Some((b - b'a' + 10) as u64),
        b'A'..=b'F' => Some((b - b'A' + 10) as u64),
        _ => None,
    }
}
