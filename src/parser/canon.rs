//! Header canonicalizer: turns scanned field spans into CGI env entries.
//!
//! Field names arrive already normalized (the scanner upcases and
//! underscores them in place), so the common-field table is keyed by the
//! finished form and a miss only has to glue on the `HTTP_` prefix.

use super::{Cont, Flags, MAX_FIELD_VALUE_LEN, MAX_URI_LEN, RequestParser};
use crate::env::{common_field, key};
use crate::error::HttpParserError;

impl RequestParser {
    pub(super) fn end_method(&mut self, off: usize) {
        // SAFETY: method bytes were matched against the ASCII token class
        let method = unsafe { std::str::from_utf8_unchecked(&self.buf[self.mark..off]) };
        let method = method.to_string();
        self.env.push_static(key::REQUEST_METHOD, method);
    }

    /// The `OPTIONS *` form: the URI is `*`, path and path-info are empty.
    pub(super) fn end_star(&mut self, off: usize) -> Result<(), HttpParserError> {
        self.end_uri(off)?;
        self.env.push_static(key::REQUEST_PATH, String::new());
        self.env.push_static(key::PATH_INFO, String::new());
        Ok(())
    }

    pub(super) fn end_scheme(&mut self, off: usize) {
        // SAFETY: scheme bytes were matched against the ASCII scheme class
        let scheme = unsafe { std::str::from_utf8_unchecked(&self.buf[self.start..off]) };
        let scheme = scheme.to_ascii_lowercase();
        self.env.push_static(key::RACK_URL_SCHEME, scheme);
    }

    /// Host (and optional port) of an absolute request-target. This wins
    /// over any inbound `Host` header.
    pub(super) fn end_authority(&mut self, off: usize) -> Result<(), HttpParserError> {
        if off == self.start {
            return Err(HttpParserError::Parse("empty URI host"));
        }
        // SAFETY: authority bytes were matched against an ASCII class
        let host = unsafe { std::str::from_utf8_unchecked(&self.buf[self.start..off]) };
        let host = host.to_string();
        self.env.push_static(key::HTTP_HOST, host);
        Ok(())
    }

    pub(super) fn end_path(&mut self, off: usize) -> Result<(), HttpParserError> {
        if off - self.start > MAX_URI_LEN {
            return Err(HttpParserError::UriTooLong);
        }
        // SAFETY: path bytes were matched against an ASCII class
        let path = unsafe { std::str::from_utf8_unchecked(&self.buf[self.start..off]) };
        let path = path.to_string();
        let info = (path != "*").then(|| path.clone());
        self.env.push_static(key::REQUEST_PATH, path);
        if let Some(info) = info {
            self.env.push_static(key::PATH_INFO, info);
        }
        Ok(())
    }

    pub(super) fn end_query(&mut self, off: usize) -> Result<(), HttpParserError> {
        if off - self.start > MAX_URI_LEN {
            return Err(HttpParserError::UriTooLong);
        }
        // SAFETY: query bytes were matched against an ASCII class
        let query = unsafe { std::str::from_utf8_unchecked(&self.buf[self.start..off]) };
        let query = query.to_string();
        self.env.push_static(key::QUERY_STRING, query);
        Ok(())
    }

    pub(super) fn end_fragment(&mut self, off: usize) -> Result<(), HttpParserError> {
        if off - self.start > MAX_URI_LEN {
            return Err(HttpParserError::UriTooLong);
        }
        // SAFETY: fragment bytes were matched against an ASCII class
        let fragment = unsafe { std::str::from_utf8_unchecked(&self.buf[self.start..off]) };
        let fragment = fragment.to_string();
        self.env.push_static(key::FRAGMENT, fragment);
        Ok(())
    }

    /// The whole request-target as sent, marked from its first byte.
    pub(super) fn end_uri(&mut self, off: usize) -> Result<(), HttpParserError> {
        if off - self.mark > MAX_URI_LEN {
            return Err(HttpParserError::UriTooLong);
        }
        // SAFETY: target bytes were matched against ASCII classes
        let uri = unsafe { std::str::from_utf8_unchecked(&self.buf[self.mark..off]) };
        let uri = uri.to_string();
        self.env.push_static(key::REQUEST_URI, uri);
        Ok(())
    }

    pub(super) fn end_version(&mut self, off: usize) -> Result<(), HttpParserError> {
        let raw = &self.buf[self.mark..off];
        if !valid_version(raw) {
            return Err(HttpParserError::Parse("invalid HTTP version"));
        }
        self.flags.set(Flags::HASHEADER);
        if raw == b"HTTP/1.1" {
            self.flags.set(Flags::KAVERSION);
        }
        // SAFETY: checked by `valid_version`
        let version = unsafe { std::str::from_utf8_unchecked(raw) }.to_string();
        self.env.push_static(key::SERVER_PROTOCOL, version.clone());
        self.env.push_static(key::HTTP_VERSION, version);
        Ok(())
    }

    /// A complete `name: value` line. Runs the special-header semantics,
    /// then stores the value, merging duplicates with a comma.
    pub(super) fn end_field_value(&mut self, off: usize) -> Result<(), HttpParserError> {
        use HttpParserError::Parse;

        if off - self.mark > MAX_FIELD_VALUE_LEN {
            return Err(Parse("header field value too long"));
        }

        let name_end = self.start + self.field_len;
        // SAFETY: the scanner normalized the name in place via FIELD_NAME
        let name = unsafe { std::str::from_utf8_unchecked(&self.buf[self.start..name_end]) };
        // SAFETY: value bytes were matched against the ASCII value class
        let value = unsafe { std::str::from_utf8_unchecked(&self.buf[self.mark..off]) };

        if self.flags.test(Flags::INTRAILER)
            && matches!(name, "CONTENT_LENGTH" | "TRANSFER_ENCODING" | "TRAILER")
        {
            return Err(Parse("field not allowed in trailer"));
        }

        match name {
            // would collide with the request line's HTTP_VERSION
            "VERSION" => {
                self.cont = Cont::Ignore;
                return Ok(());
            }
            "CONNECTION" => {
                if value.eq_ignore_ascii_case("keep-alive") {
                    self.flags.set(Flags::KAVERSION);
                } else if value.eq_ignore_ascii_case("close") {
                    self.flags.unset(Flags::KAVERSION);
                }
            }
            "CONTENT_LENGTH" => {
                if self.env.contains(key::CONTENT_LENGTH) {
                    return Err(Parse("duplicate Content-Length"));
                }
                let n = content_length(value.as_bytes())?;
                if n > 0 {
                    self.flags.set(Flags::HASBODY);
                }
                self.len = n;
            }
            "TRANSFER_ENCODING" => {
                if value.eq_ignore_ascii_case("chunked") {
                    self.flags.set(Flags::CHUNKED | Flags::HASBODY);
                }
            }
            "TRAILER" => self.flags.set(Flags::HASTRAILER),
            // the request line's absolute form, or the first Host, wins
            "HOST" if self.env.contains(key::HTTP_HOST) => {
                self.cont = Cont::Ignore;
                return Ok(());
            }
            _ => {}
        }

        let at = match common_field(name) {
            Some(k) => match self.env.position(k) {
                Some(at) => {
                    self.env.append_value(at, ',', value);
                    at
                }
                None => self.env.push_static(k, value.to_string()),
            },
            None => {
                let k = format!("HTTP_{name}");
                match self.env.position(&k) {
                    Some(at) => {
                        self.env.append_value(at, ',', value);
                        at
                    }
                    None => self.env.push_owned(k, value.to_string()),
                }
            }
        };
        self.cont = Cont::Entry(at);
        Ok(())
    }

    /// A folded continuation line: its content extends the previous
    /// header's value, the fold collapsing to a single space.
    pub(super) fn end_cont(&mut self, off: usize) {
        match self.cont {
            // rejected at the start of the line
            Cont::None => unreachable!(),
            Cont::Ignore => {}
            Cont::Entry(at) => {
                // SAFETY: value bytes were matched against the ASCII value class
                let tail = unsafe { std::str::from_utf8_unchecked(&self.buf[self.mark..off]) };
                self.env.append_value(at, ' ', tail);
            }
        }
    }
}

/// `HTTP/` DIGIT+ `.` DIGIT+
fn valid_version(v: &[u8]) -> bool {
    let Some(num) = v.strip_prefix(b"HTTP/") else {
        return false;
    };
    let Some(dot) = num.iter().position(|&b| b == b'.') else {
        return false;
    };
    let (major, minor) = (&num[..dot], &num[dot + 1..]);
    !major.is_empty()
        && !minor.is_empty()
        && major.iter().all(u8::is_ascii_digit)
        && minor.iter().all(u8::is_ascii_digit)
}

/// Strict non-negative decimal: no sign, no whitespace, no overflow.
fn content_length(value: &[u8]) -> Result<u64, HttpParserError> {
    const INVALID: HttpParserError = HttpParserError::Parse("invalid Content-Length");

    if value.is_empty() {
        return Err(INVALID);
    }
    let mut n: u64 = 0;
    for &b in value {
        if !b.is_ascii_digit() {
            return Err(INVALID);
        }
        n = n
            .checked_mul(10)
            .and_then(|n| n.checked_add((b - b'0') as u64))
            .ok_or(INVALID)?;
    }
    Ok(n)
}
