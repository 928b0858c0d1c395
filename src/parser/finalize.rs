//! Environment finalizer, run once when the header block ends (or at the
//! end of an HTTP/0.9 request line).

use super::{Flags, RequestParser};
use crate::env::key;

impl RequestParser {
    pub(super) fn finalize_header(&mut self) {
        let https = self.resolve_scheme();
        let default_port = if https { "443" } else { "80" };

        match self.env.get(key::HTTP_HOST).map(str::to_string) {
            Some(host) => {
                let (name, port) = split_host_port(&host);
                let name = name.to_string();
                let port = port.unwrap_or(default_port).to_string();
                self.env.push_static(key::SERVER_NAME, name);
                self.env.push_static(key::SERVER_PORT, port);
            }
            None => {
                self.env.push_static(key::SERVER_NAME, "localhost".to_string());
                self.env.push_static(key::SERVER_PORT, default_port.to_string());
            }
        }

        if !self.flags.test(Flags::HASHEADER) {
            self.env
                .push_static(key::SERVER_PROTOCOL, "HTTP/0.9".to_string());
        }

        // Rack wants the key present even for a bare path
        if !self.env.contains(key::QUERY_STRING) {
            self.env.push_static(key::QUERY_STRING, String::new());
        }
    }

    /// Resolve `rack.url_scheme` and report whether it is https.
    ///
    /// A scheme from an absolute request-target is authoritative. Without
    /// one, the forwarding headers decide — unless they are untrusted, in
    /// which case the scheme is plain http.
    fn resolve_scheme(&mut self) -> bool {
        if let Some(scheme) = self.env.get(key::RACK_URL_SCHEME) {
            return scheme == "https";
        }

        let https = self.cfg.trust_x_forwarded
            && (self
                .env
                .get(key::HTTP_X_FORWARDED_SSL)
                .is_some_and(|v| v.eq_ignore_ascii_case("on"))
                || self
                    .env
                    .get(key::HTTP_X_FORWARDED_PROTO)
                    .is_some_and(|v| v.as_bytes().starts_with(b"https")));

        let scheme = if https { "https" } else { "http" };
        self.env.push_static(key::RACK_URL_SCHEME, scheme.to_string());
        https
    }
}

/// Split a `Host` value into name and optional port. A bracketed IPv6
/// literal keeps its brackets in the name; an empty port reads as absent.
fn split_host_port(host: &str) -> (&str, Option<&str>) {
    if let Some(rest) = host.strip_prefix('[') {
        match rest.find(']') {
            Some(close) => {
                let name = &host[..close + 2];
                let port = host[close + 2..].strip_prefix(':').filter(|p| !p.is_empty());
                (name, port)
            }
            None => (host, None),
        }
    } else {
        match host.rfind(':') {
            Some(at) => (&host[..at], Some(&host[at + 1..]).filter(|p| !p.is_empty())),
            None => (host, None),
        }
    }
}
