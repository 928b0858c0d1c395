use bytes::BytesMut;
use criterion::{Criterion, criterion_group, criterion_main};

use rackline::RequestParser;

fn concat_lines(lines: &[&[u8]]) -> Vec<u8> {
    lines
        .iter()
        .flat_map(|line| [*line, b"\r\n"].concat())
        .collect()
}

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("parse short request", |b| {
        let source = concat_lines(&[b"GET /foo/bar HTTP/1.1", b"Host: example.com", b""]);

        b.iter(|| {
            let mut parser = RequestParser::new();
            parser.add_parse(&source).unwrap().unwrap();
        })
    });

    c.bench_function("parse long request", |b| {
        let source = concat_lines(&[
            b"POST /foo/bar?some=parameters#anchor HTTP/1.1",
            b"Host: example.com",
            b"X-Some-Header: foo",
            b"Connection: close",
            b"Content-Type: text/plain",
            b"Last-Modified: Thu, 02 Jun 2016 06:01:08 GMT",
            b"Accept-Encoding: gzip, deflate, br",
            b"User-Agent: Mozilla/5.0 (X11; Linux x86_64) Gecko/20100101 Firefox/128.0",
            b"Cookie: this is a fairly long cookie the quick brown fox jumps over the lazy dog",
            b"Content-Length: 8",
            b"",
        ]);

        b.iter(|| {
            let mut parser = RequestParser::new();
            parser.add_parse(&source).unwrap().unwrap();
        })
    });

    c.bench_function("filter chunked body", |b| {
        let head = concat_lines(&[
            b"PUT /upload HTTP/1.1",
            b"Host: example.com",
            b"Transfer-Encoding: chunked",
            b"",
        ]);
        let body = concat_lines(&[b"400", &[b'x'; 0x400][..], b"400", &[b'y'; 0x400][..], b"0", b""]);

        b.iter(|| {
            let mut parser = RequestParser::new();
            parser.add_parse(&head).unwrap().unwrap();
            parser.append(&body);
            let mut dst = BytesMut::new();
            parser.filter_body(&mut dst).unwrap();
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
