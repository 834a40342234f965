use std::hint::black_box;

use bytes::BytesMut;
use criterion::{criterion_group, criterion_main, Criterion};
use micro_formdata::codec::{MultipartDecoder, UrlEncodedDecoder};
use micro_formdata::protocol::{Charset, FormItem};
use micro_formdata::storage::{DataFactory, UploadCleaner};
use tokio_util::codec::Decoder;

const BOUNDARY: &str = "----benchboundary";

fn multipart_body(fields: usize, file_size: usize) -> Vec<u8> {
    let mut body = String::new();
    for i in 0..fields {
        body.push_str(&format!(
            "--{BOUNDARY}\r\ncontent-disposition: form-data; name=\"field{i}\"\r\n\r\nvalue {i}\r\n"
        ));
    }
    body.push_str(&format!(
        "--{BOUNDARY}\r\ncontent-disposition: form-data; name=\"file\"; filename=\"data.bin\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n"
    ));
    body.push_str(&"x".repeat(file_size));
    body.push_str(&format!("\r\n--{BOUNDARY}--\r\n"));
    body.into_bytes()
}

fn decode_full_body(body: &[u8]) -> usize {
    let mut decoder =
        MultipartDecoder::new(BOUNDARY, Charset::Utf8, DataFactory::in_memory(), UploadCleaner::new());
    let mut buf = BytesMut::from(body);
    let mut count = 0;
    loop {
        match decoder.decode(&mut buf).unwrap() {
            Some(FormItem::Eof) | None => break,
            Some(_) => count += 1,
        }
    }
    count
}

fn bench_multipart(c: &mut Criterion) {
    let small = multipart_body(32, 1024);
    c.bench_function("multipart_32_fields_1k_file", |b| {
        b.iter(|| black_box(decode_full_body(black_box(&small))));
    });

    let large = multipart_body(4, 256 * 1024);
    c.bench_function("multipart_4_fields_256k_file", |b| {
        b.iter(|| black_box(decode_full_body(black_box(&large))));
    });

    // worst case for the boundary scan: many short lines, no boundary hits
    let liney = {
        let mut content = String::new();
        for _ in 0..4096 {
            content.push_str("--almost a boundary line\r\n");
        }
        [
            format!("--{BOUNDARY}\r\n"),
            "content-disposition: form-data; name=\"file\"; filename=\"lines.txt\"\r\n".to_string(),
            "Content-Type: text/plain\r\n\r\n".to_string(),
            content,
            format!("\r\n--{BOUNDARY}--\r\n"),
        ]
        .concat()
        .into_bytes()
    };
    c.bench_function("multipart_line_heavy_file", |b| {
        b.iter(|| black_box(decode_full_body(black_box(&liney))));
    });
}

fn bench_urlencoded(c: &mut Criterion) {
    let body: Vec<u8> = (0..128).map(|i| format!("key{i}=value+number+{i}")).collect::<Vec<_>>().join("&").into_bytes();
    let decoder = UrlEncodedDecoder::new(Charset::Utf8, DataFactory::in_memory());
    c.bench_function("urlencoded_128_pairs", |b| {
        b.iter(|| black_box(decoder.decode(black_box(&body)).unwrap().len()));
    });
}

criterion_group!(benches, bench_multipart, bench_urlencoded);
criterion_main!(benches);
