#![allow(unused)]
extern crate apkscope;

use apkscope::axml::{parse, XmlDocument, ANDROID_NAMESPACE};
use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::hint::black_box;

/// Writes a UTF-16 binary XML manifest with `activities` activity elements.
///
/// Each activity has an `android:name` attribute and an intent filter, which is roughly
/// what a generated .NET for Android manifest looks like.
fn manifest(activities: usize) -> Vec<u8> {
    let mut strings: Vec<String> = vec![
        "android".into(),
        ANDROID_NAMESPACE.into(),
        "manifest".into(),
        "package".into(),
        "com.example.bench".into(),
        "application".into(),
        "activity".into(),
        "name".into(),
        "intent-filter".into(),
        "action".into(),
        "android.intent.action.VIEW".into(),
    ];
    for index in 0..activities {
        strings.push(format!("crc64bench.Activity{index}"));
    }

    let mut pool = Vec::new();
    let mut offsets = Vec::new();
    for string in &strings {
        offsets.push(pool.len() as u32);
        let units: Vec<u16> = string.encode_utf16().collect();
        pool.extend_from_slice(&(units.len() as u16).to_le_bytes());
        for unit in units {
            pool.extend_from_slice(&unit.to_le_bytes());
        }
        pool.extend_from_slice(&[0, 0]);
    }
    while pool.len() % 4 != 0 {
        pool.push(0);
    }

    let mut out = Vec::new();
    let strings_start = 28 + 4 * strings.len() as u32;
    let pool_size = strings_start + pool.len() as u32;
    chunk(&mut out, 0x0001, 28, pool_size);
    for value in [strings.len() as u32, 0, 0, strings_start, 0] {
        out.extend_from_slice(&value.to_le_bytes());
    }
    for offset in offsets {
        out.extend_from_slice(&offset.to_le_bytes());
    }
    out.extend_from_slice(&pool);

    let none = u32::MAX;
    node(&mut out, 0x0100, &[0, 1]);
    start(&mut out, 2, &[(none, 3, 4)]);
    start(&mut out, 5, &[]);
    for index in 0..activities {
        start(&mut out, 6, &[(1, 7, 11 + index as u32)]);
        start(&mut out, 8, &[]);
        start(&mut out, 9, &[(1, 7, 10)]);
        node(&mut out, 0x0103, &[none, 9]);
        node(&mut out, 0x0103, &[none, 8]);
        node(&mut out, 0x0103, &[none, 6]);
    }
    node(&mut out, 0x0103, &[none, 5]);
    node(&mut out, 0x0103, &[none, 2]);
    node(&mut out, 0x0101, &[0, 1]);

    let mut document = Vec::new();
    chunk(&mut document, 0x0003, 8, 8 + out.len() as u32);
    document.extend_from_slice(&out);
    document
}

fn chunk(out: &mut Vec<u8>, kind: u16, header_size: u16, size: u32) {
    out.extend_from_slice(&kind.to_le_bytes());
    out.extend_from_slice(&header_size.to_le_bytes());
    out.extend_from_slice(&size.to_le_bytes());
}

fn node(out: &mut Vec<u8>, kind: u16, body: &[u32]) {
    chunk(out, kind, 16, 16 + 4 * body.len() as u32);
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&u32::MAX.to_le_bytes());
    for word in body {
        out.extend_from_slice(&word.to_le_bytes());
    }
}

/// Start element with `(namespace, name, string value)` attributes.
fn start(out: &mut Vec<u8>, name: u32, attributes: &[(u32, u32, u32)]) {
    let mut body = vec![u32::MAX, name, 0x0014_0014, attributes.len() as u32, 0];
    for (namespace, attr_name, value) in attributes {
        body.extend_from_slice(&[*namespace, *attr_name, *value, 8 | (0x03 << 24), *value]);
    }
    node(out, 0x0102, &body);
}

fn bench_axml(c: &mut Criterion) {
    for activities in [16, 512] {
        let data = manifest(activities);

        let mut group = c.benchmark_group(format!("axml_{activities}_activities"));
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_function("parse", |b| {
            b.iter(|| {
                let document = parse(black_box(&data)).unwrap();
                black_box(document)
            });
        });

        let text = parse(&data).unwrap().to_xml_string().unwrap();
        group.bench_function("to_xml_string", |b| {
            let document = parse(&data).unwrap();
            b.iter(|| black_box(document.to_xml_string().unwrap()));
        });
        group.bench_function("parse_text", |b| {
            b.iter(|| black_box(XmlDocument::parse_text(black_box(&text)).unwrap()));
        });
        group.finish();
    }
}

criterion_group!(benches, bench_axml);
criterion_main!(benches);
