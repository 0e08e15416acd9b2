use buildit::change::scan_directives;
use buildit::config;
use buildit::graph::DependencyGraph;
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

const MOCK_CONFIG: &str = r#"
[toolchain]
family = "clang"
cxx_standard = 20

[build]
defines = ["DEBUG", "LOG_LEVEL=3"]
include_directories = ["include"]

[[precompiled_header]]
source = "include/pch.hpp"

[[static_library]]
name = "core"
sources = ["src/core/a.cpp", "src/core/b.cpp"]
depends_on = ["util"]

[[static_library]]
name = "util"
sources = ["src/util/u.cpp"]

[[executable]]
name = "app"
sources = ["app/main.cpp"]
system_libraries = ["m", "pthread"]
"#;

fn bench_config_parse(c: &mut Criterion) {
    c.bench_function("parse_buildit_toml", |b| {
        b.iter(|| config::parse_config(black_box(MOCK_CONFIG)).unwrap())
    });
}

fn bench_resolve_order(c: &mut Criterion) {
    // A chain of 200 libraries, each depending on its predecessor and on lib0
    let libraries: Vec<(String, Vec<String>)> = (0..200)
        .map(|i| {
            let deps = match i {
                0 => vec![],
                1 => vec!["lib0".to_string()],
                _ => vec![format!("lib{}", i - 1), "lib0".to_string()],
            };
            (format!("lib{i}"), deps)
        })
        .collect();
    let graph =
        DependencyGraph::new(libraries.iter().map(|(n, d)| (n.as_str(), d.as_slice()))).unwrap();

    c.bench_function("resolve_order_200", |b| {
        b.iter(|| black_box(&graph).resolve_order().unwrap())
    });
    c.bench_function("link_order_200", |b| {
        b.iter(|| black_box(&graph).link_order(&[199]).unwrap())
    });
}

fn bench_include_scan(c: &mut Criterion) {
    let mut source = String::new();
    for i in 0..500 {
        source.push_str(&format!("#include \"module_{i}.h\"\n"));
        source.push_str("#include <vector>\n");
        source.push_str("static int value = 0; // not a directive\n");
    }

    c.bench_function("scan_directives_1500_lines", |b| {
        b.iter(|| scan_directives(black_box(&source)))
    });
}

criterion_group!(
    benches,
    bench_config_parse,
    bench_resolve_order,
    bench_include_scan
);
criterion_main!(benches);
