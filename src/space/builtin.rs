use std::collections::BTreeMap;

use crate::models::ParamValue;
use crate::space::model::ParamSpec;
use crate::space::persistence::SpaceDocument;

/// Search heuristics offered to KLEE's `-search` option.
pub const KLEE_SEARCH_HEURISTICS: [&str; 10] = [
    "nurs:cpicnt",
    "nurs:qc",
    "nurs:covnew",
    "random-path",
    "bfs",
    "nurs:md2u",
    "nurs:icnt",
    "nurs:depth",
    "random-state",
    "dfs",
];

fn ints(values: &[i64]) -> Vec<ParamValue> {
    values.iter().copied().map(ParamValue::Int).collect()
}

fn texts(values: &[&str]) -> Vec<ParamValue> {
    values.iter().copied().map(ParamValue::from).collect()
}

fn percents() -> Vec<ParamValue> {
    vec![
        ParamValue::Float(0.25),
        ParamValue::Float(0.5),
        ParamValue::Int(1),
        ParamValue::Int(2),
        ParamValue::Int(4),
    ]
}

/// Tuning space used when no document is supplied.
pub fn default_klee_space() -> BTreeMap<String, ParamSpec> {
    let boolean = || texts(&["true", "false"]);
    let entries = [
        // boolean
        ("-simplify-sym-indices", boolean(), 1),
        ("-use-forked-solver", boolean(), 1),
        ("-use-cex-cache", boolean(), 1),
        ("-max-memory-inhibit", boolean(), 1),
        ("-optimize", boolean(), 1),
        ("-sym-stdout", texts(&["on", "off"]), 1),
        // integer
        ("-max-memory", ints(&[500, 1000, 1500, 2000, 2500]), 1),
        ("-max-sym-array-size", ints(&[3000, 3500, 4000, 4500, 5000]), 1),
        ("-max-instruction-time", ints(&[10, 20, 30, 40, 50]), 1),
        ("-max-static-fork-pct", percents(), 1),
        ("-max-static-solve-pct", percents(), 1),
        ("-max-static-cpfork-pct", percents(), 1),
        ("-batch-instructions", ints(&[6000, 8000, 10000, 12000, 14000]), 1),
        ("-sym-arg", ints(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]), 5),
        ("-sym-files 1", ints(&[4, 8, 12, 16, 20]), 1),
        ("-sym-stdin", ints(&[4, 8, 12, 16, 20]), 1),
        // string
        ("-seed-file", Vec::new(), 1),
        ("-search", texts(&KLEE_SEARCH_HEURISTICS), 1),
        ("-switch-type", texts(&["simple", "internal"]), 1),
        ("-external-calls", texts(&["concrete", "all"]), 1),
    ];

    entries
        .into_iter()
        .map(|(name, domain, n)| (name.to_string(), ParamSpec::new(domain, n)))
        .collect()
}

/// Options passed on every KLEE run unless overridden by the tuning space.
pub fn default_klee_defaults() -> BTreeMap<String, Option<ParamValue>> {
    let entries: [(&str, Option<&str>); 12] = [
        ("-output-module", Some("false")),
        ("-output-source", Some("false")),
        ("-output-stats", Some("false")),
        ("-use-batching-search", None),
        ("-posix-runtime", None),
        ("-only-output-states-covering-new", None),
        ("-watchdog", None),
        ("-allow-seed-extension", None),
        ("-allow-seed-truncation", None),
        ("-ignore-solver-failures", None),
        ("-libc", Some("uclibc")),
        ("-disable-inlining", None),
    ];

    entries
        .into_iter()
        .map(|(name, value)| (name.to_string(), value.map(ParamValue::from)))
        .collect()
}

/// The built-in document, also written by `--generate-search-space-json`.
pub fn default_klee_document() -> SpaceDocument {
    SpaceDocument {
        space: default_klee_space(),
        defaults: default_klee_defaults(),
    }
}
