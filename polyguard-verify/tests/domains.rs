use polyguard_core::{CheckError, ErrorKind};
use polyguard_kernel::Kernel;
use polyguard_verify::{check_implemented_domains, load_implemented};

const FILL: &str = r#"{
    "name": "fill",
    "domains": ["{ [i] : 0 <= i < 10 }"],
    "instructions": [
        {"id": "fill", "assignee": "out[i]", "expression": "0", "inames": ["i"]}
    ],
    "args": [{"name": "out", "shape": ["10"], "dtype": "int32", "kind": "global"}]
}"#;

const TILED: &str = r#"{
    "name": "tiled",
    "assumptions": "[n] -> { : n >= 1 }",
    "domains": [
        "[n] -> { [io] : 0 <= io < n }",
        "[n, io] -> { [ii] : 0 <= ii < 4 and 4 * io + ii < 4 * n }"
    ],
    "instructions": [
        {"id": "copy", "assignee": "out[4 * io + ii]", "expression": "a[4 * io + ii]", "inames": ["io", "ii"]}
    ],
    "args": [
        {"name": "a", "shape": ["4 * n"], "dtype": "float32", "kind": "global"},
        {"name": "out", "shape": ["4 * n"], "dtype": "float32", "kind": "global"}
    ]
}"#;

const EVEN_FILL: &str = r#"{
    "name": "even_fill",
    "domains": ["{ [i] : 0 <= i <= 8 }"],
    "instructions": [
        {"id": "fill", "assignee": "out[i]", "expression": "0", "inames": ["i"]}
    ],
    "args": [{"name": "out", "shape": ["9"], "dtype": "int32", "kind": "global"}]
}"#;

fn kernel(src: &str) -> Kernel {
    Kernel::from_json(src).expect("kernel fixture")
}

#[test]
fn short_loop_reports_the_missing_point() {
    let recs = load_implemented(r#"{"fill": ["{ [i] : 0 <= i < 9 }"]}"#).unwrap();
    let err = check_implemented_domains(&kernel(FILL), &recs, None)
        .expect_err("expected domain mismatch");
    assert_eq!(err.kind(), ErrorKind::DomainMismatch);
    let msg = err.to_string();
    assert!(msg.contains("instruction 'fill' do not match"), "{msg}");
    assert!(
        msg.contains("sample point desired, but not implemented: i=9"),
        "{msg}"
    );
    assert!(!msg.contains("implemented, but not desired"), "{msg}");
}

#[test]
fn overshooting_loop_reports_the_extra_point() {
    let recs = load_implemented(r#"{"fill": ["{ [i] : 0 <= i <= 10 }"]}"#).unwrap();
    match check_implemented_domains(&kernel(FILL), &recs, Some("for (i = 0; i <= 10; ++i)")) {
        Err(CheckError::DomainMismatch {
            implemented_not_desired,
            desired_not_implemented,
            code,
            ..
        }) => {
            assert_eq!(
                implemented_not_desired.map(|p| p.to_string()).as_deref(),
                Some("i=10")
            );
            assert!(desired_not_implemented.is_none());
            assert_eq!(code.as_deref(), Some("for (i = 0; i <= 10; ++i)"));
        }
        other => panic!("expected domain mismatch, got {other:?}"),
    }
}

#[test]
fn redundant_union_is_accepted() {
    let recs = load_implemented(r#"{"fill": ["{ [i] : 0 <= i < 10 }", "{ [i] : i = 3 }"]}"#)
        .unwrap();
    check_implemented_domains(&kernel(FILL), &recs, None).expect("union covers the domain");
}

#[test]
fn split_loop_is_accepted() {
    let recs = load_implemented(r#"{"fill": ["{ [i] : 0 <= i < 5 }", "{ [i] : 5 <= i < 10 }"]}"#)
        .unwrap();
    check_implemented_domains(&kernel(FILL), &recs, None).expect("pieces tile the domain");
}

#[test]
fn nested_domains_compare_under_assumptions() {
    let recs = load_implemented(
        r#"{"copy": ["[n] -> { [io, ii] : 0 <= io < n and 0 <= ii < 4 }"]}"#,
    )
    .unwrap();
    check_implemented_domains(&kernel(TILED), &recs, None).expect("tiling matches");

    let short = load_implemented(
        r#"{"copy": ["[n] -> { [io, ii] : 0 <= io < n and 0 <= ii < 3 }"]}"#,
    )
    .unwrap();
    let err = check_implemented_domains(&kernel(TILED), &short, None)
        .expect_err("expected domain mismatch");
    let msg = err.to_string();
    assert!(msg.contains("desired, but not implemented: ii=3"), "{msg}");
}

#[test]
fn strided_loop_misses_the_odd_points() {
    let recs = load_implemented(r#"{"fill": ["{ [i, k] : i = 2k and 0 <= k <= 4 }"]}"#).unwrap();
    match check_implemented_domains(&kernel(EVEN_FILL), &recs, None) {
        Err(CheckError::DomainMismatch {
            implemented_not_desired,
            desired_not_implemented,
            ..
        }) => {
            assert_eq!(
                desired_not_implemented.map(|p| p.to_string()).as_deref(),
                Some("i=1")
            );
            assert!(implemented_not_desired.is_none());
        }
        other => panic!("expected domain mismatch, got {other:?}"),
    }
}

#[test]
fn interleaved_strides_cover_the_domain() {
    let recs = load_implemented(
        r#"{"fill": [
            "{ [i, k] : i = 2k and 0 <= k <= 4 }",
            "{ [i, k] : i = 2k + 1 and 0 <= k < 4 }"
        ]}"#,
    )
    .unwrap();
    check_implemented_domains(&kernel(EVEN_FILL), &recs, None).expect("residues tile the domain");
}

#[test]
fn unknown_instruction_is_a_usage_error() {
    let recs = load_implemented(r#"{"nope": ["{ [i] : 0 <= i < 10 }"]}"#).unwrap();
    let err = check_implemented_domains(&kernel(FILL), &recs, None)
        .expect_err("expected usage error");
    assert_eq!(err.kind(), ErrorKind::Usage);
    assert_eq!(err.insn_id(), Some("nope"));
}

#[test]
fn empty_piece_list_is_a_usage_error() {
    let recs = load_implemented(r#"{"fill": []}"#).unwrap();
    let err = check_implemented_domains(&kernel(FILL), &recs, None)
        .expect_err("expected usage error");
    assert!(matches!(err, CheckError::EmptyImplementation { .. }));
}
