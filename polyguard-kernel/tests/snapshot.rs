use std::collections::{BTreeMap, BTreeSet};

use polyguard_kernel::{
    AffineAnalysis, ArgKind, DType, Kernel, KernelError, Scope, SymbolicAnalysis, Tag,
};

const MATVEC: &str = r#"{
    "name": "matvec",
    "assumptions": "[n, m] -> { : n >= 1 and m >= 1 }",
    "domains": ["[n] -> { [i] : 0 <= i < n }", "[m] -> { [j] : 0 <= j < m }"],
    "instructions": [
        {"id": "init", "assignee": "acc", "expression": "0", "inames": ["i"]},
        {"id": "dot", "assignee": "acc", "expression": "acc + a[i, j] * x[j]", "inames": ["i", "j"]},
        {"id": "store", "assignee": "y[i]", "expression": "acc", "inames": ["i"]}
    ],
    "iname_to_tag": {"i": "g.0", "j": "unr"},
    "temporaries": [{"name": "acc", "dtype": "float64", "scope": "private"}],
    "args": [
        {"name": "a", "shape": ["n", "m"], "dtype": "float64", "kind": "global"},
        {"name": "x", "shape": ["m"], "dtype": "float64", "kind": "global"},
        {"name": "y", "shape": ["n"], "dtype": "float64", "kind": "global"},
        {"name": "alpha", "dtype": "double", "kind": "value"}
    ],
    "grid": {"group": ["n"]}
}"#;

#[test]
fn loads_a_full_snapshot() {
    let k = Kernel::from_json(MATVEC).expect("snapshot");
    assert_eq!(k.instructions.len(), 3);
    assert_eq!(k.tag("i"), Some(&Tag::GroupAxis(0)));
    assert_eq!(k.tag("j"), Some(&Tag::Unroll));
    assert_eq!(k.temporaries["acc"].scope, Scope::Private);
    assert!(k.temporaries["acc"].shape.is_empty());
    let alpha = k.argument("alpha").expect("alpha");
    assert_eq!(alpha.kind, ArgKind::Value);
    assert_eq!(alpha.dtype, DType::Float64);
    assert!(alpha.shape.is_none());
    assert_eq!(
        k.all_params(),
        BTreeSet::from(["m".to_string(), "n".to_string()])
    );
}

#[test]
fn json_survives_a_round_trip() {
    let k = Kernel::from_json(MATVEC).unwrap();
    let again = Kernel::from_json(&k.to_json().unwrap()).unwrap();
    assert_eq!(again.to_string(), k.to_string());
}

#[test]
fn dump_lists_every_section() {
    let dump = Kernel::from_json(MATVEC).unwrap().to_string();
    for heading in [
        "KERNEL: matvec",
        "ARGUMENTS:",
        "DOMAINS:",
        "ASSUMPTIONS:",
        "INAME TAGS:",
        "TEMPORARIES:",
        "INSTRUCTIONS:",
        "GRID:",
    ] {
        assert!(dump.contains(heading), "missing {heading} in\n{dump}");
    }
    assert!(dump.contains("j: unr"), "{dump}");
    assert!(dump.contains("{id=dot, inames=i,j}"), "{dump}");
}

#[test]
fn undeclared_iname_is_rejected() {
    let src = MATVEC.replace(r#""inames": ["i", "j"]"#, r#""inames": ["i", "k"]"#);
    let err = Kernel::from_json(&src).expect_err("expected validation failure");
    match err {
        KernelError::UndeclaredIname { insn_id, iname } => {
            assert_eq!(insn_id, "dot");
            assert_eq!(iname, "k");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn iname_in_two_domains_is_rejected() {
    let src = MATVEC.replace("[m] -> { [j] : 0 <= j < m }", "[m] -> { [i, j] : 0 <= j < m }");
    let err = Kernel::from_json(&src).expect_err("expected validation failure");
    assert!(err.to_string().contains("'i'"), "{err}");
}

#[test]
fn bad_tag_text_is_rejected() {
    let src = MATVEC.replace(r#""j": "unr""#, r#""j": "l.x""#);
    let err = Kernel::from_json(&src).expect_err("expected tag failure");
    assert!(err.to_string().contains("l.x"), "{err}");
}

#[test]
fn domain_syntax_errors_surface_as_json_errors() {
    let src = MATVEC.replace("0 <= i < n }", "0 <= i < }");
    let err = Kernel::from_json(&src).expect_err("expected parse failure");
    assert!(matches!(err, KernelError::Json(_)), "{err}");
}

#[test]
fn analysis_sees_subscripts_of_every_instruction() {
    let k = Kernel::from_json(MATVEC).unwrap();
    let dot = k.instruction("dot").unwrap();
    let subs: Vec<&str> = dot.expression.subscripts().into_iter().map(|(a, _)| a).collect();
    assert_eq!(subs, vec!["a", "x"]);

    let domain = k.domain_for_inames(&dot.inames).unwrap();
    let subscripts = dot.expression.subscripts();
    let (_, index) = subscripts[0];
    let range = AffineAnalysis
        .access_range(&domain, index)
        .unwrap()
        .expect("affine");
    let at = |i: i64, j: i64, n: i64, m: i64| {
        BTreeMap::from([
            ("_acc0".to_string(), i),
            ("_acc1".to_string(), j),
            ("n".to_string(), n),
            ("m".to_string(), m),
        ])
    };
    assert!(range.contains(&at(2, 3, 4, 4)).unwrap());
    assert!(!range.contains(&at(4, 0, 4, 4)).unwrap());
}
