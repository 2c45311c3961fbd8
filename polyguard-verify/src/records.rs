#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use miette::Diagnostic;
use polyguard_set::{ParseError, Set};
use thiserror::Error;

/// Instruction id to the domain pieces the generated code was built from.
pub type ImplementedDomains = BTreeMap<String, Vec<Set>>;

#[derive(Debug, Error, Diagnostic)]
pub enum RecordError {
    #[error("malformed implemented-domain record")]
    #[diagnostic(code(polyguard::verify::json))]
    Json(#[from] serde_json::Error),

    #[error("implemented domain piece {index} of instruction '{insn_id}' does not parse")]
    #[diagnostic(code(polyguard::verify::piece))]
    Piece {
        insn_id: String,
        index: usize,
        #[source]
        #[diagnostic_source]
        source: ParseError,
    },
}

/// Read a record file of the form `{"insn": ["{ [i] : ... }", ...], ...}`.
pub fn load_implemented(json: &str) -> Result<ImplementedDomains, RecordError> {
    let raw: BTreeMap<String, Vec<String>> = serde_json::from_str(json)?;
    let mut out = ImplementedDomains::new();
    for (insn_id, pieces) in raw {
        let mut sets = Vec::with_capacity(pieces.len());
        for (index, text) in pieces.iter().enumerate() {
            let set = text.parse().map_err(|source| RecordError::Piece {
                insn_id: insn_id.clone(),
                index,
                source,
            })?;
            sets.push(set);
        }
        out.insert(insn_id, sets);
    }
    Ok(out)
}
