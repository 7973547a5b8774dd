use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Dimensionality of the function-name embedding vector.
pub const EMBEDDING_DIM: usize = 384;

/// Function metadata reported by an agent for one service binary.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionInfo {
    /// Symbol name.
    pub name: String,
    /// Package / module path.
    #[serde(default)]
    pub package: String,
    /// Source file, when DWARF was available.
    #[serde(default)]
    pub file_path: String,
    /// Declaration line, 0 when unknown.
    #[serde(default)]
    pub line: u32,
    /// Offset of the symbol in the binary.
    #[serde(default)]
    pub offset: u64,
    /// Whether DWARF info was available for the symbol.
    #[serde(default)]
    pub has_dwarf: bool,
    /// Optional [`EMBEDDING_DIM`]-element embedding of the symbol name.
    /// Deterministic given the name; written once and never refreshed.
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

/// Content hash over a function list, used for change detection so unchanged
/// services skip the upsert. Sorted by name so agent-side ordering does not
/// matter; the embedding is excluded since it is derived from the name.
pub fn functions_content_hash(functions: &[FunctionInfo]) -> String {
    let mut sorted: Vec<&FunctionInfo> = functions.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    let mut hasher = Sha256::new();
    for f in sorted {
        hasher.update(f.name.as_bytes());
        hasher.update(b"|");
        hasher.update(f.package.as_bytes());
        hasher.update(b"|");
        hasher.update(f.file_path.as_bytes());
        hasher.update(b"|");
        hasher.update(f.line.to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(f.offset.to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(if f.has_dwarf { b"1" } else { b"0" });
        hasher.update(b"\n");
    }
    hex_encode(&hasher.finalize())
}

/// Hash over an interned frame-id sequence, identifying one call stack.
pub fn stack_hash(frame_ids: &[i64]) -> String {
    let mut hasher = Sha256::new();
    for id in frame_ids {
        hasher.update(id.to_be_bytes());
    }
    hex_encode(&hasher.finalize()[..16])
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(out, "{b:02x}").expect("infallible");
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;

    fn func(name: &str, line: u32) -> FunctionInfo {
        FunctionInfo {
            name: name.into(),
            package: "pkg".into(),
            file_path: "src/lib.rs".into(),
            line,
            offset: 0x40,
            has_dwarf: true,
            embedding: None,
        }
    }

    #[test]
    fn content_hash_ignores_order_and_embedding() {
        let mut a = vec![func("alpha", 1), func("beta", 2)];
        let b = vec![func("beta", 2), func("alpha", 1)];
        assert_eq!(functions_content_hash(&a), functions_content_hash(&b));

        a[0].embedding = Some(vec![0.5; EMBEDDING_DIM]);
        assert_eq!(functions_content_hash(&a), functions_content_hash(&b));
    }

    #[test]
    fn content_hash_sees_field_changes() {
        let a = vec![func("alpha", 1)];
        let b = vec![func("alpha", 2)];
        assert_ne!(functions_content_hash(&a), functions_content_hash(&b));
    }

    #[test]
    fn stack_hash_is_order_sensitive() {
        assert_ne!(stack_hash(&[1, 2, 3]), stack_hash(&[3, 2, 1]));
        assert_eq!(stack_hash(&[1, 2, 3]), stack_hash(&[1, 2, 3]));
    }
}
