//! Text format of the C word2vec tool
//!
//! ```text
//! <vocab_size> <layer_size>
//! <token> <v1> <v2> ... <v_layer_size>
//! ```
//!
//! Every line is materialised before parsing, so this path is only
//! suitable for models that fit in memory several times over. Large
//! models should use the binary format.

use std::io::Write;
use std::path::Path;

use crate::config::MAX_PREALLOC;
use crate::error::{Error, Result};
use crate::store::VectorStore;

/// Decode a text model from its lines. `source_name` appears in errors.
pub fn decode<L: AsRef<str>>(
    source_name: &str,
    lines: &[L],
    max_segment_doubles: usize,
) -> Result<VectorStore> {
    let Some(header) = lines.first() else {
        return Err(Error::MalformedHeader {
            source_name: source_name.to_string(),
            header: String::new(),
        });
    };
    let (vocab_size, layer_size) = parse_header(source_name, header.as_ref())?;

    let actual = lines.len() - 1;
    if vocab_size != actual {
        return Err(Error::VocabSizeMismatch {
            source_name: source_name.to_string(),
            expected: vocab_size,
            actual,
        });
    }

    // The header is untrusted until every line has been checked
    let mut vocab = Vec::with_capacity(vocab_size);
    let mut vectors =
        Vec::with_capacity(vocab_size.saturating_mul(layer_size).min(MAX_PREALLOC));
    for (n, line) in lines.iter().enumerate().skip(1) {
        let mut fields = line.as_ref().split_whitespace();
        let token = fields.next().unwrap_or_default();
        let before = vectors.len();
        for field in fields {
            let value: f64 = field.parse().map_err(|e| Error::Parse {
                source_name: source_name.to_string(),
                line: n,
                message: format!("invalid value '{}': {}", field, e),
            })?;
            vectors.push(value);
        }

        let found = vectors.len() - before;
        if found != layer_size {
            return Err(Error::LayerSizeMismatch {
                source_name: source_name.to_string(),
                line: n,
                expected: layer_size,
                actual: found,
            });
        }
        vocab.push(token.to_string());
    }

    VectorStore::from_dense(vocab, layer_size, vectors, max_segment_doubles)
}

/// Read and decode a text model file
pub fn decode_file(path: &Path, max_segment_doubles: usize) -> Result<VectorStore> {
    let contents = std::fs::read_to_string(path)?;
    let mut lines: Vec<&str> = contents.lines().collect();
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }
    decode(&path.display().to_string(), &lines, max_segment_doubles)
}

fn parse_header(source_name: &str, header: &str) -> Result<(usize, usize)> {
    let malformed = || Error::MalformedHeader {
        source_name: source_name.to_string(),
        header: header.to_string(),
    };
    let mut fields = header.split_whitespace();
    let vocab_size = fields.next().ok_or_else(malformed)?;
    let layer_size = fields.next().ok_or_else(malformed)?;
    match (vocab_size.parse(), layer_size.parse()) {
        (Ok(vocab_size), Ok(layer_size)) => Ok((vocab_size, layer_size)),
        _ => Err(malformed()),
    }
}

/// Write `store` as text. Values are narrowed to `f32` and printed in
/// their shortest round-trip form.
pub fn encode<W: Write>(store: &VectorStore, writer: &mut W) -> Result<()> {
    writeln!(writer, "{} {}", store.len(), store.layer_size())?;
    for (token, vector) in store.iter() {
        writer.write_all(token.as_bytes())?;
        for &value in vector {
            write!(writer, " {}", value as f32)?;
        }
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_SEGMENT_DOUBLES;

    fn decode_str(input: &str) -> Result<VectorStore> {
        let lines: Vec<&str> = input.lines().collect();
        decode("test.txt", &lines, MAX_SEGMENT_DOUBLES)
    }

    #[test]
    fn test_decode_simple() {
        let store = decode_str("2 3\nfoo 1.0 2.0 3.0\nbar 4.0 5.0 6.0\n").unwrap();
        assert_eq!(store.vocab(), ["foo", "bar"]);
        assert_eq!(store.layer_size(), 3);
        assert_eq!(store.vector_at(0).unwrap(), &[1.0, 2.0, 3.0]);
        assert_eq!(store.vector_at(1).unwrap(), &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_trailing_spaces_from_c_tool() {
        // The C tool writes a space after every value
        let store = decode_str("1 2\nfoo 0.5 -0.25 \n").unwrap();
        assert_eq!(store.vector_at(0).unwrap(), &[0.5, -0.25]);
    }

    #[test]
    fn test_vocab_size_mismatch() {
        let err = decode_str("5 2\na 1 2\nb 3 4\nc 5 6\n").unwrap_err();
        assert!(matches!(
            err,
            Error::VocabSizeMismatch {
                expected: 5,
                actual: 3,
                ..
            }
        ));
        let message = err.to_string();
        assert!(message.contains("test.txt"));
        assert!(message.contains('5'));
        assert!(message.contains('3'));
    }

    #[test]
    fn test_layer_size_mismatch() {
        let err = decode_str("2 3\na 1 2 3\nb 4 5\n").unwrap_err();
        assert!(matches!(
            err,
            Error::LayerSizeMismatch {
                line: 2,
                expected: 3,
                actual: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_oversized_layer_in_header() {
        let err = decode_str("1 100000000000000\na 1.0\n").unwrap_err();
        assert!(matches!(
            err,
            Error::LayerSizeMismatch {
                line: 1,
                expected: 100_000_000_000_000,
                actual: 1,
                ..
            }
        ));

        let header = format!("1 {}\na 1.0\n", usize::MAX);
        assert!(matches!(
            decode_str(&header),
            Err(Error::LayerSizeMismatch { actual: 1, .. })
        ));
    }

    #[test]
    fn test_malformed_header_and_values() {
        assert!(matches!(
            decode_str("100\n"),
            Err(Error::MalformedHeader { .. })
        ));
        assert!(matches!(decode_str(""), Err(Error::MalformedHeader { .. })));
        assert!(matches!(
            decode_str("1 x\na 1\n"),
            Err(Error::MalformedHeader { .. })
        ));
        assert!(matches!(
            decode_str("1 2\na 1 oops\n"),
            Err(Error::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn test_round_trip() {
        let vocab = vec!["alpha".to_string(), "beta".to_string(), "γάμμα".to_string()];
        let vectors = vec![0.1, -1.0 / 3.0, 1e-8, 123456.789, 0.0, -7.5];
        let store = VectorStore::from_dense(vocab, 2, vectors.clone(), 4).unwrap();

        let mut out = Vec::new();
        encode(&store, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("3 2\nalpha 0.1 -0.33333334\n"));

        let decoded = decode_str(&text).unwrap();
        assert_eq!(decoded.vocab(), store.vocab());
        for (x, y) in vectors.iter().zip(decoded.flatten().iter()) {
            assert!((x - y).abs() <= x.abs() * 2.0 * f32::EPSILON as f64);
        }
    }

    #[test]
    fn test_decode_file_segments_large_models() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.txt");
        std::fs::write(&path, "3 2\na 1 2\nb 3 4\nc 5 6\n\n").unwrap();

        let store = decode_file(&path, 4).unwrap();
        assert_eq!(store.num_segments(), 2);
        assert_eq!(store.vector_at(2).unwrap(), &[5.0, 6.0]);
    }
}
