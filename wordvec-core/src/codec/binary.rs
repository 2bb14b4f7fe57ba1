//! Binary format of the C word2vec tool
//!
//! ```text
//! <vocab_size> <layer_size>\n
//! (<token> ' ' <layer_size x f32> '\n'?)*
//! ```
//!
//! Floats are single precision. They are written little-endian, and read
//! in whichever byte order the caller configures. Values are widened to
//! `f64` on read and narrowed back on write.
//!
//! Producers disagree on whether a newline follows each vector, so newline
//! bytes encountered while reading a token are dropped rather than treated
//! as part of it.

use std::io::{self, Write};
use std::time::Duration;

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use super::mapped::{MapSource, MappedCursor};
use crate::config::{Endianness, LoadOptions};
use crate::error::{Error, Result};
use crate::progress::{Phase, ProgressSink, Throttle};
use crate::store::{StoreBuilder, VectorStore};

/// Decode a binary model from `source`.
///
/// `source_name` only appears in error messages.
pub fn decode<S: MapSource>(
    source: &S,
    source_name: &str,
    options: &LoadOptions,
    progress: &dyn ProgressSink,
) -> Result<VectorStore> {
    options.validate()?;
    match options.byte_order {
        Endianness::Little => decode_with::<LittleEndian, S>(source, source_name, options, progress),
        Endianness::Big => decode_with::<BigEndian, S>(source, source_name, options, progress),
    }
}

fn decode_with<B: ByteOrder, S: MapSource>(
    source: &S,
    source_name: &str,
    options: &LoadOptions,
    progress: &dyn ProgressSink,
) -> Result<VectorStore> {
    let _load = Phase::start(progress, "Loading vectors from bin file");

    let Some(mut cursor) =
        MappedCursor::open(source, options.remap_threshold, options.map_window)?
    else {
        return Err(Error::MalformedHeader {
            source_name: source_name.to_string(),
            header: String::new(),
        });
    };
    let window = Phase::start(progress, "Reading gigabyte #1");

    let (vocab_size, layer_size) = read_header(&mut cursor, source_name)?;
    check_claimed_size(vocab_size, layer_size, cursor.remaining(), source_name)?;
    progress.log(&format!(
        "Loading {} vectors with dimensionality {}",
        vocab_size, layer_size
    ));

    let mut builder = StoreBuilder::allocate(vocab_size, layer_size, options.max_segment_doubles)?;
    log::debug!(
        "Allocated {} segments of up to {} vectors for '{}'",
        builder.layout().num_segments(),
        builder.layout().vectors_per_segment(),
        source_name
    );

    let mut token = Vec::with_capacity(64);
    let mut floats = vec![0f32; layer_size];
    let mut throttle = Throttle::every(Duration::from_secs(1));

    for index in 0..vocab_size {
        read_token(&mut cursor, &mut token)?;
        cursor.read_f32_into::<B>(&mut floats)?;

        let slot = builder.next_slot(token_to_string(&token, index))?;
        for (dst, &src) in slot.iter_mut().zip(&floats) {
            *dst = f64::from(src);
        }

        if throttle.ready() {
            let loaded = index + 1;
            let percentage = loaded as f64 / vocab_size as f64 * 100.0;
            progress.log(&format!(
                "Loaded {}/{} vectors ({:.2}%)",
                loaded, vocab_size, percentage
            ));
        }

        if let Some(remap) = cursor.maybe_remap()? {
            progress.end_and_start(&format!(
                "Reading gigabyte #{}. Start: {}, size: {}",
                remap.count + 1,
                remap.start,
                remap.len
            ));
        }
    }
    drop(window);

    builder.finish()
}

/// `<vocab_size> <layer_size>\n`
fn read_header<S: MapSource>(
    cursor: &mut MappedCursor<'_, S>,
    source_name: &str,
) -> Result<(usize, usize)> {
    let mut line = Vec::new();
    loop {
        match cursor.read_u8() {
            Ok(b'\n') => break,
            Ok(b) => line.push(b),
            Err(_) => {
                // Input ended before the header did
                return Err(malformed(source_name, &line));
            }
        }
    }

    let text = String::from_utf8_lossy(&line);
    let Some((vocab, layer)) = text.split_once(' ') else {
        return Err(malformed(source_name, &line));
    };
    match (vocab.trim().parse(), layer.trim().parse()) {
        (Ok(vocab_size), Ok(layer_size)) => Ok((vocab_size, layer_size)),
        _ => Err(malformed(source_name, &line)),
    }
}

/// Every record takes at least a separator plus its floats, so a header
/// claiming more than the input can hold is rejected before allocating.
fn check_claimed_size(
    vocab_size: usize,
    layer_size: usize,
    remaining: u64,
    source_name: &str,
) -> Result<()> {
    let needed = layer_size
        .checked_mul(4)
        .and_then(|n| n.checked_add(1))
        .and_then(|n| n.checked_mul(vocab_size));
    match needed {
        Some(needed) if needed as u64 <= remaining => Ok(()),
        _ => Err(Error::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!(
                "'{}' claims {} vectors of dimensionality {}, but only {} bytes follow the header",
                source_name, vocab_size, layer_size, remaining
            ),
        ))),
    }
}

fn malformed(source_name: &str, header: &[u8]) -> Error {
    Error::MalformedHeader {
        source_name: source_name.to_string(),
        header: String::from_utf8_lossy(header).into_owned(),
    }
}

/// Read up to the next space, skipping newlines
fn read_token<S: MapSource>(cursor: &mut MappedCursor<'_, S>, token: &mut Vec<u8>) -> Result<()> {
    token.clear();
    loop {
        match cursor.read_u8()? {
            b' ' => return Ok(()),
            b'\n' => {}
            b => token.push(b),
        }
    }
}

fn token_to_string(bytes: &[u8], index: usize) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(e) => {
            // The C tool truncates long words at a byte limit, which can
            // split a multi-byte character.
            log::debug!("token #{} is not valid UTF-8 ({}), replacing", index, e);
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

/// Write `store` in the binary format. Floats are always little-endian.
pub fn encode<W: Write>(store: &VectorStore, writer: &mut W) -> Result<()> {
    writeln!(writer, "{} {}", store.len(), store.layer_size())?;

    let mut narrowed = vec![0f32; store.layer_size()];
    let mut bytes = vec![0u8; store.layer_size() * 4];
    for (token, vector) in store.iter() {
        writer.write_all(token.as_bytes())?;
        writer.write_all(b" ")?;
        for (dst, &src) in narrowed.iter_mut().zip(vector) {
            *dst = src as f32;
        }
        LittleEndian::write_f32_into(&narrowed, &mut bytes);
        writer.write_all(&bytes)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{NoProgress, WriterProgress};
    use byteorder::WriteBytesExt;

    fn sample_store(n: usize, layer_size: usize, max_segment_doubles: usize) -> VectorStore {
        let vocab = (0..n).map(|i| format!("word{}", i)).collect();
        let vectors = (0..n * layer_size)
            .map(|i| (i as f64 * 0.37).sin() * 10.0)
            .collect();
        VectorStore::from_dense(vocab, layer_size, vectors, max_segment_doubles).unwrap()
    }

    fn decode_bytes(bytes: &[u8], options: &LoadOptions) -> Result<VectorStore> {
        decode(&bytes, "test.bin", options, &NoProgress)
    }

    fn assert_close(a: &VectorStore, b: &VectorStore) {
        assert_eq!(a.vocab(), b.vocab());
        assert_eq!(a.layer_size(), b.layer_size());
        for i in 0..a.len() {
            for (x, y) in a.vector_at(i).unwrap().iter().zip(b.vector_at(i).unwrap()) {
                assert!((x - y).abs() <= x.abs() * f32::EPSILON as f64, "{} vs {}", x, y);
            }
        }
    }

    #[test]
    fn test_encode_layout_is_bit_exact() {
        let store = VectorStore::from_dense(
            vec!["a".to_string(), "bé".to_string()],
            2,
            vec![1.0, -2.0, 0.5, 3.25],
            1024,
        )
        .unwrap();
        let mut out = Vec::new();
        encode(&store, &mut out).unwrap();

        let mut expected = b"2 2\na ".to_vec();
        expected.write_f32::<LittleEndian>(1.0).unwrap();
        expected.write_f32::<LittleEndian>(-2.0).unwrap();
        expected.extend_from_slice("\nbé ".as_bytes());
        expected.write_f32::<LittleEndian>(0.5).unwrap();
        expected.write_f32::<LittleEndian>(3.25).unwrap();
        expected.push(b'\n');
        assert_eq!(out, expected);
    }

    #[test]
    fn test_round_trip() {
        let store = sample_store(50, 7, 1024);
        let mut out = Vec::new();
        encode(&store, &mut out).unwrap();
        let decoded = decode_bytes(&out, &LoadOptions::default()).unwrap();
        assert_close(&store, &decoded);
    }

    #[test]
    fn test_round_trip_across_segments() {
        let store = sample_store(50, 7, 1024);
        let mut out = Vec::new();
        encode(&store, &mut out).unwrap();

        // 3 vectors per segment
        let options = LoadOptions::default().with_max_segment_doubles(21);
        let decoded = decode_bytes(&out, &options).unwrap();
        assert_eq!(decoded.num_segments(), 17);
        assert_eq!(decoded.segment(16).unwrap().len(), 14);
        assert_close(&store, &decoded);
    }

    #[test]
    fn test_remapping_matches_single_view() {
        let store = sample_store(400, 9, 1024);
        let mut out = Vec::new();
        encode(&store, &mut out).unwrap();
        assert!(out.len() > 16_000);

        let whole = decode_bytes(&out, &LoadOptions::default()).unwrap();
        // Records are ~45 bytes; the data crosses the threshold dozens of times
        for (threshold, window) in [(256, 512), (1000, 1100), (777, 4096)] {
            let options = LoadOptions::default()
                .with_remap(threshold, window)
                .with_max_segment_doubles(90);
            let remapped = decode_bytes(&out, &options).unwrap();
            assert_eq!(remapped.vocab(), whole.vocab());
            for i in 0..whole.len() {
                assert_eq!(remapped.vector_at(i).unwrap(), whole.vector_at(i).unwrap());
            }
        }
    }

    #[test]
    fn test_remap_phases_are_reported() {
        let store = sample_store(100, 4, 1024);
        let mut out = Vec::new();
        encode(&store, &mut out).unwrap();

        let sink = WriterProgress::new(Vec::new());
        let options = LoadOptions::default().with_remap(512, 1024);
        decode(&out.as_slice(), "test.bin", &options, &sink).unwrap();

        let log = String::from_utf8(sink.into_inner()).unwrap();
        assert!(log.starts_with("Loading vectors from bin file\n"));
        assert!(log.contains("Loading 100 vectors with dimensionality 4"));
        assert!(log.contains("Reading gigabyte #2. Start: 512, size: 1024"));
        assert!(log.lines().last().unwrap().starts_with("Loading vectors from bin file took"));
    }

    #[test]
    fn test_big_endian_input() {
        let mut input = b"1 3\nxyz ".to_vec();
        for v in [1.5f32, -0.25, 8.0] {
            input.write_f32::<BigEndian>(v).unwrap();
        }
        let options = LoadOptions::default().with_byte_order(Endianness::Big);
        let store = decode_bytes(&input, &options).unwrap();
        assert_eq!(store.vocab(), ["xyz"]);
        assert_eq!(store.vector_at(0).unwrap(), &[1.5, -0.25, 8.0]);
    }

    #[test]
    fn test_newlines_inside_tokens_are_skipped() {
        // No trailing newline after the first vector, two before the second token
        let mut input = b"2 1\nfoo ".to_vec();
        input.write_f32::<LittleEndian>(1.0).unwrap();
        input.extend_from_slice(b"\n\nbar ");
        input.write_f32::<LittleEndian>(2.0).unwrap();

        let store = decode_bytes(&input, &LoadOptions::default()).unwrap();
        assert_eq!(store.vocab(), ["foo", "bar"]);
        assert_eq!(store.vector_at(1).unwrap(), &[2.0]);
    }

    #[test]
    fn test_malformed_header() {
        let err = decode_bytes(b"100\n", &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, Error::MalformedHeader { ref header, .. } if header == "100"));

        let err = decode_bytes(b"ten 3\n", &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, Error::MalformedHeader { .. }));

        let err = decode_bytes(b"", &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, Error::MalformedHeader { .. }));

        let err = decode_bytes(b"2 3", &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, Error::MalformedHeader { .. }));
    }

    #[test]
    fn test_truncated_input_fails() {
        let store = sample_store(3, 4, 1024);
        let mut out = Vec::new();
        encode(&store, &mut out).unwrap();
        out.truncate(out.len() - 6);

        let err = decode_bytes(&out, &LoadOptions::default()).unwrap_err();
        match err {
            Error::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof),
            other => panic!("expected IO error, got {:?}", other),
        }
    }

    #[test]
    fn test_header_claiming_more_than_input() {
        let mut input = b"100000000000000 1\nfoo ".to_vec();
        input.write_f32::<LittleEndian>(1.0).unwrap();
        let err = decode_bytes(&input, &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == std::io::ErrorKind::UnexpectedEof));
        assert!(err.to_string().contains("claims 100000000000000 vectors"));

        // Overflowing record size
        let input = format!("1 {}\nfoo ", usize::MAX);
        assert!(matches!(
            decode_bytes(input.as_bytes(), &LoadOptions::default()),
            Err(Error::Io(_))
        ));

        // One vector short
        let mut input = b"2 1\nfoo ".to_vec();
        input.write_f32::<LittleEndian>(1.0).unwrap();
        assert!(decode_bytes(&input, &LoadOptions::default()).is_err());
    }

    #[test]
    fn test_invalid_utf8_token_is_replaced() {
        let mut input = b"1 1\nab\xC3 ".to_vec();
        input.write_f32::<LittleEndian>(4.0).unwrap();
        let store = decode_bytes(&input, &LoadOptions::default()).unwrap();
        assert_eq!(store.vocab()[0], "ab\u{FFFD}");
    }

    #[test]
    fn test_empty_vocabulary() {
        let store = decode_bytes(b"0 5\n", &LoadOptions::default()).unwrap();
        assert!(store.is_empty());
        assert_eq!(store.layer_size(), 5);
    }

    /// Writes a ~2.4 GB file and holds ~4.8 GB of vectors in memory.
    #[cfg(feature = "native")]
    #[test]
    #[ignore]
    fn test_multi_gigabyte_file_with_default_options() {
        use std::io::BufWriter;

        const VOCAB: usize = 600_000;
        const LAYER: usize = 1000;
        let value = |i: usize, j: usize| ((i * 31 + j) % 1000) as f32 / 100.0;

        let mut file = tempfile::tempfile().unwrap();
        {
            let mut w = BufWriter::with_capacity(1 << 20, &mut file);
            writeln!(w, "{} {}", VOCAB, LAYER).unwrap();
            for i in 0..VOCAB {
                write!(w, "w{} ", i).unwrap();
                for j in 0..LAYER {
                    w.write_f32::<LittleEndian>(value(i, j)).unwrap();
                }
                w.write_all(b"\n").unwrap();
            }
            w.flush().unwrap();
        }
        assert!(file.metadata().unwrap().len() > 2 * crate::config::REMAP_THRESHOLD);

        let store = decode(&file, "large.bin", &LoadOptions::default(), &NoProgress).unwrap();
        assert_eq!(store.len(), VOCAB);
        assert!(store.num_segments() > 1);
        for i in (0..VOCAB).step_by(997).chain([VOCAB - 1]) {
            assert_eq!(store.vocab()[i], format!("w{}", i));
            let v = store.vector_at(i).unwrap();
            for j in 0..LAYER {
                assert_eq!(v[j], f64::from(value(i, j)));
            }
        }
    }

    #[cfg(feature = "native")]
    #[test]
    fn test_decode_from_file() {
        let store = sample_store(64, 16, 1024);
        let mut file = tempfile::tempfile().unwrap();
        encode(&store, &mut file).unwrap();

        let options = LoadOptions::default().with_remap(1024, 2048);
        let decoded = decode(&file, "tempfile", &options, &NoProgress).unwrap();
        assert_close(&store, &decoded);
    }
}
