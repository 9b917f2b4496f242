//! Streaming deflate: flush modes, framing, dictionaries and chunking.

use oxiflate::{Deflater, GzipHeader, Inflater};
use oxiflate_core::{Adler32, Error, Flush, Strategy, Wrap, ZParams};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn text(size: usize) -> Vec<u8> {
    b"It was the best of times, it was the worst of times, it was the age of wisdom. "
        .iter()
        .copied()
        .cycle()
        .take(size)
        .collect()
}

fn random(size: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..size).map(|_| rng.r#gen()).collect()
}

/// Feed `input` with `flush` and collect whatever comes out.
fn deflate_step(
    deflater: &mut Deflater,
    input: &[u8],
    flush: Flush,
) -> (Result<(), Error>, Vec<u8>) {
    let mut out = vec![0u8; deflater.bound(input.len()) + 4096];
    let mut zp = ZParams::new(input, &mut out);
    let result = deflater.write(&mut zp, flush);
    assert_eq!(zp.avail_in(), 0);
    let n = zp.total_out as usize;
    out.truncate(n);
    (result, out)
}

fn inflate_all(
    inflater: &mut Inflater,
    data: &[u8],
    capacity: usize,
) -> (Result<(), Error>, Vec<u8>) {
    let mut out = vec![0u8; capacity];
    let mut zp = ZParams::new(data, &mut out);
    let result = inflater.write(&mut zp, Flush::None);
    let n = zp.total_out as usize;
    out.truncate(n);
    (result, out)
}

fn raw_deflater(level: u8) -> Deflater {
    let mut deflater = Deflater::new();
    deflater
        .reset(level, 15, 8, Strategy::Normal, Wrap::None)
        .unwrap();
    deflater
}

fn raw_inflater() -> Inflater {
    let mut inflater = Inflater::new();
    inflater.reset(15, Wrap::None).unwrap();
    inflater
}

#[test]
fn test_partial_flush_makes_data_decodable() {
    let input = text(3000);
    let mut deflater = raw_deflater(6);
    let (result, out) = deflate_step(&mut deflater, &input, Flush::Partial);
    assert_eq!(result, Ok(()));

    let (result, restored) = inflate_all(&mut raw_inflater(), &out, input.len() + 16);
    assert_eq!(result, Ok(()));
    assert_eq!(restored, input);
}

#[test]
fn test_sync_flush_byte_aligns() {
    let input = text(1000);
    let mut deflater = raw_deflater(6);
    let (result, out) = deflate_step(&mut deflater, &input, Flush::Sync);
    assert_eq!(result, Ok(()));
    assert!(out.ends_with(&[0x00, 0x00, 0xFF, 0xFF]));

    let (_, restored) = inflate_all(&mut raw_inflater(), &out, input.len() + 16);
    assert_eq!(restored, input);
}

#[test]
fn test_full_flush_allows_independent_decoding() {
    let first = text(5000);
    let second: Vec<u8> = first.iter().rev().copied().collect();

    let mut deflater = raw_deflater(9);
    let (_, head) = deflate_step(&mut deflater, &first, Flush::Full);
    let (result, tail) = deflate_step(&mut deflater, &second, Flush::Finish);
    assert_eq!(result, Err(Error::EndOfStream));

    // A fresh decoder starting right after the full flush sees only `second`
    let (result, restored) = inflate_all(&mut raw_inflater(), &tail, second.len() + 16);
    assert_eq!(result, Err(Error::EndOfStream));
    assert_eq!(restored, second);

    // The whole stream still decodes to both halves
    let mut whole = head;
    whole.extend_from_slice(&tail);
    let (result, restored) = inflate_all(&mut raw_inflater(), &whole, 2 * first.len() + 16);
    assert_eq!(result, Err(Error::EndOfStream));
    assert_eq!(restored.len(), 2 * first.len());
    assert_eq!(&restored[..first.len()], &first[..]);
}

#[test]
fn test_block_flush_roundtrip() {
    let input = text(2000);
    let mut deflater = raw_deflater(6);
    let (result, mut out) = deflate_step(&mut deflater, &input, Flush::Block);
    assert_eq!(result, Ok(()));
    let (result, rest) = deflate_step(&mut deflater, &[], Flush::Finish);
    assert_eq!(result, Err(Error::EndOfStream));
    out.extend_from_slice(&rest);

    let (_, restored) = inflate_all(&mut raw_inflater(), &out, input.len() + 16);
    assert_eq!(restored, input);
}

#[test]
fn test_trees_flush_defers_symbols() {
    let input = text(2000);
    let mut deflater = raw_deflater(6);
    let (result, mut out) = deflate_step(&mut deflater, &input, Flush::Trees);
    assert_eq!(result, Ok(()));
    assert!(!out.is_empty());

    // Only the block header and its tables have been written so far
    let (result, restored) = inflate_all(&mut raw_inflater(), &out, input.len() + 16);
    assert!(matches!(result, Ok(()) | Err(Error::NeedBuffers)));
    assert!(restored.len() < input.len());

    let (result, rest) = deflate_step(&mut deflater, &[], Flush::Finish);
    assert_eq!(result, Err(Error::EndOfStream));
    out.extend_from_slice(&rest);

    let (result, restored) = inflate_all(&mut raw_inflater(), &out, input.len() + 16);
    assert_eq!(result, Err(Error::EndOfStream));
    assert_eq!(restored, input);
}

/// Level 8 with the smallest memory level, so a block holds only 127 symbols.
fn small_buffer_deflater(strategy: Strategy) -> Deflater {
    let mut deflater = Deflater::new();
    deflater.reset(8, 15, 1, strategy, Wrap::None).unwrap();
    deflater
}

#[test]
fn test_flush_at_literal_buffer_full() {
    let input: Vec<u8> = (0..255).collect();

    for strategy in [Strategy::Huffman, Strategy::Rle, Strategy::Normal] {
        let mut deflater = small_buffer_deflater(strategy);
        let mut out = [0u8; 264];
        let mut zp = ZParams::new(&input, &mut out);
        assert_eq!(
            deflater.write(&mut zp, Flush::Finish),
            Err(Error::EndOfStream),
            "{strategy:?}"
        );
        assert_eq!(zp.avail_out(), 1, "{strategy:?}");

        // One byte short: the call fills the output and the stream is not done
        let mut deflater = small_buffer_deflater(strategy);
        let mut out = [0u8; 263];
        let mut zp = ZParams::new(&input, &mut out);
        assert_eq!(deflater.write(&mut zp, Flush::Finish), Ok(()), "{strategy:?}");
        assert_eq!(zp.avail_out(), 0, "{strategy:?}");

        let mut deflater = small_buffer_deflater(strategy);
        let mut out = [0u8; 20];
        let mut zp = ZParams::new(&input, &mut out);
        assert_eq!(deflater.write(&mut zp, Flush::Sync), Ok(()), "{strategy:?}");
    }
}

#[test]
fn test_rle_run_longer_than_lookahead() {
    let mut input = vec![0u8; 300];
    input[..4].fill(b'a');

    let mut deflater = small_buffer_deflater(Strategy::Rle);
    let mut out = vec![0u8; input.len() * 2];
    let mut zp = ZParams::new(&input, &mut out);
    assert_eq!(deflater.write(&mut zp, Flush::Sync), Ok(()));
    assert_eq!(zp.avail_in(), 0);
}

#[test]
fn test_flush_after_distance_match() {
    // 125 literals nearly fill the symbol buffer, so the match that follows
    // forces a block out while output space is short
    let mut input = [0u8; 256];
    for (i, byte) in input[..125].iter_mut().enumerate() {
        *byte = i as u8;
    }
    for (i, byte) in input[125..].iter_mut().enumerate() {
        *byte = i as u8;
    }

    for out_size in [144, 129] {
        let mut deflater = small_buffer_deflater(Strategy::Normal);
        let mut out = vec![0u8; out_size];
        let mut zp = ZParams::new(&input, &mut out);
        assert_eq!(deflater.write(&mut zp, Flush::Sync), Ok(()), "out {out_size}");
    }
}

#[test]
fn test_zlib_preset_dictionary() {
    let dictionary = b"the worst of times, the age of wisdom";
    let input = text(400);

    let mut deflater = Deflater::new();
    let id = deflater.set_dictionary(dictionary).unwrap();
    let (result, compressed) = deflate_step(&mut deflater, &input, Flush::Finish);
    assert_eq!(result, Err(Error::EndOfStream));

    let mut inflater = Inflater::new();
    let mut out = vec![0u8; input.len() + 16];
    let mut zp = ZParams::new(&compressed, &mut out);
    assert_eq!(inflater.write(&mut zp, Flush::None), Err(Error::NeedDict));
    assert_eq!(inflater.dictionary_id(), Some(id));
    assert_eq!(inflater.dictionary_id(), Some(Adler32::compute(dictionary)));

    assert_eq!(
        inflater.set_dictionary(b"wrong dictionary"),
        Err(Error::IncorrectDataCheck)
    );
    inflater.set_dictionary(dictionary).unwrap();
    assert_eq!(inflater.write(&mut zp, Flush::None), Err(Error::EndOfStream));
    let n = zp.total_out as usize;
    drop(zp);
    assert_eq!(&out[..n], &input[..]);
}

#[test]
fn test_raw_preset_dictionary() {
    let dictionary = text(300);
    let input = text(600);

    let mut plain = raw_deflater(6);
    let (_, without) = deflate_step(&mut plain, &input, Flush::Finish);

    let mut deflater = raw_deflater(6);
    deflater.set_dictionary(&dictionary).unwrap();
    let (_, with) = deflate_step(&mut deflater, &input, Flush::Finish);
    assert!(with.len() < without.len());

    let mut inflater = raw_inflater();
    inflater.set_dictionary(&dictionary).unwrap();
    let (result, restored) = inflate_all(&mut inflater, &with, input.len() + 16);
    assert_eq!(result, Err(Error::EndOfStream));
    assert_eq!(restored, input);
}

#[test]
fn test_gzip_header_fields_roundtrip() {
    let input = text(1500);
    let mut deflater = Deflater::new();
    deflater
        .reset(6, 15, 8, Strategy::Normal, Wrap::Gzip)
        .unwrap();
    deflater
        .set_gzip_header(GzipHeader {
            text: true,
            mtime: 0x5F5E_1000,
            os: 255,
            extra: Some(b"AB\x02\x00hi".to_vec()),
            name: Some(b"tale.txt".to_vec()),
            comment: Some(b"two cities".to_vec()),
            hcrc: true,
        })
        .unwrap();
    let (result, compressed) = deflate_step(&mut deflater, &input, Flush::Finish);
    assert_eq!(result, Err(Error::EndOfStream));
    assert_eq!(compressed[3], 0x1F);

    let mut inflater = Inflater::new();
    inflater.reset(15, Wrap::Gzip).unwrap();
    let (result, restored) = inflate_all(&mut inflater, &compressed, input.len() + 16);
    assert_eq!(result, Err(Error::EndOfStream));
    assert_eq!(restored, input);
    assert_eq!(inflater.adler(), deflater.adler());
}

#[test]
fn test_stored_level_large_input() {
    let input = random(200_000, 7);
    let mut deflater = Deflater::new();
    deflater
        .reset(0, 15, 1, Strategy::Normal, Wrap::Zlib)
        .unwrap();
    let (result, compressed) = deflate_step(&mut deflater, &input, Flush::Finish);
    assert_eq!(result, Err(Error::EndOfStream));
    assert!(compressed.len() <= deflater.bound(input.len()));

    let mut inflater = Inflater::new();
    let (result, restored) = inflate_all(&mut inflater, &compressed, input.len() + 16);
    assert_eq!(result, Err(Error::EndOfStream));
    assert_eq!(restored, input);
}

#[test]
fn test_incompressible_stays_within_bound() {
    for level in [1, 6, 9] {
        let input = random(100_000, u64::from(level));
        let mut deflater = Deflater::new();
        deflater
            .reset(level, 15, 8, Strategy::Normal, Wrap::Gzip)
            .unwrap();
        let (result, compressed) = deflate_step(&mut deflater, &input, Flush::Finish);
        assert_eq!(result, Err(Error::EndOfStream));
        assert!(compressed.len() <= deflater.bound(input.len()));

        let mut inflater = Inflater::new();
        inflater.reset(15, Wrap::Gzip).unwrap();
        let (_, restored) = inflate_all(&mut inflater, &compressed, input.len() + 16);
        assert_eq!(restored, input);
    }
}

#[test]
fn test_small_window_and_memory() {
    let mut input = text(50_000);
    input.extend(random(20_000, 3));
    input.extend(text(50_000));

    for (window_bits, mem_level) in [(9, 1), (12, 4), (15, 9)] {
        let mut deflater = Deflater::new();
        deflater
            .reset(8, window_bits, mem_level, Strategy::Normal, Wrap::Zlib)
            .unwrap();
        let (result, compressed) = deflate_step(&mut deflater, &input, Flush::Finish);
        assert_eq!(result, Err(Error::EndOfStream));

        let mut inflater = Inflater::new();
        inflater.reset(window_bits, Wrap::Zlib).unwrap();
        let (result, restored) = inflate_all(&mut inflater, &compressed, input.len() + 16);
        assert_eq!(result, Err(Error::EndOfStream), "window {window_bits}");
        assert_eq!(restored, input);
    }
}

#[test]
fn test_inflate_rejects_larger_window() {
    let mut deflater = Deflater::new();
    let (_, compressed) = deflate_step(&mut deflater, b"window check", Flush::Finish);

    let mut inflater = Inflater::new();
    inflater.reset(10, Wrap::Zlib).unwrap();
    let (result, _) = inflate_all(&mut inflater, &compressed, 64);
    assert_eq!(result, Err(Error::InvalidWindowSize));
}

#[test]
fn test_chunked_equivalence() {
    let mut input = text(40_000);
    input.extend(random(10_000, 11));
    input.extend(text(30_000));
    let mut rng = StdRng::seed_from_u64(0xDEF1_A7E5);

    // Compress with random input and output chunk sizes
    let mut deflater = Deflater::new();
    let mut compressed = Vec::new();
    let mut pos = 0;
    loop {
        let in_len = rng.gen_range(0..=4096).min(input.len() - pos);
        let mut out = vec![0u8; rng.gen_range(1..=2048)];
        let flush = if pos + in_len == input.len() {
            Flush::Finish
        } else {
            Flush::None
        };
        let mut zp = ZParams::new(&input[pos..pos + in_len], &mut out);
        let result = deflater.write(&mut zp, flush);
        pos += zp.total_in as usize;
        let n = zp.total_out as usize;
        drop(zp);
        compressed.extend_from_slice(&out[..n]);
        match result {
            Ok(()) | Err(Error::NeedBuffers) => {}
            Err(Error::EndOfStream) => break,
            Err(e) => panic!("unexpected {e:?}"),
        }
    }
    assert_eq!(deflater.total_in(), input.len() as u64);

    // Decompress with random chunk sizes as well
    let mut inflater = Inflater::new();
    let mut restored = Vec::new();
    let mut pos = 0;
    loop {
        let in_len = rng.gen_range(0..=512).min(compressed.len() - pos);
        let mut out = vec![0u8; rng.gen_range(1..=1024)];
        let mut zp = ZParams::new(&compressed[pos..pos + in_len], &mut out);
        let result = inflater.write(&mut zp, Flush::None);
        pos += zp.total_in as usize;
        let n = zp.total_out as usize;
        drop(zp);
        restored.extend_from_slice(&out[..n]);
        match result {
            Ok(()) | Err(Error::NeedBuffers) => {}
            Err(Error::EndOfStream) => break,
            Err(e) => panic!("unexpected {e:?}"),
        }
    }
    assert_eq!(restored, input);
    assert_eq!(inflater.total_in(), compressed.len() as u64);
}

#[test]
fn test_reset_is_repeatable() {
    let input = text(20_000);
    let mut fresh = raw_deflater(6);
    let (result, expected) = deflate_step(&mut fresh, &input, Flush::Finish);
    assert_eq!(result, Err(Error::EndOfStream));

    // Reused after a finished stream and reset twice with the same settings
    let mut reused = raw_deflater(6);
    let _ = deflate_step(&mut reused, &random(5000, 3), Flush::Finish);
    for _ in 0..2 {
        reused
            .reset(6, 15, 8, Strategy::Normal, Wrap::None)
            .unwrap();
    }
    let (result, again) = deflate_step(&mut reused, &input, Flush::Finish);
    assert_eq!(result, Err(Error::EndOfStream));
    assert_eq!(again, expected);

    let mut inflater = raw_inflater();
    let _ = inflate_all(&mut inflater, &again, input.len());
    inflater.reset(15, Wrap::None).unwrap();
    inflater.reset(15, Wrap::None).unwrap();
    let (result, restored) = inflate_all(&mut inflater, &again, input.len() + 1);
    assert_eq!(result, Err(Error::EndOfStream));
    assert_eq!(restored, input);
}

/// Every level and strategy at a 512-byte window with the two largest
/// memory levels, followed by the defaults.
fn settings_grid() -> Vec<(u8, u8, u8, Strategy)> {
    let strategies = [
        Strategy::Normal,
        Strategy::Filtered,
        Strategy::Huffman,
        Strategy::Rle,
        Strategy::Fixed,
    ];
    let mut grid = Vec::new();
    for level in 0..=9 {
        for strategy in strategies {
            for mem_level in [8, 9] {
                grid.push((level, 9, mem_level, strategy));
            }
        }
    }
    grid.push((6, 15, 8, Strategy::Normal));
    grid
}

/// Short runs of alphanumeric characters.
fn runs_corpus(size: usize) -> Vec<u8> {
    const ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
    let mut rng = StdRng::seed_from_u64(5489);
    let mut data = Vec::with_capacity(size + 5);
    while data.len() < size {
        let ch = ALPHABET[rng.gen_range(0..ALPHABET.len())];
        let run = rng.gen_range(1..=5);
        data.extend(std::iter::repeat_n(ch, run));
    }
    data.truncate(size);
    data
}

/// Decode a raw stream that may end at a flush point instead of a final block.
fn inflate_flushed(inflater: &mut Inflater, data: &[u8], expected_len: usize) -> Vec<u8> {
    inflater.reset(15, Wrap::None).unwrap();
    let (result, restored) = inflate_all(inflater, data, expected_len + 16);
    assert!(
        matches!(result, Ok(()) | Err(Error::EndOfStream)),
        "unexpected {result:?}"
    );
    restored
}

/// Compress everything in one call, then keep asking for full flushes until
/// the deflater reports nothing left to do.
fn deflate_full_flushes(deflater: &mut Deflater, input: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; deflater.bound(input.len())];
    let mut zp = ZParams::new(input, &mut out);
    let mut first = true;
    loop {
        match deflater.write(&mut zp, Flush::Full) {
            Ok(()) => {
                assert!(first, "second full flush made progress");
                first = false;
            }
            Err(Error::NeedBuffers | Error::EndOfStream) => break,
            Err(e) => panic!("unexpected {e:?}"),
        }
    }
    let n = zp.total_out as usize;
    out.truncate(n);
    out
}

/// Offer the first `split_in` input bytes and `split_out` output bytes, then
/// the rest of each once it runs out. Full flushes start once all input has
/// been offered. Returns the compressed length.
fn deflate_split(
    deflater: &mut Deflater,
    input: &[u8],
    out: &mut [u8],
    split_in: usize,
    split_out: usize,
) -> usize {
    let (mut in_pos, mut in_end) = (0, split_in);
    let (mut out_pos, mut out_end) = (0, split_out);
    let (mut all_in, mut all_out) = (false, false);

    loop {
        let flush = if all_in { Flush::Full } else { Flush::None };
        let mut zp = ZParams::new(&input[in_pos..in_end], &mut out[out_pos..out_end]);
        let result = deflater.write(&mut zp, flush);
        in_pos += zp.total_in as usize;
        out_pos += zp.total_out as usize;

        match result {
            Ok(()) => {}
            Err(Error::NeedBuffers | Error::EndOfStream) => return out_pos,
            Err(e) => panic!("unexpected {e:?}"),
        }
        if in_pos == in_end && !all_in {
            all_in = true;
            in_end = input.len();
        }
        if out_pos == out_end && !all_out {
            all_out = true;
            out_end = out.len();
        }
    }
}

#[test]
fn test_full_flush_every_setting() {
    let mut inflater = Inflater::new();
    for input in [b"Hello, world!".to_vec(), runs_corpus(1024)] {
        for (level, window_bits, mem_level, strategy) in settings_grid() {
            let mut deflater = Deflater::new();
            deflater
                .reset(level, window_bits, mem_level, strategy, Wrap::None)
                .unwrap();
            let compressed = deflate_full_flushes(&mut deflater, &input);
            assert_eq!(
                inflate_flushed(&mut inflater, &compressed, input.len()),
                input,
                "level {level} window {window_bits} mem {mem_level} {strategy:?}"
            );
        }
    }
}

#[test]
fn test_split_buffers_every_setting() {
    let mut inflater = Inflater::new();
    for input in [b"Hello, world!".to_vec(), runs_corpus(56)] {
        for (level, window_bits, mem_level, strategy) in settings_grid() {
            let mut deflater = Deflater::new();
            for split_in in 1..input.len() {
                for split_out in 1.. {
                    deflater
                        .reset(level, window_bits, mem_level, strategy, Wrap::None)
                        .unwrap();
                    let mut out = vec![0u8; deflater.bound(input.len())];
                    if split_out >= out.len() {
                        break;
                    }
                    let n = deflate_split(&mut deflater, &input, &mut out, split_in, split_out);
                    assert_eq!(
                        inflate_flushed(&mut inflater, &out[..n], input.len()),
                        input,
                        "level {level} mem {mem_level} {strategy:?} split {split_in}/{split_out}"
                    );
                }
            }
        }
    }
}
