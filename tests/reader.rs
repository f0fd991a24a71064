use kira_kmer_stream::*;
use std::io::Cursor;

/// Header + sequence fixtures and their expected decoded k-mers.
const FIXTURES: &[(&str, &[&str])] = &[
    (
        ">small3 k=2 l=30\nCaaaCaaaaaaaaaaaTaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa\n",
        &["CA", "CA", "TA"],
    ),
    (
        ">small3 k=2 l=90\nCaaaCaaaaaaaaaaaaaaaaaaaaaaaTaCaaaCaaaaaaaaaaaaaaaaaaaaaaaTaCaaaCaaaaaaaaaaaaaaaaaaaaaaaTa\n",
        &["CA", "CA", "TA", "CA", "CA", "TA", "CA", "CA", "TA"],
    ),
    (">small3 k=1 l=4\nCCCC\n", &["C", "C", "C", "C"]),
    (">small3 k=2 l=3\nGGG\n", &["CC", "CC"]),
    (">small3 k=2 l=3\naTa\n", &["TA"]),
    (">small3 k=2 l=3\nAta\n", &["AT"]),
    (">small3 k=2 l=3\naGc\n", &["GC"]),
    (">small3 k=2 l=3\naCg\n", &["CG"]),
    (">small3 k=3 l=6\nAaaAaa\n", &["AAA", "AAA"]),
    (">small3 k=2 l=5\nAaaaa\n", &["AA"]),
    (">small3 k=3 l=6\nCccCcc\n", &["CCC", "CCC"]),
    (">small3 k=2 l=5\nGAggG\n", &["GA", "AG"]),
    (">small1 k=1 l=1\nA\n", &["A"]),
    (">small3 k=3 l=6\nAcgAcg\n", &["ACG", "ACG"]),
    (">small3 k=3 l=3\nACG\n", &["ACG"]),
    (">small3 k=3 l=0\nACGaaaAcg\n", &[]),
    (">small3 k=2 l=5\nGgggG\n", &["CC"]),
    (">small1 k=1 l=5\nAAAAA\n", &["A", "A", "A", "A", "A"]),
    (">small2 k=1 l=5\nTTTTT\n", &["A", "A", "A", "A", "A"]),
    (">small3 k=1 l=5\nCCCCC\n", &["C", "C", "C", "C", "C"]),
    (">small3 k=1 l=5\nGGGGG\n", &["C", "C", "C", "C", "C"]),
    (">small3 k=1 l=5\nGgggG\n", &["C", "C"]),
    (">small3 k=2 l=10\naTaaaaaaaaaa\n", &["TA"]),
    (">small3 k=2 l=10\nCaaCaaTaaaaaaaaaa\n", &["CA", "CA", "TA"]),
];

fn source(text: &str) -> Cursor<Vec<u8>> {
    Cursor::new(text.as_bytes().to_vec())
}

fn opts(chunk: usize, buffers: usize) -> StreamOptions {
    StreamOptions::default()
        .chunk_capacity(chunk)
        .buffer_count(buffers)
}

/// Drain with a one-slot destination, exercising requeue of partial buffers.
fn drain_one_by_one(text: &str, chunk: usize, buffers: usize) -> Vec<String> {
    let (header, mut reader) = open_sequence(source(text), opts(chunk, buffers)).unwrap();
    let mut out = Vec::new();
    let mut slot = [0u64; 1];
    loop {
        let n = reader.fill_buffer(&mut slot).unwrap();
        if n == 0 {
            break;
        }
        out.push(decode_kmer(slot[0], header.k));
    }
    out
}

/// Drain by borrowing whole buffers.
fn drain_borrowed(text: &str, chunk: usize, buffers: usize) -> Vec<u64> {
    let (_, mut reader) = open_sequence(source(text), opts(chunk, buffers)).unwrap();
    let mut out = Vec::new();
    while let Some(buf) = reader.borrow_buffer().unwrap() {
        out.extend_from_slice(buf.kmers());
        reader.recycle_buffer(buf).unwrap();
    }
    out
}

#[test]
fn fixtures_one_translation() {
    for (text, expected) in FIXTURES {
        let (header, _) = text.split_once('\n').unwrap();
        let header = parse_header_line(header).unwrap();
        let body = &text.as_bytes()[text.find('\n').unwrap() + 1..];
        let body = &body[..header.len as usize];

        let t = Translator::new(header.k).unwrap();
        let mut out = vec![0u64; 1024];
        let n = t.translate(body, &mut out).unwrap();
        let got: Vec<String> = out[..n].iter().map(|&v| decode_kmer(v, header.k)).collect();
        assert_eq!(got, *expected, "fixture {text:?}");
    }
}

#[test]
fn fixtures_stream_with_large_destination() {
    for (text, expected) in FIXTURES {
        let (header, mut reader) = open_sequence(source(text), opts(1, 1)).unwrap();
        let mut dest = vec![0u64; 1024];
        let n = reader.fill_buffer(&mut dest).unwrap();
        let got: Vec<String> = dest[..n].iter().map(|&v| decode_kmer(v, header.k)).collect();
        assert_eq!(got, *expected, "fixture {text:?}");
    }
}

#[test]
fn fixtures_stream_across_chunk_layouts() {
    for (text, expected) in FIXTURES {
        for (chunk, buffers) in [(4, 1), (3, 7), (1, 2), (64 * 1024, 16)] {
            let got = drain_one_by_one(text, chunk, buffers);
            assert_eq!(got, *expected, "fixture {text:?} chunk={chunk} buffers={buffers}");
        }
    }
}

#[test]
fn borrowing_matches_copy_out() {
    for (text, expected) in FIXTURES {
        let (header, _) = text.split_once('\n').unwrap();
        let k = parse_header_line(header).unwrap().k;
        let got: Vec<String> = drain_borrowed(text, 2, 3)
            .into_iter()
            .map(|v| decode_kmer(v, k))
            .collect();
        assert_eq!(got, *expected, "fixture {text:?}");
    }
}

/// Deterministic pseudo-random ACGT text (xorshift).
fn random_sequence(len: usize, seed: u64) -> Vec<u8> {
    let mut x = seed | 1;
    (0..len)
        .map(|_| {
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            b"ACGT"[(x & 3) as usize]
        })
        .collect()
}

#[test]
fn long_sequence_emits_every_window() {
    let seq = random_sequence(100_000, 42);
    let mut text = b">small1 k=31 l=100000\n".to_vec();
    text.extend_from_slice(&seq);
    text.push(b'\n');

    let (_, mut reader) = open_sequence(Cursor::new(text), opts(1000, 2)).unwrap();
    let mut dest = vec![0u64; 1024];
    let mut all = Vec::new();
    loop {
        let n = reader.fill_buffer(&mut dest).unwrap();
        if n == 0 {
            break;
        }
        all.extend_from_slice(&dest[..n]);
    }
    assert_eq!(all.len(), 100_000 - 30);
    for (i, &v) in all.iter().enumerate().step_by(997) {
        assert_eq!(v, canonical_of(&seq[i..i + 31]));
    }
    assert!(all.iter().all(|&v| v & 0b11 == 0b11));
    assert_eq!(reader.emitted(), all.len() as u64);
}

#[test]
fn dedicated_worker_pool_gives_same_output() {
    let seq = random_sequence(20_000, 7);
    let text = format!(">r k=21 l=20000\n{}", String::from_utf8(seq).unwrap());
    let global = drain_borrowed(&text, 512, 8);

    let (_, mut reader) =
        open_sequence(source(&text), opts(512, 8).threads(2)).unwrap();
    let pooled: Vec<u64> = reader.kmers().collect::<Result<_>>().unwrap();
    assert_eq!(pooled, global);
    assert_eq!(pooled.len(), 20_000 - 20);
}

#[test]
fn lifecycle_states() {
    let text = ">s k=3 l=8\nACGTACGT";
    let (_, mut reader) = open_sequence(source(text), opts(2, 2).eager_init(false)).unwrap();
    assert_eq!(reader.state(), ReaderState::Uninitialized);

    reader.init().unwrap();
    assert_eq!(reader.state(), ReaderState::Seeded);
    reader.init().unwrap();
    assert_eq!(reader.state(), ReaderState::Seeded);

    let buf = reader.borrow_buffer().unwrap().unwrap();
    assert_eq!(reader.state(), ReaderState::Streaming);
    reader.recycle_buffer(buf).unwrap();

    while let Some(buf) = reader.borrow_buffer().unwrap() {
        reader.recycle_buffer(buf).unwrap();
    }
    assert_eq!(reader.state(), ReaderState::Closed);
    assert!(reader.borrow_buffer().unwrap().is_none());
    assert_eq!(reader.emitted(), 6);
}

#[test]
fn end_of_input_is_seen_while_buffers_remain() {
    // k=1, 8 bytes, 2 per chunk, 4 buffers: the first cycle consumes the whole
    // input, so the next read comes back empty while three buffers are queued.
    let text = ">s k=1 l=8\nACGTACGT";
    let (_, mut reader) = open_sequence(source(text), opts(2, 4)).unwrap();

    let buf = reader.borrow_buffer().unwrap().unwrap();
    assert_eq!(reader.state(), ReaderState::Streaming);
    reader.recycle_buffer(buf).unwrap();

    let mut states = Vec::new();
    let mut queued = Vec::new();
    loop {
        std::thread::sleep(std::time::Duration::from_millis(50));
        let next = reader.borrow_buffer().unwrap();
        states.push(reader.state());
        queued.push(reader.pool_counts().used);
        match next {
            Some(buf) => reader.recycle_buffer(buf).unwrap(),
            None => break,
        }
    }
    assert_eq!(
        states,
        [
            ReaderState::Draining,
            ReaderState::Draining,
            ReaderState::Draining,
            ReaderState::Closed
        ]
    );
    assert_eq!(queued, [2, 1, 0, 0]);
    assert_eq!(reader.emitted(), 8);
}

#[test]
fn lazy_init_happens_on_first_borrow() {
    let text = ">s k=2 l=4\nACGT";
    let (_, mut reader) = open_sequence(source(text), opts(8, 1).eager_init(false)).unwrap();
    let got: Vec<String> = reader
        .kmers()
        .map(|v| decode_kmer(v.unwrap(), 2))
        .collect();
    assert_eq!(got, ["AC", "CG", "AC"]);
}

#[test]
fn pool_counts_always_sum_to_buffer_count() {
    let seq = random_sequence(200, 3);
    let text = format!(">s k=5 l=200\n{}", String::from_utf8(seq).unwrap());
    let (_, mut reader) = open_sequence(source(&text), opts(10, 4)).unwrap();
    assert_eq!(reader.pool_counts(), PoolCounts { free: 4, used: 0, borrowed: 0 });

    let a = reader.borrow_buffer().unwrap().unwrap();
    let counts = reader.pool_counts();
    assert_eq!(counts.total(), 4);
    assert_eq!(counts.borrowed, 1);
    assert_eq!(counts.used, 3);

    let b = reader.borrow_buffer().unwrap().unwrap();
    assert_eq!(reader.pool_counts().borrowed, 2);
    reader.recycle_buffer(a).unwrap();
    reader.recycle_buffer(b).unwrap();
    assert_eq!(reader.pool_counts().total(), 4);

    while let Some(buf) = reader.borrow_buffer().unwrap() {
        assert_eq!(reader.pool_counts().total(), 4);
        assert!(buf.cursor() <= buf.size() && buf.size() <= buf.capacity());
        reader.recycle_buffer(buf).unwrap();
    }
    assert_eq!(reader.pool_counts(), PoolCounts { free: 4, used: 0, borrowed: 0 });
}

#[test]
fn unrecycled_buffers_are_detected_not_stalled() {
    // k=1, 2 bytes per chunk, 2 buffers: each cycle fills both buffers.
    let text = ">s k=1 l=12\nACGTACGTACGT";
    let (_, mut reader) = open_sequence(source(text), opts(2, 2)).unwrap();

    let a = reader.borrow_buffer().unwrap().unwrap();
    let b = reader.borrow_buffer().unwrap().unwrap();
    let err = reader.borrow_buffer().unwrap_err();
    assert!(matches!(err, ReaderError::PoolExhausted { needed: 2, free: 0 }));

    // One buffer back lets the next chunk through; nothing is lost.
    let mut got = Vec::new();
    got.extend_from_slice(a.kmers());
    got.extend_from_slice(b.kmers());
    reader.recycle_buffer(a).unwrap();
    let c = reader.borrow_buffer().unwrap().unwrap();
    got.extend_from_slice(c.kmers());
    reader.recycle_buffer(b).unwrap();
    reader.recycle_buffer(c).unwrap();
    while let Some(buf) = reader.borrow_buffer().unwrap() {
        got.extend_from_slice(buf.kmers());
        reader.recycle_buffer(buf).unwrap();
    }
    let decoded: String = got.iter().map(|&v| decode_kmer(v, 1)).collect();
    assert_eq!(decoded, "ACCAACCAACCA");
}

#[test]
fn foreign_buffer_is_rejected() {
    let text = ">s k=1 l=2\nAC";
    let (_, mut r1) = open_sequence(source(text), opts(4, 1)).unwrap();
    let (_, mut r2) = open_sequence(source(text), opts(4, 1)).unwrap();
    let buf = r1.borrow_buffer().unwrap().unwrap();
    assert!(matches!(r2.recycle_buffer(buf), Err(ReaderError::ForeignBuffer)));
}

#[test]
fn close_faults_later_calls() {
    let text = ">s k=2 l=6\nACGTAC";
    let (_, mut reader) = open_sequence(source(text), opts(2, 2)).unwrap();
    let buf = reader.borrow_buffer().unwrap().unwrap();
    reader.close().unwrap();
    assert_eq!(reader.state(), ReaderState::Closed);
    assert!(matches!(reader.borrow_buffer(), Err(ReaderError::Closed)));
    assert!(matches!(reader.fill_buffer(&mut [0u64; 4]), Err(ReaderError::Closed)));
    reader.recycle_buffer(buf).unwrap();
    reader.close().unwrap();
}

#[test]
fn close_before_seeding() {
    let text = ">s k=2 l=6\nACGTAC";
    let (_, mut reader) = open_sequence(source(text), opts(2, 2).eager_init(false)).unwrap();
    reader.close().unwrap();
    assert!(matches!(reader.init(), Err(ReaderError::Closed)));
}

#[test]
fn configuration_faults() {
    for k in [0usize, 32] {
        let r = KmerReader::new(k, 10, source("ACGT"), StreamOptions::default());
        assert!(matches!(r, Err(ReaderError::Config(_))));
    }
    let r = KmerReader::new(3, 10, source("ACGT"), opts(0, 1));
    assert!(matches!(r, Err(ReaderError::Config(_))));
    let r = KmerReader::new(3, 10, source("ACGT"), opts(1, 0));
    assert!(matches!(r, Err(ReaderError::Config(_))));
}

#[test]
fn format_faults() {
    for text in ["", "ACGT\n", ">s k=3 junk\nACGT", ">s l=3\nACG"] {
        let r = open_sequence(source(text), StreamOptions::default());
        assert!(matches!(r, Err(ReaderError::Format(_))), "{text:?}");
    }
}

#[test]
fn header_without_length_uses_remaining_bytes() {
    let text = ">s k=2\nACGT";
    let (header, mut reader) = open_sequence(source(text), opts(3, 2)).unwrap();
    assert_eq!(header.len, 4);
    let got: Vec<u64> = reader.kmers().collect::<Result<_>>().unwrap();
    assert_eq!(got.len(), 3);
}

#[test]
fn declared_length_beyond_input_stops_at_eof() {
    let text = ">s k=2 l=1000\nACGT";
    let got = drain_one_by_one(text, 3, 2);
    assert_eq!(got, ["AC", "CG", "AC"]);
}

#[test]
fn memory_mapped_file_source() {
    let path = std::env::temp_dir().join(format!("kmer_stream_{}.fa", std::process::id()));
    std::fs::write(&path, ">f k=3 l=7\nACGTacg\n").unwrap();

    let (header, mut reader) = open_sequence(open_path(&path).unwrap(), opts(2, 2)).unwrap();
    let got: Vec<String> = reader
        .kmers()
        .map(|v| decode_kmer(v.unwrap(), header.k))
        .collect();
    reader.close().unwrap();
    std::fs::remove_file(&path).unwrap();

    // ACG, CGT, GTa, Tac; the window led by `a` is masked.
    assert_eq!(got, ["ACG", "ACG", "GTA", "GTA"]);
}
