use anyhow::Context;
use byteorder::{LittleEndian as LE, WriteBytesExt};
use clap::Parser;
use kira_kmer_stream::*;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// Stream canonical packed k-mers from a single-sequence file.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Input file (`>id k=.. l=..` header followed by the sequence)
    #[arg(short, long)]
    input: PathBuf,

    /// Bytes per translation chunk
    #[arg(long, default_value_t = 64 * 1024)]
    chunk: usize,

    /// Buffer pool depth (chunks per cycle)
    #[arg(long, default_value_t = 16)]
    buffers: usize,

    /// Translation threads (default: rayon global pool)
    #[arg(long)]
    threads: Option<usize>,

    /// Print each k-mer decoded, one per line
    #[arg(long, default_value_t = false)]
    decode: bool,

    /// Write raw little-endian u64 values to this path
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let args = Args::parse();

    let opts = StreamOptions::default()
        .chunk_capacity(args.chunk)
        .buffer_count(args.buffers);
    let opts = match args.threads {
        Some(n) => opts.threads(n),
        None => opts,
    };

    let source = open_path(&args.input)
        .with_context(|| format!("opening {}", args.input.display()))?;
    let (header, mut reader) = open_sequence(source, opts).context("reading header")?;
    let k = header.k;

    let mut sink = match &args.output {
        Some(p) => Some(BufWriter::new(
            File::create(p).with_context(|| format!("creating {}", p.display()))?,
        )),
        None => None,
    };
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let mut count = 0u64;
    let mut sum = 0u64;
    while let Some(buf) = reader.borrow_buffer()? {
        for &v in buf.kmers() {
            count += 1;
            sum = sum.wrapping_add(v);
            if args.decode {
                writeln!(out, "{}", decode_kmer(v, k))?;
            }
            if let Some(w) = sink.as_mut() {
                w.write_u64::<LE>(v)?;
            }
        }
        reader.recycle_buffer(buf)?;
    }
    if let Some(mut w) = sink {
        w.flush()?;
    }
    reader.close()?;

    eprintln!(
        "{}: k={}, l={}, k-mers={}, sum={:#x}",
        header.id, k, header.len, count, sum
    );
    Ok(())
}
