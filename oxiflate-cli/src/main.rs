//! OxiFlate CLI
//!
//! Streams files through the Pure Rust DEFLATE codec, with raw, zlib or gzip framing.

mod utils;

use clap::{Parser, Subcommand, ValueEnum};
use oxiflate::{DEFAULT_LEVEL, DEFAULT_MEM_LEVEL, Deflater, Inflater};
use oxiflate_core::{Error, Flush, Strategy, Wrap, ZParams};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use utils::{STDIO, compressed_path, create_progress_bar, decompressed_path, print_summary};

#[derive(Parser)]
#[command(name = "oxiflate")]
#[command(
    author,
    version,
    about = "Streaming DEFLATE, zlib and gzip compression in Pure Rust"
)]
#[command(long_about = "
OxiFlate compresses and decompresses raw DEFLATE, zlib and gzip streams.
Use `-` as the input or output path for stdin/stdout.

Examples:
  oxiflate compress file.txt
  oxiflate compress --wrap zlib --level 9 file.txt -o file.zz
  oxiflate decompress file.txt.gz
  cat file.txt | oxiflate compress - > file.txt.gz
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress a file
    #[command(alias = "c")]
    Compress {
        /// Input file (`-` for stdin)
        input: PathBuf,

        /// Output file (default: input with the framing suffix appended)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Compression level (0 = stored, 9 = best)
        #[arg(short, long, default_value_t = DEFAULT_LEVEL,
              value_parser = clap::value_parser!(u8).range(0..=9))]
        level: u8,

        /// Base-two logarithm of the window size
        #[arg(short, long, default_value_t = 15,
              value_parser = clap::value_parser!(u8).range(8..=15))]
        window_bits: u8,

        /// Memory level for the match finder
        #[arg(short, long, default_value_t = DEFAULT_MEM_LEVEL,
              value_parser = clap::value_parser!(u8).range(1..=9))]
        mem_level: u8,

        /// Match strategy
        #[arg(short, long, value_enum, default_value = "normal")]
        strategy: StrategyArg,

        /// Stream framing
        #[arg(long, value_enum, default_value = "gzip")]
        wrap: WrapArg,

        /// Size of the input and output buffers in bytes
        #[arg(short, long, default_value_t = 16 * 1024,
              value_parser = clap::value_parser!(u32).range(1..))]
        buffer_size: u32,

        /// Print a size summary
        #[arg(short, long)]
        verbose: bool,

        /// Show progress bar
        #[arg(short = 'P', long)]
        progress: bool,
    },

    /// Decompress a file
    #[command(alias = "d")]
    Decompress {
        /// Input file (`-` for stdin)
        input: PathBuf,

        /// Output file (default: input with the framing suffix removed)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Base-two logarithm of the largest window to accept
        #[arg(short, long, default_value_t = 15,
              value_parser = clap::value_parser!(u8).range(8..=15))]
        window_bits: u8,

        /// Stream framing
        #[arg(long, value_enum, default_value = "gzip")]
        wrap: WrapArg,

        /// Size of the input and output buffers in bytes
        #[arg(short, long, default_value_t = 16 * 1024,
              value_parser = clap::value_parser!(u32).range(1..))]
        buffer_size: u32,

        /// Print a size summary
        #[arg(short, long)]
        verbose: bool,

        /// Show progress bar
        #[arg(short = 'P', long)]
        progress: bool,
    },
}

/// Match strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
enum StrategyArg {
    /// Hash-chained matching (default)
    #[default]
    Normal,
    /// Prefer literals for small scattered values
    Filtered,
    /// Literals only
    Huffman,
    /// Distance-one runs only
    Rle,
    /// Fixed Huffman codes only
    Fixed,
}

impl From<StrategyArg> for Strategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Normal => Strategy::Normal,
            StrategyArg::Filtered => Strategy::Filtered,
            StrategyArg::Huffman => Strategy::Huffman,
            StrategyArg::Rle => Strategy::Rle,
            StrategyArg::Fixed => Strategy::Fixed,
        }
    }
}

/// Stream framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
enum WrapArg {
    /// Raw DEFLATE, no header or trailer
    Raw,
    /// zlib header and Adler-32 trailer
    Zlib,
    /// gzip header and CRC-32 trailer (default)
    #[default]
    Gzip,
}

impl From<WrapArg> for Wrap {
    fn from(arg: WrapArg) -> Self {
        match arg {
            WrapArg::Raw => Wrap::None,
            WrapArg::Zlib => Wrap::Zlib,
            WrapArg::Gzip => Wrap::Gzip,
        }
    }
}

/// Compression settings gathered from the command line.
struct CompressOptions {
    level: u8,
    window_bits: u8,
    mem_level: u8,
    strategy: Strategy,
    wrap: Wrap,
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compress {
            input,
            output,
            level,
            window_bits,
            mem_level,
            strategy,
            wrap,
            buffer_size,
            verbose,
            progress,
        } => {
            let options = CompressOptions {
                level,
                window_bits,
                mem_level,
                strategy: strategy.into(),
                wrap: wrap.into(),
            };
            cmd_compress(
                &input,
                output,
                &options,
                buffer_size as usize,
                verbose,
                progress,
            )
        }
        Commands::Decompress {
            input,
            output,
            window_bits,
            wrap,
            buffer_size,
            verbose,
            progress,
        } => cmd_decompress(
            &input,
            output,
            window_bits,
            wrap.into(),
            buffer_size as usize,
            verbose,
            progress,
        ),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_compress(
    input: &Path,
    output: Option<PathBuf>,
    options: &CompressOptions,
    buffer_size: usize,
    verbose: bool,
    progress: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let output = output.unwrap_or_else(|| compressed_path(input, options.wrap));
    let (mut reader, len) = open_input(input)?;
    let mut writer = open_output(&output)?;

    let mut deflater = Deflater::new();
    deflater.reset(
        options.level,
        options.window_bits,
        options.mem_level,
        options.strategy,
        options.wrap,
    )?;

    let pb = create_progress_bar(len, progress);
    let mut inbuf = vec![0u8; buffer_size];
    let mut outbuf = vec![0u8; buffer_size];

    loop {
        let n = reader.read(&mut inbuf)?;
        let flush = if n == 0 { Flush::Finish } else { Flush::None };
        let mut pos = 0;

        // Keep calling while the output fills up, or until the stream ends on finish
        loop {
            let mut zp = ZParams::new(&inbuf[pos..n], &mut outbuf);
            let result = deflater.write(&mut zp, flush);
            pos += zp.total_in as usize;
            let produced = zp.total_out as usize;
            let out_full = zp.avail_out() == 0;
            writer.write_all(&outbuf[..produced])?;

            match result {
                Err(Error::EndOfStream) => {
                    writer.flush()?;
                    pb.finish_and_clear();
                    if verbose {
                        let name = input.display().to_string();
                        print_summary(&name, deflater.total_in(), deflater.total_out());
                    }
                    return Ok(());
                }
                Ok(()) | Err(Error::NeedBuffers) => {}
                Err(e) => return Err(e.into()),
            }
            if flush != Flush::Finish && pos == n && !out_full {
                break;
            }
        }
        pb.inc(n as u64);
    }
}

fn cmd_decompress(
    input: &Path,
    output: Option<PathBuf>,
    window_bits: u8,
    wrap: Wrap,
    buffer_size: usize,
    verbose: bool,
    progress: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let output = match output {
        Some(path) => path,
        None => decompressed_path(input, wrap).ok_or_else(|| {
            format!(
                "{}: unknown suffix, expected .{} (use -o to name the output)",
                input.display(),
                utils::suffix(wrap)
            )
        })?,
    };
    let (mut reader, len) = open_input(input)?;
    let mut writer = open_output(&output)?;

    let mut inflater = Inflater::new();
    inflater.reset(window_bits, wrap)?;

    let pb = create_progress_bar(len, progress);
    let mut inbuf = vec![0u8; buffer_size];
    let mut outbuf = vec![0u8; buffer_size];

    loop {
        let n = reader.read(&mut inbuf)?;
        if n == 0 {
            return Err("unexpected end of compressed data".into());
        }
        let mut pos = 0;

        loop {
            let mut zp = ZParams::new(&inbuf[pos..n], &mut outbuf);
            let result = inflater.write(&mut zp, Flush::None);
            pos += zp.total_in as usize;
            let produced = zp.total_out as usize;
            let out_full = zp.avail_out() == 0;
            writer.write_all(&outbuf[..produced])?;

            match result {
                Err(Error::EndOfStream) => {
                    writer.flush()?;
                    pb.finish_and_clear();
                    if verbose {
                        let name = input.display().to_string();
                        print_summary(&name, inflater.total_in(), inflater.total_out());
                    }
                    return Ok(());
                }
                Err(Error::NeedDict) => {
                    return Err("stream requires a preset dictionary".into());
                }
                Ok(()) | Err(Error::NeedBuffers) => {}
                Err(e) => return Err(e.into()),
            }
            if pos == n && !out_full {
                break;
            }
        }
        pb.inc(n as u64);
    }
}

/// Open the input for reading, with its length when it is a regular file.
fn open_input(path: &Path) -> io::Result<(Box<dyn Read>, Option<u64>)> {
    if path == Path::new(STDIO) {
        return Ok((Box::new(io::stdin().lock()), None));
    }
    let file = File::open(path)?;
    let len = file.metadata().ok().map(|m| m.len());
    Ok((Box::new(BufReader::new(file)), len))
}

fn open_output(path: &Path) -> io::Result<Box<dyn Write>> {
    if path == Path::new(STDIO) {
        return Ok(Box::new(BufWriter::new(io::stdout().lock())));
    }
    Ok(Box::new(BufWriter::new(File::create(path)?)))
}
