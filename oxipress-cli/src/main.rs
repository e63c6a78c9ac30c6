//! OxiPress CLI - The Oxidized Press
//!
//! A Pure Rust exhaustive DEFLATE compressor producing gzip, zlib, and raw
//! DEFLATE streams.

use clap::{Parser, Subcommand, ValueEnum};
use oxipress_deflate::{Format, Options};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "oxipress")]
#[command(
    author,
    version,
    about = "The Oxidized Press - exhaustive DEFLATE compression"
)]
#[command(long_about = "
OxiPress is a Pure Rust DEFLATE compressor that trades CPU time for output
size. It emits standard gzip, zlib, or raw DEFLATE streams that any inflater
can decode, typically a few percent smaller than zlib at its best level.

Examples:
  oxipress compress file.txt
  oxipress compress --format zlib file.txt
  oxipress compress --iterations 50 file.txt
  oxipress compress --stdout file.txt > file.txt.gz
  oxipress decompress file.txt.gz
  oxipress test file.txt.gz
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress files
    #[command(alias = "c")]
    Compress {
        /// Files to compress
        files: Vec<PathBuf>,

        /// Output container format
        #[arg(short, long, value_enum, default_value = "gzip")]
        format: OutputFormat,

        /// Optimization passes per block (more is slower but smaller)
        #[arg(short, long, default_value_t = 15)]
        iterations: u32,

        /// Compress each block range with a single pair of Huffman trees
        /// instead of searching for split points
        #[arg(long)]
        no_split: bool,

        /// Choose block split points on the compressed representation
        /// instead of the raw input
        #[arg(long)]
        split_last: bool,

        /// Maximum number of blocks to split into (0 for unlimited)
        #[arg(long, default_value_t = 15)]
        max_blocks: u32,

        /// Output file (only valid with a single input file)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the result to standard output instead of a file
        #[arg(short = 'c', long)]
        stdout: bool,

        /// Show per-file and per-block progress
        #[arg(short, long)]
        verbose: bool,
    },

    /// Decompress files
    #[command(alias = "d")]
    Decompress {
        /// Files to decompress
        files: Vec<PathBuf>,

        /// Container format (detected from the file contents if omitted)
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Output file (only valid with a single input file)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the result to standard output instead of a file
        #[arg(short = 'c', long)]
        stdout: bool,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Test compressed file integrity
    #[command(alias = "t")]
    Test {
        /// Files to test
        files: Vec<PathBuf>,

        /// Container format (detected from the file contents if omitted)
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

/// Output container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Gzip member with CRC-32 trailer (.gz)
    Gzip,
    /// Zlib stream with Adler-32 trailer (.zlib)
    Zlib,
    /// Raw DEFLATE stream with no container (.deflate)
    Deflate,
}

impl OutputFormat {
    fn as_format(self) -> Format {
        match self {
            OutputFormat::Gzip => Format::Gzip,
            OutputFormat::Zlib => Format::Zlib,
            OutputFormat::Deflate => Format::Deflate,
        }
    }

    fn extension(self) -> &'static str {
        match self {
            OutputFormat::Gzip => "gz",
            OutputFormat::Zlib => "zlib",
            OutputFormat::Deflate => "deflate",
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compress {
            files,
            format,
            iterations,
            no_split,
            split_last,
            max_blocks,
            output,
            stdout,
            verbose,
        } => {
            let options = Options {
                iteration_count: iterations,
                block_splitting: !no_split,
                block_splitting_last: split_last,
                max_blocks,
                verbose,
                ..Options::DEFAULT
            };
            cmd_compress(&files, format, &options, output.as_deref(), stdout)
        }
        Commands::Decompress {
            files,
            format,
            output,
            stdout,
            verbose,
        } => cmd_decompress(&files, format, output.as_deref(), stdout, verbose),
        Commands::Test {
            files,
            format,
            verbose,
        } => cmd_test(&files, format, verbose),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_compress(
    files: &[PathBuf],
    format: OutputFormat,
    options: &Options,
    output: Option<&Path>,
    to_stdout: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if files.is_empty() {
        return Err("No files specified".into());
    }
    if output.is_some() && files.len() != 1 {
        return Err("--output requires exactly one input file".into());
    }

    for path in files {
        let data = std::fs::read(path)?;
        let compressed = oxipress_deflate::compress(options, format.as_format(), &data)?;

        if to_stdout {
            std::io::stdout().write_all(&compressed)?;
        } else {
            let out_path = match output {
                Some(p) => p.to_path_buf(),
                None => append_extension(path, format.extension()),
            };
            std::fs::write(&out_path, &compressed)?;
            if options.verbose {
                eprintln!(
                    "{}: {} -> {} bytes ({:.2}% of original)",
                    out_path.display(),
                    data.len(),
                    compressed.len(),
                    percent_of(compressed.len(), data.len()),
                );
            }
        }
    }

    Ok(())
}

fn cmd_decompress(
    files: &[PathBuf],
    format: Option<OutputFormat>,
    output: Option<&Path>,
    to_stdout: bool,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if files.is_empty() {
        return Err("No files specified".into());
    }
    if output.is_some() && files.len() != 1 {
        return Err("--output requires exactly one input file".into());
    }

    for path in files {
        let data = std::fs::read(path)?;
        let format = format.unwrap_or_else(|| detect_format(&data));
        let restored = oxipress_deflate::decompress(format.as_format(), &data)?;

        if to_stdout {
            std::io::stdout().write_all(&restored)?;
        } else {
            let out_path = match output {
                Some(p) => p.to_path_buf(),
                None => strip_extension(path),
            };
            std::fs::write(&out_path, &restored)?;
        }
        if verbose {
            eprintln!(
                "{}: {} -> {} bytes ({})",
                path.display(),
                data.len(),
                restored.len(),
                format.extension(),
            );
        }
    }

    Ok(())
}

fn cmd_test(
    files: &[PathBuf],
    format: Option<OutputFormat>,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if files.is_empty() {
        return Err("No files specified".into());
    }

    let mut ok_count = 0usize;
    let mut error_count = 0usize;

    for path in files {
        let data = std::fs::read(path)?;
        let format = format.unwrap_or_else(|| detect_format(&data));

        match oxipress_deflate::decompress(format.as_format(), &data) {
            Ok(restored) => {
                ok_count += 1;
                if verbose {
                    println!(
                        "  OK: {} ({} -> {} bytes)",
                        path.display(),
                        data.len(),
                        restored.len()
                    );
                }
            }
            Err(e) => {
                error_count += 1;
                println!("  FAILED: {} - {}", path.display(), e);
            }
        }
    }

    println!();
    println!("Test results:");
    println!("  Total files: {}", ok_count + error_count);
    println!("  OK: {}", ok_count);
    println!("  Failed: {}", error_count);

    if error_count > 0 {
        std::process::exit(2);
    }

    Ok(())
}

/// Guess the container format from the first bytes of a compressed file.
///
/// Gzip and zlib have recognizable headers; anything else is treated as a
/// raw DEFLATE stream.
fn detect_format(data: &[u8]) -> OutputFormat {
    if data.len() >= 2 && data[0] == 0x1F && data[1] == 0x8B {
        OutputFormat::Gzip
    } else if data.len() >= 2
        && data[0] & 0x0F == 8
        && (u16::from(data[0]) * 256 + u16::from(data[1])) % 31 == 0
    {
        OutputFormat::Zlib
    } else {
        OutputFormat::Deflate
    }
}

/// `file.txt` with extension `gz` becomes `file.txt.gz`.
fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

/// Strip a compression extension, so `file.txt.gz` becomes `file.txt`. A
/// name without a recognized extension gets `.out` appended instead of
/// clobbering the input.
fn strip_extension(path: &Path) -> PathBuf {
    match path.extension().and_then(|e| e.to_str()) {
        Some("gz" | "gzip" | "zlib" | "zz" | "deflate") => path.with_extension(""),
        _ => append_extension(path, "out"),
    }
}

fn percent_of(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        100.0
    } else {
        100.0 * part as f64 / whole as f64
    }
}
