//! giftext - Dump the records of a GIF file as text
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use gifkit::{Block, ColorTable, Extension, ExtensionBlock, Reader};
use tracing::debug;

#[derive(Parser)]
#[command(name = "giftext")]
#[command(version)]
#[command(about = "Print the screen, image and extension records of a GIF file", long_about = None)]
struct Cli {
    /// Input GIF file (default: stdin)
    input: Option<PathBuf>,

    /// Print the color tables
    #[arg(short = 'c', long)]
    color_maps: bool,

    /// Print the compressed image data as hex
    #[arg(short = 'e', long, conflicts_with = "pixels")]
    encoded: bool,

    /// Print the pixel indices of every row as hex
    #[arg(short = 'p', long)]
    pixels: bool,

    /// Write the raw pixel indices to stdout and nothing else
    #[arg(short = 'r', long, conflicts_with_all = ["color_maps", "encoded", "pixels"])]
    raw: bool,

    /// Log decoding progress to stderr
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        })
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let stdout = io::stdout();
    let out = BufWriter::new(stdout.lock());
    let result = match cli.input {
        Some(ref path) => File::open(path)
            .map_err(gifkit::GifError::from)
            .and_then(|f| dump(&cli, &path.display().to_string(), f, out)),
        None => dump(&cli, "Stdin", io::stdin().lock(), out),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("giftext: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn dump<R: Read, W: Write>(cli: &Cli, name: &str, input: R, mut out: W) -> gifkit::Result<()> {
    let mut reader = Reader::new(input)?;
    debug!(version = ?reader.version(), "header read");

    if !cli.raw {
        let screen = reader.screen();
        writeln!(out, "\n{}:\n\n\tScreen Size - Width = {}, Height = {}.", name, screen.width, screen.height)?;
        writeln!(
            out,
            "\tColorResolution = {}, BitsPerPixel = {}, BackGround = {}.",
            screen.color_resolution,
            screen.global_color_table.as_ref().map_or(0, |t| t.bits_per_pixel()),
            screen.background
        )?;
        match screen.global_color_table {
            Some(ref table) => {
                writeln!(out, "\tHas Global Color Map.\n")?;
                if cli.color_maps {
                    writeln!(out, "\tGlobal Color Map:")?;
                    print_color_table(&mut out, table)?;
                }
            }
            None => writeln!(out, "\tNo Global Color Map.\n")?,
        }
    }

    let mut image_num = 1;
    loop {
        match reader.next_record()? {
            Block::Image => {
                let desc = reader.read_image_desc()?.clone();
                debug!(image = image_num, width = desc.width, height = desc.height, "image descriptor read");
                if !cli.raw {
                    writeln!(out, "\nImage #{}:\n", image_num)?;
                    writeln!(
                        out,
                        "\tImage Size - Left = {}, Top = {}, Width = {}, Height = {}.",
                        desc.left, desc.top, desc.width, desc.height
                    )?;
                    let interlace = if desc.interlaced { "Interlaced" } else { "Non Interlaced" };
                    match desc.color_table {
                        Some(ref table) => {
                            writeln!(out, "\tImage is {}, BitsPerPixel = {}.", interlace, table.bits_per_pixel())?;
                            writeln!(out, "\tImage Has Color Map.")?;
                            if cli.color_maps {
                                print_color_table(&mut out, table)?;
                            }
                        }
                        None => {
                            writeln!(out, "\tImage is {}.", interlace)?;
                            writeln!(out, "\tNo Image Color Map.")?;
                        }
                    }
                }
                image_num += 1;

                if cli.encoded {
                    let (code_size, blocks) = reader.read_code_blocks()?;
                    writeln!(out, "\nImage LZ compressed Codes (Code Size = {}):", code_size)?;
                    let data: Vec<u8> = blocks.concat();
                    print_hex(&mut out, &data)?;
                    let bits = desc
                        .color_table
                        .as_ref()
                        .or(reader.screen().global_color_table.as_ref())
                        .map_or(8, |t| t.bits_per_pixel() as usize);
                    let raw_bytes = desc.pixel_count() * bits / 8;
                    if raw_bytes > 0 {
                        writeln!(
                            out,
                            "\nCompression ratio: {}/{} ({}%).",
                            data.len(),
                            raw_bytes,
                            100 * data.len() / raw_bytes
                        )?;
                    }
                } else if cli.pixels || cli.raw {
                    let mut line = vec![0; desc.width as usize];
                    if cli.pixels {
                        writeln!(out)?;
                    }
                    for _ in 0..desc.height {
                        let row = reader.read_line(&mut line)?;
                        if cli.raw {
                            out.write_all(&line)?;
                        } else {
                            write!(out, "{:4}:", row)?;
                            for pixel in &line {
                                write!(out, " {:02x}", pixel)?;
                            }
                            writeln!(out)?;
                        }
                    }
                } else {
                    reader.skip_image()?;
                }
            }
            Block::Extension => {
                let ext = reader.read_extension()?;
                debug!(function = ext.function, blocks = ext.blocks.len(), "extension read");
                if !cli.raw {
                    print_extension(&mut out, &ext)?;
                }
            }
            Block::Trailer => break,
        }
    }

    if !cli.raw {
        writeln!(out, "\nGif file terminated normally.")?;
    }
    out.flush()?;
    Ok(())
}

fn print_color_table<W: Write>(out: &mut W, table: &ColorTable) -> io::Result<()> {
    for (i, row) in table.colors().chunks(4).enumerate() {
        for (j, c) in row.iter().enumerate() {
            write!(out, "{:3}: {:02x}h {:02x}h {:02x}h   ", i * 4 + j, c.red, c.green, c.blue)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn print_extension<W: Write>(out: &mut W, ext: &ExtensionBlock) -> io::Result<()> {
    let kind = match ext.kind() {
        Some(Extension::Comment) => "GIF89 comment",
        Some(Extension::Control) => "GIF89 graphics control",
        Some(Extension::Text) => "GIF89 plaintext",
        Some(Extension::Application) => "GIF89 application block",
        None => "Extension record of unknown type",
    };
    let printable = if ext.function.is_ascii_graphic() { ext.function as char } else { '.' };
    writeln!(out, "\n{} (Ext Code = {} [{}]):", kind, ext.function, printable)?;
    let mut offset = 0;
    for block in &ext.blocks {
        for chunk in block.chunks(16) {
            let hex: Vec<String> = chunk.iter().map(|b| format!("{:02x}", b)).collect();
            let ascii: String = chunk
                .iter()
                .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
                .collect();
            writeln!(out, "{:05x}: {:<47}  {}", offset, hex.join(" "), ascii)?;
            offset += chunk.len();
        }
    }
    Ok(())
}

fn print_hex<W: Write>(out: &mut W, data: &[u8]) -> io::Result<()> {
    for (i, chunk) in data.chunks(16).enumerate() {
        write!(out, "{:05x}h: ", i * 16)?;
        for b in chunk {
            write!(out, " {:02x}h", b)?;
        }
        writeln!(out)?;
    }
    Ok(())
}
