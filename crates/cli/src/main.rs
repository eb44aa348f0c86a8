//! CLI tool for appending slides to PowerPoint files.

use anyhow::{bail, Context, Result};
use clap::Parser;
use pptadd_core::{encode_slides, CodecRegistry, Slide, SlideDecoder};
use pptadd_pptx::Container;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, Write};
use std::path::{Path, PathBuf};

/// Append slides described in the slide text format to a PowerPoint file.
#[derive(Parser, Debug)]
#[command(name = "pptadd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// PowerPoint file to extend (.pptx)
    file: PathBuf,

    /// Slide text input (default: stdin)
    input: Option<PathBuf>,

    /// Create FILE from the built-in template instead of opening it
    #[arg(short, long)]
    new: bool,

    /// Decode the input and print it re-encoded instead of writing FILE
    #[arg(short, long)]
    check: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    if !has_pptx_extension(&args.file) {
        bail!("{}: expected a .pptx file", args.file.display());
    }

    let registry = CodecRegistry::with_builtin_codecs();
    let slides = read_slides(args.input.as_deref(), &registry)?;
    if slides.is_empty() {
        bail!("no slides added");
    }

    if args.check {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        encode_slides(&slides, &mut out).context("Failed to encode slides")?;
        out.flush()?;
        return Ok(());
    }

    if args.new {
        let container = Container::create(&args.file)
            .with_context(|| format!("Failed to create {}", args.file.display()))?;
        append(container, &slides)
    } else {
        let container = Container::open(&args.file)
            .with_context(|| format!("Failed to open {}", args.file.display()))?;
        append(container, &slides)
    }
}

fn has_pptx_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case("pptx"))
}

/// Decode slides from a file, or from stdin when no path (or `-`) is given.
fn read_slides(input: Option<&Path>, registry: &CodecRegistry) -> Result<Vec<Slide>> {
    let decoder = SlideDecoder::new(registry);
    match input {
        Some(path) if path != Path::new("-") => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            decoder
                .decode(BufReader::new(file))
                .with_context(|| format!("Failed to decode {}", path.display()))
        }
        _ => {
            let stdin = io::stdin();
            decoder
                .decode(stdin.lock())
                .context("Failed to decode slides from stdin")
        }
    }
}

/// Add every slide and commit. The first failure discards all changes.
fn append<R: Read + Seek>(mut container: Container<R>, slides: &[Slide]) -> Result<()> {
    for slide in slides {
        match container.add(slide) {
            Ok(added) => log::debug!("Added {} as {}", added.part_name, added.relationship_id),
            Err(e) => {
                let path = container.path().display().to_string();
                container.abort();
                return Err(e).with_context(|| format!("Failed to add slides to {}", path));
            }
        }
    }

    let path = container.path().to_path_buf();
    let count = container.slide_count();
    container
        .close()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    log::info!("{} now has {} slides", path.display(), count);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from(["pptadd", "--new", "deck.pptx", "slides.txt"]).unwrap();
        assert!(args.new);
        assert!(!args.check);
        assert_eq!(args.file, PathBuf::from("deck.pptx"));
        assert_eq!(args.input, Some(PathBuf::from("slides.txt")));

        assert!(Args::try_parse_from(["pptadd"]).is_err());
    }

    #[test]
    fn test_pptx_extension() {
        assert!(has_pptx_extension(Path::new("a/b.pptx")));
        assert!(has_pptx_extension(Path::new("B.PPTX")));
        assert!(!has_pptx_extension(Path::new("b.ppt")));
        assert!(!has_pptx_extension(Path::new("pptx")));
    }

    #[test]
    fn test_read_slides_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slides.txt");
        std::fs::write(&path, "Slide\n Master 2\nSlide\n").unwrap();

        let registry = CodecRegistry::with_builtin_codecs();
        let slides = read_slides(Some(path.as_path()), &registry).unwrap();
        assert_eq!(slides.len(), 2);
        assert_eq!(slides[0].master, 2);

        let missing = dir.path().join("missing.txt");
        assert!(read_slides(Some(missing.as_path()), &registry).is_err());
    }

    #[test]
    fn test_append_to_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deck.pptx");

        append(Container::create(&path).unwrap(), &[Slide::new(), Slide::new()]).unwrap();
        assert_eq!(Container::open(&path).unwrap().slide_count(), 2);
    }
}
