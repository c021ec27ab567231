use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use colored::Colorize;
use flate2::read::GzDecoder;
use indoc::indoc;
use log::info;

use crate::NmdScanError;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Adapts a byte-chunk callback into a `Write` sink for the string-input
/// entry point.
pub struct ChunkWriter<'f, F: FnMut(&[u8]) -> io::Result<usize>> {
    f: &'f mut F,
}

impl<'f, F: FnMut(&[u8]) -> io::Result<usize>> ChunkWriter<'f, F> {
    pub fn new(f: &'f mut F) -> Self {
        Self { f }
    }
}

impl<F> Write for ChunkWriter<'_, F>
where
    F: FnMut(&[u8]) -> io::Result<usize>,
{
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (self.f)(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn timed<T, F: FnOnce() -> T>(key: &str, output: Option<&mut f64>, f: F) -> T {
    let start = std::time::Instant::now();
    let res = f();
    let elapsed = start.elapsed().as_secs_f64();
    if let Some(output) = output {
        *output = elapsed;
    }
    log::info!("{}: {:.2}s", key, elapsed);
    res
}

/// Reads the whole annotation into memory, decoding gzip transparently when
/// the file name ends in `.gz`. A truncated or corrupt gzip stream surfaces
/// as an `IoError` here, before any parsing starts.
pub fn read_input<P: AsRef<Path>>(path: P) -> Result<String, NmdScanError> {
    let path = path.as_ref();

    if path.extension().and_then(|e| e.to_str()) == Some("gz") {
        let file = File::open(path).map_err(|e| NmdScanError::IoError("opening input file", e))?;
        let mut contents = String::new();
        GzDecoder::new(file)
            .read_to_string(&mut contents)
            .map_err(|e| NmdScanError::IoError("decoding gzip input", e))?;
        Ok(contents)
    } else {
        std::fs::read_to_string(path).map_err(|e| NmdScanError::IoError("reading input file", e))
    }
}

/// Extension of the annotation itself, looking through a trailing `.gz`:
/// `foo.gtf.gz` -> `gtf`.
pub fn annotation_extension(path: &Path) -> Option<&str> {
    let name = path.file_name()?.to_str()?;
    let name = name.strip_suffix(".gz").unwrap_or(name);
    name.rsplit_once('.').map(|(_, ext)| ext)
}

#[cfg(not(windows))]
pub fn max_mem_usage_mb() -> f64 {
    let rusage = unsafe {
        let mut rusage = std::mem::MaybeUninit::uninit();
        if libc::getrusage(libc::RUSAGE_SELF, rusage.as_mut_ptr()) < 0 {
            info!("getrusage failed: {}", std::io::Error::last_os_error());
            return f64::NAN;
        }
        rusage.assume_init()
    };
    let maxrss = rusage.ru_maxrss as f64;
    if cfg!(target_os = "macos") {
        maxrss / 1024.0 / 1024.0
    } else {
        maxrss / 1024.0
    }
}

#[cfg(windows)]
pub fn max_mem_usage_mb() -> f64 {
    f64::NAN
}

pub fn msg() {
    println!(
        "{}\n{}\n{}",
        "\n##### NMDSCAN #####".bright_purple().bold(),
        indoc!(
            "Nonsense-mediated decay classification for GTF/GFF transcripts.
        Repo: github.com/alejandrogzi/nmdscan
        Feel free to contact the developer if any issue/bug is found.
        "
        ),
        format!("Version: {}", VERSION)
    );
}
