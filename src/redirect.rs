use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::process::Stdio;

use crate::error::ShellError;

/// Permission bits for files created by `>`.
const OUTPUT_MODE: u32 = 0o644;

/// Open `path` read-only for use as a child's stdin.
pub fn open_input(path: &Path) -> io::Result<File> {
    File::open(path)
}

/// Create or truncate `path` for use as a child's stdout.
pub fn open_output(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(OUTPUT_MODE)
        .open(path)
}

/// Resolve an optional redirect into the `Stdio` a child should get.
///
/// `None` inherits the shell's stream. A file that cannot be opened is an
/// [`ShellError::Exec`] for `program`: only that command fails.
pub fn stdio_for(
    program: &str,
    path: Option<&Path>,
    open: fn(&Path) -> io::Result<File>,
) -> Result<Stdio, ShellError> {
    let Some(path) = path else {
        return Ok(Stdio::inherit());
    };
    open(path).map(Stdio::from).map_err(|source| ShellError::Exec {
        program: format!("{program}: {}", path.display()),
        source,
    })
}
