//! Zip archive operations
//!
//! Directory trees are stored under their own directory name, so zipping
//! `/tmp/x/SwiftSupport` yields entries `SwiftSupport/...`. Entries are
//! written in sorted order; symlinks are stored as links and unix modes are
//! preserved.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, Write};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Errors for archive operations
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

fn io_error(path: &Path) -> impl Fn(io::Error) -> ArchiveError + '_ {
    move |source| ArchiveError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Create `output` holding `dir` recursively. An existing file is replaced.
///
/// Returns the number of entries written.
pub fn zip_dir(dir: &Path, output: &Path) -> Result<usize, ArchiveError> {
    ensure_dir(dir)?;
    let file = File::create(output).map_err(io_error(output))?;
    let mut writer = ZipWriter::new(file);
    let written = write_tree(&mut writer, dir, &HashSet::new())?;
    writer.finish()?;
    log::debug!("wrote {} entries to {}", written, output.display());
    Ok(written)
}

/// Append `dir` recursively to the existing archive at `archive`.
///
/// Entries already present in the archive are left as they are. Returns the
/// number of entries added.
pub fn append_dir(archive: &Path, dir: &Path) -> Result<usize, ArchiveError> {
    append_dirs(archive, &[dir])
}

/// Append several directories through a single writer. Every directory is
/// checked before the archive is opened.
pub fn append_dirs<P: AsRef<Path>>(archive: &Path, dirs: &[P]) -> Result<usize, ArchiveError> {
    for dir in dirs {
        ensure_dir(dir.as_ref())?;
    }
    let existing: HashSet<String> = entry_names(archive)?.into_iter().collect();

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(archive)
        .map_err(io_error(archive))?;
    let mut writer = ZipWriter::new_append(file)?;
    let mut written = 0;
    for dir in dirs {
        written += write_tree(&mut writer, dir.as_ref(), &existing)?;
    }
    writer.finish()?;
    log::debug!("appended {} entries to {}", written, archive.display());
    Ok(written)
}

/// Names of all entries in the archive, in archive order.
pub fn entry_names(archive: &Path) -> Result<Vec<String>, ArchiveError> {
    let file = File::open(archive).map_err(io_error(archive))?;
    let zip = ZipArchive::new(file)?;
    Ok(zip.file_names().map(str::to_string).collect::<Vec<_>>())
}

/// Copy the entry `name` out of `archive` into `dest`.
pub fn extract_entry(archive: &Path, name: &str, dest: &Path) -> Result<u64, ArchiveError> {
    let file = File::open(archive).map_err(io_error(archive))?;
    let mut zip = ZipArchive::new(file)?;
    let mut entry = zip.by_name(name)?;
    let mut out = File::create(dest).map_err(io_error(dest))?;
    io::copy(&mut entry, &mut out).map_err(io_error(dest))
}

fn ensure_dir(dir: &Path) -> Result<(), ArchiveError> {
    if dir.is_dir() {
        Ok(())
    } else {
        Err(ArchiveError::NotADirectory(dir.to_path_buf()))
    }
}

fn write_tree<W: Write + Read + Seek>(
    writer: &mut ZipWriter<W>,
    dir: &Path,
    skip: &HashSet<String>,
) -> Result<usize, ArchiveError> {
    let base = dir.parent().unwrap_or(dir);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut written = 0;

    for entry in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        let Ok(relative) = path.strip_prefix(base) else {
            continue;
        };
        let mut name = relative.to_string_lossy().replace('\\', "/");

        let file_type = entry.file_type();
        if file_type.is_dir() {
            name.push('/');
        }
        if skip.contains(&name) {
            log::debug!("{} already in archive, skipping", name);
            continue;
        }

        let options = options.unix_permissions(unix_mode(path));
        if file_type.is_symlink() {
            let target = fs::read_link(path).map_err(io_error(path))?;
            writer.add_symlink(name, target.to_string_lossy(), options)?;
        } else if file_type.is_dir() {
            writer.add_directory(name, options)?;
        } else {
            writer.start_file(name, options)?;
            let mut source = File::open(path).map_err(io_error(path))?;
            io::copy(&mut source, writer).map_err(io_error(path))?;
        }
        written += 1;
    }

    Ok(written)
}

#[cfg(unix)]
fn unix_mode(path: &Path) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    fs::symlink_metadata(path)
        .map(|m| m.permissions().mode() & 0o7777)
        .unwrap_or(0o644)
}

#[cfg(not(unix))]
fn unix_mode(path: &Path) -> u32 {
    if path.is_dir() {
        0o755
    } else {
        0o644
    }
}
