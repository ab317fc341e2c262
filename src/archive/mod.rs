// src/archive/mod.rs

pub mod naming;

use std::{
    collections::HashSet,
    fs::File,
    io::{self, Read},
    path::Path,
};
use tracing::trace;
use zip::ZipArchive;

use crate::error::{ExtractError, Result};

/// Open `path` as a zip archive. The handle is closed when dropped.
pub fn open(path: impl AsRef<Path>) -> Result<ZipArchive<File>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ExtractError::ArchiveNotFound {
            path: path.to_path_buf(),
        },
        _ => ExtractError::Io(e),
    })?;
    ZipArchive::new(file).map_err(|source| ExtractError::ArchiveUnreadable {
        path: path.to_path_buf(),
        source,
    })
}

/// Every entry name, in central-directory order.
pub fn member_names<R: Read + io::Seek>(
    archive: &mut ZipArchive<R>,
    path: &Path,
) -> Result<Vec<String>> {
    let mut names = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let entry = archive
            .by_index_raw(i)
            .map_err(|source| ExtractError::ArchiveUnreadable {
                path: path.to_path_buf(),
                source,
            })?;
        names.push(entry.name().to_string());
    }
    Ok(names)
}

/// Names that start with `prefix`, end with `suffix` and are not in
/// `exclude`, keeping the listing order. Empty affixes match everything.
pub fn scan<'a>(
    names: &'a [String],
    prefix: &str,
    suffix: &str,
    exclude: &HashSet<String>,
) -> Vec<&'a str> {
    names
        .iter()
        .filter(|n| n.starts_with(prefix) && n.ends_with(suffix) && !exclude.contains(*n))
        .map(String::as_str)
        .collect()
}

/// Buffer one member fully into memory.
pub fn read_member<R: Read + io::Seek>(
    archive: &mut ZipArchive<R>,
    path: &Path,
    name: &str,
) -> Result<Vec<u8>> {
    let mut entry = archive
        .by_name(name)
        .map_err(|source| ExtractError::ArchiveUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
    let mut buf = Vec::with_capacity(entry.size() as usize);
    entry
        .read_to_end(&mut buf)
        .map_err(|source| ExtractError::MemberRead {
            path: path.to_path_buf(),
            member: name.to_string(),
            source,
        })?;
    trace!(member = name, bytes = buf.len(), "buffered member");
    Ok(buf)
}
