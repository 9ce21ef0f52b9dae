//! Tar archive extraction and packaging.

use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use cask_common::error::{CaskError, Result};

/// Extracts a root filesystem tarball to the target directory.
///
/// The target is created if missing. Gzip compression is detected from the
/// file content rather than the extension, so a compressed tarball named
/// `.tar` still extracts.
///
/// # Errors
///
/// Returns an error if the archive cannot be opened or unpacked.
pub fn extract_archive(archive_path: &Path, target: &Path) -> Result<()> {
    tracing::info!(
        archive = %archive_path.display(),
        target = %target.display(),
        "extracting image archive"
    );

    std::fs::create_dir_all(target).map_err(|e| CaskError::Io {
        path: target.to_path_buf(),
        source: e,
    })?;

    let mut file = std::fs::File::open(archive_path).map_err(|e| CaskError::Io {
        path: archive_path.to_path_buf(),
        source: e,
    })?;

    if is_gzip_stream(&mut file).map_err(|e| CaskError::Io {
        path: archive_path.to_path_buf(),
        source: e,
    })? {
        let decoder = flate2::read::GzDecoder::new(file);
        let mut archive = tar::Archive::new(decoder);
        archive.unpack(target).map_err(|e| CaskError::Io {
            path: target.to_path_buf(),
            source: e,
        })?;
    } else {
        let mut archive = tar::Archive::new(file);
        archive.unpack(target).map_err(|e| CaskError::Io {
            path: target.to_path_buf(),
            source: e,
        })?;
    }

    Ok(())
}

/// Packs a directory into a plain tarball, used by `cask commit`.
///
/// Entries are rooted at `./` so the result extracts the same way image
/// tarballs do. Returns the size of the written archive in bytes.
///
/// # Errors
///
/// Returns an error if the source cannot be read or the tarball written.
pub fn pack_archive(source: &Path, archive_path: &Path) -> Result<u64> {
    tracing::info!(
        source = %source.display(),
        archive = %archive_path.display(),
        "packing image archive"
    );

    if let Some(parent) = archive_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| CaskError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    let file = std::fs::File::create(archive_path).map_err(|e| CaskError::Io {
        path: archive_path.to_path_buf(),
        source: e,
    })?;
    let mut builder = tar::Builder::new(file);
    builder.follow_symlinks(false);
    builder
        .append_dir_all(".", source)
        .and_then(|()| builder.finish())
        .map_err(|e| CaskError::Io {
            path: source.to_path_buf(),
            source: e,
        })?;

    let size = std::fs::metadata(archive_path)
        .map_err(|e| CaskError::Io {
            path: archive_path.to_path_buf(),
            source: e,
        })?
        .len();
    tracing::info!(size, "image archive packed");
    Ok(size)
}

/// Checks the two-byte gzip magic at the start of the stream, then rewinds.
fn is_gzip_stream(file: &mut std::fs::File) -> std::io::Result<bool> {
    let mut magic = [0u8; 2];
    let n = file.read(&mut magic)?;
    let _ = file.seek(SeekFrom::Start(0))?;
    Ok(n == 2 && magic == [0x1f, 0x8b])
}
