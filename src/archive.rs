// GNU Affero General Public License v3.0 or later (see LICENSE or https://www.gnu.org/licenses/agpl.txt)
//! Unpacking of downloaded release bundles

use std::fs;
use std::io;
use std::path::Path;

use flate2::read::GzDecoder;
use tar::Archive;
use tracing::{debug, warn};

use crate::error::Result;
use crate::family::ArchiveKind;

/// Unpack `archive` into `destination`
///
/// # Errors
/// Returns an I/O or zip error when the archive is unreadable
pub fn unpack(archive: &Path, kind: ArchiveKind, destination: &Path) -> Result<()> {
    debug!(file = %archive.display(), destination = %destination.display(), ?kind, "decompressing");
    match kind {
        ArchiveKind::Zip => unpack_zip(archive, destination)?,
        ArchiveKind::TarGz => unpack_tar_gz(archive, destination)?,
    }
    debug!("decompression complete");
    Ok(())
}

fn unpack_tar_gz(archive: &Path, destination: &Path) -> Result<()> {
    let file = fs::File::open(archive)?;
    let mut tarball = Archive::new(GzDecoder::new(file));
    // `unpack` refuses entries escaping the destination
    tarball.unpack(destination)?;
    Ok(())
}

fn unpack_zip(archive: &Path, destination: &Path) -> Result<()> {
    let file = fs::File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file)?;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let Some(relative) = entry.enclosed_name().map(|p| p.to_path_buf()) else {
            warn!(name = entry.name(), "skipping zip entry outside the archive root");
            continue;
        };
        let out_path = destination.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = fs::File::create(&out_path)?;
        io::copy(&mut entry, &mut out)?;
    }

    Ok(())
}
