//! Archive download, format sniffing and extraction
//!
//! The format is read from the leading bytes, never from the URL, since
//! source-archive URLs often carry no (or a wrong) extension.

use std::fs::{self, File};
use std::io::{self, BufReader, Read, Seek};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use flate2::read::GzDecoder;
use tokio::io::AsyncWriteExt;

use crate::error::{Error, Result};

const ZIP_MAGIC: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];
const ZIP_EMPTY_MAGIC: [u8; 4] = [0x50, 0x4b, 0x05, 0x06];
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const TAR_MAGIC_OFFSET: usize = 257;
const TAR_MAGIC: &[u8; 5] = b"ustar";

/// Entry count above which an archive is rejected.
const MAX_ENTRY_COUNT: usize = 50_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    TarGz,
    Tar,
}

impl ArchiveKind {
    /// Identify an archive from its first bytes (at least 262 for tar).
    pub fn detect(header: &[u8]) -> Option<Self> {
        if header.starts_with(&ZIP_MAGIC) || header.starts_with(&ZIP_EMPTY_MAGIC) {
            Some(ArchiveKind::Zip)
        } else if header.starts_with(&GZIP_MAGIC) {
            Some(ArchiveKind::TarGz)
        } else if header
            .get(TAR_MAGIC_OFFSET..TAR_MAGIC_OFFSET + TAR_MAGIC.len())
            .is_some_and(|m| m == TAR_MAGIC)
        {
            Some(ArchiveKind::Tar)
        } else {
            None
        }
    }

    pub fn detect_file(path: &Path) -> Result<Option<Self>> {
        let mut header = Vec::with_capacity(512);
        File::open(path)
            .and_then(|f| f.take(512).read_to_end(&mut header))
            .map_err(|e| comfy_fs::Error::io(path, e))?;
        Ok(Self::detect(&header))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ArchiveKind::Zip => "zip",
            ArchiveKind::TarGz => "tar.gz",
            ArchiveKind::Tar => "tar",
        }
    }
}

/// Download `url` to `dest` chunk by chunk, enforcing `limit` bytes
/// whether or not the server sends a length. A partial file is removed.
pub async fn download(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    timeout: Duration,
    limit: u64,
) -> Result<u64> {
    tracing::info!(url, "downloading archive");
    let mut response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|source| Error::Download {
            url: url.to_string(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::DownloadStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    if response.content_length().is_some_and(|len| len > limit) {
        return Err(Error::DownloadTooLarge {
            url: url.to_string(),
            limit,
        });
    }

    let mut file = tokio::fs::File::create(dest)
        .await
        .map_err(|e| comfy_fs::Error::io(dest, e))?;
    let mut size = 0u64;
    loop {
        let chunk = match response.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(source) => {
                drop(file);
                let _ = tokio::fs::remove_file(dest).await;
                return Err(Error::Download {
                    url: url.to_string(),
                    source,
                });
            }
        };
        size += chunk.len() as u64;
        if size > limit {
            drop(file);
            let _ = tokio::fs::remove_file(dest).await;
            return Err(Error::DownloadTooLarge {
                url: url.to_string(),
                limit,
            });
        }
        file.write_all(&chunk)
            .await
            .map_err(|e| comfy_fs::Error::io(dest, e))?;
    }
    file.flush().await.map_err(|e| comfy_fs::Error::io(dest, e))?;
    tracing::debug!(url, size, "download complete");
    Ok(size)
}

/// Extract `archive` of `kind` into `dest`, rejecting entries that would
/// land outside it.
pub fn extract(archive: &Path, kind: ArchiveKind, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest).map_err(|e| comfy_fs::Error::io(dest, e))?;
    let file = File::open(archive).map_err(|e| comfy_fs::Error::io(archive, e))?;
    let reader = BufReader::new(file);
    match kind {
        ArchiveKind::Zip => extract_zip(reader, dest),
        ArchiveKind::TarGz => extract_tar(GzDecoder::new(reader), dest),
        ArchiveKind::Tar => extract_tar(reader, dest),
    }
}

fn extract_zip<R: Read + Seek>(reader: R, dest: &Path) -> Result<()> {
    let mut zip = zip::ZipArchive::new(reader).map_err(extract_error)?;
    if zip.len() > MAX_ENTRY_COUNT {
        return Err(Error::Extract {
            message: format!("archive exceeds {MAX_ENTRY_COUNT} entries"),
        });
    }
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(extract_error)?;
        let relative = entry.enclosed_name().ok_or_else(|| Error::PathTraversal {
            path: entry.name().to_string(),
        })?;
        let target = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(|e| comfy_fs::Error::io(&target, e))?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| comfy_fs::Error::io(parent, e))?;
        }
        let mut out = File::create(&target).map_err(|e| comfy_fs::Error::io(&target, e))?;
        io::copy(&mut entry, &mut out).map_err(|e| comfy_fs::Error::io(&target, e))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            let mode = mode & 0o755;
            fs::set_permissions(&target, fs::Permissions::from_mode(mode))
                .map_err(|e| comfy_fs::Error::io(&target, e))?;
        }
    }
    Ok(())
}

fn extract_tar<R: Read>(reader: R, dest: &Path) -> Result<()> {
    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(false);

    let mut count = 0usize;
    for entry in archive.entries().map_err(extract_error)? {
        let mut entry = entry.map_err(extract_error)?;
        count += 1;
        if count > MAX_ENTRY_COUNT {
            return Err(Error::Extract {
                message: format!("archive exceeds {MAX_ENTRY_COUNT} entries"),
            });
        }

        let kind = entry.header().entry_type();
        if !(kind.is_file() || kind.is_dir()) {
            // Links, devices and pax/gnu metadata headers carry no content we need.
            continue;
        }
        let path = entry.path().map_err(extract_error)?.into_owned();
        check_entry_path(&path)?;

        let target = dest.join(&path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| comfy_fs::Error::io(parent, e))?;
        }
        entry.unpack(&target).map_err(|e| comfy_fs::Error::io(&target, e))?;
    }
    Ok(())
}

fn check_entry_path(path: &Path) -> Result<()> {
    let escapes = path.components().any(|c| {
        matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_))
    });
    if escapes {
        return Err(Error::PathTraversal {
            path: path.display().to_string(),
        });
    }
    Ok(())
}

fn extract_error(e: impl std::fmt::Display) -> Error {
    Error::Extract {
        message: e.to_string(),
    }
}

/// The directory to install from: the sole top-level directory when the
/// extraction has exactly one entry and it is a directory, else `dir`.
pub fn source_root(dir: &Path) -> Result<PathBuf> {
    let entries: Vec<_> = fs::read_dir(dir)
        .map_err(|e| comfy_fs::Error::io(dir, e))?
        .filter_map(|e| e.ok())
        .collect();
    match entries.as_slice() {
        [only] if only.file_type().is_ok_and(|t| t.is_dir()) => Ok(only.path()),
        _ => Ok(dir.to_path_buf()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn tar_bytes(files: &[(&str, &str)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (path, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, content.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap()
    }

    fn zip_bytes(files: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(io::Cursor::new(Vec::new()));
        for (path, content) in files {
            writer
                .start_file(
                    *path,
                    zip::write::SimpleFileOptions::default()
                        .compression_method(zip::CompressionMethod::Stored),
                )
                .unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::fast());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn detects_format_from_content() {
        let files = [("Node-1.0/__init__.py", "x = 1\n")];
        assert_eq!(ArchiveKind::detect(&zip_bytes(&files)), Some(ArchiveKind::Zip));
        assert_eq!(ArchiveKind::detect(&gzip(&tar_bytes(&files))), Some(ArchiveKind::TarGz));
        assert_eq!(ArchiveKind::detect(&tar_bytes(&files)), Some(ArchiveKind::Tar));
        assert_eq!(ArchiveKind::detect(b"<html>not found</html>"), None);
    }

    #[test]
    fn extracts_each_format_and_finds_single_root() {
        let files = [
            ("Node-1.0/__init__.py", "x = 1\n"),
            ("Node-1.0/sub/util.py", "y = 2\n"),
        ];
        let payloads = [
            (ArchiveKind::Zip, zip_bytes(&files)),
            (ArchiveKind::TarGz, gzip(&tar_bytes(&files))),
            (ArchiveKind::Tar, tar_bytes(&files)),
        ];
        for (kind, bytes) in payloads {
            let dir = tempfile::tempdir().unwrap();
            let archive = dir.path().join("download");
            fs::write(&archive, bytes).unwrap();
            assert_eq!(ArchiveKind::detect_file(&archive).unwrap(), Some(kind));

            let out = dir.path().join("out");
            extract(&archive, kind, &out).unwrap();
            let root = source_root(&out).unwrap();
            assert_eq!(root, out.join("Node-1.0"), "{}", kind.as_str());
            assert_eq!(fs::read_to_string(root.join("sub/util.py")).unwrap(), "y = 2\n");
        }
    }

    #[test]
    fn flat_archive_uses_extraction_dir() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("download");
        fs::write(&archive, zip_bytes(&[("__init__.py", ""), ("nodes.py", "")])).unwrap();
        let out = dir.path().join("out");
        extract(&archive, ArchiveKind::Zip, &out).unwrap();
        assert_eq!(source_root(&out).unwrap(), out);
    }

    #[test]
    fn parent_components_are_rejected() {
        assert!(matches!(
            check_entry_path(Path::new("../evil.py")),
            Err(Error::PathTraversal { .. })
        ));
        assert!(check_entry_path(Path::new("ok/file.py")).is_ok());
    }
}
