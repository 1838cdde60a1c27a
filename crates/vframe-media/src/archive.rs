//! Zip archives of extracted frames.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::info;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::error::{MediaError, MediaResult};

/// A finished archive on local disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub path: PathBuf,
    pub entries: usize,
    pub size_bytes: u64,
}

/// `frames_<video_id>_<YYYYmmdd_HHMMSS>.zip`
pub fn archive_name(video_id: &str, now: DateTime<Utc>) -> String {
    format!("frames_{}_{}.zip", video_id, now.format("%Y%m%d_%H%M%S"))
}

/// Write `files` into a new zip at `dest`, in the given order.
///
/// Each entry is named by the file's base name and deflated.
pub async fn create_archive(files: Vec<PathBuf>, dest: PathBuf) -> MediaResult<ArchiveSummary> {
    tokio::task::spawn_blocking(move || write_archive(&files, &dest))
        .await
        .map_err(|e| MediaError::internal(format!("archive task failed: {}", e)))?
}

fn write_archive(files: &[PathBuf], dest: &Path) -> MediaResult<ArchiveSummary> {
    let file = File::create(dest)?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for path in files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| MediaError::InvalidPath(path.clone()))?;

        zip.start_file(name, options)?;
        let mut source = File::open(path)?;
        std::io::copy(&mut source, &mut zip)?;
    }

    let mut writer = zip.finish()?;
    writer.flush()?;
    drop(writer);

    let size_bytes = std::fs::metadata(dest)?.len();
    info!(
        archive = %dest.display(),
        entries = files.len(),
        size_bytes,
        "Created frame archive"
    );

    Ok(ArchiveSummary {
        path: dest.to_path_buf(),
        entries: files.len(),
        size_bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Read;
    use tempfile::TempDir;

    #[test]
    fn test_archive_name() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(archive_name("abc", now), "frames_abc_20240309_070501.zip");
    }

    #[tokio::test]
    async fn test_archive_contents_match_sources() {
        let temp = TempDir::new().unwrap();
        let frames_dir = temp.path().join("frames");
        std::fs::create_dir(&frames_dir).unwrap();

        let mut files = Vec::new();
        for (i, body) in [b"first".as_slice(), b"second", &[0u8, 159, 146, 150]]
            .iter()
            .enumerate()
        {
            let path = frames_dir.join(format!("frame_{:04}.png", i + 1));
            std::fs::write(&path, body).unwrap();
            files.push(path);
        }

        let dest = temp.path().join("frames.zip");
        let summary = create_archive(files.clone(), dest.clone()).await.unwrap();
        assert_eq!(summary.entries, 3);
        assert_eq!(summary.size_bytes, std::fs::metadata(&dest).unwrap().len());

        let mut archive = zip::ZipArchive::new(File::open(&dest).unwrap()).unwrap();
        assert_eq!(archive.len(), 3);
        for (i, source) in files.iter().enumerate() {
            let mut entry = archive.by_index(i).unwrap();
            assert_eq!(entry.name(), format!("frame_{:04}.png", i + 1));

            let mut contents = Vec::new();
            entry.read_to_end(&mut contents).unwrap();
            assert_eq!(contents, std::fs::read(source).unwrap());
        }
    }

    #[tokio::test]
    async fn test_missing_source_fails() {
        let temp = TempDir::new().unwrap();
        let result = create_archive(
            vec![temp.path().join("missing.png")],
            temp.path().join("out.zip"),
        )
        .await;
        assert!(matches!(result, Err(MediaError::Io(_))));
    }
}
