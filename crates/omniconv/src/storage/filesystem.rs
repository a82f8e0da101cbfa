use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::Utc;
use sha2::{Digest, Sha256};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::StorageError;
use crate::formats::{category_for_extension, FileCategory};
use crate::job::{ConvertedFileRecord, FileRecord};
use crate::sanitize::redact_filename;
use crate::storage::{CleanupStats, Storage};

/// Keeps only a safe character set in a filename base; whitespace
/// becomes underscores. Never returns an empty string.
fn sanitize_base(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter_map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                Some(c)
            } else if c.is_whitespace() {
                Some('_')
            } else {
                None
            }
        })
        .collect();

    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

fn split_name(filename: &str) -> (&str, Option<&str>) {
    match filename.rfind('.') {
        Some(dot) => (&filename[..dot], Some(&filename[dot..])),
        None => (filename, None),
    }
}

fn ensure_directory(path: &Path) -> Result<(), StorageError> {
    if !path.exists() {
        fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

/// Creates `filename` (or a numbered variant) under `dir` and writes
/// `content`. Creation uses O_EXCL so a concurrent writer cannot claim
/// the same name between check and write.
fn write_exclusive(dir: &Path, filename: &str, content: &[u8]) -> Result<PathBuf, StorageError> {
    let (base, ext) = split_name(filename);

    for counter in 1..=1000 {
        let try_filename = if counter == 1 {
            filename.to_string()
        } else {
            match ext {
                Some(ext) => format!("{}_{}{}", base, counter, ext),
                None => format!("{}_{}", base, counter),
            }
        };

        let try_path = dir.join(&try_filename);

        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&try_path)
        {
            Ok(mut file) => {
                file.write_all(content)
                    .map_err(|e| StorageError::WriteFile {
                        path: try_path.clone(),
                        source: e,
                    })?;
                return Ok(try_path);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                continue;
            }
            Err(e) => {
                return Err(StorageError::WriteFile {
                    path: try_path,
                    source: e,
                });
            }
        }
    }

    Err(StorageError::FileExists(dir.join(filename)))
}

/// Returns an unclaimed path for `filename` under `directory`. The file
/// itself is created later by the engine; stored names carry unique ids,
/// which keeps concurrent candidates disjoint.
fn resolve_conflict(directory: &Path, filename: &str) -> Result<PathBuf, StorageError> {
    let path = directory.join(filename);

    // symlink_metadata also catches broken symlinks.
    if fs::symlink_metadata(&path).is_err() {
        return Ok(path);
    }

    let (base, ext) = split_name(filename);

    for counter in 2..=1000 {
        let candidate = match ext {
            Some(ext) => format!("{}_{}{}", base, counter, ext),
            None => format!("{}_{}", base, counter),
        };

        let candidate_path = directory.join(&candidate);
        if fs::symlink_metadata(&candidate_path).is_err() {
            return Ok(candidate_path);
        }
    }

    Err(StorageError::FileExists(path))
}

pub struct FileStorage {
    upload_root: PathBuf,
    output_root: PathBuf,
}

impl FileStorage {
    pub fn new(
        upload_root: impl AsRef<Path>,
        output_root: impl AsRef<Path>,
    ) -> Result<Self, StorageError> {
        let storage = Self {
            upload_root: upload_root.as_ref().to_path_buf(),
            output_root: output_root.as_ref().to_path_buf(),
        };
        ensure_directory(&storage.upload_root)?;
        ensure_directory(&storage.output_root)?;
        Ok(storage)
    }

    pub fn from_config(config: &Config) -> Result<Self, StorageError> {
        Self::new(&config.upload_directory, &config.output_directory)
    }

    pub fn upload_root(&self) -> &Path {
        &self.upload_root
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }
}

impl Storage for FileStorage {
    fn save_upload(&self, bytes: &[u8], name: &str) -> Result<FileRecord, StorageError> {
        let path = Path::new(name);
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(name);
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let file_id = Uuid::new_v4().to_string();
        let candidate = if extension.is_empty() {
            format!(
                "{}_{}_{}",
                file_id,
                Utc::now().timestamp(),
                sanitize_base(stem)
            )
        } else {
            format!(
                "{}_{}_{}.{}",
                file_id,
                Utc::now().timestamp(),
                sanitize_base(stem),
                extension
            )
        };

        let stored_path = write_exclusive(&self.upload_root, &candidate, bytes)?;
        let stored_name = stored_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or(candidate);

        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let digest = hasher.finalize();

        log::info!("Stored upload {} as {}", redact_filename(name), stored_name);

        Ok(FileRecord {
            id: file_id,
            original_name: name.to_string(),
            stored_name,
            path: stored_path,
            size: bytes.len() as u64,
            extension: extension.clone(),
            category: category_for_extension(&extension).unwrap_or(FileCategory::Unknown),
            mime_type: mime_guess::from_ext(&extension).first_raw().map(String::from),
            checksum: Some(hex::encode(&digest[..8])),
            target_format: None,
            uploaded_at: Utc::now(),
        })
    }

    fn allocate_output_path(
        &self,
        file: &FileRecord,
        target_ext: &str,
    ) -> Result<PathBuf, StorageError> {
        let stem = Path::new(&file.original_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .map(sanitize_base)
            .unwrap_or_else(|| "file".to_string());

        let filename = format!(
            "{}_{}_{}.{}",
            file.id,
            Utc::now().timestamp(),
            stem,
            target_ext.trim_start_matches('.').to_ascii_lowercase()
        );

        resolve_conflict(&self.output_root, &filename)
    }

    fn archive_results(
        &self,
        job_id: &str,
        files: &[ConvertedFileRecord],
    ) -> Result<Option<PathBuf>, StorageError> {
        if files.is_empty() {
            return Ok(None);
        }

        let zip_path = self.output_root.join(format!("converted_{}.zip", job_id));

        match write_archive(&zip_path, files) {
            Ok(0) => {
                // Every entry was missing on disk; an empty archive
                // would only confuse the download side.
                let _ = fs::remove_file(&zip_path);
                Ok(None)
            }
            Ok(added) => {
                log::info!(
                    "Archived {} files for job {} at '{}'",
                    added,
                    job_id,
                    zip_path.display()
                );
                Ok(Some(zip_path))
            }
            Err(e) => {
                let _ = fs::remove_file(&zip_path);
                Err(e)
            }
        }
    }

    fn reap_older_than(&self, max_age: Duration) -> Result<CleanupStats, StorageError> {
        let cutoff = SystemTime::now()
            .checked_sub(max_age)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let mut stats = CleanupStats::default();

        for root in [&self.upload_root, &self.output_root] {
            if !root.exists() {
                continue;
            }

            for entry in WalkDir::new(root).min_depth(1) {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) if e.depth() == 0 => {
                        return Err(StorageError::Scan {
                            path: root.clone(),
                            source: e,
                        });
                    }
                    Err(e) => {
                        log::warn!("Skipping unreadable entry during cleanup: {}", e);
                        continue;
                    }
                };

                if !entry.file_type().is_file() {
                    continue;
                }
                let metadata = match entry.metadata() {
                    Ok(metadata) => metadata,
                    Err(_) => continue,
                };
                let modified = match metadata.modified() {
                    Ok(modified) => modified,
                    Err(_) => continue,
                };
                if modified >= cutoff {
                    continue;
                }

                match fs::remove_file(entry.path()) {
                    Ok(()) => {
                        stats.files_removed += 1;
                        stats.bytes_freed += metadata.len();
                    }
                    Err(e) => {
                        log::warn!(
                            "Could not remove expired file '{}': {}",
                            entry.path().display(),
                            e
                        );
                    }
                }
            }
        }

        if stats.files_removed > 0 {
            log::info!(
                "Cleanup removed {} files ({} bytes freed)",
                stats.files_removed,
                stats.bytes_freed
            );
        }

        Ok(stats)
    }
}

fn write_archive(zip_path: &Path, files: &[ConvertedFileRecord]) -> Result<usize, StorageError> {
    let file = fs::File::create(zip_path).map_err(|e| StorageError::WriteFile {
        path: zip_path.to_path_buf(),
        source: e,
    })?;
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    let mut used_names: HashSet<String> = HashSet::new();
    let mut added = 0usize;

    for record in files {
        let bytes = match fs::read(&record.path) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!(
                    "Skipping missing archive entry '{}': {}",
                    record.stored_name,
                    e
                );
                continue;
            }
        };

        // Entries carry the user-facing name; fall back to the unique
        // stored name when two outputs would collide.
        let entry_name = if used_names.insert(record.original_name.clone()) {
            record.original_name.clone()
        } else {
            record.stored_name.clone()
        };

        writer
            .start_file(entry_name, options)
            .map_err(|e| StorageError::Archive {
                path: zip_path.to_path_buf(),
                source: e,
            })?;
        writer
            .write_all(&bytes)
            .map_err(|e| StorageError::WriteFile {
                path: zip_path.to_path_buf(),
                source: e,
            })?;
        added += 1;
    }

    writer.finish().map_err(|e| StorageError::Archive {
        path: zip_path.to_path_buf(),
        source: e,
    })?;

    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn storage(temp: &TempDir) -> FileStorage {
        FileStorage::new(temp.path().join("uploads"), temp.path().join("converted")).unwrap()
    }

    fn converted_record(name: &str, stored: &str, path: PathBuf) -> ConvertedFileRecord {
        ConvertedFileRecord {
            id: Uuid::new_v4().to_string(),
            original_name: name.to_string(),
            stored_name: stored.to_string(),
            path,
            size: 0,
            extension: "png".to_string(),
            converted_at: Utc::now(),
            conversion_secs: 0.1,
            engine: "image".to_string(),
            compression_ratio: None,
        }
    }

    #[test]
    fn test_new_creates_both_roots() {
        let temp = TempDir::new().unwrap();
        let storage = storage(&temp);

        assert!(storage.upload_root().is_dir());
        assert!(storage.output_root().is_dir());
    }

    #[test]
    fn test_save_upload_round_trip() {
        let temp = TempDir::new().unwrap();
        let storage = storage(&temp);

        let record = storage.save_upload(b"hello world", "Report Final.PDF").unwrap();

        assert!(record.path.exists());
        assert_eq!(fs::read(&record.path).unwrap(), b"hello world");
        assert_eq!(record.original_name, "Report Final.PDF");
        assert_eq!(record.extension, "pdf");
        assert_eq!(record.category, FileCategory::Document);
        assert_eq!(record.size, 11);
        assert!(record.stored_name.ends_with("_Report_Final.pdf"));
        assert!(record.stored_name.starts_with(&record.id));
        assert_eq!(record.checksum.as_ref().unwrap().len(), 16);
        assert_eq!(record.mime_type.as_deref(), Some("application/pdf"));
    }

    #[test]
    fn test_save_upload_strips_hostile_names() {
        let temp = TempDir::new().unwrap();
        let storage = storage(&temp);

        let record = storage.save_upload(b"x", "../../etc/passwd.txt").unwrap();

        // The stored file must land inside the upload root.
        assert!(record.path.starts_with(storage.upload_root()));
        assert!(!record.stored_name.contains(".."));
        assert!(!record.stored_name.contains('/'));
    }

    #[test]
    fn test_same_name_uploads_get_distinct_files() {
        let temp = TempDir::new().unwrap();
        let storage = storage(&temp);

        let first = storage.save_upload(b"one", "photo.png").unwrap();
        let second = storage.save_upload(b"two", "photo.png").unwrap();

        assert_ne!(first.path, second.path);
        assert_eq!(fs::read(&first.path).unwrap(), b"one");
        assert_eq!(fs::read(&second.path).unwrap(), b"two");
    }

    #[test]
    fn test_allocate_output_path_is_unclaimed() {
        let temp = TempDir::new().unwrap();
        let storage = storage(&temp);

        let record = storage.save_upload(b"data", "photo.png").unwrap();
        let output = storage.allocate_output_path(&record, "webp").unwrap();

        assert!(output.starts_with(storage.output_root()));
        assert!(!output.exists());
        assert!(output.to_string_lossy().ends_with(".webp"));
        assert!(output
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(&record.id));
    }

    #[test]
    fn test_allocate_output_path_probes_past_existing() {
        let temp = TempDir::new().unwrap();
        let storage = storage(&temp);

        let record = storage.save_upload(b"data", "photo.png").unwrap();
        let first = storage.allocate_output_path(&record, "webp").unwrap();
        fs::write(&first, b"claimed").unwrap();

        let second = storage.allocate_output_path(&record, "webp").unwrap();
        assert_ne!(first, second);
        assert!(!second.exists());
    }

    #[test]
    fn test_archive_results_bundles_outputs() {
        let temp = TempDir::new().unwrap();
        let storage = storage(&temp);

        let one = storage.output_root().join("a.png");
        let two = storage.output_root().join("b.png");
        fs::write(&one, b"first").unwrap();
        fs::write(&two, b"second").unwrap();

        let archive = storage
            .archive_results(
                "job-1",
                &[
                    converted_record("photo.png", "a.png", one),
                    converted_record("scan.png", "b.png", two),
                ],
            )
            .unwrap()
            .unwrap();

        assert!(archive.exists());
        assert_eq!(
            archive.file_name().unwrap().to_string_lossy(),
            "converted_job-1.zip"
        );

        let mut zip = zip::ZipArchive::new(fs::File::open(&archive).unwrap()).unwrap();
        let names: Vec<String> = (0..zip.len())
            .map(|i| zip.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"photo.png".to_string()));
        assert!(names.contains(&"scan.png".to_string()));
    }

    #[test]
    fn test_archive_deduplicates_entry_names() {
        let temp = TempDir::new().unwrap();
        let storage = storage(&temp);

        let one = storage.output_root().join("a.png");
        let two = storage.output_root().join("b.png");
        fs::write(&one, b"first").unwrap();
        fs::write(&two, b"second").unwrap();

        let archive = storage
            .archive_results(
                "job-2",
                &[
                    converted_record("photo.png", "a.png", one),
                    converted_record("photo.png", "b.png", two),
                ],
            )
            .unwrap()
            .unwrap();

        let mut zip = zip::ZipArchive::new(fs::File::open(&archive).unwrap()).unwrap();
        let names: Vec<String> = (0..zip.len())
            .map(|i| zip.by_index(i).unwrap().name().to_string())
            .collect();
        assert!(names.contains(&"photo.png".to_string()));
        assert!(names.contains(&"b.png".to_string()));
    }

    #[test]
    fn test_archive_empty_input_yields_none() {
        let temp = TempDir::new().unwrap();
        let storage = storage(&temp);

        assert!(storage.archive_results("job-3", &[]).unwrap().is_none());
    }

    #[test]
    fn test_archive_with_only_missing_files_yields_none() {
        let temp = TempDir::new().unwrap();
        let storage = storage(&temp);

        let missing = storage.output_root().join("gone.png");
        let result = storage
            .archive_results("job-4", &[converted_record("photo.png", "gone.png", missing)])
            .unwrap();

        assert!(result.is_none());
        assert!(!storage.output_root().join("converted_job-4.zip").exists());
    }

    #[test]
    fn test_reap_removes_only_old_files() {
        let temp = TempDir::new().unwrap();
        let storage = storage(&temp);

        let old_file = storage.upload_root().join("old.bin");
        let new_file = storage.output_root().join("new.bin");
        fs::write(&old_file, b"0123456789").unwrap();
        fs::write(&new_file, b"fresh").unwrap();

        // Zero max age removes anything modified before "now"; the file
        // just written may share the current instant, so age it by hand.
        let past = SystemTime::now() - Duration::from_secs(3600);
        let handle = fs::File::options().write(true).open(&old_file).unwrap();
        handle.set_modified(past).unwrap();

        let stats = storage.reap_older_than(Duration::from_secs(60)).unwrap();

        assert_eq!(stats.files_removed, 1);
        assert_eq!(stats.bytes_freed, 10);
        assert!(!old_file.exists());
        assert!(new_file.exists());
    }

    #[test]
    fn test_sanitize_base_never_empty() {
        assert_eq!(sanitize_base("!!!"), "file");
        assert_eq!(sanitize_base("my report"), "my_report");
        assert_eq!(sanitize_base("safe-name_1"), "safe-name_1");
    }
}
