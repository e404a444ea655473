use anyhow::{anyhow, Context};
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;
pub const UPLOADS_DIR: &str = "uploads";

#[derive(Debug, Clone)]
pub struct StoredFile {
    pub file_name: String,
    pub stored_path: PathBuf,
}

pub fn uploads_dir(workspace: &Path) -> PathBuf {
    workspace.join(UPLOADS_DIR)
}

/// Validates a staged upload without touching it: PDFs only, capped at 10 MiB.
pub fn check_pdf_upload(source: &Path) -> anyhow::Result<u64> {
    let meta = std::fs::metadata(source)
        .with_context(|| format!("file not found: {}", source.to_string_lossy()))?;
    if !meta.is_file() {
        return Err(anyhow!("not a file: {}", source.to_string_lossy()));
    }

    let is_pdf = source
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);
    if !is_pdf {
        return Err(anyhow!("only PDF files are allowed"));
    }

    if meta.len() > MAX_UPLOAD_BYTES {
        return Err(anyhow!(
            "file exceeds the {} byte upload limit",
            MAX_UPLOAD_BYTES
        ));
    }

    Ok(meta.len())
}

/// Copies a validated upload into the workspace uploads directory under a
/// unique generated name. The original file name is preserved in the database
/// row, not on disk. No content hashing or deduplication.
pub fn store_pdf_upload(workspace: &Path, source: &Path, prefix: &str) -> anyhow::Result<StoredFile> {
    check_pdf_upload(source)?;

    let dir = uploads_dir(workspace);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create directory {}", dir.to_string_lossy()))?;

    let file_name = source
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_string())
        .ok_or_else(|| anyhow!("upload has no file name"))?;

    let stored_path = dir.join(format!("{}-{}.pdf", prefix, Uuid::new_v4()));
    std::fs::copy(source, &stored_path).with_context(|| {
        format!(
            "failed to store upload at {}",
            stored_path.to_string_lossy()
        )
    })?;

    Ok(StoredFile {
        file_name,
        stored_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(prefix: &str) -> PathBuf {
        let p = std::env::temp_dir().join(format!(
            "{}-{}",
            prefix,
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        std::fs::create_dir_all(&p).expect("create temp dir");
        p
    }

    fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let p = dir.join(name);
        let mut f = std::fs::File::create(&p).expect("create file");
        f.write_all(bytes).expect("write file");
        p
    }

    #[test]
    fn rejects_non_pdf_extension() {
        let dir = temp_dir("tutord-files");
        let doc = write_file(&dir, "notes.txt", b"hello");
        assert!(check_pdf_upload(&doc).is_err());
    }

    #[test]
    fn stores_pdf_under_generated_name() {
        let dir = temp_dir("tutord-files");
        let workspace = temp_dir("tutord-files-ws");
        let pdf = write_file(&dir, "Homework 1.pdf", b"%PDF-1.4 fake");

        let stored = store_pdf_upload(&workspace, &pdf, "material").expect("store");
        assert_eq!(stored.file_name, "Homework 1.pdf");
        assert!(stored.stored_path.starts_with(uploads_dir(&workspace)));
        assert!(stored.stored_path.is_file());
        // Source remains where the HTTP front staged it.
        assert!(pdf.is_file());
    }
}
