use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::io::AsyncWriteExt;

use crate::error::RepurposeError;

const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Links `tmp` to the first free `{stem}.{ext}`, `{stem}-1.{ext}`, ... in `dir`.
/// `hard_link` fails when the target exists, so concurrent writers can never
/// claim the same name.
async fn claim_name(tmp: &Path, dir: &Path, stem: &str, ext: &str) -> Result<PathBuf, RepurposeError> {
    for n in 0..MAX_NAME_ATTEMPTS {
        let candidate = match n {
            0 => dir.join(format!("{stem}.{ext}")),
            n => dir.join(format!("{stem}-{n}.{ext}")),
        };
        match tokio::fs::hard_link(tmp, &candidate).await {
            Ok(()) => return Ok(candidate),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(err) => return Err(err.into()),
        }
    }
    Err(RepurposeError::Io(std::io::Error::new(
        std::io::ErrorKind::AlreadyExists,
        format!("No free file name for {stem}.{ext}"),
    )))
}

/// Writes `content` to a fresh file named after `stem` under `dir`, through a
/// temporary file that is linked into place, so readers never observe a
/// partial report and an existing file is never replaced.
pub(crate) async fn save_atomic(
    dir: &Path,
    stem: &str,
    ext: &str,
    content: &str,
) -> Result<PathBuf, RepurposeError> {
    tokio::fs::create_dir_all(dir).await?;

    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let mut opened = None;
    for attempt in 0..32_u32 {
        let candidate = dir.join(format!(
            ".{stem}.{}.{}.tmp",
            std::process::id(),
            seed.saturating_add(attempt as u128)
        ));
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
            .await
        {
            Ok(file) => {
                opened = Some((candidate, file));
                break;
            }
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(err) => return Err(err.into()),
        }
    }
    let Some((tmp_path, mut file)) = opened else {
        return Err(RepurposeError::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            "Unable to allocate temporary report file",
        )));
    };
    file.write_all(content.as_bytes()).await?;
    file.flush().await?;
    drop(file);

    let claimed = claim_name(&tmp_path, dir, stem, ext).await;
    let _ = tokio::fs::remove_file(&tmp_path).await;
    claimed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_atomic_writes_and_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();

        let first = save_atomic(dir.path(), "report", "md", "one").await.unwrap();
        let second = save_atomic(dir.path(), "report", "md", "two").await.unwrap();

        assert_eq!(first.file_name().unwrap(), "report.md");
        assert_eq!(second.file_name().unwrap(), "report-1.md");
        assert_eq!(tokio::fs::read_to_string(&first).await.unwrap(), "one");
        assert_eq!(tokio::fs::read_to_string(&second).await.unwrap(), "two");

        let leftovers = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_saves_with_same_stem_get_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();

        let handles = (0..16)
            .map(|i| {
                let root = root.clone();
                tokio::spawn(async move {
                    let body = format!("report {i}");
                    let path = save_atomic(&root, "report", "md", &body).await.unwrap();
                    (path, body)
                })
            })
            .collect::<Vec<_>>();

        let mut paths = std::collections::HashSet::new();
        for handle in handles {
            let (path, body) = handle.await.unwrap();
            assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), body);
            paths.insert(path);
        }
        assert_eq!(paths.len(), 16);

        let files = std::fs::read_dir(&root)
            .unwrap()
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        assert_eq!(files.len(), 16, "{files:?}");
        assert!(files.iter().all(|name| name.ends_with(".md")));
    }

    #[tokio::test]
    async fn save_atomic_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let path = save_atomic(&nested, "r", "md", "x").await.unwrap();
        assert!(path.starts_with(&nested));
    }
}
