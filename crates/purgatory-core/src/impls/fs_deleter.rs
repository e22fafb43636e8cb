//! FilesystemDeleter - ローカルディスク上の外部オブジェクトストア
//!
//! オブジェクトは `<root>/<hash[0..2]>/<hash[2..4]>/<hash>` に置かれます。
//! パスは検証済みの `ContentHash` からしか組み立てないので root の外には出ません。
//!
//! # 削除オプション
//! - `force`: 既に無いオブジェクトを `AlreadyAbsent` として成功扱いにする
//! - `quiet`: 空になった fan-out ディレクトリの掃除に失敗しても無視する
//!   （本体の削除エラーは常に返す）

use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, instrument};

use crate::domain::{ContentHash, DeleteError};
use crate::ports::{DeleteOptions, DeleteOutcome, ExternalDeleter};

pub struct FilesystemDeleter {
    root: PathBuf,
    prune_empty_dirs: bool,
}

impl FilesystemDeleter {
    pub fn new(root: impl Into<PathBuf>, prune_empty_dirs: bool) -> Self {
        Self {
            root: root.into(),
            prune_empty_dirs,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn object_path(&self, hash: &ContentHash) -> PathBuf {
        let (l1, l2) = hash.fan_out();
        self.root.join(l1).join(l2).join(hash.as_str())
    }

    /// 削除で空になった fan-out ディレクトリを内側から消す。
    /// 他のオブジェクトが残っていればそこで止める
    async fn prune(&self, hash: &ContentHash) -> std::io::Result<()> {
        let (l1, l2) = hash.fan_out();
        let outer = self.root.join(l1);
        for dir in [outer.join(l2), outer] {
            match fs::remove_dir(&dir).await {
                Ok(()) => {}
                Err(e) if e.kind() == IoErrorKind::NotFound => {}
                Err(e) if e.kind() == IoErrorKind::DirectoryNotEmpty => return Ok(()),
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ExternalDeleter for FilesystemDeleter {
    #[instrument(skip(self, hash), fields(backend = "filesystem", hash = %hash))]
    async fn delete(
        &self,
        hash: &ContentHash,
        options: DeleteOptions,
    ) -> Result<DeleteOutcome, DeleteError> {
        let path = self.object_path(hash);
        let outcome = match fs::remove_file(&path).await {
            Ok(()) => DeleteOutcome::Deleted,
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                if !options.force {
                    return Err(DeleteError::NotFound(hash.clone()));
                }
                DeleteOutcome::AlreadyAbsent
            }
            Err(source) => {
                return Err(DeleteError::Io {
                    hash: hash.clone(),
                    source,
                });
            }
        };

        if self.prune_empty_dirs
            && let Err(source) = self.prune(hash).await
        {
            if !options.quiet {
                return Err(DeleteError::Cleanup {
                    hash: hash.clone(),
                    source,
                });
            }
            debug!(error = %source, "ignoring fan-out cleanup failure");
        }

        Ok(outcome)
    }

    fn backend(&self) -> &'static str {
        "filesystem"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "da39a3ee5e6b4b0d3255bfef95601890afd80709";

    fn hash() -> ContentHash {
        ContentHash::parse(HASH).unwrap()
    }

    fn write_object(deleter: &FilesystemDeleter, hash: &ContentHash) -> PathBuf {
        let path = deleter.object_path(hash);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"payload").unwrap();
        path
    }

    #[test]
    fn uses_two_level_fan_out() {
        let deleter = FilesystemDeleter::new("/objects", true);
        assert_eq!(
            deleter.object_path(&hash()),
            PathBuf::from(format!("/objects/da/39/{HASH}"))
        );
    }

    #[tokio::test]
    async fn deletes_and_prunes_empty_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let deleter = FilesystemDeleter::new(dir.path(), true);
        let path = write_object(&deleter, &hash());

        let outcome = deleter.delete(&hash(), DeleteOptions::default()).await.unwrap();

        assert_eq!(outcome, DeleteOutcome::Deleted);
        assert!(!path.exists());
        assert!(!dir.path().join("da").exists());
    }

    #[tokio::test]
    async fn keeps_dirs_shared_with_other_objects() {
        let dir = tempfile::tempdir().unwrap();
        let deleter = FilesystemDeleter::new(dir.path(), true);
        let sibling = ContentHash::parse("da39ffffffffffffffffffffffffffffffffffff").unwrap();
        write_object(&deleter, &hash());
        let sibling_path = write_object(&deleter, &sibling);

        deleter.delete(&hash(), DeleteOptions::default()).await.unwrap();

        assert!(sibling_path.exists());
    }

    #[tokio::test]
    async fn missing_object_depends_on_force() {
        let dir = tempfile::tempdir().unwrap();
        let deleter = FilesystemDeleter::new(dir.path(), false);

        let forced = deleter
            .delete(&hash(), DeleteOptions { force: true, quiet: false })
            .await
            .unwrap();
        assert_eq!(forced, DeleteOutcome::AlreadyAbsent);

        let err = deleter
            .delete(&hash(), DeleteOptions { force: false, quiet: false })
            .await
            .unwrap_err();
        assert!(matches!(err, DeleteError::NotFound(_)));
    }

    #[tokio::test]
    async fn directory_in_place_of_object_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let deleter = FilesystemDeleter::new(dir.path(), true);
        std::fs::create_dir_all(deleter.object_path(&hash())).unwrap();

        let err = deleter
            .delete(&hash(), DeleteOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DeleteError::Io { .. }));
    }

    /// `<root>/da` を別ディレクトリへの symlink にすると、本体と `da/39` は
    /// 消せるが `da` 自体の rmdir は失敗する
    #[cfg(unix)]
    fn deleter_with_unprunable_fan_out(dir: &Path) -> FilesystemDeleter {
        let real = dir.join("real");
        std::fs::create_dir_all(real.join("39")).unwrap();
        std::fs::write(real.join("39").join(HASH), b"payload").unwrap();
        let root = dir.join("objects");
        std::fs::create_dir(&root).unwrap();
        std::os::unix::fs::symlink(&real, root.join("da")).unwrap();
        FilesystemDeleter::new(root, true)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn quiet_ignores_cleanup_failure() {
        let dir = tempfile::tempdir().unwrap();
        let deleter = deleter_with_unprunable_fan_out(dir.path());

        let outcome = deleter
            .delete(&hash(), DeleteOptions { force: true, quiet: true })
            .await
            .unwrap();

        assert_eq!(outcome, DeleteOutcome::Deleted);
        assert!(!dir.path().join("real").join("39").exists());
        assert!(deleter.root().join("da").is_symlink());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn cleanup_failure_surfaces_without_quiet() {
        let dir = tempfile::tempdir().unwrap();
        let deleter = deleter_with_unprunable_fan_out(dir.path());

        let err = deleter
            .delete(&hash(), DeleteOptions { force: true, quiet: false })
            .await
            .unwrap_err();

        assert!(matches!(err, DeleteError::Cleanup { hash: ref failed, .. } if *failed == hash()));
        // the payload itself is gone even though cleanup failed
        assert!(!dir.path().join("real").join("39").join(HASH).exists());
    }
}
