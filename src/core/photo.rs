//! Photo uploads.
//!
//! A [`BlobStore`] keeps the image bytes and hands back a public URL, which is then
//! written to the teacher or student row.

use crate::{
    config::settings::StorageSettings,
    core::{
        permissions::{self, Actor},
        roster,
    },
    entities::{student, teacher},
    errors::{Error, Result},
};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::ConnectionTrait;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use uuid::Uuid;

/// Folder for teacher photos.
pub const TEACHER_FOLDER: &str = "teachers";
/// Folder for student photos.
pub const STUDENT_FOLDER: &str = "students";

/// Object storage for uploaded files.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores `bytes` under `folder` and returns a publicly fetchable URL.
    ///
    /// `file_name` is the client's name for the file; only its extension is kept.
    async fn put(
        &self,
        folder: &str,
        file_name: &str,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> Result<String>;
}

/// Builds `{folder}/{unix_millis}-{random}.{ext}`.
///
/// # Errors
/// Rejects folders that are empty or contain anything besides letters, digits, `-` and `_`.
pub fn object_name(
    folder: &str,
    file_name: &str,
    unix_millis: i64,
    random: &str,
) -> Result<String> {
    let valid_folder = !folder.is_empty()
        && folder
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid_folder {
        return Err(Error::Upload {
            message: format!("invalid folder '{folder}'"),
        });
    }

    let ext = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map_or_else(|| "bin".to_string(), str::to_ascii_lowercase);

    Ok(format!("{folder}/{unix_millis}-{random}.{ext}"))
}

/// Blob store on the local filesystem, served from `public_base_url`.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    public_base_url: String,
    bucket: String,
}

impl LocalBlobStore {
    /// Creates a store writing to `root/bucket/...`.
    pub fn new(
        root: impl Into<PathBuf>,
        public_base_url: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            bucket: bucket.into(),
        }
    }

    /// Creates a store from the `[storage]` settings.
    #[must_use]
    pub fn from_settings(settings: &StorageSettings) -> Self {
        Self::new(
            settings.upload_dir.clone(),
            settings.public_base_url.clone(),
            settings.bucket.clone(),
        )
    }

    /// Filesystem path of an object.
    #[must_use]
    pub fn path_of(&self, object: &str) -> PathBuf {
        self.root.join(&self.bucket).join(object)
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(
        &self,
        folder: &str,
        file_name: &str,
        _content_type: Option<&str>,
        bytes: &[u8],
    ) -> Result<String> {
        if bytes.is_empty() {
            return Err(Error::Upload {
                message: "file is empty".to_string(),
            });
        }

        let random = Uuid::new_v4().simple().to_string();
        let object = object_name(folder, file_name, Utc::now().timestamp_millis(), &random[..8])?;
        let path = self.path_of(&object);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;

        Ok(format!("{}/{}/{}", self.public_base_url, self.bucket, object))
    }
}

async fn store_blob<S>(
    store: &S,
    folder: &str,
    file_name: &str,
    content_type: Option<&str>,
    bytes: &[u8],
) -> Result<String>
where
    S: BlobStore + ?Sized,
{
    store
        .put(folder, file_name, content_type, bytes)
        .await
        .map_err(|e| {
            error!("Photo upload failed: {e}");
            match e {
                Error::Upload { .. } => e,
                other => Error::Upload {
                    message: other.to_string(),
                },
            }
        })
}

/// Uploads a teacher photo and records its URL. Staff, or the teacher themself.
pub async fn upload_teacher_photo<C, S>(
    db: &C,
    store: &S,
    actor: &Actor,
    teacher_id: &str,
    file_name: &str,
    content_type: Option<&str>,
    bytes: &[u8],
) -> Result<teacher::Model>
where
    C: ConnectionTrait,
    S: BlobStore + ?Sized,
{
    permissions::require(
        permissions::can_edit_teacher_photo(actor, teacher_id),
        "edit teacher photo",
    )?;
    roster::require_teacher(db, teacher_id).await?;

    let url = store_blob(store, TEACHER_FOLDER, file_name, content_type, bytes).await?;
    let updated = roster::set_teacher_photo(db, teacher_id, &url)
        .await
        .inspect_err(|e| error!(teacher_id, %url, "Photo stored but not recorded: {e}"))?;
    info!(teacher_id, %url, "Teacher photo updated");
    Ok(updated)
}

/// Uploads a student photo and records its URL. Any selected role.
pub async fn upload_student_photo<C, S>(
    db: &C,
    store: &S,
    actor: &Actor,
    student_id: &str,
    file_name: &str,
    content_type: Option<&str>,
    bytes: &[u8],
) -> Result<student::Model>
where
    C: ConnectionTrait,
    S: BlobStore + ?Sized,
{
    permissions::require(permissions::can_edit_photo(actor), "edit photo")?;
    roster::require_student(db, student_id).await?;

    let url = store_blob(store, STUDENT_FOLDER, file_name, content_type, bytes).await?;
    let updated = roster::set_student_photo(db, student_id, &url)
        .await
        .inspect_err(|e| error!(student_id, %url, "Photo stored but not recorded: {e}"))?;
    info!(student_id, %url, "Student photo updated");
    Ok(updated)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase};

    struct FailingStore;

    #[async_trait]
    impl BlobStore for FailingStore {
        async fn put(&self, _: &str, _: &str, _: Option<&str>, _: &[u8]) -> Result<String> {
            Err(Error::Io(std::io::Error::other("bucket unavailable")))
        }
    }

    fn temp_store() -> (LocalBlobStore, PathBuf) {
        let root = std::env::temp_dir().join(format!("attendance-test-{}", Uuid::new_v4()));
        let store = LocalBlobStore::new(&root, "http://localhost:8080/uploads/", "avatars");
        (store, root)
    }

    #[test]
    fn test_object_name() {
        assert_eq!(
            object_name("students", "Photo.JPG", 1_700_000_000_000, "ab12cd34").unwrap(),
            "students/1700000000000-ab12cd34.jpg"
        );
        assert_eq!(
            object_name("teachers", "noext", 1, "r").unwrap(),
            "teachers/1-r.bin"
        );
        assert!(matches!(
            object_name("../etc", "a.png", 1, "r").unwrap_err(),
            Error::Upload { .. }
        ));
        assert!(object_name("", "a.png", 1, "r").is_err());
    }

    #[tokio::test]
    async fn test_local_store_writes_file() -> Result<()> {
        let (store, root) = temp_store();

        let url = store.put("students", "me.png", Some("image/png"), b"png-bytes").await?;
        let prefix = "http://localhost:8080/uploads/avatars/";
        assert!(url.starts_with(prefix), "{url}");
        assert!(url.ends_with(".png"));

        let object = url.trim_start_matches(prefix);
        let stored = tokio::fs::read(store.path_of(object)).await?;
        assert_eq!(stored, b"png-bytes");

        let empty = store.put("students", "me.png", None, b"").await;
        assert!(matches!(empty.unwrap_err(), Error::Upload { .. }));

        tokio::fs::remove_dir_all(root).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_upload_student_photo_records_url() -> Result<()> {
        let (db, _class, _teacher, students) = setup_with_class(1).await?;
        let (store, root) = temp_store();

        let updated = upload_student_photo(
            &db,
            &store,
            &Actor::head_teacher(),
            &students[0].id,
            "face.jpeg",
            Some("image/jpeg"),
            b"jpeg",
        )
        .await?;
        let url = updated.photo_url.unwrap();
        assert!(url.contains("/avatars/students/"));

        let denied =
            upload_student_photo(&db, &store, &Actor::none(), &students[0].id, "f.jpg", None, b"x")
                .await;
        assert!(matches!(denied.unwrap_err(), Error::PermissionDenied { .. }));

        tokio::fs::remove_dir_all(root).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_teacher_uploads_own_photo_only() -> Result<()> {
        let (db, class, teacher, _students) = setup_with_class(0).await?;
        let other = create_test_teacher(&db, "Other", &class.id).await?;
        let (store, root) = temp_store();
        let actor = Actor::teacher(&teacher.id, &teacher.name);

        let updated =
            upload_teacher_photo(&db, &store, &actor, &teacher.id, "me.png", None, b"png").await?;
        assert!(updated.photo_url.is_some());

        let denied =
            upload_teacher_photo(&db, &store, &actor, &other.id, "me.png", None, b"png").await;
        assert!(matches!(denied.unwrap_err(), Error::PermissionDenied { .. }));

        tokio::fs::remove_dir_all(root).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_upload_leaves_row_untouched() -> Result<()> {
        let (db, _class, _teacher, students) = setup_with_class(1).await?;

        let result = upload_student_photo(
            &db,
            &FailingStore,
            &Actor::admin(),
            &students[0].id,
            "face.png",
            None,
            b"png",
        )
        .await;
        assert!(matches!(result.unwrap_err(), Error::Upload { .. }));

        let student = roster::require_student(&db, &students[0].id).await?;
        assert!(student.photo_url.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_unrecorded_photo_returns_error() -> Result<()> {
        let student = student_model("s1", "Student 00", "c1");
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_results([vec![student.clone()], vec![student]])
            .append_query_errors([DbErr::Custom("store unavailable".to_string())])
            .append_exec_errors([DbErr::Custom("store unavailable".to_string())])
            .into_connection();
        let (store, root) = temp_store();

        let admin = Actor::admin();
        let result = upload_student_photo(&db, &store, &admin, "s1", "face.png", None, b"png")
            .await;
        assert!(matches!(result.unwrap_err(), Error::Database(_)));

        tokio::fs::remove_dir_all(root).await?;
        Ok(())
    }
}
