use chrono::{SecondsFormat, Utc};
use uuid::Uuid;

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::DicomFile;

/// Metadata repository for uploaded DICOM files.
///
/// Records are append-only: created once, then only read.
pub struct DicomFileService;

impl DicomFileService {
    /// Insert a record for a stored blob. The id and upload time are assigned
    /// here; `file_path` is not checked against the blob store.
    pub async fn create(db: &Database, file_name: &str, file_path: &str) -> Result<DicomFile> {
        let file_id = Uuid::new_v4().to_string();
        // Fixed precision keeps lexical order equal to time order
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);

        sqlx::query(
            r#"
            INSERT INTO dicom_files (id, file_name, file_path, uploaded_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&file_id)
        .bind(file_name)
        .bind(file_path)
        .bind(&now)
        .execute(db.pool())
        .await?;

        tracing::debug!("Recorded DICOM file {} ({})", file_id, file_name);
        Self::get_file(db, &file_id).await
    }

    /// All records, most recent upload first
    pub async fn list(db: &Database) -> Result<Vec<DicomFile>> {
        let files: Vec<DicomFile> = sqlx::query_as(
            "SELECT id, file_name, file_path, uploaded_at, preview_path FROM dicom_files ORDER BY uploaded_at DESC, rowid DESC",
        )
        .fetch_all(db.pool())
        .await?;

        Ok(files)
    }

    /// Get a record by ID. Ids that are not UUIDs cannot exist.
    pub async fn get_file(db: &Database, file_id: &str) -> Result<DicomFile> {
        let not_found = || AppError::not_found("File not found");

        let file_id = Uuid::parse_str(file_id).map_err(|_| not_found())?;

        let file: DicomFile = sqlx::query_as(
            "SELECT id, file_name, file_path, uploaded_at, preview_path FROM dicom_files WHERE id = ?",
        )
        .bind(file_id.to_string())
        .fetch_optional(db.pool())
        .await?
        .ok_or_else(not_found)?;

        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[tokio::test]
    async fn test_create_assigns_id_and_timestamp() {
        let db = Database::in_memory().await.unwrap();

        let file = DicomFileService::create(&db, "scan.dcm", "scan_abc.dcm")
            .await
            .unwrap();

        assert!(Uuid::parse_str(&file.id).is_ok());
        assert_eq!(file.file_name, "scan.dcm");
        assert_eq!(file.file_path, "scan_abc.dcm");
        assert!(chrono::DateTime::parse_from_rfc3339(&file.uploaded_at).is_ok());
        assert!(file.preview_path.is_none());
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let db = Database::in_memory().await.unwrap();
        let mut created = Vec::new();
        for i in 0..5 {
            let file = DicomFileService::create(&db, &format!("{i}.dcm"), &format!("{i}_x.dcm"))
                .await
                .unwrap();
            created.push(file.id);
        }

        let listed = DicomFileService::list(&db).await.unwrap();

        created.reverse();
        assert_eq!(listed.iter().map(|f| f.id.clone()).collect::<Vec<_>>(), created);
        assert!(listed
            .windows(2)
            .all(|pair| pair[0].uploaded_at >= pair[1].uploaded_at));

        // Re-querying yields the same sequence
        let again = DicomFileService::list(&db).await.unwrap();
        assert_eq!(again.len(), 5);
    }

    #[tokio::test]
    async fn test_list_breaks_timestamp_ties_by_insertion_order() {
        let db = Database::in_memory().await.unwrap();
        let uploaded_at = "2025-05-16T04:54:56.000000Z";
        // Later row gets the smaller id so id order cannot explain the result
        let first = "ffffffff-ffff-4fff-bfff-ffffffffffff";
        let second = "00000000-0000-4000-8000-000000000000";

        for (id, name) in [(first, "a.dcm"), (second, "b.dcm")] {
            sqlx::query(
                "INSERT INTO dicom_files (id, file_name, file_path, uploaded_at) VALUES (?, ?, ?, ?)",
            )
            .bind(id)
            .bind(name)
            .bind(format!("{name}_x"))
            .bind(uploaded_at)
            .execute(db.pool())
            .await
            .unwrap();
        }

        let listed = DicomFileService::list(&db).await.unwrap();

        assert_eq!(
            listed.iter().map(|f| f.id.as_str()).collect::<Vec<_>>(),
            vec![second, first]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creates_get_distinct_ids() {
        let db = Database::in_memory().await.unwrap();

        let handles = (0..16).map(|i| {
            let db = db.clone();
            tokio::spawn(async move {
                DicomFileService::create(&db, "same.dcm", &format!("same_{i}.dcm")).await
            })
        });
        let ids: HashSet<String> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap().id)
            .collect();

        assert_eq!(ids.len(), 16);
        assert_eq!(DicomFileService::list(&db).await.unwrap().len(), 16);
    }

    #[tokio::test]
    async fn test_list_empty() {
        let db = Database::in_memory().await.unwrap();
        assert!(DicomFileService::list(&db).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_file() {
        let db = Database::in_memory().await.unwrap();
        let file = DicomFileService::create(&db, "a.dcm", "a_1.dcm").await.unwrap();

        let found = DicomFileService::get_file(&db, &file.id).await.unwrap();
        assert_eq!(found.file_path, "a_1.dcm");

        // Uppercase form of the same UUID still resolves
        let found = DicomFileService::get_file(&db, &file.id.to_uppercase())
            .await
            .unwrap();
        assert_eq!(found.id, file.id);
    }

    #[tokio::test]
    async fn test_get_unknown_file_is_not_found() {
        let db = Database::in_memory().await.unwrap();

        for id in [Uuid::new_v4().to_string(), "not-a-uuid".to_string()] {
            let err = DicomFileService::get_file(&db, &id).await.unwrap_err();
            assert!(
                matches!(err, AppError::NotFound { ref title, .. } if title == "File not found"),
                "{id}"
            );
        }
    }
}
