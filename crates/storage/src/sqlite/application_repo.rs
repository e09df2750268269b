use gradtrack_core::model::{Application, ApplicationId, ApplicationPatch, UserId};
use sqlx::{QueryBuilder, Sqlite};

use super::SqliteRepository;
use super::mapping::{conn, id_to_i64, map_application_row};
use crate::repository::{ApplicationRepository, NewApplicationRecord, StorageError};

const APPLICATION_COLUMNS: &str = "id, user_id, university, program, country, degree, \
     program_link, portal_link, status, funding, progress, created_at";

#[async_trait::async_trait]
impl ApplicationRepository for SqliteRepository {
    async fn insert_application(
        &self,
        record: NewApplicationRecord,
    ) -> Result<ApplicationId, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO applications (
                user_id, university, program, country, degree, program_link, portal_link,
                status, funding, progress, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ",
        )
        .bind(record.user_id.to_string())
        .bind(record.university)
        .bind(record.program)
        .bind(record.country)
        .bind(record.degree.as_str())
        .bind(record.program_link)
        .bind(record.portal_link)
        .bind(record.status.as_str())
        .bind(record.funding.as_str())
        .bind(i64::from(record.progress))
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        let id = u64::try_from(res.last_insert_rowid())
            .map_err(|_| StorageError::Serialization("application id sign overflow".into()))?;
        Ok(ApplicationId::new(id))
    }

    async fn get_application(
        &self,
        id: ApplicationId,
    ) -> Result<Option<Application>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications WHERE id = ?1"
        ))
        .bind(id_to_i64("application_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_application_row).transpose()
    }

    async fn list_applications(&self, user_id: UserId) -> Result<Vec<Application>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications \
             WHERE user_id = ?1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_application_row).collect()
    }

    async fn update_application(
        &self,
        id: ApplicationId,
        patch: &ApplicationPatch,
    ) -> Result<(), StorageError> {
        let id = id_to_i64("application_id", id.value())?;
        if patch.is_empty() {
            let exists = sqlx::query("SELECT 1 FROM applications WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(conn)?;
            return exists.map(|_| ()).ok_or(StorageError::NotFound);
        }

        let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new("UPDATE applications SET ");
        {
            let mut set = qb.separated(", ");
            if let Some(v) = &patch.university {
                set.push("university = ").push_bind_unseparated(v.clone());
            }
            if let Some(v) = &patch.program {
                set.push("program = ").push_bind_unseparated(v.clone());
            }
            if let Some(v) = &patch.country {
                set.push("country = ").push_bind_unseparated(v.clone());
            }
            if let Some(v) = patch.degree {
                set.push("degree = ").push_bind_unseparated(v.as_str());
            }
            if let Some(v) = &patch.program_link {
                set.push("program_link = ").push_bind_unseparated(v.clone());
            }
            if let Some(v) = &patch.portal_link {
                set.push("portal_link = ").push_bind_unseparated(v.clone());
            }
            if let Some(v) = patch.status {
                set.push("status = ").push_bind_unseparated(v.as_str());
            }
            if let Some(v) = patch.funding {
                set.push("funding = ").push_bind_unseparated(v.as_str());
            }
            if let Some(v) = patch.progress {
                set.push("progress = ").push_bind_unseparated(i64::from(v));
            }
        }
        qb.push(" WHERE id = ").push_bind(id);

        let res = qb.build().execute(&self.pool).await.map_err(conn)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn delete_application(&self, id: ApplicationId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM applications WHERE id = ?1")
            .bind(id_to_i64("application_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
