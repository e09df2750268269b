use gradtrack_core::model::{ApplicationId, Recommender, RecommenderDraft, RecommenderId};

use super::SqliteRepository;
use super::mapping::{child_insert_error, conn, id_to_i64, map_recommender_row};
use crate::repository::{RecommenderRepository, StorageError};

#[async_trait::async_trait]
impl RecommenderRepository for SqliteRepository {
    async fn list_recommenders(
        &self,
        application_id: ApplicationId,
    ) -> Result<Vec<Recommender>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, application_id, name, email, kind, status
            FROM recommenders
            WHERE application_id = ?1
            ORDER BY id ASC
            ",
        )
        .bind(id_to_i64("application_id", application_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_recommender_row).collect()
    }

    async fn insert_recommender(
        &self,
        application_id: ApplicationId,
        draft: &RecommenderDraft,
    ) -> Result<RecommenderId, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO recommenders (application_id, name, email, kind, status)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(id_to_i64("application_id", application_id.value())?)
        .bind(draft.name.as_str())
        .bind(draft.email.as_deref())
        .bind(draft.kind.as_str())
        .bind(draft.status.as_str())
        .execute(&self.pool)
        .await
        .map_err(child_insert_error)?;

        let id = u64::try_from(res.last_insert_rowid())
            .map_err(|_| StorageError::Serialization("recommender id sign overflow".into()))?;
        Ok(RecommenderId::new(id))
    }

    async fn update_recommender(&self, recommender: &Recommender) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            UPDATE recommenders
            SET name = ?3, email = ?4, kind = ?5, status = ?6
            WHERE id = ?1 AND application_id = ?2
            ",
        )
        .bind(id_to_i64("recommender_id", recommender.id.value())?)
        .bind(id_to_i64("application_id", recommender.application_id.value())?)
        .bind(recommender.name.as_str())
        .bind(recommender.email.as_deref())
        .bind(recommender.kind.as_str())
        .bind(recommender.status.as_str())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn delete_recommender(
        &self,
        application_id: ApplicationId,
        id: RecommenderId,
    ) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM recommenders WHERE id = ?1 AND application_id = ?2")
            .bind(id_to_i64("recommender_id", id.value())?)
            .bind(id_to_i64("application_id", application_id.value())?)
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
