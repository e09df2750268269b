use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use gradtrack_core::model::{
    Application, ApplicationId, ImportantDate, ImportantDateId, Progress, Recommender,
    RecommenderId, Requirement, RequirementDetails, RequirementId, RequirementName, UserId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

/// Inserting a child row under a missing application trips the foreign key.
pub(crate) fn child_insert_error(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => StorageError::NotFound,
        _ => conn(e),
    }
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn id_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn parse_column<T>(row: &SqliteRow, column: &'static str) -> Result<T, StorageError>
where
    T: FromStr,
    T::Err: core::fmt::Display,
{
    let raw: String = row.try_get(column).map_err(ser)?;
    raw.parse::<T>()
        .map_err(|e| StorageError::Serialization(format!("invalid {column}: {e}")))
}

pub(crate) fn map_application_row(row: &SqliteRow) -> Result<Application, StorageError> {
    let id = ApplicationId::new(i64_to_u64("id", row.try_get("id").map_err(ser)?)?);
    let user_id: UserId = parse_column(row, "user_id")?;
    let progress = Progress::new(row.try_get::<i64, _>("progress").map_err(ser)?).map_err(ser)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(ser)?;

    Ok(Application::from_persisted(
        id,
        user_id,
        row.try_get("university").map_err(ser)?,
        row.try_get("program").map_err(ser)?,
        row.try_get("country").map_err(ser)?,
        parse_column(row, "degree")?,
        row.try_get("program_link").map_err(ser)?,
        row.try_get("portal_link").map_err(ser)?,
        parse_column(row, "status")?,
        parse_column(row, "funding")?,
        progress,
        created_at,
    ))
}

pub(crate) fn map_requirement_row(row: &SqliteRow) -> Result<Requirement, StorageError> {
    let num_recommenders = row
        .try_get::<Option<i64>, _>("num_recommenders")
        .map_err(ser)?
        .map(|v| {
            u32::try_from(v)
                .map_err(|_| StorageError::Serialization(format!("invalid num_recommenders: {v}")))
        })
        .transpose()?;

    Ok(Requirement {
        id: RequirementId::new(i64_to_u64("id", row.try_get("id").map_err(ser)?)?),
        application_id: ApplicationId::new(i64_to_u64(
            "application_id",
            row.try_get("application_id").map_err(ser)?,
        )?),
        name: RequirementName::new(row.try_get::<String, _>("name").map_err(ser)?)
            .map_err(ser)?,
        completed: row.try_get::<i64, _>("completed").map_err(ser)? != 0,
        details: RequirementDetails {
            criteria_type: row.try_get("criteria_type").map_err(ser)?,
            criteria_value: row.try_get("criteria_value").map_err(ser)?,
            min_score: row.try_get("min_score").map_err(ser)?,
            waived: row.try_get::<i64, _>("waived").map_err(ser)? != 0,
            conversion_notes: row.try_get("conversion_notes").map_err(ser)?,
            num_recommenders,
        },
    })
}

pub(crate) fn map_recommender_row(row: &SqliteRow) -> Result<Recommender, StorageError> {
    Ok(Recommender {
        id: RecommenderId::new(i64_to_u64("id", row.try_get("id").map_err(ser)?)?),
        application_id: ApplicationId::new(i64_to_u64(
            "application_id",
            row.try_get("application_id").map_err(ser)?,
        )?),
        name: row.try_get("name").map_err(ser)?,
        email: row.try_get("email").map_err(ser)?,
        kind: parse_column(row, "kind")?,
        status: parse_column(row, "status")?,
    })
}

pub(crate) fn map_important_date_row(row: &SqliteRow) -> Result<ImportantDate, StorageError> {
    let date: NaiveDate = row.try_get("date").map_err(ser)?;
    Ok(ImportantDate {
        id: ImportantDateId::new(i64_to_u64("id", row.try_get("id").map_err(ser)?)?),
        application_id: ApplicationId::new(i64_to_u64(
            "application_id",
            row.try_get("application_id").map_err(ser)?,
        )?),
        name: row.try_get("name").map_err(ser)?,
        date,
    })
}
