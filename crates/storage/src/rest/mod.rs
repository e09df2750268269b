//! PostgREST-compatible HTTP backend.
//!
//! Tables are addressed as `{base_url}/rest/v1/{table}` and filtered with the
//! `column=eq.value` query syntax. Every request carries the project key and,
//! when signed in, the user's bearer token so row-level security applies.

use async_trait::async_trait;
use gradtrack_core::model::{
    Application, ApplicationId, ApplicationPatch, ImportantDate, ImportantDateDraft,
    ImportantDateId, Recommender, RecommenderDraft, RecommenderId, Requirement, RequirementDraft,
    RequirementId, UserId, sort_dates,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::repository::{
    ApplicationRepository, ImportantDateRepository, NewApplicationRecord, RecommenderRepository,
    RequirementRepository, Storage, StorageError,
};

const APPLICATIONS: &str = "applications";
const REQUIREMENTS: &str = "requirements";
const RECOMMENDERS: &str = "recommenders";
const IMPORTANT_DATES: &str = "important_dates";

/// Connection settings for a hosted PostgREST endpoint.
#[derive(Debug, Clone)]
pub struct RestConfig {
    pub base_url: String,
    pub api_key: String,
    pub access_token: Option<String>,
}

impl RestConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            access_token: None,
        }
    }

    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }
}

#[derive(Clone)]
pub struct RestRepository {
    client: Client,
    config: RestConfig,
}

#[derive(Deserialize)]
struct IdRow {
    id: u64,
}

impl RestRepository {
    #[must_use]
    pub fn new(config: RestConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!(
            "{}/rest/v1/{table}",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        let bearer = self
            .config
            .access_token
            .as_deref()
            .unwrap_or(&self.config.api_key);
        builder
            .header("apikey", &self.config.api_key)
            .bearer_auth(bearer)
    }

    async fn send(&self, table: &str, builder: RequestBuilder) -> Result<Response, StorageError> {
        let response = self
            .authorize(builder)
            .send()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            debug!(table, %status, "rest request ok");
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        warn!(table, %status, body = %body, "rest request failed");
        Err(status_error(status, body))
    }

    async fn fetch_rows<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(&str, String)],
        order: &str,
    ) -> Result<Vec<T>, StorageError> {
        let mut query: Vec<(&str, String)> = vec![("select", "*".to_owned())];
        query.extend(filters.iter().cloned());
        query.push(("order", order.to_owned()));
        let response = self
            .send(table, self.client.get(self.table_url(table)).query(&query))
            .await?;
        response
            .json::<Vec<T>>()
            .await
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }

    async fn insert_row(&self, table: &str, body: Value) -> Result<u64, StorageError> {
        let builder = self
            .client
            .post(self.table_url(table))
            .query(&[("select", "id")])
            .header("Prefer", "return=representation")
            .json(&body);
        let rows: Vec<IdRow> = self
            .send(table, builder)
            .await?
            .json()
            .await
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        rows.first()
            .map(|row| row.id)
            .ok_or_else(|| StorageError::Serialization(format!("{table} insert returned no row")))
    }

    /// PATCH or DELETE scoped by `filters`; an empty representation means no row matched.
    async fn mutate_rows(
        &self,
        table: &str,
        builder: RequestBuilder,
        filters: &[(&str, String)],
    ) -> Result<(), StorageError> {
        let builder = builder
            .query(filters)
            .query(&[("select", "id")])
            .header("Prefer", "return=representation");
        let rows: Vec<IdRow> = self
            .send(table, builder)
            .await?
            .json()
            .await
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        if rows.is_empty() {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn update_rows(
        &self,
        table: &str,
        filters: &[(&str, String)],
        body: Value,
    ) -> Result<(), StorageError> {
        let builder = self.client.patch(self.table_url(table)).json(&body);
        self.mutate_rows(table, builder, filters).await
    }

    async fn delete_rows(&self, table: &str, filters: &[(&str, String)]) -> Result<(), StorageError> {
        let builder = self.client.delete(self.table_url(table));
        self.mutate_rows(table, builder, filters).await
    }
}

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}

fn scoped(application_id: ApplicationId, id: u64) -> [(&'static str, String); 2] {
    [("id", eq(id)), ("application_id", eq(application_id))]
}

fn status_error(status: StatusCode, body: String) -> StorageError {
    match status {
        StatusCode::NOT_FOUND => StorageError::NotFound,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StorageError::Forbidden,
        StatusCode::CONFLICT => StorageError::Conflict,
        // Postgres code 23503 is a foreign key violation: the parent row is gone.
        StatusCode::BAD_REQUEST if body.contains("23503") => StorageError::NotFound,
        other => StorageError::Connection(format!("http {other}: {body}")),
    }
}

fn ser<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn application_body(record: &NewApplicationRecord) -> Value {
    json!({
        "user_id": record.user_id.to_string(),
        "university": record.university,
        "program": record.program,
        "country": record.country,
        "degree": record.degree.as_str(),
        "program_link": record.program_link,
        "portal_link": record.portal_link,
        "status": record.status.as_str(),
        "funding": record.funding.as_str(),
        "progress": i64::from(record.progress),
        "created_at": record.created_at,
    })
}

fn patch_body(patch: &ApplicationPatch) -> Value {
    let mut body = Map::new();
    if let Some(v) = &patch.university {
        body.insert("university".into(), json!(v));
    }
    if let Some(v) = &patch.program {
        body.insert("program".into(), json!(v));
    }
    if let Some(v) = &patch.country {
        body.insert("country".into(), json!(v));
    }
    if let Some(v) = patch.degree {
        body.insert("degree".into(), json!(v.as_str()));
    }
    if let Some(v) = &patch.program_link {
        body.insert("program_link".into(), json!(v));
    }
    if let Some(v) = &patch.portal_link {
        body.insert("portal_link".into(), json!(v));
    }
    if let Some(v) = patch.status {
        body.insert("status".into(), json!(v.as_str()));
    }
    if let Some(v) = patch.funding {
        body.insert("funding".into(), json!(v.as_str()));
    }
    if let Some(v) = patch.progress {
        body.insert("progress".into(), json!(i64::from(v)));
    }
    Value::Object(body)
}

fn requirement_body(application_id: ApplicationId, draft: &RequirementDraft) -> Value {
    let d = &draft.details;
    json!({
        "application_id": application_id,
        "name": draft.name,
        "completed": draft.completed,
        "criteria_type": d.criteria_type,
        "criteria_value": d.criteria_value,
        "min_score": d.min_score,
        "waived": d.waived,
        "conversion_notes": d.conversion_notes,
        "num_recommenders": d.num_recommenders,
    })
}

fn recommender_body(application_id: ApplicationId, draft: &RecommenderDraft) -> Value {
    json!({
        "application_id": application_id,
        "name": draft.name,
        "email": draft.email,
        "kind": draft.kind.as_str(),
        "status": draft.status.as_str(),
    })
}

#[async_trait]
impl ApplicationRepository for RestRepository {
    async fn insert_application(
        &self,
        record: NewApplicationRecord,
    ) -> Result<ApplicationId, StorageError> {
        let id = self
            .insert_row(APPLICATIONS, application_body(&record))
            .await?;
        Ok(ApplicationId::new(id))
    }

    async fn get_application(
        &self,
        id: ApplicationId,
    ) -> Result<Option<Application>, StorageError> {
        let mut rows: Vec<Application> = self
            .fetch_rows(APPLICATIONS, &[("id", eq(id))], "id.asc")
            .await?;
        Ok(rows.pop())
    }

    async fn list_applications(&self, user_id: UserId) -> Result<Vec<Application>, StorageError> {
        self.fetch_rows(
            APPLICATIONS,
            &[("user_id", eq(user_id))],
            "created_at.desc,id.desc",
        )
        .await
    }

    async fn update_application(
        &self,
        id: ApplicationId,
        patch: &ApplicationPatch,
    ) -> Result<(), StorageError> {
        if patch.is_empty() {
            return self
                .get_application(id)
                .await?
                .map(|_| ())
                .ok_or(StorageError::NotFound);
        }
        self.update_rows(APPLICATIONS, &[("id", eq(id))], patch_body(patch))
            .await
    }

    async fn delete_application(&self, id: ApplicationId) -> Result<(), StorageError> {
        self.delete_rows(APPLICATIONS, &[("id", eq(id))]).await
    }
}

#[async_trait]
impl RequirementRepository for RestRepository {
    async fn list_requirements(
        &self,
        application_id: ApplicationId,
    ) -> Result<Vec<Requirement>, StorageError> {
        self.fetch_rows(
            REQUIREMENTS,
            &[("application_id", eq(application_id))],
            "id.asc",
        )
        .await
    }

    async fn insert_requirement(
        &self,
        application_id: ApplicationId,
        draft: &RequirementDraft,
    ) -> Result<RequirementId, StorageError> {
        let id = self
            .insert_row(REQUIREMENTS, requirement_body(application_id, draft))
            .await?;
        Ok(RequirementId::new(id))
    }

    async fn update_requirement(&self, requirement: &Requirement) -> Result<(), StorageError> {
        let mut body = serde_json::to_value(requirement).map_err(ser)?;
        if let Value::Object(map) = &mut body {
            map.remove("id");
        }
        let filters = scoped(requirement.application_id, requirement.id.value());
        self.update_rows(REQUIREMENTS, &filters, body).await
    }

    async fn delete_requirement(
        &self,
        application_id: ApplicationId,
        id: RequirementId,
    ) -> Result<(), StorageError> {
        self.delete_rows(REQUIREMENTS, &scoped(application_id, id.value()))
            .await
    }
}

#[async_trait]
impl RecommenderRepository for RestRepository {
    async fn list_recommenders(
        &self,
        application_id: ApplicationId,
    ) -> Result<Vec<Recommender>, StorageError> {
        self.fetch_rows(
            RECOMMENDERS,
            &[("application_id", eq(application_id))],
            "id.asc",
        )
        .await
    }

    async fn insert_recommender(
        &self,
        application_id: ApplicationId,
        draft: &RecommenderDraft,
    ) -> Result<RecommenderId, StorageError> {
        let id = self
            .insert_row(RECOMMENDERS, recommender_body(application_id, draft))
            .await?;
        Ok(RecommenderId::new(id))
    }

    async fn update_recommender(&self, recommender: &Recommender) -> Result<(), StorageError> {
        let body = json!({
            "name": recommender.name,
            "email": recommender.email,
            "kind": recommender.kind.as_str(),
            "status": recommender.status.as_str(),
        });
        let filters = scoped(recommender.application_id, recommender.id.value());
        self.update_rows(RECOMMENDERS, &filters, body).await
    }

    async fn delete_recommender(
        &self,
        application_id: ApplicationId,
        id: RecommenderId,
    ) -> Result<(), StorageError> {
        self.delete_rows(RECOMMENDERS, &scoped(application_id, id.value()))
            .await
    }
}

#[async_trait]
impl ImportantDateRepository for RestRepository {
    async fn list_important_dates(
        &self,
        application_id: ApplicationId,
    ) -> Result<Vec<ImportantDate>, StorageError> {
        let mut dates: Vec<ImportantDate> = self
            .fetch_rows(
                IMPORTANT_DATES,
                &[("application_id", eq(application_id))],
                "date.asc",
            )
            .await?;
        sort_dates(&mut dates);
        Ok(dates)
    }

    async fn insert_important_date(
        &self,
        application_id: ApplicationId,
        draft: &ImportantDateDraft,
    ) -> Result<ImportantDateId, StorageError> {
        let body = json!({
            "application_id": application_id,
            "name": draft.name,
            "date": draft.date,
        });
        let id = self.insert_row(IMPORTANT_DATES, body).await?;
        Ok(ImportantDateId::new(id))
    }

    async fn update_important_date(&self, date: &ImportantDate) -> Result<(), StorageError> {
        let body = json!({ "name": date.name, "date": date.date });
        let filters = scoped(date.application_id, date.id.value());
        self.update_rows(IMPORTANT_DATES, &filters, body).await
    }

    async fn delete_important_date(
        &self,
        application_id: ApplicationId,
        id: ImportantDateId,
    ) -> Result<(), StorageError> {
        self.delete_rows(IMPORTANT_DATES, &scoped(application_id, id.value()))
            .await
    }
}

impl Storage {
    /// Build a `Storage` that talks to a PostgREST endpoint.
    #[must_use]
    pub fn rest(config: RestConfig) -> Self {
        Self::from_repository(RestRepository::new(config))
    }
}
