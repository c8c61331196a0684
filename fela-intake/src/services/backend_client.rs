//! Backend REST client
//!
//! Two seams are exposed as traits so that the resolver, suggestion engine
//! and submission pipeline can be driven against in-memory stores:
//! - `ReferenceStore`: list/create for countries, cities, agencies, speakers
//! - `CatalogApi`: events and presentations
//!
//! `HttpBackendClient` implements both over reqwest. Every request carries
//! the session cookie and CSRF token supplied by the auth collaborator.

use crate::error::BackendError;
use crate::models::{
    Coordinates, CreateCompletePayload, CreatedRecord, EventFilters, EventRecord,
    NewPresentation, PresentationFilters, PresentationRecord, ReferenceEntity, ReferenceKind,
};
use async_trait::async_trait;
use fela_common::api::auth::CSRF_HEADER;
use fela_common::api::{AuthProvider, CurrentUser, ListEnvelope};
use fela_common::config::FelaConfig;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Search parameters for a reference listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceQuery {
    pub search: String,
    /// Owning country (cities) or home country (speakers)
    pub country: Option<String>,
}

impl ReferenceQuery {
    pub fn search(text: impl Into<String>) -> Self {
        Self {
            search: text.into(),
            country: None,
        }
    }

    pub fn in_country(mut self, country: Option<&str>) -> Self {
        self.country = country
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        self
    }
}

/// Fields for a lazily created reference record
#[derive(Debug, Clone, PartialEq)]
pub struct NewReference {
    pub kind: ReferenceKind,
    pub name: String,
    pub coordinates: Option<Coordinates>,
    pub country: Option<String>,
    pub agency: Option<String>,
}

impl NewReference {
    pub fn new(kind: ReferenceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            coordinates: None,
            country: None,
            agency: None,
        }
    }

    pub fn with_coordinates(mut self, coordinates: Coordinates) -> Self {
        self.coordinates = Some(coordinates);
        self
    }

    pub fn with_country(mut self, country: Option<&str>) -> Self {
        self.country = country.map(str::to_string);
        self
    }

    pub fn with_agency(mut self, agency: Option<&str>) -> Self {
        self.agency = agency.map(str::to_string);
        self
    }

    /// Request body in the backend's per-table field names
    pub fn body(&self) -> Value {
        let lat = self.coordinates.map(|c| c.lat);
        let lon = self.coordinates.map(|c| c.lon);
        match self.kind {
            ReferenceKind::Country => json!({"country": self.name, "lat": lat, "lon": lon}),
            ReferenceKind::City => {
                json!({"city": self.name, "country": self.country, "lat": lat, "lon": lon})
            }
            ReferenceKind::Agency => json!({"nombre": self.name}),
            ReferenceKind::Speaker => json!({
                "name": self.name,
                "country_s": self.country.clone().unwrap_or_default(),
                "agency_s": self.agency.clone().unwrap_or_default(),
            }),
        }
    }

    /// Entity as sent, used to fill fields the create reply leaves out
    pub fn as_entity(&self) -> ReferenceEntity {
        ReferenceEntity {
            kind: self.kind,
            id: None,
            name: self.name.clone(),
            coordinates: self.coordinates,
            country: self.country.clone(),
            country_coordinates: None,
            agency: self.agency.clone(),
        }
    }
}

/// Backend reference tables (countries, cities, agencies, speakers)
#[async_trait]
pub trait ReferenceStore: Send + Sync {
    /// Search by name (exact or substring match, backend-defined)
    async fn list(
        &self,
        kind: ReferenceKind,
        query: &ReferenceQuery,
    ) -> Result<Vec<ReferenceEntity>, BackendError>;

    /// Create a record; an existing name yields `BackendError::Conflict`
    async fn create(&self, new: &NewReference) -> Result<ReferenceEntity, BackendError>;
}

/// Backend events and presentations
#[async_trait]
pub trait CatalogApi: Send + Sync {
    async fn create_complete(
        &self,
        payload: &CreateCompletePayload,
    ) -> Result<CreatedRecord, BackendError>;

    async fn list_events(&self, filters: &EventFilters) -> Result<Vec<EventRecord>, BackendError>;

    async fn get_event(&self, id: i64) -> Result<EventRecord, BackendError>;

    async fn list_presentations(
        &self,
        filters: &PresentationFilters,
    ) -> Result<Vec<PresentationRecord>, BackendError>;

    async fn search_presentations(
        &self,
        title: &str,
    ) -> Result<Vec<PresentationRecord>, BackendError>;

    async fn get_presentation(&self, id: i64) -> Result<PresentationRecord, BackendError>;

    async fn create_presentation(
        &self,
        new: &NewPresentation,
    ) -> Result<CreatedRecord, BackendError>;

    async fn add_speaker(&self, presentation_id: i64, speaker_id: i64)
        -> Result<(), BackendError>;
}

/// reqwest implementation of the backend collaborator
pub struct HttpBackendClient {
    client: Client,
    /// `backend_url`, for `/auth/user/`
    backend_url: String,
    /// `backend_url` + `api_prefix`
    api_base: String,
    auth: Arc<dyn AuthProvider>,
}

impl HttpBackendClient {
    pub fn new(config: &FelaConfig, auth: Arc<dyn AuthProvider>) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(5))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| BackendError::Network(format!("Failed to build HTTP client: {}", e)))?;

        let backend_url = config.backend_url.trim_end_matches('/').to_string();
        let api_base = format!("{}/{}", backend_url, config.api_prefix.trim_matches('/'))
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client,
            backend_url,
            api_base,
            auth,
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let credentials = self.auth.credentials();
        let mut builder = self
            .client
            .request(method, url)
            .header(CSRF_HEADER, credentials.csrf_header());
        if let Some(cookie) = credentials.cookie_header() {
            builder = builder.header(reqwest::header::COOKIE, cookie);
        }
        builder
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, BackendError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let err = BackendError::classify(status.as_u16(), &body);
        warn!(status = status.as_u16(), error = %err, "Backend request failed");
        Err(err)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T, BackendError> {
        let response = self.send(builder).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))
    }

    async fn get_list<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, BackendError> {
        let url = self.api_url(path);
        debug!(url = %url, ?query, "GET list");
        let envelope: ListEnvelope<T> = self
            .send_json(self.request(Method::GET, &url).query(query))
            .await?;
        Ok(envelope.into_vec())
    }

    /// `GET /auth/user/`; `None` when nobody is signed in
    pub async fn current_user(&self) -> Result<Option<CurrentUser>, BackendError> {
        let url = format!("{}/auth/user/", self.backend_url);
        match self.send_json(self.request(Method::GET, &url)).await {
            Ok(user) => Ok(Some(user)),
            Err(BackendError::Unauthorized(_)) | Err(BackendError::Forbidden { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl ReferenceStore for HttpBackendClient {
    async fn list(
        &self,
        kind: ReferenceKind,
        query: &ReferenceQuery,
    ) -> Result<Vec<ReferenceEntity>, BackendError> {
        let mut params = vec![("search", query.search.trim().to_string())];
        if let Some(country) = &query.country {
            params.push(("country", country.clone()));
        }
        let rows: Vec<Value> = self
            .get_list(&format!("{}/", kind.collection()), &params)
            .await?;
        Ok(rows
            .iter()
            .filter_map(|row| ReferenceEntity::from_backend(kind, row))
            .collect())
    }

    async fn create(&self, new: &NewReference) -> Result<ReferenceEntity, BackendError> {
        let url = self.api_url(&format!("{}/", new.kind.collection()));
        debug!(kind = %new.kind, name = %new.name, "POST reference");
        let reply: Value = self
            .send_json(self.request(Method::POST, &url).json(&new.body()))
            .await?;
        Ok(merge_created(new, &reply))
    }
}

/// Combine the create reply with what was sent; the reply wins where present
fn merge_created(new: &NewReference, reply: &Value) -> ReferenceEntity {
    let sent = new.as_entity();
    match ReferenceEntity::from_backend(new.kind, reply) {
        Some(parsed) => ReferenceEntity {
            coordinates: parsed.coordinates.or(sent.coordinates),
            country: parsed.country.or(sent.country),
            agency: parsed.agency.or(sent.agency),
            ..parsed
        },
        None => ReferenceEntity {
            id: reply.get("id").and_then(crate::models::reference::parse_id),
            ..sent
        },
    }
}

#[async_trait]
impl CatalogApi for HttpBackendClient {
    async fn create_complete(
        &self,
        payload: &CreateCompletePayload,
    ) -> Result<CreatedRecord, BackendError> {
        let url = self.api_url("events/create-complete/");
        self.send_json(self.request(Method::POST, &url).json(payload))
            .await
    }

    async fn list_events(&self, filters: &EventFilters) -> Result<Vec<EventRecord>, BackendError> {
        self.get_list("events/", &filters.query_pairs()).await
    }

    async fn get_event(&self, id: i64) -> Result<EventRecord, BackendError> {
        let url = self.api_url(&format!("events/{}/", id));
        self.send_json(self.request(Method::GET, &url)).await
    }

    async fn list_presentations(
        &self,
        filters: &PresentationFilters,
    ) -> Result<Vec<PresentationRecord>, BackendError> {
        self.get_list("presentations/", &filters.query_pairs()).await
    }

    async fn search_presentations(
        &self,
        title: &str,
    ) -> Result<Vec<PresentationRecord>, BackendError> {
        self.get_list("presentations/search/", &[("title", title.trim().to_string())])
            .await
    }

    async fn get_presentation(&self, id: i64) -> Result<PresentationRecord, BackendError> {
        let url = self.api_url(&format!("presentations/{}/", id));
        self.send_json(self.request(Method::GET, &url)).await
    }

    async fn create_presentation(
        &self,
        new: &NewPresentation,
    ) -> Result<CreatedRecord, BackendError> {
        let url = self.api_url("presentations/");
        self.send_json(self.request(Method::POST, &url).json(new))
            .await
    }

    async fn add_speaker(
        &self,
        presentation_id: i64,
        speaker_id: i64,
    ) -> Result<(), BackendError> {
        let url = self.api_url("presentation-speakers/");
        let body = json!({"presentation_id": presentation_id, "speaker_id": speaker_id});
        self.send(self.request(Method::POST, &url).json(&body))
            .await
            .map(|_| ())
    }
}
