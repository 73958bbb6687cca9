//! Schema Registry REST client
//!
//! Only the two calls a registration run needs: registering a schema under a
//! subject and looking up the latest version of a subject. Requests are
//! blocking; a run is strictly sequential.

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::RegistryTarget;
use crate::error::{RegistrarError, Result};
use crate::schema::{SchemaFormat, SchemaReference};

const REGISTRY_CONTENT_TYPE: &str = "application/vnd.schemaregistry.v1+json";
const REGISTRY_ACCEPT: &str = "application/vnd.schemaregistry.v1+json, application/json";

/// Body of `POST /subjects/{subject}/versions`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub schema_type: SchemaFormat,
    pub schema: String,
    pub references: Vec<SchemaReference>,
}

/// Successful registration response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RegisteredSchema {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub version: Option<i32>,
}

/// Response of `GET /subjects/{subject}/versions/latest`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectVersion {
    pub subject: String,
    pub version: i32,
    #[serde(default)]
    pub id: Option<i64>,
}

/// Error body returned by the registry
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

/// Operations the registrar needs from a registry
pub trait SchemaRegistryApi {
    /// Register `request` under `subject`, returning the assigned id
    fn register(&self, subject: &str, request: &RegisterRequest) -> Result<RegisteredSchema>;

    /// Latest registered version of `subject`
    fn latest_version(&self, subject: &str) -> Result<SubjectVersion>;

    /// Base URL used for every call
    fn base_url(&self) -> &str;
}

/// Blocking HTTP implementation of [`SchemaRegistryApi`]
pub struct HttpRegistryClient {
    client: Client,
    target: RegistryTarget,
}

impl HttpRegistryClient {
    /// Build a client with the target's timeout applied to every request
    pub fn new(target: RegistryTarget) -> Result<Self> {
        let client = Client::builder()
            .timeout(target.timeout)
            .build()
            .map_err(|e| RegistrarError::invalid(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self { client, target })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.target.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RegistrarError::invalid(format!("registry URL {} cannot be a base", self.target.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.target.credentials {
            Some(creds) => request.basic_auth(&creds.username, creds.password.as_ref()),
            None => request,
        }
    }

    fn unreachable(&self, cause: impl Into<String>) -> RegistrarError {
        RegistrarError::RegistryUnreachable {
            url: self.target.base_url.to_string(),
            cause: cause.into(),
        }
    }

    fn send(&self, request: RequestBuilder) -> Result<Response> {
        self.authorize(request)
            .header(ACCEPT, REGISTRY_ACCEPT)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    self.unreachable(format!("request timed out after {:?}", self.target.timeout))
                } else {
                    self.unreachable(e.to_string())
                }
            })
    }

    fn read<T: DeserializeOwned>(&self, subject: &str, response: Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            // The registry answered, so an undecodable body is not a connectivity problem.
            return response.json::<T>().map_err(|e| RegistrarError::RegistrationRejected {
                subject: subject.to_string(),
                status: status.as_u16(),
                error_code: i64::from(status.as_u16()),
                message: format!("unexpected response body: {}", e),
            });
        }

        let text = response.text().unwrap_or_default();
        let body: Option<ErrorBody> = serde_json::from_str(&text).ok();
        let (error_code, message) = match body {
            Some(body) => (
                body.error_code.unwrap_or_else(|| i64::from(status.as_u16())),
                body.message.unwrap_or_else(|| text.clone()),
            ),
            None => (i64::from(status.as_u16()), text),
        };

        if status.is_server_error() {
            return Err(self.unreachable(format!("server error {}: {}", status, message)));
        }

        Err(RegistrarError::RegistrationRejected {
            subject: subject.to_string(),
            status: status.as_u16(),
            error_code,
            message,
        })
    }
}

impl SchemaRegistryApi for HttpRegistryClient {
    fn register(&self, subject: &str, request: &RegisterRequest) -> Result<RegisteredSchema> {
        let url = self.endpoint(&["subjects", subject, "versions"])?;
        let body = serde_json::to_vec(request)?;
        tracing::debug!(%url, subject, references = request.references.len(), "registering schema");

        let response = self.send(
            self.client
                .post(url)
                .header(CONTENT_TYPE, REGISTRY_CONTENT_TYPE)
                .body(body),
        )?;
        self.read(subject, response)
    }

    fn latest_version(&self, subject: &str) -> Result<SubjectVersion> {
        let url = self.endpoint(&["subjects", subject, "versions", "latest"])?;
        tracing::debug!(%url, subject, "looking up latest version");

        let response = self.send(self.client.get(url))?;
        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(subject, "subject not found");
        }
        self.read(subject, response)
    }

    fn base_url(&self) -> &str {
        self.target.base_url.as_str()
    }
}
