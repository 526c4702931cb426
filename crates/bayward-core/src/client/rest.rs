//! HTTP implementation of [`ProfileService`]
//!
//! Requests run on a private tokio runtime so callers stay synchronous.
//! Writes return an asynchronous task; the client polls it until the
//! appliance reports a final state and then reads the affected resource.

use std::time::{Duration, Instant};

use anyhow::Context;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde_json::{Value, json};
use tracing::debug;
use url::Url;

use super::{
    AvailableTarget, PowerRequest, ProfileService, RemoteError, ResourceKind, TargetQuery,
};
use crate::config::ApplianceConfig;
use crate::document::ProfileDocument;

const SERVER_PROFILES: &str = "/rest/server-profiles";
const SERVER_HARDWARE: &str = "/rest/server-hardware";
const SERVER_PROFILE_TEMPLATES: &str = "/rest/server-profile-templates";

const TASK_POLL_INTERVAL: Duration = Duration::from_secs(2);
const TASK_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Talks to a management appliance over its REST API.
pub struct RestProfileService {
    runtime: tokio::runtime::Runtime,
    http: reqwest::Client,
    base: Url,
    api_version: u32,
    session_token: String,
}

impl RestProfileService {
    /// Build a client from the `[appliance]` settings.
    pub fn connect(appliance: &ApplianceConfig) -> anyhow::Result<Self> {
        let base = appliance.base_url()?;
        let session_token = appliance.session_token()?;

        let runtime = tokio::runtime::Runtime::new()
            .map_err(|e| anyhow::anyhow!("Failed to create tokio runtime: {}", e))?;

        let http = reqwest::Client::builder()
            .user_agent(concat!("bayward/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            runtime,
            http,
            base,
            api_version: appliance.api_version,
            session_token,
        })
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, RemoteError> {
        let url = self
            .base
            .join(path)
            .map_err(|e| RemoteError::Transport(format!("invalid resource path '{path}': {e}")))?;

        Ok(self
            .http
            .request(method, url)
            .header("X-API-Version", self.api_version.to_string())
            .header("Auth", &self.session_token))
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, RemoteError> {
        let response = builder
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        Err(api_error(status, &body))
    }

    async fn get_value(&self, path: &str, query: &[(&str, String)]) -> Result<Value, RemoteError> {
        debug!(path, "GET");
        let response = self
            .send(self.request(Method::GET, path)?.query(query))
            .await?;
        response
            .json()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }

    async fn get_document(&self, path: &str) -> Result<ProfileDocument, RemoteError> {
        into_document(self.get_value(path, &[]).await?)
    }

    async fn first_by_name(
        &self,
        collection: &str,
        name: &str,
    ) -> Result<Option<ProfileDocument>, RemoteError> {
        let page = self
            .get_value(collection, &[("filter", name_filter(name))])
            .await?;

        match page.get("members").and_then(Value::as_array) {
            Some(members) => members.first().cloned().map(into_document).transpose(),
            None => Ok(None),
        }
    }

    /// Sends a write and waits for its task.
    ///
    /// Returns the affected resource when the task names one.
    async fn write(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Option<ProfileDocument>, RemoteError> {
        debug!(%method, path, "Write");
        let mut builder = self.request(method, path)?;
        if let Some(body) = body {
            builder = builder.json(&body);
        }

        let response = self.send(builder).await?;
        let status = response.status();
        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body: Value = response.json().await.unwrap_or(Value::Null);

        let task = match (is_task(&body), location) {
            (true, _) => body,
            (false, Some(location)) if status == StatusCode::ACCEPTED => {
                self.get_value(&location, &[]).await?
            }
            _ => {
                return match body {
                    Value::Object(document) => Ok(Some(document)),
                    _ => Ok(None),
                };
            }
        };

        let finished = self.wait_for_task(task).await?;
        match finished
            .pointer("/associatedResource/resourceUri")
            .and_then(Value::as_str)
            .filter(|uri| !uri.is_empty())
        {
            Some(uri) if reads_back_resource(&finished) => {
                Ok(Some(self.get_document(uri).await?))
            }
            _ => Ok(None),
        }
    }

    async fn wait_for_task(&self, mut task: Value) -> Result<Value, RemoteError> {
        let started = Instant::now();

        loop {
            match task.get("taskState").and_then(Value::as_str) {
                Some("Completed") | Some("Warning") => return Ok(task),
                Some("Error") | Some("Terminated") | Some("Killed") => {
                    return Err(task_error(&task));
                }
                _ => {}
            }

            if started.elapsed() > TASK_TIMEOUT {
                return Err(RemoteError::Transport(
                    "Timed out waiting for appliance task".to_string(),
                ));
            }

            let task_uri = task
                .get("uri")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| RemoteError::Decode("task without uri".to_string()))?;

            tokio::time::sleep(TASK_POLL_INTERVAL).await;
            task = self.get_value(&task_uri, &[]).await?;
        }
    }
}

impl ProfileService for RestProfileService {
    fn profile_by_name(&self, name: &str) -> Result<Option<ProfileDocument>, RemoteError> {
        self.runtime
            .block_on(self.first_by_name(SERVER_PROFILES, name))
    }

    fn available_targets(&self, query: &TargetQuery) -> Result<Vec<AvailableTarget>, RemoteError> {
        let mut params = Vec::new();
        if let Some(uri) = &query.server_hardware_type_uri {
            params.push(("serverHardwareTypeUri", uri.clone()));
        }
        if let Some(uri) = &query.enclosure_group_uri {
            params.push(("enclosureGroupUri", uri.clone()));
        }

        let path = format!("{SERVER_PROFILES}/available-targets");
        let page = self.runtime.block_on(self.get_value(&path, &params))?;
        let targets = page.get("targets").cloned().unwrap_or(Value::Array(Vec::new()));
        serde_json::from_value(targets).map_err(|e| RemoteError::Decode(e.to_string()))
    }

    fn hardware_by_name(&self, name: &str) -> Result<Option<ProfileDocument>, RemoteError> {
        self.runtime
            .block_on(self.first_by_name(SERVER_HARDWARE, name))
    }

    fn hardware_by_uri(&self, uri: &str) -> Result<ProfileDocument, RemoteError> {
        self.runtime.block_on(self.get_document(uri))
    }

    fn template_by_name(&self, name: &str) -> Result<Option<ProfileDocument>, RemoteError> {
        self.runtime
            .block_on(self.first_by_name(SERVER_PROFILE_TEMPLATES, name))
    }

    fn template_by_uri(&self, uri: &str) -> Result<ProfileDocument, RemoteError> {
        self.runtime.block_on(self.get_document(uri))
    }

    fn new_profile_from_template(
        &self,
        template_uri: &str,
    ) -> Result<ProfileDocument, RemoteError> {
        let path = format!("{template_uri}/new-profile");
        self.runtime.block_on(self.get_document(&path))
    }

    fn find_uri_by_name(
        &self,
        kind: ResourceKind,
        name: &str,
    ) -> Result<Option<String>, RemoteError> {
        let found = self
            .runtime
            .block_on(self.first_by_name(kind.collection(), name))?;
        Ok(found.and_then(|resource| {
            resource
                .get("uri")
                .and_then(Value::as_str)
                .map(str::to_string)
        }))
    }

    fn create(&self, profile: &ProfileDocument) -> Result<ProfileDocument, RemoteError> {
        let body = Value::Object(profile.clone());
        self.runtime
            .block_on(self.write(Method::POST, SERVER_PROFILES, Some(body)))?
            .ok_or_else(|| RemoteError::Decode("create returned no profile".to_string()))
    }

    fn update(&self, profile: &ProfileDocument, uri: &str) -> Result<ProfileDocument, RemoteError> {
        let body = Value::Object(profile.clone());
        self.runtime
            .block_on(self.write(Method::PUT, uri, Some(body)))?
            .ok_or_else(|| RemoteError::Decode("update returned no profile".to_string()))
    }

    fn patch(
        &self,
        uri: &str,
        operation: &str,
        path: &str,
        value: &Value,
    ) -> Result<ProfileDocument, RemoteError> {
        let body = json!([{"op": operation, "path": path, "value": value}]);
        self.runtime
            .block_on(self.write(Method::PATCH, uri, Some(body)))?
            .ok_or_else(|| RemoteError::Decode("patch returned no profile".to_string()))
    }

    fn delete(&self, profile: &ProfileDocument) -> Result<(), RemoteError> {
        let uri = profile
            .get("uri")
            .and_then(Value::as_str)
            .ok_or_else(|| RemoteError::Decode("profile without uri".to_string()))?;
        self.runtime
            .block_on(self.write(Method::DELETE, uri, None))
            .map(|_| ())
    }

    fn set_power_state(&self, hardware_uri: &str, request: PowerRequest) -> Result<(), RemoteError> {
        let path = format!("{hardware_uri}/powerState");
        let body =
            serde_json::to_value(request).map_err(|e| RemoteError::Decode(e.to_string()))?;
        self.runtime
            .block_on(self.write(Method::PUT, &path, Some(body)))
            .map(|_| ())
    }

    fn compliance_preview(&self, profile_uri: &str) -> Result<Value, RemoteError> {
        let path = format!("{profile_uri}/compliance-preview");
        self.runtime.block_on(self.get_value(&path, &[]))
    }
}

fn name_filter(name: &str) -> String {
    format!("\"name='{}'\"", name.replace('\'', "''"))
}

fn is_task(body: &Value) -> bool {
    body.get("category").and_then(Value::as_str) == Some("tasks")
}

/// Deletes and power changes report a resource that is not worth reading back.
fn reads_back_resource(task: &Value) -> bool {
    !matches!(
        task.get("taskType").and_then(Value::as_str),
        Some("Delete") | Some("PowerStateChange")
    ) && !matches!(
        task.get("name").and_then(Value::as_str),
        Some("Delete") | Some("Power off") | Some("Power on")
    )
}

fn into_document(value: Value) -> Result<ProfileDocument, RemoteError> {
    match value {
        Value::Object(document) => Ok(document),
        other => Err(RemoteError::Decode(format!(
            "expected an object, found {}",
            crate::document::type_name(&other)
        ))),
    }
}

fn api_error(status: StatusCode, body: &Value) -> RemoteError {
    let code = body
        .get("errorCode")
        .and_then(Value::as_str)
        .map(str::to_string);
    let message = body
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {status}"));

    RemoteError::Api {
        status: status.as_u16(),
        code,
        message,
    }
}

fn task_error(task: &Value) -> RemoteError {
    let first = task
        .get("taskErrors")
        .and_then(Value::as_array)
        .and_then(|errors| errors.first());

    let code = first
        .and_then(|error| error.get("errorCode"))
        .and_then(Value::as_str);
    let message = first
        .and_then(|error| error.get("message"))
        .and_then(Value::as_str)
        .or_else(|| task.get("taskStatus").and_then(Value::as_str))
        .unwrap_or("Appliance task failed");

    RemoteError::task(code, message)
}
