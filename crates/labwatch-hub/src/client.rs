//! HTTP client for the hub API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::config::HubConfig;
use crate::error::{HubError, HubResult};
use crate::plane::ControlPlane;
use crate::types::{JobId, LogChunk, RecipeId, StopType, TaskId, TaskResult, WatchdogEntry};

/// Stop request body for recipes and jobs.
#[derive(serde::Serialize)]
struct StopRequest<'a> {
    stop_type: StopType,
    message: &'a str,
}

/// Watchdog extension request body.
#[derive(serde::Serialize)]
struct ExtendRequest {
    seconds: u64,
}

/// HTTP client for interacting with the hub service.
#[derive(Debug, Clone)]
pub struct HubClient {
    client: Client,
    base_url: String,
}

impl HubClient {
    /// Create a new hub client from configuration.
    pub fn new(config: &HubConfig) -> HubResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(HubError::Http)?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_owned(),
        })
    }

    /// Create a new hub client with a custom base URL.
    pub fn with_url(url: impl Into<String>) -> HubResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(HubError::Http)?;

        Ok(Self {
            client,
            base_url: url.into().trim_end_matches('/').to_owned(),
        })
    }

    /// List watchdogs for recipes that are currently running.
    pub async fn active_watchdogs(&self) -> HubResult<Vec<WatchdogEntry>> {
        let url = format!("{}/watchdogs/active", self.base_url);
        let response = self.client.get(&url).send().await.map_err(HubError::Http)?;

        if !response.status().is_success() {
            return Err(HubError::api(format!(
                "failed to list active watchdogs: {}",
                response.status()
            )));
        }

        response.json().await.map_err(HubError::Http)
    }

    /// List watchdogs whose timers have passed.
    pub async fn expired_watchdogs(&self) -> HubResult<Vec<WatchdogEntry>> {
        let url = format!("{}/watchdogs/expired", self.base_url);
        let response = self.client.get(&url).send().await.map_err(HubError::Http)?;

        if !response.status().is_success() {
            return Err(HubError::api(format!(
                "failed to list expired watchdogs: {}",
                response.status()
            )));
        }

        response.json().await.map_err(HubError::Http)
    }

    /// Stop a recipe, with an operator-visible message.
    pub async fn stop_recipe(
        &self,
        recipe_id: RecipeId,
        stop_type: StopType,
        message: &str,
    ) -> HubResult<()> {
        let url = format!("{}/recipes/{}/stop", self.base_url, recipe_id);
        let body = StopRequest { stop_type, message };
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(HubError::Http)?;

        match response.status() {
            StatusCode::ACCEPTED => Ok(()),
            StatusCode::NOT_FOUND => Err(HubError::RecipeNotFound(recipe_id)),
            status => Err(HubError::api(format!("failed to stop recipe: {status}"))),
        }
    }

    /// Stop every recipe in a job, with an operator-visible message.
    pub async fn stop_job(
        &self,
        job_id: JobId,
        stop_type: StopType,
        message: &str,
    ) -> HubResult<()> {
        let url = format!("{}/jobs/{}/stop", self.base_url, job_id);
        let body = StopRequest { stop_type, message };
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(HubError::Http)?;

        match response.status() {
            StatusCode::ACCEPTED => Ok(()),
            StatusCode::NOT_FOUND => Err(HubError::JobNotFound(job_id)),
            status => Err(HubError::api(format!("failed to stop job: {status}"))),
        }
    }

    /// Push a task's watchdog expiry out by `seconds` from now.
    pub async fn extend_watchdog(&self, task_id: TaskId, seconds: u64) -> HubResult<()> {
        let url = format!("{}/tasks/{}/watchdog", self.base_url, task_id);
        let body = ExtendRequest { seconds };
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(HubError::Http)?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => Err(HubError::TaskNotFound(task_id)),
            status => Err(HubError::api(format!("failed to extend watchdog: {status}"))),
        }
    }

    /// Append one chunk of console log to a recipe's log store.
    pub async fn upload_chunk(&self, recipe_id: RecipeId, chunk: &LogChunk) -> HubResult<()> {
        let url = format!("{}/recipes/{}/logs", self.base_url, recipe_id);
        let response = self
            .client
            .post(&url)
            .json(chunk)
            .send()
            .await
            .map_err(HubError::Http)?;

        match response.status() {
            StatusCode::NO_CONTENT => Ok(()),
            StatusCode::NOT_FOUND => Err(HubError::RecipeNotFound(recipe_id)),
            status => Err(HubError::api(format!("failed to upload chunk: {status}"))),
        }
    }

    /// Attach a result record to a task.
    pub async fn report_task_result(&self, task_id: TaskId, result: &TaskResult) -> HubResult<()> {
        let url = format!("{}/tasks/{}/result", self.base_url, task_id);
        let response = self
            .client
            .post(&url)
            .json(result)
            .send()
            .await
            .map_err(HubError::Http)?;

        match response.status() {
            StatusCode::CREATED => Ok(()),
            StatusCode::NOT_FOUND => Err(HubError::TaskNotFound(task_id)),
            status => Err(HubError::api(format!("failed to report result: {status}"))),
        }
    }
}

#[async_trait]
impl ControlPlane for HubClient {
    async fn active_watchdogs(&self) -> HubResult<Vec<WatchdogEntry>> {
        HubClient::active_watchdogs(self).await
    }

    async fn expired_watchdogs(&self) -> HubResult<Vec<WatchdogEntry>> {
        HubClient::expired_watchdogs(self).await
    }

    async fn stop_recipe(
        &self,
        recipe_id: RecipeId,
        stop_type: StopType,
        message: &str,
    ) -> HubResult<()> {
        HubClient::stop_recipe(self, recipe_id, stop_type, message).await
    }

    async fn upload_chunk(&self, recipe_id: RecipeId, chunk: &LogChunk) -> HubResult<()> {
        HubClient::upload_chunk(self, recipe_id, chunk).await
    }
}
