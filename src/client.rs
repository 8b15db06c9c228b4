use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::controller::TickReport;
use crate::detection::DetectionResult;
use crate::error::Result;

pub const DEFAULT_SERVER_ADDR: &str = "http://127.0.0.1:8080";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRequest {
    pub command: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    pub accepted: bool,
    pub command: Option<String>,
    pub error: Option<String>,
}

/// Talks to the control server over HTTP.
#[derive(Clone)]
pub struct ControlClient {
    client: Client,
    base_url: String,
}

impl ControlClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Feed one detection; the server runs a control tick for it.
    pub async fn post_detection(&self, detection: &DetectionResult) -> Result<TickReport> {
        let report = self
            .client
            .post(self.url("/detection"))
            .json(detection)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(report)
    }

    /// Submit a command line. A rejected command comes back with
    /// `accepted == false` rather than as an error.
    pub async fn submit_command(&self, command: &str) -> Result<CommandResponse> {
        let response = self
            .client
            .post(self.url("/command"))
            .json(&CommandRequest {
                command: command.to_string(),
            })
            .send()
            .await?
            .json()
            .await?;
        Ok(response)
    }

    pub async fn status(&self) -> Result<serde_json::Value> {
        let status = self
            .client
            .get(self.url("/status"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(status)
    }
}
