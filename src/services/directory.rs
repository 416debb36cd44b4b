//! Student directory client
//!
//! Resolves control numbers against the university directory API when a
//! student self-registers for the first time. Lookups fail closed: any
//! directory failure rejects the self-registration instead of minting an
//! unverified student record.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Settings;
use crate::utils::errors::{DirectoryError, DirectoryResult, Result, SigeaError};
use crate::utils::logging::log_directory_error;

/// Directory record for one student
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DirectoryStudent {
    pub control_number: String,
    pub full_name: String,
    pub career: Option<String>,
    pub email: Option<String>,
}

#[derive(Clone)]
pub struct DirectoryService {
    client: Client,
    settings: Settings,
}

impl DirectoryService {
    pub fn new(settings: Settings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.directory.timeout_seconds))
            .user_agent("SIGEA/0.1")
            .build()
            .map_err(SigeaError::Http)?;

        Ok(Self { client, settings })
    }

    /// Check if directory lookups are enabled
    pub fn is_enabled(&self) -> bool {
        self.settings.features.directory_lookup
    }

    /// Look a control number up in the directory
    pub async fn lookup_student(&self, control_number: &str) -> DirectoryResult<DirectoryStudent> {
        let url = format!(
            "{}/students/{}",
            self.settings.directory.api_url.trim_end_matches('/'),
            control_number
        );

        debug!(control_number = control_number, url = %url, "Looking up student in directory");

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                DirectoryError::Timeout
            } else if e.is_connect() {
                DirectoryError::ServiceUnavailable
            } else {
                DirectoryError::RequestFailed(e.to_string())
            }
        })?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                return Err(DirectoryError::UnknownStudent(control_number.to_string()));
            }
            status if status.is_server_error() => {
                return Err(DirectoryError::ServiceUnavailable);
            }
            status if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                return Err(DirectoryError::RequestFailed(format!(
                    "HTTP {status}: {body}"
                )));
            }
            _ => {}
        }

        let student: DirectoryStudent = response
            .json()
            .await
            .map_err(|e| DirectoryError::InvalidResponse(e.to_string()))?;

        if student.full_name.trim().is_empty() {
            return Err(DirectoryError::InvalidResponse(
                "directory record has no name".to_string(),
            ));
        }

        debug!(
            control_number = control_number,
            full_name = %student.full_name,
            "Directory lookup succeeded"
        );

        Ok(student)
    }

    /// Lookup wrapper that logs failures and lifts them into `SigeaError`
    pub async fn resolve(&self, control_number: &str) -> Result<DirectoryStudent> {
        match self.lookup_student(control_number).await {
            Ok(student) => Ok(student),
            Err(err) => {
                log_directory_error(control_number, &err.to_string());
                Err(SigeaError::Directory(err))
            }
        }
    }
}
