//! Remote hand-raise service.
//!
//! [`HandRaiseService`] is the seam the coordinator talks to; the production
//! implementation is [`HttpHandRaiseService`], a thin `reqwest` client over
//! the iMeetPro REST API:
//!
//! | Operation | Endpoint |
//! |-----------|----------|
//! | start     | `POST /api/meetings/{id}/hand-raise/start` |
//! | end       | `POST /api/meetings/{id}/hand-raise/end` |
//! | roster    | `GET  /api/meetings/{id}/hand-raise/hands` |
//! | own state | `GET  /api/meetings/{id}/hand-raise/status/{user_id}` |
//! | toggle    | `POST /api/meetings/{id}/hand-raise/toggle` |
//! | host act  | `POST /api/meetings/{id}/hand-raise/acknowledge` |
//! | clear     | `POST /api/meetings/{id}/hand-raise/clear` |
//! | stats     | `GET  /api/meetings/{id}/hand-raise/stats` |
//!
//! A 404 from any endpoint maps to [`HandRaiseError::MeetingNotFound`]; a 409
//! from `start` means tracking is already running and is treated as success.

use crate::errors::HandRaiseError;
use crate::models::{
    AcknowledgeHandRequest, ActionResponse, ClearHandsRequest, HandAction, HandRaiseStats,
    HostAction, OwnStatusResponse, RaisedHand, RosterResponse, ToggleHandRequest,
};
use async_trait::async_trait;
use common::secret::{ExposeSecret, SecretString};
use common::types::{MeetingId, UserId};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Default connect timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum length for error body in error messages.
const MAX_ERROR_BODY_LEN: usize = 256;

/// Operations the coordinator needs from the remote service.
#[async_trait]
pub trait HandRaiseService: Send + Sync {
    /// Start server-side tracking for the meeting. Idempotent.
    async fn start_session(&self, meeting_id: &MeetingId) -> Result<(), HandRaiseError>;

    /// Tear down server-side tracking for the meeting.
    async fn end_session(&self, meeting_id: &MeetingId) -> Result<(), HandRaiseError>;

    /// Current roster, in server (raise) order.
    async fn get_roster(&self, meeting_id: &MeetingId) -> Result<Vec<RaisedHand>, HandRaiseError>;

    /// Whether `user_id` currently has a hand raised.
    async fn get_own_status(
        &self,
        meeting_id: &MeetingId,
        user_id: &UserId,
    ) -> Result<bool, HandRaiseError>;

    async fn toggle_hand(
        &self,
        meeting_id: &MeetingId,
        user_id: &UserId,
        display_name: &str,
        connection_identity: &str,
        action: HandAction,
    ) -> Result<ActionResponse, HandRaiseError>;

    async fn acknowledge_hand(
        &self,
        meeting_id: &MeetingId,
        host_user_id: &UserId,
        target_user_id: &UserId,
        target_name: &str,
        action: HostAction,
    ) -> Result<ActionResponse, HandRaiseError>;

    async fn clear_all_hands(
        &self,
        meeting_id: &MeetingId,
        host_user_id: &UserId,
    ) -> Result<ActionResponse, HandRaiseError>;

    async fn get_stats(&self, meeting_id: &MeetingId) -> Result<HandRaiseStats, HandRaiseError>;
}

/// Truncate an error body for inclusion in error messages.
fn truncate_error_body(body: &str) -> String {
    if body.chars().count() > MAX_ERROR_BODY_LEN {
        let head: String = body.chars().take(MAX_ERROR_BODY_LEN).collect();
        format!("{head}...[truncated]")
    } else {
        body.to_string()
    }
}

/// Turn an action response with `success: false` into an error.
fn ensure_accepted(response: ActionResponse) -> Result<ActionResponse, HandRaiseError> {
    if response.success {
        Ok(response)
    } else {
        Err(HandRaiseError::Rejected(
            response
                .message
                .unwrap_or_else(|| "Request was not accepted".to_string()),
        ))
    }
}

/// HTTP client for the hand-raise REST API.
#[derive(Clone)]
pub struct HttpHandRaiseService {
    base_url: String,
    http_client: Client,
    api_token: Option<SecretString>,
}

impl std::fmt::Debug for HttpHandRaiseService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpHandRaiseService")
            .field("base_url", &self.base_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl HttpHandRaiseService {
    /// Build a client with request and connect timeouts.
    ///
    /// # Errors
    ///
    /// Returns `HandRaiseError::Config` if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        api_token: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, HandRaiseError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| HandRaiseError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
            api_token,
        })
    }

    /// Get the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, meeting_id: &MeetingId, tail: &str) -> String {
        format!(
            "{}/api/meetings/{}/hand-raise/{}",
            self.base_url, meeting_id, tail
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, HandRaiseError> {
        self.authorize(request).send().await.map_err(|e| {
            debug!(target: "hr.service", error = %e, "HTTP request failed");
            HandRaiseError::Http(e.to_string())
        })
    }

    /// Handle response and parse JSON body.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        meeting_id: &MeetingId,
        response: Response,
    ) -> Result<T, HandRaiseError> {
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(HandRaiseError::MeetingNotFound(meeting_id.to_string()));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                target: "hr.service",
                status = %status,
                meeting_id = %meeting_id,
                "Hand-raise service returned an error status"
            );
            return Err(HandRaiseError::RequestFailed {
                status: status.as_u16(),
                body: truncate_error_body(&body),
            });
        }

        response.json().await.map_err(|e| {
            warn!(target: "hr.service", error = %e, "Failed to parse hand-raise response");
            HandRaiseError::InvalidResponse(e.to_string())
        })
    }
}

#[async_trait]
impl HandRaiseService for HttpHandRaiseService {
    #[instrument(skip_all, fields(meeting_id = %meeting_id))]
    async fn start_session(&self, meeting_id: &MeetingId) -> Result<(), HandRaiseError> {
        let response = self
            .send(self.http_client.post(self.url(meeting_id, "start")))
            .await?;

        if response.status() == StatusCode::CONFLICT {
            debug!(target: "hr.service", meeting_id = %meeting_id, "Hand-raise session already started");
            return Ok(());
        }

        self.handle_response::<serde_json::Value>(meeting_id, response)
            .await
            .map(|_| ())
    }

    #[instrument(skip_all, fields(meeting_id = %meeting_id))]
    async fn end_session(&self, meeting_id: &MeetingId) -> Result<(), HandRaiseError> {
        let response = self
            .send(self.http_client.post(self.url(meeting_id, "end")))
            .await?;

        self.handle_response::<serde_json::Value>(meeting_id, response)
            .await
            .map(|_| ())
    }

    #[instrument(skip_all, fields(meeting_id = %meeting_id))]
    async fn get_roster(&self, meeting_id: &MeetingId) -> Result<Vec<RaisedHand>, HandRaiseError> {
        let response = self
            .send(self.http_client.get(self.url(meeting_id, "hands")))
            .await?;

        let roster: RosterResponse = self.handle_response(meeting_id, response).await?;
        if !roster.success {
            return Err(HandRaiseError::Rejected(
                roster
                    .message
                    .unwrap_or_else(|| "Roster unavailable".to_string()),
            ));
        }
        Ok(roster.raised_hands)
    }

    #[instrument(skip_all, fields(meeting_id = %meeting_id))]
    async fn get_own_status(
        &self,
        meeting_id: &MeetingId,
        user_id: &UserId,
    ) -> Result<bool, HandRaiseError> {
        let response = self
            .send(
                self.http_client
                    .get(self.url(meeting_id, &format!("status/{user_id}"))),
            )
            .await?;

        let status: OwnStatusResponse = self.handle_response(meeting_id, response).await?;
        Ok(status.hand_raised)
    }

    #[instrument(skip_all, fields(meeting_id = %meeting_id, action = %action))]
    async fn toggle_hand(
        &self,
        meeting_id: &MeetingId,
        user_id: &UserId,
        display_name: &str,
        connection_identity: &str,
        action: HandAction,
    ) -> Result<ActionResponse, HandRaiseError> {
        let body = ToggleHandRequest {
            meeting_id,
            user_id,
            user_name: display_name,
            participant_identity: connection_identity,
            action,
        };
        let response = self
            .send(self.http_client.post(self.url(meeting_id, "toggle")).json(&body))
            .await?;

        ensure_accepted(self.handle_response(meeting_id, response).await?)
    }

    #[instrument(skip_all, fields(meeting_id = %meeting_id, action = %action))]
    async fn acknowledge_hand(
        &self,
        meeting_id: &MeetingId,
        host_user_id: &UserId,
        target_user_id: &UserId,
        target_name: &str,
        action: HostAction,
    ) -> Result<ActionResponse, HandRaiseError> {
        let body = AcknowledgeHandRequest {
            meeting_id,
            host_user_id,
            user_id: target_user_id,
            user_name: target_name,
            action,
        };
        let response = self
            .send(
                self.http_client
                    .post(self.url(meeting_id, "acknowledge"))
                    .json(&body),
            )
            .await?;

        ensure_accepted(self.handle_response(meeting_id, response).await?)
    }

    #[instrument(skip_all, fields(meeting_id = %meeting_id))]
    async fn clear_all_hands(
        &self,
        meeting_id: &MeetingId,
        host_user_id: &UserId,
    ) -> Result<ActionResponse, HandRaiseError> {
        let body = ClearHandsRequest {
            meeting_id,
            host_user_id,
        };
        let response = self
            .send(self.http_client.post(self.url(meeting_id, "clear")).json(&body))
            .await?;

        ensure_accepted(self.handle_response(meeting_id, response).await?)
    }

    #[instrument(skip_all, fields(meeting_id = %meeting_id))]
    async fn get_stats(&self, meeting_id: &MeetingId) -> Result<HandRaiseStats, HandRaiseError> {
        let response = self
            .send(self.http_client.get(self.url(meeting_id, "stats")))
            .await?;

        self.handle_response(meeting_id, response).await
    }
}
