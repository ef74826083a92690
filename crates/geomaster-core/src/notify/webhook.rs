//! HTTP relay gateway.

use reqwest::blocking::Client;
use serde_json::json;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{fingerprint, NotificationGateway, PushMessage};
use crate::error::NotificationError;

/// Posts each push as JSON to a relay endpoint:
/// `{"token": ..., "notification": {"title", "body"}, "data": {...}}`.
pub struct WebhookGateway {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl WebhookGateway {
    pub fn new(endpoint: &str, api_key: Option<String>, timeout_secs: u64) -> Result<Self, NotificationError> {
        let endpoint = Url::parse(endpoint).map_err(|e| NotificationError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(NotificationError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                message: format!("unsupported scheme '{}'", endpoint.scheme()),
            });
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            api_key: api_key.filter(|k| !k.is_empty()),
        })
    }
}

impl NotificationGateway for WebhookGateway {
    fn send(&self, message: &PushMessage) -> Result<(), NotificationError> {
        let body = json!({
            "token": message.token,
            "notification": {
                "title": message.title,
                "body": message.body,
            },
            "data": message.data,
        });

        let mut request = self.client.post(self.endpoint.clone()).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let resp = request.send()?;
        let status = resp.status();
        if status.is_success() {
            debug!(token = %fingerprint(&message.token), status = status.as_u16(), "push accepted");
            Ok(())
        } else {
            let text = resp.text().unwrap_or_default();
            Err(NotificationError::Rejected {
                status: status.as_u16(),
                body: text,
            })
        }
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use std::collections::BTreeMap;

    fn message() -> PushMessage {
        PushMessage {
            token: "device-abc".into(),
            title: "GeoMaster Daily Reminder".into(),
            body: "Don't break your 4-day streak! Take a quick geography quiz today.".into(),
            data: BTreeMap::from([
                ("type".to_string(), "daily_reminder".to_string()),
                ("streak".to_string(), "4".to_string()),
            ]),
        }
    }

    #[test]
    fn posts_json_with_bearer_key() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/push")
            .match_header("authorization", "Bearer secret")
            .match_body(Matcher::PartialJson(json!({
                "token": "device-abc",
                "notification": { "title": "GeoMaster Daily Reminder" },
                "data": { "type": "daily_reminder", "streak": "4" },
            })))
            .with_status(200)
            .create();

        let gateway =
            WebhookGateway::new(&format!("{}/push", server.url()), Some("secret".into()), 5).unwrap();
        gateway.send(&message()).unwrap();
        mock.assert();
    }

    #[test]
    fn non_success_status_is_rejected() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", "/push")
            .with_status(410)
            .with_body("token expired")
            .create();

        let gateway = WebhookGateway::new(&format!("{}/push", server.url()), None, 5).unwrap();
        match gateway.send(&message()) {
            Err(NotificationError::Rejected { status, body }) => {
                assert_eq!(status, 410);
                assert_eq!(body, "token expired");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn rejects_non_http_scheme() {
        assert!(matches!(
            WebhookGateway::new("ftp://relay.example.com", None, 5),
            Err(NotificationError::InvalidEndpoint { .. })
        ));
    }
}
