use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};

use crate::{CharteredDrift, Mirror, MirrorError, MirrorResult, Session};

/// A mirror backed by a document store with a plain JSON REST interface.
///
/// Documents are stored at `<base>/sessions/<id>` and `<base>/drifts/<id>`.
pub struct RestMirror {
    base_url: String,
    client: Client,
}

impl RestMirror {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[async_trait]
impl Mirror for RestMirror {
    async fn save_session(&self, session: &Session) -> MirrorResult<()> {
        let response = self
            .client
            .put(self.url(&format!("sessions/{}", session.session_id)))
            .json(session)
            .send()
            .await?;

        check_status(response).map(|_| ())
    }

    async fn session_by_id(&self, session_id: &str) -> MirrorResult<Option<Session>> {
        let response = self
            .client
            .get(self.url(&format!("sessions/{}", session_id)))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let session = check_status(response)?.json().await?;
        Ok(Some(session))
    }

    async fn recent_live(&self, limit: usize) -> MirrorResult<Vec<Session>> {
        let response = self
            .client
            .get(self.url("sessions"))
            .query(&[("status", "live".to_string()), ("limit", limit.to_string())])
            .send()
            .await?;

        let mut sessions: Vec<Session> = check_status(response)?.json().await?;

        // The store is not trusted to honor the ordering or the limit
        sessions.retain(|s| s.is_live());
        sessions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        sessions.truncate(limit);

        Ok(sessions)
    }

    async fn save_drift(&self, drift: &CharteredDrift) -> MirrorResult<()> {
        let response = self
            .client
            .put(self.url(&format!("drifts/{}", drift.id)))
            .json(drift)
            .send()
            .await?;

        check_status(response).map(|_| ())
    }
}

fn check_status(response: Response) -> MirrorResult<Response> {
    let status = response.status();

    if !status.is_success() {
        return Err(MirrorError::Status(status.as_u16()));
    }

    Ok(response)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_trailing_slash_is_ignored() {
        let mirror = RestMirror::new("https://store.example/v1/");

        assert_eq!(
            mirror.url("sessions/1"),
            "https://store.example/v1/sessions/1"
        );
    }
}
