use std::sync::Arc;

use futures::{FutureExt, future::BoxFuture};
use reqwest::{Client, Method, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dao::{
    session_directory::SessionDirectory,
    storage::{DirectoryError, StorageResult},
};

use super::{
    config::HttpDirectoryConfig,
    error::{HttpDirectoryError, HttpResult},
};

/// Body of `GET /sessions/{id}`.
#[derive(Debug, Deserialize)]
struct SessionDocument {
    drill_order: Vec<String>,
}

#[derive(Debug, Serialize)]
struct CompletionBody {
    completed: bool,
}

#[derive(Debug, Serialize)]
struct NoteBody<'a> {
    text: &'a str,
}

/// [`SessionDirectory`] talking JSON over HTTP to the session-content service.
#[derive(Clone)]
pub struct HttpSessionDirectory {
    client: Client,
    base_url: Url,
    bearer_token: Option<Arc<str>>,
}

impl HttpSessionDirectory {
    /// Build the client. No request is issued until the first lookup.
    pub fn new(config: HttpDirectoryConfig) -> HttpResult<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|err| {
            HttpDirectoryError::InvalidBaseUrl {
                url: config.base_url.clone(),
                reason: err.to_string(),
            }
        })?;
        if base_url.cannot_be_a_base() {
            return Err(HttpDirectoryError::InvalidBaseUrl {
                url: config.base_url,
                reason: "URL cannot carry a path".into(),
            });
        }

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|source| HttpDirectoryError::ClientBuilder { source })?;

        Ok(Self {
            client,
            base_url,
            bearer_token: config.bearer_token.map(Arc::<str>::from),
        })
    }

    /// Append percent-encoded `segments` to the base URL.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // `new` rejects cannot-be-a-base URLs.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, url);
        match self.bearer_token {
            Some(ref token) => builder.bearer_auth(token.as_ref()),
            None => builder,
        }
    }

    async fn fetch_drill_order(&self, session_id: &str) -> HttpResult<Option<Vec<String>>> {
        let url = self.endpoint(&["sessions", session_id]);
        let path = url.path().to_string();
        let response = self
            .request(Method::GET, url)
            .send()
            .await
            .map_err(|source| HttpDirectoryError::RequestSend {
                path: path.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let document: SessionDocument = response
                    .json()
                    .await
                    .map_err(|source| HttpDirectoryError::DecodeResponse { path, source })?;
                Ok(Some(document.drill_order))
            }
            status => Err(HttpDirectoryError::RequestStatus { path, status }),
        }
    }

    async fn put_json<T>(&self, url: Url, body: &T) -> HttpResult<()>
    where
        T: Serialize + ?Sized,
    {
        let path = url.path().to_string();
        let response = self
            .request(Method::PUT, url)
            .json(body)
            .send()
            .await
            .map_err(|source| HttpDirectoryError::RequestSend {
                path: path.clone(),
                source,
            })?;

        let status = response.status();
        if status.is_success() {
            debug!(%path, "content service write accepted");
            Ok(())
        } else {
            Err(HttpDirectoryError::RequestStatus { path, status })
        }
    }

    async fn ping(&self) -> HttpResult<()> {
        let url = self.endpoint(&["health"]);
        let path = url.path().to_string();
        let response = self
            .request(Method::GET, url)
            .send()
            .await
            .map_err(|source| HttpDirectoryError::RequestSend {
                path: path.clone(),
                source,
            })?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(HttpDirectoryError::RequestStatus { path, status })
        }
    }
}

fn drill_segments<'a>(session_id: &'a str, drill_id: &'a str, leaf: &'a str) -> [&'a str; 5] {
    ["sessions", session_id, "drills", drill_id, leaf]
}

impl SessionDirectory for HttpSessionDirectory {
    fn drill_order(
        &self,
        session_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<Vec<String>>>> {
        let directory = self.clone();
        async move {
            directory
                .fetch_drill_order(&session_id)
                .await
                .map_err(DirectoryError::from)
        }
        .boxed()
    }

    fn record_completion(
        &self,
        session_id: String,
        drill_id: String,
        completed: bool,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let directory = self.clone();
        async move {
            let url = directory.endpoint(&drill_segments(&session_id, &drill_id, "completion"));
            directory
                .put_json(url, &CompletionBody { completed })
                .await
                .map_err(DirectoryError::from)
        }
        .boxed()
    }

    fn record_note(
        &self,
        session_id: String,
        drill_id: String,
        text: String,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let directory = self.clone();
        async move {
            let url = directory.endpoint(&drill_segments(&session_id, &drill_id, "note"));
            directory
                .put_json(url, &NoteBody { text: &text })
                .await
                .map_err(DirectoryError::from)
        }
        .boxed()
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let directory = self.clone();
        async move { directory.ping().await.map_err(DirectoryError::from) }.boxed()
    }
}
