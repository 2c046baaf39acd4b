//! The boundary to the service under load.
//!
//! The simulation only knows how to ask a [`RemoteCaller`] to perform an
//! [`Operation`]. [`HttpCaller`] realizes that against the feed web app:
//! `user/<name>`, `publish?user=<name>&text=<text>` and
//! `follow?src=<name>&dst=<name>`, all as `GET`s relative to a base url.

use std::{future::Future, time::Duration};

use reqwest::{Client, StatusCode, Url};

use crate::{error::CallError, metric::Category};

/// Display name of a subject index.
pub fn username(subject: usize) -> String {
    format!("user{subject}")
}

/// One remote call made on behalf of a subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Identify { subject: usize },
    Publish { subject: usize, text: String },
    Follow { src: usize, dst: usize },
}

impl Operation {
    pub fn category(&self) -> Category {
        match self {
            Operation::Identify { .. } => Category::Identify,
            Operation::Publish { .. } => Category::Publish,
            Operation::Follow { .. } => Category::Follow,
        }
    }

    /// The subject the call is made for.
    pub fn subject(&self) -> usize {
        match self {
            Operation::Identify { subject } | Operation::Publish { subject, .. } => *subject,
            Operation::Follow { src, .. } => *src,
        }
    }

    /// Resolve the operation against `base`.
    pub fn url(&self, base: &Url) -> Result<Url, CallError> {
        let url = match self {
            Operation::Identify { subject } => base.join(&format!("user/{}", username(*subject)))?,
            Operation::Publish { subject, text } => {
                let mut url = base.join("publish")?;
                url.query_pairs_mut()
                    .append_pair("user", &username(*subject))
                    .append_pair("text", text);
                url
            }
            Operation::Follow { src, dst } => {
                let mut url = base.join("follow")?;
                url.query_pairs_mut()
                    .append_pair("src", &username(*src))
                    .append_pair("dst", &username(*dst));
                url
            }
        };
        Ok(url)
    }
}

/// Issues one operation against the remote service.
///
/// Latency is measured by the caller of `perform`, so implementations only
/// report success or failure. Retrying is up to the implementation; the
/// executor never retries.
pub trait RemoteCaller: Send + Sync + 'static {
    fn perform(&self, op: &Operation) -> impl Future<Output = Result<(), CallError>> + Send;
}

/// [`RemoteCaller`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpCaller {
    client: Client,
    base: Url,
}

impl HttpCaller {
    /// Build a caller for `base_url`. A missing trailing slash is added so
    /// paths resolve below it.
    pub fn new(base_url: &str) -> Result<Self, CallError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;
        Self::with_client(client, base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Result<Self, CallError> {
        let base = if base_url.ends_with('/') {
            Url::parse(base_url)?
        } else {
            Url::parse(&format!("{base_url}/"))?
        };
        Ok(Self { client, base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }
}

impl RemoteCaller for HttpCaller {
    async fn perform(&self, op: &Operation) -> Result<(), CallError> {
        let url = op.url(&self.base)?;
        let res = self.client.get(url).send().await?;
        let status = res.status();
        let body = res.text().await?;
        if status != StatusCode::OK {
            return Err(CallError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}
