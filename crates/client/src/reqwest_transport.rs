//! Default [`HttpTransport`] backed by `reqwest`.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::transport::{HttpRequest, HttpResponse, HttpTransport, Method, TransportError};

/// Connection timeout applied by [`ReqwestTransport::new`].
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Sends requests through a shared `reqwest::Client` (rustls, connection pooling).
#[derive(Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| TransportError::new(e.to_string()))?;
        Ok(Self { http })
    }

    /// Like [`new`](Self::new) but also bounds each whole request.
    pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::new(e.to_string()))?;
        Ok(Self { http })
    }

    /// Wraps an already configured client.
    pub fn from_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

fn to_reqwest(method: Method) -> reqwest::Method {
    match method {
        Method::Post => reqwest::Method::POST,
        Method::Head => reqwest::Method::HEAD,
        Method::Patch => reqwest::Method::PATCH,
    }
}

impl HttpTransport for ReqwestTransport {
    fn send(
        &self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + Send + '_>> {
        Box::pin(async move {
            let mut builder = self
                .http
                .request(to_reqwest(request.method), request.url.as_str());
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if !request.body.is_empty() || request.method == Method::Patch {
                builder = builder.body(request.body);
            }

            let resp = builder.send().await.map_err(|e| {
                TransportError::new(format!("{} {}: {e}", request.method.as_str(), request.url))
            })?;

            let headers = resp
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|v| (name.as_str().to_string(), v.to_string()))
                })
                .collect();

            Ok(HttpResponse {
                status: resp.status().as_u16(),
                headers,
            })
        })
    }
}
