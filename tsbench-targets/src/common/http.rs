//! HTTP plumbing shared by the HTTP targets

use super::gzip::gzip;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::StatusCode;
use std::time::Duration;
use tsbench_interfaces::{LoadError, LoadResult};
use url::Url;

/// Client used by writers and database creators
pub fn build_client(timeout: Duration) -> LoadResult<reqwest::Client> {
    reqwest::Client::builder()
        .use_rustls_tls()
        .connect_timeout(Duration::from_secs(10))
        .pool_idle_timeout(Duration::from_secs(30))
        .timeout(timeout)
        .user_agent(concat!("tsbench/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| LoadError::Config(format!("cannot build HTTP client: {}", e)))
}

/// `base` with `path` appended to its path
pub fn endpoint(base: &str, path: &str) -> LoadResult<Url> {
    let joined = format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'));
    Url::parse(&joined).map_err(|e| LoadError::Config(format!("invalid URL '{}': {}", joined, e)))
}

/// A request that never got an answer
pub fn transport_error(url: &Url, e: reqwest::Error) -> LoadError {
    LoadError::send(format!("request to {} failed: {}", url, e))
}

/// An answer that is neither success nor backpressure
pub fn status_error(url: &Url, status: StatusCode, body: &str) -> LoadError {
    LoadError::send(format!("{} returned {}: {}", url, status, body.trim()))
}

/// POST a batch body, gzipped when `compress` is set
///
/// Returns the status and, for anything but 204, the response text.
pub async fn post_body(
    client: &reqwest::Client,
    url: &Url,
    body: &[u8],
    content_type: &str,
    compress: bool,
) -> LoadResult<(StatusCode, String)> {
    let mut request = client.post(url.clone()).header(CONTENT_TYPE, content_type);
    let body = if compress {
        request = request.header(CONTENT_ENCODING, "gzip");
        gzip(body)?
    } else {
        body.to_vec()
    };

    let response = request.body(body).send().await.map_err(|e| transport_error(url, e))?;
    let status = response.status();
    if status == StatusCode::NO_CONTENT {
        return Ok((status, String::new()));
    }
    Ok((status, response.text().await.unwrap_or_default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_paths() {
        assert_eq!(
            endpoint("http://localhost:8086/", "/write").unwrap().as_str(),
            "http://localhost:8086/write"
        );
        assert_eq!(
            endpoint("http://vm:8428", "api/v1/import/prometheus").unwrap().as_str(),
            "http://vm:8428/api/v1/import/prometheus"
        );
        assert!(endpoint("not a url", "/write").is_err());
    }

    #[test]
    fn test_status_error_names_status() {
        let url = endpoint("http://localhost:8086", "/write").unwrap();
        let err = status_error(&url, StatusCode::BAD_REQUEST, "unable to parse\n");
        assert_eq!(err.stage(), "send");
        assert!(err.to_string().contains("400 Bad Request: unable to parse"));
    }
}
