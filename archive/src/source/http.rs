// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use ahash::AHashMap;
use async_trait::async_trait;
use backoff::backoff::Backoff;
use bytes::Bytes;
use hyper::client::HttpConnector;
use hyper::header::{CONTENT_RANGE, RANGE};
use hyper::{Body, Client, HeaderMap, Request, StatusCode, Uri};
use hyper_rustls::HttpsConnector;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::source::{check_cancelled, RangeSource};
use crate::Error;

#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Deadline for a single request, headers through body.
    pub request_timeout: Duration,
    /// Upper bound on concurrently outstanding range requests; callers beyond
    /// it wait for a slot.
    pub max_in_flight: usize,
    /// Total attempts per read, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles per attempt.
    pub retry_base: Duration,
    /// How long a returned range stays servable from the cache.
    pub cache_ttl: Duration,
    pub cache_max_entries: usize,
    /// Keep-alive: idle pooled connections are reaped after this.
    pub pool_idle_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(20),
            max_in_flight: 64,
            max_attempts: 3,
            retry_base: Duration::from_millis(100),
            cache_ttl: Duration::from_secs(2),
            cache_max_entries: 256,
            pool_idle_timeout: Duration::from_secs(180),
        }
    }
}

/// Remote source over an HTTP server that honors `Range` requests.
///
/// Connections are pooled with keep-alive. Transient failures are retried
/// with exponential backoff before surfacing as [`Error::TransientIo`], and
/// recently returned ranges are kept in a small TTL map to absorb read
/// amplification from probe-then-body access patterns.
pub struct HttpSource {
    client: Client<HttpsConnector<HttpConnector>>,
    url: Uri,
    size: u64,
    gate: Semaphore,
    cache: Mutex<AHashMap<(u64, u64), (Instant, Bytes)>>,
    retries: AtomicU64,
    config: HttpConfig,
}

impl HttpSource {
    /// Establish the client pool and discover the remote object's size from a
    /// one-byte probe request.
    pub async fn connect(
        url: Uri,
        config: HttpConfig,
        token: &CancellationToken,
    ) -> Result<Self, Error> {
        let https = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .https_or_http()
            .enable_http1()
            .build();
        let client = Client::builder()
            .pool_idle_timeout(config.pool_idle_timeout)
            .build(https);

        let retries = AtomicU64::new(0);
        let (status, headers, body) =
            request_range(&client, &url, &config, &retries, 0, 1, None, token).await?;
        let size = match status {
            StatusCode::PARTIAL_CONTENT => headers
                .get(CONTENT_RANGE)
                .and_then(|v| v.to_str().ok())
                .and_then(ContentRange::parse)
                .map(|r| r.total)
                .ok_or_else(|| {
                    Error::TransientIo("missing or invalid Content-Range header".into())
                })?,
            // The server ignored `Range` and sent the whole object; its length
            // is the size we were probing for.
            StatusCode::OK => body.len() as u64,
            _ => unreachable!("request_range only returns 200 or 206"),
        };
        debug!(url = %url, size, "connected range source");

        Ok(Self {
            client,
            url,
            size,
            gate: Semaphore::new(config.max_in_flight),
            cache: Mutex::new(AHashMap::new()),
            retries,
            config,
        })
    }

    /// Number of retried requests since connect. Exposed for telemetry.
    pub fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    fn cache_get(&self, offset: u64, len: u64) -> Option<Bytes> {
        let mut cache = self.cache.lock();
        match cache.get(&(offset, len)) {
            Some((stamp, bytes)) if stamp.elapsed() < self.config.cache_ttl => {
                trace!(offset, len, "range cache hit");
                Some(bytes.clone())
            }
            Some(_) => {
                cache.remove(&(offset, len));
                None
            }
            None => None,
        }
    }

    fn cache_put(&self, offset: u64, len: u64, bytes: Bytes) {
        let mut cache = self.cache.lock();
        if cache.len() >= self.config.cache_max_entries {
            let ttl = self.config.cache_ttl;
            cache.retain(|_, entry| entry.0.elapsed() < ttl);
        }
        if cache.len() < self.config.cache_max_entries {
            cache.insert((offset, len), (Instant::now(), bytes));
        }
    }
}

#[async_trait]
impl RangeSource for HttpSource {
    async fn read_at(
        &self,
        offset: u64,
        len: u64,
        token: &CancellationToken,
    ) -> Result<Bytes, Error> {
        check_cancelled(token)?;
        let size = self.size;
        if len == 0 {
            return Ok(Bytes::new());
        }
        match offset.checked_add(len) {
            Some(end) if end <= size => {}
            _ => return Err(Error::OutOfBounds { offset, len, size }),
        }
        if let Some(hit) = self.cache_get(offset, len) {
            return Ok(hit);
        }

        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| Error::Cancelled)?;
        let (status, _headers, body) = request_range(
            &self.client,
            &self.url,
            &self.config,
            &self.retries,
            offset,
            len,
            Some(size),
            token,
        )
        .await?;

        let bytes = match status {
            StatusCode::PARTIAL_CONTENT => {
                if body.len() as u64 != len {
                    return Err(Error::TransientIo(format!(
                        "short range response: got {} of {len} bytes",
                        body.len()
                    )));
                }
                body
            }
            StatusCode::OK => {
                // Full-content fallback for servers without range support.
                if (body.len() as u64) < offset + len {
                    return Err(Error::TransientIo(format!(
                        "short full-content response: {} bytes, wanted {}..{}",
                        body.len(),
                        offset,
                        offset + len
                    )));
                }
                body.slice(offset as usize..(offset + len) as usize)
            }
            _ => unreachable!("request_range only returns 200 or 206"),
        };
        self.cache_put(offset, len, bytes.clone());
        Ok(bytes)
    }

    fn size(&self) -> u64 {
        self.size
    }
}

/// Issue `Range: bytes=offset..` with retries; resolves only to a 200 or 206
/// response. 416 maps to [`Error::OutOfBounds`], everything else transient is
/// retried up to `config.max_attempts` total attempts.
#[allow(clippy::too_many_arguments)]
async fn request_range(
    client: &Client<HttpsConnector<HttpConnector>>,
    url: &Uri,
    config: &HttpConfig,
    retries: &AtomicU64,
    offset: u64,
    len: u64,
    size: Option<u64>,
    token: &CancellationToken,
) -> Result<(StatusCode, HeaderMap, Bytes), Error> {
    let range = format!("bytes={}-{}", offset, offset + len - 1);
    let mut schedule = backoff::ExponentialBackoffBuilder::new()
        .with_initial_interval(config.retry_base)
        .with_multiplier(2.0)
        .with_randomization_factor(0.0)
        .with_max_elapsed_time(None)
        .build();

    let mut attempt = 0u32;
    loop {
        check_cancelled(token)?;
        let reason = match attempt_once(client, url, &range, config.request_timeout, token).await {
            Ok((status, headers, body))
                if status == StatusCode::PARTIAL_CONTENT || status == StatusCode::OK =>
            {
                return Ok((status, headers, body));
            }
            Ok((status, _, _)) if status == StatusCode::RANGE_NOT_SATISFIABLE => {
                return Err(Error::OutOfBounds {
                    offset,
                    len,
                    size: size.unwrap_or(0),
                });
            }
            Ok((status, _, _)) => format!("unexpected status {status} for range {range}"),
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(Error::TransientIo(reason)) => reason,
            Err(other) => return Err(other),
        };

        attempt += 1;
        if attempt >= config.max_attempts {
            return Err(Error::TransientIo(reason));
        }
        let delay = schedule.next_backoff().unwrap_or(config.retry_base);
        retries.fetch_add(1, Ordering::Relaxed);
        warn!(%reason, attempt, delay_ms = delay.as_millis() as u64, "retrying range request");
        tokio::select! {
            _ = token.cancelled() => return Err(Error::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

async fn attempt_once(
    client: &Client<HttpsConnector<HttpConnector>>,
    url: &Uri,
    range: &str,
    timeout: Duration,
    token: &CancellationToken,
) -> Result<(StatusCode, HeaderMap, Bytes), Error> {
    let request = Request::get(url.clone())
        .header(RANGE, range)
        .body(Body::empty())
        .map_err(|e| Error::TransientIo(e.to_string()))?;

    let fetch = async {
        let response = client
            .request(request)
            .await
            .map_err(|e| Error::TransientIo(e.to_string()))?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = hyper::body::to_bytes(response.into_body())
            .await
            .map_err(|e| Error::TransientIo(e.to_string()))?;
        Ok((status, headers, body))
    };

    tokio::select! {
        _ = token.cancelled() => Err(Error::Cancelled),
        outcome = tokio::time::timeout(timeout, fetch) => match outcome {
            Err(_elapsed) => Err(Error::TransientIo(format!(
                "range request timed out after {timeout:?}"
            ))),
            Ok(result) => result,
        },
    }
}

/// Parsed `Content-Range` header, e.g. `bytes 0-0/3000`.
#[derive(Debug)]
struct ContentRange {
    #[allow(dead_code)]
    start: u64,
    total: u64,
}

impl ContentRange {
    fn parse(header_value: &str) -> Option<Self> {
        let header_value = header_value.strip_prefix("bytes ")?;
        let (range, total) = header_value.split_once('/')?;
        let (start, _end) = range.split_once('-')?;
        Some(ContentRange {
            start: start.parse().ok()?,
            total: total.parse().ok()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_content_range() {
        let range = ContentRange::parse("bytes 1000-2000/3000").unwrap();
        assert_eq!(range.start, 1000);
        assert_eq!(range.total, 3000);

        assert!(ContentRange::parse("invalid").is_none());
        assert!(ContentRange::parse("bytes 1000-2000").is_none());
    }
}
