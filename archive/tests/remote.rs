// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Remote range-source behavior against a local test server, including the
//! transient-failure retry path.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use amber_archive::{Error, HttpConfig, HttpSource, RangeSource};
use hyper::header::{CONTENT_RANGE, RANGE};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server, StatusCode};
use tokio_util::sync::CancellationToken;

const PAYLOAD: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn parse_range(value: &str, total: usize) -> Option<(usize, usize)> {
    let value = value.strip_prefix("bytes=")?;
    let (start, end) = value.split_once('-')?;
    let start: usize = start.parse().ok()?;
    let end: usize = end.parse().ok()?;
    (start <= end && end < total).then_some((start, end))
}

async fn serve(
    req: Request<Body>,
    failures: Arc<AtomicU32>,
) -> Result<Response<Body>, Infallible> {
    // Burn one queued failure per request, if any are pending.
    if failures
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
    {
        return Ok(Response::builder()
            .status(StatusCode::SERVICE_UNAVAILABLE)
            .body(Body::empty())
            .unwrap());
    }

    let range = req
        .headers()
        .get(RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| parse_range(v, PAYLOAD.len()));
    let response = match range {
        Some((start, end)) => Response::builder()
            .status(StatusCode::PARTIAL_CONTENT)
            .header(
                CONTENT_RANGE,
                format!("bytes {start}-{end}/{}", PAYLOAD.len()),
            )
            .body(Body::from(PAYLOAD[start..=end].to_vec()))
            .unwrap(),
        None => Response::new(Body::from(PAYLOAD.to_vec())),
    };
    Ok(response)
}

fn spawn_server(queued_failures: u32) -> (SocketAddr, Arc<AtomicU32>) {
    let failures = Arc::new(AtomicU32::new(queued_failures));
    let shared = failures.clone();
    let make = make_service_fn(move |_| {
        let failures = shared.clone();
        async move { Ok::<_, Infallible>(service_fn(move |req| serve(req, failures.clone()))) }
    });
    let server = Server::bind(&"127.0.0.1:0".parse().unwrap()).serve(make);
    let addr = server.local_addr();
    tokio::spawn(server);
    (addr, failures)
}

fn fast_config() -> HttpConfig {
    HttpConfig {
        retry_base: Duration::from_millis(10),
        ..Default::default()
    }
}

#[tokio::test]
async fn connect_discovers_size_and_reads_are_exact() {
    let (addr, _failures) = spawn_server(0);
    let url: hyper::Uri = format!("http://{addr}/epoch-0.archive").parse().unwrap();
    let token = CancellationToken::new();

    let source = HttpSource::connect(url, fast_config(), &token).await.unwrap();
    assert_eq!(source.size(), PAYLOAD.len() as u64);
    assert_eq!(source.retries(), 0);

    let bytes = source.read_at(10, 5, &token).await.unwrap();
    assert_eq!(&bytes[..], b"abcde");

    assert!(matches!(
        source.read_at(30, 100, &token).await,
        Err(Error::OutOfBounds { .. })
    ));
}

#[tokio::test]
async fn one_transient_failure_is_retried_and_recorded() {
    let (addr, failures) = spawn_server(0);
    let url: hyper::Uri = format!("http://{addr}/epoch-0.archive").parse().unwrap();
    let token = CancellationToken::new();

    let source = HttpSource::connect(url, fast_config(), &token).await.unwrap();

    failures.store(1, Ordering::SeqCst);
    let bytes = source.read_at(0, 4, &token).await.unwrap();
    assert_eq!(&bytes[..], b"0123");
    assert_eq!(source.retries(), 1);
}

#[tokio::test]
async fn cached_ranges_absorb_read_amplification() {
    let (addr, failures) = spawn_server(0);
    let url: hyper::Uri = format!("http://{addr}/epoch-0.archive").parse().unwrap();
    let token = CancellationToken::new();

    let source = HttpSource::connect(url, fast_config(), &token).await.unwrap();
    let first = source.read_at(10, 5, &token).await.unwrap();

    // Every further request would fail, so only the cache can answer.
    failures.store(u32::MAX, Ordering::SeqCst);
    let second = source.read_at(10, 5, &token).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn exhausted_retries_surface_transient_io() {
    let (addr, failures) = spawn_server(0);
    let url: hyper::Uri = format!("http://{addr}/epoch-0.archive").parse().unwrap();
    let token = CancellationToken::new();

    let source = HttpSource::connect(url, fast_config(), &token).await.unwrap();

    failures.store(10, Ordering::SeqCst);
    let err = source.read_at(20, 3, &token).await.unwrap_err();
    assert!(matches!(err, Error::TransientIo(_)));
    // Three attempts total: two recorded retries.
    assert_eq!(source.retries(), 2);
    assert_eq!(failures.load(Ordering::SeqCst), 7);
}

#[tokio::test]
async fn cancellation_short_circuits_before_io() {
    let (addr, _failures) = spawn_server(0);
    let url: hyper::Uri = format!("http://{addr}/epoch-0.archive").parse().unwrap();
    let token = CancellationToken::new();

    let source = HttpSource::connect(url, fast_config(), &token).await.unwrap();
    token.cancel();
    assert!(matches!(
        source.read_at(0, 1, &token).await,
        Err(Error::Cancelled)
    ));
}
