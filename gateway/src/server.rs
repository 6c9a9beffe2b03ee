// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! The two lookup routes. Success returns the CID string; invalid input is
//! 400, a lookup miss 404, anything else 500.

use std::net::SocketAddr;
use std::sync::Arc;

use amber_epoch::{EpochHandle, Error};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use base58::FromBase58;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub async fn serve(handle: Arc<EpochHandle>, listen: SocketAddr) -> anyhow::Result<()> {
    let app = Router::new()
        .route("/api/v1/slot-to-cid/:slot", get(slot_to_cid))
        .route("/api/v1/sig-to-cid/:sig", get(sig_to_cid))
        .with_state(handle);

    info!(%listen, "gateway listening");
    axum::Server::bind(&listen)
        .serve(app.into_make_service())
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("shutting down");
        })
        .await?;
    Ok(())
}

async fn slot_to_cid(
    State(handle): State<Arc<EpochHandle>>,
    Path(slot): Path<String>,
) -> (StatusCode, String) {
    let Ok(slot) = slot.parse::<u64>() else {
        return (StatusCode::BAD_REQUEST, "invalid slot".into());
    };
    let token = CancellationToken::new();
    respond(handle.cid_for_slot(slot, &token).await)
}

async fn sig_to_cid(
    State(handle): State<Arc<EpochHandle>>,
    Path(signature): Path<String>,
) -> (StatusCode, String) {
    let Some(signature) = parse_signature(&signature) else {
        return (StatusCode::BAD_REQUEST, "invalid signature".into());
    };
    let token = CancellationToken::new();
    respond(handle.cid_for_signature(&signature, &token).await)
}

/// Signatures arrive base58-encoded and must decode to exactly 64 bytes.
fn parse_signature(input: &str) -> Option<[u8; 64]> {
    input.from_base58().ok()?.try_into().ok()
}

fn respond(result: Result<cid::Cid, Error>) -> (StatusCode, String) {
    match result {
        Ok(cid) => (StatusCode::OK, cid.to_string()),
        Err(e) if e.is_not_found() => (StatusCode::NOT_FOUND, "not found".into()),
        Err(e) => {
            error!(error = %e, "lookup failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal error".into())
        }
    }
}
