// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

mod server;

use std::net::SocketAddr;
use std::sync::Arc;

use amber_archive::{FileSource, HttpConfig, HttpSource, MmapSource, RangeSource};
use amber_epoch::{EpochConfig, EpochHandle};
use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Read-only lookup gateway over one epoch archive and its compact indexes.
#[derive(Debug, Parser)]
#[command(name = "amber-gateway", version)]
struct Cli {
    /// Epoch archive: local path or http(s) URL.
    #[arg(long)]
    archive: String,
    /// CID-to-offset index: local path or http(s) URL.
    #[arg(long)]
    cid_index: String,
    /// Slot-to-CID index: local path or http(s) URL.
    #[arg(long)]
    slot_index: String,
    /// Signature-to-CID index: local path or http(s) URL.
    #[arg(long)]
    sig_index: String,
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:8080")]
    listen: SocketAddr,
    /// Node-cache byte budget; 0 disables caching.
    #[arg(long, default_value_t = 64 << 20)]
    node_cache_bytes: usize,
    /// Memory-map local files instead of positioned reads.
    #[arg(long)]
    mmap: bool,
}

async fn open_source(
    spec: &str,
    mmap: bool,
    token: &CancellationToken,
) -> anyhow::Result<Arc<dyn RangeSource>> {
    if spec.starts_with("http://") || spec.starts_with("https://") {
        let url: hyper::Uri = spec.parse().with_context(|| format!("invalid url {spec}"))?;
        let source = HttpSource::connect(url, HttpConfig::default(), token).await?;
        Ok(Arc::new(source))
    } else if mmap {
        Ok(Arc::new(MmapSource::open(spec)?))
    } else {
        Ok(Arc::new(FileSource::open(spec)?))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();
    let token = CancellationToken::new();

    let archive = open_source(&cli.archive, cli.mmap, &token)
        .await
        .context("opening archive")?;
    let cid_index = open_source(&cli.cid_index, cli.mmap, &token)
        .await
        .context("opening cid-to-offset index")?;
    let slot_index = open_source(&cli.slot_index, cli.mmap, &token)
        .await
        .context("opening slot-to-cid index")?;
    let sig_index = open_source(&cli.sig_index, cli.mmap, &token)
        .await
        .context("opening sig-to-cid index")?;

    let config = EpochConfig {
        node_cache_bytes: (cli.node_cache_bytes > 0).then_some(cli.node_cache_bytes),
        ..Default::default()
    };
    let handle = EpochHandle::open(archive, cid_index, slot_index, sig_index, config, &token)
        .await
        .context("opening epoch")?;
    info!(root = %handle.root(), "epoch open");

    server::serve(Arc::new(handle), cli.listen).await
}
