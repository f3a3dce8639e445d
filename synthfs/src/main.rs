use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use synthfs::clock::SystemClock;
use synthfs::config::{Args, MountConfig};
use synthfs::fuse::mount::mount;
use synthfs::vfs::fs::SynthFs;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .context("invalid log filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = MountConfig::from(&args);
    std::fs::create_dir_all(&config.mountpoint).with_context(|| {
        format!(
            "failed to create mount point {}",
            config.mountpoint.display()
        )
    })?;

    let fs = SynthFs::with_clock(Arc::new(SystemClock));
    let mut handle = mount(fs, &config).await.with_context(|| {
        format!(
            "failed to mount at {} (is fusermount3 installed?)",
            config.mountpoint.display()
        )
    })?;
    info!("press Ctrl+C to unmount and exit");

    tokio::select! {
        res = &mut handle => {
            res.context("filesystem session ended with an error")?;
            info!("unmounted externally");
        }
        _ = shutdown_signal() => {
            info!("unmounting");
            if let Err(e) = handle.unmount().await {
                warn!(error = %e, "unmount failed");
            }
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
