//! Attaching a `SynthFs` to a mount point.
//!
//! `MountConfig::privileged` picks between a direct `/dev/fuse` mount (needs
//! CAP_SYS_ADMIN) and the setuid `fusermount3` helper. The mount is always
//! read-only.

use rfuse3::raw::MountHandle;
use tracing::info;

use crate::config::MountConfig;
use crate::vfs::fs::SynthFs;

/// Mount `fs` as described by `config`. The returned handle resolves when the
/// filesystem is unmounted from outside; call `unmount` to detach it.
#[cfg(target_os = "linux")]
pub async fn mount(fs: SynthFs, config: &MountConfig) -> std::io::Result<MountHandle> {
    let session = rfuse3::raw::Session::new(config.mount_options());
    let mountpoint = config.mountpoint.as_path();
    let handle = if config.privileged {
        session.mount(fs, mountpoint).await?
    } else {
        session.mount_with_unprivileged(fs, mountpoint).await?
    };
    info!(
        mountpoint = %mountpoint.display(),
        privileged = config.privileged,
        "mounted"
    );
    Ok(handle)
}

#[cfg(not(target_os = "linux"))]
pub async fn mount(_fs: SynthFs, config: &MountConfig) -> std::io::Result<MountHandle> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        format!(
            "cannot mount synthfs at {}: FUSE mounts need Linux",
            config.mountpoint.display()
        ),
    ))
}
