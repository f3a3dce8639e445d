use std::path::PathBuf;

use clap::Parser;
use rfuse3::MountOptions;

#[derive(Parser, Debug)]
#[command(version, about = "Mount the synthetic namespace over FUSE", long_about = None)]
pub struct Args {
    /// Directory to mount at; created if missing
    #[arg(env = "SYNTHFS_MOUNTPOINT")]
    pub mountpoint: PathBuf,

    /// Filesystem name shown in the mount table
    #[arg(long, env = "SYNTHFS_FS_NAME", default_value = "synthfs")]
    pub fs_name: String,

    /// Use a privileged mount instead of fusermount3
    #[arg(long, env = "SYNTHFS_PRIVILEGED", default_value_t = false)]
    pub privileged: bool,

    /// Let other users access the mount (needs user_allow_other in /etc/fuse.conf)
    #[arg(long, env = "SYNTHFS_ALLOW_OTHER", default_value_t = false)]
    pub allow_other: bool,

    /// Default log filter, used when RUST_LOG is unset
    #[arg(long, env = "SYNTHFS_LOG", default_value = "info")]
    pub log_level: String,
}

#[derive(Clone, Debug)]
pub struct MountConfig {
    pub mountpoint: PathBuf,
    pub fs_name: String,
    pub privileged: bool,
    pub allow_other: bool,
}

impl MountConfig {
    /// The namespace is always mounted read-only, owned by the calling user.
    pub fn mount_options(&self) -> MountOptions {
        let uid = unsafe { libc::getuid() };
        let gid = unsafe { libc::getgid() };

        let mut mo = MountOptions::default();
        mo.fs_name(self.fs_name.as_str())
            .read_only(true)
            .allow_other(self.allow_other)
            .uid(uid)
            .gid(gid);
        mo
    }
}

impl From<&Args> for MountConfig {
    fn from(args: &Args) -> Self {
        MountConfig {
            mountpoint: args.mountpoint.clone(),
            fs_name: args.fs_name.clone(),
            privileged: args.privileged,
            allow_other: args.allow_other,
        }
    }
}
