// ABOUTME: Single in-flight request per channel, across every client process
// ABOUTME: A guard holds an exclusive lock file for its channel until dropped

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use droneguide_core::constants::droneguide_dir;
use fs2::FileExt;
use tracing::debug;

use crate::api::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Analysis,
    Voice,
    Generation,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Analysis => "analysis",
            Channel::Voice => "voice",
            Channel::Generation => "generation",
        }
    }
}

/// Directory of per-channel lock files shared by every client on this machine
#[derive(Debug, Clone)]
pub struct ChannelLocks {
    dir: PathBuf,
}

impl ChannelLocks {
    /// Locks under `~/.droneguide/locks`
    pub fn open_default() -> Result<Self, ClientError> {
        Self::open(droneguide_dir().join("locks"))
    }

    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, ClientError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Claim `channel`, or fail if any process still holds it
    ///
    /// The lock belongs to the open file, so the OS drops it when the holder
    /// exits, even without running destructors.
    pub fn try_acquire(&self, channel: Channel) -> Result<ChannelGuard, ClientError> {
        let path = self.dir.join(format!("{}.lock", channel.as_str()));
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!("Acquired {} channel lock", channel.as_str());
                Ok(ChannelGuard { file, channel })
            }
            Err(e) if is_contended(&e) => Err(ClientError::Busy(channel.as_str())),
            Err(e) => Err(e.into()),
        }
    }

    pub fn is_busy(&self, channel: Channel) -> bool {
        matches!(self.try_acquire(channel), Err(ClientError::Busy(_)))
    }
}

fn is_contended(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

#[derive(Debug)]
pub struct ChannelGuard {
    file: File,
    channel: Channel,
}

impl ChannelGuard {
    pub fn channel(&self) -> Channel {
        self.channel
    }
}

impl Drop for ChannelGuard {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            debug!("Releasing {} channel lock: {}", self.channel.as_str(), e);
        }
    }
}
