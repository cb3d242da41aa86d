//! Tar archive access
//!
//! SDK and toolchain bundles are tarballs, optionally gzip-compressed. The
//! archive is backed by a seekable file so it can be scanned once for its
//! member list and manifest, then read again for extraction.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use flate2::read::GzDecoder;
use tracing::debug;

use crate::error::{Result, SdkError};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Stops an extraction running on another thread.
///
/// Extraction holds the token's busy lock while it writes and checks the flag
/// before every member. [`CancelToken::cancel`] sets the flag and then takes
/// the lock, so once it returns nothing more is written to the destination.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    state: Arc<CancelState>,
}

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    busy: Mutex<()>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    /// Flag cancellation and block until running work has stopped
    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::SeqCst);
        drop(self.enter());
    }

    /// Mark work as running until the guard is dropped
    pub(crate) fn enter(&self) -> MutexGuard<'_, ()> {
        self.state.busy.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Guard that cancels this token when dropped
    pub fn cancel_on_drop(&self) -> CancelOnDrop {
        CancelOnDrop(self.clone())
    }
}

/// Cancels its token on drop
pub struct CancelOnDrop(CancelToken);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// Member listing plus the contents of one requested member
#[derive(Debug, Default)]
pub struct ArchiveIndex {
    pub members: Vec<String>,
    pub wanted: Option<Vec<u8>>,
}

/// A tar archive read from a seekable file
pub struct SdkArchive {
    file: File,
}

impl SdkArchive {
    pub fn new(file: File) -> Self {
        Self { file }
    }

    /// Rewind and wrap the file in a decompressor if needed
    fn reader(&mut self) -> Result<Box<dyn Read + '_>> {
        self.file.seek(SeekFrom::Start(0))?;
        let mut magic = [0u8; 2];
        let sniffed = self.file.read(&mut magic)?;
        self.file.seek(SeekFrom::Start(0))?;

        if sniffed == 2 && magic == GZIP_MAGIC {
            Ok(Box::new(GzDecoder::new(&mut self.file)))
        } else {
            Ok(Box::new(&mut self.file))
        }
    }

    /// List all member names, capturing the contents of `wanted` if given
    pub fn index(&mut self, wanted: Option<&str>) -> Result<ArchiveIndex> {
        let reader = self.reader()?;
        let mut archive = tar::Archive::new(reader);
        let mut index = ArchiveIndex::default();

        for entry in archive.entries().map_err(archive_error)? {
            let mut entry = entry.map_err(archive_error)?;
            let name = member_name(&entry);
            if index.wanted.is_none() && wanted.is_some_and(|w| same_member(&name, w)) {
                let mut contents = Vec::new();
                entry.read_to_end(&mut contents).map_err(archive_error)?;
                index.wanted = Some(contents);
            }
            index.members.push(name);
        }

        debug!("Archive holds {} members", index.members.len());
        Ok(index)
    }

    /// Unpack every member into `dest`, except those listed in `skip`.
    ///
    /// Stops with [`SdkError::Cancelled`] before the next member once `cancel`
    /// is flagged.
    pub fn extract_into(&mut self, dest: &Path, skip: &[&str], cancel: &CancelToken) -> Result<()> {
        let _busy = cancel.enter();
        let reader = self.reader()?;
        let mut archive = tar::Archive::new(reader);
        archive.set_preserve_permissions(true);

        for entry in archive.entries().map_err(archive_error)? {
            if cancel.is_cancelled() {
                return Err(SdkError::Cancelled);
            }
            let mut entry = entry.map_err(archive_error)?;
            let name = member_name(&entry);
            if skip.iter().any(|s| same_member(&name, s)) {
                continue;
            }
            if !entry.unpack_in(dest).map_err(archive_error)? {
                return Err(SdkError::QuestionableFile(name));
            }
        }

        Ok(())
    }
}

/// Run archive work off the async runtime
pub async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| SdkError::Archive(e.to_string()))?
}

fn member_name<R: Read>(entry: &tar::Entry<'_, R>) -> String {
    String::from_utf8_lossy(&entry.path_bytes()).into_owned()
}

fn same_member(name: &str, wanted: &str) -> bool {
    name.trim_start_matches("./") == wanted
}

fn archive_error(e: std::io::Error) -> SdkError {
    SdkError::Archive(e.to_string())
}
