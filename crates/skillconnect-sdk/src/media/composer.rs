//! Media attached to a post being composed
//!
//! A [`MediaComposer`] lives for one composition session. It owns the
//! pending files and their previews, and uploads them one at a time.
//!
//! Suspension points are the duration probe in [`MediaComposer::select`]
//! and each object store call in [`MediaComposer::upload_all`]; no lock is
//! held across either. [`MediaComposer::close`] (or dropping the composer)
//! cancels an in-flight probe and releases every outstanding preview.
//! New files are refused while an upload runs, so the slots returned by
//! an upload always cover every pending item.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use skillconnect_storage_client::{object_path, ObjectStore};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::file::{MediaFile, MediaKind};
use super::preview::{PreviewHandle, PreviewRegistry};
use super::probe::MediaProbe;
use super::slots::MediaSlots;
use crate::config::MediaConfig;
use crate::error::MediaError;
use crate::notice::{Action, Notifier};
use crate::task::OrCancelExt;

type MediaResult<T> = std::result::Result<T, MediaError>;

struct Entry {
    generation: u64,
    file: MediaFile,
    kind: MediaKind,
    preview: Option<PreviewHandle>,
    url: Option<String>,
}

#[derive(Default)]
struct ComposerState {
    entries: Vec<Entry>,
    next_generation: u64,
    closed: bool,
    uploading: bool,
}

/// Clears the upload flag however `upload_all` ends, including when its
/// future is dropped
struct UploadGuard<'a>(&'a MediaComposer);

impl Drop for UploadGuard<'_> {
    fn drop(&mut self) {
        self.0.lock().uploading = false;
    }
}

/// Read-only view of a pending item
#[derive(Debug, Clone, PartialEq)]
pub struct PendingMedia {
    pub name: String,
    pub kind: MediaKind,
    pub preview_url: Option<String>,
    pub uploaded_url: Option<String>,
}

/// What happened to a selection batch that was not rejected outright
#[derive(Debug, Default)]
pub struct Selection {
    /// Names of files that became pending items
    pub accepted: Vec<String>,
    /// Per-file problems; each was also published as a notice
    pub rejected: Vec<MediaError>,
}

pub struct MediaComposer {
    owner: String,
    store: Option<Arc<dyn ObjectStore>>,
    probe: Arc<dyn MediaProbe>,
    previews: PreviewRegistry,
    notifier: Notifier,
    limits: MediaConfig,
    state: Mutex<ComposerState>,
    progress: watch::Sender<f64>,
    cancel: CancellationToken,
}

impl MediaComposer {
    /// `owner` becomes the folder uploads land in
    pub fn new(
        owner: impl Into<String>,
        store: Option<Arc<dyn ObjectStore>>,
        probe: Arc<dyn MediaProbe>,
        notifier: Notifier,
        limits: MediaConfig,
    ) -> Self {
        let (progress, _) = watch::channel(0.0);
        Self {
            owner: owner.into(),
            store,
            probe,
            previews: PreviewRegistry::new(),
            notifier,
            limits,
            state: Mutex::new(ComposerState::default()),
            progress,
            cancel: CancellationToken::new(),
        }
    }

    /// Share a preview registry (lets a session account for every composer)
    pub fn with_previews(mut self, previews: PreviewRegistry) -> Self {
        self.previews = previews;
        self
    }

    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }

    /// Upload progress, 0 to 100
    pub fn progress(&self) -> watch::Receiver<f64> {
        self.progress.subscribe()
    }

    pub fn items(&self) -> Vec<PendingMedia> {
        self.lock()
            .entries
            .iter()
            .map(|e| PendingMedia {
                name: e.file.name.clone(),
                kind: e.kind,
                preview_url: e.preview.as_ref().map(PreviewHandle::url),
                uploaded_url: e.url.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Add picked files.
    ///
    /// The whole batch is rejected when it would take the composer past the
    /// file limit. Otherwise files that are not images or videos are
    /// dropped, and each video is probed and dropped if it runs longer than
    /// the limit. Nothing can be added while [`Self::upload_all`] runs.
    pub async fn select(&self, files: Vec<MediaFile>) -> MediaResult<Selection> {
        let existing = {
            let state = self.lock();
            if state.closed {
                return Err(MediaError::Closed);
            }
            if state.uploading {
                drop(state);
                let err = MediaError::UploadInProgress;
                self.notifier.error(Action::SelectMedia, err.to_string());
                return Err(err);
            }
            state.entries.len()
        };

        if existing + files.len() > self.limits.max_files {
            let err = MediaError::TooManyFiles {
                max: self.limits.max_files,
                existing,
                attempted: files.len(),
            };
            self.notifier.error(Action::SelectMedia, err.to_string());
            return Err(err);
        }

        let mut selection = Selection::default();
        let mut unsupported = Vec::new();
        let mut candidates = Vec::new();
        for file in files {
            match file.kind() {
                Some(kind) => candidates.push((file, kind)),
                None => unsupported.push(file.name),
            }
        }
        if !unsupported.is_empty() {
            let err = MediaError::UnsupportedType { names: unsupported };
            self.notifier.error(Action::SelectMedia, err.to_string());
            selection.rejected.push(err);
        }

        for (file, kind) in candidates {
            if kind == MediaKind::Video {
                if let Err(err) = self.check_video(&file).await? {
                    self.notifier.error(Action::SelectMedia, err.to_string());
                    selection.rejected.push(err);
                    continue;
                }
            }

            let mut state = self.lock();
            if state.closed {
                return Err(MediaError::Closed);
            }
            // An upload started while this file was being probed
            if state.uploading {
                drop(state);
                let err = MediaError::UploadInProgress;
                self.notifier.error(Action::SelectMedia, err.to_string());
                selection.rejected.push(err);
                continue;
            }
            if state.entries.len() >= self.limits.max_files {
                let err = MediaError::TooManyFiles {
                    max: self.limits.max_files,
                    existing: state.entries.len(),
                    attempted: 1,
                };
                drop(state);
                self.notifier.error(Action::SelectMedia, err.to_string());
                selection.rejected.push(err);
                continue;
            }

            state.next_generation += 1;
            let generation = state.next_generation;
            let preview = self.previews.create(&file.name);
            debug!(name = %file.name, ?kind, generation, "Media selected");
            selection.accepted.push(file.name.clone());
            state.entries.push(Entry {
                generation,
                file,
                kind,
                preview: Some(preview),
                url: None,
            });
        }

        Ok(selection)
    }

    /// Probe a video. The outer error means the composer closed mid-probe;
    /// the inner one rejects just this file.
    async fn check_video(&self, file: &MediaFile) -> MediaResult<MediaResult<()>> {
        let probed = self
            .probe
            .duration_secs(file)
            .or_cancel(&self.cancel)
            .await
            .map_err(|_| MediaError::Closed)?;

        Ok(match probed {
            Ok(seconds) if seconds > self.limits.max_video_secs => Err(MediaError::VideoTooLong {
                name: file.name.clone(),
                seconds,
                limit: self.limits.max_video_secs,
            }),
            Ok(_) => Ok(()),
            Err(e) => Err(MediaError::MetadataProbeFailed {
                name: file.name.clone(),
                reason: e.to_string(),
            }),
        })
    }

    /// Drop the pending item at `index` and release its preview.
    ///
    /// Safe during an upload: the in-flight upload finishes but its result
    /// is not attached.
    pub fn remove(&self, index: usize) -> MediaResult<()> {
        let entry = {
            let mut state = self.lock();
            if state.closed {
                return Err(MediaError::Closed);
            }
            if index >= state.entries.len() {
                return Err(MediaError::NoSuchItem(index));
            }
            state.entries.remove(index)
        };
        debug!(index, name = %entry.file.name, "Media removed");
        if let Some(preview) = entry.preview {
            preview.release();
        }
        Ok(())
    }

    /// Upload every pending item in order and return the post's media slots.
    ///
    /// Items already uploaded by an earlier attempt keep their reference.
    /// The first failed upload fails the whole call, as does a second call
    /// made while one is running.
    pub async fn upload_all(&self) -> MediaResult<MediaSlots> {
        let (batch, _guard) = {
            let mut state = self.lock();
            if state.closed {
                return Err(MediaError::Closed);
            }
            if state.uploading {
                return Err(MediaError::UploadInProgress);
            }
            state.uploading = true;
            let batch: Vec<(u64, Option<MediaFile>)> = state
                .entries
                .iter()
                .map(|e| (e.generation, e.url.is_none().then(|| e.file.clone())))
                .collect();
            (batch, UploadGuard(self))
        };

        let needs_upload = batch.iter().any(|(_, file)| file.is_some());
        let store = match (&self.store, needs_upload) {
            (Some(store), _) => Some(store.clone()),
            (None, false) => None,
            (None, true) => {
                let err = MediaError::UploadServiceUnavailable;
                self.notifier.error(Action::UploadMedia { file_index: 0 }, err.to_string());
                return Err(err);
            }
        };

        let total = batch.len();
        if total > 0 {
            self.progress.send_replace(0.0);
        }

        let mut completed = 0usize;
        for (file_index, (generation, file)) in batch.iter().enumerate() {
            if let (Some(file), Some(store)) = (file, store.as_ref()) {
                let path = object_path(&self.owner, &file.name);
                let uploaded = store.upload(&path, file.data.to_vec(), &file.mime).await;

                match uploaded {
                    Ok(stored) => {
                        let mut state = self.lock();
                        match state.entries.iter_mut().find(|e| e.generation == *generation) {
                            Some(entry) => entry.url = Some(stored.public_url),
                            None => debug!(file_index, path = %stored.path, "Discarding upload of removed item"),
                        }
                    }
                    Err(e) => {
                        warn!(file_index, name = %file.name, error = %e, "Upload failed");
                        let err = MediaError::UploadFailed {
                            file_index,
                            reason: e.to_string(),
                        };
                        self.notifier
                            .error(Action::UploadMedia { file_index }, err.to_string());
                        return Err(err);
                    }
                }
            }

            completed += 1;
            self.progress
                .send_replace(completed as f64 / total as f64 * 100.0);
        }

        let state = self.lock();
        let slots = MediaSlots::from_urls(state.entries.iter().filter_map(|e| e.url.clone()));
        info!(files = slots.filled().count(), "Media ready");
        Ok(slots)
    }

    /// End the session: cancel any probe and release every preview.
    /// Calling it again does nothing.
    pub fn close(&self) {
        let entries = {
            let mut state = self.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            std::mem::take(&mut state.entries)
        };
        self.cancel.cancel();

        let released = entries.len();
        for entry in entries {
            if let Some(preview) = entry.preview {
                preview.release();
            }
        }
        debug!(released, "Composer closed");
    }

    fn lock(&self) -> MutexGuard<'_, ComposerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for MediaComposer {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::probe::{synthetic_mp4, ContainerProbe};
    use crate::notice::drain;
    use skillconnect_storage_client::MemoryObjectStore;

    fn png(name: &str) -> MediaFile {
        MediaFile::new(name, "image/png", vec![0x89, b'P', b'N', b'G'])
    }

    fn video(name: &str, millis: u32) -> MediaFile {
        MediaFile::new(name, "video/mp4", synthetic_mp4(1000, millis))
    }

    fn new_composer(store: Option<Arc<dyn ObjectStore>>) -> MediaComposer {
        MediaComposer::new("7", store, Arc::new(ContainerProbe), Notifier::new(), MediaConfig::default())
    }

    #[tokio::test]
    async fn test_too_many_files_rejects_batch() {
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe();
        let composer = MediaComposer::new(
            "7",
            None,
            Arc::new(ContainerProbe),
            notifier,
            MediaConfig::default(),
        );
        composer.select(vec![png("a.png"), png("b.png")]).await.unwrap();

        let err = composer
            .select(vec![png("c.png"), png("d.png")])
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::TooManyFiles { existing: 2, attempted: 2, .. }));
        assert_eq!(composer.len(), 2);
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[tokio::test]
    async fn test_unsupported_types_dropped() {
        let composer = new_composer(None);
        let selection = composer
            .select(vec![png("a.png"), MediaFile::new("cv.pdf", "application/pdf", vec![1])])
            .await
            .unwrap();

        assert_eq!(selection.accepted, vec!["a.png".to_string()]);
        assert_eq!(
            selection.rejected,
            vec![MediaError::UnsupportedType { names: vec!["cv.pdf".into()] }]
        );
    }

    #[tokio::test]
    async fn test_video_duration_boundary() {
        let composer = new_composer(None);
        let selection = composer
            .select(vec![video("ok.mp4", 30_000), video("long.mp4", 30_100)])
            .await
            .unwrap();

        assert_eq!(selection.accepted, vec!["ok.mp4".to_string()]);
        assert!(matches!(
            &selection.rejected[..],
            [MediaError::VideoTooLong { name, .. }] if name == "long.mp4"
        ));
    }

    #[tokio::test]
    async fn test_unreadable_video() {
        let composer = new_composer(None);
        let selection = composer
            .select(vec![MediaFile::new("broken.mp4", "video/mp4", vec![0u8; 4])])
            .await
            .unwrap();
        assert!(matches!(
            &selection.rejected[..],
            [MediaError::MetadataProbeFailed { .. }]
        ));
        assert!(composer.is_empty());
    }

    #[tokio::test]
    async fn test_upload_all_fills_slots_and_progress() {
        let store = Arc::new(MemoryObjectStore::new());
        let composer = new_composer(Some(store.clone()));
        let progress = composer.progress();
        composer.select(vec![png("a.png"), png("b.png")]).await.unwrap();

        let slots = composer.upload_all().await.unwrap();
        assert_eq!(slots.filled().count(), 2);
        assert_eq!(slots.get(2), Some(""));
        assert_eq!(*progress.borrow(), 100.0);
        assert!(store.paths().iter().all(|p| p.starts_with("posts/7/")));
    }

    #[tokio::test]
    async fn test_unavailable_store_checked_first() {
        let composer = new_composer(None);
        composer.select(vec![png("a.png")]).await.unwrap();
        assert_eq!(
            composer.upload_all().await,
            Err(MediaError::UploadServiceUnavailable)
        );

        let empty = new_composer(None);
        assert_eq!(empty.upload_all().await, Ok(MediaSlots::empty()));
    }

    #[tokio::test]
    async fn test_failed_upload_names_file() {
        let store = Arc::new(MemoryObjectStore::new().failing_on(2));
        let composer = new_composer(Some(store.clone()));
        composer
            .select(vec![png("a.png"), png("b.png"), png("c.png")])
            .await
            .unwrap();

        let err = composer.upload_all().await.unwrap_err();
        assert!(matches!(err, MediaError::UploadFailed { file_index: 1, .. }));
        assert_eq!(store.upload_count(), 2);

        // Retrying uploads only what is missing
        let slots = composer.upload_all().await.unwrap();
        assert_eq!(slots.filled().count(), 3);
        assert_eq!(store.upload_count(), 4);
    }

    #[tokio::test]
    async fn test_close_releases_everything_once() {
        let composer = new_composer(None);
        let previews = composer.previews().clone();
        composer.select(vec![png("a.png"), png("b.png")]).await.unwrap();
        composer.remove(0).unwrap();
        assert_eq!(previews.outstanding(), 1);

        composer.close();
        composer.close();
        assert_eq!(previews.outstanding(), 0);
        assert_eq!(previews.released(), previews.created());
        assert_eq!(composer.remove(0), Err(MediaError::Closed));
    }

    #[tokio::test]
    async fn test_drop_releases_previews() {
        let previews = PreviewRegistry::new();
        {
            let composer = new_composer(None).with_previews(previews.clone());
            composer.select(vec![png("a.png")]).await.unwrap();
        }
        assert_eq!(previews.outstanding(), 0);
        assert_eq!(previews.created(), 1);
    }

    #[test]
    fn test_remove_out_of_range() {
        let composer = new_composer(None);
        assert_eq!(composer.remove(0), Err(MediaError::NoSuchItem(0)));
    }
}
