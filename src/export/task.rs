use futures::channel::oneshot;
use futures::executor::ThreadPool;
use std::sync::Arc;

use super::progress::ProgressBroadcast;
use super::sink::{OutputSink, ResultLocation};
use super::{CancelToken, ExportRequest, GifExporter};
use crate::error::{ExportError, ExportResult};

/// Runs exports off the UI thread, one at a time, and publishes their
/// progress on a shared broadcast
pub struct ExportService {
    pool: ThreadPool,
    exporter: Arc<GifExporter>,
    progress: ProgressBroadcast,
}

impl std::fmt::Debug for ExportService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportService")
            .field("exporter", &self.exporter)
            .field("progress", &self.progress)
            .finish()
    }
}

impl ExportService {
    pub fn new(exporter: GifExporter) -> ExportResult<Self> {
        let pool = ThreadPool::builder()
            .pool_size(1)
            .name_prefix("gif-export-")
            .create()?;
        Ok(Self {
            pool,
            exporter: Arc::new(exporter),
            progress: ProgressBroadcast::new(),
        })
    }

    pub fn progress(&self) -> &ProgressBroadcast {
        &self.progress
    }

    pub fn exporter(&self) -> &GifExporter {
        &self.exporter
    }

    /// Queue `request` for export into `sink`.
    ///
    /// The export keeps running if the returned handle is dropped; only
    /// [`ExportHandle::cancel`] stops it.
    pub fn start(&self, request: ExportRequest, sink: Arc<dyn OutputSink>) -> ExportHandle {
        let cancel = CancelToken::new();
        let (tx, rx) = oneshot::channel();
        let exporter = Arc::clone(&self.exporter);
        let progress = self.progress.clone();
        let token = cancel.clone();

        // a newer start supersedes this run on the broadcast
        let run = progress.begin();
        self.pool.spawn_ok(async move {
            let outcome = exporter.export(&request, sink.as_ref(), &token, &mut |percent| {
                progress.exporting(run, percent)
            });
            match &outcome {
                Ok(location) => progress.complete(run, location.clone()),
                Err(err) => {
                    log::warn!("Export failed: {}", err);
                    progress.fail(run, err);
                }
            }
            // nobody waiting is fine, the broadcast already has the result
            let _ = tx.send(outcome);
        });

        ExportHandle {
            cancel,
            receiver: Some(rx),
        }
    }
}

/// Caller's side of one queued export
#[derive(Debug)]
pub struct ExportHandle {
    cancel: CancelToken,
    receiver: Option<oneshot::Receiver<ExportResult<ResultLocation>>>,
}

impl ExportHandle {
    /// Ask the export to stop after the frame in flight
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait for the export to finish
    pub async fn outcome(mut self) -> ExportResult<ResultLocation> {
        match self.receiver.take() {
            Some(receiver) => receiver.await.unwrap_or(Err(ExportError::Join)),
            None => Err(ExportError::Join),
        }
    }

    /// The result, if the export has finished and it was not taken yet
    pub fn try_take(&mut self) -> Option<ExportResult<ResultLocation>> {
        let receiver = self.receiver.as_mut()?;
        match receiver.try_recv() {
            Ok(Some(outcome)) => {
                self.receiver = None;
                Some(outcome)
            }
            Ok(None) => None,
            Err(oneshot::Canceled) => {
                self.receiver = None;
                Some(Err(ExportError::Join))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::background::Background;
    use crate::export::{DirectorySink, ExportPhase};
    use crate::stroke::{BrushEffect, Stroke, TimedPoint};
    use egui::{Color32, Pos2};
    use futures::executor::block_on;

    fn request_lasting(end_ms: u64) -> ExportRequest {
        let stroke = Stroke::new(
            Color32::from_rgb(0, 255, 255),
            6.0,
            BrushEffect::Glow,
            vec![
                TimedPoint::new(Pos2::new(4.0, 4.0), 0),
                TimedPoint::new(Pos2::new(28.0, 20.0), end_ms),
            ],
        )
        .unwrap();
        ExportRequest::new(vec![stroke], 32, 24, Background::Solid(Color32::BLACK))
    }

    fn request() -> ExportRequest {
        request_lasting(40)
    }

    #[test]
    fn test_service_reports_completion() {
        let dir = tempfile::tempdir().unwrap();
        let service = ExportService::new(GifExporter::default()).unwrap();
        let handle = service.start(request(), Arc::new(DirectorySink::new(dir.path())));

        let location = block_on(handle.outcome()).unwrap();
        assert!(location.path().exists());

        let progress = service.progress().current();
        assert_eq!(progress.phase, ExportPhase::Completed);
        assert_eq!(progress.percent, 100);
        assert_eq!(progress.result, Some(location));
    }

    #[test]
    fn test_service_rejects_empty_raster() {
        let dir = tempfile::tempdir().unwrap();
        let service = ExportService::new(GifExporter::default()).unwrap();
        let mut bad = request();
        bad.width = 0;
        let handle = service.start(bad, Arc::new(DirectorySink::new(dir.path())));

        let err = block_on(handle.outcome()).unwrap_err();
        assert!(matches!(err, ExportError::InvalidDimensions { .. }));
        assert_eq!(service.progress().current().phase, ExportPhase::Failed);
    }

    #[test]
    fn test_back_to_back_exports_report_the_latest() {
        let dir = tempfile::tempdir().unwrap();
        let sink: Arc<dyn OutputSink> = Arc::new(DirectorySink::new(dir.path()));
        let service = ExportService::new(GifExporter::default()).unwrap();

        let first = service.start(request_lasting(400), Arc::clone(&sink));
        let second = service.start(request(), sink);

        let first_location = block_on(first.outcome()).unwrap();
        let second_location = block_on(second.outcome()).unwrap();
        assert_ne!(first_location, second_location);

        let progress = service.progress().current();
        assert_eq!(progress.phase, ExportPhase::Completed);
        assert_eq!(progress.percent, 100);
        assert_eq!(progress.result, Some(second_location));
    }
}
