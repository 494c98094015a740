//! PDF loading
//!
//! A picked file is checked for being a PDF, then page 1 is rasterized on a
//! background thread. The raster becomes the canvas backdrop and fixes the
//! canvas size. Rasterization itself is delegated to a [`PageRasterizer`]
//! implementation (see the `takeoff-pdf` crate).

use crate::error::{EditorError, EditorResult};
use std::path::Path;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

/// Leading bytes of every PDF file
pub const PDF_MAGIC: &[u8] = b"%PDF-";

/// Check that a file is a PDF by extension or content
///
/// Accepts a `.pdf` extension (any case) or a body starting with `%PDF-`.
pub fn ensure_pdf(file_name: &str, bytes: &[u8]) -> EditorResult<()> {
    let has_extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

    if has_extension || bytes.starts_with(PDF_MAGIC) {
        Ok(())
    } else {
        warn!(file_name, "rejected non-PDF file");
        Err(EditorError::UnsupportedFileType(file_name.to_string()))
    }
}

/// Rasterization parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterRequest {
    /// Multiplier applied to the page size in points
    pub scale: f64,
}

impl Default for RasterRequest {
    fn default() -> Self {
        Self { scale: 1.5 }
    }
}

/// RGBA raster of page 1
#[derive(Clone, PartialEq)]
pub struct PageRaster {
    pub width: u32,
    pub height: u32,
    /// Row-major RGBA8, `width * height * 4` bytes
    pub pixels: Vec<u8>,
}

impl PageRaster {
    /// Page size as canvas coordinates
    pub fn size(&self) -> (f64, f64) {
        (f64::from(self.width), f64::from(self.height))
    }
}

impl std::fmt::Debug for PageRaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageRaster")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// Turns PDF bytes into a raster of the first page
pub trait PageRasterizer: Send + Sync {
    fn rasterize(&self, bytes: &[u8], request: RasterRequest) -> EditorResult<PageRaster>;
}

/// Page 1 rasterization running on a background thread
///
/// The result is delivered once: after [`PdfLoadTask::try_get`] returns
/// `Some`, later calls return `None`.
pub struct PdfLoadTask {
    thread: Option<JoinHandle<()>>,
    receiver: Receiver<EditorResult<PageRaster>>,
    pending: Option<EditorResult<PageRaster>>,
    delivered: bool,
}

impl PdfLoadTask {
    /// Validate the file type, then start rasterizing
    ///
    /// A non-PDF is rejected here, before any thread is spawned.
    pub fn spawn(
        file_name: &str,
        bytes: Vec<u8>,
        rasterizer: Arc<dyn PageRasterizer>,
        scale: f64,
    ) -> EditorResult<Self> {
        ensure_pdf(file_name, &bytes)?;
        if !(scale.is_finite() && scale > 0.0) {
            return Err(EditorError::InvalidInput(format!(
                "render scale must be positive, got {scale}"
            )));
        }

        let (sender, receiver) = mpsc::channel();
        let name = file_name.to_string();
        info!(file_name, bytes = bytes.len(), scale, "loading PDF");

        let thread = std::thread::spawn(move || {
            let result = rasterizer.rasterize(&bytes, RasterRequest { scale });
            match &result {
                Ok(raster) => debug!(
                    file_name = %name,
                    width = raster.width,
                    height = raster.height,
                    "page rasterized"
                ),
                Err(error) => warn!(file_name = %name, %error, "page rasterization failed"),
            }
            // The receiver may already be gone if the task was dropped
            let _ = sender.send(result);
        });

        Ok(Self { thread: Some(thread), receiver, pending: None, delivered: false })
    }

    /// True once the background thread has produced its result
    pub fn is_complete(&mut self) -> bool {
        self.poll();
        self.pending.is_some() || self.delivered
    }

    /// Take the result without blocking
    ///
    /// Returns `None` while rasterizing and after the result was taken.
    pub fn try_get(&mut self) -> Option<EditorResult<PageRaster>> {
        self.poll();
        let result = self.pending.take();
        if result.is_some() {
            self.delivered = true;
            self.join();
        }
        result
    }

    /// Block until rasterization finishes
    pub fn wait(mut self) -> EditorResult<PageRaster> {
        if let Some(result) = self.pending.take() {
            self.join();
            return result;
        }
        if self.delivered {
            return Err(EditorError::Raster("load result was already taken".to_string()));
        }

        let result = self.receiver.recv().unwrap_or_else(|_| {
            Err(EditorError::Raster("rasterizer thread exited without a result".to_string()))
        });
        self.join();
        result
    }

    fn poll(&mut self) {
        if self.pending.is_some() || self.delivered {
            return;
        }
        match self.receiver.try_recv() {
            Ok(result) => self.pending = Some(result),
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                self.pending = Some(Err(EditorError::Raster(
                    "rasterizer thread exited without a result".to_string(),
                )));
            }
        }
    }

    fn join(&mut self) {
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                warn!("rasterizer thread panicked");
            }
        }
    }
}
