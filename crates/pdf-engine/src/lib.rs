//! Page rasterization for the takeoff editor
//!
//! Only the first page is ever read. The default backend parses the page
//! tree with `lopdf` to find the MediaBox and produces a blank page raster of
//! the scaled size, which is enough for the canvas to be sized and drawn on.

use image::{ImageBuffer, Rgba};
use lopdf::{Dictionary, Document, Object, ObjectId};
use takeoff_core::document::{PageRaster, PageRasterizer, RasterRequest};
use takeoff_core::EditorError;
use tracing::debug;

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

/// US Letter, used when a page carries no usable MediaBox
pub const DEFAULT_PAGE_SIZE: PageSize = PageSize { width_pt: 612.0, height_pt: 792.0 };

/// Largest raster edge we agree to allocate
pub const MAX_RASTER_DIMENSION: u32 = 16_384;

const PAGE_BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const PAGE_BORDER: Rgba<u8> = Rgba([220, 220, 220, 255]);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

/// Summary of a PDF file
#[derive(Debug, Clone, PartialEq)]
pub struct PdfInfo {
    pub version: String,
    pub page_count: u32,
    /// Size of page 1 in points
    pub first_page: PageSize,
}

#[derive(Debug, thiserror::Error)]
pub enum PdfEngineError {
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("encrypted PDFs are not supported in the default backend")]
    EncryptedUnsupported,
    #[error("document has no pages")]
    NoPages,
    #[error("raster of {width}x{height} px exceeds the maximum page raster size")]
    TooLarge { width: u32, height: u32 },
}

impl From<PdfEngineError> for EditorError {
    fn from(err: PdfEngineError) -> Self {
        EditorError::Raster(err.to_string())
    }
}

fn load(bytes: &[u8]) -> Result<Document, PdfEngineError> {
    if bytes.windows("/Encrypt".len()).any(|window| window == b"/Encrypt") {
        return Err(PdfEngineError::EncryptedUnsupported);
    }
    Ok(Document::load_mem(bytes)?)
}

fn first_page_id(doc: &Document) -> Result<ObjectId, PdfEngineError> {
    doc.get_pages().into_iter().next().map(|(_, id)| id).ok_or(PdfEngineError::NoPages)
}

/// Size of a page, following `Parent` links for an inherited MediaBox
fn page_size(doc: &Document, page_id: ObjectId) -> PageSize {
    let mut current = Some(page_id);
    while let Some(id) = current {
        let Ok(dict) = doc.get_dictionary(id) else {
            break;
        };
        if let Some(size) = media_box(doc, dict) {
            return size;
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }
    DEFAULT_PAGE_SIZE
}

fn media_box(doc: &Document, dict: &Dictionary) -> Option<PageSize> {
    let raw = dict.get(b"MediaBox").ok()?;
    let resolved = match raw {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };
    let array = resolved.as_array().ok()?;
    if array.len() != 4 {
        return None;
    }
    let x0 = number(&array[0])?;
    let y0 = number(&array[1])?;
    let x1 = number(&array[2])?;
    let y1 = number(&array[3])?;
    Some(PageSize { width_pt: (x1 - x0).abs(), height_pt: (y1 - y0).abs() })
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value),
        _ => None,
    }
}

/// Read version, page count and page 1 size
pub fn inspect(bytes: &[u8]) -> Result<PdfInfo, PdfEngineError> {
    let doc = load(bytes)?;
    let page_id = first_page_id(&doc)?;
    Ok(PdfInfo {
        version: doc.version.clone(),
        page_count: doc.get_pages().len() as u32,
        first_page: page_size(&doc, page_id),
    })
}

/// Raster dimensions of a page at `scale`
pub fn raster_dimensions(size: PageSize, scale: f64) -> Result<(u32, u32), PdfEngineError> {
    let scale = if scale <= 0.0 || !scale.is_finite() { 1.0 } else { scale };
    let width = (f64::from(size.width_pt) * scale).round().max(1.0) as u32;
    let height = (f64::from(size.height_pt) * scale).round().max(1.0) as u32;

    if width > MAX_RASTER_DIMENSION || height > MAX_RASTER_DIMENSION {
        return Err(PdfEngineError::TooLarge { width, height });
    }
    Ok((width, height))
}

/// Render page 1 at `scale` (1.0 = one pixel per point)
pub fn render_first_page(bytes: &[u8], scale: f64) -> Result<RgbaImage, PdfEngineError> {
    let doc = load(bytes)?;
    let size = page_size(&doc, first_page_id(&doc)?);
    let (width, height) = raster_dimensions(size, scale)?;

    let mut image = RgbaImage::from_pixel(width, height, PAGE_BACKGROUND);

    if width >= 4 && height >= 4 {
        for x in 0..width {
            image.put_pixel(x, 0, PAGE_BORDER);
            image.put_pixel(x, height - 1, PAGE_BORDER);
        }
        for y in 0..height {
            image.put_pixel(0, y, PAGE_BORDER);
            image.put_pixel(width - 1, y, PAGE_BORDER);
        }
    }

    debug!(width, height, scale, "rendered first page");
    Ok(image)
}

/// [`PageRasterizer`] backed by lopdf
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfRasterizer;

impl LopdfRasterizer {
    pub fn new() -> Self {
        Self
    }
}

impl PageRasterizer for LopdfRasterizer {
    fn rasterize(&self, bytes: &[u8], request: RasterRequest) -> Result<PageRaster, EditorError> {
        let image = render_first_page(bytes, request.scale)?;
        let (width, height) = image.dimensions();
        Ok(PageRaster { width, height, pixels: image.into_raw() })
    }
}

pub fn default_rasterizer() -> LopdfRasterizer {
    LopdfRasterizer::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;
    use std::sync::Arc;
    use takeoff_core::document::PdfLoadTask;

    /// Build a PDF whose MediaBox sits on the page or, with `inherit`, on the
    /// page tree root
    fn sample_pdf(width: i64, height: i64, pages: usize, inherit: bool) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let media_box = Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(width),
            Object::Integer(height),
        ]);

        let kids: Vec<Object> = (0..pages)
            .map(|_| {
                let mut page = dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                };
                if !inherit {
                    page.set("MediaBox", media_box.clone());
                }
                doc.add_object(page).into()
            })
            .collect();

        let mut tree = dictionary! {
            "Type" => "Pages",
            "Count" => pages as i64,
            "Kids" => kids,
        };
        if inherit {
            tree.set("MediaBox", media_box);
        }
        doc.objects.insert(pages_id, Object::Dictionary(tree));

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("save should succeed");
        bytes
    }

    #[test]
    fn inspect_reads_page_count_and_size() {
        let info = inspect(&sample_pdf(200, 100, 3, false)).expect("inspect should succeed");

        assert_eq!(info.page_count, 3);
        assert_eq!(info.version, "1.5");
        assert_eq!(info.first_page, PageSize { width_pt: 200.0, height_pt: 100.0 });
    }

    #[test]
    fn inherited_media_box_is_used() {
        let info = inspect(&sample_pdf(300, 400, 1, true)).expect("inspect should succeed");
        assert_eq!(info.first_page, PageSize { width_pt: 300.0, height_pt: 400.0 });
    }

    #[test]
    fn rasterize_scales_page_size() {
        let raster = LopdfRasterizer::new()
            .rasterize(&sample_pdf(200, 100, 1, false), RasterRequest { scale: 1.5 })
            .expect("rasterize should succeed");

        assert_eq!((raster.width, raster.height), (300, 150));
        assert_eq!(raster.pixels.len(), 300 * 150 * 4);
        assert_eq!(&raster.pixels[..4], &PAGE_BORDER.0);
        let center = ((75 * 300 + 150) * 4) as usize;
        assert_eq!(&raster.pixels[center..center + 4], &PAGE_BACKGROUND.0);
    }

    #[test]
    fn garbage_is_a_raster_error() {
        let err = LopdfRasterizer::new()
            .rasterize(b"not a pdf at all", RasterRequest::default())
            .expect_err("should fail to parse");
        assert!(matches!(err, EditorError::Raster(_)));
    }

    #[test]
    fn encrypted_is_rejected() {
        let err = inspect(b"%PDF-1.4\n<< /Encrypt 5 0 R >>").expect_err("should be rejected");
        assert!(matches!(err, PdfEngineError::EncryptedUnsupported));
    }

    #[test]
    fn oversized_raster_is_rejected() {
        let size = PageSize { width_pt: 14_400.0, height_pt: 14_400.0 };
        assert!(matches!(
            raster_dimensions(size, 2.0),
            Err(PdfEngineError::TooLarge { width: 28_800, height: 28_800 })
        ));
        assert_eq!(raster_dimensions(size, 0.5).expect("fits"), (7_200, 7_200));
    }

    #[test]
    fn load_task_with_lopdf_backend() {
        let task = PdfLoadTask::spawn(
            "plan.pdf",
            sample_pdf(100, 80, 1, false),
            Arc::new(LopdfRasterizer::new()),
            2.0,
        )
        .expect("spawn should succeed");

        let raster = task.wait().expect("load should succeed");
        assert_eq!(raster.size(), (200.0, 160.0));
    }
}
