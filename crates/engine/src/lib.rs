//! PaperChat Rendering Engine
//!
//! Abstracts the PDF decoding/rasterization capability the workspace
//! consumes: open a byte source, read the page count, and render any page
//! at a scale factor into a bitmap surface plus the positioned text runs
//! that overlay it.

use image::{ImageBuffer, Rgba};
use lopdf::Document;
use std::collections::HashMap;

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

/// Opaque handle to an opened document, issued by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(u64);

impl DocumentHandle {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Page dimensions in points (1/72 inch), before scaling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

/// One positioned run of text on a rendered page.
///
/// All geometry is expressed in pixels at the scale the page was rendered
/// at, so runs stay aligned with the bitmap they accompany.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub content: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// A rendered page: the bitmap surface and its text-run overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct PageSurface {
    pub bitmap: RgbaImage,
    pub text_runs: Vec<TextRun>,
}

impl PageSurface {
    pub fn width_px(&self) -> u32 {
        self.bitmap.width()
    }

    pub fn height_px(&self) -> u32 {
        self.bitmap.height()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("invalid handle {0}")]
    InvalidHandle(u64),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("encrypted PDFs are not supported in the default backend")]
    EncryptedUnsupported,
    #[error("backend error: {0}")]
    Backend(String),
}

pub trait RenderEngine {
    fn open(&mut self, bytes: Vec<u8>) -> Result<DocumentHandle, EngineError>;
    fn page_count(&self, handle: DocumentHandle) -> Result<u32, EngineError>;
    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, EngineError>;
    fn render_page(
        &self,
        handle: DocumentHandle,
        page_index: u32,
        scale: f32,
    ) -> Result<PageSurface, EngineError>;
    fn close(&mut self, handle: DocumentHandle) -> Result<(), EngineError>;
}

// Text-run layout constants for the lopdf backend. Courier metrics: a
// fixed advance of 0.6em keeps run widths proportional to content length.
const FONT_SIZE_PT: f32 = 12.0;
const LINE_HEIGHT_PT: f32 = 16.0;
const MARGIN_PT: f32 = 36.0;
const GLYPH_ADVANCE_EM: f32 = 0.6;

#[derive(Debug, Clone)]
struct PageRecord {
    size: PageSize,
    text_lines: Vec<String>,
}

#[derive(Debug, Clone)]
struct DocumentRecord {
    pages: Vec<PageRecord>,
}

/// Default backend built on `lopdf`.
///
/// Parses page geometry and text content at open time and synthesizes a
/// placeholder bitmap per page; text runs are laid out top-down with the
/// geometry scaled consistently with the bitmap.
#[derive(Debug, Default)]
pub struct LopdfEngine {
    next_handle: u64,
    docs: HashMap<DocumentHandle, DocumentRecord>,
}

impl LopdfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse_pages(bytes: &[u8]) -> Result<Vec<PageRecord>, EngineError> {
        if bytes.windows("/Encrypt".len()).any(|window| window == b"/Encrypt") {
            return Err(EngineError::EncryptedUnsupported);
        }

        let doc = Document::load_mem(bytes)?;
        let pages = doc.get_pages();
        let mut records = Vec::with_capacity(pages.len());

        for (page_number, object_id) in pages {
            let dict = doc.get_dictionary(object_id)?;
            let size = dict
                .get(b"MediaBox")
                .ok()
                .and_then(|obj| obj.as_array().ok())
                .and_then(|array| {
                    if array.len() != 4 {
                        return None;
                    }
                    let x0 = array[0].as_float().ok()?;
                    let y0 = array[1].as_float().ok()?;
                    let x1 = array[2].as_float().ok()?;
                    let y1 = array[3].as_float().ok()?;
                    Some(PageSize { width_pt: (x1 - x0).abs(), height_pt: (y1 - y0).abs() })
                })
                .unwrap_or(PageSize { width_pt: 612.0, height_pt: 792.0 });

            // Extraction failure degrades to a page with no text layer.
            let text_lines = doc
                .extract_text(&[page_number])
                .map(|text| {
                    text.lines()
                        .map(str::trim)
                        .filter(|line| !line.is_empty())
                        .map(ToOwned::to_owned)
                        .collect()
                })
                .unwrap_or_default();

            records.push(PageRecord { size, text_lines });
        }

        if records.is_empty() {
            return Err(EngineError::Backend("document has no pages".to_owned()));
        }

        Ok(records)
    }

    fn record(&self, handle: DocumentHandle) -> Result<&DocumentRecord, EngineError> {
        self.docs.get(&handle).ok_or(EngineError::InvalidHandle(handle.raw()))
    }

    fn page(&self, handle: DocumentHandle, page_index: u32) -> Result<&PageRecord, EngineError> {
        let record = self.record(handle)?;
        record.pages.get(page_index as usize).ok_or(EngineError::PageOutOfRange {
            page: page_index,
            page_count: record.pages.len() as u32,
        })
    }
}

impl RenderEngine for LopdfEngine {
    fn open(&mut self, bytes: Vec<u8>) -> Result<DocumentHandle, EngineError> {
        let pages = Self::parse_pages(&bytes)?;

        self.next_handle += 1;
        let handle = DocumentHandle(self.next_handle);
        self.docs.insert(handle, DocumentRecord { pages });

        Ok(handle)
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, EngineError> {
        Ok(self.record(handle)?.pages.len() as u32)
    }

    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, EngineError> {
        Ok(self.page(handle, page_index)?.size)
    }

    fn render_page(
        &self,
        handle: DocumentHandle,
        page_index: u32,
        scale: f32,
    ) -> Result<PageSurface, EngineError> {
        let page = self.page(handle, page_index)?;
        let scale = if scale <= 0.0 { 1.0 } else { scale };

        let width = (page.size.width_pt * scale).round().max(1.0) as u32;
        let height = (page.size.height_pt * scale).round().max(1.0) as u32;

        let mut bitmap = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));

        if width >= 4 && height >= 4 {
            for x in 0..width {
                bitmap.put_pixel(x, 0, Rgba([220, 220, 220, 255]));
                bitmap.put_pixel(x, height - 1, Rgba([220, 220, 220, 255]));
            }
            for y in 0..height {
                bitmap.put_pixel(0, y, Rgba([220, 220, 220, 255]));
                bitmap.put_pixel(width - 1, y, Rgba([220, 220, 220, 255]));
            }
        }

        let mut text_runs = Vec::with_capacity(page.text_lines.len());
        for (line_index, line) in page.text_lines.iter().enumerate() {
            let y_pt = MARGIN_PT + line_index as f32 * LINE_HEIGHT_PT;
            if y_pt + FONT_SIZE_PT > page.size.height_pt {
                break;
            }

            text_runs.push(TextRun {
                content: line.clone(),
                x: MARGIN_PT * scale,
                y: y_pt * scale,
                width: line.chars().count() as f32 * GLYPH_ADVANCE_EM * FONT_SIZE_PT * scale,
                height: FONT_SIZE_PT * scale,
            });
        }

        Ok(PageSurface { bitmap, text_runs })
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), EngineError> {
        self.docs.remove(&handle).map(|_| ()).ok_or(EngineError::InvalidHandle(handle.raw()))
    }
}

pub fn default_engine() -> LopdfEngine {
    LopdfEngine::new()
}
