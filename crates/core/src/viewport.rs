//! Viewport controller: the active document's rendered pages and the
//! zoom scale driving them.

use crate::library::DocumentId;
use paperchat_engine::{DocumentHandle, EngineError, RenderEngine, RgbaImage, TextRun};

pub const MIN_SCALE: f32 = 0.5;
pub const MAX_SCALE: f32 = 3.0;
pub const DEFAULT_SCALE: f32 = 1.75;
pub const ZOOM_STEP: f32 = 0.25;

/// One fully rendered page: bitmap surface plus its text-run overlay,
/// both produced at the viewport's current scale.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage {
    pub page_index: u32,
    pub bitmap: RgbaImage,
    pub text_runs: Vec<TextRun>,
}

impl RenderedPage {
    pub fn width_px(&self) -> u32 {
        self.bitmap.width()
    }

    pub fn height_px(&self) -> u32 {
        self.bitmap.height()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ViewportError {
    #[error("failed to load document: {0}")]
    DocumentLoad(#[from] EngineError),
    #[error("no active document")]
    NoDocument,
}

/// Tags one render request with the document, scale, and generation it
/// was issued for. A completion whose ticket no longer matches the
/// viewport's generation is stale and must be discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTicket {
    generation: u64,
    document_id: DocumentId,
    scale: f32,
}

impl RenderTicket {
    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }
}

/// Owns the current zoom scale and the derived page list.
///
/// `pages` is always recomputed wholesale; no render path patches it
/// incrementally, so text-run geometry can never drift from the bitmaps.
#[derive(Debug)]
pub struct ViewportController {
    active_document: Option<DocumentId>,
    handle: Option<DocumentHandle>,
    page_count: u32,
    scale: f32,
    pages: Vec<RenderedPage>,
    generation: u64,
}

impl Default for ViewportController {
    fn default() -> Self {
        Self {
            active_document: None,
            handle: None,
            page_count: 0,
            scale: DEFAULT_SCALE,
            pages: Vec::new(),
            generation: 0,
        }
    }
}

impl ViewportController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens `bytes` through the engine and makes the document current.
    /// Any failure (open or page render) leaves the prior viewport state
    /// untouched; the commit happens only once every page has rendered.
    pub fn load_document<E: RenderEngine>(
        &mut self,
        engine: &mut E,
        id: DocumentId,
        bytes: Vec<u8>,
    ) -> Result<u32, ViewportError> {
        let handle = engine.open(bytes)?;
        let page_count = match engine.page_count(handle) {
            Ok(count) => count,
            Err(error) => {
                let _ = engine.close(handle);
                return Err(error.into());
            }
        };

        let pages = match render_pages(engine, handle, page_count, self.scale) {
            Ok(pages) => pages,
            Err(error) => {
                let _ = engine.close(handle);
                return Err(error.into());
            }
        };

        if let Some(previous) = self.handle.take() {
            let _ = engine.close(previous);
        }

        self.active_document = Some(id);
        self.handle = Some(handle);
        self.page_count = page_count;
        self.pages = pages;
        self.generation += 1;

        Ok(page_count)
    }

    /// Clamps to `[MIN_SCALE, MAX_SCALE]` and, when the clamped value
    /// differs from the current scale, re-renders every page at the new
    /// scale before committing it.
    pub fn set_scale<E: RenderEngine>(
        &mut self,
        engine: &E,
        new_scale: f32,
    ) -> Result<(), ViewportError> {
        let clamped = new_scale.clamp(MIN_SCALE, MAX_SCALE);
        if clamped == self.scale {
            return Ok(());
        }

        match self.handle {
            Some(handle) => {
                let pages = render_pages(engine, handle, self.page_count, clamped)?;
                self.scale = clamped;
                self.pages = pages;
                self.generation += 1;
            }
            None => {
                self.scale = clamped;
                self.generation += 1;
            }
        }

        Ok(())
    }

    /// Synchronous full re-render of the current document at the current
    /// scale. Replaces `pages` wholesale; idempotent while the document
    /// and scale are unchanged.
    pub fn render_all<E: RenderEngine>(&mut self, engine: &E) -> Result<(), ViewportError> {
        let ticket = self.begin_render()?;
        let handle = self.handle.ok_or(ViewportError::NoDocument)?;
        let pages = render_pages(engine, handle, self.page_count, self.scale)?;
        self.complete_render(ticket, pages);
        Ok(())
    }

    /// Issues a ticket for an asynchronous render of the current
    /// document at the current scale.
    pub fn begin_render(&self) -> Result<RenderTicket, ViewportError> {
        let document_id = self.active_document.clone().ok_or(ViewportError::NoDocument)?;
        Ok(RenderTicket { generation: self.generation, document_id, scale: self.scale })
    }

    /// Renders the full page list for an outstanding ticket, at the
    /// ticket's scale. The caller decides when to feed the result back
    /// through [`complete_render`](Self::complete_render).
    pub fn render_for_ticket<E: RenderEngine>(
        &self,
        engine: &E,
        ticket: &RenderTicket,
    ) -> Result<Vec<RenderedPage>, ViewportError> {
        let handle = self.handle.ok_or(ViewportError::NoDocument)?;
        Ok(render_pages(engine, handle, self.page_count, ticket.scale)?)
    }

    /// Applies a completed render. Returns `false` without touching the
    /// viewport when the ticket is stale, i.e. the document or scale has
    /// moved on since the render was issued.
    pub fn complete_render(&mut self, ticket: RenderTicket, pages: Vec<RenderedPage>) -> bool {
        if ticket.generation != self.generation {
            log::debug!(
                "discarding stale render of {} at scale {}",
                ticket.document_id,
                ticket.scale
            );
            return false;
        }

        self.pages = pages;
        true
    }

    pub fn clear<E: RenderEngine>(&mut self, engine: &mut E) {
        if let Some(handle) = self.handle.take() {
            let _ = engine.close(handle);
        }

        self.active_document = None;
        self.page_count = 0;
        self.pages.clear();
        self.generation += 1;
    }

    pub fn active_document(&self) -> Option<&DocumentId> {
        self.active_document.as_ref()
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn pages(&self) -> &[RenderedPage] {
        &self.pages
    }
}

fn render_pages<E: RenderEngine>(
    engine: &E,
    handle: DocumentHandle,
    page_count: u32,
    scale: f32,
) -> Result<Vec<RenderedPage>, EngineError> {
    let mut pages = Vec::with_capacity(page_count as usize);

    for page_index in 0..page_count {
        let surface = engine.render_page(handle, page_index, scale)?;
        pages.push(RenderedPage {
            page_index,
            bitmap: surface.bitmap,
            text_runs: surface.text_runs,
        });
    }

    Ok(pages)
}
