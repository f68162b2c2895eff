//! Deterministic engine double for core tests. The page count of an
//! opened document equals the byte length handed to `open`, so tests can
//! shape documents without real PDF bytes.

use image::Rgba;
use paperchat_engine::{
    DocumentHandle, EngineError, PageSize, PageSurface, RenderEngine, RgbaImage, TextRun,
};
use std::collections::HashMap;

const PAGE_WIDTH_PT: f32 = 100.0;
const PAGE_HEIGHT_PT: f32 = 140.0;

#[derive(Debug, Default)]
pub struct FakeEngine {
    next_handle: u64,
    page_counts: HashMap<u64, u32>,
    pub fail_open: bool,
    pub fail_page: Option<u32>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn count(&self, handle: DocumentHandle) -> Result<u32, EngineError> {
        self.page_counts
            .get(&handle.raw())
            .copied()
            .ok_or(EngineError::InvalidHandle(handle.raw()))
    }
}

impl RenderEngine for FakeEngine {
    fn open(&mut self, bytes: Vec<u8>) -> Result<DocumentHandle, EngineError> {
        if self.fail_open {
            return Err(EngineError::Backend("open disabled".to_owned()));
        }
        if bytes.is_empty() {
            return Err(EngineError::Backend("document has no pages".to_owned()));
        }

        self.next_handle += 1;
        self.page_counts.insert(self.next_handle, bytes.len() as u32);
        Ok(DocumentHandle::from_raw(self.next_handle))
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, EngineError> {
        self.count(handle)
    }

    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, EngineError> {
        let page_count = self.count(handle)?;
        if page_index >= page_count {
            return Err(EngineError::PageOutOfRange { page: page_index, page_count });
        }

        Ok(PageSize { width_pt: PAGE_WIDTH_PT, height_pt: PAGE_HEIGHT_PT })
    }

    fn render_page(
        &self,
        handle: DocumentHandle,
        page_index: u32,
        scale: f32,
    ) -> Result<PageSurface, EngineError> {
        if self.fail_page == Some(page_index) {
            return Err(EngineError::Backend(format!("page {page_index} disabled")));
        }

        let size = self.page_size(handle, page_index)?;
        let bitmap = RgbaImage::from_pixel(
            (size.width_pt * scale).round() as u32,
            (size.height_pt * scale).round() as u32,
            Rgba([255, 255, 255, 255]),
        );
        let text_runs = vec![TextRun {
            content: format!("page {page_index}"),
            x: 10.0 * scale,
            y: 20.0 * scale,
            width: 60.0 * scale,
            height: 12.0 * scale,
        }];

        Ok(PageSurface { bitmap, text_runs })
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), EngineError> {
        self.page_counts
            .remove(&handle.raw())
            .map(|_| ())
            .ok_or(EngineError::InvalidHandle(handle.raw()))
    }
}
