//! MuPDF-backed extractor

use std::path::Path;

use log::{debug, info, warn};
use mupdf::text_page::TextBlockType;
use mupdf::{Colorspace, Document, Matrix, MetadataName, Page, Pixmap, Rect, TextPageFlags};

use super::{DEFAULT_IMAGE_SCALE, Metadata, PageContent, PdfExtractor};
use crate::error::ExtractError;

const METADATA_KEYS: [(&str, MetadataName); 7] = [
    ("format", MetadataName::Format),
    ("title", MetadataName::Title),
    ("author", MetadataName::Author),
    ("creator", MetadataName::Creator),
    ("producer", MetadataName::Producer),
    ("creation_date", MetadataName::CreationDate),
    ("mod_date", MetadataName::ModDate),
];

pub struct MupdfExtractor {
    doc: Option<Document>,
    page_count: usize,
    image_scale: f32,
}

impl MupdfExtractor {
    #[must_use]
    pub fn new() -> Self {
        Self::with_image_scale(DEFAULT_IMAGE_SCALE)
    }

    /// Non-positive scales fall back to [`DEFAULT_IMAGE_SCALE`]
    #[must_use]
    pub fn with_image_scale(image_scale: f32) -> Self {
        Self {
            doc: None,
            page_count: 0,
            image_scale: if image_scale > 0.0 {
                image_scale
            } else {
                DEFAULT_IMAGE_SCALE
            },
        }
    }

    fn render_image_blocks(
        &self,
        page: &Page,
        index: usize,
        rects: &[Rect],
    ) -> Result<Vec<Vec<u8>>, ExtractError> {
        let fault = |e: mupdf::error::Error| ExtractError::page(index, e.to_string());

        let matrix = Matrix::new_scale(self.image_scale, self.image_scale);
        let pixmap = page
            .to_pixmap(&matrix, &Colorspace::device_rgb(), false, false)
            .map_err(fault)?;

        let mut images = Vec::with_capacity(rects.len());
        for rect in rects {
            let Some((width, height, rgb)) = crop_rgb(&pixmap, rect, self.image_scale) else {
                debug!("Page {index}: image block lies outside the rendered page, skipped");
                continue;
            };
            let png = encode_png(width, height, &rgb)
                .map_err(|e| ExtractError::page(index, format!("PNG encoding: {e}")))?;
            images.push(png);
        }
        Ok(images)
    }
}

impl Default for MupdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfExtractor for MupdfExtractor {
    fn open(&mut self, path: &Path) -> Result<(), ExtractError> {
        self.close();

        let doc = Document::open(path.to_string_lossy().as_ref())
            .map_err(|e| ExtractError::open(path, e.to_string()))?;
        let page_count = doc
            .page_count()
            .map_err(|e| ExtractError::open(path, e.to_string()))?;

        self.page_count = usize::try_from(page_count).unwrap_or(0);
        self.doc = Some(doc);
        info!("Opened {path:?} with MuPDF: {} pages", self.page_count);
        Ok(())
    }

    fn close(&mut self) {
        if self.doc.take().is_some() {
            debug!("Closed MuPDF document");
        }
        self.page_count = 0;
    }

    fn is_open(&self) -> bool {
        self.doc.is_some()
    }

    fn page_count(&self) -> usize {
        self.page_count
    }

    fn page(&mut self, index: usize) -> Result<PageContent, ExtractError> {
        let doc = self.doc.as_ref().ok_or(ExtractError::NotOpen)?;
        if index >= self.page_count {
            return Err(ExtractError::page(
                index,
                format!("out of range (document has {} pages)", self.page_count),
            ));
        }

        let fault = |e: mupdf::error::Error| ExtractError::page(index, e.to_string());
        let page = doc.load_page(index as i32).map_err(fault)?;
        let text_page = page
            .to_text_page(TextPageFlags::PRESERVE_IMAGES)
            .map_err(fault)?;

        let mut text = String::new();
        let mut image_rects = Vec::new();
        for block in text_page.blocks() {
            match block.r#type() {
                TextBlockType::Text => {
                    for line in block.lines() {
                        let line_text: String = line.chars().filter_map(|ch| ch.char()).collect();
                        text.push_str(line_text.trim_end());
                        text.push('\n');
                    }
                    text.push('\n');
                }
                TextBlockType::Image => image_rects.push(block.bounds()),
                _ => {}
            }
        }
        text.truncate(text.trim_end().len());

        let images = if image_rects.is_empty() {
            Vec::new()
        } else {
            self.render_image_blocks(&page, index, &image_rects)?
        };

        Ok(PageContent { text, images })
    }

    fn metadata(&self) -> Metadata {
        let mut metadata = Metadata::new();
        let Some(doc) = self.doc.as_ref() else {
            return metadata;
        };

        for (key, name) in METADATA_KEYS {
            match doc.metadata(name) {
                Ok(value) if !value.trim().is_empty() => {
                    metadata.insert(key.to_string(), value);
                }
                Ok(_) => {}
                Err(e) => warn!("Failed to read PDF metadata '{key}': {e}"),
            }
        }
        metadata
    }
}

/// Copy the pixels under `rect` (page units) out of an RGB(A) pixmap
fn crop_rgb(pixmap: &Pixmap, rect: &Rect, scale: f32) -> Option<(u32, u32, Vec<u8>)> {
    let n = pixmap.n() as usize;
    if n < 3 {
        return None;
    }

    let max_x = pixmap.width() as f32;
    let max_y = pixmap.height() as f32;
    let x0 = (rect.x0 * scale).floor().max(0.0);
    let y0 = (rect.y0 * scale).floor().max(0.0);
    let x1 = (rect.x1 * scale).ceil().min(max_x);
    let y1 = (rect.y1 * scale).ceil().min(max_y);
    if x0 >= x1 || y0 >= y1 {
        return None;
    }

    let (x0, y0, x1, y1) = (x0 as usize, y0 as usize, x1 as usize, y1 as usize);
    let stride = pixmap.stride() as usize;
    let samples = pixmap.samples();

    let mut rgb = Vec::with_capacity((x1 - x0) * (y1 - y0) * 3);
    for y in y0..y1 {
        let row_start = y * stride + x0 * n;
        let row_end = y * stride + x1 * n;
        let row = samples.get(row_start..row_end)?;
        for px in row.chunks_exact(n) {
            rgb.extend_from_slice(&px[..3]);
        }
    }

    Some(((x1 - x0) as u32, (y1 - y0) as u32, rgb))
}

fn encode_png(width: u32, height: u32, rgb: &[u8]) -> Result<Vec<u8>, png::EncodingError> {
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(rgb)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn open_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"definitely not a pdf").unwrap();

        let mut extractor = MupdfExtractor::new();
        assert!(matches!(
            extractor.open(&path),
            Err(ExtractError::Open { .. })
        ));
        assert!(!extractor.is_open());
        assert_eq!(extractor.page_count(), 0);
    }

    #[test]
    fn page_requires_open_document() {
        let mut extractor = MupdfExtractor::new();
        assert!(matches!(extractor.page(0), Err(ExtractError::NotOpen)));
        assert!(extractor.metadata().is_empty());
    }

    #[test]
    fn non_positive_scale_uses_default() {
        assert_eq!(MupdfExtractor::with_image_scale(0.0).image_scale, DEFAULT_IMAGE_SCALE);
        assert_eq!(MupdfExtractor::with_image_scale(f32::NAN).image_scale, DEFAULT_IMAGE_SCALE);
        assert_eq!(MupdfExtractor::with_image_scale(1.5).image_scale, 1.5);
    }

    #[test]
    fn encoded_png_has_signature() {
        let png = encode_png(2, 1, &[255, 0, 0, 0, 255, 0]).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }
}
