use image::{DynamicImage, GrayImage, RgbImage};
use lopdf::{Dictionary, Document, Object, Stream};
use passbook_core::PageImage;
use std::io::Cursor;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to parse PDF: {0}")]
    Parse(String),
    #[error("Page {0} has no renderable image")]
    NoImage(usize),
    #[error("Unsupported image encoding on page {page}: {detail}")]
    Unsupported { page: usize, detail: String },
    #[error("Failed to encode page {page}: {detail}")]
    Encode { page: usize, detail: String },
}

/// Turns each page of a document into a raster image.
///
/// The outer `Result` fails only when the document cannot be opened; a page
/// that cannot be rendered is reported in its own slot so siblings survive.
pub trait PageRenderer: Send + Sync {
    fn render_pages(&self, bytes: &[u8]) -> Result<Vec<Result<PageImage, RenderError>>, RenderError>;
}

/// Pulls the largest embedded image XObject from every page.
///
/// Scanned statements and payment-app exports are a full-page image per
/// page, so this recovers them without a rasterizer. JPEG streams are passed
/// through untouched; 8-bit gray and RGB sample data is re-encoded as PNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmbeddedImageRenderer;

impl PageRenderer for EmbeddedImageRenderer {
    fn render_pages(&self, bytes: &[u8]) -> Result<Vec<Result<PageImage, RenderError>>, RenderError> {
        let doc = Document::load_mem(bytes).map_err(|e| RenderError::Parse(e.to_string()))?;
        let pages = doc.get_pages();

        Ok(pages
            .values()
            .enumerate()
            .map(|(index, page_id)| {
                let page = doc
                    .get_object(*page_id)
                    .and_then(Object::as_dict)
                    .map_err(|e| RenderError::Parse(e.to_string()))?;
                let stream = largest_image(&doc, page).ok_or(RenderError::NoImage(index))?;
                let image = encode_stream(index, stream)?;
                debug!(page = index, bytes = image.bytes.len(), mime = %image.mime_type, "Rendered page");
                Ok(image)
            })
            .collect())
    }
}

fn resolve_dict<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
    dict.get(key)
        .ok()
        .and_then(|o| doc.dereference(o).ok())
        .and_then(|(_, resolved)| resolved.as_dict().ok())
}

fn largest_image<'a>(doc: &'a Document, page: &'a Dictionary) -> Option<&'a Stream> {
    let resources = resolve_dict(doc, page, b"Resources")?;
    let xobjects = resolve_dict(doc, resources, b"XObject")?;

    xobjects
        .iter()
        .filter_map(|(_, obj)| doc.dereference(obj).ok())
        .filter_map(|(_, resolved)| resolved.as_stream().ok())
        .filter(|s| {
            s.dict
                .get(b"Subtype")
                .and_then(Object::as_name)
                .is_ok_and(|n| n == b"Image")
        })
        .max_by_key(|s| dimension(s, b"Width") * dimension(s, b"Height"))
}

fn dimension(stream: &Stream, key: &[u8]) -> i64 {
    stream.dict.get(key).and_then(Object::as_i64).unwrap_or(0)
}

fn filters(stream: &Stream) -> Vec<Vec<u8>> {
    match stream.dict.get(b"Filter") {
        Ok(Object::Name(n)) => vec![n.clone()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|o| o.as_name().ok().map(<[u8]>::to_vec))
            .collect(),
        _ => Vec::new(),
    }
}

fn encode_stream(page: usize, stream: &Stream) -> Result<PageImage, RenderError> {
    let filters = filters(stream);

    if filters.iter().any(|f| f == b"DCTDecode") {
        return Ok(PageImage::jpeg(page, stream.content.clone()));
    }

    let unsupported = |detail: String| RenderError::Unsupported { page, detail };

    if let Some(f) = filters.iter().find(|f| f.as_slice() != b"FlateDecode") {
        return Err(unsupported(format!("filter {}", String::from_utf8_lossy(f))));
    }

    let bits = dimension(stream, b"BitsPerComponent");
    if bits != 8 {
        return Err(unsupported(format!("{bits} bits per component")));
    }

    let width = u32::try_from(dimension(stream, b"Width")).map_err(|e| unsupported(e.to_string()))?;
    let height = u32::try_from(dimension(stream, b"Height")).map_err(|e| unsupported(e.to_string()))?;

    let samples = if filters.is_empty() {
        stream.content.clone()
    } else {
        stream
            .decompressed_content()
            .map_err(|e| unsupported(e.to_string()))?
    };

    let color_space = stream
        .dict
        .get(b"ColorSpace")
        .and_then(Object::as_name)
        .map(<[u8]>::to_vec)
        .unwrap_or_default();

    let image = match color_space.as_slice() {
        b"DeviceGray" => GrayImage::from_raw(width, height, samples).map(DynamicImage::ImageLuma8),
        b"DeviceRGB" => RgbImage::from_raw(width, height, samples).map(DynamicImage::ImageRgb8),
        other => {
            return Err(unsupported(format!(
                "color space {}",
                String::from_utf8_lossy(other)
            )))
        }
    }
    .ok_or_else(|| unsupported("sample data shorter than declared size".to_string()))?;

    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| RenderError::Encode { page, detail: e.to_string() })?;
    Ok(PageImage::png(page, buf))
}

/// Fixed pages for tests.
#[derive(Debug, Clone, Default)]
pub struct StaticRenderer {
    pages: Vec<Option<PageImage>>,
}

impl StaticRenderer {
    /// `None` entries render as failed pages.
    pub fn new(pages: Vec<Option<PageImage>>) -> Self {
        Self { pages }
    }

    pub fn blank_pages(count: usize) -> Self {
        Self::new((0..count).map(|i| Some(PageImage::png(i, Vec::new()))).collect())
    }
}

impl PageRenderer for StaticRenderer {
    fn render_pages(&self, _bytes: &[u8]) -> Result<Vec<Result<PageImage, RenderError>>, RenderError> {
        Ok(self
            .pages
            .iter()
            .enumerate()
            .map(|(i, p)| p.clone().ok_or(RenderError::NoImage(i)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    #[test]
    fn garbage_bytes_fail_to_open() {
        assert!(matches!(
            EmbeddedImageRenderer.render_pages(b"not a pdf"),
            Err(RenderError::Parse(_))
        ));
    }

    #[test]
    fn raw_gray_samples_become_png() {
        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 2,
                "Height" => 2,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            vec![0, 255, 255, 0],
        );
        let page = encode_stream(3, &stream).unwrap();
        assert_eq!(page.page_index, 3);
        assert_eq!(page.mime_type, "image/png");
        assert_eq!(&page.bytes[..4], b"\x89PNG");
    }

    #[test]
    fn jpeg_streams_pass_through() {
        let stream = Stream::new(
            dictionary! { "Subtype" => "Image", "Filter" => "DCTDecode" },
            vec![0xFF, 0xD8, 0xFF],
        );
        let page = encode_stream(0, &stream).unwrap();
        assert_eq!(page.mime_type, "image/jpeg");
        assert_eq!(page.bytes, vec![0xFF, 0xD8, 0xFF]);
    }

    #[test]
    fn one_bit_images_are_unsupported() {
        let stream = Stream::new(
            dictionary! {
                "Subtype" => "Image",
                "Width" => 8,
                "Height" => 1,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 1,
            },
            vec![0b1010_1010],
        );
        assert!(matches!(encode_stream(0, &stream), Err(RenderError::Unsupported { .. })));
    }

    #[test]
    fn static_renderer_reports_missing_pages() {
        let r = StaticRenderer::new(vec![Some(PageImage::png(0, vec![1])), None]);
        let pages = r.render_pages(b"").unwrap();
        assert!(pages[0].is_ok());
        assert!(matches!(pages[1], Err(RenderError::NoImage(1))));
    }
}
