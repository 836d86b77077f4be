//! Image compression.
//!
//! PNG is re-encoded losslessly at the best compression level, JPEG at a
//! fixed quality, and GIF frame by frame. SVG markup loses comments, prolog,
//! metadata, and whitespace between tags. Any result is kept only when it is
//! smaller than the input. Every other format is emitted unchanged.

use super::{Transform, blocking};
use crate::error::{BuildError, BuildResult};
use crate::pipeline::SourceFile;
use async_trait::async_trait;
use image::codecs::gif::{GifDecoder, GifEncoder, Repeat};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{AnimationDecoder, ColorType, ImageEncoder, ImageFormat};
use regex_lite::Regex;
use std::io::Cursor;
use std::sync::OnceLock;
use tracing::debug;

const NAME: &str = "imagemin";

/// Quality used when re-encoding JPEG files.
pub const JPEG_QUALITY: u8 = 75;

#[derive(Debug, Clone, Copy, Default)]
pub struct ImageTransform;

impl ImageTransform {
    pub fn new() -> Self {
        Self
    }
}

fn recompress_png(bytes: &[u8]) -> image::ImageResult<Vec<u8>> {
    let img = image::load_from_memory_with_format(bytes, ImageFormat::Png)?;
    let mut out = Vec::new();
    PngEncoder::new_with_quality(&mut out, CompressionType::Best, FilterType::Adaptive)
        .write_image(img.as_bytes(), img.width(), img.height(), img.color())?;
    Ok(out)
}

fn recompress_jpeg(bytes: &[u8]) -> image::ImageResult<Vec<u8>> {
    let img = image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)?;
    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
    if img.color() == ColorType::L8 {
        let gray = img.to_luma8();
        encoder.write_image(gray.as_raw(), gray.width(), gray.height(), ColorType::L8)?;
    } else {
        let rgb = img.to_rgb8();
        encoder.write_image(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)?;
    }
    Ok(out)
}

fn recompress_gif(bytes: &[u8]) -> image::ImageResult<Vec<u8>> {
    let frames = GifDecoder::new(Cursor::new(bytes))?
        .into_frames()
        .collect_frames()?;
    let animated = frames.len() > 1;
    let mut out = Vec::new();
    {
        let mut encoder = GifEncoder::new_with_speed(&mut out, 10);
        if animated {
            encoder.set_repeat(Repeat::Infinite)?;
        }
        encoder.encode_frames(frames)?;
    }
    Ok(out)
}

fn svg_patterns() -> &'static [(Regex, &'static str)] {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (r"(?s)<\?xml.*?\?>", ""),
            (r"(?s)<!DOCTYPE[^\[>]*(\[.*?\])?\s*>", ""),
            (r"(?s)<!--.*?-->", ""),
            (r"(?s)<metadata\b.*?</metadata\s*>", ""),
            (r">\s*\n\s*<", "><"),
        ]
        .into_iter()
        .filter_map(|(pattern, replacement)| {
            Regex::new(pattern).ok().map(|re| (re, replacement))
        })
        .collect()
    })
}

/// Strip comments, the XML prolog, doctype, and metadata, and join lines between tags.
fn minify_svg(text: &str) -> String {
    let mut out = text.to_string();
    for (re, replacement) in svg_patterns() {
        out = re.replace_all(&out, *replacement).into_owned();
    }
    out.trim().to_string()
}

fn compress(file: &SourceFile) -> BuildResult<Option<Vec<u8>>> {
    let image_error = |e: image::ImageError| BuildError::transform(NAME, &file.path, e);
    let compressed = match file.extension().as_deref() {
        Some("png") => recompress_png(&file.contents).map_err(image_error)?,
        Some("jpg") | Some("jpeg") => recompress_jpeg(&file.contents).map_err(image_error)?,
        Some("gif") => recompress_gif(&file.contents).map_err(image_error)?,
        Some("svg") => match std::str::from_utf8(&file.contents) {
            Ok(text) => minify_svg(text).into_bytes(),
            Err(_) => return Ok(None),
        },
        _ => return Ok(None),
    };
    Ok(Some(compressed))
}

#[async_trait]
impl Transform for ImageTransform {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn apply(&self, file: SourceFile) -> BuildResult<Option<SourceFile>> {
        let path = file.path.clone();
        blocking(NAME, &path, move || match compress(&file)? {
            Some(compressed) if compressed.len() < file.contents.len() => {
                debug!(
                    file = %file.path.display(),
                    before = file.contents.len(),
                    after = compressed.len(),
                    "Compressed image"
                );
                Ok(Some(file.with_contents(compressed)))
            }
            _ => Ok(Some(file)),
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Delay, Frame, Rgb, RgbImage, Rgba, RgbaImage};

    fn uncompressed_png() -> Vec<u8> {
        let img = RgbaImage::from_pixel(64, 64, Rgba([10, 20, 30, 255]));
        let mut out = Vec::new();
        PngEncoder::new_with_quality(&mut out, CompressionType::Fast, FilterType::NoFilter)
            .write_image(img.as_raw(), 64, 64, ColorType::Rgba8)
            .unwrap();
        out
    }

    fn best_quality_jpeg() -> Vec<u8> {
        let img = RgbImage::from_fn(64, 64, |x, y| {
            Rgb([(x * 4) as u8, (y * 4) as u8, ((x * y) % 256) as u8])
        });
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, 100)
            .write_image(img.as_raw(), 64, 64, ColorType::Rgb8)
            .unwrap();
        out
    }

    fn two_frame_gif() -> Vec<u8> {
        let mut out = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut out);
            encoder.set_repeat(Repeat::Infinite).unwrap();
            for shade in [0u8, 200] {
                let buffer = RgbaImage::from_pixel(16, 16, Rgba([shade, 0, 0, 255]));
                let frame = Frame::from_parts(buffer, 0, 0, Delay::from_numer_denom_ms(100, 1));
                encoder.encode_frame(frame).unwrap();
            }
        }
        out
    }

    async fn run(path: &str, contents: Vec<u8>) -> Vec<u8> {
        let file = SourceFile::new(path, "/p/src", contents);
        ImageTransform::new().apply(file).await.unwrap().unwrap().contents
    }

    #[tokio::test]
    async fn test_png_never_grows() {
        let original = uncompressed_png();
        let out = run("/p/src/assets/images/a.png", original.clone()).await;
        assert!(out.len() <= original.len());
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!(decoded.width(), 64);
    }

    #[tokio::test]
    async fn test_jpeg_is_reencoded_smaller() {
        let original = best_quality_jpeg();
        let out = run("/p/src/assets/images/photo.JPG", original.clone()).await;
        assert!(out.len() < original.len());
        let decoded = image::load_from_memory_with_format(&out, ImageFormat::Jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 64));
    }

    #[tokio::test]
    async fn test_gif_keeps_frames_and_never_grows() {
        let original = two_frame_gif();
        let out = run("/p/src/assets/images/spin.gif", original.clone()).await;
        assert!(out.len() <= original.len());
        let frames = GifDecoder::new(Cursor::new(out))
            .unwrap()
            .into_frames()
            .collect_frames()
            .unwrap();
        assert_eq!(frames.len(), 2);
    }

    #[tokio::test]
    async fn test_svg_is_minified() {
        let svg = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE svg PUBLIC "-//W3C//DTD SVG 1.1//EN" "http://www.w3.org/Graphics/SVG/1.1/DTD/svg11.dtd">
<!-- Generator: hand -->
<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 10 10">
  <metadata>
    <rdf:RDF/>
  </metadata>
  <g>
    <path d="M0 0h10v10z"/>
  </g>
</svg>
"#;
        let out = run("/p/src/assets/fonts/icons.svg", svg.as_bytes().to_vec()).await;
        let out = String::from_utf8(out).unwrap();
        assert!(out.len() < svg.len());
        assert_eq!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 10 10"><g><path d="M0 0h10v10z"/></g></svg>"#
        );
    }

    #[tokio::test]
    async fn test_minimal_svg_is_unchanged() {
        let svg = b"<svg xmlns='http://www.w3.org/2000/svg'/>".to_vec();
        assert_eq!(run("/p/src/assets/fonts/icons.svg", svg.clone()).await, svg);
    }

    #[tokio::test]
    async fn test_other_formats_pass_through() {
        let woff = vec![0u8, 1, 2, 3];
        assert_eq!(run("/p/src/assets/fonts/a.woff2", woff.clone()).await, woff);
    }

    #[tokio::test]
    async fn test_corrupt_png_fails() {
        let file = SourceFile::new("/p/src/assets/images/a.png", "/p/src", b"nope".to_vec());
        let err = ImageTransform::new().apply(file).await.unwrap_err();
        assert!(matches!(err, BuildError::Transform { transform: "imagemin", .. }));
    }
}
