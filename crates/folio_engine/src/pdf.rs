//! Image-per-page PDF writer.
//!
//! Baseline JPEGs in gray or RGB are embedded untouched (`DCTDecode`).
//! Everything else is decoded and stored as 8-bit samples behind
//! `FlateDecode`, with alpha carried as a soft mask. Pages take the image's
//! pixel size, one pixel per point. Pages longer than [`MAX_PAGE_SIDE`] are
//! scaled down and carry a `UserUnit` that restores their size.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::{DynamicImage, GenericImageView, ImageFormat};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

/// Largest page side, in default user space units, that readers accept.
pub const MAX_PAGE_SIDE: u32 = 14_400;

#[derive(Debug, thiserror::Error)]
pub enum PdfError {
    #[error("unrecognized image format")]
    UnsupportedFormat,
    #[error("failed to decode image: {0}")]
    Decode(String),
    #[error("failed to compress image data: {0}")]
    Compression(String),
    #[error("failed to encode document: {0}")]
    Encode(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColorSpace {
    DeviceGray,
    DeviceRGB,
}

impl ColorSpace {
    fn pdf_name(self) -> &'static str {
        match self {
            ColorSpace::DeviceGray => "DeviceGray",
            ColorSpace::DeviceRGB => "DeviceRGB",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Dct,
    Flate,
}

/// One decoded page, ready to embed.
#[derive(Debug, Clone)]
pub struct PageImage {
    pub width: u32,
    pub height: u32,
    color_space: ColorSpace,
    encoding: Encoding,
    data: Vec<u8>,
    soft_mask: Option<Vec<u8>>,
}

impl PageImage {
    /// Decodes `bytes` fully, so corrupt files are rejected here rather than
    /// producing a broken page.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, PdfError> {
        let format = image::guess_format(&bytes).map_err(|_| PdfError::UnsupportedFormat)?;
        let decoded = image::load_from_memory_with_format(&bytes, format)
            .map_err(|err| PdfError::Decode(err.to_string()))?;
        let (width, height) = decoded.dimensions();

        if format == ImageFormat::Jpeg {
            if let Some(color_space) = jpeg_passthrough_color_space(&bytes) {
                return Ok(Self {
                    width,
                    height,
                    color_space,
                    encoding: Encoding::Dct,
                    data: bytes,
                    soft_mask: None,
                });
            }
        }
        Self::from_decoded(&decoded)
    }

    fn from_decoded(img: &DynamicImage) -> Result<Self, PdfError> {
        let (width, height) = img.dimensions();
        let has_alpha = img.color().has_alpha();
        let is_gray = !img.color().has_color();

        let (color_space, samples, alpha) = match (is_gray, has_alpha) {
            (true, false) => (ColorSpace::DeviceGray, img.to_luma8().into_raw(), None),
            (true, true) => {
                let la = img.to_luma_alpha8();
                let mut gray = Vec::with_capacity(la.len() / 2);
                let mut alpha = Vec::with_capacity(la.len() / 2);
                for pixel in la.pixels() {
                    gray.push(pixel.0[0]);
                    alpha.push(pixel.0[1]);
                }
                (ColorSpace::DeviceGray, gray, Some(alpha))
            }
            (false, false) => (ColorSpace::DeviceRGB, img.to_rgb8().into_raw(), None),
            (false, true) => {
                let rgba = img.to_rgba8();
                let mut rgb = Vec::with_capacity(rgba.len() / 4 * 3);
                let mut alpha = Vec::with_capacity(rgba.len() / 4);
                for pixel in rgba.pixels() {
                    rgb.extend_from_slice(&pixel.0[..3]);
                    alpha.push(pixel.0[3]);
                }
                (ColorSpace::DeviceRGB, rgb, Some(alpha))
            }
        };

        // Fully opaque masks add nothing.
        let alpha = alpha.filter(|mask| mask.iter().any(|&a| a != u8::MAX));

        Ok(Self {
            width,
            height,
            color_space,
            encoding: Encoding::Flate,
            data: deflate(&samples)?,
            soft_mask: alpha.map(|mask| deflate(&mask)).transpose()?,
        })
    }
}

/// Gray and RGB JPEGs can be embedded as-is; CMYK and odd layouts are
/// re-encoded from decoded pixels instead.
fn jpeg_passthrough_color_space(data: &[u8]) -> Option<ColorSpace> {
    match jpeg_component_count(data)? {
        1 => Some(ColorSpace::DeviceGray),
        3 => Some(ColorSpace::DeviceRGB),
        _ => None,
    }
}

/// Reads the component count from the first SOF segment.
fn jpeg_component_count(data: &[u8]) -> Option<u8> {
    if data.len() < 4 || data[0] != 0xFF || data[1] != 0xD8 {
        return None;
    }
    let mut pos = 2;
    while pos + 3 < data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }
        let marker = data[pos + 1];
        pos += 2;
        if marker == 0xFF || marker == 0x00 || (0xD0..=0xD7).contains(&marker) {
            continue;
        }
        if matches!(
            marker,
            0xC0 | 0xC1 | 0xC2 | 0xC3 | 0xC5 | 0xC6 | 0xC7 | 0xC9 | 0xCA | 0xCB | 0xCD | 0xCE | 0xCF
        ) {
            return data.get(pos + 7).copied();
        }
        let length = u16::from_be_bytes([data[pos], data[pos + 1]]) as usize;
        pos += length;
    }
    None
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, PdfError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| PdfError::Compression(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| PdfError::Compression(e.to_string()))
}

/// Page width and height in user space, plus the `UserUnit` needed when the
/// longer side exceeds [`MAX_PAGE_SIDE`].
fn page_geometry(width: u32, height: u32) -> (Object, Object, Option<f32>) {
    let longest = width.max(height);
    if longest <= MAX_PAGE_SIDE {
        return (
            Object::Integer(i64::from(width)),
            Object::Integer(i64::from(height)),
            None,
        );
    }
    let unit = longest as f32 / MAX_PAGE_SIDE as f32;
    (
        Object::Real(width as f32 / unit),
        Object::Real(height as f32 / unit),
        Some(unit),
    )
}

/// Accumulates pages into a single document.
pub struct PdfBuilder {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
}

impl Default for PdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfBuilder {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    pub fn add_page(&mut self, page: PageImage) -> Result<(), PdfError> {
        let width = i64::from(page.width);
        let height = i64::from(page.height);

        let mut image_dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width,
            "Height" => height,
            "ColorSpace" => page.color_space.pdf_name(),
            "BitsPerComponent" => 8_i64,
            "Filter" => match page.encoding {
                Encoding::Dct => "DCTDecode",
                Encoding::Flate => "FlateDecode",
            },
        };
        if let Some(mask) = page.soft_mask {
            let mask_dict = dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8_i64,
                "Filter" => "FlateDecode",
            };
            let mask_id = self
                .doc
                .add_object(Stream::new(mask_dict, mask).with_compression(false));
            image_dict.set("SMask", mask_id);
        }
        let image_id = self
            .doc
            .add_object(Stream::new(image_dict, page.data).with_compression(false));

        let (page_width, page_height, user_unit) = page_geometry(page.width, page.height);
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        page_width.clone(),
                        Object::Integer(0),
                        Object::Integer(0),
                        page_height.clone(),
                        Object::Integer(0),
                        Object::Integer(0),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let encoded = content
            .encode()
            .map_err(|err| PdfError::Encode(err.to_string()))?;
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, encoded));

        let mut page_dict = dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                page_width,
                page_height,
            ],
            "Resources" => dictionary! {
                "XObject" => dictionary! {
                    "Im0" => image_id,
                },
            },
            "Contents" => content_id,
        };
        if let Some(unit) = user_unit {
            page_dict.set("UserUnit", Object::Real(unit));
            self.doc.version = "1.6".to_string();
        }
        let page_id = self.doc.add_object(page_dict);
        self.kids.push(page_id.into());
        Ok(())
    }

    /// Serializes the document.
    pub fn finish(mut self) -> Result<Vec<u8>, PdfError> {
        let count = self.kids.len() as i64;
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => self.kids,
            "Count" => count,
        };
        self.doc
            .objects
            .insert(self.pages_id, Object::Dictionary(pages));
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        self.doc
            .save_to(&mut buffer)
            .map_err(|err| PdfError::Encode(err.to_string()))?;
        Ok(buffer)
    }
}
