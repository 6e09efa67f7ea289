#![allow(dead_code)]

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};

pub fn init_logging() {
    engine_logging::initialize_for_tests();
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([200, 40, 40]));
    encode(DynamicImage::ImageRgb8(img), ImageFormat::Png)
}

pub fn translucent_png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([0, 90, 200, 128]));
    encode(DynamicImage::ImageRgba8(img), ImageFormat::Png)
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([10, 160, 60]));
    encode(DynamicImage::ImageRgb8(img), ImageFormat::Jpeg)
}

pub fn gif_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([250, 200, 0, 255]));
    encode(DynamicImage::ImageRgba8(img), ImageFormat::Gif)
}

fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, format).expect("encode fixture");
    buffer.into_inner()
}

/// Page sizes of a written PDF, in page order.
pub fn pdf_page_sizes(path: &std::path::Path) -> Vec<(i64, i64)> {
    let doc = lopdf::Document::load(path).expect("load pdf");
    doc.get_pages()
        .values()
        .map(|page_id| {
            let page = doc
                .get_object(*page_id)
                .and_then(|obj| obj.as_dict())
                .expect("page dict");
            let media_box = page
                .get(b"MediaBox")
                .and_then(|obj| obj.as_array())
                .expect("media box");
            (
                media_box[2].as_i64().expect("width"),
                media_box[3].as_i64().expect("height"),
            )
        })
        .collect()
}
