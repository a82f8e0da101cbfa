//! Builders for synthetic upload payloads.

#![allow(dead_code)]

use std::io::Cursor;

use omniconv::Upload;

/// A tiny but fully valid PNG image.
pub fn png_bytes() -> Vec<u8> {
    let mut bytes = Vec::new();
    let img = image::RgbImage::from_pixel(8, 8, image::Rgb([200, 120, 40]));
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

/// A tiny but fully valid JPEG image.
pub fn jpeg_bytes() -> Vec<u8> {
    let mut bytes = Vec::new();
    let img = image::RgbImage::from_pixel(8, 8, image::Rgb([40, 120, 200]));
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Jpeg)
        .unwrap();
    bytes
}

pub fn png_upload(name: &str) -> Upload {
    Upload::new(name, png_bytes())
}

pub fn jpeg_upload(name: &str) -> Upload {
    Upload::new(name, jpeg_bytes())
}

/// PNG content under a JPEG name; trips the content sniff.
pub fn mislabeled_upload(name: &str) -> Upload {
    Upload::new(name, png_bytes())
}

/// Bytes that pass validation as a PNG by name but cannot be decoded.
pub fn corrupt_png_upload(name: &str) -> Upload {
    Upload::new(name, b"this is not image data at all".to_vec())
}
