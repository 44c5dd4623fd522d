use std::io::Cursor;

use image::{DynamicImage, ImageOutputFormat, RgbImage};

pub fn rgb_image(width: u32, height: u32, f: impl Fn(u32, u32) -> [u8; 3]) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| image::Rgb(f(x, y)))
}

fn encode(image: RgbImage, format: ImageOutputFormat) -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut bytes), format)
        .unwrap();
    bytes
}

pub fn encode_png(image: RgbImage) -> Vec<u8> {
    encode(image, ImageOutputFormat::Png)
}

pub fn encode_jpeg(image: RgbImage) -> Vec<u8> {
    encode(image, ImageOutputFormat::Jpeg(90))
}
