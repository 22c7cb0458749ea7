//! Image clean-up ahead of OCR.

use image::{DynamicImage, GrayImage, Luma, imageops};
use imageproc::filter::median_filter;
use imageproc::integral_image::{integral_image, sum_image_pixels};

/// Turns a decoded photo into an image OCR reads well.
pub trait ImagePreprocessor: Send + Sync {
    fn preprocess(&self, image: &DynamicImage) -> GrayImage;
}

/// Grayscale, 3×3 median, local-mean threshold, unsharp mask, in that order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReceiptPreprocessor {
    /// Half the side of the square window the local mean is taken over.
    pub block_radius: u32,
    /// A pixel turns black when it is darker than the local mean minus this.
    pub offset: i32,
    pub sharpen_sigma: f32,
    pub sharpen_threshold: i32,
}

impl Default for ReceiptPreprocessor {
    fn default() -> Self {
        Self {
            block_radius: 7,
            offset: 10,
            sharpen_sigma: 1.0,
            sharpen_threshold: 0,
        }
    }
}

impl ImagePreprocessor for ReceiptPreprocessor {
    fn preprocess(&self, image: &DynamicImage) -> GrayImage {
        let gray = grayscale(image);
        let denoised = median_denoise(&gray);
        let binary = adaptive_threshold(&denoised, self.block_radius, self.offset);
        sharpen(&binary, self.sharpen_sigma, self.sharpen_threshold)
    }
}

pub fn grayscale(image: &DynamicImage) -> GrayImage {
    image.to_luma8()
}

/// 3×3 median filter; edge pixels reuse their nearest neighbours.
pub fn median_denoise(image: &GrayImage) -> GrayImage {
    if image.width() == 0 || image.height() == 0 {
        return image.clone();
    }
    median_filter(image, 1, 1)
}

/// Binarizes against the mean of a `(2r+1)²` window, clipped at the image
/// border. Window sums come from an integral image so the cost does not
/// depend on the radius.
pub fn adaptive_threshold(image: &GrayImage, radius: u32, offset: i32) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }
    let integral = integral_image::<_, u64>(image);

    GrayImage::from_fn(width, height, |x, y| {
        let (x0, y0) = (x.saturating_sub(radius), y.saturating_sub(radius));
        let (x1, y1) = (x.saturating_add(radius).min(width - 1), y.saturating_add(radius).min(height - 1));
        let count = u64::from(x1 - x0 + 1) * u64::from(y1 - y0 + 1);
        let mean = (sum_image_pixels(&integral, x0, y0, x1, y1)[0] / count) as i64;

        let value = i64::from(image.get_pixel(x, y).0[0]);
        if value > mean - i64::from(offset) {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

pub fn sharpen(image: &GrayImage, sigma: f32, threshold: i32) -> GrayImage {
    imageops::unsharpen(image, sigma, threshold)
}
