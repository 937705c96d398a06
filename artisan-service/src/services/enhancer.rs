//! Product photo enhancement.

use async_trait::async_trait;
use image::imageops::FilterType;
use image::io::Reader as ImageReader;
use image::{DynamicImage, GenericImageView, ImageOutputFormat, RgbImage};
use metrics::counter;
use service_core::error::AppError;
use std::io::Cursor;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

/// Longest edge of an enhanced image, in pixels.
pub const MAX_EDGE: u32 = 1200;

/// JPEG quality of enhanced images.
pub const JPEG_QUALITY: u8 = 90;

/// Largest decoded image accepted, in pixels. Anything bigger is stored as uploaded.
pub const MAX_PIXELS: u64 = 89_478_485;

/// Extensions an upload may keep; anything else is stored as `bin`.
const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "webp", "bmp"];

const UNSHARP_SIGMA: f32 = 1.0;
const UNSHARP_THRESHOLD: i32 = 3;

/// Output of an enhancement pass.
#[derive(Debug, Clone)]
pub struct EnhancedImage {
    pub bytes: Vec<u8>,
    /// File extension without the dot, lowercase.
    pub extension: String,
    /// False when the upload could not be decoded and `bytes` are the raw upload.
    pub enhanced: bool,
}

#[async_trait]
pub trait ImageEnhancer: Send + Sync {
    async fn enhance(&self, bytes: Vec<u8>, original_filename: &str)
        -> Result<EnhancedImage, AppError>;
}

/// Autocontrast, unsharp mask and downscale, re-encoded as JPEG.
#[derive(Debug, Default, Clone)]
pub struct PhotoEnhancer;

impl PhotoEnhancer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ImageEnhancer for PhotoEnhancer {
    async fn enhance(
        &self,
        bytes: Vec<u8>,
        original_filename: &str,
    ) -> Result<EnhancedImage, AppError> {
        let fallback_extension = extension_of(original_filename);

        let result = tokio::task::spawn_blocking(move || match enhance_guarded(&bytes) {
            Ok(enhanced) => EnhancedImage {
                bytes: enhanced,
                extension: "jpg".to_string(),
                enhanced: true,
            },
            Err(e) => {
                tracing::warn!("Image enhancement failed, keeping upload as-is: {}", e);
                EnhancedImage {
                    bytes,
                    extension: fallback_extension,
                    enhanced: false,
                }
            }
        })
        .await
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Enhancer task failed: {}", e)))?;

        let outcome = if result.enhanced { "enhanced" } else { "fallback" };
        counter!("image_enhancements_total", "outcome" => outcome).increment(1);

        Ok(result)
    }
}

/// Lowercase extension of `filename`: `jpg` when there is none, `bin` when it
/// is not a known image type.
pub fn extension_of(filename: &str) -> String {
    let Some(ext) = Path::new(filename).extension().and_then(|ext| ext.to_str()) else {
        return "jpg".to_string();
    };
    let ext = ext.to_lowercase();
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        ext
    } else {
        "bin".to_string()
    }
}

/// Decoder panics count as undecodable input.
fn enhance_guarded(bytes: &[u8]) -> anyhow::Result<Vec<u8>> {
    panic::catch_unwind(AssertUnwindSafe(|| enhance_bytes(bytes)))
        .unwrap_or_else(|_| Err(anyhow::anyhow!("image decoder panicked")))
}

fn reader(bytes: &[u8]) -> anyhow::Result<ImageReader<Cursor<&[u8]>>> {
    Ok(ImageReader::new(Cursor::new(bytes)).with_guessed_format()?)
}

/// Reject oversized images from their header, before any pixel buffer exists.
fn check_dimensions(bytes: &[u8]) -> anyhow::Result<()> {
    let (width, height) = reader(bytes)?.into_dimensions()?;
    let pixels = u64::from(width) * u64::from(height);
    if pixels > MAX_PIXELS {
        anyhow::bail!("image is {}x{}, above the {} pixel limit", width, height, MAX_PIXELS);
    }
    Ok(())
}

/// EXIF orientation tag, 1 when absent or unreadable.
fn orientation(bytes: &[u8]) -> u32 {
    exif::Reader::new()
        .read_from_container(&mut Cursor::new(bytes))
        .ok()
        .and_then(|exif| {
            exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
                .and_then(|field| field.value.get_uint(0))
        })
        .unwrap_or(1)
}

/// Rotate and mirror so the image displays upright without its EXIF tag.
fn apply_orientation(image: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => image.fliph(),
        3 => image.rotate180(),
        4 => image.flipv(),
        5 => image.rotate90().fliph(),
        6 => image.rotate90(),
        7 => image.rotate270().fliph(),
        8 => image.rotate270(),
        _ => image,
    }
}

fn enhance_bytes(bytes: &[u8]) -> anyhow::Result<Vec<u8>> {
    check_dimensions(bytes)?;
    let decoded = reader(bytes)?.decode()?;
    let upright = apply_orientation(decoded, orientation(bytes));

    let mut rgb = upright.to_rgb8();
    autocontrast(&mut rgb);

    let sharpened = image::imageops::unsharpen(&rgb, UNSHARP_SIGMA, UNSHARP_THRESHOLD);
    let mut output = DynamicImage::ImageRgb8(sharpened);

    if output.width() > MAX_EDGE || output.height() > MAX_EDGE {
        output = output.resize(MAX_EDGE, MAX_EDGE, FilterType::Lanczos3);
    }

    let mut encoded = Vec::new();
    output.write_to(&mut Cursor::new(&mut encoded), ImageOutputFormat::Jpeg(JPEG_QUALITY))?;
    Ok(encoded)
}

/// Stretch each channel so its darkest value maps to 0 and its brightest to 255.
fn autocontrast(image: &mut RgbImage) {
    let mut low = [u8::MAX; 3];
    let mut high = [u8::MIN; 3];
    for pixel in image.pixels() {
        for c in 0..3 {
            low[c] = low[c].min(pixel.0[c]);
            high[c] = high[c].max(pixel.0[c]);
        }
    }

    let mut tables = [[0u8; 256]; 3];
    for c in 0..3 {
        let (lo, hi) = (low[c] as f32, high[c] as f32);
        for (value, slot) in tables[c].iter_mut().enumerate() {
            *slot = if hi <= lo {
                value as u8
            } else {
                ((value as f32 - lo) * 255.0 / (hi - lo)).round().clamp(0.0, 255.0) as u8
            };
        }
    }

    for pixel in image.pixels_mut() {
        for c in 0..3 {
            pixel.0[c] = tables[c][pixel.0[c] as usize];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let image = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(60 + x % 100) as u8, (80 + y % 100) as u8, 120])
        });
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
            .unwrap();
        bytes
    }

    /// 40x20 JPEG, red on the left half and blue on the right, tagged with
    /// the given EXIF orientation.
    fn oriented_jpeg(orientation: u16) -> Vec<u8> {
        let image = RgbImage::from_fn(40, 20, |x, _| {
            if x < 20 {
                Rgb([230, 20, 20])
            } else {
                Rgb([20, 20, 230])
            }
        });
        let mut jpeg = Vec::new();
        DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut jpeg), ImageOutputFormat::Jpeg(95))
            .unwrap();

        // Big-endian TIFF with one IFD entry: Orientation, SHORT, count 1.
        let mut tiff = Vec::new();
        tiff.extend_from_slice(b"MM\x00\x2a");
        tiff.extend_from_slice(&8u32.to_be_bytes());
        tiff.extend_from_slice(&1u16.to_be_bytes());
        tiff.extend_from_slice(&0x0112u16.to_be_bytes());
        tiff.extend_from_slice(&3u16.to_be_bytes());
        tiff.extend_from_slice(&1u32.to_be_bytes());
        tiff.extend_from_slice(&orientation.to_be_bytes());
        tiff.extend_from_slice(&[0, 0]);
        tiff.extend_from_slice(&0u32.to_be_bytes());

        let mut app1 = vec![0xff, 0xe1];
        app1.extend_from_slice(&((2 + 6 + tiff.len()) as u16).to_be_bytes());
        app1.extend_from_slice(b"Exif\x00\x00");
        app1.extend_from_slice(&tiff);

        let mut tagged = jpeg[..2].to_vec();
        tagged.extend_from_slice(&app1);
        tagged.extend_from_slice(&jpeg[2..]);
        tagged
    }

    /// 64-byte RLE8 bitmap whose header claims 16000x16000 pixels.
    fn rle8_bitmap_claiming_16000_square() -> Vec<u8> {
        let mut bmp = Vec::with_capacity(64);
        bmp.extend_from_slice(b"BM");
        bmp.extend_from_slice(&64u32.to_le_bytes());
        bmp.extend_from_slice(&0u32.to_le_bytes());
        bmp.extend_from_slice(&58u32.to_le_bytes());
        bmp.extend_from_slice(&40u32.to_le_bytes());
        bmp.extend_from_slice(&16_000i32.to_le_bytes());
        bmp.extend_from_slice(&16_000i32.to_le_bytes());
        bmp.extend_from_slice(&1u16.to_le_bytes());
        bmp.extend_from_slice(&8u16.to_le_bytes());
        bmp.extend_from_slice(&1u32.to_le_bytes()); // BI_RLE8
        bmp.extend_from_slice(&6u32.to_le_bytes());
        bmp.extend_from_slice(&[0; 8]);
        bmp.extend_from_slice(&1u32.to_le_bytes());
        bmp.extend_from_slice(&0u32.to_le_bytes());
        bmp.extend_from_slice(&[0, 0, 0, 0]);
        bmp.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x01]);
        assert_eq!(bmp.len(), 64);
        bmp
    }

    #[test]
    fn extension_defaults_to_jpg() {
        assert_eq!(extension_of("vase.PNG"), "png");
        assert_eq!(extension_of("no_extension"), "jpg");
        assert_eq!(extension_of(""), "jpg");
    }

    #[test]
    fn unknown_extensions_become_bin() {
        assert_eq!(extension_of("vase.html"), "bin");
        assert_eq!(extension_of("page.SVG"), "bin");
        assert_eq!(extension_of("scan.heic"), "bin");
        assert_eq!(extension_of("shot.webp"), "webp");
    }

    #[test]
    fn orientation_six_turns_landscape_into_portrait() {
        let rotated = apply_orientation(DynamicImage::ImageRgb8(RgbImage::new(4, 2)), 6);
        assert_eq!(rotated.dimensions(), (2, 4));

        let mirrored = apply_orientation(DynamicImage::ImageRgb8(RgbImage::new(4, 2)), 2);
        assert_eq!(mirrored.dimensions(), (4, 2));
    }

    #[test]
    fn orientation_is_read_from_exif() {
        assert_eq!(orientation(&oriented_jpeg(6)), 6);
        assert_eq!(orientation(&png(4, 4)), 1);
    }

    #[test]
    fn autocontrast_stretches_channels() {
        let mut image = RgbImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                Rgb([50, 50, 50])
            } else {
                Rgb([150, 150, 150])
            }
        });

        autocontrast(&mut image);

        assert_eq!(image.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(image.get_pixel(1, 0).0, [255, 255, 255]);
    }

    #[test]
    fn flat_channels_are_left_alone() {
        let mut image = RgbImage::from_pixel(3, 3, Rgb([90, 90, 90]));
        autocontrast(&mut image);
        assert_eq!(image.get_pixel(1, 1).0, [90, 90, 90]);
    }

    #[tokio::test]
    async fn large_images_are_shrunk_to_jpeg() {
        let result = PhotoEnhancer::new()
            .enhance(png(1600, 800), "loom.png")
            .await
            .unwrap();

        assert!(result.enhanced);
        assert_eq!(result.extension, "jpg");
        assert_eq!(image::guess_format(&result.bytes).unwrap(), ImageFormat::Jpeg);
        let decoded = image::load_from_memory(&result.bytes).unwrap();
        assert_eq!(decoded.dimensions(), (1200, 600));
    }

    #[tokio::test]
    async fn small_images_are_not_upscaled() {
        let result = PhotoEnhancer::new()
            .enhance(png(64, 48), "bead.png")
            .await
            .unwrap();

        let decoded = image::load_from_memory(&result.bytes).unwrap();
        assert_eq!(decoded.dimensions(), (64, 48));
    }

    #[tokio::test]
    async fn undecodable_bytes_are_returned_verbatim() {
        let raw = b"definitely not an image".to_vec();

        let result = PhotoEnhancer::new()
            .enhance(raw.clone(), "scan.PNG")
            .await
            .unwrap();

        assert!(!result.enhanced);
        assert_eq!(result.bytes, raw);
        assert_eq!(result.extension, "png");
    }

    #[tokio::test]
    async fn markup_uploads_are_not_stored_as_html() {
        let raw = b"<script>alert(document.domain)</script>".to_vec();

        let result = PhotoEnhancer::new()
            .enhance(raw.clone(), "vase.html")
            .await
            .unwrap();

        assert!(!result.enhanced);
        assert_eq!(result.extension, "bin");
        assert_eq!(result.bytes, raw);
    }

    #[tokio::test]
    async fn oversized_headers_fall_back_without_decoding() {
        let raw = rle8_bitmap_claiming_16000_square();

        let result = PhotoEnhancer::new()
            .enhance(raw.clone(), "huge.bmp")
            .await
            .unwrap();

        assert!(!result.enhanced);
        assert_eq!(result.bytes, raw);
        assert_eq!(result.extension, "bmp");
    }

    #[test]
    fn pixel_limit_is_checked_before_decoding() {
        assert!(check_dimensions(&png(64, 48)).is_ok());
        assert!(enhance_guarded(&rle8_bitmap_claiming_16000_square()).is_err());
    }

    #[tokio::test]
    async fn exif_rotated_photos_come_out_upright() {
        let result = PhotoEnhancer::new()
            .enhance(oriented_jpeg(6), "portrait.jpg")
            .await
            .unwrap();

        assert!(result.enhanced);
        let decoded = image::load_from_memory(&result.bytes).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (20, 40));
        // The left half of the stored frame ends up on top.
        let top = decoded.get_pixel(10, 5).0;
        let bottom = decoded.get_pixel(10, 35).0;
        assert!(top[0] > top[2], "top should be red, got {:?}", top);
        assert!(bottom[2] > bottom[0], "bottom should be blue, got {:?}", bottom);
    }
}
