use image::codecs::jpeg::JpegEncoder as ImageJpegEncoder;
use image::ExtendedColorType;
use thiserror::Error;

use crate::shared::frame::Frame;
use crate::video::domain::image_encoder::ImageEncoder;

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("cannot encode a {channels}-channel frame as JPEG")]
    UnsupportedChannels { channels: u8 },
    #[error("JPEG quality must be in 1..=100, got {0}")]
    InvalidQuality(u8),
    #[error("JPEG encoding failed: {0}")]
    Image(#[from] image::ImageError),
}

/// Encodes RGB or grayscale frames as baseline JPEG.
pub struct JpegEncoder {
    quality: u8,
}

impl JpegEncoder {
    pub fn new(quality: u8) -> Result<Self, EncodeError> {
        if quality == 0 || quality > 100 {
            return Err(EncodeError::InvalidQuality(quality));
        }
        Ok(Self { quality })
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl ImageEncoder for JpegEncoder {
    fn encode(&self, frame: &Frame) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        let color = match frame.channels() {
            1 => ExtendedColorType::L8,
            3 => ExtendedColorType::Rgb8,
            channels => return Err(EncodeError::UnsupportedChannels { channels }.into()),
        };

        let mut bytes = Vec::new();
        ImageJpegEncoder::new_with_quality(&mut bytes, self.quality)
            .encode(frame.data(), frame.width(), frame.height(), color)
            .map_err(EncodeError::from)?;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn solid_frame(width: u32, height: u32, rgb: [u8; 3]) -> Frame {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take((width * height * 3) as usize)
            .collect();
        Frame::new(data, width, height, 3, 0)
    }

    #[test]
    fn test_encode_produces_jpeg_markers() {
        let encoder = JpegEncoder::new(90).unwrap();
        let bytes = encoder.encode(&solid_frame(32, 24, [10, 120, 240])).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        assert_eq!(&bytes[bytes.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn test_encoded_image_decodes_to_same_size() {
        let encoder = JpegEncoder::new(90).unwrap();
        let bytes = encoder.encode(&solid_frame(40, 30, [200, 50, 50])).unwrap();
        let img = image::load_from_memory(&bytes).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (40, 30));
        let px = img.get_pixel(20, 15).0;
        assert!((px[0] as i32 - 200).abs() < 12);
    }

    #[test]
    fn test_grayscale_frame_encodes() {
        let encoder = JpegEncoder::new(75).unwrap();
        let frame = Frame::new(vec![128; 16 * 16], 16, 16, 1, 0);
        assert!(encoder.encode(&frame).is_ok());
    }

    #[test]
    fn test_rgba_frame_is_rejected() {
        let encoder = JpegEncoder::new(90).unwrap();
        let frame = Frame::new(vec![0; 4 * 4 * 4], 4, 4, 4, 0);
        assert!(encoder.encode(&frame).is_err());
    }

    #[rstest]
    #[case::zero(0)]
    #[case::over(101)]
    fn test_invalid_quality(#[case] quality: u8) {
        assert!(matches!(
            JpegEncoder::new(quality),
            Err(EncodeError::InvalidQuality(q)) if q == quality
        ));
    }
}
