//! Optical code decoding
//!
//! Stateless per call: every frame is prepared and scanned from scratch, so
//! a garbage frame can never poison the next one.

use crate::types::CameraFrame;

/// Locates and decodes a 2D code in a raster frame.
pub trait FrameDecoder: Send + Sync {
    /// Returns the decoded text of the first readable code, or `None` when
    /// the frame holds nothing decodable.
    fn decode(&self, frame: &CameraFrame) -> Option<String>;
}

/// QR decoder over the frame's luma plane.
pub struct QrDecoder;

impl QrDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for QrDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder for QrDecoder {
    fn decode(&self, frame: &CameraFrame) -> Option<String> {
        let rgb = image::RgbImage::from_vec(frame.width, frame.height, frame.data.clone())?;
        let luma = image::DynamicImage::ImageRgb8(rgb).to_luma8();

        let mut prepared = rqrr::PreparedImage::prepare(luma);
        for grid in prepared.detect_grids() {
            match grid.decode() {
                Ok((_meta, content)) => {
                    log::debug!("Decoded code ({} chars)", content.len());
                    return Some(content);
                }
                Err(e) => {
                    // Partial grids are common while the code moves into
                    // focus; keep trying the remaining candidates.
                    log::trace!("Grid decode failed: {}", e);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_frame_decodes_to_none() {
        let frame = CameraFrame::new(vec![255u8; 320 * 240 * 3], 320, 240, "test".to_string());
        let decoder = QrDecoder::new();
        assert!(decoder.decode(&frame).is_none());
    }

    #[test]
    fn test_truncated_frame_decodes_to_none() {
        // Data shorter than width*height*3 must not panic.
        let frame = CameraFrame::new(vec![0u8; 64], 320, 240, "test".to_string());
        let decoder = QrDecoder::new();
        assert!(decoder.decode(&frame).is_none());
    }

    #[test]
    fn test_noise_frame_decodes_to_none() {
        let mut data = vec![0u8; 160 * 120 * 3];
        for (i, byte) in data.iter_mut().enumerate() {
            *byte = (i * 31 % 251) as u8;
        }
        let frame = CameraFrame::new(data, 160, 120, "test".to_string());
        let decoder = QrDecoder::new();
        assert!(decoder.decode(&frame).is_none());
    }
}
