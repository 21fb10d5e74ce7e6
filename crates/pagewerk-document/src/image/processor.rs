// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor — decode input images, quarter-turn rotation, and encoding
// of rendered pages to PNG/JPEG/WEBP. Operates on in-memory images using the
// `image` crate.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::error::{EncodingError, ImageError, ImageFormatHint};
use image::{DynamicImage, ImageFormat, ImageReader, ImageResult};
use pagewerk_core::RasterFormat;
use pagewerk_core::error::{PagewerkError, Result};
use tracing::{debug, instrument};

/// Container format of an encoded image, sniffed from its leading bytes.
pub fn sniff_format(data: &[u8]) -> Option<ImageFormat> {
    image::guess_format(data).ok()
}

/// Pixel dimensions of an encoded image without decoding its pixels.
pub fn probe_dimensions(item: &str, data: &[u8]) -> Result<(u32, u32)> {
    ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|_| PagewerkError::unsupported_image(item))?
        .into_dimensions()
        .map_err(|_| PagewerkError::unsupported_image(item))
}

/// A single decoded image.
///
/// Transformations consume `self` and return the transformed processor, so
/// calls chain.
pub struct ImageProcessor {
    image: DynamicImage,
}

impl ImageProcessor {
    /// Decode `data`, sniffing the container format. `item` names the input
    /// in the error if the bytes are not a decodable image.
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(item: &str, data: &[u8]) -> Result<Self> {
        let image =
            image::load_from_memory(data).map_err(|_| PagewerkError::unsupported_image(item))?;
        debug!(
            width = image.width(),
            height = image.height(),
            "image decoded"
        );
        Ok(Self { image })
    }

    /// Decode `data` as exactly `format`.
    pub fn from_bytes_with_format(item: &str, data: &[u8], format: ImageFormat) -> Result<Self> {
        let image = image::load_from_memory_with_format(data, format)
            .map_err(|_| PagewerkError::unsupported_image(item))?;
        debug!(?format, width = image.width(), height = image.height(), "image decoded");
        Ok(Self { image })
    }

    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn has_alpha(&self) -> bool {
        self.image.color().has_alpha()
    }

    pub fn has_color(&self) -> bool {
        self.image.color().has_color()
    }

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    /// Rotate clockwise by a multiple of 90 degrees. Other angles are
    /// snapped down to the previous quarter turn.
    pub fn rotate_quarter_turns(self, degrees: u16) -> Self {
        let image = match degrees % 360 / 90 {
            1 => self.image.rotate90(),
            2 => self.image.rotate180(),
            3 => self.image.rotate270(),
            _ => self.image,
        };
        Self { image }
    }

    /// Encode as PNG.
    pub fn to_png_bytes(&self) -> ImageResult<Vec<u8>> {
        encode_to_format(&self.image, ImageFormat::Png)
    }

    /// Encode as baseline JPEG. Alpha is dropped.
    pub fn to_jpeg_bytes(&self, quality: u8) -> ImageResult<Vec<u8>> {
        let mut buffer = Vec::new();
        let rgb = self.image.to_rgb8();
        let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
        rgb.write_with_encoder(encoder)?;
        Ok(buffer)
    }

    /// Encode as lossy WEBP through libwebp.
    pub fn to_webp_bytes(&self, quality: u8) -> ImageResult<Vec<u8>> {
        let rgba = self.image.to_rgba8();
        let encoder = webp::Encoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height());
        let memory = encoder
            .encode_simple(false, f32::from(quality.clamp(1, 100)))
            .map_err(|err| {
                ImageError::Encoding(EncodingError::new(
                    ImageFormatHint::Exact(ImageFormat::WebP),
                    format!("{err:?}"),
                ))
            })?;
        Ok(memory.to_vec())
    }

    /// Encode in `format`; `quality` (1-100) is ignored for PNG.
    pub fn encode(&self, format: RasterFormat, quality: u8) -> ImageResult<Vec<u8>> {
        match format {
            RasterFormat::Png => self.to_png_bytes(),
            RasterFormat::Jpeg => self.to_jpeg_bytes(quality),
            RasterFormat::Webp => self.to_webp_bytes(quality),
        }
    }
}

fn encode_to_format(image: &DynamicImage, format: ImageFormat) -> ImageResult<Vec<u8>> {
    let mut buffer = Vec::new();
    image.write_to(&mut Cursor::new(&mut buffer), format)?;
    Ok(buffer)
}
