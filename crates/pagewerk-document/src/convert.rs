// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image-to-document conversion: one page per image, in list order, each
// image fitted into the page's content box and centred.
//
// Images are decoded according to their declared MIME type. JPEG data is
// embedded as-is (DCTDecode). PNG and every other decodable format are
// embedded losslessly as Flate-compressed pixels, with alpha carried in a
// soft mask.

use image::ImageFormat;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Object, Stream, dictionary};
use pagewerk_core::error::{PagewerkError, Result};
use pagewerk_core::{EngineConfig, ImageEncoding, PageSetup};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::control::{JobControl, ProgressTracker};
use crate::image::{ImageProcessor, probe_dimensions, sniff_format};
use crate::layout::{LayoutResult, PageGeometry};
use crate::order::FileOrderList;
use crate::pdf::writer::OutputDocument;

/// Resource name of the image on every generated page.
const IMAGE_RESOURCE: &str = "Im0";

/// One image to place, as uploaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInput {
    pub name: String,
    /// Declared media type; selects the decoder.
    pub mime_type: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl ImageInput {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn declared_encoding(&self) -> ImageEncoding {
        ImageEncoding::from_mime(&self.mime_type)
    }

    /// Container to decode an `Other` image as: the one its MIME type names,
    /// or the sniffed one when the type is unknown (`application/octet-stream`
    /// or empty). `None` for non-image types.
    fn other_format(&self) -> Option<ImageFormat> {
        let mime = self.mime_type.trim().to_ascii_lowercase();
        match mime.as_str() {
            "" | "application/octet-stream" => sniff_format(&self.bytes),
            _ => ImageFormat::from_mime_type(&mime),
        }
    }
}

/// Builds a document with one page per image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageToDocumentConverter {
    setup: PageSetup,
    pdf_version: String,
    compress: bool,
    parallel: bool,
}

impl Default for ImageToDocumentConverter {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl ImageToDocumentConverter {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            setup: config.page_setup(),
            pdf_version: config.pdf_version.clone(),
            compress: config.compress_output,
            parallel: config.parallel,
        }
    }

    /// Use `setup` instead of the configured default page setup.
    pub fn with_setup(mut self, setup: PageSetup) -> Self {
        self.setup = setup;
        self
    }

    pub fn setup(&self) -> &PageSetup {
        &self.setup
    }

    /// Convert `images` in list order. Any image that can't be decoded
    /// fails the whole conversion with that image's name.
    #[instrument(skip_all, fields(images = images.len()))]
    pub fn convert(&self, images: &FileOrderList<ImageInput>, control: &JobControl) -> Result<Vec<u8>> {
        if images.is_empty() {
            return Err(PagewerkError::Usage("no images to convert".into()));
        }

        let geometry = PageGeometry::from_setup(&self.setup);
        let (content_w, content_h) = geometry.content_box();
        if content_w <= 0.0 || content_h <= 0.0 {
            return Err(PagewerkError::Layout(format!(
                "margin {}mm leaves no room on the page",
                self.setup.margin_mm
            )));
        }

        info!(
            paper = ?self.setup.paper_size,
            orientation = ?self.setup.orientation,
            margin_mm = self.setup.margin_mm,
            "converting images"
        );

        let inputs: Vec<&ImageInput> = images.payloads().collect();
        let tracker = control.tracker(inputs.len());
        let prepare = |input: &&ImageInput| prepare_tracked(input, &tracker);
        let prepared: Vec<PreparedImage> = if self.parallel {
            inputs.par_iter().map(prepare).collect::<Result<_>>()?
        } else {
            inputs.iter().map(prepare).collect::<Result<_>>()?
        };

        let mut output = OutputDocument::new(&self.pdf_version);
        for image in prepared {
            control.checkpoint()?;
            let layout = geometry.place(image.width, image.height)?;
            add_image_page(&mut output, &geometry, image, &layout)?;
        }
        output.finish(self.compress, "images")
    }
}

fn prepare_tracked(input: &ImageInput, tracker: &ProgressTracker<'_>) -> Result<PreparedImage> {
    tracker.checkpoint()?;
    let prepared = PreparedImage::from_input(input)?;
    tracker.unit_done();
    Ok(prepared)
}

/// An image XObject ready to be added to a document.
struct PreparedImage {
    width: u32,
    height: u32,
    xobject: Stream,
    soft_mask: Option<Stream>,
}

impl PreparedImage {
    fn from_input(input: &ImageInput) -> Result<Self> {
        let declared = input.declared_encoding();
        let prepared = match declared {
            ImageEncoding::Jpeg => Self::from_jpeg(input)?,
            ImageEncoding::Png => Self::from_pixels(input, ImageFormat::Png)?,
            ImageEncoding::Other => {
                let format = input
                    .other_format()
                    .ok_or_else(|| PagewerkError::unsupported_image(&input.name))?;
                Self::from_pixels(input, format)?
            }
        };
        debug!(
            item = %input.name,
            ?declared,
            width = prepared.width,
            height = prepared.height,
            "image prepared"
        );
        Ok(prepared)
    }

    /// Pass JPEG data through untouched. Bytes that aren't JPEG are
    /// rejected.
    fn from_jpeg(input: &ImageInput) -> Result<Self> {
        let header = jpeg_header(&input.bytes)
            .ok_or_else(|| PagewerkError::unsupported_image(&input.name))?;
        let (width, height) = probe_dimensions(&input.name, &input.bytes)?;

        let mut dict = image_dictionary(width, height);
        if !set_jpeg_colour_space(&mut dict, &header) {
            return Err(PagewerkError::unsupported_image(&input.name));
        }
        dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));

        Ok(Self {
            width,
            height,
            xobject: Stream::new(dict, input.bytes.clone()).with_compression(false),
            soft_mask: None,
        })
    }

    /// Decode as `format` and embed the pixels losslessly.
    fn from_pixels(input: &ImageInput, format: ImageFormat) -> Result<Self> {
        let processor = ImageProcessor::from_bytes_with_format(&input.name, &input.bytes, format)?;
        let (width, height) = (processor.width(), processor.height());
        let image = processor.as_dynamic();

        let (colour_space, samples) = if processor.has_color() {
            ("DeviceRGB", image.to_rgb8().into_raw())
        } else {
            ("DeviceGray", image.to_luma8().into_raw())
        };
        let mut dict = image_dictionary(width, height);
        dict.set("ColorSpace", Object::Name(colour_space.as_bytes().to_vec()));
        let xobject = flate_stream(&input.name, dict, samples)?;

        let alpha: Vec<u8> = if processor.has_alpha() {
            image.to_rgba8().pixels().map(|pixel| pixel.0[3]).collect()
        } else {
            Vec::new()
        };
        // Fully opaque images get no mask.
        let soft_mask = if alpha.iter().any(|&a| a != u8::MAX) {
            let mut dict = image_dictionary(width, height);
            dict.set("ColorSpace", Object::Name(b"DeviceGray".to_vec()));
            Some(flate_stream(&input.name, dict, alpha)?)
        } else {
            None
        };

        Ok(Self {
            width,
            height,
            xobject,
            soft_mask,
        })
    }
}

fn image_dictionary(width: u32, height: u32) -> Dictionary {
    dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "BitsPerComponent" => 8,
    }
}

fn flate_stream(item: &str, dict: Dictionary, samples: Vec<u8>) -> Result<Stream> {
    let mut stream = Stream::new(dict, samples);
    stream.compress().map_err(|err| PagewerkError::Convert {
        item: item.to_owned(),
        detail: format!("compressing pixels failed: {err}"),
    })?;
    Ok(stream.with_compression(false))
}

/// What the embedder needs from a JPEG's markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct JpegHeader {
    /// Colour components declared by the first SOF marker.
    components: u8,
    /// An APP14 "Adobe" segment precedes the SOF.
    adobe: bool,
}

/// Colour space (and `/Decode` for Adobe CMYK) for an embedded JPEG. False
/// for component counts PDF can't express.
fn set_jpeg_colour_space(dict: &mut Dictionary, header: &JpegHeader) -> bool {
    let space: &[u8] = match header.components {
        1 => b"DeviceGray",
        3 => b"DeviceRGB",
        4 => b"DeviceCMYK",
        _ => return false,
    };
    dict.set("ColorSpace", Object::Name(space.to_vec()));
    // Adobe CMYK JPEGs store inverted samples.
    if header.components == 4 && header.adobe {
        dict.set(
            "Decode",
            Object::Array([1, 0, 1, 0, 1, 0, 1, 0].map(Object::Integer).to_vec()),
        );
    }
    true
}

/// Scan markers up to the first SOF, if the data is a well-formed JPEG up to
/// that point.
fn jpeg_header(data: &[u8]) -> Option<JpegHeader> {
    if data.get(..2)? != [0xFF, 0xD8] {
        return None;
    }
    let mut adobe = false;
    let mut offset = 2;
    loop {
        // Skip fill bytes before a marker.
        while *data.get(offset)? == 0xFF && *data.get(offset + 1)? == 0xFF {
            offset += 1;
        }
        if *data.get(offset)? != 0xFF {
            return None;
        }
        let marker = *data.get(offset + 1)?;
        match marker {
            0xD8 | 0x01 | 0xD0..=0xD7 => {
                offset += 2;
                continue;
            }
            0xD9 | 0xDA => return None,
            _ => {}
        }
        let length = u16::from_be_bytes([*data.get(offset + 2)?, *data.get(offset + 3)?]) as usize;
        if marker == 0xEE && data.get(offset + 4..offset + 9) == Some(&b"Adobe"[..]) {
            adobe = true;
        }
        let is_sof = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_sof {
            // length(2) precision(1) height(2) width(2) components(1)
            let components = *data.get(offset + 9)?;
            return Some(JpegHeader { components, adobe });
        }
        offset += 2 + length;
    }
}

fn add_image_page(
    output: &mut OutputDocument,
    geometry: &PageGeometry,
    image: PreparedImage,
    layout: &LayoutResult,
) -> Result<()> {
    let document = output.document_mut();

    let mut xobject = image.xobject;
    if let Some(mask) = image.soft_mask {
        let mask_id = document.add_object(mask);
        xobject.dict.set("SMask", Object::Reference(mask_id));
    }
    let image_id = document.add_object(xobject);

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    layout.draw_width.into(),
                    0.into(),
                    0.into(),
                    layout.draw_height.into(),
                    layout.offset_x.into(),
                    layout.offset_y.into(),
                ],
            ),
            Operation::new("Do", vec![Object::Name(IMAGE_RESOURCE.as_bytes().to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let encoded = content.encode().map_err(|err| PagewerkError::Layout(err.to_string()))?;
    let content_id = document.add_object(Stream::new(Dictionary::new(), encoded));

    let page = dictionary! {
        "MediaBox" => vec![0.into(), 0.into(), geometry.width.into(), geometry.height.into()],
        "Resources" => dictionary! {
            "XObject" => dictionary! { IMAGE_RESOURCE => image_id },
        },
        "Contents" => content_id,
    };
    output.add_page(page);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::order::{Direction, ItemId};
    use crate::pdf::PageSource;
    use lopdf::Document;
    use pagewerk_core::{Orientation, PaperSize};

    fn list(inputs: Vec<ImageInput>) -> FileOrderList<ImageInput> {
        let mut list = FileOrderList::new();
        list.append(
            inputs
                .into_iter()
                .map(|input| (ItemId::new(input.name.clone()), input)),
        )
        .unwrap();
        list
    }

    fn png(name: &str, w: u32, h: u32) -> ImageInput {
        ImageInput::new(name, "image/png", fixtures::png_bytes(w, h, [10, 20, 30, 255]))
    }

    /// Width of the image XObject drawn on each page, in page order.
    fn image_widths(bytes: &[u8]) -> Vec<i64> {
        let doc = Document::load_mem(bytes).unwrap();
        doc.get_pages()
            .values()
            .map(|&page_id| {
                let page = doc.get_dictionary(page_id).unwrap();
                let resources = page.get(b"Resources").unwrap();
                let resources = match resources {
                    Object::Reference(id) => doc.get_dictionary(*id).unwrap(),
                    other => other.as_dict().unwrap(),
                };
                let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
                let image_id = xobjects.get(b"Im0").unwrap().as_reference().unwrap();
                let image = doc.get_object(image_id).unwrap().as_stream().unwrap();
                image.dict.get(b"Width").unwrap().as_i64().unwrap()
            })
            .collect()
    }

    #[test]
    fn one_page_per_image_in_list_order() {
        let mut images = list(vec![
            png("a.png", 10, 5),
            ImageInput::new("b.jpg", "image/jpeg", fixtures::jpeg_bytes(20, 10, [200, 0, 0])),
            png("c.png", 30, 15),
        ]);
        images
            .move_adjacent(&ItemId::from("c.png"), Direction::Up)
            .unwrap();

        let bytes = ImageToDocumentConverter::default()
            .convert(&images, &JobControl::new())
            .unwrap();
        assert_eq!(image_widths(&bytes), vec![10, 30, 20]);
    }

    #[test]
    fn pages_use_the_configured_paper() {
        let converter = ImageToDocumentConverter::default().with_setup(PageSetup {
            paper_size: PaperSize::Letter,
            orientation: Orientation::Landscape,
            margin_mm: 0.0,
        });
        let bytes = converter
            .convert(&list(vec![png("a.png", 8, 8)]), &JobControl::new())
            .unwrap();
        let source = PageSource::open("out.pdf", bytes).unwrap();
        assert_eq!(source.page_size(1).unwrap(), (792.0, 612.0));
    }

    #[test]
    fn jpeg_is_embedded_without_recompression() {
        let jpeg = fixtures::jpeg_bytes(16, 16, [0, 128, 0]);
        let bytes = ImageToDocumentConverter::default()
            .convert(
                &list(vec![ImageInput::new("a.jpg", "image/jpeg", jpeg.clone())]),
                &JobControl::new(),
            )
            .unwrap();

        let doc = Document::load_mem(&bytes).unwrap();
        let embedded = doc
            .objects
            .values()
            .filter_map(|object| object.as_stream().ok())
            .find(|stream| {
                stream
                    .dict
                    .get(b"Filter")
                    .and_then(|filter| filter.as_name())
                    .is_ok_and(|name| name == b"DCTDecode")
            })
            .unwrap();
        assert_eq!(embedded.content, jpeg);
    }

    #[test]
    fn other_formats_and_alpha_are_converted() {
        let gif = ImageInput::new("c.gif", "image/gif", fixtures::gif_bytes(12, 6, [0, 0, 255, 255]));
        let translucent = ImageInput::new(
            "d.png",
            "image/png",
            fixtures::png_bytes(4, 4, [255, 0, 0, 128]),
        );
        let bytes = ImageToDocumentConverter::default()
            .convert(&list(vec![gif, translucent]), &JobControl::new())
            .unwrap();
        assert_eq!(image_widths(&bytes), vec![12, 4]);

        let doc = Document::load_mem(&bytes).unwrap();
        let masks = doc
            .objects
            .values()
            .filter_map(|object| object.as_stream().ok())
            .filter(|stream| stream.dict.has(b"SMask"))
            .count();
        assert_eq!(masks, 1);
    }

    #[test]
    fn undecodable_image_fails_the_batch() {
        let images = list(vec![
            png("a.png", 4, 4),
            ImageInput::new("broken.png", "image/png", b"nope".to_vec()),
        ]);
        let err = ImageToDocumentConverter::default()
            .convert(&images, &JobControl::new())
            .unwrap_err();
        assert_eq!(err.to_string(), "broken.png: unsupported image encoding");
    }

    #[test]
    fn empty_list_and_oversized_margins_are_rejected() {
        let converter = ImageToDocumentConverter::default();
        assert!(matches!(
            converter.convert(&FileOrderList::new(), &JobControl::new()),
            Err(PagewerkError::Usage(_))
        ));

        let cramped = converter.with_setup(PageSetup {
            margin_mm: 200.0,
            ..PageSetup::default()
        });
        assert!(matches!(
            cramped.convert(&list(vec![png("a.png", 4, 4)]), &JobControl::new()),
            Err(PagewerkError::Layout(_))
        ));
    }

    #[test]
    fn declared_type_selects_the_decoder() {
        let png_data = fixtures::png_bytes(4, 4, [0, 0, 0, 255]);
        let converter = ImageToDocumentConverter::default();
        for (name, mime) in [
            ("x.txt", "text/plain"),
            ("x.jpg", "image/jpeg"),
            ("x.gif", "image/gif"),
        ] {
            let images = list(vec![ImageInput::new(name, mime, png_data.clone())]);
            let err = converter.convert(&images, &JobControl::new()).unwrap_err();
            assert_eq!(err.to_string(), format!("{name}: unsupported image encoding"));
        }

        // unknown declared type falls back to sniffing
        let images = list(vec![ImageInput::new("x.bin", "application/octet-stream", png_data)]);
        let bytes = converter.convert(&images, &JobControl::new()).unwrap();
        assert_eq!(image_widths(&bytes), vec![4]);
    }

    #[test]
    fn sof_scan_reads_component_count() {
        assert_eq!(
            jpeg_header(&fixtures::jpeg_bytes(4, 4, [1, 2, 3])),
            Some(JpegHeader { components: 3, adobe: false })
        );
        assert_eq!(jpeg_header(b"\xFF\xD8\xFF\xD9"), None);
        assert_eq!(jpeg_header(b"GIF89a"), None);
    }

    /// SOI, optional APP14 "Adobe", then a 4-component SOF0.
    fn cmyk_jpeg_header(adobe: bool) -> Vec<u8> {
        let mut data = vec![0xFF, 0xD8];
        if adobe {
            data.extend_from_slice(&[0xFF, 0xEE, 0x00, 0x0E]);
            data.extend_from_slice(b"Adobe");
            data.extend_from_slice(&[0x00, 0x64, 0x00, 0x00, 0x00, 0x00, 0x02]);
        }
        data.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x14, 0x08, 0x00, 0x04, 0x00, 0x04, 0x04]);
        for id in 1..=4u8 {
            data.extend_from_slice(&[id, 0x11, 0x00]);
        }
        data
    }

    #[test]
    fn only_adobe_cmyk_gets_an_inverted_decode() {
        for adobe in [true, false] {
            let header = jpeg_header(&cmyk_jpeg_header(adobe)).unwrap();
            assert_eq!(header, JpegHeader { components: 4, adobe });

            let mut dict = image_dictionary(4, 4);
            assert!(set_jpeg_colour_space(&mut dict, &header));
            assert_eq!(dict.get(b"ColorSpace").unwrap().as_name().unwrap(), b"DeviceCMYK");
            assert_eq!(dict.has(b"Decode"), adobe);
        }

        let mut dict = image_dictionary(4, 4);
        assert!(!set_jpeg_colour_space(&mut dict, &JpegHeader { components: 2, adobe: false }));
    }
}
