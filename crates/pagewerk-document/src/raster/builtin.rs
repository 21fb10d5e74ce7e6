// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Built-in page renderer. Interprets the painting subset of a page's content
// stream: graphics state, paths with fill, device colours, image XObjects
// (JPEG and Flate/raw samples, with soft masks) and form XObjects. Text,
// strokes and clipping are not painted; the default `mupdf` feature renders
// those.

use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgba, RgbaImage};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream};
use pagewerk_core::error::{PagewerkError, Result};
use tracing::{debug, instrument, warn};

use super::{PageRenderer, page_extent};
use super::paint::{Canvas, FillRule, Matrix, Polygons};
use crate::image::ImageProcessor;
use crate::pdf::PageSource;
use crate::pdf::objects::{self, get_resolved, resolve, resolve_dict};

/// Forms nested deeper than this are skipped.
const MAX_FORM_DEPTH: usize = 12;

/// Line segments used to approximate each Bezier curve.
const CURVE_SEGMENTS: usize = 12;

/// Pure-Rust renderer with no native dependencies.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinRenderer;

impl PageRenderer for BuiltinRenderer {
    fn name(&self) -> &'static str {
        "builtin"
    }

    #[instrument(skip(self, source), fields(source = source.label()))]
    fn render(&self, source: &PageSource, page_number: u32, scale: f32) -> Result<RgbaImage> {
        let (image, unpainted) = self.paint(source, page_number, scale)?;
        if unpainted > 0 {
            warn!(
                page_number,
                operators = unpainted,
                "text and strokes left unpainted by the builtin renderer"
            );
        }
        Ok(image)
    }
}

impl BuiltinRenderer {
    /// Render a page and count the text and stroke operators it skipped.
    fn paint(&self, source: &PageSource, page_number: u32, scale: f32) -> Result<(RgbaImage, usize)> {
        let info = source.page_info(page_number)?;
        let page_id = source.page_id(page_number)?;
        let doc = source.document();

        let (box_w, box_h) = info.box_size();
        let (width, height) = page_extent(page_number, box_w, box_h, scale)?;
        let [x0, _, _, y1] = info.media_box;
        let device = Matrix::new(scale, 0.0, 0.0, -scale, -x0 * scale, y1 * scale);

        let raw = doc.get_page_content(page_id).map_err(|err| PagewerkError::Render {
            page: page_number,
            detail: format!("reading content: {err}"),
        })?;
        let content = Content::decode(&raw).map_err(|err| PagewerkError::Render {
            page: page_number,
            detail: format!("decoding content: {err}"),
        })?;
        let resources = objects::inherited(doc, page_id, b"Resources")
            .and_then(|object| resolve_dict(doc, object));

        let mut painter = Painter {
            doc,
            canvas: Canvas::white(width, height),
            state: GraphicsState::new(device),
            saved: Vec::new(),
            path: PathBuilder::default(),
            unpainted: 0,
        };
        painter.run(&content.operations, resources, 0);
        debug!(page_number, width, height, "page painted");

        let image = ImageProcessor::from_dynamic(DynamicImage::ImageRgba8(painter.canvas.into_image()))
            .rotate_quarter_turns(info.rotation)
            .into_dynamic()
            .to_rgba8();
        Ok((image, painter.unpainted))
    }
}

#[derive(Debug, Clone, Copy)]
struct GraphicsState {
    ctm: Matrix,
    fill: [u8; 3],
}

impl GraphicsState {
    fn new(ctm: Matrix) -> Self {
        Self { ctm, fill: [0, 0, 0] }
    }
}

/// Current path in user space.
#[derive(Debug, Default)]
struct PathBuilder {
    subpaths: Vec<Vec<(f32, f32)>>,
    current: Vec<(f32, f32)>,
}

impl PathBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        self.flush();
        self.current.push((x, y));
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.current.push((x, y));
    }

    fn curve_to(&mut self, c1: (f32, f32), c2: (f32, f32), end: (f32, f32)) {
        let Some(&start) = self.current.last() else {
            self.current.push(end);
            return;
        };
        for step in 1..=CURVE_SEGMENTS {
            let t = step as f32 / CURVE_SEGMENTS as f32;
            let mt = 1.0 - t;
            let x = mt * mt * mt * start.0 + 3.0 * mt * mt * t * c1.0 + 3.0 * mt * t * t * c2.0 + t * t * t * end.0;
            let y = mt * mt * mt * start.1 + 3.0 * mt * mt * t * c1.1 + 3.0 * mt * t * t * c2.1 + t * t * t * end.1;
            self.current.push((x, y));
        }
    }

    fn current_point(&self) -> Option<(f32, f32)> {
        self.current.last().copied()
    }

    fn rectangle(&mut self, x: f32, y: f32, w: f32, h: f32) {
        self.flush();
        self.subpaths
            .push(vec![(x, y), (x + w, y), (x + w, y + h), (x, y + h)]);
    }

    fn flush(&mut self) {
        if !self.current.is_empty() {
            self.subpaths.push(std::mem::take(&mut self.current));
        }
    }

    /// Take the path, mapped to device space. Fills close subpaths
    /// implicitly.
    fn take_device(&mut self, ctm: &Matrix) -> Polygons {
        self.flush();
        std::mem::take(&mut self.subpaths)
            .into_iter()
            .map(|subpath| subpath.into_iter().map(|(x, y)| ctm.apply(x, y)).collect())
            .collect()
    }

    fn clear(&mut self) {
        self.subpaths.clear();
        self.current.clear();
    }
}

struct Painter<'a> {
    doc: &'a Document,
    canvas: Canvas,
    state: GraphicsState,
    saved: Vec<GraphicsState>,
    path: PathBuilder,
    /// Text and stroke operators seen but not painted.
    unpainted: usize,
}

impl<'a> Painter<'a> {
    fn run(&mut self, operations: &[Operation], resources: Option<&'a Dictionary>, depth: usize) {
        for op in operations {
            let nums: Vec<f32> = op
                .operands
                .iter()
                .filter_map(objects::number)
                .collect();
            match op.operator.as_str() {
                "q" => self.saved.push(self.state),
                "Q" => {
                    if let Some(state) = self.saved.pop() {
                        self.state = state;
                    }
                }
                "cm" if nums.len() == 6 => {
                    let m = Matrix::new(nums[0], nums[1], nums[2], nums[3], nums[4], nums[5]);
                    self.state.ctm = m.then(&self.state.ctm);
                }
                "m" if nums.len() == 2 => self.path.move_to(nums[0], nums[1]),
                "l" if nums.len() == 2 => self.path.line_to(nums[0], nums[1]),
                "c" if nums.len() == 6 => {
                    self.path
                        .curve_to((nums[0], nums[1]), (nums[2], nums[3]), (nums[4], nums[5]))
                }
                "v" if nums.len() == 4 => {
                    let start = self.path.current_point().unwrap_or((nums[0], nums[1]));
                    self.path.curve_to(start, (nums[0], nums[1]), (nums[2], nums[3]));
                }
                "y" if nums.len() == 4 => {
                    self.path
                        .curve_to((nums[0], nums[1]), (nums[2], nums[3]), (nums[2], nums[3]))
                }
                "h" => self.path.flush(),
                "re" if nums.len() == 4 => self.path.rectangle(nums[0], nums[1], nums[2], nums[3]),
                "f" | "F" => self.fill(FillRule::NonZero),
                "f*" => self.fill(FillRule::EvenOdd),
                "B" | "b" => {
                    self.fill(FillRule::NonZero);
                    self.unpainted += 1;
                }
                "B*" | "b*" => {
                    self.fill(FillRule::EvenOdd);
                    self.unpainted += 1;
                }
                "S" | "s" => {
                    self.path.clear();
                    self.unpainted += 1;
                }
                "n" => self.path.clear(),
                "Tj" | "TJ" | "'" | "\"" => self.unpainted += 1,
                "g" if nums.len() == 1 => self.state.fill = gray(nums[0]),
                "rg" if nums.len() == 3 => self.state.fill = rgb(nums[0], nums[1], nums[2]),
                "k" if nums.len() == 4 => self.state.fill = cmyk(nums[0], nums[1], nums[2], nums[3]),
                "sc" | "scn" => match nums.len() {
                    1 => self.state.fill = gray(nums[0]),
                    3 => self.state.fill = rgb(nums[0], nums[1], nums[2]),
                    4 => self.state.fill = cmyk(nums[0], nums[1], nums[2], nums[3]),
                    _ => {}
                },
                "Do" => {
                    if let Some(name) = op.operands.first().and_then(|o| o.as_name().ok()) {
                        self.draw_xobject(name, resources, depth);
                    }
                }
                _ => {}
            }
        }
    }

    fn fill(&mut self, rule: FillRule) {
        let polygons = self.path.take_device(&self.state.ctm);
        self.canvas.fill_polygons(&polygons, rule, self.state.fill);
    }

    fn draw_xobject(&mut self, name: &[u8], resources: Option<&'a Dictionary>, depth: usize) {
        let doc = self.doc;
        let Some(stream) = resources
            .and_then(|res| get_resolved(doc, res, b"XObject"))
            .and_then(|xobjects| xobjects.as_dict().ok())
            .and_then(|xobjects| get_resolved(doc, xobjects, name))
            .and_then(|object| object.as_stream().ok())
        else {
            warn!(name = %String::from_utf8_lossy(name), "missing XObject");
            return;
        };

        match stream.dict.get(b"Subtype").and_then(Object::as_name) {
            Ok(b"Image") => match decode_image(doc, stream) {
                Some(image) => self.canvas.draw_image(&image, &self.state.ctm),
                None => warn!(name = %String::from_utf8_lossy(name), "image XObject not drawable"),
            },
            Ok(b"Form") => self.draw_form(stream, resources, depth),
            _ => {}
        }
    }

    fn draw_form(&mut self, stream: &'a Stream, parent: Option<&'a Dictionary>, depth: usize) {
        if depth >= MAX_FORM_DEPTH {
            warn!(depth, "form nesting too deep");
            return;
        }
        let doc = self.doc;
        let data = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());
        let Ok(content) = Content::decode(&data) else {
            warn!("undecodable form content");
            return;
        };

        let matrix = stream
            .dict
            .get(b"Matrix")
            .ok()
            .and_then(|object| resolve(doc, object))
            .and_then(|object| object.as_array().ok())
            .map(|items| items.iter().filter_map(objects::number).collect::<Vec<_>>())
            .filter(|values| values.len() == 6)
            .map(|v| Matrix::new(v[0], v[1], v[2], v[3], v[4], v[5]))
            .unwrap_or(Matrix::IDENTITY);
        let resources = get_resolved(doc, &stream.dict, b"Resources")
            .and_then(|object| object.as_dict().ok())
            .or(parent);

        let saved = self.state;
        let saved_depth = self.saved.len();
        self.state.ctm = matrix.then(&self.state.ctm);
        self.run(&content.operations, resources, depth + 1);
        self.saved.truncate(saved_depth);
        self.state = saved;
    }
}

fn channel(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn gray(value: f32) -> [u8; 3] {
    let v = channel(value);
    [v, v, v]
}

fn rgb(r: f32, g: f32, b: f32) -> [u8; 3] {
    [channel(r), channel(g), channel(b)]
}

fn cmyk(c: f32, m: f32, y: f32, k: f32) -> [u8; 3] {
    let k = k.clamp(0.0, 1.0);
    rgb((1.0 - c) * (1.0 - k), (1.0 - m) * (1.0 - k), (1.0 - y) * (1.0 - k))
}

/// Samples of an image XObject as RGBA, soft mask applied. `None` when the
/// encoding isn't supported here.
fn decode_image(doc: &Document, stream: &Stream) -> Option<RgbaImage> {
    let dict = &stream.dict;
    let mut image = if has_filter(dict, b"DCTDecode") {
        image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg)
            .ok()?
            .to_rgba8()
    } else {
        decode_samples(doc, stream)?
    };

    if let Some(mask) = dict
        .get(b"SMask")
        .ok()
        .and_then(|object| resolve(doc, object))
        .and_then(|object| object.as_stream().ok())
        .and_then(|mask| decode_samples(doc, mask))
    {
        let mask = DynamicImage::ImageRgba8(mask).to_luma8();
        apply_mask(&mut image, &mask);
    }
    Some(image)
}

fn has_filter(dict: &Dictionary, wanted: &[u8]) -> bool {
    match dict.get(b"Filter") {
        Ok(Object::Name(name)) => name == wanted,
        Ok(Object::Array(filters)) => filters
            .iter()
            .any(|filter| filter.as_name().is_ok_and(|name| name == wanted)),
        _ => false,
    }
}

/// 8-bit Gray/RGB/CMYK or indexed samples.
fn decode_samples(doc: &Document, stream: &Stream) -> Option<RgbaImage> {
    let dict = &stream.dict;
    let number = |key: &[u8]| get_resolved(doc, dict, key).and_then(|o| o.as_i64().ok());
    let width = u32::try_from(number(b"Width")?).ok()?;
    let height = u32::try_from(number(b"Height")?).ok()?;
    if number(b"BitsPerComponent").unwrap_or(8) != 8 || width == 0 || height == 0 {
        return None;
    }

    let data = if dict.has(b"Filter") {
        stream.decompressed_content().ok()?
    } else {
        stream.content.clone()
    };

    let space = ColourSpace::from_object(doc, dict.get(b"ColorSpace").ok())?;
    let invert = get_resolved(doc, dict, b"Decode")
        .and_then(|o| o.as_array().ok())
        .and_then(|values| values.first())
        .and_then(objects::number)
        .is_some_and(|first| first > 0.5);

    let components = space.components();
    let pixel_count = width as usize * height as usize;
    if data.len() < pixel_count * components {
        return None;
    }

    let mut image = RgbaImage::new(width, height);
    for (index, pixel) in image.pixels_mut().enumerate() {
        let mut samples = [0u8; 4];
        samples[..components].copy_from_slice(&data[index * components..(index + 1) * components]);
        if invert {
            for sample in &mut samples[..components] {
                *sample = 255 - *sample;
            }
        }
        *pixel = space.to_rgba(&samples[..components]);
    }
    Some(image)
}

fn apply_mask(image: &mut RgbaImage, mask: &GrayImage) {
    let (w, h) = image.dimensions();
    let (mw, mh) = mask.dimensions();
    if mw == 0 || mh == 0 {
        return;
    }
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        let mx = (x as u64 * mw as u64 / w as u64) as u32;
        let my = (y as u64 * mh as u64 / h as u64) as u32;
        let Luma([alpha]) = *mask.get_pixel(mx, my);
        pixel.0[3] = alpha;
    }
}

/// Image colour spaces the built-in renderer can convert.
enum ColourSpace {
    Gray,
    Rgb,
    Cmyk,
    /// Palette of RGB triples.
    Indexed(Vec<[u8; 3]>),
}

impl ColourSpace {
    fn from_object(doc: &Document, object: Option<&Object>) -> Option<Self> {
        let object = match object {
            Some(object) => resolve(doc, object)?,
            // image masks and stencils aren't supported; assume gray
            None => return Some(Self::Gray),
        };
        match object {
            Object::Name(name) => Self::from_family(name),
            Object::Array(items) => {
                let family = items.first()?.as_name().ok()?;
                match family {
                    b"Indexed" | b"I" => Self::indexed(doc, items),
                    b"ICCBased" => {
                        let profile = resolve(doc, items.get(1)?)?.as_stream().ok()?;
                        let n = get_resolved(doc, &profile.dict, b"N")?.as_i64().ok()?;
                        Self::from_components(n)
                    }
                    other => Self::from_family(other),
                }
            }
            _ => None,
        }
    }

    fn from_family(name: &[u8]) -> Option<Self> {
        match name {
            b"DeviceGray" | b"G" | b"CalGray" => Some(Self::Gray),
            b"DeviceRGB" | b"RGB" | b"CalRGB" => Some(Self::Rgb),
            b"DeviceCMYK" | b"CMYK" => Some(Self::Cmyk),
            _ => None,
        }
    }

    fn from_components(n: i64) -> Option<Self> {
        match n {
            1 => Some(Self::Gray),
            3 => Some(Self::Rgb),
            4 => Some(Self::Cmyk),
            _ => None,
        }
    }

    /// `[/Indexed base hival lookup]` with a Gray, RGB or CMYK base.
    fn indexed(doc: &Document, items: &[Object]) -> Option<Self> {
        let base = Self::from_object(doc, Some(items.get(1)?))?;
        let lookup = match resolve(doc, items.get(3)?)? {
            Object::String(bytes, _) => bytes.clone(),
            Object::Stream(stream) => stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone()),
            _ => return None,
        };
        let width = base.components();
        let palette = lookup
            .chunks_exact(width)
            .map(|entry| {
                let Rgba([r, g, b, _]) = base.to_rgba(entry);
                [r, g, b]
            })
            .collect();
        Some(Self::Indexed(palette))
    }

    fn components(&self) -> usize {
        match self {
            Self::Gray | Self::Indexed(_) => 1,
            Self::Rgb => 3,
            Self::Cmyk => 4,
        }
    }

    fn to_rgba(&self, samples: &[u8]) -> Rgba<u8> {
        let unit = |value: u8| value as f32 / 255.0;
        let [r, g, b] = match self {
            Self::Gray => [samples[0]; 3],
            Self::Rgb => [samples[0], samples[1], samples[2]],
            Self::Cmyk => cmyk(unit(samples[0]), unit(samples[1]), unit(samples[2]), unit(samples[3])),
            Self::Indexed(palette) => palette.get(samples[0] as usize).copied().unwrap_or([0, 0, 0]),
        };
        Rgba([r, g, b, 255])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    fn render(contents: &[&str], width: i64, height: i64, scale: f32) -> RgbaImage {
        let contents: Vec<Vec<u8>> = contents.iter().map(|c| c.as_bytes().to_vec()).collect();
        let source = PageSource::open("t.pdf", fixtures::pdf_from_contents(&contents, width, height)).unwrap();
        BuiltinRenderer.render(&source, 1, scale).unwrap()
    }

    #[test]
    fn output_size_follows_scale() {
        let image = render(&[""], 595, 842, 150.0 / 72.0);
        assert_eq!(image.dimensions(), (1240, 1755));
        // blank pages are white
        assert_eq!(image.get_pixel(10, 10).0, [255, 255, 255, 255]);
    }

    #[test]
    fn filled_rectangles_land_where_expected() {
        // lower-left quarter red
        let image = render(&["1 0 0 rg 0 0 50 50 re f"], 100, 100, 1.0);
        assert_eq!(image.get_pixel(10, 90).0, [255, 0, 0, 255]);
        assert_eq!(image.get_pixel(90, 10).0, [255, 255, 255, 255]);
    }

    #[test]
    fn graphics_state_is_saved_and_restored() {
        let image = render(
            &["q 2 0 0 2 0 0 cm 0 g 0 0 10 10 re f Q 0 0 1 rg 90 90 10 10 re f"],
            100,
            100,
            1.0,
        );
        assert_eq!(image.get_pixel(15, 85).0, [0, 0, 0, 255]);
        assert_eq!(image.get_pixel(95, 5).0, [0, 0, 255, 255]);
        assert_eq!(image.get_pixel(50, 50).0, [255, 255, 255, 255]);
    }

    #[test]
    fn cmyk_fill_converts_to_rgb() {
        assert_eq!(cmyk(0.0, 0.0, 0.0, 1.0), [0, 0, 0]);
        assert_eq!(cmyk(1.0, 0.0, 0.0, 0.0), [0, 255, 255]);
    }

    #[test]
    fn indexed_palette_lookup() {
        let space = ColourSpace::Indexed(vec![[1, 2, 3], [4, 5, 6]]);
        assert_eq!(space.to_rgba(&[1]).0, [4, 5, 6, 255]);
        assert_eq!(space.to_rgba(&[9]).0, [0, 0, 0, 255]);
    }

    #[test]
    fn skipped_text_and_strokes_are_counted() {
        let source = PageSource::open("t.pdf", fixtures::pdf_with_pages("A", 1)).unwrap();
        let (_, unpainted) = BuiltinRenderer.paint(&source, 1, 1.0).unwrap();
        assert_eq!(unpainted, 1);

        let contents = vec![b"0 0 m 10 10 l S 0 0 10 10 re B 0 0 5 5 re f".to_vec()];
        let source = PageSource::open("t.pdf", fixtures::pdf_from_contents(&contents, 20, 20)).unwrap();
        let (image, unpainted) = BuiltinRenderer.paint(&source, 1, 1.0).unwrap();
        assert_eq!(unpainted, 2);
        assert_eq!(image.get_pixel(2, 17).0, [0, 0, 0, 255]);
    }

    #[test]
    fn oversized_page_fails_instead_of_allocating() {
        let source = PageSource::open("t.pdf", fixtures::pdf_with_pages("A", 1)).unwrap();
        let err = BuiltinRenderer.render(&source, 1, u32::MAX as f32 / 72.0).unwrap_err();
        assert!(matches!(err, PagewerkError::Render { page: 1, .. }));
    }
}
