//! Text overlays drawn on top of existing page content
//!
//! The original content streams are wrapped in `q`/`Q` so their graphics
//! state cannot leak into the overlay, and the overlay is appended as one more
//! content stream. Fonts and graphics states are registered in each page's
//! own resource dictionary under names that will not collide with the page's.

use crate::constants::{
    HELVETICA_BOLD_CHAR_WIDTH_RATIO, HELVETICA_CHAR_WIDTH_RATIO, OVERLAY_FONT_NAME,
    OVERLAY_GSTATE_NAME, WATERMARK_FONT_SIZE_RATIO,
};
use crate::document::{PageBox, PdfHandle};
use crate::options::*;
use crate::types::*;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};

// =============================================================================
// Public API
// =============================================================================

/// Draw `options.text` centered on every page
pub fn watermark(source: &SourceFile, options: &WatermarkOptions) -> Result<OutputFile> {
    options.validate()?;
    let color = Rgb::from_hex(&options.color)?;
    let text = encode_win_ansi(&options.text)?;
    let mut handle = PdfHandle::load(source)?;

    let font_id = add_standard_font(handle.document_mut(), "Helvetica-Bold");
    let gstate_id = handle.document_mut().add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"ExtGState".to_vec())),
        ("ca", Object::Real(options.opacity)),
        ("CA", Object::Real(options.opacity)),
    ]));

    for index in 0..handle.page_count() {
        let page_box = handle.media_box(index)?;
        let font_size = options
            .font_size
            .unwrap_or_else(|| page_box.width().min(page_box.height()) * WATERMARK_FONT_SIZE_RATIO);
        let ops = watermark_operations(&text, options.position, font_size, color, &page_box);

        let page_id = handle.materialize(index)?;
        let doc = handle.document_mut();
        add_page_resource(doc, page_id, b"Font", OVERLAY_FONT_NAME, font_id)?;
        add_page_resource(doc, page_id, b"ExtGState", OVERLAY_GSTATE_NAME, gstate_id)?;
        append_overlay(doc, page_id, ops)?;
    }

    let name = format!("{}_watermarked.pdf", source.base_name());
    handle.into_output(name)
}

/// Number every page sequentially from `options.start_number`
pub fn add_page_numbers(source: &SourceFile, options: &PageNumberOptions) -> Result<OutputFile> {
    options.validate()?;
    let mut handle = PdfHandle::load(source)?;
    let font_id = add_standard_font(handle.document_mut(), "Helvetica");

    for index in 0..handle.page_count() {
        let page_box = handle.media_box(index)?;
        let label = (options.start_number + index).to_string();
        let (x, y) = number_origin(label.as_bytes(), options, &page_box);
        let ops = text_operations(label.as_bytes(), options.font_size, Rgb::BLACK, [1.0, 0.0, 0.0, 1.0, x, y], false);

        let page_id = handle.materialize(index)?;
        let doc = handle.document_mut();
        add_page_resource(doc, page_id, b"Font", OVERLAY_FONT_NAME, font_id)?;
        append_overlay(doc, page_id, ops)?;
    }

    let name = format!("{}_numbered.pdf", source.base_name());
    handle.into_output(name)
}

// =============================================================================
// Layout
// =============================================================================

/// Encode overlay text for a standard font declared with `WinAnsiEncoding`.
///
/// Characters outside Windows-1252 have no glyph in the standard fonts, so
/// they are rejected instead of being drawn as garbage.
pub(crate) fn encode_win_ansi(text: &str) -> Result<Vec<u8>> {
    let (bytes, _, unmappable) = encoding_rs::WINDOWS_1252.encode(text);
    if unmappable {
        return Err(PagesError::validation(format!(
            "\"{}\" contains characters the standard PDF fonts cannot draw",
            text
        )));
    }
    Ok(bytes.into_owned())
}

/// One byte per glyph in a single-byte encoding
fn text_width(text: &[u8], font_size: f32, ratio: f32) -> f32 {
    text.len() as f32 * font_size * ratio
}

fn watermark_operations(
    text: &[u8],
    position: WatermarkPosition,
    font_size: f32,
    color: Rgb,
    page_box: &PageBox,
) -> Vec<Operation> {
    let width = text_width(text, font_size, HELVETICA_BOLD_CHAR_WIDTH_RATIO);
    let x = page_box.left + page_box.width() / 2.0 - width / 2.0;
    let center_y = page_box.bottom + page_box.height() / 2.0;

    let matrix = match position {
        WatermarkPosition::Diagonal => {
            let (sin, cos) = (-45f32).to_radians().sin_cos();
            [cos, sin, -sin, cos, x, center_y]
        }
        WatermarkPosition::Center => [1.0, 0.0, 0.0, 1.0, x, center_y - font_size / 2.0],
    };
    text_operations(text, font_size, color, matrix, true)
}

/// Bottom-left corner of the page number label
fn number_origin(label: &[u8], options: &PageNumberOptions, page_box: &PageBox) -> (f32, f32) {
    let width = text_width(label, options.font_size, HELVETICA_CHAR_WIDTH_RATIO);
    let y = if options.position.is_top() {
        page_box.top - options.margin
    } else {
        page_box.bottom + options.margin
    };
    let x = match options.position {
        NumberPosition::BottomLeft | NumberPosition::TopLeft => page_box.left + options.margin,
        NumberPosition::BottomRight | NumberPosition::TopRight => {
            page_box.right - width - options.margin
        }
        NumberPosition::BottomCenter | NumberPosition::TopCenter => {
            page_box.left + (page_box.width() - width) / 2.0
        }
    };
    (x, y)
}

fn text_operations(
    text: &[u8],
    font_size: f32,
    color: Rgb,
    matrix: [f32; 6],
    translucent: bool,
) -> Vec<Operation> {
    let mut ops = vec![Operation::new("q", vec![])];
    if translucent {
        ops.push(Operation::new(
            "gs",
            vec![Object::Name(OVERLAY_GSTATE_NAME.as_bytes().to_vec())],
        ));
    }
    ops.extend([
        Operation::new(
            "rg",
            vec![Object::Real(color.r), Object::Real(color.g), Object::Real(color.b)],
        ),
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![
                Object::Name(OVERLAY_FONT_NAME.as_bytes().to_vec()),
                Object::Real(font_size),
            ],
        ),
        Operation::new("Tm", matrix.iter().map(|&v| Object::Real(v)).collect()),
        Operation::new(
            "Tj",
            vec![Object::String(text.to_vec(), StringFormat::Literal)],
        ),
        Operation::new("ET", vec![]),
        Operation::new("Q", vec![]),
    ]);
    ops
}

// =============================================================================
// Page Plumbing
// =============================================================================

fn add_standard_font(doc: &mut Document, base_font: &str) -> ObjectId {
    doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type1".to_vec())),
        ("BaseFont", Object::Name(base_font.as_bytes().to_vec())),
        ("Encoding", Object::Name(b"WinAnsiEncoding".to_vec())),
    ]))
}

/// Resolve a direct-or-referenced dictionary into an owned copy
fn owned_dict(doc: &Document, object: Option<&Object>) -> Result<Dictionary> {
    Ok(match object {
        Some(Object::Dictionary(dict)) => dict.clone(),
        Some(Object::Reference(id)) => doc.get_dictionary(*id)?.clone(),
        _ => Dictionary::new(),
    })
}

/// Register `name -> target` under `category` in the page's resources.
///
/// The page gets its own copy of the resource dictionary, so pages that
/// shared one keep working.
fn add_page_resource(
    doc: &mut Document,
    page_id: ObjectId,
    category: &[u8],
    name: &str,
    target: ObjectId,
) -> Result<()> {
    let page = doc.get_dictionary(page_id)?;
    let mut resources = owned_dict(doc, page.get(b"Resources").ok())?;
    let mut entries = owned_dict(doc, resources.get(category).ok())?;
    entries.set(name.as_bytes().to_vec(), Object::Reference(target));
    resources.set(category.to_vec(), Object::Dictionary(entries));

    doc.get_dictionary_mut(page_id)?
        .set("Resources", Object::Dictionary(resources));
    Ok(())
}

/// Isolate the existing content in q/Q and append the overlay after it
fn append_overlay(doc: &mut Document, page_id: ObjectId, ops: Vec<Operation>) -> Result<()> {
    let existing: Vec<Object> = match doc.get_dictionary(page_id)?.get(b"Contents") {
        Ok(Object::Array(items)) => items.clone(),
        Ok(Object::Reference(id)) => match doc.get_object(*id)? {
            Object::Array(items) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        _ => Vec::new(),
    };

    let overlay = Content { operations: ops }.encode()?;
    let open_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let close_id = doc.add_object(Stream::new(Dictionary::new(), b"\nQ\n".to_vec()));
    let overlay_id = doc.add_object(Stream::new(Dictionary::new(), overlay));

    let mut contents = Vec::with_capacity(existing.len() + 3);
    contents.push(Object::Reference(open_id));
    contents.extend(existing);
    contents.push(Object::Reference(close_id));
    contents.push(Object::Reference(overlay_id));

    doc.get_dictionary_mut(page_id)?
        .set("Contents", Object::Array(contents));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{create_test_pdf, page_labels};

    fn reload(output: &OutputFile) -> PdfHandle {
        PdfHandle::load(&SourceFile::new(output.name.clone(), output.bytes.clone())).unwrap()
    }

    fn page_text(handle: &PdfHandle, index: usize) -> String {
        let page_id = handle.page_id(index).unwrap();
        let content = handle.document().get_page_content(page_id).unwrap();
        String::from_utf8_lossy(&content).into_owned()
    }

    #[test]
    fn test_watermark_keeps_original_content() {
        let source = create_test_pdf("doc.pdf", 2);
        let output = watermark(&source, &WatermarkOptions::new("DRAFT")).unwrap();
        assert_eq!(output.name, "doc_watermarked.pdf");

        let handle = reload(&output);
        assert_eq!(page_labels(handle.document()), vec!["doc-1", "doc-2"]);
        let text = page_text(&handle, 1);
        assert!(text.contains("(DRAFT) Tj"));
        assert!(text.contains("/GSPgOverlay gs"));
    }

    #[test]
    fn test_watermark_registers_resources_per_page() {
        let source = create_test_pdf("doc.pdf", 1);
        let output = watermark(&source, &WatermarkOptions::new("DRAFT")).unwrap();
        let handle = reload(&output);
        let page = handle.document().get_dictionary(handle.page_id(0).unwrap()).unwrap();
        let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
        let fonts = resources.get(b"Font").unwrap().as_dict().unwrap();
        assert!(fonts.has(b"F1"));
        assert!(fonts.has(OVERLAY_FONT_NAME.as_bytes()));
        assert!(resources.get(b"ExtGState").unwrap().as_dict().unwrap().has(OVERLAY_GSTATE_NAME.as_bytes()));
    }

    #[test]
    fn test_watermark_rejects_empty_text() {
        let source = create_test_pdf("doc.pdf", 1);
        assert!(matches!(
            watermark(&source, &WatermarkOptions::default()),
            Err(PagesError::Validation(_))
        ));
    }

    #[test]
    fn test_watermark_text_is_win_ansi_encoded() {
        let source = create_test_pdf("doc.pdf", 1);
        let output = watermark(&source, &WatermarkOptions::new("Café")).unwrap();
        let handle = reload(&output);
        let page_id = handle.page_id(0).unwrap();
        let content = handle.document().get_page_content(page_id).unwrap();
        assert!(content.windows(6).any(|w| w == b"(Caf\xE9)"));
        assert!(!content.windows(2).any(|w| w == [0xC3, 0xA9]));
    }

    #[test]
    fn test_watermark_rejects_text_outside_win_ansi() {
        let source = create_test_pdf("doc.pdf", 1);
        match watermark(&source, &WatermarkOptions::new("水印")) {
            Err(PagesError::Validation(message)) => assert!(message.contains("水印")),
            other => panic!("Expected validation error, got {:?}", other),
        }
        assert_eq!(encode_win_ansi("€ ß").unwrap(), vec![0x80, b' ', 0xDF]);
    }

    #[test]
    fn test_diagonal_matrix_is_rotated() {
        let ops = watermark_operations(b"X", WatermarkPosition::Diagonal, 10.0, Rgb::BLACK, &PageBox::default());
        let tm = ops.iter().find(|op| op.operator == "Tm").unwrap();
        let b = tm.operands[1].as_float().unwrap();
        assert!((b + std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-4);
    }

    #[test]
    fn test_page_numbers_are_sequential() {
        let source = create_test_pdf("doc.pdf", 3);
        let options = PageNumberOptions {
            start_number: 7,
            ..Default::default()
        };
        let output = add_page_numbers(&source, &options).unwrap();
        assert_eq!(output.name, "doc_numbered.pdf");
        let handle = reload(&output);
        for (index, expected) in ["(7) Tj", "(8) Tj", "(9) Tj"].iter().enumerate() {
            assert!(page_text(&handle, index).contains(expected));
        }
    }

    #[test]
    fn test_number_origin_positions() {
        let page = PageBox::default();
        let options = PageNumberOptions::default();
        let (x, y) = number_origin(b"10", &options, &page);
        assert_eq!(y, 30.0);
        assert_eq!(x, (612.0 - 12.0) / 2.0);

        let top_right = PageNumberOptions {
            position: NumberPosition::TopRight,
            ..options
        };
        let (x, y) = number_origin(b"10", &top_right, &page);
        assert_eq!(y, 762.0);
        assert_eq!(x, 612.0 - 12.0 - 30.0);
    }
}
