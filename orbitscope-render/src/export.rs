//! PNG export with embedded metadata (tEXt chunks).

use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::debug;

use orbitscope_core::{Bounds, Complex, FractalFormula};

use crate::buffer::RenderBuffer;
use crate::error::RenderError;

/// Metadata to embed in an exported PNG as tEXt chunks.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportMetadata {
    pub family: String,
    pub bounds: Bounds,
    pub max_iterations: u32,
    pub escape_radius: f64,
    pub dual_parameter: Option<Complex>,
    pub color_map: String,
    pub smooth_coloring: bool,
}

impl ExportMetadata {
    /// Metadata describing `formula` rendered over `bounds`.
    pub fn describe(
        formula: &dyn FractalFormula,
        bounds: Bounds,
        color_map: &str,
        smooth_coloring: bool,
    ) -> Self {
        let params = formula.params();
        Self {
            family: formula.family_name().to_string(),
            bounds,
            max_iterations: params.max_iterations,
            escape_radius: params.escape_radius,
            dual_parameter: formula
                .uses_dual_parameter()
                .then_some(params.dual_parameter),
            color_map: color_map.to_string(),
            smooth_coloring,
        }
    }
}

/// Write `image` as a PNG file with embedded fractal metadata.
pub fn export_png(image: &RenderBuffer, path: &Path, metadata: &ExportMetadata) -> crate::Result<()> {
    let file = std::fs::File::create(path).map_err(|source| RenderError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    encode_png(BufWriter::new(file), image, metadata)?;
    debug!(
        "Exported PNG {}x{} to {}",
        image.width,
        image.height,
        path.display()
    );
    Ok(())
}

/// Encode `image` with metadata into any writer.
///
/// Uses the `png` crate directly to inject custom tEXt chunks readable by
/// exiftool and common image viewers.
pub fn encode_png<W: Write>(writer: W, image: &RenderBuffer, metadata: &ExportMetadata) -> crate::Result<()> {
    if image.width == 0 || image.height == 0 {
        return Err(RenderError::InvalidDimensions {
            width: image.width,
            height: image.height,
        });
    }

    let mut encoder = png::Encoder::new(writer, image.width, image.height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_compression(png::Compression::Default);

    encoder.add_text_chunk("Software".to_string(), "Orbitscope".to_string())?;
    encoder.add_text_chunk("Description".to_string(), build_description(metadata))?;
    for (key, value) in build_metadata_pairs(metadata, image) {
        encoder.add_text_chunk(key, value)?;
    }

    let mut png_writer = encoder.write_header()?;
    png_writer.write_image_data(&image.pixels)?;
    png_writer.finish()?;
    Ok(())
}

fn build_description(meta: &ExportMetadata) -> String {
    let mut desc = format!(
        "{} - Bounds: {} .. {}, Iterations: {}",
        meta.family,
        meta.bounds.p1(),
        meta.bounds.p2(),
        meta.max_iterations,
    );
    if let Some(c) = meta.dual_parameter {
        desc.push_str(&format!(", C: {c}"));
    }
    desc
}

fn build_metadata_pairs(meta: &ExportMetadata, image: &RenderBuffer) -> Vec<(String, String)> {
    let p1 = meta.bounds.p1();
    let p2 = meta.bounds.p2();
    let mut pairs = vec![
        ("Orbitscope.Family".into(), meta.family.clone()),
        ("Orbitscope.P1".into(), format!("{} {}", p1.re, p1.im)),
        ("Orbitscope.P2".into(), format!("{} {}", p2.re, p2.im)),
        ("Orbitscope.MaxIterations".into(), meta.max_iterations.to_string()),
        ("Orbitscope.EscapeRadius".into(), meta.escape_radius.to_string()),
        ("Orbitscope.ColorMap".into(), meta.color_map.clone()),
        ("Orbitscope.SmoothColoring".into(), meta.smooth_coloring.to_string()),
        (
            "Orbitscope.Resolution".into(),
            format!("{}x{}", image.width, image.height),
        ),
    ];
    if let Some(c) = meta.dual_parameter {
        pairs.push(("Orbitscope.DualParameter".into(), format!("{} {}", c.re, c.im)));
    }
    pairs
}
