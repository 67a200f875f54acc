//! Plain-text zoom history: one `p1.re p1.im p2.re p2.im` entry per line,
//! root first. Blank lines and `#` comments are ignored.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use tracing::debug;

use orbitscope_core::{Bounds, Complex, CoreError, ZoomStack};

use crate::error::SessionError;

const FIELDS: usize = 4;

pub fn parse_zoom_stack(text: &str) -> crate::Result<ZoomStack> {
    let mut entries = Vec::new();
    for (i, raw) in text.lines().enumerate() {
        let line = i + 1;
        let content = raw.split('#').next().unwrap_or("").trim();
        if content.is_empty() {
            continue;
        }
        let mut values = [0.0; FIELDS];
        let mut tokens = content.split_whitespace();
        for (field, value) in values.iter_mut().enumerate() {
            let token = tokens.next().unwrap_or("");
            *value = token
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| SessionError::ZoomEntry {
                    line,
                    field: field + 1,
                    value: token.to_string(),
                })?;
        }
        if let Some(extra) = tokens.next() {
            return Err(SessionError::ZoomEntry {
                line,
                field: FIELDS + 1,
                value: extra.to_string(),
            });
        }
        let [a, b, c, d] = values;
        let bounds = Bounds::new(Complex::new(a, b), Complex::new(c, d))
            .map_err(|source| SessionError::ZoomBounds { line, source })?;
        entries.push(bounds);
    }
    ZoomStack::from_entries(entries).map_err(|e| match e {
        CoreError::EmptyZoomStack => SessionError::Format("zoom stack has no entries".into()),
        other => other.into(),
    })
}

pub fn format_zoom_stack(stack: &ZoomStack) -> String {
    let mut out = String::from("# p1.re p1.im p2.re p2.im\n");
    for b in stack.iter() {
        let (p1, p2) = (b.p1(), b.p2());
        let _ = writeln!(out, "{} {} {} {}", p1.re, p1.im, p2.re, p2.im);
    }
    out
}

pub fn load_zoom_stack(path: &Path) -> crate::Result<ZoomStack> {
    let text = fs::read_to_string(path).map_err(|e| SessionError::io(path, e))?;
    let stack = parse_zoom_stack(&text)?;
    debug!("Loaded {} zoom entries from {}", stack.len(), path.display());
    Ok(stack)
}

pub fn save_zoom_stack(stack: &ZoomStack, path: &Path) -> crate::Result<()> {
    fs::write(path, format_zoom_stack(stack)).map_err(|e| SessionError::io(path, e))
}
