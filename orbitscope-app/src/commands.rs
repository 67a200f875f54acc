//! Headless session operations behind the `orbitscope` binary.

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use orbitscope_core::ZoomStack;
use orbitscope_render::{
    encode_png, ColoringParameters, ComputeStats, ExportMetadata, IteratorController,
};

use crate::error::SessionError;
use crate::parameters::ParametersFile;
use crate::preferences::Preferences;
use crate::snapshot::Snapshot;

/// A controller sized and configured from `prefs`, holding the session
/// described by `file`.
///
/// Advanced statistics are switched on when any map needs them, whatever
/// the preferences say.
pub fn build_controller(file: &ParametersFile, prefs: &Preferences) -> crate::Result<IteratorController> {
    let mut controller = IteratorController::with_workers(
        file.formula()?,
        prefs.screen()?,
        prefs.nr_of_threads,
        prefs.nr_of_blocks,
    )?;
    let mut options = prefs.evaluation_options();
    options.advanced_statistics |= needs_statistics(&file.coloring);
    controller.set_evaluation_options(options)?;
    file.apply_to(&mut controller)?;
    Ok(controller)
}

fn needs_statistics(coloring: &ColoringParameters) -> bool {
    [&coloring.interior, &coloring.exterior, &coloring.tiger]
        .iter()
        .any(|m| m.method.needs_statistics())
}

/// Run one full pass and wait for it.
pub fn compute(controller: &mut IteratorController) -> crate::Result<ComputeStats> {
    controller.set_progress_sink(|done, total| debug!(done, total, "Compute progress"));
    controller.recalc()?;
    let stats = controller
        .wait()
        .ok_or_else(|| SessionError::Format("no compute pass was started".into()))??;
    info!(
        elapsed_ms = stats.elapsed.as_millis(),
        pixels = stats.pixels,
        "Computed {}",
        controller.family_name()
    );
    Ok(stats)
}

/// Compute `file` (optionally at the top of `zoom`) and encode it as PNG.
pub fn render_png(
    file: &ParametersFile,
    zoom: Option<ZoomStack>,
    prefs: &Preferences,
) -> crate::Result<Vec<u8>> {
    let mut controller = build_controller(file, prefs)?;
    if let Some(zoom) = zoom {
        controller.set_zoom_stack(zoom)?;
    }
    compute(&mut controller)?;
    png_bytes(&controller)
}

/// Compute `file` and capture the result as a snapshot.
pub fn compute_snapshot(
    file: &ParametersFile,
    zoom: Option<ZoomStack>,
    prefs: &Preferences,
) -> crate::Result<Snapshot> {
    let mut controller = build_controller(file, prefs)?;
    if let Some(zoom) = zoom {
        controller.set_zoom_stack(zoom)?;
    }
    compute(&mut controller)?;
    Ok(Snapshot::capture(&controller))
}

/// Recolor a snapshot's iteration data with `coloring` and encode it as PNG.
pub fn recolor_png(
    snapshot: &Snapshot,
    coloring: ColoringParameters,
    prefs: &Preferences,
) -> crate::Result<Vec<u8>> {
    let mut controller = IteratorController::with_workers(
        snapshot.fractal.formula()?,
        snapshot.screen()?,
        prefs.nr_of_threads,
        prefs.nr_of_blocks,
    )?;
    snapshot.restore(&mut controller)?;
    controller.set_coloring(coloring);
    controller.recolor()?;
    png_bytes(&controller)
}

/// Read a standalone coloring file.
pub fn load_coloring(path: &Path) -> crate::Result<ColoringParameters> {
    let json = fs::read_to_string(path).map_err(|e| SessionError::io(path, e))?;
    Ok(serde_json::from_str(&json)?)
}

fn png_bytes(controller: &IteratorController) -> crate::Result<Vec<u8>> {
    let image = controller
        .image()
        .ok_or_else(|| SessionError::Format("no image has been rendered".into()))?;
    let coloring = controller.coloring();
    let metadata = ExportMetadata::describe(
        controller.formula().as_ref(),
        controller.bounds(),
        coloring.exterior.map.name(),
        coloring.smooth,
    );
    let mut bytes = Vec::new();
    encode_png(&mut bytes, image, &metadata)?;
    Ok(bytes)
}
