//! Full snapshots: parameters plus the complete iteration buffer, so an
//! image can be restored and recolored without recomputing orbits.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use orbitscope_core::{EvaluationOptions, IterationResult, ScreenSize, ZoomStack};
use orbitscope_render::{IterationBuffer, IteratorController, RenderError};

use crate::error::SessionError;
use crate::parameters::ParametersFile;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub fractal: ParametersFile,
    /// Options the cells were computed with; row mapping depends on them.
    #[serde(default)]
    pub options: EvaluationOptions,
    /// Zoom history, topped by `fractal.bounds`.
    #[serde(default)]
    pub zoom: Option<ZoomStack>,
    pub width: u32,
    pub height: u32,
    /// Row-major, `null` for cells no pass has written.
    pub cells: Vec<Option<IterationResult>>,
}

impl Snapshot {
    /// Capture the controller's session and buffer.
    pub fn capture(controller: &IteratorController) -> Self {
        let buffer = controller.buffer();
        Self {
            fractal: ParametersFile::capture(controller),
            options: controller.evaluation_options(),
            zoom: Some(controller.zoom_stack().clone()),
            width: buffer.width(),
            height: buffer.height(),
            cells: buffer.cells().to_vec(),
        }
    }

    pub fn screen(&self) -> crate::Result<ScreenSize> {
        Ok(ScreenSize::new(self.width, self.height)?)
    }

    pub fn from_json(json: &str) -> crate::Result<Self> {
        let snapshot: Self = serde_json::from_str(json)?;
        snapshot.fractal.check_family()?;
        let expected = snapshot.width as usize * snapshot.height as usize;
        if snapshot.width == 0 || snapshot.height == 0 || snapshot.cells.len() != expected {
            return Err(SessionError::Format(format!(
                "snapshot declares {}x{} but holds {} cells",
                snapshot.width,
                snapshot.height,
                snapshot.cells.len()
            )));
        }
        if let Some(zoom) = &snapshot.zoom {
            if zoom.current() != snapshot.fractal.bounds {
                return Err(SessionError::Format(
                    "snapshot zoom history does not end at its bounds".into(),
                ));
            }
        }
        Ok(snapshot)
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn load(path: &Path) -> crate::Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| SessionError::io(path, e))?;
        let snapshot = Self::from_json(&json)?;
        info!(
            "Loaded {}x{} {} snapshot from {}",
            snapshot.width,
            snapshot.height,
            snapshot.fractal.family,
            path.display()
        );
        Ok(snapshot)
    }

    pub fn save(&self, path: &Path) -> crate::Result<()> {
        fs::write(path, self.to_json()?).map_err(|e| SessionError::io(path, e))?;
        debug!("Saved snapshot to {}", path.display());
        Ok(())
    }

    /// The stored iteration data as a buffer.
    pub fn to_buffer(&self) -> crate::Result<IterationBuffer> {
        Ok(IterationBuffer::from_cells(
            self.width,
            self.height,
            self.cells.clone(),
        )?)
    }

    /// Restore session and buffer into `controller`; the image is
    /// recolored from the stored cells without recomputing.
    pub fn restore(&self, controller: &mut IteratorController) -> crate::Result<()> {
        if controller.is_busy() {
            return Err(RenderError::Busy.into());
        }
        let buffer = self.to_buffer()?;
        let screen = self.screen()?;
        self.fractal.apply_to(controller)?;
        if let Some(zoom) = &self.zoom {
            controller.set_zoom_stack(zoom.clone())?;
        }
        controller.set_evaluation_options(self.options)?;
        controller.set_screen_size(screen)?;
        controller.install_buffer(buffer)?;
        Ok(())
    }
}
