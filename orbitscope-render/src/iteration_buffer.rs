use orbitscope_core::{IterationResult, ScreenSize};

use crate::block::Block;
use crate::error::RenderError;

/// One pixel of the buffer; `None` until a pass writes it.
pub type Cell = Option<IterationResult>;

/// Stores per-pixel `IterationResult` data for a full frame.
///
/// This is the raw output of the scheduler before coloring. Keeping iteration
/// data separate from colored pixels enables recoloring without recomputing
/// orbits. Cells are `None` until a pass writes them.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationBuffer {
    width: u32,
    height: u32,
    cells: Vec<Cell>,
}

impl IterationBuffer {
    pub fn new(screen: ScreenSize) -> Self {
        Self {
            width: screen.width,
            height: screen.height,
            cells: vec![None; screen.pixel_count()],
        }
    }

    /// Rebuild a buffer from row-major cells, e.g. from a saved snapshot.
    pub fn from_cells(width: u32, height: u32, cells: Vec<Cell>) -> crate::Result<Self> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidDimensions { width, height });
        }
        if cells.len() != width as usize * height as usize {
            return Err(RenderError::DimensionMismatch {
                width,
                height,
                found_width: width,
                found_height: (cells.len() / width as usize) as u32,
            });
        }
        Ok(Self {
            width,
            height,
            cells,
        })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn screen(&self) -> ScreenSize {
        ScreenSize {
            width: self.width,
            height: self.height,
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Option<&IterationResult> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.cells[y as usize * self.width as usize + x as usize].as_ref()
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub(crate) fn cells_mut(&mut self) -> &mut [Cell] {
        &mut self.cells
    }

    /// Number of cells a pass has written.
    pub fn written(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    pub fn is_complete(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }

    /// Split the buffer into one disjoint mutable slice per block.
    ///
    /// `blocks` must tile the rows in scan order, as produced by
    /// [`partition_rows`](crate::block::partition_rows).
    pub(crate) fn split_blocks_mut<'a>(
        &'a mut self,
        blocks: &[Block],
    ) -> Vec<(Block, &'a mut [Cell])> {
        let width = self.width;
        let mut rest: &'a mut [Cell] = &mut self.cells;
        let mut bands = Vec::with_capacity(blocks.len());
        for block in blocks {
            let len = block.pixel_count(width).min(rest.len());
            let (band, tail) = std::mem::take(&mut rest).split_at_mut(len);
            bands.push((*block, band));
            rest = tail;
        }
        bands
    }
}
