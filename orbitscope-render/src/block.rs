/// A contiguous band of whole rows, the unit of work handed to one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    /// Position in scan order.
    pub index: usize,
    pub first_row: u32,
    pub rows: u32,
}

impl Block {
    /// Number of pixels in this block for an image `width` pixels wide.
    pub fn pixel_count(&self, width: u32) -> usize {
        self.rows as usize * width as usize
    }

    pub fn end_row(&self) -> u32 {
        self.first_row + self.rows
    }
}

/// How many blocks a pass over `height` rows is split into.
///
/// At least one block per thread so no worker idles, never more blocks than
/// rows, and never zero.
pub fn block_count(nr_of_threads: usize, nr_of_blocks: usize, height: u32) -> usize {
    nr_of_blocks
        .max(nr_of_threads)
        .min(height as usize)
        .max(1)
}

/// Split `height` rows into `count` bands in scan order.
///
/// Band sizes differ by at most one row; the leading bands take the extra
/// rows.
pub fn partition_rows(height: u32, count: usize) -> Vec<Block> {
    let count = count.clamp(1, height.max(1) as usize) as u32;
    let base = height / count;
    let extra = height % count;
    let mut blocks = Vec::with_capacity(count as usize);
    let mut row = 0;
    for index in 0..count {
        let rows = base + u32::from(index < extra);
        blocks.push(Block {
            index: index as usize,
            first_row: row,
            rows,
        });
        row += rows;
    }
    blocks
}
