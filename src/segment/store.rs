//! Shared screen segment store
//!
//! The segment is a POSIX shared memory object laid out per
//! [`crate::segment::layout`]: a small header (geometry + cursor) and a
//! dense row-major cell array. The capture session is the only writer;
//! reader processes attach the same object and poll it or wait for
//! update notifications on the message channel. No locks are taken on
//! the region; single-writer/multi-reader discipline is the whole
//! concurrency contract, and a reader racing a multi-cell mutation may
//! observe a torn frame until the next notification.

use std::ffi::c_void;
use std::fs::File;
use std::num::NonZeroUsize;
use std::ptr::NonNull;

use log::{debug, warn};
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::mman::{mmap, munmap, shm_open, shm_unlink, MapFlags, ProtFlags};
use nix::sys::stat::Mode;

use crate::error::{MirrorError, Result};
use crate::key::SessionKey;
use crate::segment::cell::{ScreenCell, CELL_SIZE};
use crate::segment::layout::{
    self, HEADER_SIZE, OFFSET_COLUMNS, OFFSET_CURSOR_COLUMN, OFFSET_CURSOR_ROW, OFFSET_ROWS,
};

/// An mmap'd view of the shared object, unmapped on drop.
struct SharedMapping {
    base: NonNull<c_void>,
    len: usize,
}

// The mapping is plain memory owned by exactly one ScreenSegment value;
// moving that owner to another thread is sound. Never Sync: one writer.
unsafe impl Send for SharedMapping {}

impl SharedMapping {
    fn bytes(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.base.as_ptr().cast::<u8>(), self.len) }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.base.as_ptr().cast::<u8>(), self.len) }
    }
}

impl Drop for SharedMapping {
    fn drop(&mut self) {
        if let Err(e) = unsafe { munmap(self.base, self.len) } {
            warn!("Failed to unmap screen segment: {}", e);
        }
    }
}

enum Backing {
    Shared(SharedMapping),
    Private(Vec<u8>),
}

/// Handle to one screen segment.
///
/// Obtained from [`ScreenSegment::create`] (writer side),
/// [`ScreenSegment::attach`] (reader side), or
/// [`ScreenSegment::private`] (heap-backed, same layout, not shared).
/// Dropping the handle detaches; it does not remove the underlying
/// object, which takes [`ScreenSegment::destroy`].
pub struct ScreenSegment {
    backing: Backing,
    columns: u32,
    rows: u32,
}

impl ScreenSegment {
    /// Creates the shared object for `key`, exclusively.
    ///
    /// Fails with [`MirrorError::Resource`] if a segment for this key
    /// already exists or allocation fails. On success the header holds
    /// the geometry with the cursor at the origin and every cell is
    /// blank.
    pub fn create(key: &SessionKey, columns: u32, rows: u32) -> Result<Self> {
        let total = layout::segment_size(columns, rows)?;
        let name = key.segment_name();
        let fd = shm_open(
            name,
            OFlag::O_CREAT | OFlag::O_EXCL | OFlag::O_RDWR,
            Mode::S_IRUSR | Mode::S_IWUSR,
        )
        .map_err(|e| match e {
            Errno::EEXIST => MirrorError::Resource(format!(
                "screen segment {} already exists (stale session?)",
                name
            )),
            other => MirrorError::Resource(format!(
                "cannot create screen segment {}: {}",
                name, other
            )),
        })?;

        let file = File::from(fd);
        let mapping = Self::size_and_map(&file, total).map_err(|e| {
            let _ = shm_unlink(name);
            e
        })?;
        drop(file);

        let mut segment = ScreenSegment {
            backing: Backing::Shared(mapping),
            columns,
            rows,
        };
        segment.init_contents();
        debug!(
            "Created screen segment {} ({}x{}, {} bytes)",
            name, columns, rows, total
        );
        Ok(segment)
    }

    /// Maps an existing segment into this process.
    ///
    /// Fails with [`MirrorError::NotFound`] if no segment exists for the
    /// key, and [`MirrorError::Resource`] if the object's size does not
    /// match the geometry its own header declares.
    pub fn attach(key: &SessionKey) -> Result<Self> {
        let name = key.segment_name();
        let fd = shm_open(name, OFlag::O_RDWR, Mode::empty()).map_err(|e| match e {
            Errno::ENOENT => {
                MirrorError::NotFound(format!("no screen segment at {}", name))
            }
            other => {
                MirrorError::Resource(format!("cannot open screen segment {}: {}", name, other))
            }
        })?;

        let file = File::from(fd);
        let total = file
            .metadata()
            .map_err(|e| MirrorError::Resource(format!("cannot size segment {}: {}", name, e)))?
            .len() as usize;
        if total < HEADER_SIZE {
            return Err(MirrorError::Resource(format!(
                "segment {} is {} bytes, smaller than its header",
                name, total
            )));
        }
        let mapping = Self::map_fd(&file, total)?;
        drop(file);

        let columns = layout::get_u32(mapping.bytes(), OFFSET_COLUMNS);
        let rows = layout::get_u32(mapping.bytes(), OFFSET_ROWS);
        let expected = layout::segment_size(columns, rows)?;
        if expected != total {
            return Err(MirrorError::Resource(format!(
                "segment {} declares {}x{} ({} bytes) but is {} bytes",
                name, columns, rows, expected, total
            )));
        }

        debug!("Attached screen segment {} ({}x{})", name, columns, rows);
        Ok(ScreenSegment {
            backing: Backing::Shared(mapping),
            columns,
            rows,
        })
    }

    /// A heap-backed segment with the identical byte layout, never
    /// visible to other processes. Backs engine tests and dry runs.
    pub fn private(columns: u32, rows: u32) -> Result<Self> {
        let total = layout::segment_size(columns, rows)?;
        let mut segment = ScreenSegment {
            backing: Backing::Private(vec![0u8; total]),
            columns,
            rows,
        };
        segment.init_contents();
        Ok(segment)
    }

    /// Removes the shared object for `key`.
    ///
    /// Teardown runs redundantly, so a missing object is logged and
    /// swallowed rather than propagated.
    pub fn destroy(key: &SessionKey) {
        let name = key.segment_name();
        match shm_unlink(name) {
            Ok(()) => debug!("Destroyed screen segment {}", name),
            Err(Errno::ENOENT) => debug!("Screen segment {} already gone", name),
            Err(e) => warn!("Failed to destroy screen segment {}: {}", name, e),
        }
    }

    /// Unmaps this handle. The underlying object is untouched.
    pub fn detach(self) {
        drop(self);
    }

    fn size_and_map(file: &File, total: usize) -> Result<SharedMapping> {
        file.set_len(total as u64)
            .map_err(|e| MirrorError::Resource(format!("cannot size screen segment: {}", e)))?;
        Self::map_fd(file, total)
    }

    fn map_fd(file: &File, total: usize) -> Result<SharedMapping> {
        let len = NonZeroUsize::new(total)
            .ok_or_else(|| MirrorError::Resource("cannot map an empty segment".into()))?;
        let base = unsafe {
            mmap(
                None,
                len,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                file,
                0,
            )
        }
        .map_err(|e| MirrorError::Resource(format!("cannot map screen segment: {}", e)))?;
        Ok(SharedMapping { base, len: total })
    }

    fn init_contents(&mut self) {
        let columns = self.columns;
        let rows = self.rows;
        let bytes = self.bytes_mut();
        layout::put_u32(bytes, OFFSET_COLUMNS, columns);
        layout::put_u32(bytes, OFFSET_ROWS, rows);
        layout::put_u32(bytes, OFFSET_CURSOR_ROW, 0);
        layout::put_u32(bytes, OFFSET_CURSOR_COLUMN, 0);
        let end = self.end_index();
        self.fill_range(0, end, &ScreenCell::blank());
    }

    fn bytes(&self) -> &[u8] {
        match &self.backing {
            Backing::Shared(mapping) => mapping.bytes(),
            Backing::Private(vec) => vec,
        }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        match &mut self.backing {
            Backing::Shared(mapping) => mapping.bytes_mut(),
            Backing::Private(vec) => vec,
        }
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Mirrored cursor position as (row, column).
    pub fn cursor(&self) -> (u32, u32) {
        let bytes = self.bytes();
        (
            layout::get_u32(bytes, OFFSET_CURSOR_ROW),
            layout::get_u32(bytes, OFFSET_CURSOR_COLUMN),
        )
    }

    pub fn set_cursor(&mut self, row: u32, column: u32) {
        let bytes = self.bytes_mut();
        layout::put_u32(bytes, OFFSET_CURSOR_ROW, row);
        layout::put_u32(bytes, OFFSET_CURSOR_COLUMN, column);
    }

    /// Index of the cell at (row, column) in the flat cell array.
    ///
    /// Bounds are the caller's responsibility; the emulation engine's
    /// own cursor tracking guarantees coordinates stay in range.
    pub fn cell_index(&self, row: u32, column: u32) -> usize {
        row as usize * self.columns as usize + column as usize
    }

    /// Index of the first cell of `row`.
    pub fn row_index(&self, row: u32) -> usize {
        self.cell_index(row, 0)
    }

    /// Index one past the last cell of `row`.
    pub fn row_end(&self, row: u32) -> usize {
        self.row_index(row) + self.columns as usize
    }

    /// Index one past the last cell of the grid.
    pub fn end_index(&self) -> usize {
        self.rows as usize * self.columns as usize
    }

    pub fn read_cell(&self, index: usize) -> ScreenCell {
        let offset = HEADER_SIZE + index * CELL_SIZE;
        ScreenCell::decode(&self.bytes()[offset..offset + CELL_SIZE])
    }

    pub fn write_cell(&mut self, index: usize, cell: &ScreenCell) {
        let offset = HEADER_SIZE + index * CELL_SIZE;
        cell.encode(&mut self.bytes_mut()[offset..offset + CELL_SIZE]);
    }

    /// Overwrites every cell in `[from, to)` with a copy of `template`.
    pub fn fill_range(&mut self, from: usize, to: usize, template: &ScreenCell) {
        if to <= from {
            return;
        }
        let mut encoded = [0u8; CELL_SIZE];
        template.encode(&mut encoded);
        let start = HEADER_SIZE + from * CELL_SIZE;
        let end = HEADER_SIZE + to * CELL_SIZE;
        for chunk in self.bytes_mut()[start..end].chunks_exact_mut(CELL_SIZE) {
            chunk.copy_from_slice(&encoded);
        }
    }

    /// Copies `count` cells from `from` to `to`. Overlapping ranges are
    /// handled like memmove, in either direction.
    pub fn move_range(&mut self, to: usize, from: usize, count: usize) {
        if count == 0 || to == from {
            return;
        }
        let src = HEADER_SIZE + from * CELL_SIZE;
        let dst = HEADER_SIZE + to * CELL_SIZE;
        let len = count * CELL_SIZE;
        self.bytes_mut().copy_within(src..src + len, dst);
    }

    /// Snapshot of one row's cells, for readers.
    pub fn row_cells(&self, row: u32) -> Vec<ScreenCell> {
        (self.row_index(row)..self.row_end(row))
            .map(|index| self.read_cell(index))
            .collect()
    }

    /// One row's glyphs as a string, for readers.
    pub fn row_text(&self, row: u32) -> String {
        self.row_cells(row).iter().map(|cell| cell.glyph).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::cell::CellColor;

    fn lettered(segment: &mut ScreenSegment, row: u32, text: &str) {
        for (i, ch) in text.chars().enumerate() {
            let mut cell = ScreenCell::blank();
            cell.glyph = ch;
            let index = segment.cell_index(row, i as u32);
            segment.write_cell(index, &cell);
        }
    }

    #[test]
    fn test_private_segment_starts_blank() {
        let segment = ScreenSegment::private(10, 4).unwrap();
        assert_eq!(segment.columns(), 10);
        assert_eq!(segment.rows(), 4);
        assert_eq!(segment.cursor(), (0, 0));
        for index in 0..segment.end_index() {
            assert_eq!(segment.read_cell(index), ScreenCell::blank());
        }
    }

    #[test]
    fn test_cursor_fields() {
        let mut segment = ScreenSegment::private(80, 24).unwrap();
        segment.set_cursor(5, 17);
        assert_eq!(segment.cursor(), (5, 17));
    }

    #[test]
    fn test_index_math() {
        let segment = ScreenSegment::private(80, 24).unwrap();
        assert_eq!(segment.cell_index(0, 0), 0);
        assert_eq!(segment.cell_index(0, 79), 79);
        assert_eq!(segment.cell_index(1, 0), 80);
        assert_eq!(segment.row_index(3), 240);
        assert_eq!(segment.row_end(3), 320);
        assert_eq!(segment.end_index(), 80 * 24);
    }

    #[test]
    fn test_write_read_cell() {
        let mut segment = ScreenSegment::private(10, 2).unwrap();
        let cell = ScreenCell {
            glyph: 'x',
            foreground: CellColor::new(1, 2, 3),
            background: CellColor::new(4, 5, 6),
            blink: false,
            underline: true,
        };
        let index = segment.cell_index(1, 7);
        segment.write_cell(index, &cell);
        assert_eq!(segment.read_cell(index), cell);
        // Neighbors untouched
        assert_eq!(segment.read_cell(index - 1), ScreenCell::blank());
        assert_eq!(segment.read_cell(index + 1), ScreenCell::blank());
    }

    #[test]
    fn test_fill_range() {
        let mut segment = ScreenSegment::private(10, 2).unwrap();
        let mut template = ScreenCell::blank();
        template.glyph = '#';
        segment.fill_range(3, 7, &template);
        for index in 0..segment.end_index() {
            let expected = if (3..7).contains(&index) { '#' } else { ' ' };
            assert_eq!(segment.read_cell(index).glyph, expected);
        }
    }

    #[test]
    fn test_fill_empty_range_is_noop() {
        let mut segment = ScreenSegment::private(10, 2).unwrap();
        let mut template = ScreenCell::blank();
        template.glyph = '#';
        segment.fill_range(5, 5, &template);
        segment.fill_range(7, 3, &template);
        assert_eq!(segment.row_text(0), "          ");
    }

    #[test]
    fn test_move_range_overlapping_backward() {
        // Shift left across an overlap, the delete-characters pattern
        let mut segment = ScreenSegment::private(10, 1).unwrap();
        lettered(&mut segment, 0, "abcdefghij");
        segment.move_range(2, 5, 5);
        assert_eq!(segment.row_text(0), "abfghijhij");
    }

    #[test]
    fn test_move_range_overlapping_forward() {
        // Shift right across an overlap, the insert-characters pattern
        let mut segment = ScreenSegment::private(10, 1).unwrap();
        lettered(&mut segment, 0, "abcdefghij");
        segment.move_range(5, 2, 5);
        assert_eq!(segment.row_text(0), "abcdecdefg");
    }

    #[test]
    fn test_row_snapshot() {
        let mut segment = ScreenSegment::private(5, 2).unwrap();
        lettered(&mut segment, 1, "hi");
        assert_eq!(segment.row_text(1), "hi   ");
        assert_eq!(segment.row_cells(1).len(), 5);
    }
}
