//! Extent-mapped byte streams. A fork is a logical byte range scattered
//! across allocation-block runs; `ForkStream` translates fork-relative
//! offsets into volume offsets and reads through the backing locator.

use std::sync::Arc;

use carbon_core::{CarbonError, DataLocator};

use super::model::ExtentDescriptor;

pub struct ForkStream {
    locator: Arc<dyn DataLocator>,
    extents: Vec<ExtentDescriptor>,
    /// Volume byte offset of allocation block 0.
    block_base: u64,
    block_size: u32,
    logical_size: u64,
}

impl ForkStream {
    pub fn new(
        locator: Arc<dyn DataLocator>,
        extents: Vec<ExtentDescriptor>,
        block_base: u64,
        block_size: u32,
        logical_size: u64,
    ) -> Self {
        Self {
            locator,
            extents,
            block_base,
            block_size,
            logical_size,
        }
    }

    pub fn len(&self) -> u64 {
        self.logical_size
    }

    pub fn is_empty(&self) -> bool {
        self.logical_size == 0
    }

    /// Total allocation blocks covered by the extent list.
    pub fn mapped_blocks(&self) -> u64 {
        self.extents.iter().map(|e| u64::from(e.block_count)).sum()
    }

    /// Read exactly `buf.len()` bytes starting at fork-relative `offset`.
    /// Reads past the logical length, or into blocks the extent list does
    /// not cover, are truncation errors.
    pub fn read_at(&self, mut offset: u64, buf: &mut [u8]) -> Result<(), CarbonError> {
        let want = buf.len() as u64;
        if offset.checked_add(want).map_or(true, |end| end > self.logical_size) {
            return Err(CarbonError::Truncated {
                what: "fork read past logical end",
                need: buf.len(),
                have: self.logical_size.saturating_sub(offset) as usize,
            });
        }

        let block_size = u64::from(self.block_size);
        let mut remaining = buf;
        // Walk the extent list to the run containing `offset`, then read
        // run by run.
        for extent in &self.extents {
            if remaining.is_empty() {
                return Ok(());
            }
            let run_len = u64::from(extent.block_count) * block_size;
            if offset >= run_len {
                offset -= run_len;
                continue;
            }
            let avail = (run_len - offset).min(remaining.len() as u64) as usize;
            let volume_offset =
                self.block_base + u64::from(extent.start_block) * block_size + offset;
            let (chunk, rest) = remaining.split_at_mut(avail);
            self.locator.read_at(volume_offset, chunk)?;
            remaining = rest;
            offset = 0;
        }

        if remaining.is_empty() {
            Ok(())
        } else {
            Err(CarbonError::Truncated {
                what: "fork read past mapped extents",
                need: want as usize,
                have: want as usize - remaining.len(),
            })
        }
    }

    pub fn read_vec(&self, offset: u64, len: usize) -> Result<Vec<u8>, CarbonError> {
        let mut buf = vec![0u8; len];
        self.read_at(offset, &mut buf)?;
        Ok(buf)
    }
}
