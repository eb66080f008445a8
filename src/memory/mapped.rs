//! Memory-mapped struct storage backed by a file or an anonymous mapping

use std::{
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
    ptr::NonNull,
};

use memmap2::{MmapMut, MmapOptions};

use crate::error::{Result, StructError};

use super::config::MmapConfig;

/// A read/write mapping sized to hold `element_count` structs.
///
/// The file length always equals `element_count × element_size`; layout
/// inside the file is byte-identical to the in-memory layout.
#[derive(Debug)]
pub struct MappedRegion {
    /// Active mapping
    mmap: MmapMut,
    /// Cached base pointer of `mmap`
    base: NonNull<u8>,
    /// Backing file for file-backed regions
    file: Option<File>,
    /// Path of the backing file
    path: Option<PathBuf>,
    element_size: usize,
    element_count: usize,
    config: MmapConfig,
}

fn total_bytes(element_count: usize, element_size: usize) -> Result<usize> {
    if element_count == 0 {
        return Err(StructError::invalid_argument("element_count", "Element count must be greater than 0"));
    }
    if element_size == 0 {
        return Err(StructError::invalid_argument("element_size", "Element size must be greater than 0"));
    }
    element_count
        .checked_mul(element_size)
        .ok_or_else(|| StructError::invalid_argument("element_count", "Mapping size overflows usize"))
}

fn base_of(mmap: &mut MmapMut) -> Result<NonNull<u8>> {
    NonNull::new(mmap.as_mut_ptr()).ok_or_else(|| StructError::invalid_argument("mmap", "Mapping has no base address"))
}

impl MappedRegion {
    /// Map `path`, creating the file or resizing it to exactly
    /// `element_count × element_size` bytes.
    pub fn map_file(
        path: impl AsRef<Path>,
        element_count: usize,
        element_size: usize,
        config: &MmapConfig,
    ) -> Result<Self> {
        config.validate()?;
        let len = total_bytes(element_count, element_size)?;
        let path = path.as_ref().to_path_buf();

        let mut options = OpenOptions::new();
        options.read(true).write(true).create(true).truncate(false);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(config.permissions);
        }

        let file = options
            .open(&path)
            .map_err(|e| StructError::from_io(e, "Failed to create/open file"))?;

        file.set_len(len as u64)
            .map_err(|e| StructError::from_io(e, "Failed to set file size"))?;

        let mut mmap = Self::map_file_handle(&file, len)?;
        let base = base_of(&mut mmap)?;

        tracing::debug!(path = %path.display(), element_count, element_size, bytes = len, "Mapped struct file");

        Ok(Self {
            mmap,
            base,
            file: Some(file),
            path: Some(path),
            element_size,
            element_count,
            config: config.clone(),
        })
    }

    /// Map zero-filled memory with no backing file
    pub fn map_anonymous(element_count: usize, element_size: usize) -> Result<Self> {
        let len = total_bytes(element_count, element_size)?;
        let mut mmap = Self::map_anon(len)?;
        let base = base_of(&mut mmap)?;

        tracing::debug!(element_count, element_size, bytes = len, "Mapped anonymous struct region");

        Ok(Self {
            mmap,
            base,
            file: None,
            path: None,
            element_size,
            element_count,
            config: MmapConfig::default(),
        })
    }

    fn map_file_handle(file: &File, len: usize) -> Result<MmapMut> {
        // SAFETY: the file is opened read/write and sized to `len` above
        unsafe {
            MmapOptions::new()
                .len(len)
                .map_mut(file)
                .map_err(|e| StructError::from_io(e, "Failed to create memory mapping"))
        }
    }

    fn map_anon(len: usize) -> Result<MmapMut> {
        MmapOptions::new()
            .len(len)
            .map_anon()
            .map_err(|e| StructError::from_io(e, "Failed to create anonymous mapping"))
    }

    /// Size `file` to `len` bytes and map it with `map`.
    ///
    /// On failure the file is set back to `old_len`, so the caller's
    /// current mapping still covers the whole file.
    fn remap_file<F>(file: &File, old_len: usize, len: usize, map: F) -> Result<(MmapMut, NonNull<u8>)>
    where
        F: FnOnce(&File, usize) -> Result<MmapMut>,
    {
        file.set_len(len as u64)
            .map_err(|e| StructError::from_io(e, "Failed to set file size"))?;

        let mapped = map(file, len).and_then(|mut mmap| {
            let base = base_of(&mut mmap)?;
            Ok((mmap, base))
        });
        if mapped.is_err() {
            if let Err(e) = file.set_len(old_len as u64) {
                tracing::warn!(error = %e, old_bytes = old_len, "Failed to restore file size after remap failure");
            }
        }
        mapped
    }

    /// Change the mapping to hold `element_count` structs.
    ///
    /// The first `min(old, new)` elements are preserved and added elements
    /// are zero. The base address usually changes. On error the region is
    /// left as it was.
    pub fn resize(&mut self, element_count: usize) -> Result<()> {
        let len = total_bytes(element_count, self.element_size)?;
        let old_len = self.len();

        let (mmap, base) = match &self.file {
            Some(file) => {
                self.mmap
                    .flush()
                    .map_err(|e| StructError::from_io(e, "Failed to flush memory mapping"))?;
                Self::remap_file(file, old_len, len, Self::map_file_handle)?
            }
            None => {
                let mut mmap = Self::map_anon(len)?;
                let keep = old_len.min(len);
                mmap[..keep].copy_from_slice(&self.mmap[..keep]);
                let base = base_of(&mut mmap)?;
                (mmap, base)
            }
        };

        self.base = base;
        self.mmap = mmap;
        self.element_count = element_count;

        tracing::debug!(
            file_backed = self.is_file_backed(),
            element_count,
            old_bytes = old_len,
            new_bytes = len,
            "Resized mapping"
        );
        Ok(())
    }

    /// Flush changes to the backing file
    pub fn flush(&self) -> Result<()> {
        if self.file.is_none() {
            return Ok(());
        }
        self.mmap
            .flush()
            .map_err(|e| StructError::from_io(e, "Failed to flush memory mapping"))
    }

    /// Base address of the mapping
    pub fn as_ptr(&self) -> *mut u8 {
        self.base.as_ptr()
    }

    /// Mapped length in bytes
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    pub fn element_count(&self) -> usize {
        self.element_count
    }

    pub fn element_size(&self) -> usize {
        self.element_size
    }

    pub fn is_file_backed(&self) -> bool {
        self.file.is_some()
    }

    /// Path of the backing file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl Drop for MappedRegion {
    fn drop(&mut self) {
        let Some(path) = self.path.as_ref() else {
            return;
        };

        if self.config.flush_on_free {
            if let Err(e) = self.mmap.flush() {
                tracing::warn!(path = %path.display(), error = %e, "Failed to flush mapping on release");
            }
        }

        if self.config.remove_on_free {
            if let Err(e) = std::fs::remove_file(path) {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove mapped file");
            }
        }
    }
}
