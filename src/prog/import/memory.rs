//! Virtual-memory access shared by the importer and its backend.

use super::backend::{BackendError, BackendResult};

/// Reads target memory in the address space of the module's owning process.
pub trait MemoryReader {
    fn read_memory(&self, address: u64, len: usize) -> BackendResult<Vec<u8>>;
}

/// Reader for targets without readable memory; every read fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoMemory;

impl MemoryReader for NoMemory {
    fn read_memory(&self, address: u64, len: usize) -> BackendResult<Vec<u8>> {
        Err(BackendError::MemoryRead { address, len })
    }
}

/// Contiguous snapshot of target bytes starting at `base`.
#[derive(Clone, Debug, Default)]
pub struct ImageMemory {
    base: u64,
    bytes: Vec<u8>,
}

impl ImageMemory {
    pub fn new(base: u64, bytes: Vec<u8>) -> Self {
        Self { base, bytes }
    }
}

impl MemoryReader for ImageMemory {
    fn read_memory(&self, address: u64, len: usize) -> BackendResult<Vec<u8>> {
        let fail = || BackendError::MemoryRead { address, len };
        let start = usize::try_from(address.checked_sub(self.base).ok_or_else(fail)?)
            .map_err(|_| fail())?;
        let end = start.checked_add(len).ok_or_else(fail)?;
        self.bytes.get(start..end).map(<[u8]>::to_vec).ok_or_else(fail)
    }
}
