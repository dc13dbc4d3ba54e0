//! The injected memory-access contract `getmem`/`setmem`/`getmemex` consume.
//!
//! Console memory peek/poke is scoped the same way the filesystem sandbox
//! and configuration are: as data a handler reads from an external
//! collaborator, not as logic this crate owns. Kept alongside
//! [`crate::fs::Filesystem`] and [`crate::config::ConfigProvider`] since the
//! three are injected into handlers identically.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("address range {addr:#x}+{len:#x} is not accessible")]
    OutOfRange { addr: u32, len: u32 },
}

pub trait MemoryAccess: Send + Sync {
    fn read(&self, addr: u32, len: u32) -> Result<Vec<u8>, MemoryError>;
    fn write(&self, addr: u32, data: &[u8]) -> Result<(), MemoryError>;
}

/// A flat in-memory byte array, suitable for tests and demos: addresses are
/// simply offsets into a fixed-size backing buffer guarded by a mutex.
#[derive(Debug)]
pub struct SimMemory {
    bytes: std::sync::Mutex<Vec<u8>>,
}

impl SimMemory {
    pub fn new(size: usize) -> Self {
        Self { bytes: std::sync::Mutex::new(vec![0u8; size]) }
    }
}

impl MemoryAccess for SimMemory {
    fn read(&self, addr: u32, len: u32) -> Result<Vec<u8>, MemoryError> {
        let guard = self.bytes.lock().unwrap();
        let start = addr as usize;
        let end = start.checked_add(len as usize).ok_or(MemoryError::OutOfRange { addr, len })?;
        guard
            .get(start..end)
            .map(<[u8]>::to_vec)
            .ok_or(MemoryError::OutOfRange { addr, len })
    }

    fn write(&self, addr: u32, data: &[u8]) -> Result<(), MemoryError> {
        let mut guard = self.bytes.lock().unwrap();
        let start = addr as usize;
        let end = start.checked_add(data.len()).ok_or(MemoryError::OutOfRange {
            addr,
            len: data.len() as u32,
        })?;
        let slot = guard
            .get_mut(start..end)
            .ok_or(MemoryError::OutOfRange { addr, len: data.len() as u32 })?;
        slot.copy_from_slice(data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let mem = SimMemory::new(16);
        mem.write(4, &[1, 2, 3]).unwrap();
        assert_eq!(mem.read(4, 3).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn out_of_range_is_rejected() {
        let mem = SimMemory::new(4);
        assert!(matches!(mem.read(2, 8), Err(MemoryError::OutOfRange { .. })));
    }
}
