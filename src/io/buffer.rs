use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};

use crate::{BenchError, Result};

/// Allocate a zeroed buffer, reporting allocation failure instead of aborting
pub fn allocate_chunk(size: usize) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    buffer.try_reserve_exact(size).map_err(|e| {
        BenchError::ResourceExhausted(format!(
            "cannot allocate {} byte transfer buffer: {}",
            size, e
        ))
    })?;
    buffer.resize(size, 0);
    Ok(buffer)
}

/// Allocate a buffer of random bytes
///
/// Random content keeps sparse-file and compression shortcuts out of the
/// measurement; the quality of the randomness does not matter.
pub fn random_chunk(size: usize) -> Result<Vec<u8>> {
    let mut buffer = allocate_chunk(size)?;
    SmallRng::from_entropy().fill_bytes(&mut buffer);
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_chunk_zeroed() {
        let buffer = allocate_chunk(4096).unwrap();
        assert_eq!(buffer.len(), 4096);
        assert!(buffer.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_random_chunk_not_constant() {
        let buffer = random_chunk(64 * 1024).unwrap();
        assert_eq!(buffer.len(), 64 * 1024);
        let first = buffer[0];
        assert!(buffer.iter().any(|&b| b != first));
    }

    #[test]
    fn test_allocation_failure_is_resource_exhausted() {
        let err = allocate_chunk(usize::MAX).unwrap_err();
        assert!(matches!(err, BenchError::ResourceExhausted(_)));
    }
}
