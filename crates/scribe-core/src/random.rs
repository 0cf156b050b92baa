//! Uniform integers from the operating system CSPRNG.
//!
//! Topic picks and schedule jitter must not follow a predictable sequence,
//! so nothing here is seeded.

use ring::rand::{SecureRandom, SystemRandom};

use crate::error::{Result, ScribeError};

fn next_u64(rng: &SystemRandom) -> Result<u64> {
    let mut buf = [0u8; 8];
    rng.fill(&mut buf)
        .map_err(|_| ScribeError::Internal("system random source unavailable".into()))?;
    Ok(u64::from_le_bytes(buf))
}

/// Uniform value in `0..bound`. `bound` must be non-zero.
pub fn uniform_below(bound: u64) -> Result<u64> {
    if bound == 0 {
        return Err(ScribeError::Internal("uniform_below called with bound 0".into()));
    }
    let rng = SystemRandom::new();
    // Rejection sampling: discard the top partial bucket to avoid modulo bias.
    let zone = u64::MAX - (u64::MAX % bound);
    loop {
        let v = next_u64(&rng)?;
        if v < zone {
            return Ok(v % bound);
        }
    }
}

/// Uniform value in `lo..=hi`.
pub fn uniform_inclusive(lo: i64, hi: i64) -> Result<i64> {
    if lo > hi {
        return Err(ScribeError::Internal(format!("empty range {lo}..={hi}")));
    }
    let span = (hi - lo) as u64 + 1;
    Ok(lo + uniform_below(span)? as i64)
}

/// Uniform index into a slice of length `len`.
pub fn pick_index(len: usize) -> Result<usize> {
    Ok(uniform_below(len as u64)? as usize)
}
