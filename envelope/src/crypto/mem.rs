//! Memory protection.
//!
//! Keys, passwords and decrypted session key blocks live in
//! [`Protected`] buffers, which are wiped when they go away.

use std::fmt;
use std::ops::{Deref, DerefMut};

/// A heap buffer that is zeroed when dropped.
#[derive(Clone, Eq)]
pub struct Protected(Box<[u8]>);

impl Protected {
    /// Returns a zeroed buffer of `len` bytes.
    pub fn zeroed(len: usize) -> Self {
        Protected(vec![0; len].into_boxed_slice())
    }
}

// Comparing secrets must not leak where they differ.
impl PartialEq for Protected {
    fn eq(&self, other: &Self) -> bool {
        constant_time_eq(&self.0, &other.0)
    }
}

impl Deref for Protected {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl DerefMut for Protected {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

impl From<Vec<u8>> for Protected {
    fn from(mut v: Vec<u8>) -> Self {
        // The vector's capacity may exceed its length, so copy into an
        // exact allocation and wipe the original.
        let p = Protected(v[..].into());
        wipe(&mut v);
        p
    }
}

impl From<&[u8]> for Protected {
    fn from(v: &[u8]) -> Self {
        Protected(v.into())
    }
}

impl Drop for Protected {
    fn drop(&mut self) {
        wipe(&mut self.0);
    }
}

impl fmt::Debug for Protected {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if cfg!(debug_assertions) {
            write!(f, "{:02X?}", &self.0[..])
        } else {
            write!(f, "<{} secret bytes>", self.0.len())
        }
    }
}

fn wipe(buf: &mut [u8]) {
    unsafe {
        memsec::memzero(buf.as_mut_ptr(), buf.len());
    }
}

/// Compares `a` and `b` in time that depends only on their lengths.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len()
        && unsafe { memsec::memeq(a.as_ptr(), b.as_ptr(), a.len()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality() {
        let a: Protected = vec![1, 2, 3].into();
        let b: Protected = (&[1u8, 2, 3][..]).into();
        assert_eq!(a, b);
        assert_ne!(a, Protected::zeroed(3));
        assert!(! constant_time_eq(&[1, 2], &[1, 2, 3]));
        assert!(constant_time_eq(&[], &[]));
    }
}
