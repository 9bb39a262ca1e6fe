//! Cryptographic hash functions.
//!
//! [`Context`] wraps the RustCrypto hash implementations behind one
//! cloneable type.  Signature digests are computed on a clone, so that
//! the running hash over the signed data stays usable.
//!
//!   [`Context`]: struct.Context.html

use std::io;

use dyn_clone::DynClone;

use crate::Error;
use crate::Result;
use crate::types::Algorithm;

// The object safe face of a RustCrypto hash.
pub(crate) trait Digest: DynClone {
    fn digest_size(&self) -> usize;
    fn update(&mut self, data: &[u8]);
    // Writes as much of the digest as fits `digest`, then resets.
    fn digest(&mut self, digest: &mut [u8]);
}

dyn_clone::clone_trait_object!(Digest);

impl<T> Digest for T
    where T: digest::Digest + Clone + 'static
{
    fn digest_size(&self) -> usize {
        <T as digest::Digest>::output_size()
    }

    fn update(&mut self, data: &[u8]) {
        digest::Digest::update(self, data);
    }

    fn digest(&mut self, digest: &mut [u8]) {
        let d = self.finalize_reset();
        let l = digest.len().min(d.len());
        digest[..l].copy_from_slice(&d[..l]);
    }
}

/// A running hash.
///
/// # Examples
///
/// ```rust
/// # fn main() -> sequoia_envelope::Result<()> {
/// use sequoia_envelope::Algorithm;
///
/// let mut ctx = Algorithm::SHA1.context(0)?;
/// ctx.update(b"abc");
/// let mut digest = vec![0; ctx.digest_size()];
/// ctx.digest(&mut digest);
/// assert_eq!(&digest[..4], &[0xA9, 0x99, 0x3E, 0x36]);
/// # Ok(()) }
/// ```
#[derive(Clone)]
pub struct Context {
    algo: Algorithm,
    param: usize,
    ctx: Box<dyn Digest>,
}

impl Context {
    /// Returns the algorithm.
    pub fn algo(&self) -> Algorithm {
        self.algo
    }

    /// Returns the algorithm parameter, the digest size for SHA-2.
    pub fn param(&self) -> usize {
        self.param
    }

    /// Returns the length of the digest.
    pub fn digest_size(&self) -> usize {
        self.ctx.digest_size()
    }

    /// Hashes `data`.
    pub fn update<D: AsRef<[u8]>>(&mut self, data: D) {
        self.ctx.update(data.as_ref());
    }

    /// Writes the digest to `digest`, truncating it if `digest` is
    /// short, and starts over.
    pub fn digest<D: AsMut<[u8]>>(&mut self, mut digest: D) {
        self.ctx.digest(digest.as_mut());
    }

    /// Finalizes the hash function and returns the digest.
    pub fn into_digest(mut self) -> Vec<u8> {
        let mut d = vec![0; self.digest_size()];
        self.digest(&mut d);
        d
    }
}

impl io::Write for Context {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Algorithm {
    /// Returns a fresh hash context.
    ///
    /// For SHA-2, `param` is the digest size in bytes, zero selecting
    /// SHA-256.
    ///
    /// # Errors
    ///
    /// Fails with `Error::NotAvailable` if the algorithm isn't a hash
    /// or the digest size isn't supported.
    pub fn context(&self, param: usize) -> Result<Context> {
        let ctx: Box<dyn Digest> = match (self, param) {
            (Algorithm::MD5, _) => Box::new(md5::Md5::default()),
            (Algorithm::SHA1, _) => Box::new(sha1::Sha1::default()),
            (Algorithm::RIPEMD160, _) =>
                Box::new(ripemd160::Ripemd160::default()),
            (Algorithm::SHA2, 0) | (Algorithm::SHA2, 32) =>
                Box::new(sha2::Sha256::default()),
            (Algorithm::SHA2, 28) => Box::new(sha2::Sha224::default()),
            (Algorithm::SHA2, 48) => Box::new(sha2::Sha384::default()),
            (Algorithm::SHA2, 64) => Box::new(sha2::Sha512::default()),
            (algo, param) => return Err(Error::NotAvailable(
                format!("Hash {} with parameter {}", algo, param)).into()),
        };

        let param = if *self == Algorithm::SHA2 && param == 0 {
            32
        } else {
            param
        };
        Ok(Context { algo: *self, param, ctx })
    }
}
