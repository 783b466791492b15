//! Common helpers shared by the protocol modules

use core::convert::TryInto;

use rand::{CryptoRng, Rng, RngCore};
use subtle::{Choice, CtOption};

use crate::error::{Error, Result};

/// Fill some bytes with random data
///
/// Callers pass `thread_rng`, wich in turn uses the chacha20 cipher as a random byte stream,
/// seeded from the osrng
pub fn fill_bytes<R: CryptoRng + RngCore>(rng: &mut R, mut bytes: impl AsMut<[u8]>) {
    bytes.as_mut().iter_mut().for_each(|byte| *byte = rng.gen());
}

/// Copy a slice into a fixed size array, or fail with a format error naming `what`
pub(crate) fn fixed_bytes<const N: usize>(data: &[u8], what: &'static str) -> Result<[u8; N]> {
    data.try_into().map_err(|_| Error::Format(what))
}

/// Leave constant time land once the computation is done
pub(crate) fn ct_decoded<T>(value: CtOption<T>, what: &'static str) -> Result<T> {
    if bool::from(value.is_some()) {
        Ok(value.unwrap())
    } else {
        Err(Error::Format(what))
    }
}

/// Turn the outcome of a constant time check into a verification result
pub(crate) fn ct_verified(ok: Choice, what: &'static str) -> Result<()> {
    if bool::from(ok) {
        Ok(())
    } else {
        Err(Error::Verification(what))
    }
}
