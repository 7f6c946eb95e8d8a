//! Password-protected OOXML workbooks.
//!
//! Excel stores an encrypted `.xlsx` inside an OLE compound file instead of a
//! zip package, so protection is detected from the leading signature.

use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::debug;

use crate::error::MergeError;
use crate::xlsx::SheetFormat;

/// Magic bytes of an OLE compound file.
pub(crate) const OLE_SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

const ZIP_SIGNATURE: [u8; 4] = *b"PK\x03\x04";

/// `.xls` files are compound files too, so only OOXML formats count.
pub(crate) fn is_encrypted(bytes: &[u8], format: SheetFormat) -> bool {
    format.is_ooxml() && bytes.starts_with(&OLE_SIGNATURE)
}

/// Decrypts an agile/standard encrypted package into plain zip bytes.
///
/// The package carries no password check of its own, so a wrong password is
/// recognised by the result not being a zip archive.
pub(crate) fn decrypt(bytes: Vec<u8>, password: &str) -> Result<Vec<u8>, MergeError> {
    // office-crypto panics on some truncated packages.
    let decrypted = catch_unwind(AssertUnwindSafe(|| {
        office_crypto::decrypt_from_bytes(bytes, password)
    }))
    .map_err(|_| MergeError::Decrypt("malformed encrypted package".to_string()))?
    .map_err(|error| MergeError::Decrypt(error.to_string()))?;

    if !decrypted.starts_with(&ZIP_SIGNATURE) {
        return Err(MergeError::Decrypt(
            "wrong password or corrupt package".to_string(),
        ));
    }
    debug!("decrypted package: {} bytes", decrypted.len());
    Ok(decrypted)
}
