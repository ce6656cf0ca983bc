//! CPH frame checksum
//!
//! The checksum byte is the two's complement of the 8-bit sum of every byte
//! from the `RF` header through the last parameter byte, so the sum of a
//! whole frame including its checksum is zero.

use tracing::trace;

/// Calculate the checksum over header and parameters
///
/// # Examples
///
/// ```
/// use uhf_rfid_core::checksum;
///
/// // Get-version command to address 0
/// let body = [0x52, 0x46, 0x00, 0x00, 0x00, 0x40, 0x00, 0x00];
/// assert_eq!(checksum::calculate(&body), 0x28);
/// ```
pub fn calculate(data: &[u8]) -> u8 {
    let sum = data.iter().fold(0u8, |acc, byte| acc.wrapping_add(*byte));
    let checksum = (!sum).wrapping_add(1);

    trace!(
        len = data.len(),
        checksum = format!("0x{:02X}", checksum),
        "Calculated checksum"
    );

    checksum
}

/// Verify checksum
pub fn verify(data: &[u8], expected: u8) -> bool {
    calculate(data) == expected
}
