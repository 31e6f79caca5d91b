//! CRC-8 word integrity check used by the SHT sensor families.
//!
//! Polynomial 0x31 (x^8 + x^5 + x^4 + 1), initial value 0xFF, MSB first,
//! no reflection, no final XOR. This is the catalogued CRC-8/NRSC-5.
//! Every 16-bit word the sensor returns is followed by its checksum byte.

use crc::{Crc, CRC_8_NRSC_5};

use crate::error::IntegrityError;

const CRC_COMPUTER: Crc<u8> = Crc::<u8>::new(&CRC_8_NRSC_5);

/// Known-answer vector from the sensor datasheets.
pub const SELF_TEST_INPUT: [u8; 2] = [0xBE, 0xEF];
pub const SELF_TEST_EXPECTED: u8 = 0x92;

/// Checksum of one raw word.
#[inline]
pub fn checksum(word: &[u8; 2]) -> u8 {
    CRC_COMPUTER.checksum(word)
}

/// Verify the checksum routine against its known answer.
///
/// Run once before any live data is trusted.
pub fn self_test() -> Result<(), IntegrityError> {
    if checksum(&SELF_TEST_INPUT) == SELF_TEST_EXPECTED {
        Ok(())
    } else {
        Err(IntegrityError::ChecksumSelfTest)
    }
}

/// Split a `[msb, lsb, crc]` triple into its word, validating the checksum.
pub fn checked_word(triple: &[u8; 3]) -> Result<u16, IntegrityError> {
    let [msb, lsb, crc] = *triple;
    let word = [msb, lsb];
    if checksum(&word) != crc {
        return Err(IntegrityError::ChecksumMismatch);
    }
    Ok(u16::from_be_bytes(word))
}

/// Append the checksum to a word, producing the on-wire triple.
pub fn encode_word(word: u16) -> [u8; 3] {
    let [msb, lsb] = word.to_be_bytes();
    [msb, lsb, checksum(&[msb, lsb])]
}
