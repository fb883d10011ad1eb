//! Response code handling

use crate::error::{RcioError, Result};
use crate::px4io::protocol::{Packet, ResponseCode};

/// Check a decoded response before its registers are trusted
///
/// | code   | outcome                                      |
/// |--------|----------------------------------------------|
/// | `0x00` | accepted if the CRC matches, else corrupt    |
/// | `0x40` | board rejected our request as corrupt        |
/// | `0x80` | board refused the register operation         |
/// | `0xC0` | unrecognized, treated as a corrupt response  |
pub fn validate_response(response: &Packet) -> Result<()> {
    match ResponseCode::try_from(response.code()) {
        Ok(ResponseCode::Success) if response.validate() => Ok(()),
        Ok(ResponseCode::Success) => Err(RcioError::CorruptResponse(format!(
            "CRC mismatch on page {} offset {}",
            response.page, response.offset
        ))),
        Ok(ResponseCode::Corrupt) => Err(RcioError::RequestRejectedCorrupt),
        Ok(ResponseCode::Error) => Err(RcioError::RequestRejectedError),
        Err(_) => Err(RcioError::CorruptResponse(format!(
            "unrecognized response code 0x{:02X}",
            response.code()
        ))),
    }
}
