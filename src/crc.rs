//! CRC-16/MODBUS checksum
//!
//! Polynomial 0x8005 reflected (0xA001), initial value 0xFFFF, no final
//! XOR. The checksum is appended to the frame least significant byte
//! first.

use crate::constants::CRC_LEN;

/// Calculate the CRC-16/MODBUS checksum of `data`
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;

    for &byte in data {
        crc ^= byte as u16;
        for _ in 0..8 {
            if crc & 0x0001 != 0 {
                crc >>= 1;
                crc ^= 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }

    crc
}

/// Append the CRC trailer (low byte first) to an outgoing frame
pub fn append_crc(frame: &mut Vec<u8>) {
    let crc = crc16(frame);
    frame.push((crc & 0xFF) as u8);
    frame.push((crc >> 8) as u8);
}

/// Check the CRC trailer of a received frame.
///
/// Returns `false` when the frame is too short to carry a trailer or the
/// recomputed checksum does not match the trailing two bytes.
pub fn verify_crc(frame: &[u8]) -> bool {
    if frame.len() < CRC_LEN + 1 {
        return false;
    }

    let data_len = frame.len() - CRC_LEN;
    let expected = crc16(&frame[..data_len]);
    let received = (frame[data_len] as u16) | ((frame[data_len + 1] as u16) << 8);

    expected == received
}
