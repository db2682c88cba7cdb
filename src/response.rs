//! Response decoding and validation
//!
//! A completed frame is checked in layers: CRC trailer, unit identifier,
//! exception flag, function code echo, and finally the payload shape for
//! the specific request that was sent.

use std::fmt;

use crate::constants::*;
use crate::crc::verify_crc;
use crate::error::{RtuError, RtuResult};
use crate::frame::Request;

/// Modbus exception code reported by a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionCode(pub u8);

impl ExceptionCode {
    /// Human readable description of the code
    pub fn description(&self) -> &'static str {
        match self.0 {
            0x01 => "Illegal Function",
            0x02 => "Illegal Data Address",
            0x03 => "Illegal Data Value",
            0x04 => "Slave Device Failure",
            0x05 => "Acknowledge",
            0x06 => "Slave Device Busy",
            0x08 => "Memory Parity Error",
            0x0A => "Gateway Path Unavailable",
            0x0B => "Gateway Target Device Failed to Respond",
            _ => "Unknown Exception",
        }
    }
}

impl fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X} ({})", self.0, self.description())
    }
}

/// Successfully decoded response payload
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedResult {
    /// Coil or discrete input states, truncated to the requested quantity
    Bits(Vec<bool>),
    /// Holding or input register values
    Registers(Vec<u16>),
    /// Echo of a write request
    WriteEcho { address: u16, value: u16 },
    /// The device refused the request
    Exception(ExceptionCode),
}

/// Decode and validate a complete response frame against the request that
/// produced it.
///
/// An exception response is a successful decode: the bus and framing
/// worked, the device simply said no. Callers that prefer an error can
/// map [`DecodedResult::Exception`] through [`RtuError::Exception`].
pub fn decode_response(
    request: &Request,
    unit_id: u8,
    frame: &[u8],
) -> RtuResult<DecodedResult> {
    if frame.len() < EXCEPTION_FRAME_LEN {
        return Err(RtuError::InvalidResponse(format!(
            "frame too short: {} bytes",
            frame.len()
        )));
    }

    if !verify_crc(frame) {
        return Err(RtuError::InvalidResponse("CRC mismatch".to_string()));
    }

    if frame[0] != unit_id {
        return Err(RtuError::InvalidResponse(format!(
            "unit id mismatch: expected {}, got {}",
            unit_id, frame[0]
        )));
    }

    let fc = frame[1];
    let expected_fc = request.function_code();

    // High bit set means an exception frame, whatever the echoed
    // function turns out to be.
    if fc & EXCEPTION_FLAG != 0 {
        return Ok(DecodedResult::Exception(ExceptionCode(frame[2])));
    }

    if fc != expected_fc {
        return Err(RtuError::InvalidResponse(format!(
            "function code mismatch: expected 0x{:02X}, got 0x{:02X}",
            expected_fc, fc
        )));
    }

    let payload = &frame[2..frame.len() - CRC_LEN];

    match request {
        Request::ReadCoils { quantity, .. } | Request::ReadDiscreteInputs { quantity, .. } => {
            decode_bits(payload, *quantity)
        }
        Request::ReadHoldingRegisters { quantity, .. }
        | Request::ReadInputRegisters { quantity, .. } => decode_registers(payload, *quantity),
        _ => decode_write_echo(request, payload),
    }
}

/// Unpack a bit read payload: byte count then LSB-first coil bytes
fn decode_bits(payload: &[u8], quantity: u16) -> RtuResult<DecodedResult> {
    if payload.is_empty() {
        return Err(RtuError::InvalidResponse(
            "bit response missing byte count".to_string(),
        ));
    }

    let byte_count = payload[0] as usize;
    let data = &payload[1..];

    if data.len() != byte_count {
        return Err(RtuError::InvalidResponse(format!(
            "bit response byte count {} but {} data bytes",
            byte_count,
            data.len()
        )));
    }

    let needed = (quantity as usize).div_ceil(8);
    if byte_count < needed {
        return Err(RtuError::InvalidResponse(format!(
            "bit response carries {} bytes, {} needed for {} bits",
            byte_count, needed, quantity
        )));
    }

    let bits = (0..quantity as usize)
        .map(|i| data[i / 8] & (1 << (i % 8)) != 0)
        .collect();

    Ok(DecodedResult::Bits(bits))
}

/// Unpack a register read payload: byte count then big-endian words
fn decode_registers(payload: &[u8], quantity: u16) -> RtuResult<DecodedResult> {
    if payload.is_empty() {
        return Err(RtuError::InvalidResponse(
            "register response missing byte count".to_string(),
        ));
    }

    let byte_count = payload[0] as usize;
    let data = &payload[1..];

    if data.len() != byte_count || byte_count != quantity as usize * 2 {
        return Err(RtuError::InvalidResponse(format!(
            "register response byte count {} for {} registers",
            byte_count, quantity
        )));
    }

    let registers = data
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();

    Ok(DecodedResult::Registers(registers))
}

/// Check a write echo: the address must match the request; for single
/// writes the value must match too. Multi-write responses echo the
/// quantity, which real devices report inconsistently, so only the
/// address is held against them.
fn decode_write_echo(request: &Request, payload: &[u8]) -> RtuResult<DecodedResult> {
    if payload.len() != 4 {
        return Err(RtuError::InvalidResponse(format!(
            "write echo payload {} bytes, expected 4",
            payload.len()
        )));
    }

    let address = u16::from_be_bytes([payload[0], payload[1]]);
    let value = u16::from_be_bytes([payload[2], payload[3]]);

    if address != request.address() {
        return Err(RtuError::InvalidResponse(format!(
            "write echo address 0x{:04X}, expected 0x{:04X}",
            address,
            request.address()
        )));
    }

    if let Some(expected) = request.expected_echo_value() {
        if value != expected {
            return Err(RtuError::InvalidResponse(format!(
                "write echo value 0x{:04X}, expected 0x{:04X}",
                value, expected
            )));
        }
    }

    Ok(DecodedResult::WriteEcho { address, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc::append_crc;

    fn framed(body: &[u8]) -> Vec<u8> {
        let mut frame = body.to_vec();
        append_crc(&mut frame);
        frame
    }

    #[test]
    fn test_decode_registers() {
        let req = Request::ReadHoldingRegisters {
            address: 0,
            quantity: 2,
        };
        let frame = framed(&[0x03, 0x03, 0x04, 0x12, 0x34, 0xAB, 0xCD]);
        let result = decode_response(&req, 3, &frame).unwrap();
        assert_eq!(result, DecodedResult::Registers(vec![0x1234, 0xABCD]));
    }

    #[test]
    fn test_decode_bits_truncates_to_quantity() {
        let req = Request::ReadCoils {
            address: 0,
            quantity: 10,
        };
        // 0xCD = 1,0,1,1,0,0,1,1 LSB first; 0x01 = 1,0
        let frame = framed(&[0x03, 0x01, 0x02, 0xCD, 0x01]);
        let result = decode_response(&req, 3, &frame).unwrap();
        assert_eq!(
            result,
            DecodedResult::Bits(vec![
                true, false, true, true, false, false, true, true, true, false
            ])
        );
    }

    #[test]
    fn test_decode_exception() {
        let req = Request::ReadHoldingRegisters {
            address: 0,
            quantity: 1,
        };
        let frame = framed(&[0x03, 0x83, 0x02]);
        let result = decode_response(&req, 3, &frame).unwrap();
        assert_eq!(result, DecodedResult::Exception(ExceptionCode(0x02)));
    }

    #[test]
    fn test_exception_recognized_for_any_function_echo() {
        // Device flags an exception under a different function code
        let req = Request::WriteSingleCoil {
            address: 0,
            value: true,
        };
        let frame = framed(&[0x03, 0x81, 0x04]);
        let result = decode_response(&req, 3, &frame).unwrap();
        assert_eq!(result, DecodedResult::Exception(ExceptionCode(0x04)));
    }

    #[test]
    fn test_exception_description() {
        assert_eq!(ExceptionCode(0x02).description(), "Illegal Data Address");
        assert_eq!(ExceptionCode(0x7F).description(), "Unknown Exception");
        assert_eq!(ExceptionCode(0x04).to_string(), "0x04 (Slave Device Failure)");
    }

    #[test]
    fn test_crc_mismatch_rejected() {
        let req = Request::ReadHoldingRegisters {
            address: 0,
            quantity: 1,
        };
        let mut frame = framed(&[0x03, 0x03, 0x02, 0x00, 0x2A]);
        frame[4] ^= 0xFF;
        let err = decode_response(&req, 3, &frame).unwrap_err();
        assert!(matches!(err, RtuError::InvalidResponse(msg) if msg.contains("CRC")));
    }

    #[test]
    fn test_unit_id_mismatch_rejected() {
        let req = Request::ReadHoldingRegisters {
            address: 0,
            quantity: 1,
        };
        let frame = framed(&[0x05, 0x03, 0x02, 0x00, 0x2A]);
        assert!(decode_response(&req, 3, &frame).is_err());
    }

    #[test]
    fn test_function_code_mismatch_rejected() {
        let req = Request::ReadHoldingRegisters {
            address: 0,
            quantity: 1,
        };
        let frame = framed(&[0x03, 0x04, 0x02, 0x00, 0x2A]);
        assert!(decode_response(&req, 3, &frame).is_err());
    }

    #[test]
    fn test_single_write_echo_value_checked() {
        let req = Request::WriteSingleRegister {
            address: 0x0010,
            value: 0x1234,
        };
        let good = framed(&[0x03, 0x06, 0x00, 0x10, 0x12, 0x34]);
        assert_eq!(
            decode_response(&req, 3, &good).unwrap(),
            DecodedResult::WriteEcho {
                address: 0x0010,
                value: 0x1234
            }
        );

        let bad = framed(&[0x03, 0x06, 0x00, 0x10, 0x56, 0x78]);
        assert!(decode_response(&req, 3, &bad).is_err());
    }

    #[test]
    fn test_multi_write_echo_value_not_checked() {
        let req = Request::WriteMultipleRegisters {
            address: 0x0001,
            values: vec![1, 2, 3],
        };
        // Device echoes a quantity of 99, which is tolerated as long as
        // the address matches.
        let frame = framed(&[0x03, 0x10, 0x00, 0x01, 0x00, 0x63]);
        assert_eq!(
            decode_response(&req, 3, &frame).unwrap(),
            DecodedResult::WriteEcho {
                address: 0x0001,
                value: 0x0063
            }
        );

        let wrong_addr = framed(&[0x03, 0x10, 0x00, 0x02, 0x00, 0x03]);
        assert!(decode_response(&req, 3, &wrong_addr).is_err());
    }

    #[test]
    fn test_register_count_mismatch_rejected() {
        let req = Request::ReadHoldingRegisters {
            address: 0,
            quantity: 2,
        };
        let frame = framed(&[0x03, 0x03, 0x02, 0x00, 0x2A]);
        assert!(decode_response(&req, 3, &frame).is_err());
    }
}
