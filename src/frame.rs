//! Request frame construction
//!
//! Every request is a complete RTU frame: unit identifier, function code,
//! big-endian data fields and the CRC trailer low byte first. Parameters
//! are validated against the protocol limits before any bytes are built,
//! so an invalid request never reaches the bus.

use crate::constants::*;
use crate::crc::append_crc;
use crate::error::{RtuError, RtuResult};

/// A master request, one variant per supported function code
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// FC01 - read `quantity` coils starting at `address`
    ReadCoils { address: u16, quantity: u16 },
    /// FC02 - read `quantity` discrete inputs starting at `address`
    ReadDiscreteInputs { address: u16, quantity: u16 },
    /// FC03 - read `quantity` holding registers starting at `address`
    ReadHoldingRegisters { address: u16, quantity: u16 },
    /// FC04 - read `quantity` input registers starting at `address`
    ReadInputRegisters { address: u16, quantity: u16 },
    /// FC05 - switch the coil at `address` on or off
    WriteSingleCoil { address: u16, value: bool },
    /// FC06 - write `value` to the register at `address`
    WriteSingleRegister { address: u16, value: u16 },
    /// FC15 - write a run of coils starting at `address`
    WriteMultipleCoils { address: u16, values: Vec<bool> },
    /// FC16 - write a run of registers starting at `address`
    WriteMultipleRegisters { address: u16, values: Vec<u16> },
}

impl Request {
    /// Function code carried on the wire for this request
    pub fn function_code(&self) -> u8 {
        match self {
            Request::ReadCoils { .. } => FC_READ_COILS,
            Request::ReadDiscreteInputs { .. } => FC_READ_DISCRETE_INPUTS,
            Request::ReadHoldingRegisters { .. } => FC_READ_HOLDING_REGISTERS,
            Request::ReadInputRegisters { .. } => FC_READ_INPUT_REGISTERS,
            Request::WriteSingleCoil { .. } => FC_WRITE_SINGLE_COIL,
            Request::WriteSingleRegister { .. } => FC_WRITE_SINGLE_REGISTER,
            Request::WriteMultipleCoils { .. } => FC_WRITE_MULTIPLE_COILS,
            Request::WriteMultipleRegisters { .. } => FC_WRITE_MULTIPLE_REGISTERS,
        }
    }

    /// True for the read function codes, whose responses carry a byte count
    pub fn is_read(&self) -> bool {
        matches!(
            self,
            Request::ReadCoils { .. }
                | Request::ReadDiscreteInputs { .. }
                | Request::ReadHoldingRegisters { .. }
                | Request::ReadInputRegisters { .. }
        )
    }

    /// Starting address of the request
    pub fn address(&self) -> u16 {
        match self {
            Request::ReadCoils { address, .. }
            | Request::ReadDiscreteInputs { address, .. }
            | Request::ReadHoldingRegisters { address, .. }
            | Request::ReadInputRegisters { address, .. }
            | Request::WriteSingleCoil { address, .. }
            | Request::WriteSingleRegister { address, .. }
            | Request::WriteMultipleCoils { address, .. }
            | Request::WriteMultipleRegisters { address, .. } => *address,
        }
    }

    /// The 16-bit value field a write response must echo, when one is
    /// checked at all.
    ///
    /// Single writes echo the written value; multi-writes echo the
    /// quantity, which field devices report inconsistently, so it is not
    /// validated. Reads have no echo.
    pub fn expected_echo_value(&self) -> Option<u16> {
        match self {
            Request::WriteSingleCoil { value, .. } => {
                Some(if *value { COIL_ON } else { COIL_OFF })
            }
            Request::WriteSingleRegister { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// Build the complete RTU frame for this request, CRC included
    pub fn encode(&self, unit_id: u8) -> RtuResult<Vec<u8>> {
        self.validate()?;

        let mut frame = Vec::with_capacity(16);
        frame.push(unit_id);
        frame.push(self.function_code());

        match self {
            Request::ReadCoils { address, quantity }
            | Request::ReadDiscreteInputs { address, quantity }
            | Request::ReadHoldingRegisters { address, quantity }
            | Request::ReadInputRegisters { address, quantity } => {
                frame.extend_from_slice(&address.to_be_bytes());
                frame.extend_from_slice(&quantity.to_be_bytes());
            }
            Request::WriteSingleCoil { address, value } => {
                let wire = if *value { COIL_ON } else { COIL_OFF };
                frame.extend_from_slice(&address.to_be_bytes());
                frame.extend_from_slice(&wire.to_be_bytes());
            }
            Request::WriteSingleRegister { address, value } => {
                frame.extend_from_slice(&address.to_be_bytes());
                frame.extend_from_slice(&value.to_be_bytes());
            }
            Request::WriteMultipleCoils { address, values } => {
                let quantity = values.len() as u16;
                let byte_count = values.len().div_ceil(8);
                frame.extend_from_slice(&address.to_be_bytes());
                frame.extend_from_slice(&quantity.to_be_bytes());
                frame.push(byte_count as u8);
                frame.extend_from_slice(&pack_bits(values));
            }
            Request::WriteMultipleRegisters { address, values } => {
                let quantity = values.len() as u16;
                frame.extend_from_slice(&address.to_be_bytes());
                frame.extend_from_slice(&quantity.to_be_bytes());
                frame.push((values.len() * 2) as u8);
                for value in values {
                    frame.extend_from_slice(&value.to_be_bytes());
                }
            }
        }

        append_crc(&mut frame);
        Ok(frame)
    }

    fn validate(&self) -> RtuResult<()> {
        match self {
            Request::ReadCoils { quantity, .. }
            | Request::ReadDiscreteInputs { quantity, .. } => {
                if *quantity == 0 || *quantity as usize > MAX_WRITE_COILS {
                    return Err(RtuError::InvalidRequest(format!(
                        "bit read quantity {} out of range 1..={}",
                        quantity, MAX_WRITE_COILS
                    )));
                }
            }
            Request::ReadHoldingRegisters { quantity, .. }
            | Request::ReadInputRegisters { quantity, .. } => {
                if *quantity == 0 || *quantity as usize > MAX_WRITE_REGISTERS {
                    return Err(RtuError::InvalidRequest(format!(
                        "register read quantity {} out of range 1..={}",
                        quantity, MAX_WRITE_REGISTERS
                    )));
                }
            }
            Request::WriteMultipleCoils { values, .. } => {
                if values.is_empty() || values.len() > MAX_WRITE_COILS {
                    return Err(RtuError::InvalidRequest(format!(
                        "coil write count {} out of range 1..={}",
                        values.len(),
                        MAX_WRITE_COILS
                    )));
                }
            }
            Request::WriteMultipleRegisters { values, .. } => {
                if values.is_empty() || values.len() > MAX_WRITE_REGISTERS {
                    return Err(RtuError::InvalidRequest(format!(
                        "register write count {} out of range 1..={}",
                        values.len(),
                        MAX_WRITE_REGISTERS
                    )));
                }
            }
            Request::WriteSingleCoil { .. } | Request::WriteSingleRegister { .. } => {}
        }
        Ok(())
    }
}

/// Pack coil states LSB first: the first coil lands in bit 0 of the first
/// byte. Trailing bits of the last byte stay zero.
fn pack_bits(values: &[bool]) -> Vec<u8> {
    let mut bytes = vec![0u8; values.len().div_ceil(8)];
    for (i, &on) in values.iter().enumerate() {
        if on {
            bytes[i / 8] |= 1 << (i % 8);
        }
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_holding_registers_frame() {
        let req = Request::ReadHoldingRegisters {
            address: 0,
            quantity: 1,
        };
        let frame = req.encode(1).unwrap();
        assert_eq!(frame, vec![0x01, 0x03, 0x00, 0x00, 0x00, 0x01, 0x84, 0x0A]);
    }

    #[test]
    fn test_read_coils_frame() {
        let req = Request::ReadCoils {
            address: 0x0013,
            quantity: 0x0025,
        };
        let frame = req.encode(0x11).unwrap();
        assert_eq!(frame[..6], [0x11, 0x01, 0x00, 0x13, 0x00, 0x25]);
        assert_eq!(frame.len(), 8);
    }

    #[test]
    fn test_all_read_requests_are_eight_bytes() {
        let requests = [
            Request::ReadCoils { address: 5, quantity: 16 },
            Request::ReadDiscreteInputs { address: 5, quantity: 16 },
            Request::ReadHoldingRegisters { address: 5, quantity: 16 },
            Request::ReadInputRegisters { address: 5, quantity: 16 },
        ];
        for req in requests {
            assert_eq!(req.encode(1).unwrap().len(), 8);
        }
    }

    #[test]
    fn test_write_single_coil_sentinels() {
        let on = Request::WriteSingleCoil {
            address: 0x00AC,
            value: true,
        };
        let frame = on.encode(0x11).unwrap();
        assert_eq!(frame[..6], [0x11, 0x05, 0x00, 0xAC, 0xFF, 0x00]);

        let off = Request::WriteSingleCoil {
            address: 0x00AC,
            value: false,
        };
        let frame = off.encode(0x11).unwrap();
        assert_eq!(frame[..6], [0x11, 0x05, 0x00, 0xAC, 0x00, 0x00]);
    }

    #[test]
    fn test_write_single_register_frame() {
        let req = Request::WriteSingleRegister {
            address: 0x0001,
            value: 0x0003,
        };
        let frame = req.encode(0x11).unwrap();
        assert_eq!(frame[..6], [0x11, 0x06, 0x00, 0x01, 0x00, 0x03]);
    }

    #[test]
    fn test_write_multiple_coils_bit_packing() {
        // 10 coils: CD 01 from the reference documents, LSB first
        let values = vec![
            true, false, true, true, false, false, true, true, // 0xCD
            true, false, // 0x01
        ];
        let req = Request::WriteMultipleCoils {
            address: 0x0013,
            values,
        };
        let frame = req.encode(0x11).unwrap();
        assert_eq!(
            frame[..9],
            [0x11, 0x0F, 0x00, 0x13, 0x00, 0x0A, 0x02, 0xCD, 0x01]
        );
    }

    #[test]
    fn test_write_multiple_registers_frame() {
        let req = Request::WriteMultipleRegisters {
            address: 0x0001,
            values: vec![0x000A, 0x0102],
        };
        let frame = req.encode(0x11).unwrap();
        assert_eq!(
            frame[..11],
            [0x11, 0x10, 0x00, 0x01, 0x00, 0x02, 0x04, 0x00, 0x0A, 0x01, 0x02]
        );
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let req = Request::ReadCoils {
            address: 0,
            quantity: 0,
        };
        assert!(matches!(req.encode(1), Err(RtuError::InvalidRequest(_))));
    }

    #[test]
    fn test_register_read_limit() {
        let ok = Request::ReadHoldingRegisters {
            address: 0,
            quantity: 123,
        };
        assert!(ok.encode(1).is_ok());

        let too_many = Request::ReadHoldingRegisters {
            address: 0,
            quantity: 124,
        };
        assert!(matches!(
            too_many.encode(1),
            Err(RtuError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_multi_write_limits() {
        let coils = Request::WriteMultipleCoils {
            address: 0,
            values: vec![false; MAX_WRITE_COILS + 1],
        };
        assert!(coils.encode(1).is_err());

        let regs = Request::WriteMultipleRegisters {
            address: 0,
            values: vec![],
        };
        assert!(regs.encode(1).is_err());
    }

    #[test]
    fn test_expected_echo_value() {
        let coil = Request::WriteSingleCoil {
            address: 1,
            value: true,
        };
        assert_eq!(coil.expected_echo_value(), Some(0xFF00));

        let reg = Request::WriteSingleRegister {
            address: 1,
            value: 0x1234,
        };
        assert_eq!(reg.expected_echo_value(), Some(0x1234));

        let multi = Request::WriteMultipleRegisters {
            address: 1,
            values: vec![1, 2],
        };
        assert_eq!(multi.expected_echo_value(), None);

        let read = Request::ReadCoils {
            address: 0,
            quantity: 8,
        };
        assert_eq!(read.expected_echo_value(), None);
    }
}
