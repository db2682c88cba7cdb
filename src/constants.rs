//! Modbus RTU protocol constants based on the official specification
//!
//! Frame size limits are inherited from the RS-485 ADU limit of 256 bytes:
//! ADU (256) - slave address (1) - CRC (2) = 253 bytes of PDU.

// ============================================================================
// Modbus Function Codes
// ============================================================================

/// Read Coils (FC01)
pub const FC_READ_COILS: u8 = 0x01;

/// Read Discrete Inputs (FC02)
pub const FC_READ_DISCRETE_INPUTS: u8 = 0x02;

/// Read Holding Registers (FC03)
pub const FC_READ_HOLDING_REGISTERS: u8 = 0x03;

/// Read Input Registers (FC04)
pub const FC_READ_INPUT_REGISTERS: u8 = 0x04;

/// Write Single Coil (FC05)
pub const FC_WRITE_SINGLE_COIL: u8 = 0x05;

/// Write Single Register (FC06)
pub const FC_WRITE_SINGLE_REGISTER: u8 = 0x06;

/// Write Multiple Coils (FC15)
pub const FC_WRITE_MULTIPLE_COILS: u8 = 0x0F;

/// Write Multiple Registers (FC16)
pub const FC_WRITE_MULTIPLE_REGISTERS: u8 = 0x10;

/// Exception flag bit set in the function code byte of exception responses
pub const EXCEPTION_FLAG: u8 = 0x80;

// ============================================================================
// Wire-format sentinels
// ============================================================================

/// Wire value for a coil switched ON (FC05)
pub const COIL_ON: u16 = 0xFF00;

/// Wire value for a coil switched OFF (FC05)
pub const COIL_OFF: u16 = 0x0000;

// ============================================================================
// Operation Limits
// ============================================================================

/// Maximum number of coils for FC15 (Write Multiple Coils)
///
/// Request PDU: FC(1) + address(2) + quantity(2) + byte count(1) +
/// ceil(N/8) coil bytes <= 253, and the byte-count field is a single byte.
/// The specification settles on 1968 (0x7B0).
pub const MAX_WRITE_COILS: usize = 1968;

/// Maximum number of registers for FC16 (Write Multiple Registers)
///
/// Request PDU: FC(1) + address(2) + quantity(2) + byte count(1) +
/// N*2 register bytes <= 253, therefore N <= 123.
pub const MAX_WRITE_REGISTERS: usize = 123;

/// Buffer size for receiving RTU frames (max ADU is 256 bytes; margin on top)
pub const RESPONSE_BUFFER_SIZE: usize = 512;

// ============================================================================
// Fixed frame lengths
// ============================================================================

/// Total length of an exception response: unit + FC|0x80 + code + CRC(2)
pub const EXCEPTION_FRAME_LEN: usize = 5;

/// Total length of every write echo response: unit + FC + addr(2) + value(2) + CRC(2)
pub const WRITE_ECHO_FRAME_LEN: usize = 8;

/// Header length shared by the read responses: unit + FC + byte count
pub const READ_HEADER_LEN: usize = 3;

/// CRC trailer length
pub const CRC_LEN: usize = 2;

// ============================================================================
// Timing defaults
// ============================================================================

/// Delay after raising the direction pin before the first byte is written.
/// Switching too early corrupts the leading bits of the frame.
pub const PRE_TRANSMIT_SETTLE_MS: u64 = 20;

/// Delay after the serial driver reports the frame drained, before the
/// direction pin is dropped. Releasing the bus too early clips the final
/// stop bit at the transceiver.
pub const POST_TRANSMIT_SETTLE_MS: u64 = 100;

/// Delay after dropping the direction pin back to receive.
pub const POST_RECEIVE_SETTLE_MS: u64 = 20;

/// Deadline for a complete response, measured from the end of transmission.
pub const RESPONSE_TIMEOUT_MS: u64 = 2000;

// ============================================================================
// Serial / hardware defaults
// ============================================================================

/// Default serial device (Raspberry Pi UART)
pub const DEFAULT_DEVICE: &str = "/dev/ttyAMA0";

/// Default baud rate
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default unit (slave) identifier
pub const DEFAULT_UNIT_ID: u8 = 3;

/// Default GPIO number driving the RS-485 DE/RE pair
pub const DEFAULT_DIRECTION_GPIO: u32 = 21;

/// Default sysfs GPIO base path
pub const DEFAULT_GPIO_BASE_PATH: &str = "/sys/class/gpio";
