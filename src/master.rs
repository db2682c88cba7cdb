//! RTU master transaction engine
//!
//! One master owns one byte channel and one direction controller, and
//! runs one transaction at a time: encode, seize the bus, transmit,
//! release the bus, accumulate the response against a deadline, decode.
//! `execute` takes `&mut self`, so overlapping transactions are ruled
//! out at the type level.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tokio_serial::{DataBits, Parity, SerialPortBuilderExt, SerialStream, StopBits};
use tracing::{debug, trace, warn};

use crate::accumulator::{AccumulatorState, ResponseAccumulator};
use crate::config::RtuMasterConfig;
use crate::constants::RESPONSE_TIMEOUT_MS;
use crate::direction::DirectionController;
use crate::error::{RtuError, RtuResult};
use crate::frame::Request;
use crate::response::{decode_response, DecodedResult};

/// Modbus RTU master over any async byte channel
pub struct RtuMaster<S> {
    stream: S,
    direction: DirectionController,
    accumulator: ResponseAccumulator,
    unit_id: u8,
    response_timeout: Duration,
    stale_input: bool,
}

impl RtuMaster<SerialStream> {
    /// Open the configured serial port 8N1 and build the direction
    /// controller, falling back to a simulated pin when the GPIO is
    /// unavailable.
    pub fn open(config: &RtuMasterConfig) -> RtuResult<Self> {
        let stream = tokio_serial::new(&config.device, config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .open_native_async()?;

        debug!(device = %config.device, baud = config.baud_rate, "serial port opened");

        let direction = DirectionController::from_gpio(
            config.direction_gpio,
            &config.gpio_base_path,
            config.settle_delays(),
        )?;

        Ok(Self::new(stream, direction, config.unit_id)
            .with_response_timeout(config.response_timeout()))
    }
}

impl<S> RtuMaster<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S, direction: DirectionController, unit_id: u8) -> Self {
        Self {
            stream,
            direction,
            accumulator: ResponseAccumulator::new(),
            unit_id,
            response_timeout: Duration::from_millis(RESPONSE_TIMEOUT_MS),
            stale_input: false,
        }
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn unit_id(&self) -> u8 {
        self.unit_id
    }

    /// Run one complete transaction.
    ///
    /// An exception response decodes successfully as
    /// [`DecodedResult::Exception`]; the typed wrappers turn it into
    /// [`RtuError::Exception`] instead.
    pub async fn execute(&mut self, request: &Request) -> RtuResult<DecodedResult> {
        let frame = request.encode(self.unit_id)?;

        if self.stale_input {
            self.drain_stale_input().await?;
        }

        debug!(tx = %hex::encode(&frame), "sending request");

        self.accumulator.begin();

        let Self {
            stream, direction, ..
        } = self;

        direction
            .transmit_guarded(|| async move {
                stream
                    .write_all(&frame)
                    .await
                    .map_err(|e| RtuError::Write(e.to_string()))?;
                stream
                    .flush()
                    .await
                    .map_err(|e| RtuError::Write(e.to_string()))
            })
            .await?;

        self.accumulator.await_response();

        let deadline = self.response_timeout;
        let Self {
            stream, accumulator, ..
        } = self;
        let read_result = timeout(deadline, async {
            let mut chunk = [0u8; 64];
            loop {
                let n = stream
                    .read(&mut chunk)
                    .await
                    .map_err(RtuError::Io)?;
                if n == 0 {
                    return Err(RtuError::InvalidResponse(
                        "channel closed mid-response".to_string(),
                    ));
                }
                if accumulator.push(&chunk[..n]) == AccumulatorState::Complete {
                    return Ok(());
                }
            }
        })
        .await;

        match read_result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.accumulator.expire();
                self.stale_input = true;
                return Err(e);
            }
            Err(_) => {
                let buffered = self.accumulator.buffered().len();
                self.accumulator.expire();
                self.stale_input = true;
                warn!(
                    buffered,
                    timeout_ms = deadline.as_millis() as u64,
                    "response deadline expired"
                );
                return Err(RtuError::Timeout(deadline.as_millis() as u64));
            }
        }

        let response = self.accumulator.take_frame();
        debug!(rx = %hex::encode(&response), "response received");

        let decoded = decode_response(request, self.unit_id, &response)?;
        trace!(?decoded, "response decoded");
        Ok(decoded)
    }

    /// Discard bytes left over from a timed-out transaction so a late
    /// straggler response is not misread as the answer to the next
    /// request.
    async fn drain_stale_input(&mut self) -> RtuResult<()> {
        let mut discarded = 0usize;
        let mut chunk = [0u8; 64];

        loop {
            match timeout(Duration::from_millis(1), self.stream.read(&mut chunk)).await {
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => discarded += n,
                Ok(Err(e)) => return Err(RtuError::Io(e)),
                Err(_) => break,
            }
        }

        if discarded > 0 {
            warn!(discarded, "flushed stale bytes before transmit");
        }
        self.stale_input = false;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Typed operations
    // ------------------------------------------------------------------

    /// FC01 - read coil states
    pub async fn read_coils(&mut self, address: u16, quantity: u16) -> RtuResult<Vec<bool>> {
        let request = Request::ReadCoils { address, quantity };
        match self.execute(&request).await? {
            DecodedResult::Bits(bits) => Ok(bits),
            other => Err(unexpected(other)),
        }
    }

    /// FC02 - read discrete input states
    pub async fn read_discrete_inputs(
        &mut self,
        address: u16,
        quantity: u16,
    ) -> RtuResult<Vec<bool>> {
        let request = Request::ReadDiscreteInputs { address, quantity };
        match self.execute(&request).await? {
            DecodedResult::Bits(bits) => Ok(bits),
            other => Err(unexpected(other)),
        }
    }

    /// FC03 - read holding registers
    pub async fn read_holding_registers(
        &mut self,
        address: u16,
        quantity: u16,
    ) -> RtuResult<Vec<u16>> {
        let request = Request::ReadHoldingRegisters { address, quantity };
        match self.execute(&request).await? {
            DecodedResult::Registers(registers) => Ok(registers),
            other => Err(unexpected(other)),
        }
    }

    /// FC04 - read input registers
    pub async fn read_input_registers(
        &mut self,
        address: u16,
        quantity: u16,
    ) -> RtuResult<Vec<u16>> {
        let request = Request::ReadInputRegisters { address, quantity };
        match self.execute(&request).await? {
            DecodedResult::Registers(registers) => Ok(registers),
            other => Err(unexpected(other)),
        }
    }

    /// FC05 - switch a single coil
    pub async fn write_single_coil(&mut self, address: u16, value: bool) -> RtuResult<()> {
        let request = Request::WriteSingleCoil { address, value };
        match self.execute(&request).await? {
            DecodedResult::WriteEcho { .. } => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// FC06 - write a single register
    pub async fn write_single_register(&mut self, address: u16, value: u16) -> RtuResult<()> {
        let request = Request::WriteSingleRegister { address, value };
        match self.execute(&request).await? {
            DecodedResult::WriteEcho { .. } => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// FC15 - write a run of coils
    pub async fn write_multiple_coils(&mut self, address: u16, values: &[bool]) -> RtuResult<()> {
        let request = Request::WriteMultipleCoils {
            address,
            values: values.to_vec(),
        };
        match self.execute(&request).await? {
            DecodedResult::WriteEcho { .. } => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// FC16 - write a run of registers
    pub async fn write_multiple_registers(
        &mut self,
        address: u16,
        values: &[u16],
    ) -> RtuResult<()> {
        let request = Request::WriteMultipleRegisters {
            address,
            values: values.to_vec(),
        };
        match self.execute(&request).await? {
            DecodedResult::WriteEcho { .. } => Ok(()),
            other => Err(unexpected(other)),
        }
    }
}

fn unexpected(result: DecodedResult) -> RtuError {
    match result {
        DecodedResult::Exception(code) => RtuError::Exception(code),
        other => RtuError::InvalidResponse(format!("unexpected payload: {:?}", other)),
    }
}
