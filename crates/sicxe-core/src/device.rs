//! Device bus used by `RD`, `WD`, and `TD`.

use std::collections::{BTreeMap, VecDeque};

use thiserror::Error;

/// Device transport failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("device {device:#04X}: {message}")]
pub struct DeviceError {
    /// Device number addressed by the instruction.
    pub device: u8,
    /// Adapter-supplied description.
    pub message: String,
}

impl DeviceError {
    /// Creates an error for `device`.
    #[must_use]
    pub fn new(device: u8, message: impl Into<String>) -> Self {
        Self {
            device,
            message: message.into(),
        }
    }
}

/// Byte-wide device contract consumed by the execution engine.
pub trait DeviceBus {
    /// Tests whether `device` is ready for a transfer.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError`] when the adapter cannot answer.
    fn test(&mut self, device: u8) -> Result<bool, DeviceError>;

    /// Reads one byte from `device`.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError`] when the adapter cannot complete the read.
    fn read(&mut self, device: u8) -> Result<u8, DeviceError>;

    /// Writes one byte to `device`.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError`] when the adapter cannot complete the write.
    fn write(&mut self, device: u8, value: u8) -> Result<(), DeviceError>;
}

/// Devices that are always ready, read zero, and discard writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NullDevices;

impl DeviceBus for NullDevices {
    fn test(&mut self, _device: u8) -> Result<bool, DeviceError> {
        Ok(true)
    }

    fn read(&mut self, _device: u8) -> Result<u8, DeviceError> {
        Ok(0)
    }

    fn write(&mut self, _device: u8, _value: u8) -> Result<(), DeviceError> {
        Ok(())
    }
}

/// In-memory devices: queued input per device and captured output.
///
/// Reading a device whose input queue is empty yields zero.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BufferedDevices {
    input: BTreeMap<u8, VecDeque<u8>>,
    output: BTreeMap<u8, Vec<u8>>,
}

impl BufferedDevices {
    /// Creates devices with no queued input.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues bytes to be returned by `RD` on `device`.
    pub fn push_input(&mut self, device: u8, bytes: &[u8]) {
        self.input.entry(device).or_default().extend(bytes);
    }

    /// Bytes written to `device` so far.
    #[must_use]
    pub fn output(&self, device: u8) -> &[u8] {
        self.output.get(&device).map(Vec::as_slice).unwrap_or_default()
    }

    /// Iterates devices that received output, in device order.
    pub fn outputs(&self) -> impl Iterator<Item = (u8, &[u8])> {
        self.output.iter().map(|(device, bytes)| (*device, bytes.as_slice()))
    }
}

impl DeviceBus for BufferedDevices {
    fn test(&mut self, _device: u8) -> Result<bool, DeviceError> {
        Ok(true)
    }

    fn read(&mut self, device: u8) -> Result<u8, DeviceError> {
        Ok(self
            .input
            .get_mut(&device)
            .and_then(VecDeque::pop_front)
            .unwrap_or(0))
    }

    fn write(&mut self, device: u8, value: u8) -> Result<(), DeviceError> {
        self.output.entry(device).or_default().push(value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{BufferedDevices, DeviceBus, NullDevices};

    #[test]
    fn null_devices_accept_everything() {
        let mut devices = NullDevices;
        assert_eq!(devices.test(0xF1), Ok(true));
        assert_eq!(devices.read(0xF1), Ok(0));
        assert_eq!(devices.write(0x05, 0x41), Ok(()));
    }

    #[test]
    fn buffered_devices_queue_input_and_capture_output() {
        let mut devices = BufferedDevices::new();
        devices.push_input(0xF1, b"HI");
        assert_eq!(devices.read(0xF1), Ok(b'H'));
        assert_eq!(devices.read(0xF1), Ok(b'I'));
        assert_eq!(devices.read(0xF1), Ok(0));

        devices.write(0x05, b'O').unwrap();
        devices.write(0x05, b'K').unwrap();
        assert_eq!(devices.output(0x05), b"OK");
        assert_eq!(devices.output(0x06), b"");
        assert_eq!(devices.outputs().count(), 1);
    }
}
