//! Device address and enumeration state

use usb_device::device::UsbDeviceState;

/// Enumeration state of the device
///
/// The address from SET_ADDRESS is only latched here. The control
/// endpoint writes it into the hardware after the status stage, then
/// marks the device addressed.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Device {
    address: u8,
    state: UsbDeviceState,
    configuration: u8,
}

impl Device {
    pub const fn new() -> Self {
        Device {
            address: 0,
            state: UsbDeviceState::Default,
            configuration: 0,
        }
    }

    /// Return to the state after a bus reset
    pub fn reset(&mut self) {
        *self = Device::new();
    }

    pub fn state(&self) -> UsbDeviceState {
        self.state
    }

    /// The most recently latched address
    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn latch_address(&mut self, address: u8) {
        self.address = address & 0x7F;
    }

    /// The latched address is now in the hardware
    pub fn addressed(&mut self) {
        if self.state == UsbDeviceState::Default {
            self.state = UsbDeviceState::Addressed;
        }
    }

    /// Accept SET_CONFIGURATION, in any state
    pub fn configure(&mut self, configuration: u8) {
        self.configuration = configuration;
        self.state = UsbDeviceState::Configured;
    }

    /// The value from the last SET_CONFIGURATION
    pub fn configuration(&self) -> u8 {
        self.configuration
    }
}

impl Default for Device {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{Device, UsbDeviceState};

    #[test]
    fn enumerate() {
        let mut device = Device::new();
        assert_eq!(device.state(), UsbDeviceState::Default);

        device.latch_address(0x85);
        assert_eq!(device.address(), 5);
        assert_eq!(device.state(), UsbDeviceState::Default);

        device.addressed();
        assert_eq!(device.state(), UsbDeviceState::Addressed);

        device.configure(1);
        assert_eq!(device.state(), UsbDeviceState::Configured);
        assert_eq!(device.configuration(), 1);

        // A late address commit doesn't move us backwards.
        device.addressed();
        assert_eq!(device.state(), UsbDeviceState::Configured);
    }

    #[test]
    fn configure_from_default() {
        let mut device = Device::new();
        device.configure(1);
        assert_eq!(device.state(), UsbDeviceState::Configured);
    }

    #[test]
    fn reset() {
        let mut device = Device::new();
        device.latch_address(9);
        device.addressed();
        device.configure(1);
        device.reset();
        assert_eq!(device, Device::new());
        assert_eq!(device.address(), 0);
        assert_eq!(device.configuration(), 0);
    }
}
