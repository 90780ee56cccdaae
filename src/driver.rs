//! USB driver
//!
//! The driver owns the peripheral, the endpoint table, and the control
//! endpoint state machine. Everything happens in [`Driver::on_interrupt`]:
//! a bus reset brings the device back to its default state, and a transfer
//! completion is dispatched to the endpoint's handler. The application
//! moves serial data with [`send()`](Driver::send) and [`receive()`](Driver::receive).

use crate::{
    cdc::{self, Callbacks, LineCoding},
    control::{self, Context, Control},
    descriptors::Descriptors,
    device::Device,
    endpoint::{Handler, Kind},
    ral::{self, usb},
    state::EndpointTable,
    MAX_PACKET_SIZE,
};
use usb_device::{device::UsbDeviceState, UsbError};

/// A USB CDC-ACM device driver
///
/// After you create a `Driver` with [`new()`](Driver::new), you must
///
/// - call [`initialize()`](Driver::initialize) once
/// - call [`on_interrupt()`](Driver::on_interrupt) whenever the USB interrupt fires
///
/// `C` receives class events from the host; see [`Callbacks`].
pub struct Driver<C = ()> {
    usb: &'static usb::RegisterBlock,
    endpoints: EndpointTable,
    device: Device,
    control: Control,
    descriptors: Descriptors,
    callbacks: C,
}

// Safety: the driver is the only owner of the register blocks it
// references (see `Peripherals`). Moving it to another execution
// context moves that ownership along.
unsafe impl<C: Send> Send for Driver<C> {}

impl<C: Callbacks> Driver<C> {
    /// Create a new `Driver`
    ///
    /// Creation doesn't touch the hardware. Call [`initialize()`](Driver::initialize) next.
    pub fn new<P: crate::Peripherals>(
        peripherals: P,
        descriptors: Descriptors,
        callbacks: C,
    ) -> Self {
        let ral::Instances { usb, pma } = ral::instances(peripherals);
        Driver {
            usb,
            endpoints: EndpointTable::new(usb, pma),
            device: Device::new(),
            control: Control::new(),
            descriptors,
            callbacks,
        }
    }

    /// Reset the USB core, and enable the transfer and reset interrupts
    ///
    /// Assumes that the USB clock is running, and that the pull-up on D+
    /// is handled elsewhere. The device becomes usable after the host's
    /// first bus reset.
    pub fn initialize(&mut self) {
        // Force a reset with the transceiver powered.
        ral::write_reg!(ral::usb, self.usb, CNTR, FRES: 1);
        ral::write_reg!(ral::usb, self.usb, CNTR, 0);

        ral::write_reg!(ral::usb, self.usb, BTABLE, 0);
        ral::write_reg!(ral::usb, self.usb, ISTR, 0);
        ral::write_reg!(ral::usb, self.usb, CNTR, CTRM: 1, RESETM: 1);
        ral::write_reg!(ral::usb, self.usb, DADDR, EF: 1);
        debug!("INITIALIZED");
    }

    /// Service the USB interrupt
    ///
    /// Handles a bus reset if one is pending. Otherwise, handles at most
    /// one endpoint completion; if more are pending, the interrupt fires
    /// again.
    pub fn on_interrupt(&mut self) {
        if ral::read_reg!(ral::usb, self.usb, ISTR, RESET == 1) {
            self.on_reset();
        }
        if ral::read_reg!(ral::usb, self.usb, ISTR, CTR == 1) {
            self.on_transfer();
        }
    }

    fn on_reset(&mut self) {
        ral::write_reg!(ral::usb, self.usb, CNTR, CTRM: 1, RESETM: 1);
        ral::write_reg!(ral::usb, self.usb, ISTR, 0);

        self.endpoints.release_data_endpoints();
        if let Err(_err) = self.endpoints.configure_endpoint(
            0,
            Kind::Control,
            control::CONTROL_TX_OFFSET,
            control::CONTROL_RX_OFFSET,
            Handler::Control,
        ) {
            warn!("EP0 CONFIGURE {:?}", _err);
        }
        ral::write_reg!(ral::usb, self.usb, DADDR, EF: 1);

        self.device.reset();
        self.control.reset();
        debug!("RESET");
    }

    fn on_transfer(&mut self) {
        let index = ral::read_reg!(ral::usb, self.usb, ISTR, EP_ID) as usize;
        let handler = match self.endpoints.snapshot(index) {
            Some(handler) => handler,
            None => return,
        };

        match handler {
            Handler::Control => {
                let ctx = Context {
                    usb: self.usb,
                    endpoints: &mut self.endpoints,
                    device: &mut self.device,
                    descriptors: &self.descriptors,
                    callbacks: &mut self.callbacks,
                };
                if let Err(_err) = self.control.on_transfer(ctx) {
                    warn!("EP{} TRANSFER {:?}", index, _err);
                }
            }
            Handler::Passthrough => {
                if let Some(ep) = self.endpoints.endpoint_mut(index) {
                    trace!("EP{} PASSTHROUGH {=u8:#x}", index, ep.pending().bits());
                    ep.passthrough();
                }
            }
        }

        self.endpoints.commit(index);
    }

    /// Queue one packet of serial data for the host
    ///
    /// Sends at most [`MAX_PACKET_SIZE`] bytes, and returns how many were
    /// queued. Returns `InvalidState` before the host configures the device,
    /// and `WouldBlock` while the previous packet is still waiting for the
    /// host.
    pub fn send(&mut self, bytes: &[u8]) -> Result<usize, UsbError> {
        if self.device.state() != UsbDeviceState::Configured {
            return Err(UsbError::InvalidState);
        }
        let ep = self
            .endpoints
            .endpoint(cdc::DATA_IN_ENDPOINT)
            .ok_or(UsbError::InvalidEndpoint)?;
        if ep.is_tx_busy() {
            return Err(UsbError::WouldBlock);
        }

        let len = bytes.len().min(MAX_PACKET_SIZE);
        let written = self
            .endpoints
            .write_and_arm(cdc::DATA_IN_ENDPOINT, &bytes[..len])?;
        if let Some(ep) = self.endpoints.endpoint_mut(cdc::DATA_IN_ENDPOINT) {
            ep.set_tx_busy(true);
        }
        Ok(written)
    }

    /// Take the latest packet of serial data from the host
    ///
    /// Returns the number of bytes copied into `buffer`. Returns `WouldBlock`
    /// if there's nothing new, and `BufferOverflow` if `buffer` is too small
    /// for the packet; the packet stays available for another try. A
    /// `buffer` of [`MAX_PACKET_SIZE`] bytes always fits.
    pub fn receive(&mut self, buffer: &mut [u8]) -> Result<usize, UsbError> {
        if self.device.state() != UsbDeviceState::Configured {
            return Err(UsbError::InvalidState);
        }
        let ep = self
            .endpoints
            .endpoint(cdc::DATA_OUT_ENDPOINT)
            .ok_or(UsbError::InvalidEndpoint)?;
        if !ep.is_unread() {
            return Err(UsbError::WouldBlock);
        }

        let read = self.endpoints.read(cdc::DATA_OUT_ENDPOINT, buffer)?;
        if let Some(ep) = self.endpoints.endpoint_mut(cdc::DATA_OUT_ENDPOINT) {
            ep.set_unread(false);
        }
        self.endpoints.arm_rx(cdc::DATA_OUT_ENDPOINT)?;
        Ok(read)
    }

    /// Wait for the next OUT packet on the control endpoint
    ///
    /// Polls the hardware at most `budget` times, without the interrupt.
    /// Returns `WouldBlock` if nothing arrives in time. Only use this
    /// when the USB interrupt can't run, and no control transfer is in
    /// progress.
    pub fn blocking_read_control(
        &mut self,
        buffer: &mut [u8],
        budget: u32,
    ) -> Result<usize, UsbError> {
        self.endpoints.blocking_read(0, buffer, budget)
    }

    pub fn state(&self) -> UsbDeviceState {
        self.device.state()
    }

    /// The line coding from the host's most recent SET_LINE_CODING
    ///
    /// Until the host sends one, this is [`LineCoding::DEFAULT`].
    pub fn line_coding(&self) -> LineCoding {
        self.control.line_coding()
    }

    pub fn callbacks(&self) -> &C {
        &self.callbacks
    }

    pub fn callbacks_mut(&mut self) -> &mut C {
        &mut self.callbacks
    }
}
