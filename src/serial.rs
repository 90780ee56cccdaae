//! Interrupt-safe serial port

use crate::{
    cdc::{Callbacks, LineCoding},
    Driver,
};
use core::cell::RefCell;
use cortex_m::interrupt::{self, Mutex};
use usb_device::{device::UsbDeviceState, UsbError};

/// A [`Driver`] shared by the USB interrupt and the main loop
///
/// `SerialPort` is `Sync` when the callbacks are `Send`, so it can live in
/// a `static` that the interrupt handler reaches. Call [`on_interrupt()`](SerialPort::on_interrupt)
/// from the USB interrupt handler, and [`send()`](SerialPort::send) /
/// [`receive()`](SerialPort::receive) from anywhere else. Every call runs
/// in a critical section.
///
/// Make sure you've [`initialize`](Driver::initialize)d the driver before
/// wrapping it in `SerialPort`.
///
/// ```no_run
/// # struct Usb; unsafe impl usbfs_cdc::Peripherals for Usb {
/// #   fn usb(&self) -> *const () { 0x4000_5C00 as _ }
/// #   fn pma(&self) -> *const () { 0x4000_6000 as _ }
/// # }
/// use usbfs_cdc::{cdc::LineEvents, Descriptors, Driver, SerialPort, UsbDeviceState};
///
/// let mut driver = Driver::new(Usb, Descriptors::DEFAULT, LineEvents::new());
/// driver.initialize();
/// let port = SerialPort::new(driver);
///
/// // In the USB interrupt handler:
/// port.on_interrupt();
///
/// // In the main loop:
/// if port.state() == UsbDeviceState::Configured {
///     let mut buffer = [0; 64];
///     if let Ok(len) = port.receive(&mut buffer) {
///         port.send(&buffer[..len]).ok();
///     }
/// }
/// if let Some(line_coding) = port.with_callbacks(|events| events.take_line_coding()) {
///     let _baud = line_coding.dte_rate;
/// }
/// ```
pub struct SerialPort<C = ()> {
    driver: Mutex<RefCell<Driver<C>>>,
}

impl<C: Callbacks> SerialPort<C> {
    pub fn new(driver: Driver<C>) -> Self {
        SerialPort {
            driver: Mutex::new(RefCell::new(driver)),
        }
    }

    /// Interrupt-safe, immutable access to the driver
    fn with_driver<R>(&self, func: impl FnOnce(&Driver<C>) -> R) -> R {
        interrupt::free(|cs| {
            let driver = self.driver.borrow(cs);
            let driver = driver.borrow();
            func(&*driver)
        })
    }

    /// Interrupt-safe, mutable access to the driver
    fn with_driver_mut<R>(&self, func: impl FnOnce(&mut Driver<C>) -> R) -> R {
        interrupt::free(|cs| {
            let driver = self.driver.borrow(cs);
            let mut driver = driver.borrow_mut();
            func(&mut *driver)
        })
    }

    /// Service the USB interrupt
    pub fn on_interrupt(&self) {
        self.with_driver_mut(|driver| driver.on_interrupt());
    }

    /// See [`Driver::send`]
    pub fn send(&self, bytes: &[u8]) -> Result<usize, UsbError> {
        self.with_driver_mut(|driver| driver.send(bytes))
    }

    /// See [`Driver::receive`]
    pub fn receive(&self, buffer: &mut [u8]) -> Result<usize, UsbError> {
        self.with_driver_mut(|driver| driver.receive(buffer))
    }

    pub fn state(&self) -> UsbDeviceState {
        self.with_driver(|driver| driver.state())
    }

    pub fn line_coding(&self) -> LineCoding {
        self.with_driver(|driver| driver.line_coding())
    }

    /// Access the callbacks, for example to take latched [`LineEvents`](crate::cdc::LineEvents)
    pub fn with_callbacks<R>(&self, func: impl FnOnce(&mut C) -> R) -> R {
        self.with_driver_mut(|driver| func(driver.callbacks_mut()))
    }
}
