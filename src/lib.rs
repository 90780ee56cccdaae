//! A USB CDC-ACM device for "USB FS" peripherals
//!
//! `usbfs-cdc` drives the full-speed USB device peripheral found in many
//! small microcontrollers: the one with toggle-on-write `EPnR` endpoint
//! registers and a packet memory area (PMA) described by a buffer
//! descriptor table. It answers enumeration, implements the CDC-ACM
//! class requests, and moves bytes over a bulk IN / bulk OUT pair, so
//! the device shows up as a virtual serial port.
//!
//! The packet memory must use the 1x16-bit access scheme: 1024 bytes of
//! contiguous 16-bit words, as on STM32F0 parts. Parts with the 2x16-bit
//! scheme, where each 16-bit word sits on a 32-bit stride (STM32F103, for
//! example), aren't supported.
//!
//! To interface the library, you must define a safe implementation of [`Peripherals`].
//! Then, create a [`Driver`], [`initialize()`](Driver::initialize) it, and call
//! [`on_interrupt()`](Driver::on_interrupt) from your USB interrupt handler.
//! If the main loop shares the driver with the interrupt, wrap it in a
//! [`SerialPort`].
//!
//! ```no_run
//! # struct Usb; unsafe impl usbfs_cdc::Peripherals for Usb {
//! #   fn usb(&self) -> *const () { 0x4000_5C00 as _ }
//! #   fn pma(&self) -> *const () { 0x4000_6000 as _ }
//! # }
//! use usbfs_cdc::{cdc::LineEvents, Descriptors, Driver};
//!
//! let mut driver = Driver::new(Usb, Descriptors::DEFAULT, LineEvents::new());
//! driver.initialize();
//!
//! // In the USB interrupt handler:
//! driver.on_interrupt();
//!
//! // In the main loop:
//! let mut buffer = [0; 64];
//! if let Ok(len) = driver.receive(&mut buffer) {
//!     driver.send(&buffer[..len]).ok();
//! }
//! ```

#![no_std]

#[cfg(test)]
extern crate std;

// defmt's macros expand to `::defmt` paths.
#[cfg(feature = "defmt-03")]
extern crate defmt_03 as defmt;

#[macro_use]
mod log;

mod buffer;
mod control;
mod device;
mod driver;
mod endpoint;
mod ral;
mod serial;
mod setup;
mod state;
mod status;
mod vcell;

#[cfg(test)]
mod emulator;

pub mod cdc;
pub mod descriptors;

pub use descriptors::Descriptors;
pub use driver::Driver;
pub use serial::SerialPort;
pub use usb_device::{device::UsbDeviceState, UsbError};

/// Number of hardware endpoints
pub const MAX_ENDPOINTS: usize = 8;

/// Maximum packet size for every endpoint, in bytes
///
/// This is also the size of each endpoint buffer in packet memory.
pub const MAX_PACKET_SIZE: usize = 64;

/// A type that owns the USB FS register blocks
///
/// An implementation of `Peripherals` is expected to own
///
/// - the USB registers (`EPnR`, `CNTR`, `ISTR`, `FNR`, `DADDR`, `BTABLE`)
/// - the packet memory area
///
/// # Safety
///
/// `Peripherals` should only be implemented on a type that
/// owns both register blocks. The pointers returned by the methods
/// are assumed to be valid, and will be cast to register
/// definitions. The packet memory is expected to be 1024 bytes
/// of 16-bit words.
///
/// # Example
///
/// A safe implementation of `Peripherals` over a peripheral access crate.
/// Assume that `pac` is your chip's PAC, which exposes a `USB` singleton.
///
/// ```
/// # mod pac {
/// #   pub struct USB { _priv: () }
/// #   impl USB { pub const PTR: *const () = 0x4000_5C00 as *const (); }
/// #   pub fn take() -> Option<USB> { Some(USB { _priv: () }) }
/// # }
/// use usbfs_cdc::Peripherals;
///
/// /// Packet memory base address
/// const PMA: *const () = 0x4000_6000 as *const ();
///
/// struct UsbFs {
///     _usb: pac::USB,
/// }
///
/// impl UsbFs {
///     /// Returns `None` if the USB peripheral is already taken
///     pub fn take() -> Option<UsbFs> {
///         Some(Self { _usb: pac::take()? })
///     }
/// }
///
/// unsafe impl Peripherals for UsbFs {
///     fn usb(&self) -> *const () {
///         pac::USB::PTR
///     }
///     fn pma(&self) -> *const () {
///         PMA
///     }
/// }
///
/// let usb = UsbFs::take().unwrap();
/// assert_eq!(usb.usb(), 0x4000_5C00 as *const ());
/// ```
pub unsafe trait Peripherals {
    /// Returns the address of the USB registers
    /// for this peripheral instance
    fn usb(&self) -> *const ();
    /// Returns the address of the packet memory area
    /// for this peripheral instance
    fn pma(&self) -> *const ();
}
