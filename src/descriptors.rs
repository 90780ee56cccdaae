//! Descriptors served by the control endpoint
//!
//! The driver answers GET_DESCRIPTOR from a [`Descriptors`] set. Use
//! [`Descriptors::DEFAULT`] for a PL2303-compatible single interface
//! CDC-ACM function, or supply your own byte tables. The configuration
//! descriptor must describe the endpoints the driver configures: interrupt
//! IN on endpoint 1, bulk OUT on endpoint 2, and bulk IN on endpoint 3,
//! each with a 64 byte max packet size.
//!
//! Build string descriptors at compile time with [`string_descriptor!`](crate::string_descriptor).

use crate::setup::descriptor;

/// The descriptor tables for the device
#[derive(Clone, Copy, Debug)]
pub struct Descriptors {
    pub device: &'static [u8],
    pub device_qualifier: &'static [u8],
    /// Configuration descriptor, followed by its interface, functional
    /// and endpoint descriptors
    pub configuration: &'static [u8],
    /// String descriptor 0, the supported language IDs
    pub language: &'static [u8],
    /// String descriptor 1
    pub manufacturer: &'static [u8],
    /// String descriptor 2
    pub product: &'static [u8],
    /// String descriptor 3
    pub serial: &'static [u8],
}

#[rustfmt::skip]
const DEVICE: [u8; 18] = [
    18,         // bLength
    0x01,       // bDescriptorType: device
    0x00, 0x02, // bcdUSB: 2.00
    0x00,       // bDeviceClass: per interface
    0x00,       // bDeviceSubClass
    0x00,       // bDeviceProtocol
    64,         // bMaxPacketSize0
    0x7b, 0x06, // idVendor: 0x067b
    0x03, 0x23, // idProduct: 0x2303
    0x00, 0x01, // bcdDevice: 1.00
    1,          // iManufacturer
    2,          // iProduct
    0,          // iSerialNumber
    1,          // bNumConfigurations
];

#[rustfmt::skip]
const DEVICE_QUALIFIER: [u8; 10] = [
    10,         // bLength
    0x06,       // bDescriptorType: device qualifier
    0x00, 0x02, // bcdUSB: 2.00
    0x00,       // bDeviceClass
    0x00,       // bDeviceSubClass
    0x00,       // bDeviceProtocol
    64,         // bMaxPacketSize0
    1,          // bNumConfigurations
    0,          // bReserved
];

#[rustfmt::skip]
const CONFIGURATION: [u8; 53] = [
    9,          // bLength
    0x02,       // bDescriptorType: configuration
    53, 0,      // wTotalLength
    1,          // bNumInterfaces
    1,          // bConfigurationValue
    0,          // iConfiguration
    0x80,       // bmAttributes: bus powered
    50,         // bMaxPower: 100 mA

    // Interface
    9,          // bLength
    0x04,       // bDescriptorType: interface
    0,          // bInterfaceNumber
    0,          // bAlternateSetting
    3,          // bNumEndpoints
    0x02,       // bInterfaceClass: communications
    0x02,       // bInterfaceSubClass: abstract control model
    0x01,       // bInterfaceProtocol: AT commands
    0,          // iInterface

    // Header functional descriptor
    5,          // bFunctionLength
    0x24,       // bDescriptorType: CS_INTERFACE
    0x00,       // bDescriptorSubtype: header
    0x10, 0x01, // bcdCDC: 1.10

    // Call management functional descriptor
    5,          // bFunctionLength
    0x24,       // bDescriptorType: CS_INTERFACE
    0x01,       // bDescriptorSubtype: call management
    0x00,       // bmCapabilities
    0x01,       // bDataInterface

    // ACM functional descriptor
    4,          // bFunctionLength
    0x24,       // bDescriptorType: CS_INTERFACE
    0x02,       // bDescriptorSubtype: abstract control management
    0x02,       // bmCapabilities: line coding and serial state

    // Notification endpoint
    7,          // bLength
    0x05,       // bDescriptorType: endpoint
    0x81,       // bEndpointAddress: 1 IN
    0x03,       // bmAttributes: interrupt
    64, 0,      // wMaxPacketSize
    0x10,       // bInterval

    // Data IN endpoint
    7,          // bLength
    0x05,       // bDescriptorType: endpoint
    0x83,       // bEndpointAddress: 3 IN
    0x02,       // bmAttributes: bulk
    64, 0,      // wMaxPacketSize
    0,          // bInterval

    // Data OUT endpoint
    7,          // bLength
    0x05,       // bDescriptorType: endpoint
    0x02,       // bEndpointAddress: 2 OUT
    0x02,       // bmAttributes: bulk
    64, 0,      // wMaxPacketSize
    0,          // bInterval
];

#[rustfmt::skip]
const LANGUAGE: [u8; 4] = [
    4,          // bLength
    0x03,       // bDescriptorType: string
    0x09, 0x04, // wLANGID[0]: English (United States)
];

impl Descriptors {
    /// A PL2303-compatible serial port (VID 0x067b, PID 0x2303)
    pub const DEFAULT: Self = Descriptors {
        device: &DEVICE,
        device_qualifier: &DEVICE_QUALIFIER,
        configuration: &CONFIGURATION,
        language: &LANGUAGE,
        manufacturer: crate::string_descriptor!("Russia, SAO RAS"),
        product: crate::string_descriptor!("TSYS01 sensors controller"),
        serial: crate::string_descriptor!("0.01"),
    };

    /// Find the descriptor for a GET_DESCRIPTOR `wValue`
    pub fn get(&self, value: u16) -> Option<&'static [u8]> {
        match value {
            descriptor::DEVICE => Some(self.device),
            descriptor::CONFIGURATION => Some(self.configuration),
            descriptor::STRING_LANGUAGE => Some(self.language),
            descriptor::STRING_MANUFACTURER => Some(self.manufacturer),
            descriptor::STRING_PRODUCT => Some(self.product),
            descriptor::STRING_SERIAL => Some(self.serial),
            descriptor::DEVICE_QUALIFIER => Some(self.device_qualifier),
            _ => None,
        }
    }
}

impl Default for Descriptors {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Encode an ASCII string as a USB string descriptor
///
/// `N` must be `2 + 2 * text.len()`; evaluation panics otherwise. Prefer
/// [`string_descriptor!`](crate::string_descriptor), which computes `N`.
pub const fn string<const N: usize>(text: &str) -> [u8; N] {
    let text = text.as_bytes();
    assert!(N == 2 + 2 * text.len(), "descriptor size doesn't match the text");
    assert!(N <= 255, "string descriptor is too long");

    let mut descriptor = [0; N];
    descriptor[0] = N as u8;
    descriptor[1] = 0x03;
    let mut i = 0;
    while i < text.len() {
        descriptor[2 + 2 * i] = text[i];
        i += 1;
    }
    descriptor
}

/// Create a `&'static [u8]` string descriptor from an ASCII string literal
///
/// ```
/// const PRODUCT: &[u8] = usbfs_cdc::string_descriptor!("Hi");
/// assert_eq!(PRODUCT, &[6, 3, b'H', 0, b'i', 0]);
/// ```
#[macro_export]
macro_rules! string_descriptor {
    ($text:expr) => {{
        const TEXT: &str = $text;
        const LEN: usize = 2 + 2 * TEXT.len();
        const DESCRIPTOR: [u8; LEN] = $crate::descriptors::string::<LEN>(TEXT);
        &DESCRIPTOR
    }};
}
