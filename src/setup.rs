//! SETUP packet decoding

use usb_device::{
    control::{Recipient, Request, RequestType},
    UsbDirection, UsbError,
};

/// Size of a SETUP packet
pub const SETUP_LEN: usize = 8;

/// `wValue` of a GET_DESCRIPTOR request: descriptor type in the high
/// byte, index in the low byte.
pub mod descriptor {
    pub const DEVICE: u16 = 0x0100;
    pub const CONFIGURATION: u16 = 0x0200;
    pub const STRING_LANGUAGE: u16 = 0x0300;
    pub const STRING_MANUFACTURER: u16 = 0x0301;
    pub const STRING_PRODUCT: u16 = 0x0302;
    pub const STRING_SERIAL: u16 = 0x0303;
    pub const DEVICE_QUALIFIER: u16 = 0x0600;
}

/// Parse a SETUP packet
///
/// Returns `ParseError` if there are fewer than eight bytes.
pub fn parse(packet: &[u8]) -> Result<Request, UsbError> {
    if packet.len() < SETUP_LEN {
        return Err(UsbError::ParseError);
    }

    let request_type = packet[0];
    Ok(Request {
        direction: UsbDirection::from(request_type),
        request_type: match (request_type >> 5) & 0b11 {
            0 => RequestType::Standard,
            1 => RequestType::Class,
            2 => RequestType::Vendor,
            _ => RequestType::Reserved,
        },
        recipient: match request_type & 0b1_1111 {
            0 => Recipient::Device,
            1 => Recipient::Interface,
            2 => Recipient::Endpoint,
            3 => Recipient::Other,
            _ => Recipient::Reserved,
        },
        request: packet[1],
        value: u16::from_le_bytes([packet[2], packet[3]]),
        index: u16::from_le_bytes([packet[4], packet[5]]),
        length: u16::from_le_bytes([packet[6], packet[7]]),
    })
}
