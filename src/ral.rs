//! Register access layer for the USB FS device peripheral
//!
//! There's no maintained RAL for this register family that exposes the
//! packet memory, so we describe the registers here. Every register is a
//! `VCell`, and every field follows the `ral-registers` layout (`offset`,
//! `mask`, and `R` / `W` / `RW` value modules), so that `read_reg!`,
//! `write_reg!`, and `modify_reg!` work as usual.
//!
//! Never use `modify_reg!` on an endpoint register. See the
//! [`Status`](crate::status::Status) documentation for the reason.

#![allow(non_snake_case, non_upper_case_globals)]
#![allow(clippy::declare_interior_mutable_const)] // Constant cells only seed arrays.

pub use ral_registers::{read_reg, write_reg};
#[cfg(test)]
pub use ral_registers::modify_reg;

/// Defines a RAL-compatible field module
macro_rules! field {
    ($ty:ty: $name:ident, $offset:expr, $width:expr) => {
        field!($ty: $name, $offset, $width, {});
    };
    ($ty:ty: $name:ident, $offset:expr, $width:expr, { $($value:ident = $v:expr),* $(,)? }) => {
        #[allow(dead_code)]
        pub mod $name {
            pub const offset: u32 = $offset;
            pub const mask: $ty = ((1 << $width) - 1) << offset;
            pub mod R {}
            pub mod W {}
            pub mod RW {
                $(pub const $value: $ty = $v;)*
            }
        }
    };
}

/// USB peripheral registers
pub mod usb {
    use crate::vcell::VCell;

    #[repr(C)]
    pub struct RegisterBlock {
        /// Endpoint registers; access them through [`super::endpoint::register`]
        pub EPR: [VCell<u32>; crate::MAX_ENDPOINTS],
        _reserved: [u32; 8],
        pub CNTR: VCell<u32>,
        pub ISTR: VCell<u32>,
        pub FNR: VCell<u32>,
        pub DADDR: VCell<u32>,
        pub BTABLE: VCell<u32>,
    }

    #[cfg(test)]
    impl RegisterBlock {
        pub const fn new() -> Self {
            const ZERO: VCell<u32> = VCell::new(0);
            RegisterBlock {
                EPR: [ZERO; crate::MAX_ENDPOINTS],
                _reserved: [0; 8],
                CNTR: ZERO,
                ISTR: ZERO,
                FNR: ZERO,
                DADDR: ZERO,
                BTABLE: ZERO,
            }
        }
    }

    pub mod CNTR {
        field!(u32: CTRM, 15, 1);
        field!(u32: PMAOVRM, 14, 1);
        field!(u32: ERRM, 13, 1);
        field!(u32: WKUPM, 12, 1);
        field!(u32: SUSPM, 11, 1);
        field!(u32: RESETM, 10, 1);
        field!(u32: SOFM, 9, 1);
        field!(u32: ESOFM, 8, 1);
        field!(u32: RESUME, 4, 1);
        field!(u32: FSUSP, 3, 1);
        field!(u32: LP_MODE, 2, 1);
        field!(u32: PDWN, 1, 1);
        field!(u32: FRES, 0, 1);
    }

    /// Interrupt status
    ///
    /// Event flags are `rc_w0`: write zero to clear, one to leave alone.
    /// `CTR` is read-only, and clears once the endpoint's CTR bits clear.
    pub mod ISTR {
        field!(u32: CTR, 15, 1);
        field!(u32: PMAOVR, 14, 1);
        field!(u32: ERR, 13, 1);
        field!(u32: WKUP, 12, 1);
        field!(u32: SUSP, 11, 1);
        field!(u32: RESET, 10, 1);
        field!(u32: SOF, 9, 1);
        field!(u32: ESOF, 8, 1);
        field!(u32: DIR, 4, 1);
        field!(u32: EP_ID, 0, 4);
    }

    pub mod FNR {
        field!(u32: RXDP, 15, 1);
        field!(u32: RXDM, 14, 1);
        field!(u32: LCK, 13, 1);
        field!(u32: LSOF, 11, 2);
        field!(u32: FN, 0, 11);
    }

    pub mod DADDR {
        field!(u32: EF, 7, 1);
        field!(u32: ADD, 0, 7);
    }

    pub mod BTABLE {
        field!(u32: BTABLE, 3, 13);
    }
}

/// The RAL API requires us to treat every endpoint register as unique.
/// We can make it a little easier with this function, the `Epr` type,
/// and the field module.
pub mod endpoint {
    use super::usb;
    use crate::vcell::VCell;

    pub struct Epr<'a> {
        pub EPR: &'a VCell<u32>,
    }

    /// Endpoint register fields
    ///
    /// `STAT_RX`, `STAT_TX`, `DTOG_RX` and `DTOG_TX` toggle when written
    /// with one. `CTR_RX` and `CTR_TX` are `rc_w0`. `SETUP` is read-only.
    pub mod EPR {
        field!(u32: CTR_RX, 15, 1);
        field!(u32: DTOG_RX, 14, 1);
        field!(u32: STAT_RX, 12, 2, { DISABLED = 0b00, STALL = 0b01, NAK = 0b10, VALID = 0b11 });
        field!(u32: SETUP, 11, 1);
        field!(u32: EP_TYPE, 9, 2, { BULK = 0b00, CONTROL = 0b01, ISO = 0b10, INTERRUPT = 0b11 });
        field!(u32: EP_KIND, 8, 1);
        field!(u32: CTR_TX, 7, 1);
        field!(u32: DTOG_TX, 6, 1);
        field!(u32: STAT_TX, 4, 2, { DISABLED = 0b00, STALL = 0b01, NAK = 0b10, VALID = 0b11 });
        field!(u32: EA, 0, 4);
    }

    /// # Panics
    ///
    /// Panics if `endpoint` is not less than [`MAX_ENDPOINTS`](crate::MAX_ENDPOINTS).
    pub fn register(usb: &usb::RegisterBlock, endpoint: usize) -> Epr<'_> {
        Epr {
            EPR: &usb.EPR[endpoint],
        }
    }
}

/// Packet memory area (PMA)
///
/// The buffer descriptor table sits at the start of packet memory
/// (`BTABLE` = 0). Endpoint buffers follow it. Offsets handed to the
/// hardware are byte offsets from the start of packet memory.
pub mod pma {
    use crate::vcell::VCell;

    /// Packet memory size, in bytes.
    pub const SIZE: usize = 1024;

    /// Bytes used by the buffer descriptor table.
    pub const BTABLE_SIZE: usize = crate::MAX_ENDPOINTS * core::mem::size_of::<BufferDescriptor>();

    #[repr(C)]
    pub struct BufferDescriptor {
        pub ADDR_TX: VCell<u16>,
        pub COUNT_TX: VCell<u16>,
        pub ADDR_RX: VCell<u16>,
        pub COUNT_RX: VCell<u16>,
    }

    #[repr(C)]
    pub struct RegisterBlock {
        pub BTABLE: [BufferDescriptor; crate::MAX_ENDPOINTS],
        pub SRAM: [VCell<u16>; (SIZE - BTABLE_SIZE) / 2],
    }

    #[cfg(test)]
    impl RegisterBlock {
        pub const fn new() -> Self {
            const ZERO: VCell<u16> = VCell::new(0);
            const DESCRIPTOR: BufferDescriptor = BufferDescriptor {
                ADDR_TX: ZERO,
                COUNT_TX: ZERO,
                ADDR_RX: ZERO,
                COUNT_RX: ZERO,
            };
            RegisterBlock {
                BTABLE: [DESCRIPTOR; crate::MAX_ENDPOINTS],
                SRAM: [ZERO; (SIZE - BTABLE_SIZE) / 2],
            }
        }
    }

    pub mod COUNT_TX {
        field!(u16: COUNT_TX, 0, 10);
    }

    pub mod COUNT_RX {
        field!(u16: BL_SIZE, 15, 1);
        field!(u16: NUM_BLOCK, 10, 5);
        field!(u16: COUNT_RX, 0, 10);
    }

    const _: () = assert!(core::mem::size_of::<RegisterBlock>() == SIZE);
}

const _: () = assert!(core::mem::size_of::<usb::RegisterBlock>() == 0x54);

/// Register block references, taken from a [`Peripherals`](crate::Peripherals)
/// implementation
pub struct Instances {
    pub usb: &'static usb::RegisterBlock,
    pub pma: &'static pma::RegisterBlock,
}

/// Converts the `Peripherals` pointers into register block references
pub fn instances<P: crate::Peripherals>(peripherals: P) -> Instances {
    // Safety: the Peripherals implementation promises that these pointers
    // reference the USB registers and the packet memory, and that it owns
    // them. Dropping `peripherals` leaves the driver as the only user.
    unsafe {
        Instances {
            usb: &*peripherals.usb().cast::<usb::RegisterBlock>(),
            pma: &*peripherals.pma().cast::<pma::RegisterBlock>(),
        }
    }
}
