//! Host-side model of the USB FS peripheral, for tests
//!
//! Registers live in leaked RAM blocks. The driver reads and writes them
//! like it would the real peripheral. After every driver call, [`Hardware::sync`]
//! replays any endpoint register write through the hardware's write rules
//! and stores the result, so the next read sees what the peripheral would
//! hold. The host side of each transaction is simulated by the other methods.

use crate::{
    cdc::Callbacks,
    ral::{endpoint::EPR, pma, usb},
    status::{Stat, Status},
    Descriptors, Driver, Peripherals, MAX_ENDPOINTS,
};
use std::{boxed::Box, thread, time::Duration, vec::Vec};

const PLAIN: u32 = EPR::EA::mask | EPR::EP_TYPE::mask | EPR::EP_KIND::mask;
const TOGGLES: u32 =
    EPR::STAT_RX::mask | EPR::STAT_TX::mask | EPR::DTOG_RX::mask | EPR::DTOG_TX::mask;
const COMPLETIONS: u32 = EPR::CTR_RX::mask | EPR::CTR_TX::mask;

/// The endpoint register value after writing `written` to a register holding `hw`
pub fn apply(hw: u32, written: u32) -> u32 {
    (written & PLAIN)
        | ((hw ^ written) & TOGGLES)
        | (hw & written & COMPLETIONS)
        | (hw & EPR::SETUP::mask)
}

struct Blocks {
    usb: &'static usb::RegisterBlock,
    pma: &'static pma::RegisterBlock,
}

unsafe impl Peripherals for Blocks {
    fn usb(&self) -> *const () {
        (self.usb as *const usb::RegisterBlock).cast()
    }
    fn pma(&self) -> *const () {
        (self.pma as *const pma::RegisterBlock).cast()
    }
}

pub struct Hardware {
    pub usb: &'static usb::RegisterBlock,
    pub pma: &'static pma::RegisterBlock,
    epr: [u32; MAX_ENDPOINTS],
}

impl Hardware {
    pub fn new() -> Self {
        Hardware {
            usb: Box::leak(Box::new(usb::RegisterBlock::new())),
            pma: Box::leak(Box::new(pma::RegisterBlock::new())),
            epr: [0; MAX_ENDPOINTS],
        }
    }

    /// Create a driver that owns these registers
    pub fn driver<C: Callbacks>(&self, callbacks: C) -> Driver<C> {
        self.driver_with(Descriptors::DEFAULT, callbacks)
    }

    /// Create a driver that answers with other descriptors
    pub fn driver_with<C: Callbacks>(&self, descriptors: Descriptors, callbacks: C) -> Driver<C> {
        let blocks = Blocks {
            usb: self.usb,
            pma: self.pma,
        };
        Driver::new(blocks, descriptors, callbacks)
    }

    /// Apply any endpoint register writes made since the last sync
    pub fn sync(&mut self) {
        for (hw, epr) in self.epr.iter_mut().zip(self.usb.EPR.iter()) {
            let written = epr.read();
            if written != *hw {
                *hw = apply(*hw, written);
                epr.write(*hw);
            }
        }
    }

    pub fn epr(&self, index: usize) -> u32 {
        self.epr[index]
    }

    /// Force the hardware state of an endpoint register
    pub fn set_epr(&mut self, index: usize, value: u32) {
        self.epr[index] = value;
        self.usb.EPR[index].write(value);
    }

    pub fn stat_rx(&self, index: usize) -> Stat {
        Status::new(self.epr[index]).stat_rx()
    }

    pub fn stat_tx(&self, index: usize) -> Stat {
        Status::new(self.epr[index]).stat_tx()
    }

    /// The address the peripheral answers to
    pub fn address(&self) -> u32 {
        self.usb.DADDR.read() & 0x7F
    }

    fn rx_offset(&self, index: usize) -> usize {
        (self.pma.BTABLE[index].ADDR_RX.read() as usize - pma::BTABLE_SIZE) / 2
    }

    fn tx_offset(&self, index: usize) -> usize {
        (self.pma.BTABLE[index].ADDR_TX.read() as usize - pma::BTABLE_SIZE) / 2
    }

    /// Store an OUT or SETUP packet, and signal its completion
    ///
    /// Doesn't check whether the endpoint would have accepted it.
    pub fn receive(&mut self, index: usize, data: &[u8], setup: bool) {
        let start = self.rx_offset(index);
        for (word, chunk) in self.pma.SRAM[start..].iter().zip(data.chunks(2)) {
            word.write(u16::from_le_bytes([chunk[0], chunk.get(1).copied().unwrap_or(0)]));
        }
        let count = &self.pma.BTABLE[index].COUNT_RX;
        count.write((count.read() & !0x3FF) | data.len() as u16);

        let mut epr = self.epr[index];
        epr |= EPR::CTR_RX::mask;
        if setup {
            epr |= EPR::SETUP::mask;
        } else {
            epr &= !EPR::SETUP::mask;
            epr ^= EPR::DTOG_RX::mask;
        }
        epr = (epr & !EPR::STAT_RX::mask) | (Stat::Nak as u32) << EPR::STAT_RX::offset;
        self.set_epr(index, epr);
        self.usb.ISTR.write(1 << 15 | index as u32);
    }

    /// Like [`receive()`](Hardware::receive), but from another thread, once the
    /// driver has written the endpoint register
    pub fn receive_later(&self, index: usize, data: &[u8]) -> thread::JoinHandle<()> {
        let usb = self.usb as *const usb::RegisterBlock as usize;
        let pma = self.pma as *const pma::RegisterBlock as usize;
        let before = self.epr;
        let data = data.to_vec();
        thread::spawn(move || {
            // Safety: test-only. The blocks are leaked, and the other thread
            // only polls the endpoint register while we write.
            let mut hw = Hardware {
                usb: unsafe { &*(usb as *const usb::RegisterBlock) },
                pma: unsafe { &*(pma as *const pma::RegisterBlock) },
                epr: before,
            };
            while hw.usb.EPR[index].read() == before[index] {
                thread::yield_now();
            }
            thread::sleep(Duration::from_millis(1));
            hw.sync();
            hw.receive(index, &data, false);
        })
    }

    /// Collect an IN packet, and signal its completion
    ///
    /// Returns `None` if the endpoint isn't ready to transmit.
    pub fn transmit(&mut self, index: usize) -> Option<Vec<u8>> {
        if self.stat_tx(index) != Stat::Valid {
            return None;
        }
        let count = (self.pma.BTABLE[index].COUNT_TX.read() & 0x3FF) as usize;
        let start = self.tx_offset(index);
        let data: Vec<u8> = self.pma.SRAM[start..]
            .iter()
            .flat_map(|word| word.read().to_le_bytes())
            .take(count)
            .collect();

        let mut epr = self.epr[index] | EPR::CTR_TX::mask;
        epr ^= EPR::DTOG_TX::mask;
        epr = (epr & !EPR::STAT_TX::mask) | (Stat::Nak as u32) << EPR::STAT_TX::offset;
        self.set_epr(index, epr);
        self.usb.ISTR.write(1 << 15 | 1 << 4 | index as u32);
        Some(data)
    }

    /// Run the interrupt handler, then apply its register writes
    pub fn interrupt<C: Callbacks>(&mut self, driver: &mut Driver<C>) {
        driver.on_interrupt();
        self.sync();
        // CTR follows the endpoint completion flags.
        if self.epr.iter().all(|epr| epr & COMPLETIONS == 0) {
            self.usb.ISTR.write(self.usb.ISTR.read() & !(1 << 15));
        }
    }

    /// Signal a bus reset
    pub fn bus_reset<C: Callbacks>(&mut self, driver: &mut Driver<C>) {
        for index in 0..MAX_ENDPOINTS {
            self.set_epr(index, 0);
        }
        self.usb.DADDR.write(0);
        self.usb.ISTR.write(1 << 10);
        self.interrupt(driver);
    }

    /// Send a SETUP packet to endpoint 0, and run the interrupt
    pub fn setup<C: Callbacks>(&mut self, driver: &mut Driver<C>, packet: [u8; 8]) {
        self.receive(0, &packet, true);
        self.interrupt(driver);
    }

    /// Send an OUT packet, and run the interrupt
    ///
    /// Returns `false` if the endpoint NAKs or STALLs the packet.
    pub fn out<C: Callbacks>(&mut self, driver: &mut Driver<C>, index: usize, data: &[u8]) -> bool {
        if self.stat_rx(index) != Stat::Valid {
            return false;
        }
        self.receive(index, data, false);
        self.interrupt(driver);
        true
    }

    /// Collect an IN packet, and run the interrupt
    ///
    /// Returns `None` if the endpoint NAKs or STALLs the IN token.
    pub fn in_<C: Callbacks>(&mut self, driver: &mut Driver<C>, index: usize) -> Option<Vec<u8>> {
        let data = self.transmit(index)?;
        self.interrupt(driver);
        Some(data)
    }

    /// A control read: SETUP, one IN data packet, then the OUT status stage
    pub fn control_in<C: Callbacks>(&mut self, driver: &mut Driver<C>, packet: [u8; 8]) -> Vec<u8> {
        self.setup(driver, packet);
        let data = self.in_(driver, 0).expect("data stage");
        assert!(self.out(driver, 0, &[]), "status stage");
        data
    }

    /// A control write: SETUP, an optional OUT data packet, then the IN status stage
    pub fn control_out<C: Callbacks>(&mut self, driver: &mut Driver<C>, packet: [u8; 8], data: &[u8]) {
        self.setup(driver, packet);
        if !data.is_empty() {
            assert!(self.out(driver, 0, data), "data stage");
        }
        let status = self.in_(driver, 0).expect("status stage");
        assert!(status.is_empty(), "status stage carries no data");
    }

    /// Reset, then walk through SET_ADDRESS and SET_CONFIGURATION
    pub fn enumerate<C: Callbacks>(&mut self, driver: &mut Driver<C>) {
        self.bus_reset(driver);
        self.control_out(driver, [0x00, 0x05, 7, 0, 0, 0, 0, 0], &[]);
        self.control_out(driver, [0x00, 0x09, 1, 0, 0, 0, 0, 0], &[]);
    }
}
