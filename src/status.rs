//! Endpoint register shadow
//!
//! `EPnR` mixes three kinds of bits. `EA`, `EP_TYPE` and `EP_KIND` are
//! plain read / write. `STAT_RX`, `STAT_TX`, `DTOG_RX` and `DTOG_TX`
//! toggle when written with one. `CTR_RX` and `CTR_TX` clear when written
//! with zero. A read-modify-write of the raw value flips every toggle bit
//! that happened to be set, so all endpoint register updates go through
//! [`Status`], which writes toggle fields as zero ("keep") unless a change
//! was requested.

use crate::{
    endpoint::Kind,
    ral::{self, endpoint::EPR},
};

/// Transfer status of one endpoint direction
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u32)]
pub enum Stat {
    /// The reset state; only ever read back
    #[allow(dead_code)]
    Disabled = 0b00,
    Stall = 0b01,
    Nak = 0b10,
    Valid = 0b11,
}

#[cfg(test)]
impl Stat {
    fn from_bits(bits: u32) -> Self {
        match bits & 0b11 {
            0b00 => Stat::Disabled,
            0b01 => Stat::Stall,
            0b10 => Stat::Nak,
            _ => Stat::Valid,
        }
    }
}

/// Shadow of an endpoint register
///
/// Created from a register read. Requests accumulate until
/// [`value()`](Status::value) produces the word to write back.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Status {
    epr: u32,
    stat_rx: Option<Stat>,
    stat_tx: Option<Stat>,
    reset_dtog_rx: bool,
    reset_dtog_tx: bool,
    clear_ctr_rx: bool,
    clear_ctr_tx: bool,
}

impl Status {
    pub const fn new(epr: u32) -> Self {
        Status {
            epr,
            stat_rx: None,
            stat_tx: None,
            reset_dtog_rx: false,
            reset_dtog_tx: false,
            clear_ctr_rx: false,
            clear_ctr_tx: false,
        }
    }

    pub fn ctr_rx(&self) -> bool {
        self.epr & EPR::CTR_RX::mask != 0
    }

    pub fn ctr_tx(&self) -> bool {
        self.epr & EPR::CTR_TX::mask != 0
    }

    pub fn setup(&self) -> bool {
        self.epr & EPR::SETUP::mask != 0
    }

    /// Returns the requested receive status, or the status that was read
    #[cfg(test)]
    pub fn stat_rx(&self) -> Stat {
        self.stat_rx.unwrap_or_else(|| {
            Stat::from_bits((self.epr & EPR::STAT_RX::mask) >> EPR::STAT_RX::offset)
        })
    }

    /// Returns the requested transmit status, or the status that was read
    #[cfg(test)]
    pub fn stat_tx(&self) -> Stat {
        self.stat_tx.unwrap_or_else(|| {
            Stat::from_bits((self.epr & EPR::STAT_TX::mask) >> EPR::STAT_TX::offset)
        })
    }

    pub fn set_stat_rx(&mut self, stat: Stat) {
        self.stat_rx = Some(stat);
    }

    pub fn set_stat_tx(&mut self, stat: Stat) {
        self.stat_tx = Some(stat);
    }

    /// Bring the receive data toggle back to DATA0
    pub fn reset_dtog_rx(&mut self) {
        self.reset_dtog_rx = true;
    }

    /// Bring the transmit data toggle back to DATA0
    pub fn reset_dtog_tx(&mut self) {
        self.reset_dtog_tx = true;
    }

    pub fn clear_ctr_rx(&mut self) {
        self.clear_ctr_rx = true;
    }

    pub fn clear_ctr_tx(&mut self) {
        self.clear_ctr_tx = true;
    }

    /// Replace the endpoint type and address
    ///
    /// These are plain fields, so they're written as given. Also clears `EP_KIND`.
    pub fn set_endpoint(&mut self, kind: Kind, address: u8) {
        self.epr &= !(EPR::EP_TYPE::mask | EPR::EP_KIND::mask | EPR::EA::mask);
        self.epr |= ((kind as u32) << EPR::EP_TYPE::offset) & EPR::EP_TYPE::mask;
        self.epr |= (address as u32) & EPR::EA::mask;
    }

    /// Compute the value to write into the endpoint register
    pub fn value(&self) -> u32 {
        let mut value = self.epr & (EPR::EA::mask | EPR::EP_TYPE::mask | EPR::EP_KIND::mask);

        if !self.clear_ctr_rx {
            value |= EPR::CTR_RX::mask;
        }
        if !self.clear_ctr_tx {
            value |= EPR::CTR_TX::mask;
        }

        if let Some(stat) = self.stat_rx {
            value |= (self.epr ^ ((stat as u32) << EPR::STAT_RX::offset)) & EPR::STAT_RX::mask;
        }
        if let Some(stat) = self.stat_tx {
            value |= (self.epr ^ ((stat as u32) << EPR::STAT_TX::offset)) & EPR::STAT_TX::mask;
        }

        // Writing the current toggle value flips it to zero.
        if self.reset_dtog_rx {
            value |= self.epr & EPR::DTOG_RX::mask;
        }
        if self.reset_dtog_tx {
            value |= self.epr & EPR::DTOG_TX::mask;
        }

        value
    }

    /// Write the status into the endpoint register
    pub fn commit(&self, epr: &ral::endpoint::Epr<'_>) {
        ral::write_reg!(ral::endpoint, epr, EPR, self.value());
    }
}

#[cfg(test)]
mod tests {
    use super::{Stat, Status, EPR};
    use crate::{emulator::apply, endpoint::Kind};

    const TOGGLES: u32 =
        EPR::STAT_RX::mask | EPR::STAT_TX::mask | EPR::DTOG_RX::mask | EPR::DTOG_TX::mask;

    #[test]
    fn keep_everything() {
        let hw = 0xFFFF & !EPR::SETUP::mask;
        let status = Status::new(hw);
        let value = status.value();
        assert_eq!(value & TOGGLES, 0);
        assert_eq!(apply(hw, value), hw);
    }

    #[test]
    fn requested_stat_only() {
        // Control endpoint, RX NAK, TX STALL, both toggles set.
        let hw = 0x0200 | 0b10 << 12 | 0b01 << 4 | EPR::DTOG_RX::mask | EPR::DTOG_TX::mask;
        let mut status = Status::new(hw);
        status.set_stat_tx(Stat::Valid);
        let after = apply(hw, status.value());

        assert_eq!(Status::new(after).stat_tx(), Stat::Valid);
        assert_eq!(Status::new(after).stat_rx(), Stat::Nak);
        assert_eq!(after & EPR::DTOG_RX::mask, EPR::DTOG_RX::mask);
        assert_eq!(after & EPR::DTOG_TX::mask, EPR::DTOG_TX::mask);
        assert_eq!(after & EPR::EP_TYPE::mask, 0x0200);
    }

    #[test]
    fn every_stat_transition() {
        const STATS: [Stat; 4] = [Stat::Disabled, Stat::Stall, Stat::Nak, Stat::Valid];
        for from in STATS {
            for to in STATS {
                let hw = (from as u32) << 12 | (from as u32) << 4;
                let mut status = Status::new(hw);
                status.set_stat_rx(to);
                let after = Status::new(apply(hw, status.value()));
                assert_eq!(after.stat_rx(), to);
                assert_eq!(after.stat_tx(), from);
            }
        }
    }

    #[test]
    fn reset_data_toggles() {
        let hw = EPR::DTOG_RX::mask | EPR::DTOG_TX::mask | 0b11 << 12;
        let mut status = Status::new(hw);
        status.reset_dtog_rx();
        status.reset_dtog_tx();
        let after = apply(hw, status.value());
        assert_eq!(after & (EPR::DTOG_RX::mask | EPR::DTOG_TX::mask), 0);
        assert_eq!(after & EPR::STAT_RX::mask, 0b11 << 12);

        // Already at DATA0; nothing flips.
        let status = {
            let mut status = Status::new(0);
            status.reset_dtog_rx();
            status
        };
        assert_eq!(status.value() & TOGGLES, 0);
    }

    #[test]
    fn completion_flags() {
        let hw = EPR::CTR_RX::mask | EPR::CTR_TX::mask | EPR::SETUP::mask;
        let status = Status::new(hw);
        assert!(status.ctr_rx() && status.ctr_tx() && status.setup());
        assert_eq!(apply(hw, status.value()), hw);

        let mut status = Status::new(hw);
        status.clear_ctr_rx();
        let after = apply(hw, status.value());
        assert_eq!(after & EPR::CTR_RX::mask, 0);
        assert_eq!(after & EPR::CTR_TX::mask, EPR::CTR_TX::mask);

        let mut status = Status::new(hw);
        status.clear_ctr_rx();
        status.clear_ctr_tx();
        assert_eq!(apply(hw, status.value()) & 0x8080, 0);
    }

    #[test]
    fn set_endpoint_fields() {
        let hw = 0x0100 | 0x0200 | 7;
        let mut status = Status::new(hw);
        status.set_endpoint(Kind::Interrupt, 3);
        let after = apply(hw, status.value());
        assert_eq!(after & 0x0F0F, 0x0600 | 3);
    }
}
