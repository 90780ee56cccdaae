//! Endpoint state, and the register operations that act on it
//!
//! Every `EPnR` write in the driver happens in this module.

use crate::{
    buffer::Buffer,
    endpoint::{Endpoint, Handler, Kind},
    ral::{self, pma, usb},
    status::{Stat, Status},
    MAX_ENDPOINTS, MAX_PACKET_SIZE,
};
use usb_device::UsbError;

// COUNT_RX for a 64 byte receive buffer: two 32 byte blocks.
const RX_BL_SIZE: u16 = 1;
const RX_NUM_BLOCK: u16 = 1;

/// The collection of endpoints, and the hardware that backs them
pub struct EndpointTable {
    usb: &'static usb::RegisterBlock,
    pma: &'static pma::RegisterBlock,
    endpoints: [Option<Endpoint>; MAX_ENDPOINTS],
}

impl EndpointTable {
    pub fn new(usb: &'static usb::RegisterBlock, pma: &'static pma::RegisterBlock) -> Self {
        const EP: Option<Endpoint> = None;
        EndpointTable {
            usb,
            pma,
            endpoints: [EP; MAX_ENDPOINTS],
        }
    }

    /// Acquire the endpoint
    ///
    /// Returns `None` if the endpoint isn't configured.
    pub fn endpoint(&self, index: usize) -> Option<&Endpoint> {
        self.endpoints.get(index)?.as_ref()
    }

    /// Acquire the mutable endpoint
    ///
    /// Returns `None` if the endpoint isn't configured.
    pub fn endpoint_mut(&mut self, index: usize) -> Option<&mut Endpoint> {
        self.endpoints.get_mut(index)?.as_mut()
    }

    fn try_endpoint(&self, index: usize) -> Result<&Endpoint, UsbError> {
        self.endpoint(index).ok_or(UsbError::InvalidEndpoint)
    }

    fn descriptor(&self, index: usize) -> &pma::BufferDescriptor {
        &self.pma.BTABLE[index]
    }

    /// Configure an endpoint, and bind its handler
    ///
    /// Sets the type and address, brings the receive side to VALID, the
    /// transmit side to NAK, both data toggles to DATA0, and clears any
    /// completion. Buffers are `MAX_PACKET_SIZE` bytes at the given packet
    /// memory offsets. Reconfiguring an endpoint replaces its record.
    pub fn configure_endpoint(
        &mut self,
        index: usize,
        kind: Kind,
        tx_offset: u16,
        rx_offset: u16,
        handler: Handler,
    ) -> Result<(), UsbError> {
        if index >= MAX_ENDPOINTS {
            warn!("EP{} DOES NOT EXIST", index);
            return Err(UsbError::InvalidEndpoint);
        }
        let tx = Buffer::new(self.pma, tx_offset, MAX_PACKET_SIZE)
            .ok_or(UsbError::EndpointMemoryOverflow)?;
        let rx = Buffer::new(self.pma, rx_offset, MAX_PACKET_SIZE)
            .ok_or(UsbError::EndpointMemoryOverflow)?;

        let epr = ral::endpoint::register(self.usb, index);
        let mut status = Status::new(ral::read_reg!(ral::endpoint, &epr, EPR));
        status.set_endpoint(kind, index as u8);
        status.set_stat_rx(Stat::Valid);
        status.set_stat_tx(Stat::Nak);
        status.reset_dtog_rx();
        status.reset_dtog_tx();
        status.clear_ctr_rx();
        status.clear_ctr_tx();
        status.commit(&epr);

        let descriptor = self.descriptor(index);
        ral::write_reg!(ral::pma, descriptor, ADDR_TX, tx_offset);
        ral::write_reg!(ral::pma, descriptor, COUNT_TX, 0);
        ral::write_reg!(ral::pma, descriptor, ADDR_RX, rx_offset);
        ral::write_reg!(ral::pma, descriptor, COUNT_RX, BL_SIZE: RX_BL_SIZE, NUM_BLOCK: RX_NUM_BLOCK);

        self.endpoints[index] = Some(Endpoint::new(handler, tx, rx));
        debug!("CONFIGURE EP{} TX {} RX {}", index, tx_offset, rx_offset);
        Ok(())
    }

    /// Forget every endpoint except the control endpoint
    pub fn release_data_endpoints(&mut self) {
        for ep in self.endpoints.iter_mut().skip(1) {
            *ep = None;
        }
    }

    /// Copy a packet into the endpoint's transmit buffer
    ///
    /// Use this while dispatching the endpoint; the dispatcher commits the
    /// status afterwards. Packets larger than `MAX_PACKET_SIZE` are truncated.
    pub fn write(&mut self, index: usize, bytes: &[u8]) -> Result<usize, UsbError> {
        let ep = self.try_endpoint(index)?;
        let bytes = if bytes.len() > MAX_PACKET_SIZE {
            warn!("EP{} WRITE {} TRUNCATED", index, bytes.len());
            &bytes[..MAX_PACKET_SIZE]
        } else {
            bytes
        };
        let written = ep.tx().volatile_write(bytes);
        ral::write_reg!(ral::pma, self.descriptor(index), COUNT_TX, written as u16);
        trace!("EP{} WRITE {}", index, written);
        Ok(written)
    }

    /// Copy a packet into the transmit buffer, and hand it to the hardware now
    ///
    /// The receive side goes to NAK, the transmit side to VALID. Completion
    /// flags are left as they are.
    pub fn write_and_arm(&mut self, index: usize, bytes: &[u8]) -> Result<usize, UsbError> {
        let written = self.write(index, bytes)?;
        let epr = ral::endpoint::register(self.usb, index);
        let mut status = Status::new(ral::read_reg!(ral::endpoint, &epr, EPR));
        status.set_stat_rx(Stat::Nak);
        status.set_stat_tx(Stat::Valid);
        status.commit(&epr);
        Ok(written)
    }

    /// Accept the next OUT packet on this endpoint now
    ///
    /// Completion flags and the transmit side are left as they are.
    pub fn arm_rx(&mut self, index: usize) -> Result<(), UsbError> {
        self.try_endpoint(index)?;
        let epr = ral::endpoint::register(self.usb, index);
        let mut status = Status::new(ral::read_reg!(ral::endpoint, &epr, EPR));
        status.set_stat_rx(Stat::Valid);
        status.commit(&epr);
        Ok(())
    }

    /// Copy the most recent OUT or SETUP packet into `out`
    ///
    /// Returns `BufferOverflow` if `out` can't hold the packet.
    pub fn read(&self, index: usize, out: &mut [u8]) -> Result<usize, UsbError> {
        let ep = self.try_endpoint(index)?;
        let count = ep.rx_count();
        if out.len() < count {
            warn!("EP{} READ {} INTO {}", index, count, out.len());
            return Err(UsbError::BufferOverflow);
        }
        Ok(ep.rx().volatile_read(&mut out[..count]))
    }

    /// Arm the endpoint for reception, and spin until a packet arrives
    ///
    /// Polls the hardware completion flag at most `budget` times. When the
    /// packet arrives, this call consumes the completion itself, so the
    /// dispatcher never sees it. Call this with the USB interrupt masked,
    /// or from within a dispatch of another endpoint; the interrupt
    /// doesn't need to run for this to make progress.
    ///
    /// Returns `WouldBlock` if the budget runs out.
    pub fn blocking_read(
        &mut self,
        index: usize,
        out: &mut [u8],
        budget: u32,
    ) -> Result<usize, UsbError> {
        self.try_endpoint(index)?;
        let epr = ral::endpoint::register(self.usb, index);

        // A stale completion isn't the packet we're waiting for.
        let mut status = Status::new(ral::read_reg!(ral::endpoint, &epr, EPR));
        status.set_stat_rx(Stat::Valid);
        status.set_stat_tx(Stat::Nak);
        status.clear_ctr_rx();
        status.commit(&epr);

        for _ in 0..budget {
            if ral::read_reg!(ral::endpoint, &epr, EPR, CTR_RX == 1) {
                let count = ral::read_reg!(ral::pma, self.descriptor(index), COUNT_RX, COUNT_RX);
                let mut status = Status::new(ral::read_reg!(ral::endpoint, &epr, EPR));
                status.clear_ctr_rx();
                status.commit(&epr);

                if let Some(ep) = self.endpoint_mut(index) {
                    ep.set_rx_count(count as usize);
                }
                return self.read(index, out);
            }
            core::hint::spin_loop();
        }

        warn!("EP{} READ TIMEOUT", index);
        Err(UsbError::WouldBlock)
    }

    /// Load an endpoint's register and receive count for a dispatch
    ///
    /// Returns the endpoint's handler. If the endpoint isn't configured,
    /// this clears its completion flags and returns `None`.
    pub fn snapshot(&mut self, index: usize) -> Option<Handler> {
        if index >= MAX_ENDPOINTS {
            warn!("EP{} DOES NOT EXIST", index);
            return None;
        }
        let epr = ral::endpoint::register(self.usb, index);
        let value = ral::read_reg!(ral::endpoint, &epr, EPR);
        let count = ral::read_reg!(ral::pma, self.descriptor(index), COUNT_RX, COUNT_RX);

        if let Some(ep) = self.endpoint_mut(index) {
            ep.snapshot(value, count as usize);
            Some(ep.handler())
        } else {
            warn!("EP{} NOT CONFIGURED {:#x}", index, value);
            let mut status = Status::new(value);
            status.clear_ctr_rx();
            status.clear_ctr_tx();
            status.commit(&epr);
            None
        }
    }

    /// Write the endpoint's status back to the hardware, ending a dispatch
    ///
    /// Clears both completion flags. Toggle fields change only if the
    /// handler requested it.
    pub fn commit(&mut self, index: usize) {
        let usb = self.usb;
        if let Some(ep) = self.endpoint_mut(index) {
            let status = ep.status_mut();
            status.clear_ctr_rx();
            status.clear_ctr_tx();
            status.commit(&ral::endpoint::register(usb, index));
        }
    }
}
