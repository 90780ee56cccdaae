use crate::{buffer::Buffer, status::Status};

/// Endpoint transfer type, encoded as `EPnR.EP_TYPE`
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u32)]
pub enum Kind {
    Bulk = 0,
    Control = 1,
    // Isochronous = 2,
    // Not implemented, no isochronous transfers on a serial port
    Interrupt = 3,
}

/// Which handler runs when an endpoint completes a transfer
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Handler {
    /// The control transfer engine
    Control,
    /// Latch completions for the application's data calls
    Passthrough,
}

bitflags::bitflags! {
    /// Events observed by one dispatch
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct Pending: u8 {
        /// An OUT or SETUP transaction completed
        const RX = 1 << 0;
        /// An IN transaction completed
        const TX = 1 << 1;
        /// The OUT transaction was a SETUP
        const SETUP = 1 << 2;
    }
}

impl Pending {
    fn from_status(status: &Status) -> Self {
        let mut pending = Pending::empty();
        pending.set(Pending::RX, status.ctr_rx());
        pending.set(Pending::TX, status.ctr_tx());
        pending.set(Pending::SETUP, status.setup());
        pending
    }
}

/// A USB endpoint
pub struct Endpoint {
    handler: Handler,
    tx: Buffer,
    rx: Buffer,
    rx_count: usize,
    pending: Pending,
    status: Status,
    /// An OUT packet is waiting for the application
    unread: bool,
    /// An IN packet is armed, and the host hasn't collected it
    tx_busy: bool,
}

impl Endpoint {
    pub fn new(handler: Handler, tx: Buffer, rx: Buffer) -> Self {
        Endpoint {
            handler,
            tx,
            rx,
            rx_count: 0,
            pending: Pending::empty(),
            status: Status::new(0),
            unread: false,
            tx_busy: false,
        }
    }

    pub fn handler(&self) -> Handler {
        self.handler
    }

    pub fn tx(&self) -> &Buffer {
        &self.tx
    }

    pub fn rx(&self) -> &Buffer {
        &self.rx
    }

    /// Bytes received by the most recent OUT or SETUP transaction
    pub fn rx_count(&self) -> usize {
        self.rx_count
    }

    pub fn set_rx_count(&mut self, rx_count: usize) {
        self.rx_count = rx_count.min(self.rx.len());
    }

    pub fn pending(&self) -> Pending {
        self.pending
    }

    pub fn status_mut(&mut self) -> &mut Status {
        &mut self.status
    }

    /// Load the endpoint register and receive count at the start of a dispatch
    ///
    /// Replaces any pending flags and status requests from the previous dispatch.
    pub fn snapshot(&mut self, epr: u32, rx_count: usize) {
        self.status = Status::new(epr);
        self.pending = Pending::from_status(&self.status);
        self.set_rx_count(rx_count);
    }

    /// Handle a completion for an endpoint that the application services
    ///
    /// The hardware NAKs further transactions in a completed direction, so
    /// there's nothing to change in the register. The application re-arms
    /// the endpoint when it reads or writes the next packet.
    pub fn passthrough(&mut self) {
        if self.pending.contains(Pending::RX) {
            self.unread = true;
        }
        if self.pending.contains(Pending::TX) {
            self.tx_busy = false;
        }
    }

    pub fn is_unread(&self) -> bool {
        self.unread
    }

    pub fn set_unread(&mut self, unread: bool) {
        self.unread = unread;
    }

    pub fn is_tx_busy(&self) -> bool {
        self.tx_busy
    }

    pub fn set_tx_busy(&mut self, tx_busy: bool) {
        self.tx_busy = tx_busy;
    }
}
