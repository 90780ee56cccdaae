//! Control endpoint transfers
//!
//! Endpoint 0 runs a small state machine. A SETUP stage always wins: it
//! abandons whatever transfer was in progress, decodes the request, and
//! queues the reply (or a zero length packet) for the IN data / status
//! stage. SET_LINE_CODING is the only request with an OUT data stage.
//!
//! Requests that we don't understand get an empty reply instead of a
//! STALL. Hosts move on from an empty descriptor faster than they recover
//! from a stalled control pipe.

use crate::{
    cdc::{self, Callbacks, LineCoding},
    descriptors::Descriptors,
    device::Device,
    endpoint::{Handler, Kind, Pending},
    ral::{self, usb},
    setup::{self, SETUP_LEN},
    state::EndpointTable,
    status::{Stat, Status},
    MAX_PACKET_SIZE,
};
use usb_device::{
    control::{Recipient, Request, RequestType},
    UsbDirection, UsbError,
};

const CONTROL_ENDPOINT: usize = 0;

/// Packet memory offset of the control endpoint's transmit buffer
pub const CONTROL_TX_OFFSET: u16 = 64;
/// Packet memory offset of the control endpoint's receive buffer
pub const CONTROL_RX_OFFSET: u16 = 192;

/// Data endpoints brought up by SET_CONFIGURATION: index, type, and the
/// transmit / receive buffer offsets.
const DATA_ENDPOINTS: [(usize, Kind, u16, u16); 3] = [
    (cdc::NOTIFICATION_ENDPOINT, Kind::Interrupt, 256, 320),
    (cdc::DATA_OUT_ENDPOINT, Kind::Bulk, 384, 448),
    (cdc::DATA_IN_ENDPOINT, Kind::Bulk, 512, 576),
];

/// Reply to every vendor IN request
const VENDOR_REPLY: u8 = 0x01;

/// GET_STATUS: bus powered, no remote wakeup, not halted
const STATUS_REPLY: [u8; 2] = [0, 0];

/// Everything the control endpoint touches during one dispatch
pub struct Context<'a, C> {
    pub usb: &'static usb::RegisterBlock,
    pub endpoints: &'a mut EndpointTable,
    pub device: &'a mut Device,
    pub descriptors: &'a Descriptors,
    pub callbacks: &'a mut C,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Stage {
    /// Waiting for the next SETUP, or finishing a status stage
    Idle,
    /// SET_LINE_CODING was accepted; the line coding arrives in the next OUT
    LineCoding,
}

/// The control endpoint state machine, and the CDC line coding it serves
pub struct Control {
    line_coding: LineCoding,
    stage: Stage,
}

impl Control {
    pub const fn new() -> Self {
        Control {
            line_coding: LineCoding::DEFAULT,
            stage: Stage::Idle,
        }
    }

    /// Abandon any transfer in progress
    ///
    /// The line coding survives a bus reset.
    pub fn reset(&mut self) {
        self.stage = Stage::Idle;
    }

    pub fn line_coding(&self) -> LineCoding {
        self.line_coding
    }

    /// Handle a completion on the control endpoint
    ///
    /// Call after the endpoint's snapshot, and before its commit. Status
    /// changes are requested on the endpoint's shadow.
    pub fn on_transfer<C: Callbacks>(&mut self, ctx: Context<'_, C>) -> Result<(), UsbError> {
        let pending = ctx
            .endpoints
            .endpoint(CONTROL_ENDPOINT)
            .ok_or(UsbError::InvalidEndpoint)?
            .pending();

        if pending.contains(Pending::RX | Pending::SETUP) {
            self.on_setup(ctx)
        } else if pending.contains(Pending::RX) {
            self.on_out(ctx)
        } else if pending.contains(Pending::TX) {
            self.on_in(ctx)
        } else {
            Ok(())
        }
    }

    fn on_setup<C: Callbacks>(&mut self, mut ctx: Context<'_, C>) -> Result<(), UsbError> {
        // Any SETUP ends the transfer in progress.
        self.stage = Stage::Idle;

        let mut packet = [0; SETUP_LEN];
        let request = ctx
            .endpoints
            .read(CONTROL_ENDPOINT, &mut packet)
            .and_then(|len| setup::parse(&packet[..len]));

        match request {
            Ok(request) => self.request(&request, &mut ctx)?,
            Err(_err) => {
                warn!("EP0 BAD SETUP {:?}", _err);
                zlp(ctx.endpoints)?;
            }
        }

        let status = status(ctx.endpoints)?;
        match self.stage {
            Stage::Idle => {
                status.set_stat_rx(Stat::Nak);
                status.set_stat_tx(Stat::Valid);
            }
            Stage::LineCoding => {
                status.set_stat_rx(Stat::Valid);
                status.set_stat_tx(Stat::Nak);
            }
        }
        Ok(())
    }

    fn request<C: Callbacks>(
        &mut self,
        request: &Request,
        ctx: &mut Context<'_, C>,
    ) -> Result<(), UsbError> {
        trace!(
            "EP0 SETUP {=u8:#x} {=u16:#x} {=u16}",
            request.request,
            request.value,
            request.length
        );
        match (request.direction, request.request_type, request.recipient) {
            (UsbDirection::In, RequestType::Standard, _) => standard_in(request, ctx),
            (UsbDirection::Out, RequestType::Standard, Recipient::Device) => {
                standard_out(request, ctx)
            }
            (UsbDirection::Out, RequestType::Standard, Recipient::Endpoint)
                if request.request == Request::CLEAR_FEATURE =>
            {
                zlp(ctx.endpoints)
            }
            (UsbDirection::In, RequestType::Vendor, _) => {
                reply(ctx.endpoints, request.length, &[VENDOR_REPLY])
            }
            (UsbDirection::Out, RequestType::Vendor, _) => zlp(ctx.endpoints),
            (_, RequestType::Class, Recipient::Interface) => self.class(request, ctx),
            _ => unknown(request, ctx.endpoints),
        }
    }

    fn class<C: Callbacks>(
        &mut self,
        request: &Request,
        ctx: &mut Context<'_, C>,
    ) -> Result<(), UsbError> {
        match request.request {
            cdc::GET_LINE_CODING => {
                reply(ctx.endpoints, request.length, &self.line_coding.to_bytes())
            }
            cdc::SET_LINE_CODING if request.length > 0 => {
                self.stage = Stage::LineCoding;
                Ok(())
            }
            cdc::SET_LINE_CODING => {
                warn!("EP0 SET_LINE_CODING WITHOUT DATA");
                zlp(ctx.endpoints)
            }
            cdc::SET_CONTROL_LINE_STATE => {
                debug!("CONTROL LINES {=u16:#x}", request.value);
                ctx.callbacks.on_control_line_state(request.value);
                zlp(ctx.endpoints)
            }
            cdc::SEND_BREAK => {
                debug!("BREAK {=u16}", request.value);
                ctx.callbacks.on_break();
                zlp(ctx.endpoints)
            }
            _ => unknown(request, ctx.endpoints),
        }
    }

    fn on_out<C: Callbacks>(&mut self, ctx: Context<'_, C>) -> Result<(), UsbError> {
        if self.stage == Stage::LineCoding {
            self.stage = Stage::Idle;

            let mut data = [0; MAX_PACKET_SIZE];
            let len = ctx.endpoints.read(CONTROL_ENDPOINT, &mut data)?;
            match LineCoding::from_bytes(&data[..len]) {
                Some(line_coding) => {
                    self.line_coding = line_coding;
                    debug!("LINE CODING {=u32} BAUD", line_coding.dte_rate);
                    ctx.callbacks.on_line_coding_changed(&line_coding);
                }
                None => {
                    warn!("EP0 SHORT LINE CODING {}", len);
                }
            }

            zlp(ctx.endpoints)?;
            let status = status(ctx.endpoints)?;
            status.set_stat_rx(Stat::Nak);
            status.set_stat_tx(Stat::Valid);
        } else {
            // Status stage of a control read, or a stray OUT. Either way,
            // expect a SETUP next.
            let status = status(ctx.endpoints)?;
            status.reset_dtog_rx();
            status.reset_dtog_tx();
            status.set_stat_rx(Stat::Valid);
            status.set_stat_tx(Stat::Stall);
        }
        Ok(())
    }

    fn on_in<C: Callbacks>(&mut self, ctx: Context<'_, C>) -> Result<(), UsbError> {
        // SET_ADDRESS takes effect once its status stage completes.
        let address = ctx.device.address();
        if ral::read_reg!(ral::usb, ctx.usb, DADDR, ADD) != u32::from(address) {
            ral::write_reg!(ral::usb, ctx.usb, DADDR, EF: 1, ADD: u32::from(address));
            ctx.device.addressed();
            debug!("ADDRESS {=u8}", address);
        }

        // A further IN token ends the data stage with a zero length packet.
        ctx.endpoints.write(CONTROL_ENDPOINT, &[])?;
        let status = status(ctx.endpoints)?;
        status.set_stat_rx(Stat::Valid);
        status.set_stat_tx(Stat::Valid);
        Ok(())
    }
}

impl Default for Control {
    fn default() -> Self {
        Self::new()
    }
}

fn standard_in<C>(request: &Request, ctx: &mut Context<'_, C>) -> Result<(), UsbError> {
    match request.request {
        Request::GET_DESCRIPTOR => match ctx.descriptors.get(request.value) {
            Some(descriptor) => reply(ctx.endpoints, request.length, descriptor),
            None => {
                warn!("EP0 NO DESCRIPTOR {=u16:#x}", request.value);
                zlp(ctx.endpoints)
            }
        },
        Request::GET_STATUS => reply(ctx.endpoints, request.length, &STATUS_REPLY),
        Request::GET_CONFIGURATION => {
            reply(ctx.endpoints, request.length, &[ctx.device.configuration()])
        }
        _ => unknown(request, ctx.endpoints),
    }
}

fn standard_out<C>(request: &Request, ctx: &mut Context<'_, C>) -> Result<(), UsbError> {
    match request.request {
        Request::SET_ADDRESS => {
            ctx.device.latch_address(request.value as u8);
            debug!("SET_ADDRESS {=u8}", ctx.device.address());
        }
        Request::SET_CONFIGURATION => {
            ctx.device.configure(request.value as u8);
            for (index, kind, tx_offset, rx_offset) in DATA_ENDPOINTS {
                ctx.endpoints
                    .configure_endpoint(index, kind, tx_offset, rx_offset, Handler::Passthrough)?;
            }
            debug!("CONFIGURED {=u8}", ctx.device.configuration());
        }
        _ => return unknown(request, ctx.endpoints),
    }
    zlp(ctx.endpoints)
}

fn status(endpoints: &mut EndpointTable) -> Result<&mut Status, UsbError> {
    endpoints
        .endpoint_mut(CONTROL_ENDPOINT)
        .map(|ep| ep.status_mut())
        .ok_or(UsbError::InvalidEndpoint)
}

/// Queue at most `length` bytes of `bytes` for the IN stage
fn reply(endpoints: &mut EndpointTable, length: u16, bytes: &[u8]) -> Result<(), UsbError> {
    let len = bytes.len().min(usize::from(length));
    endpoints.write(CONTROL_ENDPOINT, &bytes[..len])?;
    Ok(())
}

fn zlp(endpoints: &mut EndpointTable) -> Result<(), UsbError> {
    reply(endpoints, 0, &[])
}

fn unknown(request: &Request, endpoints: &mut EndpointTable) -> Result<(), UsbError> {
    let _ = request;
    warn!(
        "EP0 UNKNOWN REQUEST {=u8:#x} {=u16:#x} {=u16:#x}",
        request.request, request.value, request.index
    );
    zlp(endpoints)
}
