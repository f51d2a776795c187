//! Protocol Engine (C5): drives the connect → publish sequence, dispatches
//! inbound messages, and enforces Window Acknowledgement accounting.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::amf0::{decode_amf0_values, Amf0Value};
use crate::chunk::ChunkReader;
use crate::error::RtmpError;
use crate::flv;
use crate::message::MessageType;
use crate::protocol::commands;
use crate::protocol::control::{self, user_control_event};
use crate::protocol::session::Session;
use crate::protocol::state::PublishState;
use crate::protocol::transaction::TransactionKind;
use crate::protocol::writer_lane::WriterLane;
use crate::transport::RtmpReadHalf;

const OUTBOUND_WINDOW_ACK_SIZE: u32 = 2_500_000;

/// Something the dispatch loop wants the caller (the Supervisor's reader
/// thread) to react to. Most inbound messages are handled entirely inside
/// the engine and produce `None`.
#[derive(Debug)]
pub enum EngineEvent {
    PublishStarted { stream_id: u32 },
    PublishRejected(RtmpError),
    None,
}

pub struct ProtocolEngine {
    session: Session,
    reader: ChunkReader<RtmpReadHalf>,
    writer: Arc<WriterLane>,
    out_chunk_size: usize,
    last_inbound_at: Arc<Mutex<Instant>>,
}

impl ProtocolEngine {
    /// `last_inbound_at` is shared with the Supervisor's keep-alive lane,
    /// which has no other way to observe traffic on the dispatch thread's
    /// `Session` (§4.7: "if no inbound bytes for >= idle threshold, send a
    /// ping").
    pub fn new(
        session: Session,
        reader: ChunkReader<RtmpReadHalf>,
        writer: Arc<WriterLane>,
        out_chunk_size: usize,
        last_inbound_at: Arc<Mutex<Instant>>,
    ) -> Self {
        Self {
            session,
            reader,
            writer,
            out_chunk_size,
            last_inbound_at,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Sends WindowAckSize, SetChunkSize, then `connect` (§4.5 step 1).
    /// Must be called once, right after the handshake completes.
    pub fn begin_connect_sequence(&mut self) -> Result<(), RtmpError> {
        self.session.state = PublishState::Connecting;
        self.writer.send(&control::window_ack_size(OUTBOUND_WINDOW_ACK_SIZE))?;

        self.writer.send(&control::set_chunk_size(self.out_chunk_size as u32))?;
        self.writer.set_chunk_size(self.out_chunk_size);
        self.session.chunk_size_out = self.out_chunk_size;

        let tx = self.session.transactions.begin(TransactionKind::Connect);
        let msg = commands::connect(tx, &self.session.endpoint)?;
        self.writer.send(&msg)?;
        Ok(())
    }

    /// Reads and dispatches exactly one inbound message, blocking until one
    /// is available. Accounts bytes read and emits an Acknowledgement when
    /// the threshold is crossed (§4.5 "Window Acknowledgement policy").
    pub fn dispatch_once(&mut self) -> Result<EngineEvent, RtmpError> {
        let msg = self.reader.read_message()?;
        *self.last_inbound_at.lock().expect("last inbound mutex poisoned") = Instant::now();

        if self.session.record_bytes_read(msg.payload.len()) {
            self.writer.send(&control::acknowledgement(self.session.ack_sequence()))?;
        }

        match msg.message_type {
            MessageType::SetChunkSize => {
                if let Some(size) = control::parse_u32_control(&msg.payload) {
                    self.reader.set_chunk_size(size as usize);
                    self.session.chunk_size_in = size as usize;
                    debug!(size, "peer changed inbound chunk size");
                }
                Ok(EngineEvent::None)
            }
            MessageType::Acknowledgement => {
                debug!("received acknowledgement from peer");
                Ok(EngineEvent::None)
            }
            MessageType::UserControl => self.handle_user_control(msg.payload),
            MessageType::WindowAckSize => {
                if let Some(window) = control::parse_u32_control(&msg.payload) {
                    self.session.peer_window = Some(window);
                    debug!(window, "peer advertised window ack size");
                }
                Ok(EngineEvent::None)
            }
            MessageType::SetPeerBandwidth => {
                debug!("peer set bandwidth, no reply required");
                Ok(EngineEvent::None)
            }
            MessageType::AbortMessage => {
                debug!("peer sent abort message, no reply required");
                Ok(EngineEvent::None)
            }
            MessageType::CommandMessageAmf0 => self.handle_command(msg.payload),
            MessageType::Audio | MessageType::Video | MessageType::DataMessageAmf0 | MessageType::AggregateMessage => {
                let message_type = msg.message_type;
                warn!(?message_type, "unexpected inbound media message on a publish-only session");
                Ok(EngineEvent::None)
            }
        }
    }

    fn handle_user_control(&mut self, payload: bytes::Bytes) -> Result<EngineEvent, RtmpError> {
        let Some((event_type, data)) = control::parse_user_control(payload) else {
            warn!("truncated user control event, dropping");
            return Ok(EngineEvent::None);
        };

        match event_type {
            user_control_event::STREAM_BEGIN => debug!("stream begin"),
            user_control_event::STREAM_EOF => debug!("stream eof"),
            user_control_event::PING_REQUEST => {
                self.writer.send(&control::ping_response(data))?;
            }
            user_control_event::PING_RESPONSE => {
                debug!("ping response received, peer is alive");
            }
            other => debug!(event_type = other, "unhandled user control event"),
        }
        Ok(EngineEvent::None)
    }

    fn handle_command(&mut self, payload: bytes::Bytes) -> Result<EngineEvent, RtmpError> {
        let values = decode_amf0_values(payload)?;
        let Some(name) = values.first().and_then(Amf0Value::as_str) else {
            return Err(RtmpError::ProtocolInvariant("command message missing name".to_string()));
        };
        let name = name.to_string();
        let tx_id = values.get(1).and_then(Amf0Value::as_f64).unwrap_or(0.0);

        match name.as_str() {
            "_result" => self.handle_result(tx_id, &values),
            "_error" => self.handle_error(tx_id, &values),
            "onStatus" => self.handle_on_status(&values),
            other => {
                debug!(command = other, "ignoring unrecognized command");
                Ok(EngineEvent::None)
            }
        }
    }

    fn handle_result(&mut self, tx_id: f64, values: &[Amf0Value]) -> Result<EngineEvent, RtmpError> {
        let Some(kind) = self.session.transactions.complete(tx_id) else {
            debug!(tx_id, "_result for unknown or already-completed transaction");
            return Ok(EngineEvent::None);
        };

        match kind {
            TransactionKind::Connect => {
                self.session.state = PublishState::Connected;
                info!("connect accepted, starting stream creation sequence");

                let tx = self.session.transactions.begin(TransactionKind::ReleaseStream);
                self.writer.send(&commands::release_stream(tx, self.session.stream_key())?)?;

                let tx = self.session.transactions.begin(TransactionKind::FcPublish);
                self.writer.send(&commands::fc_publish(tx, self.session.stream_key())?)?;

                self.session.state = PublishState::Creating;
                let tx = self.session.transactions.begin(TransactionKind::CreateStream);
                self.writer.send(&commands::create_stream(tx)?)?;
                Ok(EngineEvent::None)
            }
            TransactionKind::CreateStream => {
                let stream_id = values.get(3).and_then(Amf0Value::as_f64).unwrap_or(0.0) as u32;
                self.session.stream_id = Some(stream_id);
                self.session.state = PublishState::CreatedPendingPublish;
                info!(stream_id, "stream created, publishing");
                self.writer
                    .send(&commands::publish(self.session.stream_key(), stream_id)?)?;
                Ok(EngineEvent::None)
            }
            TransactionKind::ReleaseStream | TransactionKind::FcPublish | TransactionKind::DeleteStream => {
                debug!(?kind, "ignoring optional-command result");
                Ok(EngineEvent::None)
            }
        }
    }

    fn handle_error(&mut self, tx_id: f64, values: &[Amf0Value]) -> Result<EngineEvent, RtmpError> {
        let Some(kind) = self.session.transactions.complete(tx_id) else {
            debug!(tx_id, "_error for unknown or already-completed transaction");
            return Ok(EngineEvent::None);
        };

        let description = values
            .get(3)
            .and_then(|v| v.object_get("description"))
            .and_then(Amf0Value::as_str)
            .unwrap_or("no description")
            .to_string();
        let code = values
            .get(3)
            .and_then(|v| v.object_get("code"))
            .and_then(Amf0Value::as_str)
            .unwrap_or("UnknownError")
            .to_string();

        warn!(?kind, code, description, "command rejected by server");
        if matches!(kind, TransactionKind::ReleaseStream | TransactionKind::FcPublish) {
            // Best-effort commands some servers don't implement at all.
            return Ok(EngineEvent::None);
        }

        self.session.state = PublishState::Closing;
        Ok(EngineEvent::PublishRejected(RtmpError::CommandRejected { code, description }))
    }

    fn handle_on_status(&mut self, values: &[Amf0Value]) -> Result<EngineEvent, RtmpError> {
        let Some(info) = values.get(3) else {
            return Ok(EngineEvent::None);
        };
        let Some(code) = info.object_get("code").and_then(Amf0Value::as_str) else {
            return Ok(EngineEvent::None);
        };

        if code == "NetStream.Publish.Start" {
            let stream_id = self.session.stream_id.unwrap_or(0);
            self.session.state = PublishState::Publishing;
            info!(stream_id, "publish started");
            return Ok(EngineEvent::PublishStarted { stream_id });
        }

        if code == "NetStream.Publish.BadName" || code.to_lowercase().contains("error") || code.to_lowercase().contains("fail") {
            warn!(code, "publish rejected by onStatus");
            self.session.state = PublishState::Closing;
            return Ok(EngineEvent::PublishRejected(RtmpError::CommandRejected {
                code: code.to_string(),
                description: "rejected via onStatus".to_string(),
            }));
        }

        debug!(code, "onStatus event, no state transition");
        Ok(EngineEvent::None)
    }

    /// Sends the one-time `@setDataFrame("onMetaData", ...)` tag. Must be
    /// called synchronously from within the `on_publish_started` reaction,
    /// before the Media Pump starts producing (§5 ordering guarantee).
    pub fn send_metadata(&self, metadata: &flv::StreamMetadata) -> Result<(), RtmpError> {
        let stream_id = self.session.stream_id.unwrap_or(0);
        let payload = flv::build_on_metadata(metadata)?;
        let msg = crate::message::RtmpMessage {
            chunk_stream_id: crate::message::csid::COMMAND,
            message_type: MessageType::DataMessageAmf0,
            message_stream_id: stream_id,
            timestamp: 0,
            payload,
        };
        self.writer.send(&msg)
    }

    pub fn writer(&self) -> Arc<WriterLane> {
        self.writer.clone()
    }

    /// Clears the reader's socket read timeout, switching from the bounded
    /// await-Publishing wait to blocking-until-event steady state.
    pub fn clear_read_timeout(&self) -> std::io::Result<()> {
        self.reader.get_ref().set_read_timeout(None)
    }
}
