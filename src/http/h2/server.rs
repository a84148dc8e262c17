//! HTTP/2 server implementation with low-level frame control
//!
//! Mirrors `H2Client`'s shape: the connection preface and SETTINGS
//! handshake happen explicitly through `accept()`, and `recv_request()` /
//! `send_response()` give direct control over frame construction for
//! testing edge cases and protocol violations.

use super::codec::FrameCodec;
use super::error::{Error, ErrorCode, Result};
use super::flow_control::ConnectionFlowControl;
use super::frames::*;
use super::settings::{Settings, SettingsBuilder};
use super::stream::{StreamId, StreamManager};
use super::{CONNECTION_PREFACE, CONNECTION_STREAM_ID};
use crate::http::{HttpSession, SessionOps};
use bytes::Bytes;
use hpack::Encoder as HpackEncoder;
use std::collections::HashMap;

/// HTTP/2 server
///
/// Provides low-level control over HTTP/2 frame transmission on the
/// server side of a connection that has already completed (or skipped,
/// for h2c) TLS/ALPN negotiation.
pub struct H2Server<S: SessionOps> {
    session: HttpSession<S>,
    stream_manager: StreamManager,
    flow_control: ConnectionFlowControl,
    hpack_encoder: HpackEncoder<'static>,
    hpack_decoder: hpack::Decoder<'static>,
    local_settings: Settings,
    remote_settings: Settings,
    accepted: bool,
}

impl<S: SessionOps> H2Server<S> {
    /// Create a new HTTP/2 server with default settings
    pub fn new(session: S) -> Result<Self> {
        H2ServerBuilder::new().build(session)
    }

    /// Access the underlying HTTP session (e.g. to inspect TLS state).
    pub fn session(&self) -> &HttpSession<S> {
        &self.session
    }

    /// Read the client connection preface, exchange SETTINGS frames, and
    /// leave the connection ready for `recv_request`/`send_response`.
    pub fn accept(&mut self) -> Result<()> {
        if self.accepted {
            return Ok(());
        }

        let mut preface = [0u8; 24];
        let mut read = 0;
        while read < preface.len() {
            let n = self.session.read(&mut preface[read..])?;
            if n == 0 {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed while reading HTTP/2 preface",
                )));
            }
            read += n;
        }
        if &preface[..] != CONNECTION_PREFACE {
            return Err(Error::MissingPreface);
        }

        let settings_frame = SettingsFrame::new(self.local_settings.clone());
        self.send_settings(&settings_frame)?;
        self.recv_settings()?;

        self.accepted = true;
        Ok(())
    }

    /// Seed the connection as already past the preface, for h2c upgrades
    /// where the HTTP/1 request line already proved the client speaks
    /// HTTP/2 and the decoded `HTTP2-Settings` header supplies the
    /// client's initial settings.
    pub fn accept_upgraded(&mut self, client_settings: Settings) -> Result<()> {
        self.remote_settings.merge(&client_settings);
        self.stream_manager
            .set_max_concurrent_streams(self.remote_settings.max_concurrent_streams);

        let settings_frame = SettingsFrame::new(self.local_settings.clone());
        self.send_settings(&settings_frame)?;

        self.accepted = true;
        Ok(())
    }

    /// Send a SETTINGS frame
    pub fn send_settings(&mut self, frame: &SettingsFrame) -> Result<()> {
        let encoded = FrameCodec::encode_settings_frame(frame);
        self.session.write(&encoded)?;
        Ok(())
    }

    /// Send a SETTINGS ACK
    pub fn send_settings_ack(&mut self) -> Result<()> {
        let frame = SettingsFrame::ack();
        self.send_settings(&frame)
    }

    /// Receive and process a SETTINGS frame from the client
    pub fn recv_settings(&mut self) -> Result<()> {
        let (frame_type, flags, stream_id, payload) = self.recv_frame()?;

        if frame_type != FrameType::Settings {
            return Err(Error::Protocol(format!(
                "Expected SETTINGS frame, got {:?}",
                frame_type
            )));
        }
        if stream_id != CONNECTION_STREAM_ID {
            return Err(Error::Protocol(
                "SETTINGS frame must have stream ID 0".to_string(),
            ));
        }
        if flags.is_ack() {
            return Ok(());
        }

        let mut settings = Settings::new();
        let mut pos = 0;
        while pos + 6 <= payload.len() {
            let id = u16::from_be_bytes([payload[pos], payload[pos + 1]]);
            let value = u32::from_be_bytes([
                payload[pos + 2],
                payload[pos + 3],
                payload[pos + 4],
                payload[pos + 5],
            ]);
            match id {
                0x1 => settings.header_table_size = Some(value),
                0x2 => settings.enable_push = Some(value != 0),
                0x3 => settings.max_concurrent_streams = Some(value),
                0x4 => settings.initial_window_size = Some(value),
                0x5 => settings.max_frame_size = Some(value),
                0x6 => settings.max_header_list_size = Some(value),
                0x8 => settings.enable_connect_protocol = Some(value != 0),
                0x9 => settings.no_rfc7540_priorities = Some(value != 0),
                _ => {}
            }
            pos += 6;
        }

        settings.validate()?;
        self.remote_settings.merge(&settings);
        self.stream_manager
            .set_max_concurrent_streams(settings.max_concurrent_streams);

        if let Some(new_size) = settings.initial_window_size {
            for stream_id in self.stream_manager.stream_ids() {
                if let Some(stream) = self.stream_manager.get_stream_mut(stream_id) {
                    stream
                        .flow_control_mut()
                        .send_window_mut()
                        .update_initial_size(new_size)?;
                }
            }
        }

        self.send_settings_ack()?;
        Ok(())
    }

    /// Block for the next client-initiated request: reads frames until a
    /// HEADERS block (plus any DATA) completes one full stream.
    pub fn recv_request(&mut self) -> Result<H2Request> {
        loop {
            let (frame_type, flags, stream_id, payload) = self.recv_frame()?;

            match frame_type {
                FrameType::Headers => {
                    let frame = HeadersFrame::new(
                        stream_id,
                        payload,
                        flags.is_end_stream(),
                        flags.is_end_headers(),
                    );
                    let stream = self.stream_manager.get_or_create_stream(stream_id)?;
                    stream.receive_headers(&frame)?;

                    if stream.headers_complete() && stream.stream_complete() {
                        return self.finish_request(stream_id);
                    }
                }
                FrameType::Continuation => {
                    if let Some(stream) = self.stream_manager.get_stream_mut(stream_id) {
                        stream.receive_headers(&HeadersFrame::new(
                            stream_id,
                            payload,
                            false,
                            flags.is_end_headers(),
                        ))?;
                        if stream.headers_complete() && stream.stream_complete() {
                            return self.finish_request(stream_id);
                        }
                    }
                }
                FrameType::Data => {
                    self.flow_control.consume_recv_window(payload.len());
                    let frame = DataFrame::new(stream_id, payload, flags.is_end_stream());
                    if let Some(stream) = self.stream_manager.get_stream_mut(stream_id) {
                        stream.receive_data(&frame)?;
                        if stream.headers_complete() && stream.stream_complete() {
                            return self.finish_request(stream_id);
                        }
                    }
                }
                FrameType::Settings => {
                    if flags.is_ack() {
                        continue;
                    }
                    self.apply_peer_settings(&payload)?;
                    self.send_settings_ack()?;
                }
                FrameType::WindowUpdate => {
                    if payload.len() != 4 {
                        return Err(Error::FrameSize("WINDOW_UPDATE must be 4 bytes".to_string()));
                    }
                    let increment =
                        u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
                    if stream_id == CONNECTION_STREAM_ID {
                        self.flow_control.increase_send_window(increment)?;
                    } else if let Some(stream) = self.stream_manager.get_stream_mut(stream_id) {
                        stream.flow_control_mut().increase_send_window(increment)?;
                    }
                }
                FrameType::Ping => {
                    if !flags.is_ack() {
                        let mut data = [0u8; 8];
                        data.copy_from_slice(&payload[..8.min(payload.len())]);
                        let pong = PingFrame::ack(data);
                        let encoded = FrameCodec::encode_ping_frame(&pong);
                        self.session.write(&encoded)?;
                    }
                }
                FrameType::RstStream => {
                    self.stream_manager.remove_stream(stream_id);
                }
                FrameType::Goaway => {
                    return Err(Error::ConnectionClosed);
                }
                _ => {}
            }
        }
    }

    fn apply_peer_settings(&mut self, payload: &Bytes) -> Result<()> {
        let mut settings = Settings::new();
        let mut pos = 0;
        while pos + 6 <= payload.len() {
            let id = u16::from_be_bytes([payload[pos], payload[pos + 1]]);
            let value = u32::from_be_bytes([
                payload[pos + 2],
                payload[pos + 3],
                payload[pos + 4],
                payload[pos + 5],
            ]);
            match id {
                0x1 => settings.header_table_size = Some(value),
                0x2 => settings.enable_push = Some(value != 0),
                0x3 => settings.max_concurrent_streams = Some(value),
                0x4 => settings.initial_window_size = Some(value),
                0x5 => settings.max_frame_size = Some(value),
                0x6 => settings.max_header_list_size = Some(value),
                _ => {}
            }
            pos += 6;
        }
        settings.validate()?;
        self.remote_settings.merge(&settings);
        Ok(())
    }

    fn finish_request(&mut self, stream_id: StreamId) -> Result<H2Request> {
        let stream = self
            .stream_manager
            .get_stream_mut(stream_id)
            .ok_or(Error::StreamNotFound(stream_id))?;

        let header_block = stream.header_block().to_vec();
        let body = stream.take_body();

        let decoded = self
            .hpack_decoder
            .decode(&header_block)
            .map_err(|e| Error::Compression(format!("HPACK decode error: {:?}", e)))?;

        let mut method = String::new();
        let mut path = String::new();
        let mut scheme = String::new();
        let mut authority = String::new();
        let mut headers = HashMap::new();

        for (name, value) in decoded {
            let name_str = String::from_utf8_lossy(&name).to_string();
            let value_str = String::from_utf8_lossy(&value).to_string();
            match name_str.as_str() {
                ":method" => method = value_str,
                ":path" => path = value_str,
                ":scheme" => scheme = value_str,
                ":authority" => authority = value_str,
                _ => {
                    headers.insert(name_str, value_str);
                }
            }
        }

        Ok(H2Request {
            stream_id,
            method,
            path,
            scheme,
            authority,
            headers,
            body: Bytes::from(body),
        })
    }

    /// Send a complete response: headers (with `:status`) and, if
    /// non-empty, a single DATA frame carrying `body`.
    pub fn send_response(
        &mut self,
        stream_id: StreamId,
        status: u16,
        headers: &[(&str, &str)],
        body: Bytes,
    ) -> Result<()> {
        let mut hpack_headers = Vec::new();
        let status_str = status.to_string();
        hpack_headers.push((":status", status_str.as_str()));
        for (name, value) in headers {
            hpack_headers.push((name, value));
        }

        let mut header_block_vec = Vec::new();
        let header_tuples: Vec<(&[u8], &[u8])> = hpack_headers
            .iter()
            .map(|(name, value)| (name.as_bytes(), value.as_bytes()))
            .collect();
        self.hpack_encoder
            .encode_into(header_tuples, &mut header_block_vec)
            .map_err(|e| Error::Internal(format!("HPACK encode error: {}", e)))?;

        let has_body = !body.is_empty();
        let headers_frame = HeadersFrame::new(
            stream_id,
            Bytes::from(header_block_vec),
            !has_body,
            true,
        );
        self.send_headers(&headers_frame)?;

        if has_body {
            let data_frame = DataFrame::new(stream_id, body, true);
            self.send_data(&data_frame)?;
        }

        Ok(())
    }

    /// Send a HEADERS frame directly, for callers streaming a response
    /// body across multiple DATA frames.
    pub fn send_headers(&mut self, frame: &HeadersFrame) -> Result<()> {
        if let Some(stream) = self.stream_manager.get_stream_mut(frame.stream_id) {
            stream.send_headers(frame.end_stream)?;
        }
        let encoded = FrameCodec::encode_headers_frame(frame);
        self.session.write(&encoded)?;
        Ok(())
    }

    /// Send a DATA frame directly.
    pub fn send_data(&mut self, frame: &DataFrame) -> Result<()> {
        let sendable_conn = self.flow_control.consume_send_window(frame.data.len())?;
        if sendable_conn == 0 {
            return Err(Error::FlowControl("Connection window exhausted".to_string()));
        }
        if let Some(stream) = self.stream_manager.get_stream_mut(frame.stream_id) {
            let sendable_stream = stream.send_data(frame.data.len(), frame.end_stream)?;
            if sendable_stream == 0 {
                return Err(Error::FlowControl("Stream window exhausted".to_string()));
            }
        }
        let encoded = FrameCodec::encode_data_frame(frame);
        self.session.write(&encoded)?;
        Ok(())
    }

    /// Send a GOAWAY frame and mark the connection as finished.
    pub fn send_goaway(&mut self, error_code: ErrorCode, debug: &str) -> Result<()> {
        let last_stream_id = self
            .stream_manager
            .stream_ids()
            .into_iter()
            .max()
            .unwrap_or(0);
        let frame = GoawayFrame::new(last_stream_id, error_code, Bytes::from(debug.to_string()));
        let encoded = FrameCodec::encode_goaway_frame(&frame);
        self.session.write(&encoded)?;
        Ok(())
    }

    /// Send a RST_STREAM frame for the given stream.
    pub fn send_rst_stream(&mut self, stream_id: StreamId, error_code: ErrorCode) -> Result<()> {
        let frame = RstStreamFrame { stream_id, error_code };
        let encoded = FrameCodec::encode_rst_stream_frame(&frame);
        self.session.write(&encoded)?;
        if let Some(stream) = self.stream_manager.get_stream_mut(stream_id) {
            stream.close();
        }
        Ok(())
    }

    /// Receive a raw frame (exposed for tests exercising malformed input).
    pub fn recv_frame(&mut self) -> Result<(FrameType, FrameFlags, StreamId, Bytes)> {
        FrameCodec::read_frame_from_session(&mut self.session).map_err(Error::Io)
    }

    pub fn local_settings(&self) -> &Settings {
        &self.local_settings
    }

    pub fn remote_settings(&self) -> &Settings {
        &self.remote_settings
    }

    pub fn stream_manager_mut(&mut self) -> &mut StreamManager {
        &mut self.stream_manager
    }
}

/// A decoded HTTP/2 request: pseudo-headers live in their own fields,
/// everything else is in `headers`.
#[derive(Debug, Clone)]
pub struct H2Request {
    pub stream_id: StreamId,
    pub method: String,
    pub path: String,
    pub scheme: String,
    pub authority: String,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl H2Request {
    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(|s| s.as_str())
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn body_string(&self) -> Result<String> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| Error::Internal(format!("Invalid UTF-8 in body: {}", e)))
    }
}

/// HTTP/2 server builder
pub struct H2ServerBuilder {
    settings: SettingsBuilder,
}

impl H2ServerBuilder {
    pub fn new() -> Self {
        H2ServerBuilder {
            settings: SettingsBuilder::new()
                .header_table_size(4096)
                .enable_push(true)
                .initial_window_size(65535)
                .max_frame_size(16384),
        }
    }

    pub fn header_table_size(mut self, size: u32) -> Self {
        self.settings = self.settings.header_table_size(size);
        self
    }

    pub fn enable_push(mut self, enable: bool) -> Self {
        self.settings = self.settings.enable_push(enable);
        self
    }

    pub fn initial_window_size(mut self, size: u32) -> Self {
        self.settings = self.settings.initial_window_size(size);
        self
    }

    pub fn max_frame_size(mut self, size: u32) -> Self {
        self.settings = self.settings.max_frame_size(size);
        self
    }

    pub fn max_concurrent_streams(mut self, max: u32) -> Self {
        self.settings = self.settings.max_concurrent_streams(max);
        self
    }

    pub fn build<S: SessionOps>(self, session: S) -> Result<H2Server<S>> {
        let local_settings = self.settings.build()?;

        Ok(H2Server {
            session: HttpSession::new(session),
            stream_manager: StreamManager::new(false), // server uses even stream IDs
            flow_control: ConnectionFlowControl::new(),
            hpack_encoder: HpackEncoder::new(),
            hpack_decoder: hpack::Decoder::new(),
            local_settings,
            remote_settings: Settings::default_settings(),
            accepted: false,
        })
    }
}

impl Default for H2ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
