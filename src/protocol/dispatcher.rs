use crate::config::{ProtocolConfig, MAX_FRAME_SIZE};
use crate::core::frame::Frame;
use crate::error::{FrameError, ProtocolError, Result};
use crate::protocol::auth::Authenticator;
use crate::protocol::message::Message;
use crate::protocol::parser::Parser;
use crate::protocol::Protocol;
use crate::utils::metrics::{DispatchMetrics, Timer};
use std::sync::Arc;
use tracing::{debug, instrument, trace};

/// Sentinel-frame dispatcher: frame → authenticate → parse content.
///
/// Stops at the first failing stage; a frame that fails authentication never
/// reaches the content parser. Holds no per-message state and is shared
/// across connection workers behind `Arc`.
pub struct Dispatcher {
    authenticator: Arc<dyn Authenticator>,
    parser: Arc<dyn Parser>,
    max_frame_size: usize,
    metrics: Arc<DispatchMetrics>,
}

impl Dispatcher {
    pub fn new(authenticator: Arc<dyn Authenticator>, parser: Arc<dyn Parser>) -> Self {
        Self {
            authenticator,
            parser,
            max_frame_size: MAX_FRAME_SIZE,
            metrics: Arc::new(DispatchMetrics::new()),
        }
    }

    /// Dispatcher whose authenticator and frame limit come from `config`
    pub fn from_config(config: &ProtocolConfig, parser: Arc<dyn Parser>) -> Result<Self> {
        config.validate_strict()?;
        Ok(Self::new(config.auth.build_authenticator()?, parser)
            .with_max_frame_size(config.frame.max_frame_size))
    }

    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    /// Share counters with other dispatchers or a metrics reporter
    pub fn with_metrics(mut self, metrics: Arc<DispatchMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<DispatchMetrics> {
        &self.metrics
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Parse one complete raw frame into an authenticated message
    #[instrument(skip(self, raw), fields(len = raw.len()), level = "debug")]
    pub fn parse_incoming(&self, raw: &[u8]) -> Result<Message> {
        let _timer = Timer::start("parse_incoming");
        self.metrics.frame_received(raw.len() as u64);

        if raw.len() > self.max_frame_size {
            self.metrics.frame_error();
            debug!(limit = self.max_frame_size, "Frame rejected: oversized");
            return Err(FrameError::OversizedFrame {
                size: raw.len(),
                limit: self.max_frame_size,
            }
            .into());
        }

        let frame = Frame::from_bytes(raw).map_err(|e| {
            self.metrics.frame_error();
            debug!(error = %e, "Frame rejected");
            ProtocolError::from(e)
        })?;

        self.dispatch_frame(&frame)
    }

    /// Authenticate and parse an already framed message
    pub fn dispatch_frame(&self, frame: &Frame) -> Result<Message> {
        trace!(
            version = frame.version,
            auth_len = frame.auth.len(),
            content_len = frame.content.len(),
            "Dispatching frame"
        );

        let auth_info = self.authenticator.authenticate(&frame.auth).map_err(|e| {
            self.metrics.auth_failure();
            debug!(error = %e, "Authentication failed");
            ProtocolError::from(e)
        })?;

        let mut message = self.parser.parse(&frame.content).map_err(|e| {
            self.metrics.parse_error();
            debug!(error = %e, conn_id = %auth_info.conn_id, "Content rejected");
            ProtocolError::from(e)
        })?;

        message.conn_id = auth_info.conn_id;
        self.metrics.message_dispatched();
        debug!(
            conn_id = %message.conn_id,
            action = %message.action_type,
            "Message dispatched"
        );
        Ok(message)
    }
}

impl Protocol for Dispatcher {
    fn parse_incoming(&self, raw: &[u8]) -> Result<Message> {
        Dispatcher::parse_incoming(self, raw)
    }
}
