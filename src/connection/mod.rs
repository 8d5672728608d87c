//! Connection handling.
//!
//! A [`ConnectionHandler`] owns everything one accepted connection needs: the
//! partial-frame buffer, the frame decoder, the ack tracker and the
//! normalizer. [`ConnectionHandler::feed`] is the synchronous core and
//! [`ConnectionHandler::run`] drives it over an async byte stream, forwarding
//! messages to a [`MessageSink`] and writing acks back to the peer.
//!
//! ```rust,no_run
//! use beats_input::BeatsConfig;
//! use beats_input::connection::{ChannelSink, ConnectionHandler};
//! use futures::StreamExt;
//! use tokio::net::TcpListener;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn serve() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BeatsConfig::default();
//! let (sink, mut messages) = ChannelSink::new(1024);
//! let listener = TcpListener::bind("0.0.0.0:5044").await?;
//! let cancel = CancellationToken::new();
//!
//! tokio::spawn(async move {
//!     while let Some(message) = messages.next().await {
//!         println!("{} {}", message.facility(), message.text);
//!     }
//! });
//!
//! loop {
//!     let (socket, peer) = listener.accept().await?;
//!     let handler = ConnectionHandler::new(peer.to_string(), &config);
//!     let sink = sink.clone();
//!     let cancel = cancel.child_token();
//!     tokio::spawn(async move { handler.run(socket, &sink, cancel).await });
//! }
//! # }
//! ```

mod handler;
mod sink;

pub use handler::{ConnectionHandler, ConnectionPhase, ConnectionState, ConnectionStats, DecodeCycle};
pub use sink::{ChannelSink, MessageSink, RejectedEvent};
