//! TCP ingestion boundary.
//!
//! Accepts connections and runs one task per connection that reads
//! request lines, parses them, and hands well-formed orders to the
//! engine. This is the only place producer-visible errors exist: a bad
//! line gets a rejection reply and the connection stays open; nothing
//! malformed ever reaches the engine.

use crate::engine::EngineHandle;
use crate::protocol::{self, ACK_LINE, NACK_LINE};
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::{debug, info, warn};

/// Matches the receive buffer the historic server used per connection.
pub const DEFAULT_MAX_LINE_LEN: usize = 512;

/// Accept loop. Runs until the listener fails; each connection is served
/// on its own task with a clone of the engine handle.
pub async fn run(
    listener: TcpListener,
    engine: EngineHandle,
    max_line_len: usize,
) -> std::io::Result<()> {
    info!(addr = %listener.local_addr()?, "listening");
    loop {
        let (stream, peer) = listener.accept().await?;
        debug!(%peer, "connection accepted");
        let engine = engine.clone();
        tokio::spawn(async move {
            match handle_connection(stream, engine, max_line_len).await {
                Ok(()) => debug!(%peer, "connection closed"),
                Err(e) => debug!(%peer, error = %e, "connection dropped"),
            }
        });
    }
}

/// Per-connection loop: one reply line per request line, in order.
async fn handle_connection(
    stream: TcpStream,
    engine: EngineHandle,
    max_line_len: usize,
) -> Result<(), LinesCodecError> {
    let mut framed = Framed::new(stream, LinesCodec::new_with_max_length(max_line_len));

    while let Some(line) = framed.next().await {
        let line = match line {
            Ok(line) => line,
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                // Tell the peer this was a rejection, not a network fault,
                // then drop the connection: the codec has lost line framing.
                debug!("request line exceeds max length");
                framed.send(NACK_LINE).await?;
                return Err(LinesCodecError::MaxLineLengthExceeded);
            }
            Err(e) => return Err(e),
        };
        match protocol::parse_order(&line) {
            Ok(order) => {
                if engine.submit(order).is_err() {
                    // Engine already stopped; nothing useful left to do
                    // for this peer.
                    warn!("engine stopped, dropping connection");
                    break;
                }
                // Acknowledges parse + enqueue only, not the match outcome.
                framed.send(ACK_LINE).await?;
            }
            Err(e) => {
                debug!(line = %line, error = %e, "rejected request line");
                framed.send(NACK_LINE).await?;
            }
        }
    }
    Ok(())
}
