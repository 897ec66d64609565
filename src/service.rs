use std::sync::Arc;

use tokio::{
    io::{AsyncBufRead, AsyncWrite},
    sync::mpsc,
};
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::{
    broadcast::BroadcastProcessor,
    common::{Config, Result},
    network::{write_loop, Node},
};

const INBOX_SIZE: usize = 1024;

/// Runs one node until `reader` is exhausted.
///
/// On end of input the retry tasks are cancelled, the processor drains its
/// inbox, and every reply queued by then is written before returning.
pub async fn serve<R, W>(config: &Config, reader: R, writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (inbox_tx, inbox_rx) = mpsc::channel(INBOX_SIZE);
    let node = Arc::new(Node::new(outbound_tx));
    let cancel = CancellationToken::new();

    let mut processor = BroadcastProcessor::new(
        node.clone(),
        config.retry_policy(),
        config.fanout_policy(),
        cancel.clone(),
        inbox_rx,
    );

    let writing = tokio::spawn(async move {
        if let Err(e) = write_loop(outbound_rx, writer).await {
            error!(error = %e, "writer stopped");
        }
    });
    let processing = tokio::spawn(async move {
        processor.run().await;
    });

    // Returns once input closes; dropping the inbox sender stops the processor
    let result = node.run(reader, inbox_tx).await;
    cancel.cancel();
    if let Err(e) = processing.await {
        error!(error = %e, "processor task failed");
    }

    // The writer stops once the last sender is gone, after draining the queue
    drop(node);
    if let Err(e) = writing.await {
        error!(error = %e, "writer task failed");
    }
    result
}
