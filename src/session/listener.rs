//! TCP accept loop

use super::connection::CommandSession;
use crate::command::Dispatcher;
use embedded_hal::digital::OutputPin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// Accept connections forever, one task per connection
///
/// A failing session only ends itself; the accept loop and the other
/// sessions keep running.
pub async fn serve<P>(listener: TcpListener, dispatcher: Arc<Dispatcher<P>>)
where
    P: OutputPin + Send + 'static,
{
    let active = Arc::new(AtomicUsize::new(0));

    loop {
        let (socket, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("[SERVER] Accept failed: {}", e);
                tokio::time::sleep(Duration::from_millis(100)).await;
                continue;
            }
        };

        let count = active.fetch_add(1, Ordering::SeqCst) + 1;
        info!("[SERVER] Connection from {} ({} active)", addr, count);

        let dispatcher = dispatcher.clone();
        let active = active.clone();
        tokio::spawn(async move {
            match CommandSession::new(socket, addr.to_string(), dispatcher).run().await {
                Ok(stats) => info!(
                    "[SERVER] Session {} finished: {} acknowledged, {} malformed",
                    addr, stats.acknowledged, stats.malformed
                ),
                Err(e) => warn!("[SERVER] Session {} terminated: {:#}", addr, e),
            }
            active.fetch_sub(1, Ordering::SeqCst);
        });
    }
}
