//! Drains a [`kubedev_orchestrator`] Progress Stream channel into SSE
//! frames (§4.5, §9: "the Orchestrator does not know about HTTP"). Each
//! event is one `data: {json}\n\n` line; the stream ends the moment the
//! channel closes, which happens exactly when a terminal event has been
//! sent.

use axum::response::sse::{Event, Sse};
use futures::Stream;
use kubedev_types::ProgressEvent;
use std::convert::Infallible;
use tokio::sync::mpsc;
use tokio_stream::StreamExt as _;
use tokio_stream::wrappers::ReceiverStream;

pub fn progress_stream(
    rx: mpsc::Receiver<ProgressEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = ReceiverStream::new(rx).map(|event| {
        let event = Event::default()
            .json_data(event)
            .unwrap_or_else(|_| Event::default().data("{\"status\":\"error\"}"));
        Ok(event)
    });
    Sse::new(stream)
}
