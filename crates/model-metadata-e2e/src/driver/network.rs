//! Network observation over the CDP `Network` domain

use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
    EventResponseReceived,
};
use chromiumoxide::Page;
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;
use tracing::{debug, instrument, trace};

use crate::error::Result;
use crate::intercept::{InterceptRegistry, NetworkEvent};

/// Enable the `Network` domain and spawn a task feeding `registry`
#[instrument(skip(page, registry))]
pub(crate) async fn spawn_network_pump(
    page: &Page,
    registry: Arc<InterceptRegistry>,
) -> Result<tokio::task::JoinHandle<()>> {
    page.execute(EnableParams::default()).await?;

    let sent = page
        .event_listener::<EventRequestWillBeSent>()
        .await?
        .map(|e| NetworkEvent::RequestSent {
            request_id: e.request_id.inner().to_string(),
            method: e.request.method.clone(),
            url: e.request.url.clone(),
        });
    let received = page
        .event_listener::<EventResponseReceived>()
        .await?
        .map(|e| NetworkEvent::ResponseReceived {
            request_id: e.request_id.inner().to_string(),
            status: u16::try_from(e.response.status).unwrap_or(0),
        });
    let finished = page
        .event_listener::<EventLoadingFinished>()
        .await?
        .map(|e| NetworkEvent::Finished {
            request_id: e.request_id.inner().to_string(),
        });
    let failed = page
        .event_listener::<EventLoadingFailed>()
        .await?
        .map(|e| NetworkEvent::Failed {
            request_id: e.request_id.inner().to_string(),
            reason: e.error_text.clone(),
        });

    let streams: Vec<BoxStream<'static, NetworkEvent>> =
        vec![sent.boxed(), received.boxed(), finished.boxed(), failed.boxed()];
    let mut events = stream::select_all(streams);

    debug!("Network observation started");
    Ok(tokio::spawn(async move {
        while let Some(event) = events.next().await {
            trace!("{:?}", event);
            registry.observe(event);
        }
    }))
}
