use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel};

use crate::{
    reqresp::ReqResp,
    sap::{ConfirmValue, Request, RequestValue, StaEvent},
};

const EVENT_QUEUE_DEPTH: usize = 16;

/// The main interface to the station MAC: make requests and read the trace
/// event stream.
pub struct StaCommander {
    request_confirm_channel: ReqResp<RequestValue, ConfirmValue, 4>,
    events: Channel<CriticalSectionRawMutex, StaEvent, EVENT_QUEUE_DEPTH>,
}

impl StaCommander {
    pub const fn new() -> Self {
        Self {
            request_confirm_channel: ReqResp::new(),
            events: Channel::new(),
        }
    }

    /// Make a request to the MAC. The typed confirm is returned.
    pub async fn request<R: Request>(&self, request: R) -> R::Confirm {
        self.request_confirm_channel
            .request(request.into())
            .await
            .into()
    }

    /// Wait for the next trace event. Events fire on the observable edges of
    /// the MAC (association changes, completed sweeps, received reports and
    /// data); an uninterested caller can simply never poll this.
    pub async fn next_event(&self) -> StaEvent {
        self.events.receive().await
    }

    /// Get the inverse of the commander where requests are received and
    /// events are emitted.
    pub(crate) fn get_handler(&self) -> MacHandler<'_> {
        MacHandler { commander: self }
    }
}

impl Default for StaCommander {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) struct MacHandler<'a> {
    commander: &'a StaCommander,
}

impl MacHandler<'_> {
    pub async fn wait_for_request(&self) -> RequestResponder<'_, RequestValue> {
        let (id, request) = self
            .commander
            .request_confirm_channel
            .wait_for_request()
            .await;
        RequestResponder {
            commander: self.commander,
            request,
            id,
        }
    }

    /// Emit a trace event. The stream is lossy towards a consumer that never
    /// drains it; the MAC must not block on observability.
    pub fn emit(&self, event: StaEvent) {
        if self.commander.events.try_send(event).is_err() {
            warn!("Event queue full, trace event lost");
        }
    }
}

pub struct RequestResponder<'a, T> {
    commander: &'a StaCommander,
    /// The request that was received
    pub request: T,
    id: u32,
}

impl<'a> RequestResponder<'a, RequestValue> {
    pub fn into_concrete<U: Request + From<RequestValue>>(self) -> RequestResponder<'a, U> {
        let Self {
            commander,
            request,
            id,
        } = self;
        RequestResponder {
            commander,
            request: request.into(),
            id,
        }
    }
}

impl<T: Request> RequestResponder<'_, T> {
    pub fn respond(self, response: T::Confirm) {
        self.commander
            .request_confirm_channel
            .respond(self.id, response.into());
    }
}
