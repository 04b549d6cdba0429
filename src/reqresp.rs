use core::sync::atomic::{AtomicU32, Ordering};

use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel};
use maitake_sync::WaitMap;

/// A bounded request channel whose responses are correlated back to the
/// requester through a wait map keyed by a unique id.
///
/// The requester side may be called from any number of tasks; the responder
/// side is the single MAC engine.
pub struct ReqResp<Request, Response, const N: usize> {
    requests: Channel<CriticalSectionRawMutex, (u32, Request), N>,
    responses: WaitMap<u32, Response>,
    next_id: AtomicU32,
}

impl<Request, Response, const N: usize> ReqResp<Request, Response, N> {
    pub const fn new() -> Self {
        Self {
            requests: Channel::new(),
            responses: WaitMap::new(),
            next_id: AtomicU32::new(0),
        }
    }

    /// Send a request and wait for its response.
    pub async fn request(&self, request: Request) -> Response {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        // The waiter must be registered before the responder can possibly
        // answer, so create it first and only then enqueue the request.
        let wait = self.responses.wait(id);
        let (response, ()) =
            embassy_futures::join::join(wait, self.requests.send((id, request))).await;

        match response {
            Ok(response) => response,
            Err(_) => panic!("response correlation id was reused"),
        }
    }

    pub async fn wait_for_request(&self) -> (u32, Request) {
        self.requests.receive().await
    }

    pub fn respond(&self, id: u32, response: Response) {
        self.responses.wake(&id, response);
    }
}
