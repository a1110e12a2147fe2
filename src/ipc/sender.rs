use super::{Endpoint, EndpointRegistry, Envelope};
use crate::defaults;
use crate::error::TransportError;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error};

/// Sending side of an endpoint
///
/// Created inactive by [`SendQueue::connect`]; options are applied before
/// [`SendQueue::activate`] resolves the address.
#[derive(Debug)]
pub struct SendQueue {
    address: String,
    own_socket: bool,
    high_water: usize,
    endpoint: Option<Arc<Endpoint>>,
}

impl SendQueue {
    pub fn connect(address: &str) -> Self {
        Self {
            address: address.to_string(),
            own_socket: false,
            high_water: defaults::HIGH_WATER_MARK,
            endpoint: None,
        }
    }

    /// Whether dropping this queue removes the endpoint from the registry
    pub fn set_own_socket(&mut self, own_socket: bool) {
        self.own_socket = own_socket;
    }

    pub fn set_high_water(&mut self, high_water: usize) {
        self.high_water = high_water;
    }

    pub fn is_active(&self) -> bool {
        self.endpoint.is_some()
    }

    pub fn activate(&mut self) -> Result<(), TransportError> {
        let endpoint = EndpointRegistry::global().open(&self.address, self.high_water)?;
        if !endpoint.is_claimed() {
            debug!(
                "No receiver on {} yet; messages queue until one prepares or the process exits",
                self.address
            );
        }
        self.endpoint = Some(endpoint);
        Ok(())
    }

    /// Transfer ownership of `payload` to the endpoint; no acknowledgment
    pub fn send(&self, payload: String, slot: u32) -> Result<(), TransportError> {
        let endpoint = self
            .endpoint
            .as_ref()
            .ok_or_else(|| TransportError::NotActivated(self.address.clone()))?;
        endpoint.push(Envelope { slot, payload })
    }
}

impl Drop for SendQueue {
    fn drop(&mut self) {
        if let Some(endpoint) = self.endpoint.take() {
            if self.own_socket {
                EndpointRegistry::global().unlink(&endpoint);
            }
        }
    }
}

thread_local! {
    /// Per-thread send queues by address; `None` marks a failed activation
    static SEND_QUEUES: RefCell<HashMap<String, Option<SendQueue>>> = RefCell::new(HashMap::new());
}

/// Send `message` to `address` from the calling thread
///
/// The first call on a thread creates that thread's send queue. If it cannot
/// be activated the failure is logged once and every later send to the same
/// address on this thread returns [`TransportError::NotActivated`] without
/// retrying.
pub fn send(address: &str, message: String) -> Result<(), TransportError> {
    SEND_QUEUES.with(|queues| {
        let mut queues = queues.borrow_mut();
        if let Some(queue) = queues.get(address) {
            return send_on(queue.as_ref(), address, message);
        }
        let queue = create_send_queue(address);
        let result = send_on(queue.as_ref(), address, message);
        queues.insert(address.to_string(), queue);
        result
    })
}

fn send_on(
    queue: Option<&SendQueue>,
    address: &str,
    message: String,
) -> Result<(), TransportError> {
    match queue {
        Some(queue) => queue.send(message, defaults::QUEUE_SLOT),
        None => Err(TransportError::NotActivated(address.to_string())),
    }
}

fn create_send_queue(address: &str) -> Option<SendQueue> {
    let mut queue = SendQueue::connect(address);
    queue.set_own_socket(false);
    queue.set_high_water(defaults::HIGH_WATER_MARK);
    match queue.activate() {
        Ok(()) => {
            let thread = std::thread::current();
            debug!("Send queue for {} ready on {:?}", address, thread.name());
            Some(queue)
        }
        Err(e) => {
            error!("Cannot activate send queue: {}", e);
            None
        }
    }
}
