use ibr_schemas::Identifier;
use parking_lot::Mutex;

#[derive(Debug)]
struct IdState {
    next_order_id: Identifier,
    request_id: Identifier,
}

/// Allocates identifiers from the shared namespace.
///
/// Order ids start at the gateway's `nextValidId` floor and only grow.
/// Request ids are kept on the other side of `threshold` from the current
/// order id so an error event keyed by a bare id can be routed unambiguously.
#[derive(Debug)]
pub struct IdAllocator {
    threshold: Identifier,
    state: Mutex<IdState>,
}

impl IdAllocator {
    pub fn new(threshold: Identifier) -> Self {
        Self {
            threshold,
            state: Mutex::new(IdState {
                next_order_id: 0,
                request_id: 0,
            }),
        }
    }

    /// Raise the order-id floor. Lower values are ignored.
    pub fn observe_next_valid_id(&self, floor: Identifier) {
        let mut st = self.state.lock();
        st.next_order_id = st.next_order_id.max(floor);
    }

    pub fn peek_order_id(&self) -> Identifier {
        self.state.lock().next_order_id
    }

    pub fn next_order_id(&self) -> Identifier {
        let mut st = self.state.lock();
        let id = st.next_order_id;
        st.next_order_id += 1;
        id
    }

    /// Caller-supplied ids (order modifications) must never be handed out
    /// again as new ids.
    pub fn reserve_order_id(&self, id: Identifier) {
        let mut st = self.state.lock();
        if id >= st.next_order_id {
            st.next_order_id = id + 1;
        }
    }

    pub fn next_request_id(&self) -> Identifier {
        let mut st = self.state.lock();
        let th = self.threshold;
        st.request_id += 1;
        if st.next_order_id < th {
            if st.request_id < th {
                st.request_id += th;
            }
        } else if st.request_id > th {
            st.request_id -= th;
        }
        st.request_id
    }
}
