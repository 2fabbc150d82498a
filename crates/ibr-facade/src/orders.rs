//! Order-mutating operations. All of them run on the reserved slot.

use ibr_correlation::{EntryKey, OpenOrdersEntry};
use ibr_pool::{LeaseKind, SlotLease};
use ibr_schemas::args::{ComboLegArgs, OrderArgs};
use ibr_schemas::{ComboLeg, Contract, GatewayRequest, Identifier, Order, ORDER_CANCELLED_CODE};
use ibr_session::Session;
use tracing::{info, warn};

use crate::response::status_in;
use crate::{
    CancelResponse, Check, Gateway, GatewayError, OcaResponse, OrderSummary, Outcome,
    PlaceOrdersResponse, Registration, WaitPlan, ACCEPTED_STATUSES,
};

const FILLED: &[&str] = &["Filled"];

/// One order ready to send.
struct Prepared {
    order_id: Identifier,
    contract: Contract,
    order: Order,
    wait: bool,
}

impl Gateway {
    /// Every open order known to the gateway, across all client ids.
    pub async fn get_open_orders(&self) -> Result<Outcome<OpenOrdersEntry>, GatewayError> {
        let lease = self.lease(LeaseKind::Order).await?;
        let session = lease.session();
        let slot = lease.slot();

        let _reg = self.register(session, EntryKey::OpenOrders);
        session.send(GatewayRequest::ReqAllOpenOrders)?;
        let waited = self
            .wait(
                session,
                WaitPlan::new("open_orders", self.settings.timeout_iterations),
                |st| match st.open_orders.get(&slot) {
                    Some(e) if e.open_order_end => Check::Done,
                    _ => Check::Pending,
                },
            )
            .await;
        let entry = self.store.take_open_orders(slot);
        Ok(Outcome::new(waited?, entry))
    }

    /// Cancel `order_id`. A recorded status always wins over a recorded
    /// error; the error is attached as info.
    pub async fn cancel_order(&self, order_id: Identifier) -> Result<CancelResponse, GatewayError> {
        let lease = self.lease(LeaseKind::Order).await?;
        let session = lease.session();
        let slot = lease.slot();
        info!(slot, order_id, "cancel requested");

        let reg = self.register(session, EntryKey::Orders(vec![order_id]));
        session.send(GatewayRequest::CancelOrder { order_id })?;

        let waited = self
            .wait(
                session,
                WaitPlan::new("cancel_order", self.settings.timeout_iterations),
                |st| {
                    let has_status = st
                        .orders
                        .get(&order_id)
                        .map_or(false, |e| e.order_status.is_some());
                    if has_status {
                        return Check::Done;
                    }
                    match st.error_for(slot, order_id) {
                        Some(err) if err.error_code != Some(ORDER_CANCELLED_CODE) => {
                            Check::Failed(GatewayError::Protocol(err.clone()))
                        }
                        _ => Check::Pending,
                    }
                },
            )
            .await;

        if matches!(waited, Err(GatewayError::Protocol(_))) {
            // the status for the same cancel usually trails its error by a frame
            tokio::time::sleep(self.settings.poll).await;
        }

        let entry = self.store.take_order(order_id);
        let info = self.store.error(slot, order_id);
        drop(reg);

        if entry.order_status.is_some() {
            return Ok(CancelResponse {
                order_id,
                entry,
                info,
            });
        }
        match (waited, info) {
            (Err(e), _) => Err(e),
            (Ok(_), Some(info)) if info.error_code == Some(ORDER_CANCELLED_CODE) => {
                Ok(CancelResponse {
                    order_id,
                    entry,
                    info: Some(info),
                })
            }
            (Ok(_), _) => Err(GatewayError::Timeout {
                operation: "cancel_order",
            }),
        }
    }

    /// Place (or modify, when `orderId` is given) a batch. The first item
    /// is the parent; every later item is linked to it and sent at once.
    pub async fn place_orders(
        &self,
        items: &[OrderArgs],
    ) -> Result<PlaceOrdersResponse, GatewayError> {
        validate_batch(items)?;
        let lease = self.lease(LeaseKind::Order).await?;
        let session = lease.session();

        let mut prepared = Vec::with_capacity(items.len());
        let mut parent: Option<Identifier> = None;
        for args in items {
            let mut p = self.prepare(&lease, args).await?;
            match parent {
                Some(parent_id) => p.order.parent_id = Some(parent_id),
                None => parent = Some(p.order_id),
            }
            prepared.push(p);
        }

        let _reg = self.submit(session, &prepared)?;
        self.collect_orders(
            session,
            &prepared,
            self.settings.timeout_iterations,
            ACCEPTED_STATUSES,
        )
        .await
    }

    /// Place the first item, wait for it to fill, then submit the rest as
    /// one OCA group named after the anchor's id. If the anchor never fills
    /// the rest are never sent and `close_resp` is empty.
    pub async fn place_order_oca(&self, items: &[OrderArgs]) -> Result<OcaResponse, GatewayError> {
        validate_batch(items)?;
        let lease = self.lease(LeaseKind::Order).await?;
        let session = lease.session();
        let budget = self.settings.oca_timeout_iterations;

        let mut anchor = self.prepare(&lease, &items[0]).await?;
        anchor.wait = true;
        let anchor_id = anchor.order_id;
        let group = anchor_id.to_string();
        info!(order_id = anchor_id, legs = items.len() - 1, "oca anchor placed");

        let anchor = [anchor];
        let anchor_reg = self.submit(session, &anchor)?;
        let open = self.collect_orders(session, &anchor, budget, FILLED).await;
        let filled = self.store.read(|st| {
            st.orders
                .get(&anchor_id)
                .and_then(|e| e.order_status.as_ref())
                .map_or(false, |s| s.is_filled())
        });
        drop(anchor_reg);
        let open_resp = open?;

        if !filled {
            warn!(order_id = anchor_id, "oca anchor not filled; group not submitted");
            return Ok(OcaResponse {
                open_resp,
                close_resp: PlaceOrdersResponse::default(),
            });
        }

        let mut rest = Vec::with_capacity(items.len() - 1);
        for args in &items[1..] {
            let mut p = self.prepare(&lease, args).await?;
            p.order.oca_group = Some(group.clone());
            p.order.oca_type = Some(1);
            rest.push(p);
        }
        if rest.is_empty() {
            return Ok(OcaResponse {
                open_resp,
                close_resp: PlaceOrdersResponse::default(),
            });
        }

        let _reg = self.submit(session, &rest)?;
        let close = self
            .collect_orders(session, &rest, budget, ACCEPTED_STATUSES)
            .await;
        Ok(OcaResponse {
            open_resp,
            close_resp: close?,
        })
    }

    // -------------------------------------------------------------------------

    async fn prepare(&self, lease: &SlotLease, args: &OrderArgs) -> Result<Prepared, GatewayError> {
        let order_id = match args.order_id {
            Some(id) => {
                self.ids.reserve_order_id(id);
                id
            }
            None => self.ids.next_order_id(),
        };
        let mut contract = args.to_contract();
        if !args.combo_legs.is_empty() {
            contract.combo_legs = self.resolve_combo_legs(lease, &args.combo_legs).await?;
        }
        Ok(Prepared {
            order_id,
            contract,
            order: args.to_order(lease.session().client_id()),
            wait: !args.has_deferred_activation(),
        })
    }

    /// Register every order entry, then send. Registering first means no
    /// status can land before its entry exists. The entries live as long as
    /// the returned registration.
    fn submit<'a>(
        &'a self,
        session: &'a Session,
        prepared: &[Prepared],
    ) -> Result<Registration<'a>, GatewayError> {
        let ids: Vec<Identifier> = prepared.iter().map(|p| p.order_id).collect();
        let reg = self.register(session, EntryKey::Orders(ids));
        for p in prepared {
            info!(
                order_id = p.order_id,
                symbol = %p.contract.symbol,
                action = %p.order.action,
                order_type = %p.order.order_type,
                "placing order"
            );
            let request = GatewayRequest::PlaceOrder {
                order_id: p.order_id,
                contract: p.contract.clone(),
                order: p.order.clone(),
            };
            session.send(request)?;
        }
        self.send_best_effort(session, GatewayRequest::ReqOpenOrders);
        Ok(reg)
    }

    /// Wait until every waited-on id has a status in `accepted` or an error,
    /// then summarise all of `prepared`.
    async fn collect_orders(
        &self,
        session: &Session,
        prepared: &[Prepared],
        iterations: u32,
        accepted: &[&str],
    ) -> Result<PlaceOrdersResponse, GatewayError> {
        let waiting: Vec<Identifier> = prepared
            .iter()
            .filter(|p| p.wait)
            .map(|p| p.order_id)
            .collect();
        let slot = session.slot();

        let plan = WaitPlan::new("place_orders", iterations).refreshing(GatewayRequest::ReqOpenOrders);
        let complete = self
            .wait(session, plan, |st| {
                let pending = waiting.iter().any(|id| {
                    let accepted_status = st
                        .orders
                        .get(id)
                        .and_then(|e| e.order_status.as_ref())
                        .map_or(false, |s| status_in(&s.status, accepted));
                    !accepted_status && st.error_for(slot, *id).is_none()
                });
                if pending {
                    Check::Pending
                } else {
                    Check::Done
                }
            })
            .await?;

        Ok(self.store.read(|st| {
            let mut resp = PlaceOrdersResponse {
                complete,
                ..PlaceOrdersResponse::default()
            };
            for p in prepared {
                let entry = st.orders.get(&p.order_id);
                match entry.and_then(|e| e.order_status.as_ref().map(|s| (e, s))) {
                    Some((entry, status)) => {
                        resp.orders
                            .insert(p.order_id, OrderSummary::from_entry(status, entry, accepted));
                    }
                    None => {
                        if let Some(err) = st.error_for(slot, p.order_id) {
                            resp.errors.insert(p.order_id, err.clone());
                        }
                    }
                }
            }
            resp
        }))
    }

    /// Resolve each leg's `conId` with one contract lookup per leg on the
    /// leased slot. Lookup ids come from the request-id space, so they never
    /// meet a feed request on another slot.
    async fn resolve_combo_legs(
        &self,
        lease: &SlotLease,
        legs: &[ComboLegArgs],
    ) -> Result<Vec<ComboLeg>, GatewayError> {
        let session = lease.session();
        let slot = lease.slot();
        let req_ids: Vec<Identifier> = legs.iter().map(|_| self.ids.next_request_id()).collect();

        let mut lookups = Vec::with_capacity(legs.len());
        for (req_id, leg) in req_ids.iter().zip(legs) {
            lookups.push(self.register(session, EntryKey::ContractDetails(*req_id)));
            session.send(GatewayRequest::ReqContractDetails {
                req_id: *req_id,
                contract: leg.lookup_contract(),
            })?;
        }

        let waited = self
            .wait(
                session,
                WaitPlan::new("combo_legs", self.settings.timeout_iterations),
                |st| {
                    let pending = req_ids.iter().any(|id| {
                        let ended = st
                            .contract_details
                            .get(&(slot, *id))
                            .map_or(false, |e| e.contract_details_end);
                        !ended && st.error_for(slot, *id).is_none()
                    });
                    if pending {
                        Check::Pending
                    } else {
                        Check::Done
                    }
                },
            )
            .await;

        let mut resolved = Vec::with_capacity(legs.len());
        let mut failure = None;
        for (index, (req_id, leg)) in req_ids.iter().zip(legs).enumerate() {
            let entry = self.store.take_contract_details(slot, *req_id);
            let err = self.store.error(slot, *req_id);
            let con_id = entry
                .contract_details
                .first()
                .and_then(|d| d.summary.con_id);
            match con_id {
                Some(con_id) => resolved.push(leg.to_leg(con_id)),
                None if failure.is_none() => {
                    let reason = err.map_or_else(
                        || "no contract details".to_string(),
                        |e| e.error_msg,
                    );
                    failure = Some(GatewayError::Validation(format!(
                        "combo leg {index} ({}) could not be resolved: {reason}",
                        leg.symbol
                    )));
                }
                None => {}
            }
        }
        drop(lookups);
        waited?;
        match failure {
            Some(e) => Err(e),
            None => Ok(resolved),
        }
    }
}

fn validate_batch(items: &[OrderArgs]) -> Result<(), GatewayError> {
    if items.is_empty() {
        return Err(GatewayError::Validation(
            "at least one order is required".to_string(),
        ));
    }
    for (i, args) in items.iter().enumerate() {
        args.validate()
            .map_err(|e| GatewayError::Validation(format!("order {i}: {e}")))?;
    }
    Ok(())
}
