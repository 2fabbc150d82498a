//! Record builders with realistic defaults.

use ibr_schemas::{
    BarRecord, CommissionReportRecord, Contract, ContractDetailsRecord, ErrorRecord,
    ExecutionRecord, GatewayEvent, Identifier, OpenOrderRecord, Order, OrderState,
    OrderStatusRecord, PositionRecord,
};

pub fn bar(date: &str, close: f64) -> BarRecord {
    BarRecord {
        date: date.to_string(),
        open: close - 0.5,
        high: close + 0.5,
        low: close - 1.0,
        close,
        volume: 1_000,
        count: 42,
        wap: close,
        has_gaps: false,
    }
}

pub fn market_order(action: &str, qty: i64) -> Order {
    Order {
        client_id: 0,
        action: action.to_string(),
        total_quantity: qty,
        order_type: "MKT".to_string(),
        min_qty: None,
        lmt_price: None,
        aux_price: None,
        trailing_percent: None,
        trail_stop_price: None,
        tif: None,
        good_after_time: None,
        good_till_date: None,
        outside_rth: None,
        account: None,
        transmit: None,
        parent_id: None,
        oca_group: None,
        oca_type: None,
    }
}

pub fn order_status(order_id: Identifier, status: &str) -> OrderStatusRecord {
    let filled = status.eq_ignore_ascii_case("Filled");
    OrderStatusRecord {
        order_id,
        status: status.to_string(),
        filled: if filled { 100.0 } else { 0.0 },
        remaining: if filled { 0.0 } else { 100.0 },
        avg_fill_price: if filled { 187.25 } else { 0.0 },
        perm_id: 1_000 + order_id,
        parent_id: 0,
        last_fill_price: if filled { 187.25 } else { 0.0 },
        client_id: 0,
        why_held: None,
    }
}

pub fn open_order(
    order_id: Identifier,
    contract: Contract,
    order: Order,
    status: &str,
) -> OpenOrderRecord {
    OpenOrderRecord {
        order_id,
        contract,
        order,
        order_state: OrderState {
            status: status.to_string(),
            commission: None,
            warning_text: None,
        },
    }
}

/// The pair of events the gateway sends for one order reaching `status`.
pub fn order_events(
    order_id: Identifier,
    contract: Contract,
    order: Order,
    status: &str,
) -> Vec<GatewayEvent> {
    vec![
        GatewayEvent::OpenOrder(open_order(order_id, contract, order, status)),
        GatewayEvent::OrderStatus(order_status(order_id, status)),
    ]
}

pub fn error(id: Identifier, code: i32, msg: &str) -> GatewayEvent {
    GatewayEvent::Error(ErrorRecord::new(id, Some(code), msg))
}

pub fn contract_details(req_id: Identifier, mut contract: Contract, con_id: i64) -> GatewayEvent {
    contract.con_id = Some(con_id);
    GatewayEvent::ContractDetails {
        req_id,
        details: ContractDetailsRecord {
            summary: contract,
            market_name: "NMS".to_string(),
            min_tick: 0.01,
            long_name: String::new(),
            trading_class: String::new(),
            valid_exchanges: "SMART,ISLAND".to_string(),
            order_types: "LMT,MKT".to_string(),
        },
    }
}

pub fn position(account: &str, symbol: &str, qty: f64) -> PositionRecord {
    PositionRecord {
        account: account.to_string(),
        contract: Contract::stock(symbol),
        position: qty,
        avg_cost: 150.0,
    }
}

pub fn execution(exec_id: &str, order_id: Identifier) -> ExecutionRecord {
    ExecutionRecord {
        exec_id: exec_id.to_string(),
        order_id,
        client_id: 0,
        time: "20240102  10:15:00".to_string(),
        acct_number: "DU123456".to_string(),
        exchange: "ISLAND".to_string(),
        side: "BOT".to_string(),
        shares: 100.0,
        price: 187.25,
        perm_id: 1_000 + order_id,
        cum_qty: 100.0,
        avg_price: 187.25,
    }
}

pub fn commission(exec_id: &str, amount: f64) -> CommissionReportRecord {
    CommissionReportRecord {
        exec_id: exec_id.to_string(),
        commission: amount,
        currency: "USD".to_string(),
        realized_pnl: None,
        yield_: None,
        yield_redemption_date: None,
    }
}
