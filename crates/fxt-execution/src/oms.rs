//! Order lifecycle (C7): `NEW -> {FILLED, REJECTED, CANCELED}`.
//!
//! Three terminal states, no partial fills, no amend — every order in this
//! system is a single market order filled in full at the next open or not
//! at all. Transitions are pure; persistence lives in [`crate::store`].

use chrono::{DateTime, Utc};
use fxt_schemas::{EngineError, EngineResult, Fill, Micros, Order, OrderStatus};
use uuid::Uuid;

/// Fill a `NEW` order in full at `price`. Fails if the order has already
/// left the `NEW` state — fills never apply twice.
pub fn fill(order: &Order, price: Micros, fee: Micros, slippage: Micros, ts: DateTime<Utc>) -> EngineResult<(Order, Fill)> {
    require_new(order)?;
    let mut filled = order.clone();
    filled.status = OrderStatus::Filled;

    let fill = Fill {
        id: Uuid::new_v4(),
        order_id: order.id,
        ts,
        symbol: order.symbol.clone(),
        side: order.side,
        qty: order.qty,
        price,
        fee,
        slippage,
        accounted_at_open_time: None,
    };
    Ok((filled, fill))
}

/// Reject a `NEW` order (risk gate declined it, or sizing rounded to zero).
pub fn reject(order: &Order, reason: impl Into<String>) -> EngineResult<Order> {
    require_new(order)?;
    let mut rejected = order.clone();
    rejected.status = OrderStatus::Rejected;
    rejected.reason = Some(reason.into());
    Ok(rejected)
}

/// Cancel a `NEW` order before it reaches a fill decision.
pub fn cancel(order: &Order) -> EngineResult<Order> {
    require_new(order)?;
    let mut canceled = order.clone();
    canceled.status = OrderStatus::Canceled;
    Ok(canceled)
}

fn require_new(order: &Order) -> EngineResult<()> {
    if order.status != OrderStatus::New {
        return Err(EngineError::InvalidStateTransition(format!(
            "order {} is {}, not NEW",
            order.id,
            order.status.as_str()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fxt_schemas::{OrderType, Side};

    fn new_order() -> Order {
        Order {
            id: Uuid::new_v4(),
            ts: Utc::now(),
            symbol: "EURUSD".to_string(),
            side: Side::Buy,
            order_type: OrderType::Market,
            qty: 1000,
            status: OrderStatus::New,
            reason: None,
            requested_price: None,
            idempotency_key: Some("k1".to_string()),
        }
    }

    #[test]
    fn fill_transitions_new_to_filled() {
        let o = new_order();
        let (filled, f) = fill(&o, Micros::new(1_100_000), Micros::ZERO, Micros::ZERO, Utc::now()).unwrap();
        assert_eq!(filled.status, OrderStatus::Filled);
        assert_eq!(f.order_id, o.id);
        assert_eq!(f.qty, o.qty);
    }

    #[test]
    fn fill_on_already_filled_order_is_rejected() {
        let o = new_order();
        let (filled, _) = fill(&o, Micros::new(1_100_000), Micros::ZERO, Micros::ZERO, Utc::now()).unwrap();
        let err = fill(&filled, Micros::new(1_100_000), Micros::ZERO, Micros::ZERO, Utc::now()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidStateTransition(_)));
    }

    #[test]
    fn cancel_only_valid_from_new() {
        let o = new_order();
        let canceled = cancel(&o).unwrap();
        assert_eq!(canceled.status, OrderStatus::Canceled);
        assert!(cancel(&canceled).is_err());
    }
}
