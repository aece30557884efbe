//! Execution engine (C4 + C7): turn a [`PlaceOrderRequest`] into a `NEW`
//! order, then fill `NEW` orders against the next candle's open once it
//! exists — placement and fill are deliberately two separate operations so
//! an order placed during candle `t` can never fill at `t`'s own open.

use chrono::{DateTime, Utc};
use fxt_candles::CandleStore;
use fxt_pricing::PricingConfig;
use fxt_schemas::{EngineError, EngineResult, Fill, Micros, Order, OrderStatus, OrderType, PlaceOrderRequest};
use tracing::info;
use uuid::Uuid;

use crate::oms;
use crate::store::OrderStore;

/// Orders processed per [`process_new_orders_for_candle`] call. Generous
/// relative to this system's single-symbol, single-account order volume.
const MAX_PENDING_ORDERS: i64 = 10_000;

fn idempotency_matches(existing: &Order, req: &PlaceOrderRequest) -> bool {
    existing.symbol == req.symbol && existing.side == req.side && existing.qty == req.qty
}

/// Place a market order for `req` as `NEW`, stamped with `ts` (the
/// reference candle's `open_time`). No fill happens here — a `NEW` order
/// fills only when [`process_new_orders_for_candle`] is later invoked for
/// the first candle whose `open_time > ts`. Re-submitting the same
/// `idempotency_key` with identical parameters returns the original order
/// unchanged; re-submitting it with different parameters is an
/// [`EngineError::IdempotencyConflict`] — spec calls this out as the safer
/// default over a silent mismatch.
pub async fn place(store: &OrderStore, req: &PlaceOrderRequest, ts: DateTime<Utc>) -> EngineResult<Order> {
    if let Some(key) = &req.idempotency_key {
        if let Some(existing) = store
            .find_by_idempotency_key(key)
            .await
            .map_err(|e| EngineError::StoreUnavailable(e.to_string()))?
        {
            if !idempotency_matches(&existing, req) {
                return Err(EngineError::IdempotencyConflict(format!(
                    "idempotency key {key} already used for a different order"
                )));
            }
            info!(order_id = %existing.id, %key, "idempotent re-submit, returning existing order");
            return Ok(existing);
        }
    }

    if req.qty <= 0 {
        return Err(EngineError::Validation("qty must be positive".to_string()));
    }

    let order = Order {
        id: Uuid::new_v4(),
        ts,
        symbol: req.symbol.clone(),
        side: req.side,
        order_type: OrderType::Market,
        qty: req.qty,
        status: OrderStatus::New,
        reason: None,
        requested_price: None,
        idempotency_key: req.idempotency_key.clone(),
    };
    store
        .insert_new(&order)
        .await
        .map_err(|e| EngineError::StoreUnavailable(e.to_string()))?;

    info!(order_id = %order.id, symbol = %req.symbol, side = req.side.as_str(), qty = req.qty, "order placed NEW, awaiting next-open fill");
    Ok(order)
}

/// Fill every `NEW` order for `(symbol, tf)` whose required next candle is
/// exactly `fill_candle_open_time` — an order placed at candle `t` fills
/// only at the first candle with `open_time > t`. Orders whose next candle
/// isn't `fill_candle_open_time` (because it doesn't exist yet, or because
/// this call targets an earlier candle) are left `NEW` for a later call.
///
/// Fails with [`EngineError::DeterministicSafety`] and persists nothing if
/// `fill_candle_open_time` itself isn't in the candle store — there is no
/// price to fill against.
pub async fn process_new_orders_for_candle(
    store: &OrderStore,
    candles: &CandleStore,
    pricing: &PricingConfig,
    symbol: &str,
    timeframe: &str,
    fill_candle_open_time: DateTime<Utc>,
) -> EngineResult<Vec<Fill>> {
    let fill_candle = candles
        .get_at(symbol, timeframe, fill_candle_open_time)
        .await
        .map_err(|e| EngineError::StoreUnavailable(e.to_string()))?
        .ok_or_else(|| {
            EngineError::DeterministicSafety(format!(
                "fill candle {fill_candle_open_time} not found for {symbol}/{timeframe}"
            ))
        })?;

    let pending = store
        .list(Some(symbol), Some(OrderStatus::New), MAX_PENDING_ORDERS)
        .await
        .map_err(|e| EngineError::StoreUnavailable(e.to_string()))?;

    let mut fills = Vec::new();
    for order in pending {
        let next = candles
            .next_after(symbol, timeframe, order.ts)
            .await
            .map_err(|e| EngineError::StoreUnavailable(e.to_string()))?;
        let eligible = matches!(&next, Some(c) if c.open_time == fill_candle_open_time);
        if !eligible {
            continue;
        }

        let fill_price = pricing.fill_price(&fill_candle, order.side);
        let slippage = pricing.slippage_amount();
        let (_, fill) = oms::fill(&order, fill_price, Micros::ZERO, slippage, fill_candle_open_time)?;
        store
            .mark_filled(order.id, &fill)
            .await
            .map_err(|e| EngineError::StoreUnavailable(e.to_string()))?;
        info!(order_id = %order.id, symbol, side = order.side.as_str(), qty = order.qty, price = %fill_price, "next-open fill");
        fills.push(fill);
    }
    Ok(fills)
}

/// Reject a `NEW` order the risk gate declined before it reached [`place`].
pub async fn reject(store: &OrderStore, order: &Order, reason: &str) -> EngineResult<Order> {
    let rejected = oms::reject(order, reason)?;
    store
        .mark_rejected(order.id, reason)
        .await
        .map_err(|e| EngineError::StoreUnavailable(e.to_string()))?;
    Ok(rejected)
}

/// Cancel a `NEW` order. Fails with [`EngineError::InvalidStateTransition`]
/// once the order has reached a terminal state.
pub async fn cancel(store: &OrderStore, order_id: Uuid) -> EngineResult<Order> {
    let order = store
        .get(order_id)
        .await
        .map_err(|e| EngineError::StoreUnavailable(e.to_string()))?
        .ok_or_else(|| EngineError::NotFound(format!("order {order_id}")))?;
    let canceled = oms::cancel(&order)?;
    store
        .mark_canceled(order_id)
        .await
        .map_err(|e| EngineError::StoreUnavailable(e.to_string()))?;
    Ok(canceled)
}
