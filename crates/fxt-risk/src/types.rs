use fxt_schemas::{Micros, Side};

/// Everything risk needs about the book to evaluate one request, gathered
/// by the caller (orchestrator) from accounting + positions before the
/// call — this module stays pure and reads no state of its own.
#[derive(Clone, Debug, PartialEq)]
pub struct RiskRequest {
    pub symbol: String,
    pub side: Side,
    pub requested_qty: i64,
    pub reference_price: Micros,
    pub stop_loss_price: Option<Micros>,
    pub open_positions_count: i32,
    pub open_positions_count_for_symbol: i32,
    pub open_notional_total: Micros,
    pub open_notional_for_symbol: Micros,
}
