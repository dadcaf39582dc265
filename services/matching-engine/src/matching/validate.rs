//! Command-boundary validation
//!
//! Every rejection happens here, before any book mutation. A rejected
//! submission produces no trades and no events.

use types::errors::EngineError;
use types::ids::Symbol;
use types::order::{OrderRequest, OrderType, RejectReason};

use crate::config::SymbolRules;

/// Validate a submission against the engine's symbol and its rules.
pub fn validate_request(
    engine_symbol: &Symbol,
    request: &OrderRequest,
    rules: &SymbolRules,
) -> Result<(), EngineError> {
    if request.symbol != *engine_symbol {
        return Err(EngineError::InvalidOrder(RejectReason::WrongSymbol));
    }

    if !request.quantity.is_positive() {
        return Err(EngineError::InvalidOrder(RejectReason::InvalidQuantity));
    }
    if let Some(lot) = rules.lot_size {
        if !request.quantity.is_on_quantum(lot) {
            return Err(EngineError::InvalidOrder(RejectReason::QuantityOffLot));
        }
    }

    match request.order_type {
        OrderType::Limit => {
            let price = request
                .price
                .ok_or(EngineError::InvalidOrder(RejectReason::MissingPrice))?;
            if let Some(tick) = rules.tick_size {
                if !price.is_on_quantum(tick) {
                    return Err(EngineError::InvalidOrder(RejectReason::PriceOffTick));
                }
            }
        }
        OrderType::Market => {
            if request.price.is_some() {
                return Err(EngineError::InvalidOrder(RejectReason::MarketOrderWithPrice));
            }
            if !rules.accept_market_orders {
                return Err(EngineError::InvalidOrder(RejectReason::MarketOrdersDisabled));
            }
        }
    }

    Ok(())
}
