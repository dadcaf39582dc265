//! Market data fan-out
//!
//! Consumes committed engine events and produces:
//! - `book.<symbol>` and `trades.<symbol>` pub/sub channels
//! - A last-traded-price cache
//! - Multi-timeframe OHLCV candles
//! - A bounded public trade history per symbol
//!
//! The authoritative book lives in the engine; everything here is
//! derived from the event stream and can be rebuilt from it.

pub mod bus;
pub mod candles;
pub mod last_price;
pub mod publisher;
pub mod trades;

pub use bus::{book_topic, trades_topic, BookUpdate, MarketBus};
pub use candles::{Candle, CandleSeries, CandleStore, Timeframe};
pub use last_price::LastPriceCache;
pub use publisher::MarketPublisher;
pub use trades::{PublicTrade, TradeHistory};
