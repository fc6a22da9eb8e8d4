pub mod account;
pub mod bootstrap;
pub mod dispatcher;
pub mod error;
pub mod gateway;
pub mod market;
pub mod registry;
pub mod server;
pub mod trade;
pub mod types;

pub use bootstrap::{bootstrap_session, build_dispatcher, ApiKeyIssuer, Session};
pub use dispatcher::ToolDispatcher;
pub use error::ToolError;
pub use gateway::{ClobGateway, LimitOrder, MarketFilter, MarketGateway, MarketOrder, OrderPlacement};
pub use registry::{AccessClass, ToolName, ToolRegistry};
pub use server::PolymarketMcpServer;
pub use types::{ToolInvocation, ToolReply};
