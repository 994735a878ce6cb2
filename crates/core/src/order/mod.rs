//! Ticket orders: domain types, the in-memory order table and the intake.

mod intake;
mod store;
mod types;

pub use intake::{IntakeError, OrderIntake};
pub use store::OrderStore;
pub use types::{
    default_processing_time, ticket_price_for, CompletionEvent, EventType, Order, OrderMessage,
    OrderStatus, UnknownEventType,
};
