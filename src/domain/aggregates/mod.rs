//! Aggregates module
pub mod menu;
pub mod order;
pub mod cart;

pub use menu::{MenuItem, MenuItemDetails};
pub use order::{Customer, NewOrder, Order, OrderHistoryRecord, OrderLine, OrderStatus, PaymentMethod};
pub use cart::{Cart, CartLine, CartOwner};
