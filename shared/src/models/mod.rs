//! Domain models for the Fertilizer Procurement Platform

mod allocation;
mod batch;
mod delivery_order;
mod distribution;
mod lifecycle;
mod reference;
mod user;

pub use allocation::*;
pub use batch::*;
pub use delivery_order::*;
pub use distribution::*;
pub use lifecycle::*;
pub use reference::*;
pub use user::*;
