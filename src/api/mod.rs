pub mod client;
pub mod enrich;
pub mod pagination;
pub mod threads;
pub mod transport;

pub use client::*;
pub use pagination::{Collected, Page, PagePolicy};
pub use transport::{RemoteOperation, Transport};
