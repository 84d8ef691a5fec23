//! Adapters for the external collaborators: the Ticketmaster Discovery
//! API (fetch), SQLite (price history + alert log) and SMTP (email
//! notifications).

pub mod email;
pub mod errors;
pub mod sqlite;
pub mod ticketmaster;
pub mod traits;

// Re-export commonly used types for convenience
pub use email::{EmailNotifier, EmailSettings};
pub use errors::{FetchError, FetchResult, SendError, SendResult, StoreError, StoreResult};
pub use sqlite::SqlitePriceStore;
pub use ticketmaster::{TicketmasterClient, TicketmasterSettings};
pub use traits::{Notifier, PriceFetcher, PriceStore};
