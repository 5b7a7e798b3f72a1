pub mod session;
pub mod table_claim;

pub use session::Session;
pub use table_claim::TableClaim;
