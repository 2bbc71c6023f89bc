pub mod checkin;
pub mod issuance;
pub mod orders;
pub mod pricing;
pub mod scanner_auth;
pub mod token;

pub use checkin::{CheckInCoordinator, ScanOutcome};
pub use issuance::{IssuanceService, IssuedTicket};
pub use orders::OrderService;
pub use scanner_auth::{ScannerAuth, ScannerIdentity};
pub use token::{TicketClaims, TokenCodec};
