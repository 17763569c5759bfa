pub mod booking;
pub mod checkout;
pub mod clock;
pub mod conflicts;
pub mod expansion;
pub mod holds;
pub mod lifecycle;
pub mod notify;
pub mod orders;
pub mod payments;
pub mod pricing;
pub mod reconcile;
pub mod vouchers;
