pub mod booking;
pub mod catalog;
pub mod court;
pub mod events;
pub mod order;
pub mod payment;
pub mod voucher;

pub use booking::{Booking, BookingStatus, Occurrence, OccurrenceStatus};
pub use catalog::{Customer, Product, ServiceItem};
pub use court::{Court, CourtStatus, PricingRule};
pub use events::EngineEvent;
pub use order::{Order, OrderItem, OrderStatus, ServiceBilling, ServiceLine};
pub use payment::{Payment, PaymentMethod, PaymentStatus};
pub use voucher::{DiscountType, Voucher};
