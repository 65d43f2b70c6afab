pub mod bookings;
pub mod notifications;
pub mod rate_limit;
pub mod scheduling;
