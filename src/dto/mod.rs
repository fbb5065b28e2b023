pub mod availability;
pub mod bookings;
pub mod shops;
pub mod wallet;
