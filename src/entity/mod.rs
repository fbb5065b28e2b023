pub mod booking_services;
pub mod bookings;
pub mod business_hours;
pub mod feedbacks;
pub mod outbox_events;
pub mod services;
pub mod shops;
pub mod special_closing_days;
pub mod users;
pub mod wallet_transactions;
pub mod wallets;

pub use booking_services::Entity as BookingServices;
pub use bookings::Entity as Bookings;
pub use business_hours::Entity as BusinessHours;
pub use feedbacks::Entity as Feedbacks;
pub use outbox_events::Entity as OutboxEvents;
pub use services::Entity as Services;
pub use shops::Entity as Shops;
pub use special_closing_days::Entity as SpecialClosingDays;
pub use users::Entity as Users;
pub use wallet_transactions::Entity as WalletTransactions;
pub use wallets::Entity as Wallets;
