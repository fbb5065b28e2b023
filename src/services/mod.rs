pub mod availability_service;
pub mod booking_service;
pub mod feedback_service;
pub mod shop_service;
pub mod wallet_service;
