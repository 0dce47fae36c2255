pub mod booking;
pub mod payment;
pub mod selection;
pub mod service;
