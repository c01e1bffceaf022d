//! Scheduled reminder delivery.
//!
//! The [`dispatcher::Dispatcher`] expands every recipient's schedule into
//! one [`delivery::DeliveryTask`] per offset, runs them all concurrently and
//! waits for every one to finish. Tasks sharing a payload stop calling the
//! endpoint once any of them has been told the customer paid.

pub mod client;
pub mod delivery;
pub mod dispatcher;
