pub mod expiry_worker;
pub mod status_poller;
