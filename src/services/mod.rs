pub mod audit;
pub mod limiter;
pub mod listing;
pub mod memory_store;
pub mod naming;
pub mod provisioner;
pub mod storage;
pub mod transfer;
pub mod upload_service;
pub mod webdav;
