pub mod chunk_store;
pub mod deletion;
pub mod error;
pub mod reassembler;
pub mod storage;
pub mod upload_service;
