pub mod call_service;
pub mod message_service;
pub mod thread_service;
