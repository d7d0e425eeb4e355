pub mod engine;
pub mod inbox;
pub mod message;
pub mod topic;

pub use engine::Broker;
pub use inbox::BrokerInbox;
