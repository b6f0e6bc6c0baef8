pub mod domain;
pub mod error;
pub mod hierarchy;
pub mod ports;
pub mod progress;
pub mod reports;

pub use domain::{
    Priority, RecentCompletion, Subject, Subtopic, Topic, User, UserCredentials,
};
pub use error::{TrackerError, TrackerResult};
pub use hierarchy::{EntityRef, OwnershipChain};
pub use ports::{StoreError, StoreResult, StudyStore};
