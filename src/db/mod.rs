mod schema;
pub mod sqlite;
pub mod subscriptions;

pub use schema::SCHEMA;
pub use sqlite::Database;
pub use subscriptions::{
    dedup_days, Location, OwnerId, StoreError, Subscription, SubscriptionFields,
    MAX_SUBSCRIPTIONS_PER_OWNER,
};
