use std::env;
use std::sync::Mutex;

use dotenvy::dotenv;
use log::info;
use redis::{Client, Commands};
use serde::{Deserialize, Serialize};
use snafu::Snafu;

/// Payload published to subscribers of a heat channel.
///
/// Delivery is at-least-once and only ever happens after the underlying
/// state is committed, so subscribers can treat each message as a fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HeatNotification {
    StateChanged {
        heat_number: i32,
        new_state: i32,
    },
    EventTriggered {
        trigger: u16,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tracker_id: Option<i32>,
    },
}

#[derive(Debug, Snafu)]
#[snafu(display("notification delivery failed: {}", message))]
pub struct NotifyError {
    message: String,
}

/// Live update broadcasting, consumed by the heat lifecycle core.
///
/// Implementations own their reliability policy; the core never retries.
pub trait HeatNotifier {
    fn publish(&self, channel: &str, notification: &HeatNotification) -> Result<(), NotifyError>;
}

/// Sink that writes notifications to the application log.
/// Used by the operational scripts and anywhere no broker is running.
pub struct LogNotifier;

impl HeatNotifier for LogNotifier {
    fn publish(&self, channel: &str, notification: &HeatNotification) -> Result<(), NotifyError> {
        let payload = serde_json::to_string(notification).map_err(|error| NotifyError {
            message: error.to_string(),
        })?;

        info!(target: "notifier", "[{}] {}", channel, payload);
        Ok(())
    }
}

/// Sink that publishes notifications over redis pub/sub, one redis channel
/// per heat channel name.
pub struct RedisNotifier {
    client: Client,
}

impl RedisNotifier {
    pub fn connect() -> Result<RedisNotifier, NotifyError> {
        dotenv().ok();

        let redis_url = env::var("REDIS_URL").map_err(|error| NotifyError {
            message: error.to_string(),
        })?;
        let client = Client::open(redis_url).map_err(|error| NotifyError {
            message: error.to_string(),
        })?;

        Ok(RedisNotifier { client })
    }
}

impl HeatNotifier for RedisNotifier {
    fn publish(&self, channel: &str, notification: &HeatNotification) -> Result<(), NotifyError> {
        let payload = serde_json::to_string(notification).map_err(|error| NotifyError {
            message: error.to_string(),
        })?;

        let mut conn = self.client.get_connection().map_err(|error| NotifyError {
            message: error.to_string(),
        })?;

        conn.publish::<&str, String, ()>(channel, payload)
            .map_err(|error| NotifyError {
                message: error.to_string(),
            })?;

        Ok(())
    }
}

/// Sink that records notifications in memory, in publish order.
#[derive(Default)]
pub struct MemoryNotifier {
    messages: Mutex<Vec<(String, HeatNotification)>>,
}

impl MemoryNotifier {
    pub fn new() -> MemoryNotifier {
        MemoryNotifier::default()
    }

    pub fn messages(&self) -> Vec<(String, HeatNotification)> {
        self.messages
            .lock()
            .expect("notifier lock poisoned")
            .clone()
    }
}

impl HeatNotifier for MemoryNotifier {
    fn publish(&self, channel: &str, notification: &HeatNotification) -> Result<(), NotifyError> {
        self.messages
            .lock()
            .expect("notifier lock poisoned")
            .push((channel.to_string(), notification.clone()));
        Ok(())
    }
}
