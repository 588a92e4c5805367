//! DispatchEnvelope - Broker に載る外側のメッセージ
//!
//! kombu の Redis transport が list に LPUSH する JSON と同じ形です。
//! `body` には `TaskMessage::encode()` の結果（base64）が入ります。
//!
//! # フィールド名
//! ワイヤ上の名前は外部エコシステムに合わせる必要があるため、
//! `content-type` / `content-encoding` のようにハイフンを含むものもそのまま使います。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::errors::{DecodeError, EncodeError};
use super::message::TaskMessage;

pub const DEFAULT_QUEUE: &str = "celery";
pub const DEFAULT_EXCHANGE: &str = "celery";
pub const DEFAULT_LANG: &str = "rust";
pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_ENCODING_UTF8: &str = "utf-8";
pub const BODY_ENCODING_BASE64: &str = "base64";

/// AMQP delivery mode 2 = persistent.
pub const DELIVERY_MODE_PERSISTENT: u8 = 2;

/// Values a recycled envelope is reset to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeDefaults {
    pub routing_key: String,
    pub exchange: String,
    pub lang: String,
}

impl Default for EnvelopeDefaults {
    fn default() -> Self {
        Self {
            routing_key: DEFAULT_QUEUE.to_string(),
            exchange: DEFAULT_EXCHANGE.to_string(),
            lang: DEFAULT_LANG.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryInfo {
    pub routing_key: String,
    pub exchange: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Properties {
    #[serde(default)]
    pub priority: u8,

    /// Message TTL in milliseconds, as a decimal string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<String>,

    pub body_encoding: String,
    pub correlation_id: String,
    pub reply_to: String,
    pub delivery_info: DeliveryInfo,
    pub delivery_mode: u8,
    pub delivery_tag: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchEnvelope {
    pub body: String,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub headers: Map<String, Value>,

    #[serde(rename = "content-type")]
    pub content_type: String,

    pub properties: Properties,

    #[serde(rename = "content-encoding")]
    pub content_encoding: String,
}

impl DispatchEnvelope {
    /// Empty body, fresh correlation/reply/delivery ids.
    pub fn new(defaults: &EnvelopeDefaults) -> Self {
        let mut envelope = Self {
            body: String::new(),
            headers: Map::new(),
            content_type: String::new(),
            properties: Properties {
                priority: 0,
                expiration: None,
                body_encoding: String::new(),
                correlation_id: Uuid::new_v4().to_string(),
                reply_to: Uuid::new_v4().to_string(),
                delivery_info: DeliveryInfo {
                    routing_key: String::new(),
                    exchange: String::new(),
                },
                delivery_mode: DELIVERY_MODE_PERSISTENT,
                delivery_tag: Uuid::new_v4().to_string(),
            },
            content_encoding: String::new(),
        };
        envelope.reset(defaults);
        envelope
    }

    /// Clear the body and every per-task property. Ids are left untouched.
    pub fn reset(&mut self, defaults: &EnvelopeDefaults) {
        self.body.clear();
        self.headers.clear();
        self.headers
            .insert("lang".to_string(), Value::String(defaults.lang.clone()));
        self.content_type = CONTENT_TYPE_JSON.to_string();
        self.content_encoding = CONTENT_ENCODING_UTF8.to_string();

        let props = &mut self.properties;
        props.priority = 0;
        props.expiration = None;
        props.body_encoding = BODY_ENCODING_BASE64.to_string();
        props.delivery_info.routing_key.clone_from(&defaults.routing_key);
        props.delivery_info.exchange.clone_from(&defaults.exchange);
        props.delivery_mode = DELIVERY_MODE_PERSISTENT;
    }

    /// Destination queue name.
    pub fn routing_key(&self) -> &str {
        &self.properties.delivery_info.routing_key
    }

    pub fn set_queue(&mut self, queue: &str) {
        let info = &mut self.properties.delivery_info;
        info.routing_key = queue.to_string();
        info.exchange = queue.to_string();
    }

    pub fn decode_task(&self) -> Result<TaskMessage, DecodeError> {
        if self.properties.body_encoding != BODY_ENCODING_BASE64 {
            return Err(DecodeError::Invalid(format!(
                "unsupported body_encoding={}",
                self.properties.body_encoding
            )));
        }
        TaskMessage::decode(&self.body)
    }

    pub fn to_json(&self) -> Result<String, EncodeError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self, DecodeError> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_envelope_has_protocol_defaults() {
        let envelope = DispatchEnvelope::new(&EnvelopeDefaults::default());

        assert_eq!(envelope.content_type, "application/json");
        assert_eq!(envelope.content_encoding, "utf-8");
        assert_eq!(envelope.headers["lang"], json!("rust"));
        assert_eq!(envelope.properties.body_encoding, "base64");
        assert_eq!(envelope.properties.delivery_mode, 2);
        assert_eq!(envelope.routing_key(), "celery");
        assert_eq!(envelope.properties.delivery_info.exchange, "celery");
        assert!(envelope.properties.expiration.is_none());
    }

    #[test]
    fn wire_shape_matches_redis_transport() {
        let mut envelope = DispatchEnvelope::new(&EnvelopeDefaults::default());
        envelope.body = "e30=".to_string();
        envelope.properties.correlation_id = "c".to_string();
        envelope.properties.reply_to = "r".to_string();
        envelope.properties.delivery_tag = "d".to_string();

        let v: Value = serde_json::from_str(&envelope.to_json().unwrap()).unwrap();
        assert_eq!(
            v,
            json!({
                "body": "e30=",
                "headers": {"lang": "rust"},
                "content-type": "application/json",
                "properties": {
                    "priority": 0,
                    "body_encoding": "base64",
                    "correlation_id": "c",
                    "reply_to": "r",
                    "delivery_info": {"routing_key": "celery", "exchange": "celery"},
                    "delivery_mode": 2,
                    "delivery_tag": "d"
                },
                "content-encoding": "utf-8"
            })
        );
    }

    #[test]
    fn expiration_is_serialized_when_set() {
        let mut envelope = DispatchEnvelope::new(&EnvelopeDefaults::default());
        envelope.properties.expiration = Some("1500".to_string());

        let v: Value = serde_json::from_str(&envelope.to_json().unwrap()).unwrap();
        assert_eq!(v["properties"]["expiration"], json!("1500"));
    }

    #[test]
    fn reset_restores_defaults() {
        let defaults = EnvelopeDefaults::default();
        let mut envelope = DispatchEnvelope::new(&defaults);
        envelope.body = "abc".to_string();
        envelope.set_queue("q1");
        envelope.properties.priority = 9;
        envelope.properties.expiration = Some("10".to_string());
        envelope.headers.insert("x".to_string(), json!(1));

        envelope.reset(&defaults);

        assert!(envelope.body.is_empty());
        assert_eq!(envelope.routing_key(), "celery");
        assert_eq!(envelope.properties.priority, 0);
        assert!(envelope.properties.expiration.is_none());
        assert!(envelope.headers.get("x").is_none());
    }

    #[test]
    fn decode_task_reads_body() {
        let mut task = TaskMessage::new("tasks.add");
        task.args = vec![json!(1)];

        let mut envelope = DispatchEnvelope::new(&EnvelopeDefaults::default());
        envelope.body = task.encode().unwrap();

        let parsed = DispatchEnvelope::from_json(&envelope.to_json().unwrap()).unwrap();
        assert_eq!(parsed.decode_task().unwrap(), task);
    }

    #[test]
    fn decode_task_rejects_unknown_body_encoding() {
        let mut envelope = DispatchEnvelope::new(&EnvelopeDefaults::default());
        envelope.body = TaskMessage::new("tasks.add").encode().unwrap();
        envelope.properties.body_encoding = "utf-8".to_string();

        assert!(matches!(
            envelope.decode_task().unwrap_err(),
            DecodeError::Invalid(_)
        ));
    }
}
