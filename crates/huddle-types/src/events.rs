use serde::{Deserialize, Serialize};

use crate::models::Message;

/// Server-originated events pushed over the `/ws` channel.
///
/// Client frames are relayed verbatim and never decoded into this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum GatewayEvent {
    /// A text or voice message was stored
    MessageCreated { message: Message },

    /// An admin blocked or unblocked a user
    UserBlockChanged { user_id: i64, is_blocked: bool },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageType;

    #[test]
    fn events_are_adjacently_tagged() {
        let event = GatewayEvent::MessageCreated {
            message: Message {
                id: 1,
                sender_id: 3,
                receiver_id: 2,
                company_id: 1,
                message_type: MessageType::Text,
                content: "hello".into(),
                is_read: false,
                created_at: chrono::Utc::now(),
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "message_created");
        assert_eq!(json["data"]["message"]["receiverId"], 2);
    }

    #[test]
    fn event_fields_are_camel_case() {
        let event = GatewayEvent::UserBlockChanged {
            user_id: 4,
            is_blocked: true,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "user_block_changed");
        assert_eq!(json["data"]["userId"], 4);
        assert_eq!(json["data"]["isBlocked"], true);
        assert!(json["data"].get("user_id").is_none());
    }
}
