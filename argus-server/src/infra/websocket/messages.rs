use argus_core::{AlertEvent, Camera, LifecyclePhase};
use axum::extract::ws::Utf8Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const WELCOME_MESSAGE: &str = "Connected to face detection alerts";

/// Events pushed to clients. Field names are part of the wire contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum OutboundEvent {
    Connected { message: String, client_id: String },
    Alert { data: AlertEvent },
    CameraStatus { camera_id: String, data: CameraStatus },
    Pong,
    Subscribed { camera_id: String },
}

impl OutboundEvent {
    pub fn connected(session_id: &str) -> Self {
        Self::Connected {
            message: WELCOME_MESSAGE.to_string(),
            client_id: session_id.to_string(),
        }
    }

    pub fn camera_status(camera: &Camera, phase: LifecyclePhase) -> Self {
        Self::CameraStatus {
            camera_id: camera.id.clone(),
            data: CameraStatus::new(camera, phase),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::Alert { .. } => "alert",
            Self::CameraStatus { .. } => "camera_status",
            Self::Pong => "pong",
            Self::Subscribed { .. } => "subscribed",
        }
    }

    /// Serialize into a text frame payload.
    pub fn to_frame(&self) -> Result<Utf8Bytes, serde_json::Error> {
        serde_json::to_string(self).map(Utf8Bytes::from)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraStatus {
    pub phase: LifecyclePhase,
    pub is_streaming: bool,
    pub is_enabled: bool,
    pub updated_at: DateTime<Utc>,
}

impl CameraStatus {
    pub fn new(camera: &Camera, phase: LifecyclePhase) -> Self {
        Self {
            phase,
            is_streaming: camera.is_streaming,
            is_enabled: camera.is_enabled,
            updated_at: camera.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum InboundMessage {
    Ping,
    Subscribe { camera_id: String },
}

const INBOUND_TYPES: [&str; 2] = ["ping", "subscribe"];

/// What the connection should do in response to one inbound text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Reply(OutboundEvent),
    Subscribe { camera_id: String },
    Ignore(Ignored),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ignored {
    UnknownType(String),
    Malformed(String),
}

/// Route an inbound frame by its `type` field. Never fails: anything that
/// is not a recognised message becomes [`Effect::Ignore`].
pub fn dispatch(raw: &str) -> Effect {
    let value: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(err) => return Effect::Ignore(Ignored::Malformed(err.to_string())),
    };

    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .map(str::to_owned);

    match serde_json::from_value::<InboundMessage>(value) {
        Ok(InboundMessage::Ping) => Effect::Reply(OutboundEvent::Pong),
        Ok(InboundMessage::Subscribe { camera_id }) if camera_id.trim().is_empty() => {
            Effect::Ignore(Ignored::Malformed("subscribe requires a cameraId".into()))
        }
        Ok(InboundMessage::Subscribe { camera_id }) => Effect::Subscribe { camera_id },
        Err(err) => match kind {
            Some(kind) if !INBOUND_TYPES.contains(&kind.as_str()) => {
                Effect::Ignore(Ignored::UnknownType(kind))
            }
            _ => Effect::Ignore(Ignored::Malformed(err.to_string())),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argus_core::{Alert, BoundingBox, NewAlert};
    use serde_json::json;

    #[test]
    fn ping_replies_pong() {
        assert_eq!(
            dispatch(r#"{"type":"ping"}"#),
            Effect::Reply(OutboundEvent::Pong)
        );
    }

    #[test]
    fn subscribe_records_camera() {
        assert_eq!(
            dispatch(r#"{"type":"subscribe","cameraId":"cam1"}"#),
            Effect::Subscribe {
                camera_id: "cam1".into()
            }
        );
    }

    #[test]
    fn unknown_and_malformed_frames_are_ignored() {
        assert_eq!(
            dispatch(r#"{"type":"dance"}"#),
            Effect::Ignore(Ignored::UnknownType("dance".into()))
        );
        assert!(matches!(
            dispatch("not json"),
            Effect::Ignore(Ignored::Malformed(_))
        ));
        assert!(matches!(
            dispatch(r#"{"type":"subscribe"}"#),
            Effect::Ignore(Ignored::Malformed(_))
        ));
        assert!(matches!(
            dispatch(r#"{"type":"subscribe","cameraId":"  "}"#),
            Effect::Ignore(Ignored::Malformed(_))
        ));
        assert!(matches!(
            dispatch(r#"{"cameraId":"cam1"}"#),
            Effect::Ignore(Ignored::Malformed(_))
        ));
    }

    #[test]
    fn outbound_wire_shapes() {
        let connected = serde_json::to_value(OutboundEvent::connected("u1_1_0")).unwrap();
        assert_eq!(
            connected,
            json!({
                "type": "connected",
                "message": "Connected to face detection alerts",
                "clientId": "u1_1_0",
            })
        );

        assert_eq!(
            serde_json::to_value(OutboundEvent::Pong).unwrap(),
            json!({"type": "pong"})
        );
        assert_eq!(
            serde_json::to_value(OutboundEvent::Subscribed {
                camera_id: "cam1".into()
            })
            .unwrap(),
            json!({"type": "subscribed", "cameraId": "cam1"})
        );

        let camera = Camera::new("cam1", "Lobby", "rtsp://a");
        let status =
            serde_json::to_value(OutboundEvent::camera_status(&camera, LifecyclePhase::Starting))
                .unwrap();
        assert_eq!(status["type"], "camera_status");
        assert_eq!(status["cameraId"], "cam1");
        assert_eq!(status["data"]["phase"], "starting");
        assert_eq!(status["data"]["isStreaming"], false);
    }

    #[test]
    fn alert_payload_keeps_detection_values() {
        let alert = Alert::from_new(NewAlert::new(
            "cam1",
            0.95,
            BoundingBox::new(100.0, 50.0, 80.0, 100.0),
        ));
        let camera = Camera::new("cam1", "Lobby", "rtsp://a").with_location("Entrance");
        let event = OutboundEvent::Alert {
            data: AlertEvent::from_record(&alert, Some(camera.summary())),
        };

        let value: Value = serde_json::from_str(event.to_frame().unwrap().as_str()).unwrap();
        assert_eq!(value["type"], "alert");
        assert_eq!(value["data"]["cameraId"], "cam1");
        assert_eq!(value["data"]["confidence"], 0.95);
        assert_eq!(
            value["data"]["boundingBox"],
            json!({"x": 100.0, "y": 50.0, "width": 80.0, "height": 100.0})
        );
        assert_eq!(value["data"]["camera"]["location"], "Entrance");
    }
}
