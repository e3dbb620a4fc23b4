//! Reply policy: pure lookup from a normalized message to outbound reply
//! content, plus the passive-reply XML rendering.
//!
//! No state and no I/O; the webhook server decides what to do with the
//! result (the platform is acknowledged with an empty body either way).

use crate::webhook::payload::NormalizedMessage;

/// Fallback line for anything the table does not cover.
const FALLBACK_TEXT: &str = "Sorry, I did not catch that.";

/// Outbound reply content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyContent {
    /// Plain text reply.
    Text(String),
    /// Echo an uploaded image back by media id.
    Image {
        /// Platform media id of the image.
        media_id: String,
    },
    /// Echo an uploaded voice clip back by media id.
    Voice {
        /// Platform media id of the clip.
        media_id: String,
    },
}

/// One reply addressed back to the sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Recipient (the original sender).
    pub to_user: String,
    /// Sender (the account itself).
    pub from_user: String,
    /// Reply creation time, unix seconds.
    pub create_time: i64,
    /// Reply content.
    pub content: ReplyContent,
}

/// Decide the reply for one delivered message.
pub fn decide(message: &NormalizedMessage, create_time: i64) -> Reply {
    let content = match message.msg_type() {
        "text" => decide_text(message.get("Content").unwrap_or("")),
        "image" => match message.get("MediaId") {
            Some(media_id) => ReplyContent::Image {
                media_id: media_id.to_string(),
            },
            None => ReplyContent::Text(FALLBACK_TEXT.to_string()),
        },
        "voice" => match message.get("MediaId") {
            Some(media_id) => ReplyContent::Voice {
                media_id: media_id.to_string(),
            },
            None => ReplyContent::Text(FALLBACK_TEXT.to_string()),
        },
        "location" => ReplyContent::Text(format!(
            "latitude: {}\tlongitude: {}\tscale: {}\tlabel: {}",
            message.get("Location_X").unwrap_or(""),
            message.get("Location_Y").unwrap_or(""),
            message.get("Scale").unwrap_or(""),
            message.get("Label").unwrap_or(""),
        )),
        "event" => decide_event(message),
        _ => ReplyContent::Text(FALLBACK_TEXT.to_string()),
    };

    Reply {
        to_user: message.from_user().to_string(),
        from_user: message.to_user().to_string(),
        create_time,
        content,
    }
}

fn decide_text(content: &str) -> ReplyContent {
    let text = match content {
        "1" => "Winner winner, chicken dinner!",
        "2" => "Better luck next time.",
        _ if content.contains("love") => "Love you too ~",
        _ => FALLBACK_TEXT,
    };
    ReplyContent::Text(text.to_string())
}

fn decide_event(message: &NormalizedMessage) -> ReplyContent {
    let text = match message.get("Event").unwrap_or("") {
        "subscribe" => {
            if message.get("EventKey").is_some() {
                "Welcome! You subscribed by scanning a tagged QR code.".to_string()
            } else {
                "Welcome aboard!".to_string()
            }
        }
        "unsubscribe" => FALLBACK_TEXT.to_string(),
        "SCAN" => "You are already subscribed; scanned a tagged QR code again.".to_string(),
        "LOCATION" => format!(
            "latitude: {}\tlongitude: {}\tprecision: {}",
            message.get("Latitude").unwrap_or(""),
            message.get("Longitude").unwrap_or(""),
            message.get("Precision").unwrap_or(""),
        ),
        "CLICK" => format!(
            "You clicked the button: {}",
            message.get("EventKey").unwrap_or("")
        ),
        _ => FALLBACK_TEXT.to_string(),
    };
    ReplyContent::Text(text)
}

/// Render a reply in the platform's passive-reply XML form.
pub fn render_xml(reply: &Reply) -> String {
    let body = match &reply.content {
        ReplyContent::Text(text) => {
            format!("<Content><![CDATA[{}]]></Content>", text)
        }
        ReplyContent::Image { media_id } => format!(
            "<Image><MediaId><![CDATA[{}]]></MediaId></Image>",
            media_id
        ),
        ReplyContent::Voice { media_id } => format!(
            "<Voice><MediaId><![CDATA[{}]]></MediaId></Voice>",
            media_id
        ),
    };
    let msg_type = match &reply.content {
        ReplyContent::Text(_) => "text",
        ReplyContent::Image { .. } => "image",
        ReplyContent::Voice { .. } => "voice",
    };
    format!(
        "<xml><ToUserName><![CDATA[{}]]></ToUserName><FromUserName><![CDATA[{}]]></FromUserName><CreateTime>{}</CreateTime><MsgType><![CDATA[{}]]></MsgType>{}</xml>",
        reply.to_user, reply.from_user, reply.create_time, msg_type, body
    )
}
