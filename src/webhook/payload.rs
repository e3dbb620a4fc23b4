//! Delivery payload decoding and normalization.
//!
//! The platform delivers user events as a flat `<xml>` document whose
//! children each wrap one value in CDATA. Decoding produces per-field
//! value sequences (repeated elements accumulate); normalization keeps the
//! first value of every non-empty sequence and drops the rest, yielding
//! the flat attribute map the reply policy consumes.

use crate::errors::WxGateError;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use std::collections::BTreeMap;

/// Field name sequences decoded from one payload.
pub type FieldSequences = BTreeMap<String, Vec<String>>;

/// Flat attribute view of one delivered message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedMessage {
    attrs: BTreeMap<String, String>,
}

impl NormalizedMessage {
    /// Build from already-normalized attributes.
    pub fn from_attrs(attrs: BTreeMap<String, String>) -> Self {
        Self { attrs }
    }

    /// Look up one attribute.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    /// Message-type discriminator (`text`, `image`, `voice`, `location`,
    /// `event`), empty if the payload carried none.
    pub fn msg_type(&self) -> &str {
        self.get("MsgType").unwrap_or("")
    }

    /// Sender open-id.
    pub fn from_user(&self) -> &str {
        self.get("FromUserName").unwrap_or("")
    }

    /// Receiver account id.
    pub fn to_user(&self) -> &str {
        self.get("ToUserName").unwrap_or("")
    }

    /// All attributes.
    pub fn attrs(&self) -> &BTreeMap<String, String> {
        &self.attrs
    }
}

/// Decode a raw payload into per-field value sequences.
///
/// Only direct children of the `<xml>` root are collected; text and CDATA
/// content is trimmed. Each element occurrence contributes one sequence
/// entry.
pub fn decode_fields(xml: &str) -> Result<FieldSequences, WxGateError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut fields = FieldSequences::new();
    let mut depth = 0usize;
    let mut current: Option<(String, String)> = None;
    let mut buf = Vec::new();

    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| WxGateError::Payload(format!("Invalid XML: {}", e)))?
        {
            Event::Start(ref e) => {
                depth += 1;
                if depth == 2 {
                    let name = String::from_utf8_lossy(e.local_name().into_inner()).to_string();
                    current = Some((name, String::new()));
                }
            }
            Event::Empty(ref e) => {
                if depth == 1 {
                    let name = String::from_utf8_lossy(e.local_name().into_inner()).to_string();
                    fields.entry(name).or_default().push(String::new());
                }
            }
            Event::Text(ref e) => {
                if let Some((_, value)) = current.as_mut() {
                    let text = e
                        .unescape()
                        .map_err(|e| WxGateError::Payload(format!("Invalid text: {}", e)))?;
                    value.push_str(text.trim());
                }
            }
            Event::CData(ref e) => {
                if let Some((_, value)) = current.as_mut() {
                    let text = String::from_utf8_lossy(e.as_ref());
                    value.push_str(text.trim());
                }
            }
            Event::End(_) => {
                if depth == 2 {
                    if let Some((name, value)) = current.take() {
                        fields.entry(name).or_default().push(value);
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if fields.is_empty() {
        return Err(WxGateError::Payload("Payload has no fields".to_string()));
    }
    Ok(fields)
}

/// Normalize sequences into a flat map: first value of every non-empty
/// sequence, empty sequences dropped.
pub fn normalize(fields: FieldSequences) -> NormalizedMessage {
    let attrs = fields
        .into_iter()
        .filter_map(|(name, mut values)| {
            if values.is_empty() {
                None
            } else {
                Some((name, values.swap_remove(0)))
            }
        })
        .collect();
    NormalizedMessage::from_attrs(attrs)
}

/// Decode and normalize one delivered payload.
pub fn parse_message(xml: &str) -> Result<NormalizedMessage, WxGateError> {
    Ok(normalize(decode_fields(xml)?))
}
