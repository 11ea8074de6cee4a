//! Directive encoding to provider call-control markup
//!
//! Turns a `routing::Directive` into the TwiML document the provider
//! executes. Kept separate from routing so decisions stay pure data.

use crate::routing::{DialTarget, Directive};
use calldesk_core::{AppError, AppResult};
use quick_xml::events::{BytesDecl, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;

/// Status events requested on every dialed leg, so the lifecycle tracker
/// sees the complete sequence.
const CALLBACK_EVENTS: &str = "initiated ringing answered completed";

/// Encode a directive as a complete `<Response>` document.
pub fn encode(directive: &Directive) -> AppResult<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(encode_err)?;
    writer
        .write_event(Event::Start(BytesStart::new("Response")))
        .map_err(encode_err)?;

    match directive {
        Directive::Dial(dial) => {
            let mut dial_elem = BytesStart::new("Dial");
            dial_elem.push_attribute(("callerId", dial.caller_id.as_str()));
            dial_elem.push_attribute(("record", dial.record.as_str()));
            writer
                .write_event(Event::Start(dial_elem))
                .map_err(encode_err)?;

            let (noun, text) = match &dial.target {
                DialTarget::Number(number) => ("Number", number.clone()),
                DialTarget::Client(user_id) => ("Client", user_id.to_string()),
            };

            let mut target_elem = BytesStart::new(noun);
            target_elem.push_attribute(("statusCallback", dial.status_callback.as_str()));
            target_elem.push_attribute(("statusCallbackEvent", CALLBACK_EVENTS));
            target_elem.push_attribute(("statusCallbackMethod", "POST"));
            if matches!(dial.target, DialTarget::Client(_)) {
                target_elem.push_attribute(("ringTone", "at"));
            }
            writer
                .write_event(Event::Start(target_elem))
                .map_err(encode_err)?;
            writer
                .write_event(Event::Text(BytesText::new(&text)))
                .map_err(encode_err)?;
            writer
                .write_event(Event::End(BytesStart::new(noun).to_end()))
                .map_err(encode_err)?;

            writer
                .write_event(Event::End(BytesStart::new("Dial").to_end()))
                .map_err(encode_err)?;
        }
        Directive::Say { message } => {
            writer
                .write_event(Event::Start(BytesStart::new("Say")))
                .map_err(encode_err)?;
            writer
                .write_event(Event::Text(BytesText::new(message)))
                .map_err(encode_err)?;
            writer
                .write_event(Event::End(BytesStart::new("Say").to_end()))
                .map_err(encode_err)?;
        }
    }

    writer
        .write_event(Event::End(BytesStart::new("Response").to_end()))
        .map_err(encode_err)?;

    String::from_utf8(writer.into_inner().into_inner())
        .map_err(|e| AppError::Internal(format!("directive encoding produced invalid utf8: {}", e)))
}

fn encode_err(e: impl std::fmt::Display) -> AppError {
    AppError::Internal(format!("directive encoding failed: {}", e))
}
