//! xfconf client: the panel's property service over the session bus.
//!
//! Speaks the `org.xfce.Xfconf` interface directly (`GetAllProperties`,
//! `SetProperty`, `ResetProperty`) and converts between D-Bus variants and
//! the closed `PropertyValue` set. Properties with types outside that set
//! are skipped on capture with a warning.

use std::collections::HashMap;

use anyhow::{Context, Result};
use tracing::warn;
use zbus::blocking::Connection;
use zbus::zvariant::{Array, Value};

use crate::live::PropertyService;
use crate::value::PropertyValue;

const BUS_NAME: &str = "org.xfce.Xfconf";
const OBJECT_PATH: &str = "/org/xfce/Xfconf";
const INTERFACE: &str = "org.xfce.Xfconf";

/// The xfconf channel holding the panel configuration.
pub const PANEL_CHANNEL: &str = "xfce4-panel";

pub struct XfconfChannel {
    connection: Connection,
    channel: String,
}

impl XfconfChannel {
    pub fn session(channel: &str) -> Result<Self> {
        let connection = Connection::session()
            .context("failed to connect to the session bus")?;
        Ok(Self {
            connection,
            channel: channel.to_string(),
        })
    }
}

impl PropertyService for XfconfChannel {
    fn get_all(&self) -> Result<Vec<(String, PropertyValue)>> {
        let reply = self
            .connection
            .call_method(
                Some(BUS_NAME),
                OBJECT_PATH,
                Some(INTERFACE),
                "GetAllProperties",
                &(self.channel.as_str(), ""),
            )
            .context("GetAllProperties call failed (is xfconfd running?)")?;
        let body = reply.body();
        let raw: HashMap<String, Value> = body
            .deserialize()
            .context("unexpected GetAllProperties reply shape")?;

        let mut properties = Vec::with_capacity(raw.len());
        for (path, value) in raw {
            match decode_value(&value) {
                Some(decoded) => {
                    // decode must be exact: the text codec is the manifest
                    // wire format, so a value that does not survive it is a
                    // programming defect, not a runtime condition
                    debug_assert_eq!(
                        PropertyValue::parse(&decoded.to_text()).as_ref(),
                        Some(&decoded)
                    );
                    properties.push((path, decoded));
                }
                None => warn!(property = %path, value = ?value, "skipping property with unsupported type"),
            }
        }
        Ok(properties)
    }

    fn set(&self, path: &str, value: &PropertyValue) -> Result<()> {
        self.connection
            .call_method(
                Some(BUS_NAME),
                OBJECT_PATH,
                Some(INTERFACE),
                "SetProperty",
                &(self.channel.as_str(), path, encode_value(value)),
            )
            .context(format!("SetProperty failed for `{path}`"))?;
        Ok(())
    }

    fn reset_all(&self) -> Result<()> {
        self.connection
            .call_method(
                Some(BUS_NAME),
                OBJECT_PATH,
                Some(INTERFACE),
                "ResetProperty",
                &(self.channel.as_str(), "/", true),
            )
            .context("ResetProperty failed")?;
        Ok(())
    }
}

fn decode_value(value: &Value<'_>) -> Option<PropertyValue> {
    match value {
        Value::Value(inner) => decode_value(inner),
        Value::Str(s) => Some(PropertyValue::Str(s.as_str().to_string())),
        Value::Bool(b) => Some(PropertyValue::Bool(*b)),
        Value::U8(n) => Some(PropertyValue::Int(i64::from(*n))),
        Value::I16(n) => Some(PropertyValue::Int(i64::from(*n))),
        Value::U16(n) => Some(PropertyValue::Int(i64::from(*n))),
        Value::I32(n) => Some(PropertyValue::Int(i64::from(*n))),
        Value::U32(n) => Some(PropertyValue::Int(i64::from(*n))),
        Value::I64(n) => Some(PropertyValue::Int(*n)),
        Value::U64(n) => i64::try_from(*n).ok().map(PropertyValue::Int),
        Value::Array(array) => decode_array(array),
        _ => None,
    }
}

fn decode_array(array: &Array<'_>) -> Option<PropertyValue> {
    let mut ints = Vec::new();
    let mut strings = Vec::new();
    for element in array.iter() {
        match decode_value(element)? {
            PropertyValue::Int(n) if strings.is_empty() => ints.push(n),
            PropertyValue::Str(s) if ints.is_empty() => strings.push(s),
            _ => return None,
        }
    }
    if ints.is_empty() && strings.is_empty() {
        // element signature decides what an empty array is
        return match array.element_signature().to_string().as_str() {
            "s" => Some(PropertyValue::StrArray(Vec::new())),
            "y" | "n" | "q" | "i" | "u" | "x" | "t" => Some(PropertyValue::IntArray(Vec::new())),
            _ => None,
        };
    }
    if strings.is_empty() {
        Some(PropertyValue::IntArray(ints))
    } else {
        Some(PropertyValue::StrArray(strings))
    }
}

/// Integers go back out as int32 when they fit; the panel stores its
/// numeric properties as int32 and xfconf is strict about types.
fn encode_value(value: &PropertyValue) -> Value<'static> {
    match value {
        PropertyValue::Str(s) => Value::from(s.clone()),
        PropertyValue::Bool(b) => Value::from(*b),
        PropertyValue::Int(n) => match i32::try_from(*n) {
            Ok(small) => Value::from(small),
            Err(_) => Value::from(*n),
        },
        PropertyValue::IntArray(values) => {
            if let Ok(small) = values
                .iter()
                .map(|n| i32::try_from(*n))
                .collect::<Result<Vec<i32>, _>>()
            {
                Value::Array(Array::from(small))
            } else {
                Value::Array(Array::from(values.clone()))
            }
        }
        PropertyValue::StrArray(values) => Value::Array(Array::from(values.clone())),
    }
}
