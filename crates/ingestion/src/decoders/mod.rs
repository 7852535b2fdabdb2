//! Built-in device decoders

mod lights;
mod power;

pub use lights::decode_ph;
pub use power::decode_pm;

use crate::registry::Decoder;

/// Built-in prefix -> decoder pairs
pub(crate) fn builtin() -> Vec<(String, Box<dyn Decoder>)> {
    vec![
        ("ph".to_string(), Box::new(decode_ph) as Box<dyn Decoder>),
        ("pm".to_string(), Box::new(decode_pm) as Box<dyn Decoder>),
    ]
}
