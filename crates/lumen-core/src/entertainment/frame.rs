// ── Streaming frame codec ──
//
// One datagram per tick:
//
//   "HueStream" | 02 00 | 01 | 00 00 | 01 | 00 | <config id, 36 ASCII bytes>
//   then per channel: [channel_id, x, x, y, y, b, b]

use uuid::Uuid;

use crate::model::Xy;

pub const PROTOCOL_NAME: &[u8; 9] = b"HueStream";

/// Version 2.0, sequence 1, reserved, colour space xy+brightness, reserved.
const HEADER_TAIL: [u8; 7] = [0x02, 0x00, 0x01, 0x00, 0x00, 0x01, 0x00];

const CONFIG_ID_LEN: usize = 36;

pub const HEADER_LEN: usize = PROTOCOL_NAME.len() + HEADER_TAIL.len() + CONFIG_ID_LEN;
pub const CHANNEL_LEN: usize = 7;

/// The colour of one channel for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelColor {
    pub channel_id: u8,
    pub xy: Xy,
    /// Percentage, 0..=100.
    pub brightness: f64,
}

/// Scale a unit value into one 16-bit protocol slot.
///
/// Only 8 bits of precision are carried: the value is rounded to
/// `0..=255` and the byte is written twice. Bridges accept this, but it
/// discards the low byte the protocol has room for.
#[allow(
    clippy::as_conversions,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn scale_channel(value: f64) -> [u8; 2] {
    // NaN saturates to 0 in the cast.
    let byte = (value * 255.0).round().clamp(0.0, 255.0) as u8;
    [byte, byte]
}

/// Encode one frame for the configuration `config_id`.
pub fn encode_frame<I>(config_id: &Uuid, channels: I) -> Vec<u8>
where
    I: IntoIterator<Item = ChannelColor>,
{
    let channels = channels.into_iter();
    let mut out = Vec::with_capacity(HEADER_LEN + CHANNEL_LEN * channels.size_hint().0);

    out.extend_from_slice(PROTOCOL_NAME);
    out.extend_from_slice(&HEADER_TAIL);
    out.extend_from_slice(config_id.hyphenated().to_string().as_bytes());

    for ch in channels {
        out.push(ch.channel_id);
        out.extend_from_slice(&scale_channel(ch.xy.x));
        out.extend_from_slice(&scale_channel(ch.xy.y));
        out.extend_from_slice(&scale_channel(ch.brightness / 100.0));
    }
    out
}
