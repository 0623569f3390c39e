//! Length-prefixed binary packets.
//!
//! Wire layout: one length byte `L` (1..=200) followed by `L` payload bytes.
//! There is no checksum. Invalid length bytes are skipped one at a time to
//! resynchronise, unless they look like text, in which case the stream is
//! handed back to the text path.

use serde_json::Value;
use tracing::{debug, trace};

use super::detect::printable_ratio;
use crate::types::{Event, EventData, EventKind};

/// Largest payload a length byte may announce
pub const MAX_PAYLOAD_LEN: usize = 200;

/// Printable share of the buffer head that aborts binary framing
const TEXT_GUARD_RATIO: f64 = 0.7;

/// Result of one framing pass over the buffer
#[derive(Debug, Default)]
pub struct BinaryPass {
    /// Packets completed during the pass
    pub packets: Vec<Event>,
    /// The remaining buffer looks like text and must be parsed as lines
    pub escaped: bool,
}

/// Extract every complete packet from `buffer`.
///
/// Consumed bytes are removed; an incomplete packet stays buffered. When
/// `escaped` is set, the buffer holds the unconsumed bytes starting at the
/// byte that triggered the escape.
pub fn frame_packets(buffer: &mut Vec<u8>) -> BinaryPass {
    let mut pass = BinaryPass::default();

    if !buffer.is_empty() && printable_ratio(buffer) >= TEXT_GUARD_RATIO {
        debug!("Binary buffer head is mostly printable, switching to text");
        pass.escaped = true;
        return pass;
    }

    let mut start = 0;
    let mut skipped = 0usize;
    while buffer.len() - start >= 2 {
        let length = buffer[start] as usize;

        if length == 0 || length > MAX_PAYLOAD_LEN {
            if (32..=126).contains(&buffer[start]) {
                debug!(
                    byte = buffer[start],
                    "Printable byte in length position, switching to text"
                );
                pass.escaped = true;
                break;
            }
            trace!(byte = buffer[start], "Dropping invalid length byte");
            skipped += 1;
            start += 1;
            continue;
        }

        if buffer.len() - start < length + 1 {
            break;
        }

        let payload = &buffer[start + 1..start + 1 + length];
        pass.packets.push(packet_event(payload));
        start += length + 1;
    }

    if skipped > 0 {
        debug!(skipped, "Resynchronised binary stream");
    }
    buffer.drain(..start);
    pass
}

/// Packet event with hex payload and its length
pub fn packet_event(payload: &[u8]) -> Event {
    let encoded = hex::encode(payload);
    let mut data = EventData::new();
    data.insert("payload".to_string(), Value::String(encoded.clone()));
    data.insert("length".to_string(), Value::from(payload.len()));
    Event::new(EventKind::Packet, data).with_raw(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_packet() {
        let mut buffer = vec![0x03, 0xaa, 0xbb, 0xcc];
        let pass = frame_packets(&mut buffer);
        assert!(!pass.escaped);
        assert_eq!(pass.packets.len(), 1);
        assert_eq!(pass.packets[0].data["payload"], "aabbcc");
        assert_eq!(pass.packets[0].data["length"], 3);
        assert_eq!(pass.packets[0].raw.as_deref(), Some("aabbcc"));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_partial_packet_stays_buffered() {
        let mut buffer = vec![0x04, 0xaa, 0xbb];
        let pass = frame_packets(&mut buffer);
        assert!(pass.packets.is_empty());
        assert_eq!(buffer, vec![0x04, 0xaa, 0xbb]);
    }

    #[test]
    fn test_resync_skips_invalid_length() {
        let mut buffer = vec![0x00, 0xff, 0x02, 0x01, 0x02];
        let pass = frame_packets(&mut buffer);
        assert!(!pass.escaped);
        assert_eq!(pass.packets.len(), 1);
        assert_eq!(pass.packets[0].data["payload"], "0102");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_back_to_back_packets_with_trailing_fragment() {
        let mut buffer = vec![0x01, 0x90, 0xd0, 0xe1, 0x02, 0x80, 0x81, 0x05, 0xf0];
        let pass = frame_packets(&mut buffer);
        assert!(!pass.escaped);
        let payloads: Vec<_> = pass
            .packets
            .iter()
            .map(|p| p.data["payload"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(payloads, vec!["90", "8081"]);
        assert_eq!(buffer, vec![0x05, 0xf0]);
    }

    #[test]
    fn test_text_guard_escapes_immediately() {
        let mut buffer = b"[INFO] hello\n".to_vec();
        let pass = frame_packets(&mut buffer);
        assert!(pass.escaped);
        assert!(pass.packets.is_empty());
        assert_eq!(buffer, b"[INFO] hello\n");
    }
}
