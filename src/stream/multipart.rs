//! `multipart/x-mixed-replace` framing for MJPEG over HTTP

use bytes::{BufMut, Bytes, BytesMut};

/// Boundary token separating parts
pub const BOUNDARY: &str = "frame";

/// Content type of the streaming response
pub const CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

const PART_HEADER: &[u8] = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n";
const PART_TRAILER: &[u8] = b"\r\n";

/// Wrap one encoded JPEG into a multipart part
pub fn part(jpeg: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(PART_HEADER.len() + jpeg.len() + PART_TRAILER.len());
    buf.put_slice(PART_HEADER);
    buf.put_slice(jpeg);
    buf.put_slice(PART_TRAILER);
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn frames_payload_exactly() {
        let chunk = part(b"\xff\xd8JPEG\xff\xd9");
        assert_eq!(
            &chunk[..],
            b"--frame\r\nContent-Type: image/jpeg\r\n\r\n\xff\xd8JPEG\xff\xd9\r\n"
        );
    }

    #[test]
    fn content_type_names_boundary() {
        assert!(CONTENT_TYPE.ends_with(&format!("boundary={}", BOUNDARY)));
    }

    proptest! {
        #[test]
        fn any_payload_is_wrapped_byte_for_byte(payload in proptest::collection::vec(any::<u8>(), 0..4096)) {
            let chunk = part(&payload);
            let mut expected = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n".to_vec();
            expected.extend_from_slice(&payload);
            expected.extend_from_slice(b"\r\n");
            prop_assert_eq!(chunk.to_vec(), expected);
        }
    }
}
