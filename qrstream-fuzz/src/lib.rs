//! Fuzz entry points for qrstream-core decoders
//!
//! To use with cargo-fuzz:
//! 1. Install cargo-fuzz: cargo install cargo-fuzz
//! 2. Run fuzzer: cargo fuzz run fuzz_session_scan

use qrstream_core::Session;

pub fn fuzz_decode_vlq(data: &[u8]) {
    use qrstream_core::vlq;

    // Walk the input field by field; must never panic
    let mut from = 0;
    while let Ok(field) = vlq::decode(data, from) {
        if field.next <= from {
            break;
        }
        from = field.next;
    }
    let _ = vlq::decode_uint(data, 0);
}

pub fn fuzz_content_frame(data: &[u8]) {
    use qrstream_core::content::decode_content;
    use qrstream_core::framer::decode_content_frame;

    if let Ok(frame) = decode_content_frame(data) {
        assert!(frame.encoded_len <= data.len());
        let _ = decode_content(frame.chunk);
    }
    let _ = decode_content(data);
}

pub fn fuzz_correction_frame(data: &[u8]) {
    use qrstream_core::CorrectionFrame;

    if let Ok(frame) = CorrectionFrame::decode(data) {
        for total in [1, 2, 3, 10, 1_000] {
            let _ = frame.indices(total);
        }
    }
}

/// Split the input into payloads at newlines and feed them to one session
pub fn fuzz_session_scan(data: &[u8]) {
    let mut session = Session::new();
    for payload in data.split(|&b| b == b'\n') {
        let _ = session.on_scan(payload);
    }
    let _ = session.reconstruct();
    let _ = session.status();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fuzz_vlq_empty() {
        fuzz_decode_vlq(&[]);
    }

    #[test]
    fn test_fuzz_vlq_random() {
        fuzz_decode_vlq(b"9999999999");
        fuzz_decode_vlq(b"13abc13def");
    }

    #[test]
    fn test_fuzz_content_frame_random() {
        fuzz_content_frame(&[0xFF; 256]);
        fuzz_content_frame(b"1011");
    }

    #[test]
    fn test_fuzz_correction_frame_random() {
        fuzz_correction_frame(b"C");
        fuzz_correction_frame(b"C11511999999AQID");
    }

    #[test]
    fn test_fuzz_session_scan_random() {
        fuzz_session_scan(b"1011\nC1111101AA==\n11111\n\n");
        fuzz_session_scan(&[0x31; 512]);
    }
}
