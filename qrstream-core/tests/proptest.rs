//! Property-based tests using proptest

use bytes::Bytes;
use qrstream_core::{
    content::{decode_content, encode_content},
    fec::{correction_indices, xor_bytes, CorrectionFrame},
    framer::{decode_content_frame, ContentBuilder},
    session::Session,
    vlq,
};
use proptest::prelude::*;

proptest! {
    #[test]
    fn prop_vlq_round_trip(value in prop::collection::vec(any::<u8>(), 0..2048)) {
        let encoded = vlq::encode_bytes(&value).unwrap();
        let field = vlq::decode(&encoded, 0).unwrap();

        prop_assert_eq!(field.length, value.len());
        prop_assert_eq!(field.value, &value[..]);
        prop_assert_eq!(field.next, encoded.len());
    }

    #[test]
    fn prop_vlq_uint_round_trip(value in any::<u64>()) {
        let encoded = vlq::encode_uint(value).unwrap();
        prop_assert_eq!(vlq::decode_uint(&encoded, 0).unwrap(), (value, encoded.len()));
    }

    #[test]
    fn prop_content_round_trip(
        path in "[a-zA-Z0-9 ./_%-]{0,40}",
        payload in prop::collection::vec(any::<u8>(), 0..512)
    ) {
        let stream = encode_content(&path, &payload).unwrap();
        let decoded = decode_content(&stream).unwrap();

        prop_assert_eq!(decoded.header.path, path);
        prop_assert_eq!(&decoded.payload[..], &payload[..]);
    }

    #[test]
    fn prop_chunks_cover_stream(
        payload in prop::collection::vec(any::<u8>(), 0..600),
        capacity in 1usize..80
    ) {
        let builder = ContentBuilder::new("p.bin").payload(payload).data_capacity(capacity);
        let stream = builder.build_stream().unwrap();
        let frames = builder.build().unwrap();

        let mut joined = Vec::new();
        for (i, raw) in frames.frames().iter().enumerate() {
            let frame = decode_content_frame(raw).unwrap();
            prop_assert_eq!(frame.index, i);
            prop_assert!(!frame.chunk.is_empty() && frame.chunk.len() <= capacity);
            joined.extend_from_slice(frame.chunk);
        }
        prop_assert_eq!(joined, stream.to_vec());
    }

    #[test]
    fn prop_correction_indices(
        n in 2usize..5000,
        pct in 1u8..100,
        seed in any::<usize>()
    ) {
        let m = (n * pct as usize).div_ceil(100);
        let index = seed % m;

        let indices = correction_indices(n, pct, index);
        prop_assert!(indices.len() >= 2);
        prop_assert!(indices.iter().all(|&i| i < n));
        prop_assert!(indices.contains(&index));
        prop_assert_eq!(&indices, &correction_indices(n, pct, index));

        let mut unique = indices.clone();
        unique.sort_unstable();
        unique.dedup();
        prop_assert_eq!(unique.len(), indices.len());
    }

    #[test]
    fn prop_xor_self_inverse(
        a in prop::collection::vec(any::<u8>(), 0..256),
        b in prop::collection::vec(any::<u8>(), 0..256)
    ) {
        let back = xor_bytes(&xor_bytes(&a, &b), &b);

        prop_assert_eq!(back.len(), a.len().max(b.len()));
        prop_assert_eq!(&back[..a.len()], &a[..]);
        prop_assert!(back[a.len()..].iter().all(|&x| x == 0));
    }

    #[test]
    fn prop_decoders_never_panic(data in prop::collection::vec(any::<u8>(), 0..1024)) {
        let _ = vlq::decode(&data, 0);
        let _ = decode_content_frame(&data);
        let _ = CorrectionFrame::decode(&data);
        let _ = decode_content(&data);
    }

    #[test]
    fn prop_session_never_panics(
        payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 0..32)
    ) {
        let mut session = Session::new();
        for payload in payloads {
            let _ = session.on_scan(&Bytes::from(payload));
        }
        let _ = session.reconstruct();
    }
}
