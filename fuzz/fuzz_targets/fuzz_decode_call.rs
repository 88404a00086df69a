#![no_main]

use impala_wire::protocol::{decode_call, encode_call};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok((envelope, consumed)) = decode_call(data) {
        assert!(consumed <= data.len());

        // Anything we accept must re-encode
        let encoded = encode_call(&envelope.call, envelope.seqid).expect("re-encode");
        let (again, _) = decode_call(&encoded).expect("decode re-encoded call");
        assert_eq!(again, envelope);
    }
});
