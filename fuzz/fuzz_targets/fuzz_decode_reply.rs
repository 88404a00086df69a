#![no_main]

use impala_wire::protocol::decode_reply;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Several replies may arrive in one TCP segment
    let mut rest = data;
    while !rest.is_empty() {
        match decode_reply(rest) {
            Ok((_, consumed)) => {
                assert!(consumed > 0 && consumed <= rest.len());
                rest = &rest[consumed..];
            }
            Err(_) => break,
        }
    }
});
