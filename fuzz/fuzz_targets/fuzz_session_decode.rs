#![no_main]
use libfuzzer_sys::fuzz_target;
use shellchat::sessions::codec;

fuzz_target!(|data: &[u8]| {
    // Decoding arbitrary bytes must never panic, and anything that decodes
    // must survive a re-encode.
    if let Ok(record) = codec::decode(data) {
        let bytes = codec::encode(&record).expect("decoded record re-encodes");
        let again = codec::decode(&bytes).expect("canonical encoding decodes");
        assert_eq!(again, record);
    }
});
