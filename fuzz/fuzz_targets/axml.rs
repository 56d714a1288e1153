#![no_main]

use apkscope::axml::parse;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(document) = parse(data) {
        let _ = document.to_xml_string();
    }
});
