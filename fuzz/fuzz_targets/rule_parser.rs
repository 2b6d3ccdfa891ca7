#![no_main]

use conntrackd_filter::Parser;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // 파서는 &str을 받으므로 UTF-8 변환 필요
    if let Ok(rule) = std::str::from_utf8(data) {
        if let Ok(mut parser) = Parser::new(rule) {
            let _ = parser.parse_rule();
        }
    }
});
