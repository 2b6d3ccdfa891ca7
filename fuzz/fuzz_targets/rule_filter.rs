#![no_main]

use conntrackd_filter::Filter;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // 빌드 전체 경로: 렉싱 + 파싱 + 컴파일 (패닉 금지)
    if let Ok(rule) = std::str::from_utf8(data) {
        let _ = Filter::build(&[rule]);
    }
});
