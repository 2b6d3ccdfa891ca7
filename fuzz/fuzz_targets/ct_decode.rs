#![no_main]

use conntrackd_conntrack::decode::decode_datagram;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // 임의 바이트 datagram에 대해 에러만 반환해야 함
    let _ = decode_datagram(data);
});
