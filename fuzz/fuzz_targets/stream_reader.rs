#![no_main]

use std::io::Read;

use jarsig_verify::StreamingArchive;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut tar = tar::Archive::new(data);
    let Ok(mut archive) = StreamingArchive::new("fuzz.tar", &mut tar) else {
        return;
    };
    let mut sink = [0u8; 4096];
    for entry in archive.by_ref() {
        let Ok(mut entry) = entry else {
            break;
        };
        while matches!(entry.read(&mut sink), Ok(n) if n > 0) {}
    }
    let _ = archive.is_signed();
});
