#![no_main]

use jarsig_manifest::{Manifest, ManifestLimits, ParseOptions};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let options = ParseOptions::default()
        .with_limits(ManifestLimits {
            max_line_bytes: 4096,
            max_manifest_bytes: 1 << 20,
        })
        .capture_chunks();
    if let Ok(manifest) = Manifest::parse_with(data, &options) {
        let chunks = manifest.chunks().expect("chunks requested");
        assert_eq!(chunks.raw(), data);
        for name in manifest.entry_names() {
            let _ = chunks.section(name);
        }
        // Anything that parsed can be written back out.
        if let Ok(bytes) = manifest.to_bytes() {
            let _ = Manifest::parse(&bytes);
        }
    }
});
