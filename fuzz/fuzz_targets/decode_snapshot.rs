#![no_main]

use libfuzzer_sys::fuzz_target;
use taskpool_core::plan;
use taskpool_core::route::{self, Location};
use taskpool_core::snapshot::Snapshot;

// Any snapshot that decodes can be planned against any location.
fuzz_target!(|data: &[u8]| {
    let Some(split) = data.iter().position(|byte| *byte == b'\n') else {
        return;
    };
    let (url, json) = data.split_at(split);
    let Ok(url) = std::str::from_utf8(url) else {
        return;
    };
    let Ok(snapshot) = serde_json::from_slice::<Snapshot>(&json[1..]) else {
        return;
    };
    let route = route::parse(&Location::parse_url(url)).into_route();
    let _ = plan(&route, &snapshot);
});
