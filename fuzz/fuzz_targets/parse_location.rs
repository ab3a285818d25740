#![no_main]

use libfuzzer_sys::fuzz_target;
use taskpool_core::route::{self, Location, ParseResult};

// Parsing never panics, and whatever route comes out formats to a URL that
// parses back to it without a redirect.
fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };
    let route = route::parse(&Location::parse_url(raw)).into_route();
    let canonical = route::format(&route);
    assert_eq!(
        route::parse(&Location::parse_url(&canonical)),
        ParseResult::Parsed(route)
    );
});
