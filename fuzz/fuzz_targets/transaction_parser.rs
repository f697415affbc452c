#![no_main]

use libfuzzer_sys::fuzz_target;
use salescope::TransactionParser;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Rejected rows are fine; we only care about panics.
        let mut parser = TransactionParser::new_csv();
        if let Ok(tx) = parser.parse(input) {
            assert!(tx.total_price.is_finite());
            assert!(tx.price.is_finite());
        }
    }
});
