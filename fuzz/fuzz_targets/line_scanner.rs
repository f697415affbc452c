#![no_main]

use std::io::Cursor;
use std::path::Path;

use libfuzzer_sys::fuzz_target;
use salescope::parallel::LineScanner;

fuzz_target!(|data: &[u8]| {
    let Ok(mut scanner) = LineScanner::from_reader(Cursor::new(data), Path::new("fuzz.csv")) else {
        return;
    };
    let mut lines = 0usize;
    let mut id = 0;
    while let Ok(Some(batch)) = scanner.next_batch(id, 7) {
        assert!(!batch.lines.is_empty() && batch.lines.len() <= 7);
        lines += batch.lines.len();
        id += 1;
    }
    assert_eq!(scanner.line_num(), lines + 1);
});
