#![no_main]

use libfuzzer_sys::fuzz_target;
use parcelkeep::slot::SlotId;

fuzz_target!(|data: &[u8]| {
    if let Ok(raw) = std::str::from_utf8(data)
        && let Ok(slot) = SlotId::parse(raw)
    {
        assert!(slot.number().is_some());
        assert_eq!(SlotId::parse(slot.as_str()).ok(), Some(slot));
    }
});
