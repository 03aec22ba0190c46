use scada_telemetry::new_request_ids;
use std::collections::HashSet;

#[test]
fn request_and_trace_ids_are_unique_uuids() {
    let mut seen = HashSet::new();
    for _ in 0..64 {
        let ids = new_request_ids();
        assert_eq!(ids.request_id.len(), 36);
        assert_eq!(ids.trace_id.len(), 36);
        assert!(seen.insert(ids.request_id));
        assert!(seen.insert(ids.trace_id));
    }
}
