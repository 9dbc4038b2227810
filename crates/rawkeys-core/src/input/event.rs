// Rawkeys Input Layer - Event Classification
// Event type codes from Linux input-event-codes.h

/// EV_SYN event type code (frame separator between event packets)
pub const EV_SYN: u16 = 0x00;

/// EV_KEY event type code
pub const EV_KEY: u16 = 0x01;

/// Check if an event type is a key event
pub fn is_key_event(event_type: u16) -> bool {
    event_type == EV_KEY
}

/// Check if an event type is a synchronization marker
pub fn is_sync_event(event_type: u16) -> bool {
    event_type == EV_SYN
}
