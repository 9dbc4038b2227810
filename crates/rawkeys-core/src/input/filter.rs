// Rawkeys Input Layer - Device Filtering
// Choosing the devices a hook grabs

/// Check if a device should be hooked.
///
/// With an explicit filter, only devices whose path or name appears in it
/// match, virtual or not. Without one, every real keyboard matches.
pub fn matches_device_filter(
    device_name: &str,
    device_path: &str,
    filter_names: &[String],
    is_keyboard: bool,
    is_virtual: bool,
) -> bool {
    if !filter_names.is_empty() {
        return filter_names
            .iter()
            .any(|wanted| device_path == wanted || device_name == wanted);
    }

    is_keyboard && !is_virtual
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_explicit_filter_matches_path_or_name() {
        let wanted = filter(&["/dev/input/event0", "Logitech Keyboard"]);
        assert!(matches_device_filter("Other", "/dev/input/event0", &wanted, true, false));
        assert!(matches_device_filter("Logitech Keyboard", "/dev/input/event5", &wanted, true, false));
        assert!(!matches_device_filter("Other", "/dev/input/event1", &wanted, true, false));
    }

    #[test]
    fn test_autodetect_takes_real_keyboards_only() {
        assert!(matches_device_filter("Kbd", "/dev/input/event0", &[], true, false));
        assert!(!matches_device_filter("Mouse", "/dev/input/event1", &[], false, false));
        assert!(!matches_device_filter("Virt", "/dev/input/event2", &[], true, true));
    }

    #[test]
    fn test_explicit_match_includes_virtual_and_non_keyboards() {
        let wanted = filter(&["Virt", "Pedal"]);
        assert!(matches_device_filter("Virt", "/dev/input/event2", &wanted, true, true));
        assert!(matches_device_filter("Pedal", "/dev/input/event3", &wanted, false, false));
    }
}
